use clap::{Parser, Subcommand};
use recover_tool_lib::Config;
use std::path::{Path, PathBuf};
use tracing::error;

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "rec-tool")]
#[command(about = "Proposes handing compromised EOSIO accounts over to a custodian")]
struct Cli {
    /// Directory holding conf.toml
    #[arg(long, default_value = "./conf", global = true)]
    conf_path: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the freeze proposal and broadcast it
    Proposal {
        /// Self-sign and pay resources even if a sponsor is configured
        #[arg(long)]
        direct: bool,

        /// Print the transaction instead of broadcasting it
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = Config::load(&cli.conf_path);
    let debug = loaded.as_ref().map(|c| c.debug).unwrap_or(false);

    let guard = match logging::init(debug, Path::new(logging::LOG_DIR)) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("failed to set up logging: {:#}", err);
            std::process::exit(1);
        }
    };

    let config = match loaded {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            drop(guard);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Proposal { direct, dry_run } => {
            commands::proposal::run(&config, direct, dry_run).await
        }
    };

    if let Err(err) = result {
        error!("{:#}", err);
        // exit skips destructors, flush the file writer first
        drop(guard);
        std::process::exit(1);
    }
}
