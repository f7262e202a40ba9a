use anyhow::{Context, Result};
use chrono::Utc;
use recover_tool_lib::rpc::RpcClient;
use recover_tool_lib::sponsor::SponsorClient;
use recover_tool_lib::{Config, Orchestrator};
use tracing::info;

pub async fn run(config: &Config, direct: bool, dry_run: bool) -> Result<()> {
    let signer = config.key_bag().context("load send_private_key")?;
    let chain = RpcClient::new(config.node.as_str());

    info!(
        node = %config.node,
        proposer = %config.send_account,
        accounts = config.hacker_accounts.len(),
        custodian = %config.custodian,
        "preparing freeze proposal"
    );

    let sponsor = match (&config.sponsor_endpoint, direct) {
        (Some(endpoint), false) => Some(SponsorClient::new(endpoint.as_str())),
        _ => None,
    };

    let mut orchestrator = Orchestrator::new(config, &chain, &signer);

    if dry_run {
        let (trx, chain_id) = orchestrator.prepare(Utc::now()).await?;
        println!("chain_id: {}", chain_id);
        println!("{}", serde_json::to_string_pretty(&trx)?);
        return Ok(());
    }

    if let Some(sponsor) = &sponsor {
        orchestrator = orchestrator.with_sponsor(sponsor);
    } else {
        info!("no sponsor in use, self-signing");
    }

    let tx_id = orchestrator.send_proposal().await?;
    println!("{}", tx_id);
    Ok(())
}
