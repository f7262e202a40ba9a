use crate::chain::{KeyBag, Name, PermissionLevel};
use crate::constants::{ACTIVE, DEFAULT_EXPIRE_SECONDS, MAX_EXPIRE_SECONDS, SYSTEM_ACCOUNT};
use crate::error::{Error, Result, SigningError};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::fs;
use std::path::Path;

/// File name looked up inside the config directory
pub const CONFIG_FILE: &str = "conf.toml";

/// Process configuration, loaded once at start and read-only afterwards
#[derive(Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub debug: bool,

    /// Node RPC endpoint
    pub node: String,

    pub send_private_key: String,

    /// Proposer account; also the account the sponsor signs for
    pub send_account: Name,

    /// Resource provider host; without it transactions are self-signed
    #[serde(default)]
    pub sponsor_endpoint: Option<String>,

    /// New sole controller of every migrated account
    #[serde(default = "default_custodian", deserialize_with = "permission_from_str")]
    pub custodian: PermissionLevel,

    /// Compromised accounts to migrate, in order
    #[serde(default)]
    pub hacker_accounts: Vec<Name>,

    /// Lifetime of the broadcast transaction
    #[serde(default = "default_expire_seconds")]
    pub expire_seconds: i64,
}

fn default_custodian() -> PermissionLevel {
    PermissionLevel::new(SYSTEM_ACCOUNT, ACTIVE)
}

fn default_expire_seconds() -> i64 {
    DEFAULT_EXPIRE_SECONDS
}

fn permission_from_str<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<PermissionLevel, D::Error> {
    String::deserialize(deserializer)?
        .parse()
        .map_err(serde::de::Error::custom)
}

impl Config {
    /// Loads `<dir>/conf.toml`
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        let content = fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("read {}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.node.starts_with("http") {
            return Err(Error::Config(format!("node must be an http(s) url, got {:?}", self.node)));
        }
        if let Some(endpoint) = &self.sponsor_endpoint {
            if !endpoint.starts_with("http") {
                return Err(Error::Config(format!(
                    "sponsor_endpoint must be an http(s) url, got {:?}",
                    endpoint
                )));
            }
        }
        if self.expire_seconds <= 0 || self.expire_seconds > MAX_EXPIRE_SECONDS {
            return Err(Error::Config(format!(
                "expire_seconds must be in 1..={}, got {}",
                MAX_EXPIRE_SECONDS, self.expire_seconds
            )));
        }
        Ok(())
    }

    /// Key bag holding the send account's key
    pub fn key_bag(&self) -> std::result::Result<KeyBag, SigningError> {
        let mut bag = KeyBag::new();
        bag.import_private_key(&self.send_private_key)?;
        Ok(bag)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("debug", &self.debug)
            .field("node", &self.node)
            .field("send_private_key", &"<redacted>")
            .field("send_account", &self.send_account)
            .field("sponsor_endpoint", &self.sponsor_endpoint)
            .field("custodian", &self.custodian)
            .field("hacker_accounts", &self.hacker_accounts)
            .field("expire_seconds", &self.expire_seconds)
            .finish()
    }
}
