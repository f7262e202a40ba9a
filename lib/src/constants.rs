use crate::chain::Name;

// ==================== Limits ====================

/// Maximum number of accounts migrated by one proposal
/// Each account adds two actions; more than 200 actions risks exceeding the
/// chain's transaction size and resource limits
pub const ACCOUNT_LIMIT: usize = 100;

/// Number of top-ranked producers whose approval the proposal requests
pub const PRODUCERS_LIMIT: usize = 21;

/// Lifetime of the migration and proposal transactions (30 days)
/// They are only replayed after governance approval, so they must outlive it
pub const PROPOSAL_LIFETIME_HOURS: i64 = 720;

/// Default lifetime of the broadcast outer transaction
pub const DEFAULT_EXPIRE_SECONDS: i64 = 30;

/// Longest transaction lifetime a node accepts by default
pub const MAX_EXPIRE_SECONDS: i64 = 3600;

// ==================== System contracts ====================

pub const SYSTEM_ACCOUNT: Name = Name::constant("eosio");
pub const UPDATE_AUTH: Name = Name::constant("updateauth");

pub const WRAP_CONTRACT: Name = Name::constant("eosio.wrap");
pub const WRAP_EXEC: Name = Name::constant("exec");

/// Privileged permission the wrapper action must carry
pub const WRAP_PERMISSION: &str = "eosio.wrap@active";

pub const MSIG_CONTRACT: Name = Name::constant("eosio.msig");
pub const MSIG_PROPOSE: Name = Name::constant("propose");

/// Name under which the proposal is created
pub const PROPOSAL_NAME: Name = Name::constant("freeze");

pub const OWNER: Name = Name::constant("owner");
pub const ACTIVE: Name = Name::constant("active");

// ==================== Sponsor protocol ====================

/// Resource provider endpoint, relative to the sponsor host
pub const SPONSOR_REQUEST_PATH: &str = "/v1/resource_provider/request_transaction";

/// `code` field value of a successful sponsor response
pub const SPONSOR_SUCCESS_CODE: u32 = 200;

/// Position of the sponsored transaction inside `data.request`
pub const SPONSOR_TRANSACTION_INDEX: usize = 1;
