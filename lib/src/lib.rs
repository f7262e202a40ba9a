//! Builds and submits the governance proposal that hands compromised EOSIO
//! accounts over to a custodian.
//!
//! The pipeline: [`migration`] builds the `updateauth` batch, [`proposal`]
//! wraps it into an `eosio.msig::propose` action addressed to the current
//! top producers ([`approvers`]), and [`submit`] fills chain parameters, gets
//! the transaction co-signed by a fee [`sponsor`] and broadcasts it.

pub mod approvers;
pub mod chain;
pub mod config;
pub mod constants;
pub mod error;
pub mod migration;
pub mod proposal;
pub mod rpc;
pub mod sponsor;
pub mod submit;

pub use config::Config;
pub use error::{Error, Result, Stage};
pub use submit::Orchestrator;
