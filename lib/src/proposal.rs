//! Proposal wrapper
//!
//! The migration transaction is nested four layers deep:
//! inner transaction -> `eosio.wrap::exec` action -> proposal transaction ->
//! `eosio.msig::propose` action. Each layer is a typed payload packed at its
//! own boundary, so every level can be decoded back for inspection.

use crate::approvers::resolve_approvers;
use crate::chain::types::packed_struct;
use crate::chain::{Action, Name, PermissionLevel, Transaction, TxHeader};
use crate::constants::{
    ACTIVE, MSIG_CONTRACT, MSIG_PROPOSE, PROPOSAL_LIFETIME_HOURS, PROPOSAL_NAME, SYSTEM_ACCOUNT,
    WRAP_CONTRACT, WRAP_EXEC, WRAP_PERMISSION,
};
use crate::error::{Error, Result};
use crate::rpc::ChainApi;
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// `eosio.wrap::exec` payload: replays `trx` with the executer's privilege
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exec {
    pub executer: Name,
    pub trx: Transaction,
}

packed_struct!(Exec { executer, trx });

/// `eosio.msig::propose` payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Propose {
    pub proposer: Name,
    pub proposal_name: Name,
    pub requested: Vec<PermissionLevel>,
    pub trx: Transaction,
}

packed_struct!(Propose { proposer, proposal_name, requested, trx });

/// A multisig proposal, immutable once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub proposer: Name,
    pub name: Name,
    pub approvers: Vec<PermissionLevel>,
    pub transaction: Transaction,
}

impl Proposal {
    /// The `propose` action submitting this proposal, authorized by the proposer
    pub fn to_action(&self) -> Action {
        Action::new(
            MSIG_CONTRACT,
            MSIG_PROPOSE,
            vec![PermissionLevel::new(self.proposer, ACTIVE)],
            &Propose {
                proposer: self.proposer,
                proposal_name: self.name,
                requested: self.approvers.clone(),
                trx: self.transaction.clone(),
            },
        )
    }

    /// Decodes a `propose` action back into a proposal
    pub fn from_action(action: &Action) -> Result<Self> {
        if action.account != MSIG_CONTRACT || action.name != MSIG_PROPOSE {
            return Err(Error::Wrapper(format!(
                "expected {}::{}, got {}::{}",
                MSIG_CONTRACT, MSIG_PROPOSE, action.account, action.name
            )));
        }
        let propose: Propose = action
            .decode_data()
            .map_err(|e| Error::Wrapper(e.to_string()))?;
        Ok(Self {
            proposer: propose.proposer,
            name: propose.proposal_name,
            approvers: propose.requested,
            transaction: propose.trx,
        })
    }
}

/// Wraps `inner` into a privileged exec action carrying the wrap permission
pub fn wrap_exec(inner: Transaction) -> Result<Action> {
    let wrap_permission: PermissionLevel = WRAP_PERMISSION
        .parse()
        .map_err(|e| Error::Wrapper(format!("wrap permission {WRAP_PERMISSION:?}: {e}")))?;

    Ok(Action::new(
        WRAP_CONTRACT,
        WRAP_EXEC,
        vec![PermissionLevel::new(SYSTEM_ACCOUNT, ACTIVE), wrap_permission],
        &Exec {
            executer: SYSTEM_ACCOUNT,
            trx: inner,
        },
    ))
}

/// Builds the `propose` action for the migration transaction
pub async fn build_proposal<C: ChainApi + ?Sized>(
    chain: &C,
    inner: Transaction,
    proposer: Name,
    now: DateTime<Utc>,
) -> Result<Action> {
    let exec = wrap_exec(inner)?;
    let proposal_trx = Transaction::new(
        vec![exec],
        TxHeader::expiring(now, Duration::hours(PROPOSAL_LIFETIME_HOURS)),
    );

    let approvers = resolve_approvers(chain).await?;
    if approvers.is_empty() {
        return Err(Error::EmptyQuorum);
    }

    let proposal = Proposal {
        proposer,
        name: PROPOSAL_NAME,
        approvers,
        transaction: proposal_trx,
    };
    debug!(
        proposer = %proposal.proposer,
        name = %proposal.name,
        approvers = proposal.approvers.len(),
        "built proposal"
    );

    Ok(proposal.to_action())
}
