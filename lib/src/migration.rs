//! Authority migration: hands `active` and `owner` of every account to a custodian

use crate::chain::types::packed_struct;
use crate::chain::{Action, Authority, Name, PermissionLevel, Transaction, TxHeader};
use crate::constants::{
    ACCOUNT_LIMIT, ACTIVE, OWNER, PROPOSAL_LIFETIME_HOURS, SYSTEM_ACCOUNT, UPDATE_AUTH,
};
use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// `eosio::updateauth` payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateAuth {
    pub account: Name,
    pub permission: Name,
    pub parent: Name,
    pub auth: Authority,
}

packed_struct!(UpdateAuth { account, permission, parent, auth });

/// Fails with `LimitExceeded` when one transaction cannot carry all accounts
pub fn check_account_limit(count: usize) -> Result<()> {
    if count > ACCOUNT_LIMIT {
        return Err(Error::LimitExceeded {
            count,
            limit: ACCOUNT_LIMIT,
        });
    }
    Ok(())
}

fn update_auth(
    account: Name,
    permission: Name,
    parent: Name,
    auth: Authority,
    authorization: Vec<PermissionLevel>,
) -> Action {
    Action::new(
        SYSTEM_ACCOUNT,
        UPDATE_AUTH,
        authorization,
        &UpdateAuth {
            account,
            permission,
            parent,
            auth,
        },
    )
}

/// Builds the inner transaction: for each account, in order, an `active`
/// update followed by an `owner` update, both delegating to `custodian`
pub fn build_migration(
    accounts: &[Name],
    custodian: PermissionLevel,
    now: DateTime<Utc>,
) -> Result<Transaction> {
    check_account_limit(accounts.len())?;

    let authority = Authority::single_account(custodian);
    let mut actions = Vec::with_capacity(accounts.len() * 2);

    for &account in accounts {
        let owner = PermissionLevel::new(account, OWNER);
        let active = PermissionLevel::new(account, ACTIVE);

        actions.push(update_auth(
            account,
            ACTIVE,
            OWNER,
            authority.clone(),
            vec![owner, active],
        ));
        actions.push(update_auth(
            account,
            OWNER,
            Name::default(),
            authority.clone(),
            vec![owner],
        ));
    }

    debug!(
        accounts = accounts.len(),
        actions = actions.len(),
        custodian = %custodian,
        "built authority migration"
    );

    Ok(Transaction::new(
        actions,
        TxHeader::expiring(now, Duration::hours(PROPOSAL_LIFETIME_HOURS)),
    ))
}
