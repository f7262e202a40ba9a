//! Approval quorum: the `active` permission of each top-ranked producer

use crate::chain::{Name, PermissionLevel};
use crate::constants::{ACTIVE, PRODUCERS_LIMIT};
use crate::error::{Error, Result};
use crate::rpc::ChainApi;
use tracing::debug;

/// Resolves the ordered list of approvers requested on the proposal
///
/// Upstream ranking order is kept and the list is truncated to
/// [`PRODUCERS_LIMIT`]; fewer producers simply yield a smaller quorum.
pub async fn resolve_approvers<C: ChainApi + ?Sized>(chain: &C) -> Result<Vec<PermissionLevel>> {
    let rows = chain
        .get_producers(PRODUCERS_LIMIT as u32)
        .await
        .map_err(Error::ResolverUnavailable)?;

    let approvers = rows
        .iter()
        .take(PRODUCERS_LIMIT)
        .map(|row| {
            row.owner
                .parse::<Name>()
                .map(|actor| PermissionLevel::new(actor, ACTIVE))
                .map_err(|e| Error::Wrapper(format!("producer {:?}: {}", row.owner, e)))
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(upstream = rows.len(), approvers = approvers.len(), "resolved approvers");
    Ok(approvers)
}
