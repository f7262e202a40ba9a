//! Submission orchestration: build, resolve, wrap, fill, sign and broadcast

use crate::chain::{Checksum256, PackedTransaction, SignedTransaction, Signer, Transaction};
use crate::config::Config;
use crate::error::{Error, Result, Stage};
use crate::migration::{build_migration, check_account_limit};
use crate::proposal::build_proposal;
use crate::rpc::{BroadcastError, ChainApi};
use crate::sponsor::{CoSignSession, ResourceProvider};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

/// Signs `trx` with every key the signer has
pub(crate) async fn sign_with_available_keys<S: Signer + ?Sized>(
    signer: &S,
    trx: SignedTransaction,
    chain_id: &Checksum256,
) -> Result<SignedTransaction> {
    let keys = signer
        .available_keys()
        .await
        .map_err(|e| Error::signing(Stage::AvailableKeys, e))?;
    signer
        .sign(trx, chain_id, &keys)
        .await
        .map_err(|e| Error::signing(Stage::Sign, e))
}

/// Pushes a packed transaction and returns the hex transaction id
pub(crate) async fn broadcast<C: ChainApi + ?Sized>(
    chain: &C,
    packed: &PackedTransaction,
) -> Result<String> {
    match chain.push_transaction(packed).await {
        Ok(resp) => Ok(resp.processed.id.to_hex()),
        Err(BroadcastError::Rejected(e)) => Err(Error::transport(Stage::Broadcast, e)),
        Err(BroadcastError::Unknown(e)) => {
            warn!(tx_id = %packed.id(), error = %e, "broadcast outcome unknown");
            Err(Error::UnknownOutcome(e))
        }
    }
}

/// Self-signs and broadcasts without a sponsor
pub async fn send_direct<C, S>(
    chain: &C,
    signer: &S,
    trx: Transaction,
    chain_id: &Checksum256,
) -> Result<String>
where
    C: ChainApi + ?Sized,
    S: Signer + ?Sized,
{
    let signed = sign_with_available_keys(signer, SignedTransaction::new(trx), chain_id).await?;
    broadcast(chain, &signed.pack_uncompressed()).await
}

/// Drives one proposal submission
pub struct Orchestrator<'a> {
    config: &'a Config,
    chain: &'a dyn ChainApi,
    signer: &'a dyn Signer,
    sponsor: Option<&'a dyn ResourceProvider>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a Config, chain: &'a dyn ChainApi, signer: &'a dyn Signer) -> Self {
        Self {
            config,
            chain,
            signer,
            sponsor: None,
        }
    }

    /// Routes the final transaction through a fee sponsor
    pub fn with_sponsor(mut self, sponsor: &'a dyn ResourceProvider) -> Self {
        self.sponsor = Some(sponsor);
        self
    }

    /// Builds the outer transaction carrying the proposal, with chain
    /// parameters filled in, and returns it with the chain id
    pub async fn prepare(&self, now: DateTime<Utc>) -> Result<(Transaction, Checksum256)> {
        let accounts = &self.config.hacker_accounts;
        check_account_limit(accounts.len())?;

        let inner = build_migration(accounts, self.config.custodian, now)?;
        let propose = build_proposal(self.chain, inner, self.config.send_account, now).await?;

        let info = self
            .chain
            .get_info()
            .await
            .map_err(|e| Error::transport(Stage::ChainInfo, e))?;
        let header = info
            .tx_header(Duration::seconds(self.config.expire_seconds))
            .map_err(|e| Error::transport(Stage::ChainInfo, e))?;
        debug!(
            chain_id = %info.chain_id,
            ref_block_num = header.ref_block_num,
            expiration = %header.expiration,
            "filled chain params"
        );

        Ok((Transaction::new(vec![propose], header), info.chain_id))
    }

    /// Builds and submits the proposal, returning the transaction id
    pub async fn send_proposal(&self) -> Result<String> {
        let (trx, chain_id) = self.prepare(Utc::now()).await?;

        let tx_id = match self.sponsor {
            Some(sponsor) => {
                CoSignSession::new(sponsor, self.chain, self.signer, chain_id, trx)?
                    .run()
                    .await?
            }
            None => send_direct(self.chain, self.signer, trx, &chain_id).await?,
        };

        info!(tx_id = %tx_id, "send proposal succeeded");
        Ok(tx_id)
    }
}
