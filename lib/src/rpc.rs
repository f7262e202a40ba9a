//! Node RPC collaborator: chain parameters, producer ranking and broadcast

use crate::chain::{Checksum256, PackedTransaction, TimePointSec, TxHeader};
use crate::error::{CodecError, TransportError};
use async_trait::async_trait;
use chrono::Duration;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const GET_INFO: &str = "/v1/chain/get_info";
const GET_PRODUCERS: &str = "/v1/chain/get_producers";
const PUSH_TRANSACTION: &str = "/v1/chain/push_transaction";

#[derive(Debug, Clone, Deserialize)]
pub struct ChainInfo {
    pub chain_id: Checksum256,
    pub head_block_num: u32,
    pub head_block_id: Checksum256,
    pub head_block_time: TimePointSec,
    #[serde(default)]
    pub last_irreversible_block_id: Option<Checksum256>,
}

impl ChainInfo {
    /// Header referencing the head block, expiring `expire_in` after head block time
    pub fn tx_header(&self, expire_in: Duration) -> Result<TxHeader, CodecError> {
        let id = &self.head_block_id.0;
        let block_num = u32::from_be_bytes([id[0], id[1], id[2], id[3]]);
        Ok(TxHeader {
            expiration: self.head_block_time.checked_add(expire_in)?,
            ref_block_num: (block_num & 0xffff) as u16,
            ref_block_prefix: u32::from_le_bytes([id[8], id[9], id[10], id[11]]),
            ..TxHeader::default()
        })
    }
}

/// One row of the vote-ranked producer table
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProducerRow {
    pub owner: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ProducersResponse {
    rows: Vec<ProducerRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Processed {
    pub id: Checksum256,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushResponse {
    #[serde(default)]
    pub transaction_id: String,
    pub processed: Processed,
}

/// Broadcast failure, split by whether the node could have accepted the transaction
#[derive(Error, Debug)]
pub enum BroadcastError {
    /// The transaction was definitely not accepted
    #[error("rejected: {0}")]
    Rejected(#[source] TransportError),

    /// The request may have reached the node but no usable answer came back
    #[error("unknown outcome: {0}")]
    Unknown(#[source] TransportError),
}

#[async_trait]
pub trait ChainApi: Send + Sync {
    async fn get_info(&self) -> Result<ChainInfo, TransportError>;

    /// Producers in upstream ranking order
    async fn get_producers(&self, limit: u32) -> Result<Vec<ProducerRow>, TransportError>;

    async fn push_transaction(
        &self,
        trx: &PackedTransaction,
    ) -> Result<PushResponse, BroadcastError>;
}

/// JSON-over-HTTP node client
#[derive(Clone)]
pub struct RpcClient {
    pub base: String,
    client: Client,
}

impl RpcClient {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, TransportError> {
        let resp = self.client.post(self.url(path)).json(body).send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            return Err(TransportError::Node {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl ChainApi for RpcClient {
    async fn get_info(&self) -> Result<ChainInfo, TransportError> {
        self.post(GET_INFO, &serde_json::json!({})).await
    }

    async fn get_producers(&self, limit: u32) -> Result<Vec<ProducerRow>, TransportError> {
        let body = serde_json::json!({
            "json": true,
            "lower_bound": "",
            "limit": limit,
        });
        let resp: ProducersResponse = self.post(GET_PRODUCERS, &body).await?;
        debug!(count = resp.rows.len(), "fetched producers");
        Ok(resp.rows)
    }

    async fn push_transaction(
        &self,
        trx: &PackedTransaction,
    ) -> Result<PushResponse, BroadcastError> {
        let resp = self
            .client
            .post(self.url(PUSH_TRANSACTION))
            .json(trx)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_builder() {
                    BroadcastError::Rejected(e.into())
                } else {
                    BroadcastError::Unknown(e.into())
                }
            })?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| BroadcastError::Unknown(e.into()))?;

        if !status.is_success() {
            return Err(BroadcastError::Rejected(TransportError::Node {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            }));
        }

        serde_json::from_slice(&bytes).map_err(|e| BroadcastError::Unknown(e.into()))
    }
}
