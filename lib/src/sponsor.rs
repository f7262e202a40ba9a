//! Sponsor co-signing
//!
//! A resource provider receives the candidate transaction and answers with
//! its own version of it (usually prefixed with a fee-paying action) plus its
//! signatures. That version is what gets signed locally; the broadcast
//! transaction carries the sponsor's signatures followed by the local ones.

use crate::chain::{Checksum256, PermissionLevel, Signature, SignedTransaction, Signer, Transaction};
use crate::constants::{SPONSOR_REQUEST_PATH, SPONSOR_SUCCESS_CODE, SPONSOR_TRANSACTION_INDEX};
use crate::error::{Error, Result, Stage, TransportError};
use crate::rpc::ChainApi;
use crate::submit::{broadcast, sign_with_available_keys};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/96.0.4664.55 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SponsorRequest {
    pub signer: PermissionLevel,
    pub transaction: Transaction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SponsorResponse {
    pub code: u32,
    #[serde(default)]
    pub message: String,
    /// Shape depends on `code`; decoded as [`SponsorData`] only on success
    #[serde(default)]
    pub data: JsonValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SponsorData {
    pub request: Vec<JsonValue>,
    #[serde(default)]
    pub signatures: Vec<Signature>,
    #[serde(default)]
    pub version: String,
}

/// Fee sponsoring service
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    async fn request_transaction(
        &self,
        request: &SponsorRequest,
    ) -> std::result::Result<SponsorResponse, TransportError>;
}

/// HTTP resource provider client
#[derive(Clone)]
pub struct SponsorClient {
    pub host: String,
    client: Client,
}

impl SponsorClient {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert("sec-ch-ua-platform", HeaderValue::from_static("macOS"));
        headers.insert("sec-fetch-mode", HeaderValue::from_static("cors"));
        headers.insert("sec-fetch-site", HeaderValue::from_static("same-site"));
        headers
    }
}

#[async_trait]
impl ResourceProvider for SponsorClient {
    async fn request_transaction(
        &self,
        request: &SponsorRequest,
    ) -> std::result::Result<SponsorResponse, TransportError> {
        let url = format!("{}{}", self.host, SPONSOR_REQUEST_PATH);
        // the status line is not meaningful here, `code` in the body is
        let body = self
            .client
            .post(url)
            .headers(Self::headers())
            .body(serde_json::to_vec(request)?)
            .send()
            .await?
            .bytes()
            .await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// State of one sponsored submission
pub struct CoSignSession<'a, P: ?Sized, C: ?Sized, S: ?Sized> {
    provider: &'a P,
    chain: &'a C,
    signer: &'a S,
    chain_id: Checksum256,
    authorizer: PermissionLevel,
    transaction: Transaction,
    sponsored: Option<SignedTransaction>,
    sponsor_signatures: Vec<Signature>,
    merged: Option<SignedTransaction>,
}

impl<'a, P, C, S> CoSignSession<'a, P, C, S>
where
    P: ResourceProvider + ?Sized,
    C: ChainApi + ?Sized,
    S: Signer + ?Sized,
{
    /// Starts a session; the first authorizer of the first action is the one
    /// the sponsor signs for
    pub fn new(
        provider: &'a P,
        chain: &'a C,
        signer: &'a S,
        chain_id: Checksum256,
        transaction: Transaction,
    ) -> Result<Self> {
        let authorizer = transaction
            .actions
            .first()
            .and_then(|a| a.authorization.first())
            .copied()
            .ok_or_else(|| {
                Error::transport(
                    Stage::RequestSponsor,
                    TransportError::Malformed("transaction has no authorizer".to_string()),
                )
            })?;

        Ok(Self {
            provider,
            chain,
            signer,
            chain_id,
            authorizer,
            transaction,
            sponsored: None,
            sponsor_signatures: Vec::new(),
            merged: None,
        })
    }

    pub fn authorizer(&self) -> PermissionLevel {
        self.authorizer
    }

    /// Sponsor's version of the transaction, once requested
    pub fn sponsored(&self) -> Option<&SignedTransaction> {
        self.sponsored.as_ref()
    }

    pub fn merged(&self) -> Option<&SignedTransaction> {
        self.merged.as_ref()
    }

    /// Sponsor signatures received so far
    pub fn sponsor_signatures(&self) -> &[Signature] {
        &self.sponsor_signatures
    }

    /// Runs the whole protocol: request, co-sign, broadcast
    ///
    /// Any failing step aborts the session; nothing is broadcast before the
    /// merged transaction is complete.
    pub async fn run(&mut self) -> Result<String> {
        let sponsored = self.request().await?;
        let merged = self.cosign(sponsored).await?;
        self.submit(&merged).await
    }

    async fn request(&mut self) -> Result<SignedTransaction> {
        let request = SponsorRequest {
            signer: self.authorizer,
            transaction: self.transaction.clone(),
        };
        debug!(signer = %self.authorizer, "requesting sponsored transaction");

        let resp = self
            .provider
            .request_transaction(&request)
            .await
            .map_err(|e| Error::transport(Stage::RequestSponsor, e))?;

        if resp.code != SPONSOR_SUCCESS_CODE {
            return Err(Error::SponsorRejected {
                code: resp.code,
                message: resp.message,
            });
        }

        let data: SponsorData = serde_json::from_value(resp.data)
            .map_err(|e| Error::transport(Stage::DecodeSponsorTransaction, e))?;
        let echoed = data.request.get(SPONSOR_TRANSACTION_INDEX).ok_or_else(|| {
            Error::transport(
                Stage::DecodeSponsorTransaction,
                TransportError::Malformed(format!(
                    "data.request has {} entries, need index {}",
                    data.request.len(),
                    SPONSOR_TRANSACTION_INDEX
                )),
            )
        })?;

        let raw = serde_json::to_vec(echoed)
            .map_err(|e| Error::transport(Stage::DecodeSponsorTransaction, e))?;
        let sponsored: SignedTransaction = serde_json::from_slice(&raw)
            .map_err(|e| Error::transport(Stage::DecodeSponsorTransaction, e))?;

        debug!(
            version = %data.version,
            actions = sponsored.transaction.actions.len(),
            signatures = data.signatures.len(),
            "sponsor accepted transaction"
        );
        self.sponsored = Some(sponsored.clone());
        self.sponsor_signatures = data.signatures;
        Ok(sponsored)
    }

    /// Signs the sponsor's transaction, not the original candidate
    async fn cosign(&mut self, sponsored: SignedTransaction) -> Result<SignedTransaction> {
        let unsigned = SignedTransaction {
            signatures: Vec::new(),
            ..sponsored
        };
        let local = sign_with_available_keys(self.signer, unsigned, &self.chain_id).await?;

        let mut signatures = self.sponsor_signatures.clone();
        signatures.extend(local.signatures.iter().copied());
        debug!(
            sponsor = self.sponsor_signatures.len(),
            local = local.signatures.len(),
            "merged signatures"
        );

        let merged = SignedTransaction {
            signatures,
            ..local
        };
        self.merged = Some(merged.clone());
        Ok(merged)
    }

    async fn submit(&self, merged: &SignedTransaction) -> Result<String> {
        let packed = merged.pack_uncompressed();
        let id = broadcast(self.chain, &packed).await?;
        info!(tx_id = %id, "sponsored transaction accepted");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let request = SponsorRequest {
            signer: "sender@active".parse().unwrap(),
            transaction: Transaction::default(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["signer"]["actor"], "sender");
        assert_eq!(json["signer"]["permission"], "active");
        assert_eq!(json["transaction"]["expiration"], "1970-01-01T00:00:00");
        assert!(json["transaction"]["actions"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_rejection_body_decodes_without_data() {
        let resp: SponsorResponse = serde_json::from_str(
            r#"{"code": 400, "message": "Request too large", "data": {"error": "nope"}}"#,
        )
        .unwrap();
        assert_eq!(resp.code, 400);
        assert_eq!(resp.message, "Request too large");

        let bare: SponsorResponse = serde_json::from_str(r#"{"code": 500}"#).unwrap();
        assert!(bare.data.is_null());
    }

    #[test]
    fn test_success_data_shape() {
        let data: SponsorData = serde_json::from_value(serde_json::json!({
            "request": ["transaction", {"expiration": "2021-12-01T12:00:00", "actions": []}],
            "signatures": [],
            "version": "1.0"
        }))
        .unwrap();
        assert_eq!(data.request.len(), 2);

        let trx: SignedTransaction =
            serde_json::from_value(data.request[SPONSOR_TRANSACTION_INDEX].clone()).unwrap();
        assert!(trx.signatures.is_empty());
        assert_eq!(trx.transaction.header.expiration.to_string(), "2021-12-01T12:00:00");
    }

    #[test]
    fn test_headers() {
        let headers = SponsorClient::headers();
        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert_eq!(headers["sec-fetch-mode"], "cors");
        assert!(headers[USER_AGENT].to_str().unwrap().starts_with("Mozilla/5.0"));
    }
}
