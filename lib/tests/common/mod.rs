#![allow(dead_code)]

use async_trait::async_trait;
use recover_tool_lib::chain::{
    Action, Checksum256, KeyBag, Name, PackedTransaction, PermissionLevel, PublicKey,
    SignedTransaction, Signer, TimePointSec,
};
use recover_tool_lib::error::{SigningError, TransportError};
use recover_tool_lib::rpc::{BroadcastError, ChainApi, ChainInfo, Processed, ProducerRow, PushResponse};
use recover_tool_lib::sponsor::{ResourceProvider, SponsorRequest, SponsorResponse};
use recover_tool_lib::Config;
use secp256k1::SecretKey;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const CHAIN_ID: &str = "aca376f206b8fc25a6ed44dbdc66547c36c6c33e3a119ffbeaef943642f0e906";
pub const HEAD_BLOCK_ID: &str = "000123452f7e2a6a0a1b2c3d4e5f60718293a4b5c6d7e8f90112233445566778";
pub const SENDER_KEY: &str = "5KQwrPbwdL6PhXujxW37FSSQZ1JiwsST4cqQzDeyXtP79zkvFD3";

pub fn chain_id() -> Checksum256 {
    CHAIN_ID.parse().unwrap()
}

pub fn config(accounts: &[&str]) -> Config {
    let list = accounts
        .iter()
        .map(|a| format!("{:?}", a))
        .collect::<Vec<_>>()
        .join(", ");
    Config::from_toml(&format!(
        r#"
node = "http://127.0.0.1:8888"
send_private_key = "{SENDER_KEY}"
send_account = "sender"
sponsor_endpoint = "http://127.0.0.1:9999"
hacker_accounts = [{list}]
"#
    ))
    .unwrap()
}

/// `n` distinct valid account names
pub fn account_names(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| {
            let hi = (b'a' + (i / 26) as u8) as char;
            let lo = (b'a' + (i % 26) as u8) as char;
            format!("hacker{}{}", hi, lo)
        })
        .collect()
}

pub fn sender_keys() -> KeyBag {
    let mut bag = KeyBag::new();
    bag.import_private_key(SENDER_KEY).unwrap();
    bag
}

pub fn sender_public() -> PublicKey {
    "EOS6MRyAjQq8ud7hVNYcfnVPJqcVpscN5So8BhtHuGYqET5GDW5CV"
        .parse()
        .unwrap()
}

pub enum PushOutcome {
    Accept,
    Reject,
    Unknown,
}

/// Node double recording every call it receives
pub struct FakeChain {
    pub producers: Option<Vec<String>>,
    pub outcome: PushOutcome,
    pub calls: AtomicUsize,
    pub pushed: Mutex<Vec<PackedTransaction>>,
}

impl FakeChain {
    pub fn with_producers(n: usize) -> Self {
        Self {
            producers: Some((0..n).map(|i| format!("producer{}", (b'a' + i as u8) as char)).collect()),
            outcome: PushOutcome::Accept,
            calls: AtomicUsize::new(0),
            pushed: Mutex::new(Vec::new()),
        }
    }

    pub fn outcome(mut self, outcome: PushOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn pushed(&self) -> Vec<PackedTransaction> {
        self.pushed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainApi for FakeChain {
    async fn get_info(&self) -> Result<ChainInfo, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ChainInfo {
            chain_id: chain_id(),
            head_block_num: 0x0001_2345,
            head_block_id: HEAD_BLOCK_ID.parse().unwrap(),
            head_block_time: "2021-12-01T12:00:00".parse::<TimePointSec>().unwrap(),
            last_irreversible_block_id: None,
        })
    }

    async fn get_producers(&self, _limit: u32) -> Result<Vec<ProducerRow>, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.producers {
            Some(owners) => Ok(owners
                .iter()
                .map(|owner| ProducerRow {
                    owner: owner.clone(),
                    url: String::new(),
                })
                .collect()),
            None => Err(TransportError::Malformed("producer table unavailable".to_string())),
        }
    }

    async fn push_transaction(
        &self,
        trx: &PackedTransaction,
    ) -> Result<PushResponse, BroadcastError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pushed.lock().unwrap().push(trx.clone());
        match self.outcome {
            PushOutcome::Accept => Ok(PushResponse {
                transaction_id: trx.id().to_hex(),
                processed: Processed { id: trx.id() },
            }),
            PushOutcome::Reject => Err(BroadcastError::Rejected(TransportError::Node {
                status: 500,
                body: "tx_cpu_usage_exceeded".to_string(),
            })),
            PushOutcome::Unknown => Err(BroadcastError::Unknown(TransportError::Malformed(
                "connection reset".to_string(),
            ))),
        }
    }
}

/// Key bag wrapper counting how often it is asked to enumerate or sign
pub struct CountingSigner {
    pub inner: KeyBag,
    pub available_calls: AtomicUsize,
    pub sign_calls: AtomicUsize,
}

impl CountingSigner {
    pub fn new(inner: KeyBag) -> Self {
        Self {
            inner,
            available_calls: AtomicUsize::new(0),
            sign_calls: AtomicUsize::new(0),
        }
    }

    /// Total `available_keys` plus `sign` calls
    pub fn call_count(&self) -> usize {
        self.available_calls.load(Ordering::SeqCst) + self.sign_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Signer for CountingSigner {
    async fn available_keys(&self) -> Result<Vec<PublicKey>, SigningError> {
        self.available_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.available_keys().await
    }

    async fn sign(
        &self,
        trx: SignedTransaction,
        chain_id: &Checksum256,
        keys: &[PublicKey],
    ) -> Result<SignedTransaction, SigningError> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.sign(trx, chain_id, keys).await
    }
}

pub enum SponsorReply {
    /// Prepends a noop action, signs it and echoes the transaction back
    Cosign,
    /// Signs the candidate as received and echoes it back unchanged
    Echo,
    Reject { code: u32, message: String },
    /// Success code with a `data.request` too short to hold the transaction
    Truncated,
}

/// Resource provider double that co-signs with its own key
pub struct FakeSponsor {
    pub reply: SponsorReply,
    pub keys: KeyBag,
    pub public: PublicKey,
    pub requests: Mutex<Vec<SponsorRequest>>,
}

impl FakeSponsor {
    pub fn new(reply: SponsorReply) -> Self {
        let mut keys = KeyBag::new();
        let public = keys.add(SecretKey::from_slice(&[0x11; 32]).unwrap());
        Self {
            reply,
            keys,
            public,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<SponsorRequest> {
        self.requests.lock().unwrap().clone()
    }
}

pub fn noop_action() -> Action {
    Action {
        account: "greymassnoop".parse::<Name>().unwrap(),
        name: "noop".parse::<Name>().unwrap(),
        authorization: vec!["greymassfuel@cosign".parse::<PermissionLevel>().unwrap()],
        data: Vec::new(),
    }
}

#[async_trait]
impl ResourceProvider for FakeSponsor {
    async fn request_transaction(
        &self,
        request: &SponsorRequest,
    ) -> Result<SponsorResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());

        match &self.reply {
            SponsorReply::Reject { code, message } => Ok(SponsorResponse {
                code: *code,
                message: message.clone(),
                data: serde_json::json!({"error": message}),
            }),
            SponsorReply::Truncated => Ok(SponsorResponse {
                code: 200,
                message: String::new(),
                data: serde_json::json!({"request": ["transaction"], "signatures": []}),
            }),
            SponsorReply::Cosign | SponsorReply::Echo => {
                let mut trx = request.transaction.clone();
                if matches!(self.reply, SponsorReply::Cosign) {
                    trx.actions.insert(0, noop_action());
                }

                let keys = self.keys.available_keys().await.unwrap();
                let signed = self
                    .keys
                    .sign(SignedTransaction::new(trx), &chain_id(), &keys)
                    .await
                    .unwrap();

                let signatures = signed.signatures.clone();

                // echoed with its signatures attached, as the live service does
                Ok(SponsorResponse {
                    code: 200,
                    message: String::new(),
                    data: serde_json::json!({
                        "request": ["transaction", signed],
                        "signatures": signatures,
                        "version": "2",
                    }),
                })
            }
        }
    }
}
