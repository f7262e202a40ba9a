//! Error types for proposal construction and submission

use std::fmt;
use thiserror::Error;

/// Top level error returned by every component of the submission pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Too many accounts for a single migration transaction
    #[error("out of account limit -> {limit} (got {count})")]
    LimitExceeded { count: usize, limit: usize },

    /// Producer ranking could not be fetched
    #[error("producer ranking unavailable: {0}")]
    ResolverUnavailable(#[source] TransportError),

    /// Producer ranking came back empty
    #[error("approval quorum is empty")]
    EmptyQuorum,

    /// Proposal assembly failed
    #[error("proposal assembly failed: {0}")]
    Wrapper(String),

    /// Sponsor answered with a non-success code
    #[error("sponsor rejected transaction (code {code}): {message}")]
    SponsorRejected { code: u32, message: String },

    /// Network or serialization failure at a given stage
    #[error("{stage} error: {source}")]
    Transport {
        stage: Stage,
        #[source]
        source: TransportError,
    },

    /// Local key signing failed
    #[error("{stage} error: {source}")]
    Signing {
        stage: Stage,
        #[source]
        source: SigningError,
    },

    /// Broadcast may or may not have been accepted by the node
    #[error("broadcast outcome unknown, the transaction may have been accepted: {0}")]
    UnknownOutcome(#[source] TransportError),

    /// Configuration could not be loaded
    #[error("config error: {0}")]
    Config(String),
}

/// Pipeline stage an error is annotated with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ChainInfo,
    RequestSponsor,
    DecodeSponsorTransaction,
    AvailableKeys,
    Sign,
    Broadcast,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::ChainInfo => "fill chain params",
            Stage::RequestSponsor => "request sponsor tx",
            Stage::DecodeSponsorTransaction => "decode sponsor tx",
            Stage::AvailableKeys => "get pub keys",
            Stage::Sign => "sign tx",
            Stage::Broadcast => "send tx",
        };
        f.write_str(s)
    }
}

impl Error {
    pub(crate) fn transport(stage: Stage, source: impl Into<TransportError>) -> Self {
        Error::Transport {
            stage,
            source: source.into(),
        }
    }

    pub(crate) fn signing(stage: Stage, source: SigningError) -> Self {
        Error::Signing { stage, source }
    }

    /// Stage the failure happened at, when known
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Transport { stage, .. } | Error::Signing { stage, .. } => Some(*stage),
            Error::UnknownOutcome(_) => Some(Stage::Broadcast),
            _ => None,
        }
    }
}

/// Failure talking to the node or the sponsor
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Node answered with an error body
    #[error("node responded {status}: {body}")]
    Node { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Local signing failure
#[derive(Error, Debug)]
pub enum SigningError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("key {0} is not available in the key bag")]
    MissingKey(String),

    #[error("no signing keys available")]
    NoKeys,

    #[error("secp256k1 error: {0}")]
    Secp(#[from] secp256k1::Error),

    #[error("could not produce a canonical signature")]
    NonCanonical,

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Binary or textual encoding failure
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid name {0:?}")]
    InvalidName(String),

    #[error("invalid permission level {0:?}")]
    InvalidPermission(String),

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),

    #[error("varuint32 overflow")]
    VarintOverflow,

    #[error("unsupported key type {0}")]
    UnsupportedKeyType(u8),

    #[error("invalid key or signature string {0:?}")]
    InvalidKeyString(String),

    #[error("invalid timestamp {0:?}")]
    InvalidTime(String),

    #[error("invalid hex: {0}")]
    Hex(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
