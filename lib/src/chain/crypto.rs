//! secp256k1 keys, signatures and the local key bag signer

use super::codec::{Pack, Reader, Unpack};
use super::types::{Checksum256, SignedTransaction};
use crate::error::{CodecError, SigningError};
use async_trait::async_trait;
use ripemd::Ripemd160;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{All, Message, Secp256k1, SecretKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

const KEY_TYPE_K1: u8 = 0;
const LEGACY_PUBLIC_PREFIX: &str = "EOS";
const PUBLIC_K1_PREFIX: &str = "PUB_K1_";
const PRIVATE_K1_PREFIX: &str = "PVT_K1_";
const SIGNATURE_K1_PREFIX: &str = "SIG_K1_";
const WIF_VERSION: u8 = 0x80;

/// Attempts before giving up on finding a canonical signature
const MAX_CANONICAL_ATTEMPTS: u32 = 1024;

fn ripemd_checksum(data: &[u8], suffix: &[u8]) -> [u8; 4] {
    let mut hasher = Ripemd160::new();
    hasher.update(data);
    hasher.update(suffix);
    let digest = hasher.finalize();
    [digest[0], digest[1], digest[2], digest[3]]
}

fn double_sha_checksum(data: &[u8]) -> [u8; 4] {
    let digest = Sha256::digest(Sha256::digest(data));
    [digest[0], digest[1], digest[2], digest[3]]
}

/// Decodes `base58(payload ++ checksum)` and verifies the checksum
fn decode_checked<const N: usize>(
    encoded: &str,
    original: &str,
    checksum: impl Fn(&[u8]) -> [u8; 4],
) -> Result<[u8; N], CodecError> {
    let invalid = || CodecError::InvalidKeyString(original.to_string());
    let raw = bs58::decode(encoded).into_vec().map_err(|_| invalid())?;
    if raw.len() != N + 4 {
        return Err(invalid());
    }
    let (payload, check) = raw.split_at(N);
    if checksum(payload) != check {
        return Err(invalid());
    }
    let mut out = [0u8; N];
    out.copy_from_slice(payload);
    Ok(out)
}

fn encode_checked(payload: &[u8], checksum: [u8; 4]) -> String {
    let mut raw = payload.to_vec();
    raw.extend_from_slice(&checksum);
    bs58::encode(raw).into_string()
}

/// Compressed K1 public key
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; 33]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; 33]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 33] {
        &self.0
    }
}

impl FromStr for PublicKey {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix(PUBLIC_K1_PREFIX) {
            decode_checked(rest, s, |p| ripemd_checksum(p, b"K1")).map(Self)
        } else if let Some(rest) = s.strip_prefix(LEGACY_PUBLIC_PREFIX) {
            decode_checked(rest, s, |p| ripemd_checksum(p, b"")).map(Self)
        } else {
            Err(CodecError::InvalidKeyString(s.to_string()))
        }
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            LEGACY_PUBLIC_PREFIX,
            encode_checked(&self.0, ripemd_checksum(&self.0, b""))
        )
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self)
    }
}

impl Pack for PublicKey {
    fn pack(&self, out: &mut Vec<u8>) {
        out.push(KEY_TYPE_K1);
        out.extend_from_slice(&self.0);
    }
}

impl Unpack for PublicKey {
    fn unpack(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        match u8::unpack(reader)? {
            KEY_TYPE_K1 => Ok(Self(reader.take_array()?)),
            other => Err(CodecError::UnsupportedKeyType(other)),
        }
    }
}

/// Compact recoverable K1 signature: header byte followed by r and s
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; 65]);

impl Signature {
    pub fn from_bytes(bytes: [u8; 65]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }

    /// Canonical form required by the node: neither r nor s may look negative
    /// or carry a redundant leading zero
    pub fn is_canonical(&self) -> bool {
        let c = &self.0;
        (c[1] & 0x80) == 0
            && !(c[1] == 0 && (c[2] & 0x80) == 0)
            && (c[33] & 0x80) == 0
            && !(c[33] == 0 && (c[34] & 0x80) == 0)
    }

    /// Recovers the public key that produced this signature over `digest`
    pub fn recover(&self, digest: &Checksum256) -> Result<PublicKey, SigningError> {
        let header = i32::from(self.0[0]) - 27 - 4;
        let recid = RecoveryId::try_from(header)?;
        let sig = RecoverableSignature::from_compact(&self.0[1..], recid)?;
        let msg = Message::from_digest(digest.0);
        let key = Secp256k1::verification_only().recover_ecdsa(&msg, &sig)?;
        Ok(PublicKey(key.serialize()))
    }
}

impl FromStr for Signature {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(SIGNATURE_K1_PREFIX)
            .ok_or_else(|| CodecError::InvalidKeyString(s.to_string()))?;
        decode_checked(rest, s, |p| ripemd_checksum(p, b"K1")).map(Self)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            SIGNATURE_K1_PREFIX,
            encode_checked(&self.0, ripemd_checksum(&self.0, b"K1"))
        )
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self)
    }
}

impl Pack for Signature {
    fn pack(&self, out: &mut Vec<u8>) {
        out.push(KEY_TYPE_K1);
        out.extend_from_slice(&self.0);
    }
}

impl Unpack for Signature {
    fn unpack(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        match u8::unpack(reader)? {
            KEY_TYPE_K1 => Ok(Self(reader.take_array()?)),
            other => Err(CodecError::UnsupportedKeyType(other)),
        }
    }
}

macro_rules! string_serde {
    ($($t:ty),*) => {$(
        impl Serialize for $t {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $t {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    )*};
}

string_serde!(PublicKey, Signature);

/// Parses a private key in legacy WIF or `PVT_K1_` form
pub fn parse_private_key(s: &str) -> Result<SecretKey, SigningError> {
    let bytes: [u8; 32] = if let Some(rest) = s.strip_prefix(PRIVATE_K1_PREFIX) {
        decode_checked(rest, s, |p| ripemd_checksum(p, b"K1"))?
    } else {
        let versioned: [u8; 33] = decode_checked(s, s, double_sha_checksum)?;
        if versioned[0] != WIF_VERSION {
            return Err(SigningError::InvalidKey("unexpected WIF version".to_string()));
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&versioned[1..]);
        out
    };
    Ok(SecretKey::from_slice(&bytes)?)
}

/// Local signing collaborator
#[async_trait]
pub trait Signer: Send + Sync {
    /// Public keys this signer can sign with
    async fn available_keys(&self) -> Result<Vec<PublicKey>, SigningError>;

    /// Appends one signature per requested key over the transaction's signing digest
    async fn sign(
        &self,
        trx: SignedTransaction,
        chain_id: &Checksum256,
        keys: &[PublicKey],
    ) -> Result<SignedTransaction, SigningError>;
}

/// In-memory set of imported private keys
pub struct KeyBag {
    secp: Secp256k1<All>,
    keys: Vec<(PublicKey, SecretKey)>,
}

impl Default for KeyBag {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyBag {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
            keys: Vec::new(),
        }
    }

    /// Imports a WIF or `PVT_K1_` private key and returns its public key
    pub fn import_private_key(&mut self, encoded: &str) -> Result<PublicKey, SigningError> {
        let secret = parse_private_key(encoded)?;
        Ok(self.add(secret))
    }

    pub fn add(&mut self, secret: SecretKey) -> PublicKey {
        let public = PublicKey(secret.public_key(&self.secp).serialize());
        if !self.keys.iter().any(|(k, _)| *k == public) {
            self.keys.push((public, secret));
        }
        public
    }

    fn sign_digest(
        &self,
        secret: &SecretKey,
        digest: &Checksum256,
    ) -> Result<Signature, SigningError> {
        let msg = Message::from_digest(digest.0);
        for attempt in 0..MAX_CANONICAL_ATTEMPTS {
            let sig = if attempt == 0 {
                self.secp.sign_ecdsa_recoverable(&msg, secret)
            } else {
                let mut nonce = [0u8; 32];
                nonce[..4].copy_from_slice(&attempt.to_le_bytes());
                self.secp
                    .sign_ecdsa_recoverable_with_noncedata(&msg, secret, &nonce)
            };
            let (recid, compact) = sig.serialize_compact();

            let mut bytes = [0u8; 65];
            bytes[0] = 27 + 4 + i32::from(recid) as u8;
            bytes[1..].copy_from_slice(&compact);

            let signature = Signature(bytes);
            if signature.is_canonical() {
                return Ok(signature);
            }
        }
        Err(SigningError::NonCanonical)
    }
}

#[async_trait]
impl Signer for KeyBag {
    async fn available_keys(&self) -> Result<Vec<PublicKey>, SigningError> {
        Ok(self.keys.iter().map(|(k, _)| *k).collect())
    }

    async fn sign(
        &self,
        mut trx: SignedTransaction,
        chain_id: &Checksum256,
        keys: &[PublicKey],
    ) -> Result<SignedTransaction, SigningError> {
        if keys.is_empty() {
            return Err(SigningError::NoKeys);
        }

        let digest = trx.signing_digest(chain_id);
        for key in keys {
            let (_, secret) = self
                .keys
                .iter()
                .find(|(k, _)| k == key)
                .ok_or_else(|| SigningError::MissingKey(key.to_string()))?;
            trx.signatures.push(self.sign_digest(secret, &digest)?);
        }
        Ok(trx)
    }
}
