use super::codec::{hex_bytes, hex_bytes_vec, Pack, Reader, Unpack, VarUint32};
use super::crypto::{PublicKey, Signature};
use super::name::Name;
use crate::error::CodecError;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Permission used when a permission level is written without `@permission`
pub const DEFAULT_PERMISSION: &str = "active";

/// 32-byte digest: chain ids, block ids and transaction ids
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Checksum256(pub [u8; 32]);

impl Checksum256 {
    pub fn hash(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Checksum256 {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| CodecError::Hex(e.to_string()))?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CodecError::Hex(format!("expected 32 bytes in {s:?}")))?;
        Ok(Self(array))
    }
}

impl fmt::Display for Checksum256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Checksum256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum256({})", self)
    }
}

impl Serialize for Checksum256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Checksum256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

/// Seconds since the unix epoch, rendered as `YYYY-MM-DDTHH:MM:SS`
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Debug)]
pub struct TimePointSec(pub u32);

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

impl TimePointSec {
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp().clamp(0, i64::from(u32::MAX)) as u32)
    }

    pub fn to_datetime(self) -> DateTime<Utc> {
        DateTime::from_timestamp(i64::from(self.0), 0).unwrap_or_default()
    }

    /// `self + duration`, or an error when the result leaves the u32 range
    pub fn checked_add(self, duration: Duration) -> Result<Self, CodecError> {
        i64::from(self.0)
            .checked_add(duration.num_seconds())
            .and_then(|secs| u32::try_from(secs).ok())
            .map(Self)
            .ok_or_else(|| CodecError::InvalidTime(format!("{} + {}s", self, duration.num_seconds())))
    }
}

impl FromStr for TimePointSec {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim_end_matches('Z');
        let naive = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
            .map_err(|_| CodecError::InvalidTime(s.to_string()))?;
        Ok(Self::from_datetime(naive.and_utc()))
    }
}

impl fmt::Display for TimePointSec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_datetime().format(TIME_FORMAT))
    }
}

impl Serialize for TimePointSec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimePointSec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

/// (actor, permission) pair authorizing an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionLevel {
    pub actor: Name,
    pub permission: Name,
}

impl PermissionLevel {
    pub fn new(actor: Name, permission: Name) -> Self {
        Self { actor, permission }
    }
}

impl FromStr for PermissionLevel {
    type Err = CodecError;

    /// Parses `actor@permission`; a bare `actor` means `actor@active`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (actor, permission) = match s.split_once('@') {
            Some((actor, permission)) => (actor, permission),
            None => (s, DEFAULT_PERMISSION),
        };
        if actor.is_empty() || permission.is_empty() || permission.contains('@') {
            return Err(CodecError::InvalidPermission(s.to_string()));
        }
        Ok(Self {
            actor: actor.parse()?,
            permission: permission.parse()?,
        })
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.actor, self.permission)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyWeight {
    pub key: PublicKey,
    pub weight: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionLevelWeight {
    pub permission: PermissionLevel,
    pub weight: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitWeight {
    pub wait_sec: u32,
    pub weight: u16,
}

/// Weighted threshold rule governing a permission
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Authority {
    pub threshold: u32,
    #[serde(default)]
    pub keys: Vec<KeyWeight>,
    #[serde(default)]
    pub accounts: Vec<PermissionLevelWeight>,
    #[serde(default)]
    pub waits: Vec<WaitWeight>,
}

impl Authority {
    /// Authority fully delegated to a single account permission
    pub fn single_account(permission: PermissionLevel) -> Self {
        Self {
            threshold: 1,
            keys: Vec::new(),
            accounts: vec![PermissionLevelWeight {
                permission,
                weight: 1,
            }],
            waits: Vec::new(),
        }
    }

    /// True when the weights can add up to the threshold
    pub fn is_satisfiable(&self) -> bool {
        let total: u64 = self
            .keys
            .iter()
            .map(|k| u64::from(k.weight))
            .chain(self.accounts.iter().map(|a| u64::from(a.weight)))
            .chain(self.waits.iter().map(|w| u64::from(w.weight)))
            .sum();
        self.threshold > 0 && total >= u64::from(self.threshold)
    }
}

/// A single contract invocation with opaque packed payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawAction")]
pub struct Action {
    pub account: Name,
    pub name: Name,
    pub authorization: Vec<PermissionLevel>,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

impl Action {
    pub fn new(
        account: Name,
        name: Name,
        authorization: Vec<PermissionLevel>,
        payload: &impl Pack,
    ) -> Self {
        Self {
            account,
            name,
            authorization,
            data: payload.to_bytes(),
        }
    }

    /// Decodes the payload as `T`
    pub fn decode_data<T: Unpack>(&self) -> Result<T, CodecError> {
        T::from_bytes(&self.data)
    }
}

/// Wire shape accepted for actions: `data` must be hex unless `hex_data` is present
#[derive(Deserialize)]
struct RawAction {
    account: Name,
    name: Name,
    #[serde(default)]
    authorization: Vec<PermissionLevel>,
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    hex_data: Option<String>,
}

impl TryFrom<RawAction> for Action {
    type Error = CodecError;

    fn try_from(raw: RawAction) -> Result<Self, Self::Error> {
        let hex_str = match (raw.hex_data, raw.data) {
            (Some(hex_data), _) => hex_data,
            (None, Some(serde_json::Value::String(s))) => s,
            (None, None) => String::new(),
            (None, Some(other)) => {
                return Err(CodecError::Hex(format!(
                    "action {}::{} carries unpacked data {}",
                    raw.account, raw.name, other
                )))
            }
        };
        let data = hex::decode(&hex_str).map_err(|e| CodecError::Hex(e.to_string()))?;
        Ok(Self {
            account: raw.account,
            name: raw.name,
            authorization: raw.authorization,
            data,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extension(pub u16, #[serde(with = "hex_bytes")] pub Vec<u8>);

/// Transaction header: expiration and TaPoS reference block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TxHeader {
    pub expiration: TimePointSec,
    #[serde(default)]
    pub ref_block_num: u16,
    #[serde(default)]
    pub ref_block_prefix: u32,
    #[serde(default)]
    pub max_net_usage_words: u32,
    #[serde(default)]
    pub max_cpu_usage_ms: u8,
    #[serde(default)]
    pub delay_sec: u32,
}

impl TxHeader {
    /// Header with no reference block, expiring `lifetime` after `now`
    pub fn expiring(now: DateTime<Utc>, lifetime: Duration) -> Self {
        Self {
            expiration: TimePointSec::from_datetime(now + lifetime),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(flatten)]
    pub header: TxHeader,
    #[serde(default)]
    pub context_free_actions: Vec<Action>,
    pub actions: Vec<Action>,
    #[serde(default)]
    pub transaction_extensions: Vec<Extension>,
}

impl Transaction {
    pub fn new(actions: Vec<Action>, header: TxHeader) -> Self {
        Self {
            header,
            actions,
            ..Self::default()
        }
    }

    /// Transaction id: sha256 of the packed transaction
    pub fn id(&self) -> Checksum256 {
        Checksum256::hash(&self.to_bytes())
    }
}

/// Transaction with an append-only signature list
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignedTransaction {
    #[serde(flatten)]
    pub transaction: Transaction,
    #[serde(default)]
    pub signatures: Vec<Signature>,
    #[serde(default, with = "hex_bytes_vec")]
    pub context_free_data: Vec<Vec<u8>>,
}

impl SignedTransaction {
    pub fn new(transaction: Transaction) -> Self {
        Self {
            transaction,
            ..Self::default()
        }
    }

    fn packed_context_free_data(&self) -> Vec<u8> {
        if self.context_free_data.is_empty() {
            Vec::new()
        } else {
            self.context_free_data.to_bytes()
        }
    }

    /// sha256(chain_id ++ packed trx ++ context free data digest)
    pub fn signing_digest(&self, chain_id: &Checksum256) -> Checksum256 {
        let cfd = self.packed_context_free_data();
        let cfd_digest = if cfd.is_empty() {
            [0u8; 32]
        } else {
            Checksum256::hash(&cfd).0
        };

        let mut hasher = Sha256::new();
        hasher.update(chain_id.0);
        hasher.update(self.transaction.to_bytes());
        hasher.update(cfd_digest);
        Checksum256(hasher.finalize().into())
    }

    /// Packs without compression for `push_transaction`
    pub fn pack_uncompressed(&self) -> PackedTransaction {
        PackedTransaction {
            signatures: self.signatures.clone(),
            compression: Compression::None,
            packed_context_free_data: self.packed_context_free_data(),
            packed_trx: self.transaction.to_bytes(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
}

/// Wire form accepted by `push_transaction`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedTransaction {
    pub signatures: Vec<Signature>,
    pub compression: Compression,
    #[serde(with = "hex_bytes")]
    pub packed_context_free_data: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub packed_trx: Vec<u8>,
}

impl PackedTransaction {
    pub fn id(&self) -> Checksum256 {
        Checksum256::hash(&self.packed_trx)
    }

    pub fn unpack(&self) -> Result<SignedTransaction, CodecError> {
        let context_free_data = if self.packed_context_free_data.is_empty() {
            Vec::new()
        } else {
            Vec::<Vec<u8>>::from_bytes(&self.packed_context_free_data)?
        };
        Ok(SignedTransaction {
            transaction: Transaction::from_bytes(&self.packed_trx)?,
            signatures: self.signatures.clone(),
            context_free_data,
        })
    }
}

// ---- binary layout ----

impl Pack for Name {
    fn pack(&self, out: &mut Vec<u8>) {
        self.raw().pack(out)
    }
}

impl Unpack for Name {
    fn unpack(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Name::from_raw(u64::unpack(reader)?))
    }
}

impl Pack for Checksum256 {
    fn pack(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0)
    }
}

impl Unpack for Checksum256 {
    fn unpack(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self(reader.take_array()?))
    }
}

impl Pack for TimePointSec {
    fn pack(&self, out: &mut Vec<u8>) {
        self.0.pack(out)
    }
}

impl Unpack for TimePointSec {
    fn unpack(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self(u32::unpack(reader)?))
    }
}

/// Implements `Pack`/`Unpack` for a struct by packing its fields in order
macro_rules! packed_struct {
    ($t:ident { $($field:ident),* $(,)? }) => {
        impl $crate::chain::codec::Pack for $t {
            fn pack(&self, out: &mut ::std::vec::Vec<u8>) {
                $($crate::chain::codec::Pack::pack(&self.$field, out);)*
            }
        }

        impl $crate::chain::codec::Unpack for $t {
            fn unpack(
                reader: &mut $crate::chain::codec::Reader<'_>,
            ) -> ::std::result::Result<Self, $crate::error::CodecError> {
                ::std::result::Result::Ok(Self {
                    $($field: $crate::chain::codec::Unpack::unpack(reader)?,)*
                })
            }
        }
    };
}
pub(crate) use packed_struct;

packed_struct!(PermissionLevel { actor, permission });
packed_struct!(KeyWeight { key, weight });
packed_struct!(PermissionLevelWeight { permission, weight });
packed_struct!(WaitWeight { wait_sec, weight });
packed_struct!(Authority { threshold, keys, accounts, waits });
packed_struct!(Action { account, name, authorization, data });
packed_struct!(Transaction { header, context_free_actions, actions, transaction_extensions });
packed_struct!(SignedTransaction { transaction, signatures, context_free_data });

impl Pack for Extension {
    fn pack(&self, out: &mut Vec<u8>) {
        self.0.pack(out);
        self.1.pack(out);
    }
}

impl Unpack for Extension {
    fn unpack(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self(u16::unpack(reader)?, Vec::<u8>::unpack(reader)?))
    }
}

impl Pack for TxHeader {
    fn pack(&self, out: &mut Vec<u8>) {
        self.expiration.pack(out);
        self.ref_block_num.pack(out);
        self.ref_block_prefix.pack(out);
        VarUint32(self.max_net_usage_words).pack(out);
        self.max_cpu_usage_ms.pack(out);
        VarUint32(self.delay_sec).pack(out);
    }
}

impl Unpack for TxHeader {
    fn unpack(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            expiration: TimePointSec::unpack(reader)?,
            ref_block_num: u16::unpack(reader)?,
            ref_block_prefix: u32::unpack(reader)?,
            max_net_usage_words: VarUint32::unpack(reader)?.0,
            max_cpu_usage_ms: u8::unpack(reader)?,
            delay_sec: VarUint32::unpack(reader)?.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(s: &str) -> PermissionLevel {
        s.parse().unwrap()
    }

    fn sample_transaction() -> Transaction {
        let header = TxHeader {
            expiration: "2021-12-01T12:00:00".parse().unwrap(),
            ref_block_num: 0x1234,
            ref_block_prefix: 0xdeadbeef,
            ..TxHeader::default()
        };
        let action = Action {
            account: "eosio.token".parse().unwrap(),
            name: "transfer".parse().unwrap(),
            authorization: vec![level("alice@active"), level("bob")],
            data: vec![1, 2, 3],
        };
        Transaction::new(vec![action], header)
    }

    #[test]
    fn test_permission_level_parsing() {
        let p = level("eosio.wrap@active");
        assert_eq!(p.actor.to_string(), "eosio.wrap");
        assert_eq!(p.permission.to_string(), "active");
        assert_eq!(level("bp1"), level("bp1@active"));
        assert_eq!(p.to_string(), "eosio.wrap@active");

        assert!("@active".parse::<PermissionLevel>().is_err());
        assert!("eosio@".parse::<PermissionLevel>().is_err());
        assert!("eosio@active@owner".parse::<PermissionLevel>().is_err());
        assert!("EOSIO@active".parse::<PermissionLevel>().is_err());
    }

    #[test]
    fn test_time_point_formats() {
        let t: TimePointSec = "2021-12-01T12:00:00".parse().unwrap();
        assert_eq!(t.0, 1_638_360_000);
        assert_eq!(t.to_string(), "2021-12-01T12:00:00");
        assert_eq!("2021-12-01T12:00:00.500".parse::<TimePointSec>().unwrap(), t);
        assert_eq!("2021-12-01T12:00:00Z".parse::<TimePointSec>().unwrap(), t);
        assert!("yesterday".parse::<TimePointSec>().is_err());
    }

    #[test]
    fn test_time_point_checked_add() {
        let t: TimePointSec = "2021-12-01T12:00:00".parse().unwrap();
        assert_eq!(
            t.checked_add(Duration::seconds(30)).unwrap().to_string(),
            "2021-12-01T12:00:30"
        );
        assert!(matches!(
            t.checked_add(Duration::seconds(1_000_000_000_000)),
            Err(CodecError::InvalidTime(_))
        ));
        assert!(TimePointSec(0).checked_add(Duration::seconds(-1)).is_err());
    }

    mod packed_in_foreign_scope {
        // a single-parameter Result alias in scope must not leak into the expansion
        use crate::chain::types::packed_struct;
        use crate::chain::{Name, Unpack};
        use crate::error::Result;

        #[derive(Debug, PartialEq)]
        struct Pair {
            left: Name,
            right: u32,
        }

        packed_struct!(Pair { left, right });

        fn decode(bytes: &[u8]) -> Result<Pair> {
            Pair::from_bytes(bytes).map_err(|e| crate::error::Error::Wrapper(e.to_string()))
        }

        #[test]
        fn test_macro_uses_qualified_paths() {
            use crate::chain::Pack;
            let pair = Pair {
                left: Name::constant("eosio"),
                right: 7,
            };
            let bytes = pair.to_bytes();
            assert_eq!(bytes.len(), 12);
            assert_eq!(decode(&bytes).unwrap(), pair);
        }
    }

    #[test]
    fn test_header_layout() {
        let header = sample_transaction().header;
        let bytes = header.to_bytes();
        // u32 expiration, u16 ref num, u32 prefix, three single-byte zero fields
        assert_eq!(bytes.len(), 4 + 2 + 4 + 1 + 1 + 1);
        assert_eq!(&bytes[4..6], &[0x34, 0x12]);
        assert_eq!(&bytes[6..10], &[0xef, 0xbe, 0xad, 0xde]);
        assert_eq!(TxHeader::from_bytes(&bytes).unwrap(), header);
    }

    #[test]
    fn test_action_layout_preserves_authorizer_order() {
        let trx = sample_transaction();
        let decoded = Transaction::from_bytes(&trx.to_bytes()).unwrap();
        assert_eq!(decoded, trx);
        assert_eq!(
            decoded.actions[0].authorization,
            vec![level("alice@active"), level("bob@active")]
        );
    }

    #[test]
    fn test_transaction_json_shape() {
        let trx = sample_transaction();
        let json = serde_json::to_value(&trx).unwrap();

        assert_eq!(json["expiration"], "2021-12-01T12:00:00");
        assert_eq!(json["ref_block_num"], 0x1234);
        assert_eq!(json["actions"][0]["data"], "010203");
        assert_eq!(json["actions"][0]["authorization"][1]["actor"], "bob");

        let back: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(back, trx);
    }

    #[test]
    fn test_action_accepts_hex_data_field() {
        let json = serde_json::json!({
            "account": "eosio",
            "name": "noop",
            "authorization": [],
            "data": {"memo": "decoded"},
            "hex_data": "ff00"
        });
        let action: Action = serde_json::from_value(json).unwrap();
        assert_eq!(action.data, vec![0xff, 0x00]);

        let unpacked = serde_json::json!({
            "account": "eosio",
            "name": "noop",
            "authorization": [],
            "data": {"memo": "decoded"}
        });
        assert!(serde_json::from_value::<Action>(unpacked).is_err());
    }

    #[test]
    fn test_single_account_authority() {
        let auth = Authority::single_account(level("eosio"));
        assert_eq!(auth.threshold, 1);
        assert_eq!(auth.accounts.len(), 1);
        assert_eq!(auth.accounts[0].weight, 1);
        assert!(auth.keys.is_empty() && auth.waits.is_empty());
        assert!(auth.is_satisfiable());

        let unreachable = Authority {
            threshold: 2,
            ..auth
        };
        assert!(!unreachable.is_satisfiable());
    }

    #[test]
    fn test_packed_transaction_round_trip() {
        let signed = SignedTransaction::new(sample_transaction());
        let packed = signed.pack_uncompressed();
        assert_eq!(packed.id(), signed.transaction.id());
        assert!(packed.packed_context_free_data.is_empty());
        assert_eq!(packed.unpack().unwrap(), signed);

        let json = serde_json::to_value(&packed).unwrap();
        assert_eq!(json["compression"], "none");
        assert_eq!(json["packed_context_free_data"], "");
    }
}
