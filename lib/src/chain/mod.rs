//! Chain data model: names, authorities, actions, transactions and keys

pub mod codec;
pub mod crypto;
mod name;
pub mod types;

pub use codec::{Pack, Unpack};
pub use crypto::{KeyBag, PublicKey, Signature, Signer};
pub use name::Name;
pub use types::{
    Action, Authority, Checksum256, PackedTransaction, PermissionLevel, SignedTransaction,
    TimePointSec, Transaction, TxHeader,
};
