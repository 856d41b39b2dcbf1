//! Mutable names gated by secp256k1 signatures
//!
//! A name is created once together with the public key of its owner. After
//! that the pointer it carries only moves when the request is signed by that
//! key over [`update_message`].

mod store;

use serde::{Deserialize, Serialize};

pub use store::{NameStore, NameStoreError};

/// A single entry in the name table
///
/// Serialized the way it is stored on disk and accepted on the wire, with
/// camelCase key coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameRecord {
    /// Current pointer, usually a content hash
    pub address: String,
    pub public_key_x: String,
    pub public_key_y: String,
}

/// The message an owner signs to move `id` to `pointer`.
pub fn update_message(id: &str, pointer: &str) -> String {
    format!("{}-{}", id, pointer)
}
