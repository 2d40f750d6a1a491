//! Key material: master key, tag UID, key slots and the derived key table.

use std::fmt;

use bytes::Bytes;
use derive_more::Deref;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::KEY_COUNT;
use crate::crypto::{AesKey, diversify_key};
use crate::error::{Error, Result};

/// Index of an application key slot (0..=4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyIndex(u8);

impl KeyIndex {
    /// Application master key
    pub const MASTER: Self = Self(0);

    /// Create a key index, rejecting slots the tag does not have
    pub const fn new(index: u8) -> Result<Self> {
        if (index as usize) < KEY_COUNT {
            Ok(Self(index))
        } else {
            Err(Error::InvalidKeyIndex(index))
        }
    }

    /// Key number as sent on the wire
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Iterate over every key slot in ascending order
    pub fn all() -> impl Iterator<Item = Self> {
        (0..KEY_COUNT as u8).map(Self)
    }

    /// Whether this is the application master key
    pub const fn is_master(self) -> bool {
        self.0 == 0
    }
}

impl TryFrom<u8> for KeyIndex {
    type Error = Error;

    fn try_from(index: u8) -> Result<Self> {
        Self::new(index)
    }
}

impl fmt::Display for KeyIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key used to authenticate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyReference {
    /// Slot 0 with the all-zero key of a tag fresh from the factory
    Factory,
    /// A slot of the derived key table
    Indexed(KeyIndex),
}

impl KeyReference {
    /// Key slot addressed on the wire
    pub const fn index(self) -> KeyIndex {
        match self {
            Self::Factory => KeyIndex::MASTER,
            Self::Indexed(index) => index,
        }
    }
}

impl From<KeyIndex> for KeyReference {
    fn from(index: KeyIndex) -> Self {
        Self::Indexed(index)
    }
}

/// Secret the per-tag keys are derived from
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey(Vec<u8>);

impl MasterKey {
    /// Create a master key from raw bytes
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Parse a hex encoded master key; an empty string is the zero key
    pub fn from_hex(value: &str) -> Result<Self> {
        let bytes = hex::decode(value.trim())
            .map_err(|_| Error::InvalidMasterKey("not a hex string"))?;
        Ok(Self(bytes))
    }

    /// Whether every byte is zero, which selects the factory keys
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterKey")
            .field("len", &self.0.len())
            .finish_non_exhaustive()
    }
}

/// Tag UID as returned by GET UID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deref)]
pub struct Uid(Bytes);

impl Uid {
    /// Wrap raw UID bytes
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Upper case hex form used in URLs and reports
    pub fn to_hex(&self) -> String {
        hex::encode_upper(&self.0)
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// The five application keys of one tag
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyTable {
    keys: [AesKey; KEY_COUNT],
}

impl KeyTable {
    /// Derive every key slot for the given tag
    pub fn derive(master: &MasterKey, uid: &Uid) -> Self {
        let mut keys = [[0u8; 16]; KEY_COUNT];
        for index in KeyIndex::all() {
            keys[index.value() as usize] = diversify_key(master.as_bytes(), uid, index.value());
        }
        Self { keys }
    }

    /// Build a table from explicit keys
    pub const fn from_keys(keys: [AesKey; KEY_COUNT]) -> Self {
        Self { keys }
    }

    /// Key stored in the given slot
    pub fn get(&self, index: KeyIndex) -> &AesKey {
        &self.keys[index.value() as usize]
    }

    /// Key used when authenticating with the given reference
    pub fn for_reference(&self, reference: KeyReference) -> AesKey {
        match reference {
            KeyReference::Factory => [0u8; 16],
            KeyReference::Indexed(index) => *self.get(index),
        }
    }
}

impl fmt::Debug for KeyTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyTable").finish_non_exhaustive()
    }
}
