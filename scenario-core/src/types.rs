//! Basic ledger types

use crate::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;

/// Length in bytes of every account address
pub const ADDRESS_LEN: usize = 32;

/// Number of zero bytes that open a smart contract address
pub const SC_ADDRESS_LEADING_ZEROS: usize = 8;

/// Length of the VM type marker that follows the leading zeros
pub const VM_TYPE_LEN: usize = 2;

/// 32-byte hash type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash([u8; 32]);

impl Hash {
    /// Create a new hash from byte array
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Keccak-256 digest of `data`
    pub fn keccak256(data: &[u8]) -> Self {
        let digest = Keccak256::digest(data);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Get the underlying byte array
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Zero hash (all bytes are 0)
    pub fn zero() -> Self {
        Self([0u8; 32])
    }
}

impl Default for Hash {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl From<[u8; 32]> for Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// 32-byte account address.
///
/// Ordering is byte-wise, which keeps world dumps and state fingerprints
/// deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// Create a new address from byte array
    pub fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Create address from slice, rejecting anything that is not 32 bytes long
    pub fn from_slice(slice: &[u8]) -> CoreResult<Self> {
        if slice.len() != ADDRESS_LEN {
            return Err(CoreError::InvalidAddress(format!(
                "account address is not 32 bytes in length (got {})",
                slice.len()
            )));
        }
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Get the underlying byte array
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Create from hex string
    pub fn from_hex(hex: &str) -> CoreResult<Self> {
        let bytes = hex::decode(hex)?;
        Self::from_slice(&bytes)
    }

    /// Zero address (all bytes are 0)
    pub fn zero() -> Self {
        Self([0u8; ADDRESS_LEN])
    }

    /// Whether the address carries the smart contract zero prefix
    pub fn is_smart_contract(&self) -> bool {
        self.0[..SC_ADDRESS_LEADING_ZEROS].iter().all(|b| *b == 0)
    }

    /// The trailing byte, which doubles as the shard marker
    pub fn shard_byte(&self) -> u8 {
        self.0[ADDRESS_LEN - 1]
    }
}

impl Default for Address {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl From<[u8; ADDRESS_LEN]> for Address {
    fn from(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for Address {
    type Error = CoreError;

    fn try_from(slice: &[u8]) -> CoreResult<Self> {
        Self::from_slice(slice)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Block nonce
pub type BlockNonce = u64;

/// Account nonce
pub type Nonce = u64;
