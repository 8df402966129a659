//! Canonical Primitive Types for the Exchange Ledger
//!
//! Rule: No String identifiers in ledger state. Ever.
//!
//! These types are the foundational building blocks for all pool and
//! ledger data structures. They are designed to be:
//! - Fixed-size (no dynamic allocation)
//! - Deterministically serializable
//! - Efficient to copy and compare

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// TYPE ALIASES
// ============================================================================

/// Block height of the host ledger; the core's only notion of time.
/// Windows, halts and hold ages are all expressed in this unit.
pub type BlockHeight = u64;

/// Token and native-currency amounts in atomic units
pub type Amount = u64;

/// Basis points for fee calculations (10000 = 100%)
pub type Bps = u16;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// 32-byte address (derived from public key)
#[derive(Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, Default)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// Create a new Address from raw bytes
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Create a zeroed Address
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Get the underlying bytes
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if this is the zero address
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl From<[u8; 32]> for Address {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// ============================================================================
// ASSET TYPES
// ============================================================================

/// 32-byte identifier of a listed equity asset
#[derive(Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, Default)]
pub struct AssetId(pub [u8; 32]);

impl AssetId {
    /// Create a new AssetId from raw bytes
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Create a zeroed AssetId
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Get the underlying bytes
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if this is the zero asset id
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetId({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl From<[u8; 32]> for AssetId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for AssetId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// 32-byte pool identifier, derived deterministically from the asset id
#[derive(Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, Default)]
pub struct PoolId(pub [u8; 32]);

impl PoolId {
    /// Create a new PoolId from raw bytes
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the underlying bytes
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PoolId({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl From<[u8; 32]> for PoolId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for PoolId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_basics() {
        let addr = Address::new([3u8; 32]);
        assert!(!addr.is_zero());
        assert_eq!(addr.as_bytes(), &[3u8; 32]);

        let zero = Address::zero();
        assert!(zero.is_zero());
    }

    #[test]
    fn test_asset_id_basics() {
        let asset = AssetId::new([7u8; 32]);
        assert!(!asset.is_zero());
        assert_eq!(asset.as_bytes(), &[7u8; 32]);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let asset = AssetId::new([42u8; 32]);
        let serialized = bincode::serialize(&asset).unwrap();
        let deserialized: AssetId = bincode::deserialize(&serialized).unwrap();
        assert_eq!(asset, deserialized);
    }

    #[test]
    fn test_from_array() {
        let bytes = [5u8; 32];
        let addr: Address = bytes.into();
        assert_eq!(addr.0, bytes);

        let pool: PoolId = bytes.into();
        assert_eq!(pool.0, bytes);
    }
}
