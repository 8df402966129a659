//! External Collaborator Interfaces
//!
//! The core consumes its environment through four narrow seams: the token
//! ledger (which hides the whitelist/KYC/ownership-cap gate), the native
//! value ledger, per-asset circuit configuration, and time. All four are
//! synchronous: an operation's effects are final only once every
//! collaborator call has returned.
//!
//! Collaborator calls that move value are sequenced at the end of each
//! operation's mutation phase, after internal state is fully updated, so a
//! re-entrant callee can never observe inconsistent ledgers. A failure from
//! any collaborator fails the whole operation and the core restores its
//! pre-operation state.
//!
//! Cap-enforcing token ledgers must exempt the exchange's own holding
//! address: pool reserves are custodied there and listing or liquidity
//! operations will otherwise fail spuriously.

use lib_types::{Address, Amount, AssetId, BlockHeight};
use thiserror::Error;

use crate::circuit::CircuitConfig;

/// Token ledger rejection. The gate's reason is carried through untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// The transfer-restriction gate (whitelist/KYC/ownership cap) refused
    #[error("transfer rejected by token ledger: {0}")]
    Rejected(String),

    /// Sender does not hold the requested amount
    #[error("insufficient token balance")]
    InsufficientBalance,
}

/// Native value ledger rejection
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// The recipient or the ledger refused the payment
    #[error("value transfer rejected: {0}")]
    Rejected(String),

    /// The paying account does not hold the requested amount
    #[error("insufficient funds")]
    InsufficientFunds,
}

/// Circuit configuration lookup failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No configuration registered for this asset
    #[error("no circuit configuration for asset")]
    UnknownAsset,
}

/// Moves equity tokens between parties on the external token ledger.
///
/// Both directions can fail (the gate sits behind this trait); failures
/// propagate as the operation's failure with no partial effect inside the
/// core.
pub trait AssetTransfer {
    /// Pull tokens from a counterparty into custody
    fn pull(
        &mut self,
        asset: AssetId,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), TransferError>;

    /// Push tokens out of custody to a counterparty
    fn push(
        &mut self,
        asset: AssetId,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), TransferError>;
}

/// Sends native BNB out of the exchange's custody.
pub trait ValueTransfer {
    fn send(&mut self, to: Address, amount: Amount) -> Result<(), SendError>;
}

/// Per-asset circuit-breaker configuration.
///
/// Queried fresh on every breach evaluation; the core never caches a
/// config across operations because the owning component may change it
/// between calls.
pub trait AssetConfigSource {
    fn circuit_config(&self, asset: AssetId) -> Result<CircuitConfig, ConfigError>;
}

/// Monotonically non-decreasing block height.
pub trait TimeSource {
    fn now(&self) -> BlockHeight;
}

/// The collaborator bundle every orchestrator operation runs against.
pub trait ExchangeHost: AssetTransfer + ValueTransfer + AssetConfigSource + TimeSource {}

impl<T: AssetTransfer + ValueTransfer + AssetConfigSource + TimeSource> ExchangeHost for T {}
