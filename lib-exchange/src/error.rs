//! Exchange Errors
//!
//! Error taxonomy for the exchange core. Precondition errors mean the
//! caller supplied bad input or acted on the wrong pool state; economic
//! guards mean the pool cannot service the request within the caller's
//! tolerance and the caller may retry with adjusted parameters;
//! `TradingHalted` carries the block at which trading resumes; collaborator
//! failures are propagated verbatim and the operation is rolled back.
//!
//! `Overflow` and `KInvariantViolation` are defect-class: they indicate a
//! logic bug or adversarial extreme, never ordinary bad input, and must not
//! be absorbed by callers.

use lib_types::{Amount, BlockHeight};
use thiserror::Error;

use crate::collaborators::{ConfigError, SendError, TransferError};

/// Result alias for exchange operations
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// Errors surfaced by exchange operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    /// Asset has no pool
    #[error("asset is not listed")]
    NotListed,

    /// Listing attempted twice for the same asset
    #[error("asset is already listed")]
    AlreadyListed,

    /// Liquidity amounts are zero
    #[error("amounts cannot be zero")]
    ZeroAmounts,

    /// Equity input is zero
    #[error("equity amount cannot be zero")]
    ZeroEquity,

    /// BNB input is zero
    #[error("BNB amount cannot be zero")]
    ZeroBnb,

    /// Holder owns fewer LP shares than requested
    #[error("insufficient LP shares: have {have}, requested {requested}")]
    InsufficientShares { have: Amount, requested: Amount },

    /// BNB supplied does not cover the listing fee plus initial liquidity
    #[error("BNB does not cover the listing fee plus initial liquidity")]
    InsufficientBnb,

    /// Swap requires non-zero input and reserves
    #[error("swap requires non-zero input and reserves")]
    InvalidReserves,

    /// The matched equity contribution rounds to zero
    #[error("computed equity contribution rounds to zero")]
    ZeroComputedEquity,

    /// Output fell below the caller's floor
    #[error("slippage exceeded: minimum {minimum}, got {got}")]
    SlippageExceeded { minimum: Amount, got: Amount },

    /// The pool cannot service this trade size
    #[error("insufficient liquidity in pool")]
    InsufficientLiquidity,

    /// Circuit breaker is active; retry once the halt expires
    #[error("trading halted until block {resumes_at}")]
    TradingHalted { resumes_at: BlockHeight },

    /// No protocol fees to withdraw
    #[error("no protocol fees accrued")]
    NoFeesAccrued,

    /// Caller lacks the privilege for this operation
    #[error("caller is not authorized")]
    Unauthorized,

    /// Arithmetic overflow (defect-class)
    #[error("arithmetic overflow")]
    Overflow,

    /// Reserve product decreased across a trade (defect-class)
    #[error("k invariant violation detected")]
    KInvariantViolation,

    /// Asset transfer collaborator refused or failed
    #[error("asset transfer failed: {0}")]
    Transfer(#[from] TransferError),

    /// Value transfer collaborator refused or failed
    #[error("value transfer failed: {0}")]
    Send(#[from] SendError),

    /// Circuit configuration lookup failed
    #[error("config lookup failed: {0}")]
    Config(#[from] ConfigError),
}
