//! # Equity Exchange Core
//!
//! A constant-product AMM per independently listed equity asset, traded
//! against native BNB, with a stock-market-style circuit breaker,
//! hold-duration sell-fee tiers and proportional LP accounting.
//!
//! ## Key Features
//! - Constant product pricing (x * y = k), floor division in the pool's favor
//! - Per-pool 24h reference window with upper/lower circuit bounds
//! - Post-trade breaker: the breaching print clears, the halt binds the
//!   next trade
//! - Sell-side fee tiers resolved from weighted-average acquisition age
//! - LP fees folded into reserves, protocol fees accrued for withdrawal
//! - Event emission for every state change
//!
//! ## Security Invariants
//!
//! ### Invariant E1: Reserve Conservation
//! After any buy or sell, `equity_reserve * bnb_reserve` is >= its value
//! before the trade.
//!
//! ### Invariant E2: Share Conservation
//! The values of a pool's LP share map always sum to `total_lp_shares`.
//!
//! ### Invariant E3: Exact Fee Split
//! Every sell fee splits into LP and protocol portions with no remainder
//! lost.
//!
//! ### Invariant E4: Operation Atomicity
//! An operation either commits every ledger mutation or none; a failed
//! collaborator call restores the pre-operation pool state exactly.

pub mod circuit;
pub mod collaborators;
pub mod error;
pub mod events;
pub mod exchange;
pub mod holding;
pub mod math;
pub mod pool;

pub use circuit::{BreachSide, CircuitConfig, CircuitState};
pub use collaborators::{
    AssetConfigSource, AssetTransfer, ConfigError, ExchangeHost, SendError, TimeSource,
    TransferError, ValueTransfer,
};
pub use error::{ExchangeError, ExchangeResult};
pub use events::ExchangeEvent;
pub use exchange::{EquityExchange, ExchangeParams};
pub use holding::HoldRecord;
pub use pool::{derive_pool_id, LiquidityQuote, Pool, PoolState, SellOutcome};

use lib_types::{Amount, Bps};

/// Basis-point denominator (10000 = 100%)
pub const FEE_DENOM: Amount = 10_000;

/// Default reference-window length: 24 hours of 3-second blocks
pub const DEFAULT_WINDOW_BLOCKS: u64 = 28_800;

/// Default short-term holding threshold: 30 days of 3-second blocks
pub const DEFAULT_SHORT_TERM_BLOCKS: u64 = 864_000;

/// Default sell fee for short-term holders (0.45%)
pub const DEFAULT_SHORT_FEE_BPS: Bps = 45;

/// Default sell fee for long-term holders (0.02%)
pub const DEFAULT_LONG_FEE_BPS: Bps = 2;

/// Default LP share of the sell fee (50%)
pub const DEFAULT_LP_SHARE_BPS: Bps = 5_000;

/// Default flat listing fee in atomic BNB units
pub const DEFAULT_LISTING_FEE: Amount = 1_000_000_000;
