//! Exchange Events
//!
//! Every state change emits an event carrying the operation's key
//! quantities for off-core indexing and UI. Events have no return-value
//! meaning; the host drains them after each operation.

use lib_types::{Address, Amount, AssetId, BlockHeight, Bps, PoolId};
use serde::{Deserialize, Serialize};

/// Exchange state-change events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangeEvent {
    /// A new asset pool was bootstrapped
    PoolListed {
        asset: AssetId,
        pool_id: PoolId,
        provider: Address,
        equity_in: Amount,
        bnb_in: Amount,
        listing_fee: Amount,
        block_height: BlockHeight,
    },

    /// Liquidity was added to an existing pool
    LiquidityAdded {
        asset: AssetId,
        provider: Address,
        equity_in: Amount,
        bnb_in: Amount,
        shares_issued: Amount,
        block_height: BlockHeight,
    },

    /// Liquidity was removed from a pool
    LiquidityRemoved {
        asset: AssetId,
        provider: Address,
        shares_burned: Amount,
        equity_out: Amount,
        bnb_out: Amount,
        block_height: BlockHeight,
    },

    /// Equity bought from the pool
    Bought {
        asset: AssetId,
        buyer: Address,
        bnb_in: Amount,
        equity_out: Amount,
        block_height: BlockHeight,
    },

    /// Equity sold to the pool
    Sold {
        asset: AssetId,
        seller: Address,
        equity_in: Amount,
        net_bnb_out: Amount,
        fee: Amount,
        fee_bps: Bps,
        block_height: BlockHeight,
    },

    /// A trade pushed the price through a circuit bound; trading halts
    /// from the next operation on
    CircuitBroken {
        asset: AssetId,
        is_upper: bool,
        halted_until: BlockHeight,
        block_height: BlockHeight,
    },

    /// The reference window rolled over
    WindowReset {
        asset: AssetId,
        reference_bnb: Amount,
        reference_equity: Amount,
        block_height: BlockHeight,
    },

    /// Accrued protocol fees were paid out to the treasury
    ProtocolFeesWithdrawn {
        asset: AssetId,
        amount: Amount,
        block_height: BlockHeight,
    },
}
