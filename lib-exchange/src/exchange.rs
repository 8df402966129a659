//! Exchange Orchestrator
//!
//! Sequences the five public operations (listing, add/remove liquidity,
//! buy, sell) plus protocol-fee withdrawal, composing the pool ledger,
//! the hold-duration ledger and the circuit breaker, and talking to the
//! external collaborators.
//!
//! # Operation discipline
//!
//! Every trading operation runs: validate → mutate internal state →
//! external value movement → commit circuit trip. Internal state is fully
//! updated before any outbound collaborator call, so a re-entrant callee
//! observes consistent ledgers; the affected pool is snapshotted at entry
//! and restored on any failure, so a failed collaborator call never
//! leaves the ledgers ahead of reality. The breach decision is computed
//! against the settled reserves before the outbound push (every fallible
//! step precedes the external interaction) and committed after it, which
//! keeps the documented post-trade semantics: the breaching trade
//! settles, the halt binds subsequent trades.

use std::collections::HashMap;

use lib_types::{Address, Amount, AssetId, BlockHeight, Bps, PoolId};
use serde::{Deserialize, Serialize};

use crate::circuit::CircuitState;
use crate::collaborators::ExchangeHost;
use crate::error::{ExchangeError, ExchangeResult};
use crate::events::ExchangeEvent;
use crate::math;
use crate::pool::{LiquidityQuote, Pool, PoolState, SellOutcome};
use crate::{
    DEFAULT_LISTING_FEE, DEFAULT_LONG_FEE_BPS, DEFAULT_LP_SHARE_BPS, DEFAULT_SHORT_FEE_BPS,
    DEFAULT_SHORT_TERM_BLOCKS, DEFAULT_WINDOW_BLOCKS, FEE_DENOM,
};

/// Exchange-wide parameters, fixed at construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeParams {
    /// Reference-window length in blocks
    pub window_blocks: u64,
    /// Holding age below which the short-term sell fee applies
    pub short_term_blocks: u64,
    /// Sell fee for short-term holders
    pub short_fee_bps: Bps,
    /// Sell fee for long-term holders
    pub long_fee_bps: Bps,
    /// LP share of every sell fee; the rest accrues to the protocol
    pub lp_share_bps: Bps,
    /// Flat fee charged out of the listing contribution
    pub listing_fee: Amount,
    /// Recipient of listing and protocol fees
    pub treasury: Address,
    /// The exchange's own custody address on the token ledger
    pub exchange_address: Address,
}

impl ExchangeParams {
    /// Parameters with protocol defaults for everything but the two
    /// addresses.
    pub fn new(treasury: Address, exchange_address: Address) -> Self {
        Self {
            window_blocks: DEFAULT_WINDOW_BLOCKS,
            short_term_blocks: DEFAULT_SHORT_TERM_BLOCKS,
            short_fee_bps: DEFAULT_SHORT_FEE_BPS,
            long_fee_bps: DEFAULT_LONG_FEE_BPS,
            lp_share_bps: DEFAULT_LP_SHARE_BPS,
            listing_fee: DEFAULT_LISTING_FEE,
            treasury,
            exchange_address,
        }
    }
}

/// The per-asset pool registry and the operations over it.
///
/// One instance serializes all operations on the pools it owns; hosts
/// that want cross-pool concurrency shard pools behind their own
/// exclusion boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityExchange {
    params: ExchangeParams,
    pools: HashMap<AssetId, Pool>,
    events: Vec<ExchangeEvent>,
}

impl EquityExchange {
    pub fn new(params: ExchangeParams) -> Self {
        Self {
            params,
            pools: HashMap::new(),
            events: Vec::new(),
        }
    }

    /// List a new asset: bootstrap its pool from the provider's equity and
    /// BNB contribution, net of the flat listing fee.
    ///
    /// The listing fee goes to the treasury; the remaining BNB and the
    /// pulled equity seed the reserves. All initial LP shares go to the
    /// provider.
    pub fn list(
        &mut self,
        host: &mut dyn ExchangeHost,
        asset: AssetId,
        provider: Address,
        equity_in: Amount,
        bnb_in: Amount,
    ) -> ExchangeResult<PoolId> {
        if self.pools.contains_key(&asset) {
            return Err(ExchangeError::AlreadyListed);
        }
        if equity_in == 0 {
            return Err(ExchangeError::ZeroEquity);
        }
        if bnb_in <= self.params.listing_fee {
            return Err(ExchangeError::InsufficientBnb);
        }

        let now = host.now();
        host.pull(asset, provider, self.params.exchange_address, equity_in)?;
        host.send(self.params.treasury, self.params.listing_fee)?;

        let pool_bnb = bnb_in - self.params.listing_fee;
        let pool = Pool::bootstrap(asset, equity_in, pool_bnb, provider, now);
        let pool_id = pool.pool_id();
        self.pools.insert(asset, pool);

        self.events.push(ExchangeEvent::PoolListed {
            asset,
            pool_id,
            provider,
            equity_in,
            bnb_in: pool_bnb,
            listing_fee: self.params.listing_fee,
            block_height: now,
        });
        tracing::info!(%asset, %pool_id, equity_in, bnb_in = pool_bnb, "asset listed");

        Ok(pool_id)
    }

    /// Add liquidity at the current reserve ratio.
    ///
    /// The equity actually pulled is matched to the BNB contribution
    /// (capped by `equity_desired`); BNB the match does not consume is
    /// refunded to the provider.
    pub fn add_liquidity(
        &mut self,
        host: &mut dyn ExchangeHost,
        asset: AssetId,
        provider: Address,
        bnb_in: Amount,
        equity_desired: Amount,
    ) -> ExchangeResult<LiquidityQuote> {
        let params = &self.params;
        let pool = self.pools.get_mut(&asset).ok_or(ExchangeError::NotListed)?;
        if bnb_in == 0 || equity_desired == 0 {
            return Err(ExchangeError::ZeroAmounts);
        }
        let now = host.now();

        let snapshot = pool.clone();
        let result: ExchangeResult<LiquidityQuote> = (|| {
            let quote = pool.add_liquidity(provider, bnb_in, equity_desired)?;
            host.pull(asset, provider, params.exchange_address, quote.equity_actual)?;
            let excess = bnb_in - quote.bnb_actual;
            if excess > 0 {
                host.send(provider, excess)?;
            }
            Ok(quote)
        })();

        match result {
            Ok(quote) => {
                self.events.push(ExchangeEvent::LiquidityAdded {
                    asset,
                    provider,
                    equity_in: quote.equity_actual,
                    bnb_in: quote.bnb_actual,
                    shares_issued: quote.shares_issued,
                    block_height: now,
                });
                tracing::debug!(%asset, shares = quote.shares_issued, "liquidity added");
                Ok(quote)
            }
            Err(e) => {
                *pool = snapshot;
                Err(e)
            }
        }
    }

    /// Burn LP shares and pay out the proportional reserves plus any
    /// pending fee credit.
    pub fn remove_liquidity(
        &mut self,
        host: &mut dyn ExchangeHost,
        asset: AssetId,
        holder: Address,
        shares: Amount,
    ) -> ExchangeResult<(Amount, Amount)> {
        let params = &self.params;
        let pool = self.pools.get_mut(&asset).ok_or(ExchangeError::NotListed)?;
        let now = host.now();

        let snapshot = pool.clone();
        let result: ExchangeResult<(Amount, Amount)> = (|| {
            let (equity_out, bnb_out) = pool.remove_liquidity(holder, shares)?;
            host.push(asset, params.exchange_address, holder, equity_out)?;
            host.send(holder, bnb_out)?;
            Ok((equity_out, bnb_out))
        })();

        match result {
            Ok((equity_out, bnb_out)) => {
                self.events.push(ExchangeEvent::LiquidityRemoved {
                    asset,
                    provider: holder,
                    shares_burned: shares,
                    equity_out,
                    bnb_out,
                    block_height: now,
                });
                tracing::debug!(%asset, shares, "liquidity removed");
                Ok((equity_out, bnb_out))
            }
            Err(e) => {
                *pool = snapshot;
                Err(e)
            }
        }
    }

    /// Buy equity with BNB. No fee on the buy side; the acquisition is
    /// recorded in the buyer's hold history at the current height.
    pub fn buy(
        &mut self,
        host: &mut dyn ExchangeHost,
        asset: AssetId,
        buyer: Address,
        bnb_in: Amount,
        min_equity_out: Amount,
    ) -> ExchangeResult<Amount> {
        let params = &self.params;
        let pool = self.pools.get_mut(&asset).ok_or(ExchangeError::NotListed)?;
        if bnb_in == 0 {
            return Err(ExchangeError::ZeroBnb);
        }
        let now = host.now();

        let snapshot = pool.clone();
        let mut staged: Vec<ExchangeEvent> = Vec::new();
        let result: ExchangeResult<Amount> = (|| {
            if pool.advance_or_halt(now, params.window_blocks)? {
                let (reference_bnb, reference_equity) = pool.circuit().reference();
                staged.push(ExchangeEvent::WindowReset {
                    asset,
                    reference_bnb,
                    reference_equity,
                    block_height: now,
                });
            }

            let equity_out = pool.apply_buy(bnb_in)?;
            if equity_out < min_equity_out {
                return Err(ExchangeError::SlippageExceeded {
                    minimum: min_equity_out,
                    got: equity_out,
                });
            }
            pool.holding_mut(buyer).record_acquisition(equity_out, now)?;

            let cfg = host.circuit_config(asset)?;
            let breach = pool.breach_side(&cfg)?;

            host.push(asset, params.exchange_address, buyer, equity_out)?;

            if let Some(side) = breach {
                pool.trip_circuit(side, &cfg, now);
                staged.push(ExchangeEvent::CircuitBroken {
                    asset,
                    is_upper: side.is_upper(),
                    halted_until: pool.circuit().halted_until(),
                    block_height: now,
                });
            }
            staged.push(ExchangeEvent::Bought {
                asset,
                buyer,
                bnb_in,
                equity_out,
                block_height: now,
            });
            Ok(equity_out)
        })();

        match result {
            Ok(equity_out) => {
                self.events.append(&mut staged);
                tracing::debug!(%asset, bnb_in, equity_out, "buy settled");
                Ok(equity_out)
            }
            Err(e) => {
                *pool = snapshot;
                Err(e)
            }
        }
    }

    /// Sell equity for BNB at the seller's fee tier. The disposal is
    /// removed from the seller's hold history.
    pub fn sell(
        &mut self,
        host: &mut dyn ExchangeHost,
        asset: AssetId,
        seller: Address,
        equity_in: Amount,
        min_bnb_out: Amount,
    ) -> ExchangeResult<SellOutcome> {
        let params = &self.params;
        let pool = self.pools.get_mut(&asset).ok_or(ExchangeError::NotListed)?;
        if equity_in == 0 {
            return Err(ExchangeError::ZeroEquity);
        }
        let now = host.now();

        let snapshot = pool.clone();
        let mut staged: Vec<ExchangeEvent> = Vec::new();
        let result: ExchangeResult<SellOutcome> = (|| {
            if pool.advance_or_halt(now, params.window_blocks)? {
                let (reference_bnb, reference_equity) = pool.circuit().reference();
                staged.push(ExchangeEvent::WindowReset {
                    asset,
                    reference_bnb,
                    reference_equity,
                    block_height: now,
                });
            }

            host.pull(asset, seller, params.exchange_address, equity_in)?;

            let fee_bps = pool.sell_fee_tier(
                &seller,
                now,
                params.short_term_blocks,
                params.short_fee_bps,
                params.long_fee_bps,
            );
            let outcome = pool.apply_sell(equity_in, fee_bps, params.lp_share_bps)?;
            if outcome.net_bnb_out < min_bnb_out {
                return Err(ExchangeError::SlippageExceeded {
                    minimum: min_bnb_out,
                    got: outcome.net_bnb_out,
                });
            }
            pool.holding_mut(seller).record_disposal(equity_in)?;

            let cfg = host.circuit_config(asset)?;
            let breach = pool.breach_side(&cfg)?;

            host.send(seller, outcome.net_bnb_out)?;

            if let Some(side) = breach {
                pool.trip_circuit(side, &cfg, now);
                staged.push(ExchangeEvent::CircuitBroken {
                    asset,
                    is_upper: side.is_upper(),
                    halted_until: pool.circuit().halted_until(),
                    block_height: now,
                });
            }
            staged.push(ExchangeEvent::Sold {
                asset,
                seller,
                equity_in,
                net_bnb_out: outcome.net_bnb_out,
                fee: outcome.fee,
                fee_bps,
                block_height: now,
            });
            Ok(outcome)
        })();

        match result {
            Ok(outcome) => {
                self.events.append(&mut staged);
                tracing::debug!(%asset, equity_in, net_bnb_out = outcome.net_bnb_out, "sell settled");
                Ok(outcome)
            }
            Err(e) => {
                *pool = snapshot;
                Err(e)
            }
        }
    }

    /// Pay the accrued protocol fees out to the treasury.
    ///
    /// Privileged: only the treasury itself may trigger the withdrawal.
    pub fn withdraw_protocol_fees(
        &mut self,
        host: &mut dyn ExchangeHost,
        asset: AssetId,
        caller: Address,
    ) -> ExchangeResult<Amount> {
        if caller != self.params.treasury {
            return Err(ExchangeError::Unauthorized);
        }
        let params = &self.params;
        let pool = self.pools.get_mut(&asset).ok_or(ExchangeError::NotListed)?;
        let now = host.now();

        let snapshot = pool.clone();
        let result: ExchangeResult<Amount> = (|| {
            let amount = pool.withdraw_protocol_fees()?;
            host.send(params.treasury, amount)?;
            Ok(amount)
        })();

        match result {
            Ok(amount) => {
                self.events.push(ExchangeEvent::ProtocolFeesWithdrawn {
                    asset,
                    amount,
                    block_height: now,
                });
                tracing::debug!(%asset, amount, "protocol fees withdrawn");
                Ok(amount)
            }
            Err(e) => {
                *pool = snapshot;
                Err(e)
            }
        }
    }

    // ========================================================================
    // Read-only surface
    // ========================================================================

    pub fn is_listed(&self, asset: &AssetId) -> bool {
        self.pools.contains_key(asset)
    }

    /// Point-in-time pool snapshot for display
    pub fn pool_state(&self, asset: &AssetId) -> Option<PoolState> {
        self.pools.get(asset).map(Pool::state)
    }

    /// Circuit state, including the halt deadline while broken
    pub fn circuit_status(&self, asset: &AssetId) -> Option<&CircuitState> {
        self.pools.get(asset).map(Pool::circuit)
    }

    /// 1e18-scaled BNB-per-equity spot quote
    pub fn spot_price(&self, asset: &AssetId) -> ExchangeResult<u128> {
        let pool = self.pools.get(asset).ok_or(ExchangeError::NotListed)?;
        let (equity, bnb) = pool.reserves();
        math::spot_price(bnb, equity)
    }

    /// Equity a buy of `bnb_in` would currently return. Ignores the halt
    /// gate; quotes are display-only.
    pub fn quote_buy(&self, asset: &AssetId, bnb_in: Amount) -> ExchangeResult<Amount> {
        let pool = self.pools.get(asset).ok_or(ExchangeError::NotListed)?;
        let (equity, bnb) = pool.reserves();
        math::swap_output(bnb_in, bnb, equity)
    }

    /// Net BNB a sell of `equity_in` by `seller` would currently return,
    /// with the fee tier it would be charged.
    pub fn quote_sell(
        &self,
        asset: &AssetId,
        seller: &Address,
        equity_in: Amount,
        now: BlockHeight,
    ) -> ExchangeResult<(Amount, Bps)> {
        let pool = self.pools.get(asset).ok_or(ExchangeError::NotListed)?;
        let (equity, bnb) = pool.reserves();
        let raw = math::swap_output(equity_in, equity, bnb)?;
        let fee_bps = pool.sell_fee_tier(
            seller,
            now,
            self.params.short_term_blocks,
            self.params.short_fee_bps,
            self.params.long_fee_bps,
        );
        let fee = math::mul_div(raw, fee_bps as Amount, FEE_DENOM)?;
        Ok((raw - fee, fee_bps))
    }

    /// LP shares a holder owns in a pool
    pub fn lp_share_of(&self, asset: &AssetId, holder: &Address) -> Amount {
        self.pools
            .get(asset)
            .map_or(0, |pool| pool.lp_share_of(holder))
    }

    pub fn params(&self) -> &ExchangeParams {
        &self.params
    }

    /// Events emitted since the last drain
    pub fn events(&self) -> &[ExchangeEvent] {
        &self.events
    }

    /// Take all pending events for host-side indexing
    pub fn drain_events(&mut self) -> Vec<ExchangeEvent> {
        std::mem::take(&mut self.events)
    }
}
