//! Pool Ledger
//!
//! The aggregate one listed asset owns: AMM reserves, LP share accounting,
//! protocol-fee accrual, the circuit-breaker state and the per-holder hold
//! records. Pure bookkeeping: callers validate preconditions, sequence
//! external transfers and decide when the circuit machinery runs.
//!
//! # Invariants
//!
//! ## Invariant P1: Share Conservation
//! `sum(lp_shares.values()) == total_lp_shares` after every operation.
//!
//! ## Invariant P2: Reserve Conservation
//! After any buy or sell: `equity_reserve * bnb_reserve >= k` from before
//! the trade. Floor division plus retained LP fees mean the product never
//! decreases; a decrease is reported as `KInvariantViolation`.
//!
//! ## Invariant P3: Exact Fee Split
//! For every sell, `lp_fee + protocol_fee == fee` with no remainder lost.

use std::collections::HashMap;

use lib_types::{Address, Amount, AssetId, BlockHeight, Bps, PoolId};
use serde::{Deserialize, Serialize};

use crate::circuit::{BreachSide, CircuitConfig, CircuitState};
use crate::error::{ExchangeError, ExchangeResult};
use crate::holding::HoldRecord;
use crate::math;
use crate::FEE_DENOM;

/// Domain separator for pool id derivation
pub const POOL_ID_DOMAIN: &[u8] = b"EQUITY_EXCHANGE_POOL_V1";

/// Derive the deterministic pool id for an asset.
///
/// `pool_id = blake3(POOL_ID_DOMAIN || asset_id)`
pub fn derive_pool_id(asset: &AssetId) -> PoolId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(POOL_ID_DOMAIN);
    hasher.update(asset.as_bytes());

    let hash = hasher.finalize();
    let mut pool_id = [0u8; 32];
    pool_id.copy_from_slice(hash.as_bytes());
    PoolId::new(pool_id)
}

/// The amounts actually taken and the shares minted by a liquidity add
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityQuote {
    /// Equity matched to the BNB contribution (<= desired)
    pub equity_actual: Amount,
    /// BNB actually consumed (<= offered; the excess is refunded)
    pub bnb_actual: Amount,
    /// LP shares minted to the provider
    pub shares_issued: Amount,
}

/// Result of applying a sell against the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellOutcome {
    /// BNB owed to the seller after the fee
    pub net_bnb_out: Amount,
    /// Total fee charged
    pub fee: Amount,
    /// Portion folded back into the BNB reserve for LPs
    pub lp_fee: Amount,
    /// Portion accrued for protocol withdrawal
    pub protocol_fee: Amount,
}

/// Point-in-time view of a pool for host-side display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolState {
    pub equity_reserve: Amount,
    pub bnb_reserve: Amount,
    pub total_lp_shares: Amount,
    pub protocol_fees_accrued: Amount,
    pub circuit_broken: bool,
    pub halted_until: BlockHeight,
    pub window_start: BlockHeight,
    pub bnb_volume: Amount,
    pub equity_volume: Amount,
}

/// Per-asset pool: reserves, LP shares, fee accrual, circuit state and
/// hold records. Created exactly once by listing, never destroyed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    // === Identity ===
    pool_id: PoolId,
    asset: AssetId,

    // === Reserves ===
    equity_reserve: Amount,
    bnb_reserve: Amount,

    // === LP accounting ===
    total_lp_shares: Amount,
    lp_shares: HashMap<Address, Amount>,
    /// BNB fee credit still owed to an LP, paid out at removal
    lp_fee_credits: HashMap<Address, Amount>,

    // === Circuit breaker ===
    circuit: CircuitState,

    // === Fee accrual ===
    protocol_fees_accrued: Amount,

    // === Hold-duration ledger ===
    holdings: HashMap<Address, HoldRecord>,

    // === Cumulative statistics ===
    bnb_volume: Amount,
    equity_volume: Amount,
}

impl Pool {
    /// Bootstrap a pool from the listing contribution.
    ///
    /// All initial LP shares (one per equity unit) go to the listing
    /// provider; the reference price and window start from `now`.
    pub fn bootstrap(
        asset: AssetId,
        equity_in: Amount,
        bnb_in: Amount,
        provider: Address,
        now: BlockHeight,
    ) -> Self {
        let mut lp_shares = HashMap::new();
        lp_shares.insert(provider, equity_in);

        Self {
            pool_id: derive_pool_id(&asset),
            asset,
            equity_reserve: equity_in,
            bnb_reserve: bnb_in,
            total_lp_shares: equity_in,
            lp_shares,
            lp_fee_credits: HashMap::new(),
            circuit: CircuitState::open(bnb_in, equity_in, now),
            protocol_fees_accrued: 0,
            holdings: HashMap::new(),
            bnb_volume: 0,
            equity_volume: 0,
        }
    }

    /// Match a BNB contribution against the current reserve ratio and mint
    /// shares.
    ///
    /// The BNB actually consumed is recomputed from the matched equity so
    /// rounding dust can never overcharge the provider; it is always
    /// `<= bnb_in` and the caller refunds the difference.
    pub fn add_liquidity(
        &mut self,
        provider: Address,
        bnb_in: Amount,
        equity_desired: Amount,
    ) -> ExchangeResult<LiquidityQuote> {
        let equity_optimal = math::mul_div(bnb_in, self.equity_reserve, self.bnb_reserve)?;
        let equity_actual = equity_optimal.min(equity_desired);
        if equity_actual == 0 {
            return Err(ExchangeError::ZeroComputedEquity);
        }

        let bnb_actual = math::mul_div(equity_actual, self.bnb_reserve, self.equity_reserve)?;
        let shares_issued = math::mul_div(equity_actual, self.total_lp_shares, self.equity_reserve)?;
        if shares_issued == 0 {
            return Err(ExchangeError::ZeroComputedEquity);
        }

        self.equity_reserve = self
            .equity_reserve
            .checked_add(equity_actual)
            .ok_or(ExchangeError::Overflow)?;
        self.bnb_reserve = self
            .bnb_reserve
            .checked_add(bnb_actual)
            .ok_or(ExchangeError::Overflow)?;
        self.total_lp_shares = self
            .total_lp_shares
            .checked_add(shares_issued)
            .ok_or(ExchangeError::Overflow)?;
        *self.lp_shares.entry(provider).or_insert(0) += shares_issued;

        Ok(LiquidityQuote {
            equity_actual,
            bnb_actual,
            shares_issued,
        })
    }

    /// Burn shares and redeem the proportional slice of both reserves.
    ///
    /// Any pending fee credit for the holder is added to the BNB payout
    /// and zeroed in the same movement.
    pub fn remove_liquidity(
        &mut self,
        holder: Address,
        shares: Amount,
    ) -> ExchangeResult<(Amount, Amount)> {
        let have = self.lp_shares.get(&holder).copied().unwrap_or(0);
        if shares == 0 || have < shares {
            return Err(ExchangeError::InsufficientShares {
                have,
                requested: shares,
            });
        }

        let equity_out = math::mul_div(shares, self.equity_reserve, self.total_lp_shares)?;
        let bnb_out = math::mul_div(shares, self.bnb_reserve, self.total_lp_shares)?;

        self.equity_reserve -= equity_out;
        self.bnb_reserve -= bnb_out;
        self.total_lp_shares -= shares;
        let remaining = have - shares;
        if remaining == 0 {
            self.lp_shares.remove(&holder);
        } else {
            self.lp_shares.insert(holder, remaining);
        }

        let credit = self.lp_fee_credits.remove(&holder).unwrap_or(0);
        let bnb_out = bnb_out.checked_add(credit).ok_or(ExchangeError::Overflow)?;

        Ok((equity_out, bnb_out))
    }

    /// Settle a buy against the reserves. No fee on the buy side.
    pub fn apply_buy(&mut self, bnb_in: Amount) -> ExchangeResult<Amount> {
        let equity_out = math::swap_output(bnb_in, self.bnb_reserve, self.equity_reserve)?;
        if equity_out >= self.equity_reserve {
            return Err(ExchangeError::InsufficientLiquidity);
        }

        let k_before = self.k();
        self.bnb_reserve = self
            .bnb_reserve
            .checked_add(bnb_in)
            .ok_or(ExchangeError::Overflow)?;
        self.equity_reserve -= equity_out;
        if self.k() < k_before {
            return Err(ExchangeError::KInvariantViolation);
        }

        self.bnb_volume = self.bnb_volume.saturating_add(bnb_in);
        self.equity_volume = self.equity_volume.saturating_add(equity_out);

        Ok(equity_out)
    }

    /// Settle a sell against the reserves, splitting the fee.
    ///
    /// The LP portion folds back into the BNB reserve; LPs realize it
    /// when they remove liquidity, not as a push payment. The protocol
    /// portion accrues for withdrawal.
    pub fn apply_sell(
        &mut self,
        equity_in: Amount,
        fee_bps: Bps,
        lp_share_bps: Bps,
    ) -> ExchangeResult<SellOutcome> {
        let raw_bnb_out = math::swap_output(equity_in, self.equity_reserve, self.bnb_reserve)?;
        if raw_bnb_out >= self.bnb_reserve {
            return Err(ExchangeError::InsufficientLiquidity);
        }

        let fee = math::mul_div(raw_bnb_out, fee_bps as Amount, FEE_DENOM)?;
        let net_bnb_out = raw_bnb_out - fee;
        let lp_fee = math::mul_div(fee, lp_share_bps as Amount, FEE_DENOM)?;
        let protocol_fee = fee - lp_fee;

        let k_before = self.k();
        self.equity_reserve = self
            .equity_reserve
            .checked_add(equity_in)
            .ok_or(ExchangeError::Overflow)?;
        self.bnb_reserve = self.bnb_reserve - raw_bnb_out + lp_fee;
        if self.k() < k_before {
            return Err(ExchangeError::KInvariantViolation);
        }

        self.protocol_fees_accrued = self
            .protocol_fees_accrued
            .checked_add(protocol_fee)
            .ok_or(ExchangeError::Overflow)?;

        self.bnb_volume = self.bnb_volume.saturating_add(raw_bnb_out);
        self.equity_volume = self.equity_volume.saturating_add(equity_in);

        Ok(SellOutcome {
            net_bnb_out,
            fee,
            lp_fee,
            protocol_fee,
        })
    }

    /// Return and zero the accrued protocol fees.
    pub fn withdraw_protocol_fees(&mut self) -> ExchangeResult<Amount> {
        if self.protocol_fees_accrued == 0 {
            return Err(ExchangeError::NoFeesAccrued);
        }
        Ok(std::mem::take(&mut self.protocol_fees_accrued))
    }

    // === Circuit breaker, against current reserves ===

    /// Pre-trade gate; returns `true` when the window rolled over.
    pub fn advance_or_halt(&mut self, now: BlockHeight, window_blocks: u64) -> ExchangeResult<bool> {
        let (bnb, equity) = (self.bnb_reserve, self.equity_reserve);
        self.circuit.advance_or_halt(bnb, equity, now, window_blocks)
    }

    /// Bound check against current (post-trade) reserves, without
    /// committing the trip.
    pub fn breach_side(&self, cfg: &CircuitConfig) -> ExchangeResult<Option<BreachSide>> {
        self.circuit
            .breach_side(cfg, self.bnb_reserve, self.equity_reserve)
    }

    /// Commit a previously detected breach.
    pub fn trip_circuit(&mut self, side: BreachSide, cfg: &CircuitConfig, now: BlockHeight) {
        self.circuit.trip(side, cfg, now);
    }

    // === Hold-duration ledger ===

    /// Hold record for a holder, created lazily on first access.
    pub fn holding_mut(&mut self, holder: Address) -> &mut HoldRecord {
        self.holdings.entry(holder).or_default()
    }

    /// Hold record for a holder, if any acquisition was ever tracked.
    pub fn holding(&self, holder: &Address) -> Option<&HoldRecord> {
        self.holdings.get(holder)
    }

    /// Resolve the sell-fee tier for a holder at `now`.
    pub fn sell_fee_tier(
        &self,
        seller: &Address,
        now: BlockHeight,
        short_term_blocks: u64,
        short_bps: Bps,
        long_bps: Bps,
    ) -> Bps {
        self.holdings
            .get(seller)
            .map_or(short_bps, |record| {
                record.fee_tier(now, short_term_blocks, short_bps, long_bps)
            })
    }

    // === Getters ===

    pub fn pool_id(&self) -> PoolId {
        self.pool_id
    }

    pub fn asset(&self) -> AssetId {
        self.asset
    }

    pub fn reserves(&self) -> (Amount, Amount) {
        (self.equity_reserve, self.bnb_reserve)
    }

    pub fn total_lp_shares(&self) -> Amount {
        self.total_lp_shares
    }

    /// Shares held by one provider
    pub fn lp_share_of(&self, holder: &Address) -> Amount {
        self.lp_shares.get(holder).copied().unwrap_or(0)
    }

    /// All LP positions
    pub fn lp_shares(&self) -> &HashMap<Address, Amount> {
        &self.lp_shares
    }

    pub fn protocol_fees_accrued(&self) -> Amount {
        self.protocol_fees_accrued
    }

    pub fn circuit(&self) -> &CircuitState {
        &self.circuit
    }

    /// Constant-product value of the current reserves
    pub fn k(&self) -> u128 {
        self.equity_reserve as u128 * self.bnb_reserve as u128
    }

    /// Point-in-time snapshot for host-side display
    pub fn state(&self) -> PoolState {
        PoolState {
            equity_reserve: self.equity_reserve,
            bnb_reserve: self.bnb_reserve,
            total_lp_shares: self.total_lp_shares,
            protocol_fees_accrued: self.protocol_fees_accrued,
            circuit_broken: self.circuit.is_broken(),
            halted_until: self.circuit.halted_until(),
            window_start: self.circuit.window_start(),
            bnb_volume: self.bnb_volume,
            equity_volume: self.equity_volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_address(id: u8) -> Address {
        Address::new([id; 32])
    }

    fn test_asset(id: u8) -> AssetId {
        AssetId::new([id; 32])
    }

    fn shares_sum(pool: &Pool) -> Amount {
        pool.lp_shares().values().sum()
    }

    fn test_pool() -> Pool {
        Pool::bootstrap(test_asset(1), 100_000, 10_000, test_address(1), 0)
    }

    // ========================================================================
    // Bootstrap
    // ========================================================================

    #[test]
    fn test_bootstrap_assigns_all_shares_to_provider() {
        let pool = test_pool();
        assert_eq!(pool.reserves(), (100_000, 10_000));
        assert_eq!(pool.total_lp_shares(), 100_000);
        assert_eq!(pool.lp_share_of(&test_address(1)), 100_000);
        assert_eq!(pool.circuit().reference(), (10_000, 100_000));
        assert_eq!(shares_sum(&pool), pool.total_lp_shares());
    }

    #[test]
    fn test_pool_id_deterministic_and_unique() {
        let a = derive_pool_id(&test_asset(1));
        let b = derive_pool_id(&test_asset(1));
        let c = derive_pool_id(&test_asset(2));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    // ========================================================================
    // Liquidity
    // ========================================================================

    #[test]
    fn test_add_liquidity_matches_ratio() {
        let mut pool = test_pool();
        let provider = test_address(2);

        // 1_000 BNB at a 10:1 equity:BNB ratio matches 10_000 equity
        let quote = pool.add_liquidity(provider, 1_000, 50_000).unwrap();
        assert_eq!(quote.equity_actual, 10_000);
        assert_eq!(quote.bnb_actual, 1_000);
        assert_eq!(quote.shares_issued, 10_000);

        assert_eq!(pool.reserves(), (110_000, 11_000));
        assert_eq!(pool.total_lp_shares(), 110_000);
        assert_eq!(shares_sum(&pool), pool.total_lp_shares());
    }

    #[test]
    fn test_add_liquidity_capped_by_desired_equity() {
        let mut pool = test_pool();

        let quote = pool.add_liquidity(test_address(2), 1_000, 4_000).unwrap();
        assert_eq!(quote.equity_actual, 4_000);
        // BNB recomputed from the equity side: 4_000 * 10_000 / 100_000
        assert_eq!(quote.bnb_actual, 400);
        assert!(quote.bnb_actual <= 1_000);
    }

    #[test]
    fn test_add_liquidity_zero_computed_equity() {
        let mut pool = Pool::bootstrap(test_asset(1), 10, 1_000_000, test_address(1), 0);

        // 1 unit of BNB matches 10 * 1 / 1_000_000 = 0 equity
        let err = pool.add_liquidity(test_address(2), 1, 10).unwrap_err();
        assert_eq!(err, ExchangeError::ZeroComputedEquity);
    }

    #[test]
    fn test_remove_liquidity_round_trip_within_one_unit() {
        let mut pool = test_pool();
        let provider = test_address(2);

        let quote = pool.add_liquidity(provider, 1_000, 10_000).unwrap();
        let (equity_out, bnb_out) = pool.remove_liquidity(provider, quote.shares_issued).unwrap();

        assert!(quote.equity_actual - equity_out <= 1);
        assert!(quote.bnb_actual - bnb_out <= 1);
        assert_eq!(pool.lp_share_of(&provider), 0);
        assert_eq!(shares_sum(&pool), pool.total_lp_shares());
    }

    #[test]
    fn test_remove_liquidity_insufficient_shares() {
        let mut pool = test_pool();

        let err = pool.remove_liquidity(test_address(2), 1).unwrap_err();
        assert_eq!(
            err,
            ExchangeError::InsufficientShares {
                have: 0,
                requested: 1
            }
        );

        let err = pool.remove_liquidity(test_address(1), 0).unwrap_err();
        assert_eq!(
            err,
            ExchangeError::InsufficientShares {
                have: 100_000,
                requested: 0
            }
        );
    }

    // ========================================================================
    // Buy / Sell
    // ========================================================================

    #[test]
    fn test_apply_buy_moves_reserves() {
        let mut pool = test_pool();
        let k_before = pool.k();

        // 100_000 * 100 / (10_000 + 100) = 990 (floor)
        let equity_out = pool.apply_buy(100).unwrap();
        assert_eq!(equity_out, 990);
        assert_eq!(pool.reserves(), (99_010, 10_100));
        assert!(pool.k() >= k_before);
    }

    #[test]
    fn test_apply_sell_splits_fee_exactly() {
        let mut pool = test_pool();

        // raw = 10_000 * 50_000 / 150_000 = 3_333
        let outcome = pool.apply_sell(50_000, 45, 5_000).unwrap();
        let raw = outcome.net_bnb_out + outcome.fee;
        assert_eq!(raw, 3_333);
        assert_eq!(outcome.fee, 3_333 * 45 / 10_000);
        assert!(outcome.fee > 0);
        assert_eq!(outcome.lp_fee + outcome.protocol_fee, outcome.fee);
        assert_eq!(pool.protocol_fees_accrued(), outcome.protocol_fee);

        // equity grows by the input; BNB drops by raw minus the LP cut
        assert_eq!(pool.reserves(), (150_000, 10_000 - raw + outcome.lp_fee));
    }

    #[test]
    fn test_sell_fee_inflates_reserves_for_lps() {
        let mut pool = test_pool();

        // A large sell at the short-term tier leaves a visible LP fee
        let outcome = pool.apply_sell(50_000, 4_500, 5_000).unwrap();
        assert!(outcome.lp_fee > 0);
        let (_, bnb_reserve) = pool.reserves();
        // Reserve keeps the LP cut: higher than a fee-less sell would leave
        assert_eq!(bnb_reserve, 10_000 - (outcome.net_bnb_out + outcome.fee) + outcome.lp_fee);
    }

    #[test]
    fn test_k_monotonic_across_trade_sequence() {
        let mut pool = test_pool();
        let mut k = pool.k();

        for (is_buy, amount) in [
            (true, 500u64),
            (false, 2_000),
            (true, 9_999),
            (false, 50),
            (true, 1),
        ] {
            if is_buy {
                pool.apply_buy(amount).unwrap();
            } else {
                pool.apply_sell(amount, 45, 5_000).unwrap();
            }
            assert!(pool.k() >= k);
            k = pool.k();
        }
    }

    #[test]
    fn test_huge_trade_never_drains_a_reserve() {
        let mut pool = test_pool();

        pool.apply_buy(u64::MAX / 4).unwrap();
        let (equity, _) = pool.reserves();
        assert!(equity > 0);

        let mut pool = test_pool();
        pool.apply_sell(u64::MAX / 4, 45, 5_000).unwrap();
        let (_, bnb) = pool.reserves();
        assert!(bnb > 0);
    }

    #[test]
    fn test_withdraw_protocol_fees() {
        let mut pool = test_pool();
        pool.apply_sell(50_000, 4_500, 5_000).unwrap();

        let accrued = pool.protocol_fees_accrued();
        assert!(accrued > 0);
        assert_eq!(pool.withdraw_protocol_fees().unwrap(), accrued);
        assert_eq!(pool.protocol_fees_accrued(), 0);
        assert_eq!(
            pool.withdraw_protocol_fees().unwrap_err(),
            ExchangeError::NoFeesAccrued
        );
    }

    // ========================================================================
    // Fee tier plumbing
    // ========================================================================

    #[test]
    fn test_sell_fee_tier_defaults_to_short_for_unknown_holder() {
        let pool = test_pool();
        assert_eq!(
            pool.sell_fee_tier(&test_address(9), 1_000_000, 100, 45, 2),
            45
        );
    }

    #[test]
    fn test_sell_fee_tier_tracks_holding_age() {
        let mut pool = test_pool();
        let buyer = test_address(3);
        pool.holding_mut(buyer).record_acquisition(500, 1_000).unwrap();

        assert_eq!(pool.sell_fee_tier(&buyer, 1_099, 100, 45, 2), 45);
        assert_eq!(pool.sell_fee_tier(&buyer, 1_100, 100, 45, 2), 2);
    }
}
