//! Circuit-Breaker State Machine
//!
//! Each pool carries the reserve ratio snapshotted at the start of a
//! rolling window as its reference price, plus a halt flag. The gate runs
//! before every trade; the bound check runs after the trade has settled.
//! The breaching print clears; protection binds subsequent trades only.
//!
//! # States
//! ```text
//!   ┌──────┐   breach    ┌────────┐  halt expiry  ┌──────────┐
//!   │ Open │ ──────────▶ │ Halted │ ────────────▶ │ Resuming │
//!   └──────┘             └────────┘               └──────────┘
//!       ▲                                              │
//!       └──────────── next trade's pre-check ──────────┘
//! ```
//!
//! `Halted` rejects trades. `Resuming` is observable only until the next
//! trade's pre-check re-snapshots the window off current reserves: a pool
//! coming out of a halt protects relative to a fresh reference
//! immediately, not after the original window would have lapsed.

use lib_types::{Amount, BlockHeight};
use serde::{Deserialize, Serialize};

use crate::error::{ExchangeError, ExchangeResult};

/// Per-asset circuit-breaker configuration, owned by the asset component
/// and fetched fresh for every breach evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitConfig {
    /// Upper deviation bound in whole percent (0-100)
    pub upper_pct: u8,
    /// Lower deviation bound in whole percent (0-100)
    pub lower_pct: u8,
    /// Blocks a breach halts trading for (> 0)
    pub halt_blocks: u64,
}

/// Which bound a trade pushed the price through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreachSide {
    Upper,
    Lower,
}

impl BreachSide {
    pub fn is_upper(&self) -> bool {
        matches!(self, BreachSide::Upper)
    }
}

/// Reference price, rolling window and halt status for one pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitState {
    /// Reference numerator: BNB reserve at window start
    reference_bnb: Amount,
    /// Reference denominator: equity reserve at window start; never zero
    /// while the pool exists
    reference_equity: Amount,
    /// Block the current window opened at
    window_start: BlockHeight,
    /// Breaker tripped
    broken: bool,
    /// First block trading may resume at, meaningful while `broken`
    halted_until: BlockHeight,
}

impl CircuitState {
    /// Open the state machine off the pool's bootstrap reserves.
    pub fn open(bnb_reserve: Amount, equity_reserve: Amount, now: BlockHeight) -> Self {
        Self {
            reference_bnb: bnb_reserve,
            reference_equity: equity_reserve,
            window_start: now,
            broken: false,
            halted_until: 0,
        }
    }

    /// Pre-trade gate.
    ///
    /// Rejects while halted. Rolls the window over when a halt has expired
    /// or when the window lapsed naturally; returns `true` when it did so,
    /// so the caller can emit the reset event.
    pub fn advance_or_halt(
        &mut self,
        bnb_reserve: Amount,
        equity_reserve: Amount,
        now: BlockHeight,
        window_blocks: u64,
    ) -> ExchangeResult<bool> {
        if self.broken {
            if now < self.halted_until {
                return Err(ExchangeError::TradingHalted {
                    resumes_at: self.halted_until,
                });
            }
            self.reset_window(bnb_reserve, equity_reserve, now);
            return Ok(true);
        }

        if now >= self.window_start.saturating_add(window_blocks) {
            self.reset_window(bnb_reserve, equity_reserve, now);
            return Ok(true);
        }

        Ok(false)
    }

    /// Post-trade bound check without committing the trip.
    ///
    /// Returns `None` when already broken (repeated calls inside one
    /// logical operation are no-ops). Both bounds are compared by
    /// cross-multiplication; no division means no precision loss and no
    /// zero-denominator fault. The products are `u128`-checked: an
    /// overflow here is a defect-class condition, not bad input.
    pub fn breach_side(
        &self,
        cfg: &CircuitConfig,
        bnb_reserve: Amount,
        equity_reserve: Amount,
    ) -> ExchangeResult<Option<BreachSide>> {
        if self.broken {
            return Ok(None);
        }

        // current/ref > (100 + upper)/100
        //   ⇔ bnb * ref_equity * 100 > ref_bnb * equity * (100 + upper)
        let lhs = (bnb_reserve as u128)
            .checked_mul(self.reference_equity as u128)
            .ok_or(ExchangeError::Overflow)?
            .checked_mul(100)
            .ok_or(ExchangeError::Overflow)?;

        let rhs_base = (self.reference_bnb as u128)
            .checked_mul(equity_reserve as u128)
            .ok_or(ExchangeError::Overflow)?;

        let upper_rhs = rhs_base
            .checked_mul(100 + cfg.upper_pct as u128)
            .ok_or(ExchangeError::Overflow)?;
        if lhs > upper_rhs {
            return Ok(Some(BreachSide::Upper));
        }

        let lower_rhs = rhs_base
            .checked_mul(100u128.saturating_sub(cfg.lower_pct as u128))
            .ok_or(ExchangeError::Overflow)?;
        if lhs < lower_rhs {
            return Ok(Some(BreachSide::Lower));
        }

        Ok(None)
    }

    /// Commit a breach: trip the breaker and set the resume height.
    pub fn trip(&mut self, side: BreachSide, cfg: &CircuitConfig, now: BlockHeight) {
        self.broken = true;
        self.halted_until = now.saturating_add(cfg.halt_blocks);
        tracing::warn!(
            ?side,
            halted_until = self.halted_until,
            "circuit breaker tripped"
        );
    }

    /// One-shot breach evaluation: check and, on a breach, trip.
    pub fn evaluate_breach(
        &mut self,
        cfg: &CircuitConfig,
        bnb_reserve: Amount,
        equity_reserve: Amount,
        now: BlockHeight,
    ) -> ExchangeResult<Option<BreachSide>> {
        let side = self.breach_side(cfg, bnb_reserve, equity_reserve)?;
        if let Some(side) = side {
            self.trip(side, cfg, now);
        }
        Ok(side)
    }

    /// Re-snapshot the reference price off current reserves and restart
    /// the window, clearing any halt. Lazy: only a trade triggers this.
    pub fn reset_window(&mut self, bnb_reserve: Amount, equity_reserve: Amount, now: BlockHeight) {
        self.broken = false;
        self.reference_bnb = bnb_reserve;
        self.reference_equity = equity_reserve;
        self.window_start = now;
        tracing::info!(
            reference_bnb = bnb_reserve,
            reference_equity = equity_reserve,
            window_start = now,
            "reference window reset"
        );
    }

    /// Breaker tripped and not yet rolled over
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// First block trading may resume at; meaningful while broken
    pub fn halted_until(&self) -> BlockHeight {
        self.halted_until
    }

    /// Block the current window opened at
    pub fn window_start(&self) -> BlockHeight {
        self.window_start
    }

    /// Current reference price as (BNB reserve, equity reserve) at window
    /// start
    pub fn reference(&self) -> (Amount, Amount) {
        (self.reference_bnb, self.reference_equity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: u64 = 28_800;

    fn test_config() -> CircuitConfig {
        CircuitConfig {
            upper_pct: 10,
            lower_pct: 10,
            halt_blocks: 100,
        }
    }

    #[test]
    fn test_open_snapshots_reference() {
        let state = CircuitState::open(10, 100_000, 50);
        assert_eq!(state.reference(), (10, 100_000));
        assert_eq!(state.window_start(), 50);
        assert!(!state.is_broken());
    }

    #[test]
    fn test_within_bounds_is_quiet() {
        let mut state = CircuitState::open(10_000, 100_000, 0);
        let cfg = test_config();

        // 5% up: inside the 10% band
        let side = state.evaluate_breach(&cfg, 10_500, 100_000, 10).unwrap();
        assert_eq!(side, None);
        assert!(!state.is_broken());
    }

    #[test]
    fn test_upper_breach_trips_and_sets_resume_height() {
        let mut state = CircuitState::open(10_000, 100_000, 0);
        let cfg = test_config();

        // 11% above reference with the same equity reserve
        let side = state.evaluate_breach(&cfg, 11_100, 100_000, 40).unwrap();
        assert_eq!(side, Some(BreachSide::Upper));
        assert!(state.is_broken());
        assert_eq!(state.halted_until(), 140);
    }

    #[test]
    fn test_lower_breach() {
        let mut state = CircuitState::open(10_000, 100_000, 0);
        let cfg = test_config();

        let side = state.evaluate_breach(&cfg, 8_900, 100_000, 40).unwrap();
        assert_eq!(side, Some(BreachSide::Lower));
    }

    #[test]
    fn test_exact_bound_is_not_a_breach() {
        let mut state = CircuitState::open(10_000, 100_000, 0);
        let cfg = test_config();

        // Exactly +10% and exactly -10%: strict comparisons, no trip
        assert_eq!(
            state.evaluate_breach(&cfg, 11_000, 100_000, 1).unwrap(),
            None
        );
        assert_eq!(
            state.evaluate_breach(&cfg, 9_000, 100_000, 2).unwrap(),
            None
        );
    }

    #[test]
    fn test_already_broken_skips_evaluation() {
        let mut state = CircuitState::open(10_000, 100_000, 0);
        let cfg = test_config();

        state.evaluate_breach(&cfg, 20_000, 100_000, 10).unwrap();
        assert!(state.is_broken());
        let halted_until = state.halted_until();

        // A second evaluation in the same logical operation is a no-op
        let side = state.evaluate_breach(&cfg, 40_000, 100_000, 11).unwrap();
        assert_eq!(side, None);
        assert_eq!(state.halted_until(), halted_until);
    }

    #[test]
    fn test_halt_rejects_until_expiry_then_resets() {
        let mut state = CircuitState::open(10_000, 100_000, 0);
        let cfg = test_config();
        state.evaluate_breach(&cfg, 20_000, 100_000, 10).unwrap();
        let resume = state.halted_until();

        // One block early: rejected, with the resume height attached
        let err = state
            .advance_or_halt(20_000, 90_000, resume - 1, WINDOW)
            .unwrap_err();
        assert_eq!(err, ExchangeError::TradingHalted { resumes_at: resume });

        // At expiry: the window resets off the *current* reserves
        let reset = state.advance_or_halt(20_000, 90_000, resume, WINDOW).unwrap();
        assert!(reset);
        assert!(!state.is_broken());
        assert_eq!(state.reference(), (20_000, 90_000));
        assert_eq!(state.window_start(), resume);
    }

    #[test]
    fn test_natural_window_expiry_resets() {
        let mut state = CircuitState::open(10_000, 100_000, 0);

        // Inside the window nothing changes
        let reset = state
            .advance_or_halt(12_000, 95_000, WINDOW - 1, WINDOW)
            .unwrap();
        assert!(!reset);
        assert_eq!(state.reference(), (10_000, 100_000));

        let reset = state.advance_or_halt(12_000, 95_000, WINDOW, WINDOW).unwrap();
        assert!(reset);
        assert_eq!(state.reference(), (12_000, 95_000));
    }

    #[test]
    fn test_reset_window_idempotent() {
        let mut state = CircuitState::open(10_000, 100_000, 0);
        state.reset_window(11_000, 99_000, 500);
        let snapshot = state.clone();

        state.reset_window(11_000, 99_000, 500);
        assert_eq!(state, snapshot);
    }

    #[test]
    fn test_breach_overflow_is_surfaced() {
        let state = CircuitState::open(u64::MAX, u64::MAX, 0);
        let cfg = test_config();

        let err = state.breach_side(&cfg, u64::MAX, u64::MAX).unwrap_err();
        assert_eq!(err, ExchangeError::Overflow);
    }
}
