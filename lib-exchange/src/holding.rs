//! Hold-Duration Ledger
//!
//! Tracks the weighted-average acquisition height per (asset, holder) and
//! resolves the sell-side fee tier from it. All held units are treated as
//! fungible with a shared average age: a disposal removes a proportional
//! slice of the history rather than FIFO/LIFO lots, so the average age of
//! the remaining units is unchanged by a partial sale.

use lib_types::{Amount, BlockHeight, Bps};
use serde::{Deserialize, Serialize};

use crate::error::{ExchangeError, ExchangeResult};

/// Weighted acquisition history for one holder of one asset.
///
/// `total_amount` mirrors the holder's tracked balance in this accounting.
/// It is maintained independently of the actual token balance; a
/// divergence between the two is a bug, not a protocol state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldRecord {
    /// Σ(amount × acquisition height) over never-fully-disposed acquisitions
    weighted_height_sum: u128,
    /// Currently tracked balance
    total_amount: Amount,
}

impl HoldRecord {
    /// Fold a new acquisition into the weighted history.
    pub fn record_acquisition(&mut self, amount: Amount, at: BlockHeight) -> ExchangeResult<()> {
        let weighted = (amount as u128)
            .checked_mul(at as u128)
            .ok_or(ExchangeError::Overflow)?;
        self.weighted_height_sum = self
            .weighted_height_sum
            .checked_add(weighted)
            .ok_or(ExchangeError::Overflow)?;
        self.total_amount = self
            .total_amount
            .checked_add(amount)
            .ok_or(ExchangeError::Overflow)?;
        Ok(())
    }

    /// Remove a disposal from the history.
    ///
    /// A disposal of the full tracked balance (or more) zeroes the record,
    /// resetting the holder's fee-tier history. A partial disposal scales
    /// the weighted sum down proportionally.
    pub fn record_disposal(&mut self, amount: Amount) -> ExchangeResult<()> {
        if amount >= self.total_amount {
            self.weighted_height_sum = 0;
            self.total_amount = 0;
            return Ok(());
        }

        let remaining = self.total_amount - amount;
        self.weighted_height_sum = self
            .weighted_height_sum
            .checked_mul(remaining as u128)
            .ok_or(ExchangeError::Overflow)?
            / self.total_amount as u128;
        self.total_amount = remaining;
        Ok(())
    }

    /// Resolve the sell-fee tier for this holder.
    ///
    /// Never-tracked and fully-exited holders default to the short-term
    /// tier.
    pub fn fee_tier(
        &self,
        now: BlockHeight,
        short_term_blocks: u64,
        short_bps: Bps,
        long_bps: Bps,
    ) -> Bps {
        match self.average_acquisition_height() {
            Some(avg) if now.saturating_sub(avg) >= short_term_blocks => long_bps,
            _ => short_bps,
        }
    }

    /// Weighted-average acquisition height, `None` when nothing is tracked.
    pub fn average_acquisition_height(&self) -> Option<BlockHeight> {
        if self.total_amount == 0 {
            return None;
        }
        Some((self.weighted_height_sum / self.total_amount as u128) as BlockHeight)
    }

    /// Currently tracked balance
    pub fn total_amount(&self) -> Amount {
        self.total_amount
    }

    /// True when nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.total_amount == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHORT_TERM: u64 = 864_000;
    const SHORT_BPS: Bps = 45;
    const LONG_BPS: Bps = 2;

    #[test]
    fn test_acquisition_accumulates_weighted_history() {
        let mut record = HoldRecord::default();
        record.record_acquisition(100, 1_000).unwrap();
        assert_eq!(record.total_amount(), 100);
        assert_eq!(record.average_acquisition_height(), Some(1_000));

        record.record_acquisition(200, 2_000).unwrap();
        assert_eq!(record.total_amount(), 300);
        // (100*1000 + 200*2000) / 300 = 1666 (floor)
        assert_eq!(record.average_acquisition_height(), Some(1_666));
    }

    #[test]
    fn test_partial_disposal_keeps_average_age() {
        let mut record = HoldRecord::default();
        record.record_acquisition(100, 1_000).unwrap();
        record.record_acquisition(200, 2_000).unwrap();

        record.record_disposal(100).unwrap();
        assert_eq!(record.total_amount(), 200);
        // 500_000 * 200 / 300 = 333_333; average unchanged at 1666
        assert_eq!(record.average_acquisition_height(), Some(1_666));
    }

    #[test]
    fn test_full_disposal_resets_history() {
        let mut record = HoldRecord::default();
        record.record_acquisition(500, 9_000).unwrap();

        record.record_disposal(500).unwrap();
        assert!(record.is_empty());
        assert_eq!(record.average_acquisition_height(), None);

        // Over-disposal behaves the same as a full exit
        record.record_acquisition(10, 100).unwrap();
        record.record_disposal(10_000).unwrap();
        assert!(record.is_empty());
    }

    #[test]
    fn test_fee_tier_boundary() {
        let mut record = HoldRecord::default();
        let acquired_at = 5_000;
        record.record_acquisition(1_000, acquired_at).unwrap();

        let just_short = acquired_at + SHORT_TERM - 1;
        let exactly = acquired_at + SHORT_TERM;
        assert_eq!(
            record.fee_tier(just_short, SHORT_TERM, SHORT_BPS, LONG_BPS),
            SHORT_BPS
        );
        assert_eq!(
            record.fee_tier(exactly, SHORT_TERM, SHORT_BPS, LONG_BPS),
            LONG_BPS
        );
    }

    #[test]
    fn test_fee_tier_defaults_to_short() {
        let record = HoldRecord::default();
        assert_eq!(
            record.fee_tier(u64::MAX, SHORT_TERM, SHORT_BPS, LONG_BPS),
            SHORT_BPS
        );
    }
}
