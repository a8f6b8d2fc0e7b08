use chrono::{Months, Utc};
use log::warn;
use mongodb::Database;

use crate::repositories::reward_repository;

/// One epoch's slice of the APR window. Epochs with no reward record
/// contribute zeroes.
#[derive(Debug, Clone, Copy)]
pub struct EpochSlice {
    pub reward: i64,
    pub post_balance: i64,
}

/// Annualized yield estimate for a delegator over a trailing one-month
/// window of reward history. Returns 0 when there is no history or the
/// window's balances sum to zero. This is a monthly-throughput
/// approximation, not a compounding APR.
pub async fn find_apr_value(
    db: &Database,
    delegator_id: &str,
    latest_epoch: i64,
) -> Result<f64, mongodb::error::Error> {
    let window_start = match Utc::now().checked_sub_months(Months::new(1)) {
        Some(start) => start.timestamp_millis(),
        None => 0,
    };

    let window = reward_repository::find_since(db, delegator_id, window_start).await?;
    if window.is_empty() {
        return Ok(0.0);
    }

    // Window is sorted by timestamp ascending, so the first record is the
    // baseline epoch.
    let start_epoch = window[0].epoch_num;
    let num_epochs = latest_epoch - start_epoch + 1;
    if num_epochs <= 0 {
        warn!(
            "APR window for {} starts past the latest epoch ({} > {})",
            delegator_id, start_epoch, latest_epoch
        );
        return Ok(0.0);
    }

    let mut series = Vec::with_capacity(num_epochs as usize);
    for i in 0..num_epochs {
        let slice = match reward_repository::find_by_epoch(db, delegator_id, start_epoch + i).await?
        {
            Some(reward) => EpochSlice {
                reward: reward.reward,
                post_balance: reward.post_balance,
            },
            None => EpochSlice {
                reward: 0,
                post_balance: 0,
            },
        };
        series.push(slice);
    }

    Ok(annualized_rate(&series, num_epochs))
}

/// The baseline epoch's reward is pre-window accrual and is excluded from the
/// numerator; the final epoch's post balance is not yet a completed accrual
/// period and is excluded from the denominator.
pub fn annualized_rate(series: &[EpochSlice], num_epochs: i64) -> f64 {
    let mut total_amount: i64 = 0;
    let mut total_post_balance: i64 = 0;

    for (index, slice) in series.iter().enumerate() {
        if index != 0 {
            total_amount += slice.reward;
        }
        if index != series.len() - 1 {
            total_post_balance += slice.post_balance;
        }
    }

    let apr =
        (total_amount as f64 / total_post_balance as f64) * (num_epochs as f64 * 12.0) * 100.0;
    if apr.is_finite() {
        apr
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice(reward: i64, post_balance: i64) -> EpochSlice {
        EpochSlice {
            reward,
            post_balance,
        }
    }

    #[test]
    fn zero_post_balance_yields_zero_not_nan() {
        let series = [slice(10, 0), slice(20, 0), slice(30, 0)];
        assert_eq!(annualized_rate(&series, 3), 0.0);
    }

    #[test]
    fn empty_amounts_yield_zero() {
        let series = [slice(0, 0), slice(0, 0)];
        assert_eq!(annualized_rate(&series, 2), 0.0);
    }

    #[test]
    fn excludes_baseline_reward_and_final_post_balance() {
        // Baseline reward (100) and last post balance (9_999) must not count.
        let series = [slice(100, 1_000), slice(10, 1_000), slice(10, 9_999)];
        let expected = (20.0 / 2_000.0) * (3.0 * 12.0) * 100.0;
        assert_eq!(annualized_rate(&series, 3), expected);
    }

    #[test]
    fn gaps_contribute_nothing() {
        let with_gap = [slice(100, 1_000), slice(0, 0), slice(10, 1_000)];
        let expected = (10.0 / 1_000.0) * (3.0 * 12.0) * 100.0;
        assert_eq!(annualized_rate(&with_gap, 3), expected);
    }
}
