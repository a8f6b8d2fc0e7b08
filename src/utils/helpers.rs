use chrono::{DateTime, NaiveTime, Utc};

pub const LAMPORTS_PER_SOL: i64 = 1_000_000_000;

/// Truncates an epoch-millisecond instant to UTC midnight of the same day.
/// Reward timestamps are keyed by calendar day so that re-runs landing on the
/// same day collide with (and replace) the tentative record.
pub fn truncate_to_utc_midnight(timestamp_ms: i64) -> i64 {
    let datetime = DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    datetime
        .date_naive()
        .and_time(NaiveTime::MIN)
        .and_utc()
        .timestamp_millis()
}

/// USD value of a lamport amount at the given SOL price.
pub fn convert_sol_usd(lamports: i64, sol_usd: f64) -> f64 {
    (lamports as f64 / LAMPORTS_PER_SOL as f64) * sol_usd
}

/// Parses an epoch reported by the chain as a decimal string. Stakes with no
/// scheduled deactivation report u64::MAX, which does not fit BSON's Int64;
/// anything past i64::MAX clamps to i64::MAX, the never-deactivating sentinel.
pub fn parse_clamped_epoch(raw: &str) -> Option<i64> {
    let value: u64 = raw.parse().ok()?;
    Some(i64::try_from(value).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_to_start_of_utc_day() {
        // 2023-11-15T17:42:31Z
        let truncated = truncate_to_utc_midnight(1_700_070_151_000);
        // 2023-11-15T00:00:00Z
        assert_eq!(truncated, 1_700_006_400_000);
    }

    #[test]
    fn midnight_is_a_fixed_point() {
        let midnight = 1_700_006_400_000;
        assert_eq!(truncate_to_utc_midnight(midnight), midnight);
    }

    #[test]
    fn converts_lamports_at_given_price() {
        assert_eq!(convert_sol_usd(LAMPORTS_PER_SOL, 25.0), 25.0);
        assert_eq!(convert_sol_usd(LAMPORTS_PER_SOL / 2, 30.0), 15.0);
        assert_eq!(convert_sol_usd(0, 100.0), 0.0);
    }

    #[test]
    fn clamps_never_deactivating_sentinel() {
        assert_eq!(parse_clamped_epoch("18446744073709551615"), Some(i64::MAX));
        assert_eq!(parse_clamped_epoch("512"), Some(512));
        assert_eq!(parse_clamped_epoch("not-a-number"), None);
        assert_eq!(parse_clamped_epoch("-3"), None);
    }
}
