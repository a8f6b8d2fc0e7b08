use chrono::{DateTime, Datelike, Utc};

use crate::services::http;

const EXCHANGE_URL: &str = "https://api.coingecko.com/api/v3";

/// Historical SOL/USD rates, resolved by UTC calendar date rather than exact
/// instant.
pub struct PriceService {
    client: reqwest::Client,
}

impl PriceService {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub async fn sol_usd_at(
        &self,
        timestamp_ms: i64,
    ) -> Result<f64, Box<dyn std::error::Error + Send + Sync>> {
        let datetime = DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
            .ok_or("price timestamp out of range")?;
        let url = format!("{}/coins/solana/history", EXCHANGE_URL);
        let data = http::get_json(
            &self.client,
            &url,
            &[
                ("localization", "false".to_string()),
                ("date", format_history_date(&datetime)),
            ],
        )
        .await?;
        data["market_data"]["current_price"]["usd"]
            .as_f64()
            .ok_or_else(|| "malformed price history response".into())
    }
}

/// CoinGecko's history endpoint takes dd-mm-yyyy, without zero padding.
fn format_history_date(datetime: &DateTime<Utc>) -> String {
    format!(
        "{}-{}-{}",
        datetime.day(),
        datetime.month(),
        datetime.year()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_utc_calendar_date() {
        // 2023-11-15T00:00:00Z
        let datetime = DateTime::<Utc>::from_timestamp_millis(1_700_006_400_000).unwrap();
        assert_eq!(format_history_date(&datetime), "15-11-2023");
    }

    #[test]
    fn single_digit_day_and_month_are_unpadded() {
        // 2024-03-05T12:00:00Z
        let datetime = DateTime::<Utc>::from_timestamp_millis(1_709_640_000_000).unwrap();
        assert_eq!(format_history_date(&datetime), "5-3-2024");
    }
}
