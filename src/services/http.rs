use log::{error, warn};
use serde_json::Value;
use tokio::time::{sleep, Duration};

const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(5);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(5 * 60);

/// POST a JSON body, retrying transient failures with exponential backoff:
/// first retry after 5 s, doubling, giving up once the next delay would
/// exceed 5 minutes. Callers treat a surfaced error as terminal for their
/// current unit of work.
pub async fn post_json(
    client: &reqwest::Client,
    url: &str,
    body: &Value,
) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
    let mut delay = INITIAL_RETRY_DELAY;
    loop {
        match try_post(client, url, body).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let next = delay * 2;
                if next > MAX_RETRY_DELAY {
                    error!("POST {} failed, retries exhausted: {}", url, e);
                    return Err(e);
                }
                warn!("POST {} failed ({}), retrying in {}s", url, e, delay.as_secs());
                sleep(delay).await;
                delay = next;
            }
        }
    }
}

/// GET with query parameters, same backoff policy as [`post_json`].
pub async fn get_json(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
    let mut delay = INITIAL_RETRY_DELAY;
    loop {
        match try_get(client, url, query).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let next = delay * 2;
                if next > MAX_RETRY_DELAY {
                    error!("GET {} failed, retries exhausted: {}", url, e);
                    return Err(e);
                }
                warn!("GET {} failed ({}), retrying in {}s", url, e, delay.as_secs());
                sleep(delay).await;
                delay = next;
            }
        }
    }
}

async fn try_post(
    client: &reqwest::Client,
    url: &str,
    body: &Value,
) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await?
        .error_for_status()?;
    Ok(response.json().await?)
}

async fn try_get(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
    let response = client
        .get(url)
        .query(query)
        .send()
        .await?
        .error_for_status()?;
    Ok(response.json().await?)
}
