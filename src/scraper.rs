use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{info, warn};

use crate::db::FetchRow;

const PORTAL_URL: &str = "https://www.student.apamaravathi.in/mymarks.php";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;

/// Fetch the marks page for one PIN, retrying with exponential backoff on
/// rate limits and server errors. Fetch failures come back as an error
/// row, never as an Err, so the attempt still lands in the cache.
pub async fn fetch_transcript_page(pin_id: i64, pin: &str) -> Result<FetchRow> {
    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(USER_AGENT)
        .cookie_store(true)
        .build()?;

    for attempt in 0..=MAX_RETRIES {
        let row = fetch_once(&client, pin_id, pin).await;

        let should_retry = match &row.error {
            Some(e) if e.contains("429") || e.contains("rate") => true,
            Some(e) if e.contains("500") || e.contains("502") || e.contains("503") => true,
            _ => false,
        };

        if !should_retry || attempt == MAX_RETRIES {
            return Ok(row);
        }

        let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
        warn!(
            "Portal error for {} (attempt {}/{}), backing off {:.1}s",
            pin,
            attempt + 1,
            MAX_RETRIES,
            backoff.as_secs_f64()
        );
        tokio::time::sleep(backoff).await;
    }

    Ok(fetch_once(&client, pin_id, pin).await)
}

async fn fetch_once(client: &reqwest::Client, pin_id: i64, pin: &str) -> FetchRow {
    let start = Instant::now();
    let result = submit_pin(client, pin).await;
    let elapsed = start.elapsed().as_millis() as i64;

    match result {
        Ok((status, html)) if (200..300).contains(&status) => {
            info!("Fetched marks page for {} in {}ms", pin, elapsed);
            FetchRow {
                pin_id,
                pin: pin.to_string(),
                html: Some(html),
                status: Some(status),
                error: None,
                latency_ms: Some(elapsed),
            }
        }
        Ok((status, _)) => FetchRow {
            pin_id,
            pin: pin.to_string(),
            html: None,
            status: Some(status),
            error: Some(format!("HTTP {status}")),
            latency_ms: Some(elapsed),
        },
        Err(e) => FetchRow {
            pin_id,
            pin: pin.to_string(),
            html: None,
            status: None,
            error: Some(e.to_string()),
            latency_ms: Some(elapsed),
        },
    }
}

/// The portal is a plain form page: load it once for the session cookie,
/// then post the PIN as the `rno` field.
async fn submit_pin(client: &reqwest::Client, pin: &str) -> Result<(i32, String)> {
    client.get(PORTAL_URL).send().await?;

    let response = client
        .post(PORTAL_URL)
        .form(&[("rno", pin), ("submit", "Submit")])
        .send()
        .await?;

    let status = response.status().as_u16() as i32;
    let html = response.text().await?;
    Ok((status, html))
}
