use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, warn};

use super::reading::{GlucoseReading, ReadingsEnvelope};
use crate::auth::TokenManager;
use crate::config::CgmConfig;
use crate::error::{CgmError, Result};
use crate::util::timeout::with_timeout;

/// Minutes of history queried by [`GlucoseClient::latest_reading`].
pub const LATEST_READING_WINDOW_MINUTES: i64 = 10;

/// Reads estimated glucose values for the authenticated identity.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use cgm_link::auth::{TokenManager, TokenStore};
/// use cgm_link::config::CgmConfig;
/// use cgm_link::readings::GlucoseClient;
/// use cgm_link::storage::MemoryKeyValueStore;
///
/// # async fn example() -> cgm_link::error::Result<()> {
/// let config = CgmConfig::from_env()?;
/// let store = TokenStore::new(Arc::new(MemoryKeyValueStore::new()));
/// let manager = Arc::new(TokenManager::new(&config, store)?);
/// let client = GlucoseClient::new(&config, manager);
///
/// if let Some(reading) = client.latest_reading().await? {
///     println!("{} mg/dL at {}", reading.value, reading.system_time);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct GlucoseClient {
    client: reqwest::Client,
    readings_url: String,
    timeout: Duration,
    tokens: Arc<TokenManager>,
}

impl GlucoseClient {
    pub fn new(config: &CgmConfig, tokens: Arc<TokenManager>) -> Self {
        Self {
            client: reqwest::Client::new(),
            readings_url: format!("{}/v3/users/self/egvs", config.base_url()),
            timeout: config.timeout,
            tokens,
        }
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn token_manager(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Readings with `start <= systemTime <= end`, in provider (chronological) order.
    pub async fn readings(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<GlucoseReading>> {
        if start > end {
            return Err(CgmError::InvalidArgument(format!(
                "start {start} is after end {end}"
            )));
        }

        let token = self.tokens.valid_access_token().await?;
        let start_date = format_query_time(start);
        let end_date = format_query_time(end);
        debug!(start = %start_date, end = %end_date, "requesting glucose readings");

        let request = async {
            let resp = self
                .client
                .get(&self.readings_url)
                .bearer_auth(&token)
                .header("Accept", "application/json")
                .query(&[("startDate", &start_date), ("endDate", &end_date)])
                .send()
                .await
                .map_err(|e| CgmError::transport(format!("readings request failed: {e}")))?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(CgmError::provider(
                    status.as_u16(),
                    format!("readings endpoint returned {status}: {}", truncate(&body, 200)),
                ));
            }
            let envelope: ReadingsEnvelope = resp
                .json()
                .await
                .map_err(|e| {
                    CgmError::provider(status.as_u16(), format!("invalid readings response: {e}"))
                })?;
            Ok(envelope.records)
        };

        let result = with_timeout(self.timeout, request, |d| {
            CgmError::transport(format!(
                "readings request timed out after {}ms",
                d.as_millis()
            ))
        })
        .await;

        match &result {
            Ok(records) => debug!(count = records.len(), "glucose readings received"),
            Err(err) => warn!(error = %err, "glucose readings request failed"),
        }
        result
    }

    /// Readings for the trailing `window` ending now.
    pub async fn readings_since(&self, window: chrono::Duration) -> Result<Vec<GlucoseReading>> {
        let end = Utc::now();
        self.readings(end - window, end).await
    }

    /// Most recent reading of the last ten minutes, or `None` if there is none.
    pub async fn latest_reading(&self) -> Result<Option<GlucoseReading>> {
        let window = chrono::Duration::minutes(LATEST_READING_WINDOW_MINUTES);
        Ok(self.readings_since(window).await?.pop())
    }
}

fn format_query_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
