use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::{debug, info};
use serde_json::{Map, Value};

use crate::cache::{CacheEntry, CacheStore};
use crate::collectors::collector::{error_entry, store, CollectContext, Collector};
use crate::constants::{CREDENTIAL_REPORT_MAX_ATTEMPTS, CREDENTIAL_REPORT_POLL_DELAY_MS};

/// Generates the IAM credential report, waits for it, and stores its rows.
///
/// Each CSV row becomes one JSON record keyed by the report's header names
/// (`user`, `arn`, `access_key_1_last_used_date`, ...).
pub struct CredentialReportCollector {
    max_attempts: usize,
    poll_delay: Duration,
}

impl Default for CredentialReportCollector {
    fn default() -> Self {
        Self {
            max_attempts: CREDENTIAL_REPORT_MAX_ATTEMPTS,
            poll_delay: Duration::from_millis(CREDENTIAL_REPORT_POLL_DELAY_MS),
        }
    }
}

impl CredentialReportCollector {
    pub fn new(max_attempts: usize, poll_delay: Duration) -> Self {
        Self { max_attempts, poll_delay }
    }

    async fn wait_until_complete(&self, ctx: &CollectContext<'_>) -> Result<bool, crate::transport::ProviderError> {
        for attempt in 1..=self.max_attempts {
            let response = ctx.call("generateCredentialReport", Map::new()).await?;
            let state = response.get("State").and_then(Value::as_str).unwrap_or_default();
            debug!("Credential report state after attempt {}: {}", attempt, state);
            if state.eq_ignore_ascii_case("COMPLETE") {
                return Ok(true);
            }
            if attempt < self.max_attempts {
                tokio::time::sleep(self.poll_delay).await;
            }
        }
        Ok(false)
    }
}

/// Decode the base64 CSV report into records.
pub fn parse_report(content: &str) -> Result<Vec<Value>> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD.decode(compact).context("Credential report is not valid base64")?;

    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    let headers = reader.headers().context("Credential report has no header row")?.clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.context("Malformed credential report row")?;
        let record: Map<String, Value> = headers
            .iter()
            .zip(row.iter())
            .map(|(name, value)| (name.to_string(), Value::String(value.to_string())))
            .collect();
        records.push(Value::Object(record));
    }
    Ok(records)
}

#[async_trait::async_trait]
impl Collector for CredentialReportCollector {
    async fn collect(&self, ctx: &CollectContext<'_>, cache: &CacheStore) -> Result<()> {
        let key = ctx.slot();
        cache.reserve(key.clone());

        match self.wait_until_complete(ctx).await {
            Ok(true) => {}
            Ok(false) => bail!("Credential report was not ready after {} attempts", self.max_attempts),
            Err(e) => {
                store(cache, key.clone(), error_entry(&key, &e));
                return Ok(());
            }
        }

        let response = match ctx.call("getCredentialReport", Map::new()).await {
            Ok(response) => response,
            Err(e) => {
                store(cache, key.clone(), error_entry(&key, &e));
                return Ok(());
            }
        };

        let content = response
            .get("Content")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("Credential report response has no Content"))?;
        let records = parse_report(content)?;
        info!("Credential report for {} contains {} rows", ctx.region, records.len());

        store(cache, key, CacheEntry::with_data(Value::Array(records)));
        Ok(())
    }
}
