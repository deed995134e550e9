use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::types::EventSnapshot;

/// Source of point-in-time event snapshots. The live monitor knows nothing
/// about how a snapshot is obtained.
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    async fn fetch_snapshot(&self, external_ref: &str) -> Result<EventSnapshot>;
}

/// Fetches a structured JSON snapshot over HTTP:
///
/// ```json
/// {"status": "live", "bouts": [{"winner_side": "red", "method": "KO/TKO",
///   "round": 2, "time_sec": 100, "result": "KO/TKO R2 1:40"}]}
/// ```
///
/// Bouts are listed in card order. Missing fields default to "no signal".
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SnapshotFetcher for HttpFetcher {
    async fn fetch_snapshot(&self, external_ref: &str) -> Result<EventSnapshot> {
        let resp = self
            .client
            .get(external_ref)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::FetchStatus {
                status: status.as_u16(),
                url: external_ref.to_string(),
            });
        }

        let body = resp.text().await?;
        let snapshot = parse_snapshot(&body)?;
        debug!(
            url = external_ref,
            status = %snapshot.status,
            bouts = snapshot.bouts.len(),
            "Fetched event snapshot"
        );
        Ok(snapshot)
    }
}

/// Decodes a snapshot body. A body without a `bouts` array is an event with
/// no outcome data yet, not an error.
pub fn parse_snapshot(body: &str) -> Result<EventSnapshot> {
    Ok(serde_json::from_str(body)?)
}
