use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Result;

use crate::models::RecordSet;

pub mod tushare_client;
pub use tushare_client::TushareClient;

/// Simple rate limiter for API requests
pub struct ApiRateLimiter {
    delay_ms: u64,
}

impl ApiRateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        let delay_ms = if requests_per_minute > 0 {
            60_000 / requests_per_minute as u64
        } else {
            1000 // Default 1 second delay
        };

        Self { delay_ms }
    }

    pub async fn wait(&self) {
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
    }
}

/// One query against the upstream tabular source: an endpoint name,
/// string parameters, and the output columns to request. Pure data,
/// transport-agnostic.
#[derive(Debug, Clone, Default)]
pub struct ReportQuery {
    api_name: String,
    params: BTreeMap<String, String>,
    fields: Vec<String>,
}

impl ReportQuery {
    pub fn new(api_name: impl Into<String>) -> Self {
        Self {
            api_name: api_name.into(),
            ..Default::default()
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn api_name(&self) -> &str {
        &self.api_name
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Requested output columns in the comma-separated form the
    /// upstream API expects; empty when the caller wants all columns.
    pub fn fields_csv(&self) -> String {
        self.fields.join(",")
    }
}

/// Common trait for tabular report data sources
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ReportDataProvider: Send + Sync {
    async fn fetch_report(&self, query: &ReportQuery) -> Result<RecordSet>;
}
