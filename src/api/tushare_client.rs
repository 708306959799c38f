use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{Config, RecordSet};
use super::{ApiRateLimiter, ReportDataProvider, ReportQuery};

/// Errors reported by the Tushare Pro endpoint itself, as opposed to
/// transport failures.
#[derive(Debug, Error)]
pub enum TushareError {
    #[error("Tushare rejected the request (code {code}): {msg}")]
    Api { code: i64, msg: String },
    #[error("Tushare reply carried no data section")]
    MissingData,
}

/// Request envelope for the Tushare Pro HTTP API. Every endpoint is one
/// POST to the same URL with the endpoint name in the body.
#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    api_name: &'a str,
    token: &'a str,
    params: &'a BTreeMap<String, String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    fields: String,
}

#[derive(Debug, Deserialize)]
struct ApiReply {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<ReplyData>,
}

#[derive(Debug, Deserialize)]
struct ReplyData {
    fields: Vec<String>,
    items: Vec<Vec<Value>>,
}

/// Tushare Pro API client
pub struct TushareClient {
    client: Client,
    token: String,
    api_url: String,
    rate_limiter: ApiRateLimiter,
}

impl TushareClient {
    /// Create a new Tushare client from explicit configuration. The
    /// token travels with the client instance; nothing is stored in
    /// process-global state.
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .user_agent("tushare-reports/0.1")
            .build()?;

        let rate_limiter = ApiRateLimiter::new(config.rate_limit_per_minute);

        Ok(Self {
            client,
            token: config.tushare_token.clone(),
            api_url: config.api_url.clone(),
            rate_limiter,
        })
    }

    /// Execute one query and decode the tabular reply.
    async fn call(&self, query: &ReportQuery) -> Result<RecordSet> {
        self.rate_limiter.wait().await;

        let body = ApiRequest {
            api_name: query.api_name(),
            token: &self.token,
            params: query.params(),
            fields: query.fields_csv(),
        };

        debug!("Calling Tushare endpoint '{}'", query.api_name());

        let response = self
            .client
            .post(self.api_url.as_str())
            .json(&body)
            .send()
            .await
            .with_context(|| format!("request to Tushare endpoint '{}' failed", query.api_name()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Tushare request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let reply: ApiReply = response
            .json()
            .await
            .with_context(|| format!("malformed reply from Tushare endpoint '{}'", query.api_name()))?;

        if reply.code != 0 {
            return Err(TushareError::Api {
                code: reply.code,
                msg: reply.msg.unwrap_or_default(),
            }
            .into());
        }

        let data = reply.data.ok_or(TushareError::MissingData)?;
        let records = RecordSet::from_reply(data.fields, data.items)?;

        debug!(
            "Endpoint '{}' returned {} rows",
            query.api_name(),
            records.len()
        );
        Ok(records)
    }

    /// Verify the configured token with a minimal trade-calendar query.
    pub async fn check_token(&self) -> Result<()> {
        let query = ReportQuery::new("trade_cal")
            .param("exchange", "SSE")
            .param("limit", "1");
        self.call(&query).await?;
        info!("Tushare token verified");
        Ok(())
    }
}

#[async_trait::async_trait]
impl ReportDataProvider for TushareClient {
    async fn fetch_report(&self, query: &ReportQuery) -> Result<RecordSet> {
        self.call(query).await
    }
}
