//! Period-over-period report analysis built on the resolver.

use anyhow::{anyhow, Result};
use serde::Serialize;
use tracing::debug;

use crate::api::{ReportDataProvider, ReportQuery};
use crate::models::ReportPeriod;
use crate::resolver::fetch_latest_report;

const INCOME_FIELDS: [&str; 4] = ["ts_code", "ann_date", "end_date", "n_income_attr_p"];

/// Year-over-year comparison of net profit attributable to the parent
/// company for one stock and reporting period.
#[derive(Debug, Clone, Serialize)]
pub struct NetProfitYoy {
    pub ts_code: String,
    pub period: String,
    pub previous_period: String,
    pub current_net_profit: Option<f64>,
    pub previous_net_profit: Option<f64>,
    /// Announcement date of the prior-year disclosure actually used,
    /// so callers can see which restatement the comparison is against.
    pub previous_ann_date: Option<String>,
    /// `None` when either side is missing or the prior-year base is zero.
    pub yoy_pct: Option<f64>,
}

fn income_query(ts_code: &str, period: &str) -> ReportQuery {
    ReportQuery::new("income")
        .param("ts_code", ts_code)
        .param("period", period)
        .param("report_type", "1")
        .fields(INCOME_FIELDS)
}

/// Compute the YoY net-profit change for `period`, taking the latest
/// disclosure of both the current and the prior-year period. Errors
/// from the underlying fetches propagate; a current period that is
/// entirely absent upstream is an error, while a missing prior-year
/// comparable just leaves the metric empty.
pub async fn net_profit_yoy<P>(
    provider: &P,
    ts_code: &str,
    period: &ReportPeriod,
) -> Result<NetProfitYoy>
where
    P: ReportDataProvider + ?Sized,
{
    let current = fetch_latest_report(
        provider,
        &income_query(ts_code, period.as_str()),
        "end_date",
        period.as_str(),
        false,
    )
    .await?
    .ok_or_else(|| {
        anyhow!(
            "no income statement data found for {} for period {}",
            ts_code,
            period
        )
    })?;

    let current_net_profit = current.get(0, "n_income_attr_p").as_f64();

    let previous_period = period.previous_year();
    let previous = fetch_latest_report(
        provider,
        &income_query(ts_code, &previous_period),
        "end_date",
        &previous_period,
        false,
    )
    .await?;

    let (previous_net_profit, previous_ann_date) = match &previous {
        Some(rows) => (
            rows.get(0, "n_income_attr_p").as_f64(),
            rows.get(0, "ann_date").canonical_text(),
        ),
        None => {
            debug!(
                "no prior-year comparable for {} period {}",
                ts_code, previous_period
            );
            (None, None)
        }
    };

    let yoy_pct = match (current_net_profit, previous_net_profit) {
        (Some(cur), Some(prev)) if prev != 0.0 => Some((cur - prev) / prev.abs() * 100.0),
        _ => None,
    };

    Ok(NetProfitYoy {
        ts_code: ts_code.to_string(),
        period: period.as_str().to_string(),
        previous_period,
        current_net_profit,
        previous_net_profit,
        previous_ann_date,
        yoy_pct,
    })
}
