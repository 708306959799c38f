//! Latest-report resolution.
//!
//! Financial reports get restated: the same reporting period can be
//! disclosed several times, and only the most recently announced
//! version is current. Upstream replies return every disclosure they
//! know about, in no guaranteed order, so callers need the rows
//! belonging to the latest announcement for the period they asked
//! about. That selection lives here.

use anyhow::Result;
use tracing::warn;

use crate::api::{ReportDataProvider, ReportQuery};
use crate::models::RecordSet;

/// Column carrying the announcement (disclosure) date in upstream
/// report tables, fixed by the upstream schema convention.
pub const ANN_DATE_FIELD: &str = "ann_date";

/// Select the record(s) representing the most recent disclosure of one
/// reporting period.
///
/// `period_field_name` names the column holding the reporting period
/// (it varies per endpoint: `end_date` for statements, `enddate` for
/// holder counts). `target_period_value` is compared type-tolerantly,
/// so an integer-typed period column still matches a string target.
///
/// When `return_all_for_latest_announcement` is true, every row sharing
/// the latest announcement date is returned (one disclosure can span
/// several rows, e.g. one per shareholder); otherwise only the first
/// such row.
///
/// Returns `None` when there is no usable match. Missing columns never
/// make this fail; the function degrades:
/// - no announcement column: period filtering is impossible, so the
///   whole table (list mode) or its first row (single mode) comes back
///   as-is, with a warning;
/// - no period column: rows are selected purely by announcement
///   recency, and every row at the latest announcement date comes back
///   regardless of mode, with a warning.
///
/// The asymmetry between those two shapes matches the long-standing
/// behavior of the service this was extracted from; callers rely on it.
pub fn resolve_latest_report(
    records: &RecordSet,
    period_field_name: &str,
    target_period_value: &str,
    return_all_for_latest_announcement: bool,
) -> Option<RecordSet> {
    if records.is_empty() {
        return None;
    }

    if !records.has_field(ANN_DATE_FIELD) {
        warn!(
            "report table has no '{}' column; returning rows without period filtering",
            ANN_DATE_FIELD
        );
        return if return_all_for_latest_announcement {
            Some(records.clone())
        } else {
            Some(records.head(1))
        };
    }

    if !records.has_field(period_field_name) {
        warn!(
            "report table has no '{}' column; selecting by announcement recency only",
            period_field_name
        );
        return Some(rows_at_latest_announcement(records));
    }

    // Normal path: strict period match, then latest announcement wins.
    let matched = records.filter_rows(|record| {
        record.get(period_field_name).canonical_text().as_deref() == Some(target_period_value)
    });
    if matched.is_empty() {
        return None;
    }

    let latest = rows_at_latest_announcement(&matched);
    if return_all_for_latest_announcement {
        Some(latest)
    } else {
        Some(latest.head(1))
    }
}

/// Rows carrying the maximum announcement date, upstream relative order
/// preserved among ties (the sort is stable, no secondary key).
fn rows_at_latest_announcement(records: &RecordSet) -> RecordSet {
    let sorted = records.sorted_desc_by(ANN_DATE_FIELD);
    let latest = sorted.get(0, ANN_DATE_FIELD).canonical_text();
    sorted.filter_rows(|record| record.get(ANN_DATE_FIELD).canonical_text() == latest)
}

/// Fetch a report table and resolve the latest disclosure in one step.
/// Fetch failures propagate unmodified - no retry and no wrapping; an
/// empty or unmatched table is a normal `Ok(None)`.
pub async fn fetch_latest_report<P>(
    provider: &P,
    query: &ReportQuery,
    period_field_name: &str,
    target_period_value: &str,
    return_all_for_latest_announcement: bool,
) -> Result<Option<RecordSet>>
where
    P: ReportDataProvider + ?Sized,
{
    let records = provider.fetch_report(query).await?;
    Ok(resolve_latest_report(
        &records,
        period_field_name,
        target_period_value,
        return_all_for_latest_announcement,
    ))
}
