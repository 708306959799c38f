use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

/// One cell of a tabular API reply.
///
/// Upstream replies are loosely typed: the same column can arrive as a
/// string in one reply and a number in the next, and empty cells arrive
/// as JSON null rather than being omitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    /// Canonical text rendering used for type-tolerant comparison and
    /// ordering. `None` for null cells. Integral floats render without
    /// a decimal point so `20231231.0` compares equal to `"20231231"`.
    pub fn canonical_text(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            CellValue::Bool(b) => Some(b.to_string()),
            CellValue::Integer(i) => Some(i.to_string()),
            CellValue::Float(f) => {
                if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.2e18 {
                    Some(format!("{}", *f as i64))
                } else {
                    Some(f.to_string())
                }
            }
            CellValue::Text(s) => Some(s.clone()),
        }
    }

    /// Numeric coercion in the spirit of `pd.to_numeric(..., errors="coerce")`:
    /// numeric text parses, everything non-numeric becomes `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::Float(f) => Some(*f),
            CellValue::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

impl From<Value> for CellValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => CellValue::Null,
            Value::Bool(b) => CellValue::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    CellValue::Integer(i)
                } else {
                    CellValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => CellValue::Text(s),
            // Arrays/objects never appear in tabular replies; keep the raw
            // JSON text so the cell stays inspectable.
            other => CellValue::Text(other.to_string()),
        }
    }
}

/// Result of looking a field up on a record. Distinguishes "the column
/// does not exist in this reply's schema" from "the column exists but
/// this row has no value" - the fallback logic in the resolver needs
/// exactly that distinction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldLookup<'a> {
    Absent,
    Null,
    Value(&'a CellValue),
}

impl<'a> FieldLookup<'a> {
    pub fn is_absent(&self) -> bool {
        matches!(self, FieldLookup::Absent)
    }

    pub fn value(&self) -> Option<&'a CellValue> {
        match self {
            FieldLookup::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Canonical text of the cell, `None` when absent or null.
    pub fn canonical_text(&self) -> Option<String> {
        self.value().and_then(|v| v.canonical_text())
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.value().and_then(|v| v.as_f64())
    }
}

/// Borrowed view of one row paired with the table schema.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    fields: &'a [String],
    cells: &'a [CellValue],
}

impl<'a> Record<'a> {
    pub fn get(&self, field: &str) -> FieldLookup<'a> {
        match self.fields.iter().position(|f| f == field) {
            None => FieldLookup::Absent,
            Some(idx) => match &self.cells[idx] {
                CellValue::Null => FieldLookup::Null,
                cell => FieldLookup::Value(cell),
            },
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a CellValue)> {
        self.fields
            .iter()
            .map(String::as_str)
            .zip(self.cells.iter())
    }

    /// Row as a JSON object, null cells included (mirrors how the
    /// upstream replies represent missing values).
    pub fn to_json(&self) -> serde_json::Map<String, Value> {
        self.iter()
            .map(|(name, cell)| {
                let value = serde_json::to_value(cell).unwrap_or(Value::Null);
                (name.to_string(), value)
            })
            .collect()
    }
}

/// An ordered table of records sharing one field schema, as returned by
/// a single upstream query. Row order as received carries no meaning;
/// callers that need an order must sort explicitly. Immutable after
/// construction - derived tables are fresh `RecordSet`s.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSet {
    fields: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl RecordSet {
    /// Build a table from a field list and rows, validating that every
    /// row matches the schema width.
    pub fn from_rows(fields: Vec<String>, rows: Vec<Vec<CellValue>>) -> Result<Self> {
        for (i, row) in rows.iter().enumerate() {
            if row.len() != fields.len() {
                return Err(anyhow!(
                    "row {} has {} cells but the schema has {} fields",
                    i,
                    row.len(),
                    fields.len()
                ));
            }
        }
        Ok(Self { fields, rows })
    }

    /// Build a table from the `fields`/`items` arrays of an upstream
    /// JSON reply.
    pub fn from_reply(fields: Vec<String>, items: Vec<Vec<Value>>) -> Result<Self> {
        let rows = items
            .into_iter()
            .map(|item| item.into_iter().map(CellValue::from).collect())
            .collect();
        Self::from_rows(fields, rows)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    pub fn record(&self, index: usize) -> Option<Record<'_>> {
        self.rows.get(index).map(|cells| Record {
            fields: &self.fields,
            cells,
        })
    }

    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.rows.iter().map(move |cells| Record {
            fields: &self.fields,
            cells,
        })
    }

    /// Look a field up on one row.
    pub fn get(&self, row: usize, field: &str) -> FieldLookup<'_> {
        match self.record(row) {
            Some(record) => record.get(field),
            None => FieldLookup::Absent,
        }
    }

    /// New table containing the rows the predicate keeps, in their
    /// current relative order.
    pub fn filter_rows<F>(&self, mut keep: F) -> RecordSet
    where
        F: FnMut(Record<'_>) -> bool,
    {
        let rows = self
            .rows
            .iter()
            .filter(|cells| {
                keep(Record {
                    fields: &self.fields,
                    cells: cells.as_slice(),
                })
            })
            .cloned()
            .collect();
        RecordSet {
            fields: self.fields.clone(),
            rows,
        }
    }

    /// New table sorted descending by the canonical text of `field`.
    /// The sort is stable, so rows that tie keep their upstream order;
    /// null cells sort last. A field missing from the schema leaves the
    /// order untouched.
    pub fn sorted_desc_by(&self, field: &str) -> RecordSet {
        let mut out = self.clone();
        let Some(idx) = self.fields.iter().position(|f| f == field) else {
            return out;
        };
        out.rows.sort_by(|a, b| {
            let ka = a[idx].canonical_text();
            let kb = b[idx].canonical_text();
            kb.cmp(&ka)
        });
        out
    }

    /// New table keeping only the first `limit` rows, the
    /// `sort_values(...).head(n)` idiom of the upstream endpoints.
    pub fn head(&self, limit: usize) -> RecordSet {
        RecordSet {
            fields: self.fields.clone(),
            rows: self.rows.iter().take(limit).cloned().collect(),
        }
    }

    /// All rows as JSON objects, for display and serialization.
    pub fn to_json_rows(&self) -> Vec<serde_json::Map<String, Value>> {
        self.records().map(|r| r.to_json()).collect()
    }
}

/// A validated reporting period in the upstream `YYYYMMDD` convention
/// (quarter or year end, e.g. `20231231`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPeriod {
    raw: String,
    date: NaiveDate,
}

impl ReportPeriod {
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(anyhow!("invalid report period '{}', expected YYYYMMDD", raw));
        }
        let date = NaiveDate::parse_from_str(raw, "%Y%m%d")
            .map_err(|_| anyhow!("invalid report period '{}', expected YYYYMMDD", raw))?;
        Ok(Self {
            raw: raw.to_string(),
            date,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Same period one year earlier, by string year arithmetic with the
    /// month-day suffix preserved. This matches the upstream convention
    /// for "comparable period" and is intentionally not calendar-aware.
    pub fn previous_year(&self) -> String {
        use chrono::Datelike;
        format!("{}{}", self.date.year() - 1, &self.raw[4..])
    }
}

impl std::fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Configuration for the application. Constructed once at startup and
/// passed explicitly to the client, never held in module-level state.
#[derive(Debug, Clone)]
pub struct Config {
    pub tushare_token: String,
    pub api_url: String,
    pub rate_limit_per_minute: u32,
    pub request_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        Ok(Config {
            tushare_token: std::env::var("TUSHARE_TOKEN")
                .map_err(|_| anyhow!("TUSHARE_TOKEN environment variable required"))?,
            api_url: std::env::var("TUSHARE_API_URL")
                .unwrap_or_else(|_| "http://api.tushare.pro".to_string()),
            rate_limit_per_minute: std::env::var("RATE_LIMIT_PER_MINUTE")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .unwrap_or(120),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
        })
    }
}
