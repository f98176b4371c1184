//! Audit and inventory export.
//!
//! CSV output follows RFC 4180: comma-separated, CRLF-agnostic readers,
//! fields quoted when they contain commas, quotes or newlines.

use chrono::NaiveDate;

use crate::domain::{AllotmentConfig, LogQuery};
use crate::infra::{EngineError, Result};

/// Stable CSV header for inventory export, one row per (date, channel).
const CSV_HEADER: &str =
    "Date,Total Inventory,Total Sold,Free Stock,Occupancy Rate,Channel,Allocated,Sold,Available,Blocked";

/// RFC 4180 quoting: wrap when the field contains a comma, quote or
/// newline, doubling embedded quotes.
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Export daily records as CSV, optionally clipped to an inclusive range.
pub fn export_csv(config: &AllotmentConfig, range: Option<(NaiveDate, NaiveDate)>) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');

    let records: Vec<_> = match range {
        Some((start, end)) => config.records_in_range(start, end).collect(),
        None => config.daily_records.iter().collect(),
    };

    for (date, record) in records {
        for allotment in &record.channels {
            let row = [
                date.to_string(),
                record.total_inventory.to_string(),
                record.total_sold.to_string(),
                record.free_stock.to_string(),
                format!("{:.2}", record.occupancy_rate),
                allotment.channel_id.to_string(),
                allotment.allocated.to_string(),
                allotment.sold.to_string(),
                allotment.available.to_string(),
                allotment.blocked.to_string(),
            ];
            let row: Vec<String> = row.iter().map(|f| csv_field(f)).collect();
            out.push_str(&row.join(","));
            out.push('\n');
        }
    }
    out
}

/// Export the full configuration document as JSON bytes.
pub fn export_json(config: &AllotmentConfig) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(config)
        .map_err(|e| EngineError::Internal(format!("encode config: {e}")))
}

/// Export the change log as CSV, filtered by the query.
pub fn export_change_log_csv(config: &AllotmentConfig, query: &LogQuery) -> String {
    let mut out = String::from("Timestamp,Actor,Action,Fields,Reason");
    out.push('\n');
    for entry in config.change_log.iter().filter(|e| query.matches(e)) {
        let row = [
            entry.timestamp.to_rfc3339(),
            entry.actor.clone(),
            entry.action.to_string(),
            entry.fields.join(";"),
            entry.reason.clone().unwrap_or_default(),
        ];
        let row: Vec<String> = row.iter().map(|f| csv_field(f)).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}
