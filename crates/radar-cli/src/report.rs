//! CSV rendering of the refresh report.

use std::io::Write;
use std::path::Path;

use radar_core::{RefreshAction, RefreshReport, Verdict};

/// Header of the report file.
pub const REPORT_HEADER: [&str; 5] = ["table", "kind", "action", "rows_before", "rows_after"];

/// Text of the `action` column: the reason, prefixed for skips.
pub fn action_label(action: &RefreshAction) -> String {
    match action.verdict {
        Verdict::Skipped => format!("skipped ({})", action.reason),
        Verdict::Refreshed | Verdict::Failed => action.reason.to_string(),
    }
}

fn optional(value: Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// One report row; missing values are empty strings.
pub fn report_record(action: &RefreshAction) -> [String; 5] {
    [
        action.table.clone(),
        action.kind.as_ref().map(ToString::to_string).unwrap_or_default(),
        action_label(action),
        optional(action.rows_before),
        optional(action.rows_after),
    ]
}

/// Write the report as CSV to any writer.
pub fn write_report<W: Write>(writer: W, report: &RefreshReport) -> csv::Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(REPORT_HEADER)?;
    for action in &report.actions {
        out.write_record(report_record(action))?;
    }
    out.flush()?;
    Ok(())
}

/// Write the report to a CSV file, replacing it.
pub fn write_report_file(path: &Path, report: &RefreshReport) -> csv::Result<()> {
    let file = std::fs::File::create(path)?;
    write_report(file, report)?;
    tracing::info!(path = %path.display(), rows = report.actions.len(), "report written");
    Ok(())
}
