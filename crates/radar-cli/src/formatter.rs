//! Output formatters for run results.

use clap::ValueEnum;
use comfy_table::{Cell, Table};
use radar_core::maintenance::{DateNormalization, IndexSpec, Verification};
use radar_core::{MatrixRebuild, RefreshReport};
use serde::Serialize;

use crate::executor::RunOutcome;
use crate::report::{self, REPORT_HEADER};

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Trait for formatting output.
pub trait Formatter: Send + Sync {
    /// Format the per-table refresh report.
    fn format_report(&self, report: &RefreshReport) -> String;

    /// Format a matrix rebuild outcome.
    fn format_rebuild(&self, rebuild: &MatrixRebuild) -> String;

    /// Format date normalisation results.
    fn format_dates(&self, results: &[DateNormalization]) -> String;

    /// Format the indexes that were (or would be) created.
    fn format_indexes(&self, indexes: &[IndexSpec]) -> String;

    /// Format verification results.
    fn format_verification(&self, results: &[Verification]) -> String;

    /// Format a whole run, one section per executed step.
    fn format_run(&self, run: &RunOutcome) -> String {
        let mut sections = Vec::new();
        if let Some(dates) = &run.dates {
            sections.push(self.format_dates(dates));
        }
        if let Some(rebuild) = &run.rebuild {
            sections.push(self.format_rebuild(rebuild));
        }
        sections.push(self.format_report(&run.report));
        if let Some(indexes) = &run.indexes {
            sections.push(self.format_indexes(indexes));
        }
        if let Some(verification) = &run.verification {
            sections.push(self.format_verification(verification));
        }
        sections.join("\n\n")
    }
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Csv => Box::new(CsvFormatter),
    }
}

fn optional(value: Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_report(&self, report: &RefreshReport) -> String {
        let mut table = Table::new();
        table.set_header(vec![
            "Table",
            "Kind",
            "Verdict",
            "Reason",
            "Rows before",
            "Rows after",
        ]);

        for action in &report.actions {
            table.add_row(vec![
                Cell::new(&action.table),
                Cell::new(action.kind.map(|k| k.to_string()).unwrap_or_default()),
                Cell::new(action.verdict),
                Cell::new(&action.reason),
                Cell::new(optional(action.rows_before)),
                Cell::new(optional(action.rows_after)),
            ]);
        }

        let mode = if report.dry_run { " (dry-run)" } else { "" };
        format!(
            "{}\n{} refreshed, {} skipped, {} failed{}",
            table,
            report.refreshed(),
            report.skipped(),
            report.failed(),
            mode
        )
    }

    fn format_rebuild(&self, rebuild: &MatrixRebuild) -> String {
        let mut table = Table::new();
        table.set_header(vec![
            "Matrix",
            "Source",
            "Mode",
            "Columns",
            "Source rows",
            "Rows before",
            "Rows after",
        ]);
        table.add_row(vec![
            Cell::new(&rebuild.matrix),
            Cell::new(&rebuild.source),
            Cell::new(rebuild.mode),
            Cell::new(rebuild.common.len()),
            Cell::new(rebuild.source_rows),
            Cell::new(optional(rebuild.rows_before)),
            Cell::new(optional(rebuild.rows_after)),
        ]);

        let mut output = table.to_string();
        if !rebuild.missing_required.is_empty() {
            output.push_str(&format!(
                "\nrequired columns left NULL: {}",
                rebuild.missing_required.join(", ")
            ));
        }
        output
    }

    fn format_dates(&self, results: &[DateNormalization]) -> String {
        if results.is_empty() {
            return "No tables with a fecha column".to_string();
        }

        let mut table = Table::new();
        table.set_header(vec!["Table", "Column", "Pending", "Updated", "Error"]);
        for result in results {
            table.add_row(vec![
                Cell::new(&result.table),
                Cell::new(&result.column),
                Cell::new(result.pending),
                Cell::new(result.updated),
                Cell::new(result.error.as_deref().unwrap_or("")),
            ]);
        }
        table.to_string()
    }

    fn format_indexes(&self, indexes: &[IndexSpec]) -> String {
        if indexes.is_empty() {
            return "No indexes".to_string();
        }

        let mut table = Table::new();
        table.set_header(vec!["Index", "Table", "Columns"]);
        for index in indexes {
            table.add_row(vec![
                Cell::new(&index.name),
                Cell::new(&index.table),
                Cell::new(index.columns.join(", ")),
            ]);
        }
        table.to_string()
    }

    fn format_verification(&self, results: &[Verification]) -> String {
        let mut table = Table::new();
        table.set_header(vec!["Object", "Kind", "Detail"]);
        for result in results {
            table.add_row(vec![
                Cell::new(&result.name),
                Cell::new(result.kind.map(|k| k.to_string()).unwrap_or_default()),
                Cell::new(result.detail()),
            ]);
        }
        table.to_string()
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_report(&self, report: &RefreshReport) -> String {
        to_json(report)
    }

    fn format_rebuild(&self, rebuild: &MatrixRebuild) -> String {
        to_json(rebuild)
    }

    fn format_dates(&self, results: &[DateNormalization]) -> String {
        to_json(results)
    }

    fn format_indexes(&self, indexes: &[IndexSpec]) -> String {
        to_json(indexes)
    }

    fn format_verification(&self, results: &[Verification]) -> String {
        to_json(results)
    }

    fn format_run(&self, run: &RunOutcome) -> String {
        to_json(run)
    }
}

/// Render rows through the csv writer.
fn csv_rows<I, R>(header: &[&str], rows: I) -> String
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let mut writer = csv::Writer::from_writer(Vec::new());
    let written = writer
        .write_record(header)
        .and_then(|_| rows.into_iter().try_for_each(|row| writer.write_record(row)));
    if let Err(e) = written {
        return format!("error\n{}", e);
    }
    match writer.into_inner() {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => format!("error\n{}", e),
    }
}

/// CSV formatter.
pub struct CsvFormatter;

impl Formatter for CsvFormatter {
    fn format_report(&self, report: &RefreshReport) -> String {
        csv_rows(&REPORT_HEADER, report.actions.iter().map(report::report_record))
    }

    fn format_rebuild(&self, rebuild: &MatrixRebuild) -> String {
        let row = [
            rebuild.matrix.clone(),
            rebuild.source.clone(),
            rebuild.mode.to_string(),
            rebuild.common.join(" "),
            rebuild.source_rows.to_string(),
            rebuild.rows_before.map(|v| v.to_string()).unwrap_or_default(),
            rebuild.rows_after.map(|v| v.to_string()).unwrap_or_default(),
        ];
        csv_rows(
            &["matrix", "source", "mode", "columns", "source_rows", "rows_before", "rows_after"],
            [row],
        )
    }

    fn format_dates(&self, results: &[DateNormalization]) -> String {
        csv_rows(
            &["table", "column", "pending", "updated", "error"],
            results.iter().map(|r| {
                [
                    r.table.clone(),
                    r.column.clone(),
                    r.pending.to_string(),
                    r.updated.to_string(),
                    r.error.clone().unwrap_or_default(),
                ]
            }),
        )
    }

    fn format_indexes(&self, indexes: &[IndexSpec]) -> String {
        csv_rows(
            &["index", "table", "columns"],
            indexes
                .iter()
                .map(|i| [i.name.clone(), i.table.clone(), i.columns.join(" ")]),
        )
    }

    fn format_verification(&self, results: &[Verification]) -> String {
        csv_rows(
            &["object", "kind", "rows", "max_fecha", "error"],
            results.iter().map(|r| {
                [
                    r.name.clone(),
                    r.kind.map(|k| k.to_string()).unwrap_or_default(),
                    r.rows.map(|v| v.to_string()).unwrap_or_default(),
                    r.max_date.clone().unwrap_or_default(),
                    r.error.clone().unwrap_or_default(),
                ]
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radar_core::{ObjectKind, Reason, RebuildMode, RefreshAction};

    fn report() -> RefreshReport {
        RefreshReport {
            actions: vec![
                RefreshAction::skipped("tolima", Some(ObjectKind::Table), Reason::Excluded, Some(7)),
                RefreshAction::refreshed(
                    "copia",
                    Some(ObjectKind::Table),
                    Reason::Refreshed {
                        matrix: "matriz_astro_luna".to_string(),
                        rule: "projection".to_string(),
                        columns: 2,
                        filled: Vec::new(),
                        dry_run: true,
                    },
                    Some(1),
                    None,
                ),
            ],
            dry_run: true,
        }
    }

    #[test]
    fn test_output_format_display() {
        assert_eq!(OutputFormat::Table.to_string(), "table");
        assert_eq!(OutputFormat::Json.to_string(), "json");
        assert_eq!(OutputFormat::Csv.to_string(), "csv");
    }

    #[test]
    fn test_table_report() {
        let output = TableFormatter.format_report(&report());
        assert!(output.contains("tolima"));
        assert!(output.contains("would refresh from matriz_astro_luna"));
        assert!(output.ends_with("1 refreshed, 1 skipped, 0 failed (dry-run)"));
    }

    #[test]
    fn test_json_report() {
        let output = JsonFormatter.format_report(&report());
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["dry_run"], true);
        assert_eq!(value["actions"][0]["verdict"], "skipped");
        assert_eq!(value["actions"][0]["reason"], "excluded");
        assert_eq!(value["actions"][1]["rows_after"], serde_json::Value::Null);
    }

    #[test]
    fn test_csv_report_matches_file_layout() {
        let output = CsvFormatter.format_report(&report());
        let mut lines = output.lines();
        assert_eq!(lines.next(), Some("table,kind,action,rows_before,rows_after"));
        assert_eq!(lines.next(), Some("tolima,table,skipped (excluded),7,"));
    }

    #[test]
    fn test_run_sections() {
        let run = RunOutcome {
            indexes: Some(Vec::new()),
            report: report(),
            ..Default::default()
        };

        let text = TableFormatter.format_run(&run);
        assert!(text.ends_with("No indexes"));

        let value: serde_json::Value =
            serde_json::from_str(&JsonFormatter.format_run(&run)).unwrap();
        assert!(value.get("rebuild").is_none());
        assert_eq!(value["indexes"], serde_json::json!([]));
        assert_eq!(value["report"]["actions"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_rebuild_formats() {
        let rebuild = MatrixRebuild {
            mode: RebuildMode::Projection,
            source: "astro_luna".to_string(),
            matrix: "matriz_astro_luna".to_string(),
            common: vec!["fecha".to_string(), "numero".to_string()],
            missing_required: vec!["signo".to_string()],
            source_rows: 3,
            rows_before: Some(1),
            rows_after: Some(3),
            dry_run: false,
        };

        let table = TableFormatter.format_rebuild(&rebuild);
        assert!(table.contains("astro_luna"));
        assert!(table.ends_with("required columns left NULL: signo"));

        let csv = CsvFormatter.format_rebuild(&rebuild);
        assert_eq!(
            csv.lines().nth(1),
            Some("matriz_astro_luna,astro_luna,projection,fecha numero,3,1,3")
        );
    }

    #[test]
    fn test_verification_formats() {
        let results = vec![Verification {
            name: "todo".to_string(),
            kind: Some(ObjectKind::View),
            rows: Some(4),
            max_date: Some("2024-05-03".to_string()),
            error: None,
        }];

        let table = TableFormatter.format_verification(&results);
        assert!(table.contains("COUNT=4 | MAX(fecha)=2024-05-03"));

        let csv = CsvFormatter.format_verification(&results);
        assert_eq!(csv.lines().nth(1), Some("todo,view,4,2024-05-03,"));
    }
}
