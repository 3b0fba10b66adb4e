//! Artifacts written next to a run: table CSVs and the JSON report.

pub mod csv;

use std::path::Path;

use crate::errors::GenerationError;
use crate::model::GenerationReport;

pub use self::csv::{DatasetFiles, write_dataset, write_table_csv};

pub const REPORT_FILE: &str = "generation_report.json";

/// Write `report` as pretty JSON to `<dir>/generation_report.json`.
pub fn write_report(dir: &Path, report: &GenerationReport) -> Result<(), GenerationError> {
    std::fs::write(dir.join(REPORT_FILE), serde_json::to_vec_pretty(report)?)?;
    Ok(())
}
