//! Tabular export of date-range query results.

use std::io::Write;

use serde::Serialize;
use thiserror::Error;

use crate::{
    directory::UserDirectory,
    record::AttendanceRecord,
    types::{AttendanceType, Timestamp, UserId},
};

const DATE_FORMAT: &str = "%Y/%m/%d";
const TIME_FORMAT: &str = "%H:%M";
const FILE_DATE_FORMAT: &str = "%Y%m%d";

/// Column headers, in row order.
pub const HEADERS: [&str; 7] = [
    "user_id",
    "username",
    "date",
    "type",
    "check_in",
    "check_out",
    "worked",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// One display-ready export line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    pub user_id: UserId,
    pub username: String,
    pub date: String,
    pub kind: &'static str,
    pub check_in: String,
    pub check_out: String,
    pub worked: String,
}

impl ExportRow {
    pub fn from_record(record: &AttendanceRecord, directory: &dyn UserDirectory) -> Self {
        let leave = record.attendance_type == AttendanceType::AnnualLeave;
        let time_cell = |t: Option<Timestamp>| match t {
            Some(t) => t.format(TIME_FORMAT).to_string(),
            None if leave => "-".to_string(),
            None => String::new(),
        };

        let worked = match (record.check_in_time, record.check_out_time) {
            _ if leave => "leave".to_string(),
            (Some(start), Some(end)) => {
                let minutes = (end - start).num_minutes();
                format!("{}h{}m", minutes / 60, minutes % 60)
            }
            _ => String::new(),
        };

        Self {
            user_id: record.user_id,
            username: directory.display_name(record.user_id),
            date: record.record_date.format(DATE_FORMAT).to_string(),
            kind: if leave { "annual_leave" } else { "work" },
            check_in: time_cell(record.check_in_time),
            check_out: time_cell(record.check_out_time),
            worked,
        }
    }
}

/// Rows for `records`, keeping their order.
pub fn build_rows(records: &[AttendanceRecord], directory: &dyn UserDirectory) -> Vec<ExportRow> {
    records
        .iter()
        .map(|r| ExportRow::from_record(r, directory))
        .collect()
}

/// Renders export rows to a byte stream whose format the core does not inspect.
pub trait Exporter: Send + Sync {
    fn render(&self, rows: &[ExportRow]) -> Result<Vec<u8>, ExportError>;
}

/// Tab-separated text with a header line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TsvExporter;

impl Exporter for TsvExporter {
    fn render(&self, rows: &[ExportRow]) -> Result<Vec<u8>, ExportError> {
        let mut out = Vec::new();
        writeln!(out, "{}", HEADERS.join("\t"))?;
        for row in rows {
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                row.user_id,
                clean(&row.username),
                row.date,
                row.kind,
                row.check_in,
                row.check_out,
                row.worked
            )?;
        }
        Ok(out)
    }
}

/// `attendance_{start}_to_{end}.tsv` with compact dates.
pub fn export_file_name(start: Timestamp, end: Timestamp) -> String {
    format!(
        "attendance_{}_to_{}.tsv",
        start.format(FILE_DATE_FORMAT),
        end.format(FILE_DATE_FORMAT)
    )
}

fn clean(cell: &str) -> String {
    cell.replace(['\t', '\n', '\r'], " ")
}
