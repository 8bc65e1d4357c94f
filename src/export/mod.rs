//! Tabular views of classified feedback, ready for spreadsheet export.
//!
//! Three views are derived from the current records, none of which mutate
//! them:
//! - compiled: one row per record, labels joined
//! - exploded: one row per (record, label) pair
//! - counts: normalized label frequencies, most frequent first
//!
//! The basic export is just the compiled sheet; the detailed export bundles
//! exploded, compiled and counts, in that order.

mod xlsx;

pub use xlsx::*;

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::labels;
use crate::models::FeedbackRecord;

pub const COL_FEEDBACK: &str = "Feedback";
pub const COL_LABELS: &str = "Labels";
pub const COL_SINGLE_LABEL: &str = "Single Label";
pub const COL_INCORRECT: &str = "Incorrect Analysis";
pub const COL_LABEL: &str = "Label";
pub const COL_COUNT: &str = "Count";

pub const COMPILED_SHEET: &str = "Compiled Results";
pub const EXPLODED_SHEET: &str = "Exploded Labels";
pub const COUNTS_SHEET: &str = "Label Counts";

pub const BASIC_FILE_NAME: &str = "feedback_analysis_results.xlsx";
pub const DETAILED_FILE_NAME: &str = "feedback_analysis_detailed_export.xlsx";

/// One worksheet: a header row and uniform-width string rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    fn new(name: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Row `index` keyed by column name.
    pub fn row_map(&self, index: usize) -> Option<BTreeMap<&str, &str>> {
        self.rows.get(index).map(|row| {
            self.columns
                .iter()
                .map(String::as_str)
                .zip(row.iter().map(String::as_str))
                .collect()
        })
    }
}

fn yes_no(flag: bool) -> String {
    let answer = if flag { "Yes" } else { "No" };
    answer.to_string()
}

/// One row per record: `Feedback`, `Labels`, `Incorrect Analysis`.
pub fn compiled_view(records: &[FeedbackRecord]) -> Sheet {
    let mut sheet = Sheet::new(COMPILED_SHEET, &[COL_FEEDBACK, COL_LABELS, COL_INCORRECT]);
    sheet.rows = records
        .iter()
        .map(|r| vec![r.text.clone(), r.labels.join(", "), yes_no(r.is_incorrect)])
        .collect();
    sheet
}

/// One row per (record, label): `Feedback`, `Single Label`, `Incorrect Analysis`.
///
/// A record without labels still gets one row with an empty label.
pub fn exploded_view(records: &[FeedbackRecord]) -> Sheet {
    let mut sheet = Sheet::new(
        EXPLODED_SHEET,
        &[COL_FEEDBACK, COL_SINGLE_LABEL, COL_INCORRECT],
    );
    for record in records {
        let incorrect = yes_no(record.is_incorrect);
        if record.labels.is_empty() {
            sheet
                .rows
                .push(vec![record.text.clone(), String::new(), incorrect]);
            continue;
        }
        for label in &record.labels {
            sheet
                .rows
                .push(vec![record.text.clone(), label.clone(), incorrect.clone()]);
        }
    }
    sheet
}

/// Aggregated label counts: `Label`, `Count`, most frequent first.
pub fn counts_view(records: &[FeedbackRecord]) -> Sheet {
    let mut sheet = Sheet::new(COUNTS_SHEET, &[COL_LABEL, COL_COUNT]);
    sheet.rows = labels::aggregate(records)
        .into_iter()
        .map(|c| vec![c.label, c.count.to_string()])
        .collect();
    sheet
}

/// Which workbook to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    #[default]
    Basic,
    Detailed,
}

impl ExportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Detailed => "detailed",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Basic => BASIC_FILE_NAME,
            Self::Detailed => DETAILED_FILE_NAME,
        }
    }
}

impl FromStr for ExportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Self::Basic),
            "detailed" => Ok(Self::Detailed),
            _ => Err(format!("Invalid export kind: {}", s)),
        }
    }
}

/// Named sheets plus the file name they are saved under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workbook {
    pub file_name: String,
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn build(kind: ExportKind, records: &[FeedbackRecord]) -> Self {
        match kind {
            ExportKind::Basic => Self::basic(records),
            ExportKind::Detailed => Self::detailed(records),
        }
    }

    pub fn basic(records: &[FeedbackRecord]) -> Self {
        Self {
            file_name: ExportKind::Basic.file_name().to_string(),
            sheets: vec![compiled_view(records)],
        }
    }

    pub fn detailed(records: &[FeedbackRecord]) -> Self {
        Self {
            file_name: ExportKind::Detailed.file_name().to_string(),
            sheets: vec![
                exploded_view(records),
                compiled_view(records),
                counts_view(records),
            ],
        }
    }
}
