//! Measurement-table loading and normalization.
//!
//! The loader consumes the scanned [`Preamble`](crate::preamble::Preamble) of
//! an export, skips the preamble plus the three-row header block, and parses
//! the tab-delimited numeric table below it into a [`SampleTable`].
//!
//! Two column layouts exist in the wild: 1 diameter column plus 6 replicate
//! columns (2 subsamples x 3 aliquots) or plus 9 (3 subsample triples).
//! Anything else is rejected as [`TableError::UnexpectedLayout`] rather than
//! being mis-assigned.
//!
//! Replicate columns keep the instrument naming convention
//! `Vol_<depth-code>_<subsample>_<aliquot>` as provenance labels; the parsed
//! subsample/aliquot identity travels separately as structured fields so that
//! no later stage has to dig numbers out of a string.
//!
//! The table body is declared ISO-8859-1 by the instrument; it is decoded
//! through the WHATWG windows-1252 mapping (the same decoder the preamble
//! uses). The two mappings differ only in the C1 control range, which cannot
//! occur inside a numeric table.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use encoding_rs::WINDOWS_1252;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::preamble::Preamble;

/// Number of header rows consumed between the table start and the first data
/// row (a grouping row, the marker row, and a units row).
pub const HEADER_ROWS: usize = 3;

/// Character index of the subsample digit within a replicate label.
///
/// Positional contract shared with [`ReplicateLabel::parse`]: the label
/// `Vol_<3-char depth code>_<subsample>_<aliquot>` places the subsample at
/// index 8 and the aliquot at index 10. Changing the label format breaks
/// these offsets and the round-trip tests guarding them.
pub const SUBSAMPLE_INDEX: usize = 8;

/// Character index of the aliquot digit within a replicate label.
pub const ALIQUOT_INDEX: usize = 10;

/// Errors raised while loading a measurement table.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// I/O error reading the export file
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// Path of the offending export
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Malformed tab-delimited record
    #[error("failed to parse table in {}: {source}", .path.display())]
    Csv {
        /// Path of the offending export
        path: PathBuf,
        /// Underlying CSV error
        #[source]
        source: csv::Error,
    },

    /// The table has neither 7 nor 10 columns
    #[error(
        "unexpected table layout in {}: {columns} columns (expected 7 or 10)",
        .path.display()
    )]
    UnexpectedLayout {
        /// Path of the offending export
        path: PathBuf,
        /// Observed column count
        columns: usize,
    },

    /// No data rows were found below the header block
    #[error("no measurement rows found in {}", .path.display())]
    EmptyTable {
        /// Path of the offending export
        path: PathBuf,
    },
}

/// Replicate column label in the instrument convention
/// `Vol_<depth-code>_<subsample>_<aliquot>`, e.g. `Vol_150_1_2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicateLabel(String);

impl ReplicateLabel {
    /// Build the label for one replicate column.
    pub fn new(depth_code: &str, subsample: u8, aliquot: u8) -> Self {
        Self(format!("Vol_{depth_code}_{subsample}_{aliquot}"))
    }

    /// Recover (subsample, aliquot) from a label by the positional contract
    /// ([`SUBSAMPLE_INDEX`], [`ALIQUOT_INDEX`]). Returns `None` when either
    /// position is absent or not a digit.
    pub fn parse(label: &str) -> Option<(u8, u8)> {
        Some((
            digit_at(label, SUBSAMPLE_INDEX)?,
            digit_at(label, ALIQUOT_INDEX)?,
        ))
    }

    /// The label text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReplicateLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn digit_at(label: &str, index: usize) -> Option<u8> {
    label
        .chars()
        .nth(index)
        .and_then(|c| c.to_digit(10))
        .map(|d| d as u8)
}

/// One replicate column of a per-file table.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicateColumn {
    /// Provenance label in the instrument convention.
    pub label: ReplicateLabel,
    /// Subsample identity (1-2, or 1-3 in the nine-column layout).
    pub subsample: u8,
    /// Aliquot identity (1-3).
    pub aliquot: u8,
    /// Volume-percent readings, one per channel row. `None` marks a cell that
    /// failed numeric coercion or was empty.
    pub values: Vec<Option<f64>>,
}

/// One export's normalized measurement table.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleTable {
    /// Source file, kept for error context.
    pub path: PathBuf,
    /// Sample depth parsed from the preamble.
    pub depth: f64,
    /// Raw depth code, used for replicate labels.
    pub depth_code: String,
    /// Lower-bound channel diameters in micrometers, one per row.
    pub channels: Vec<f64>,
    /// Replicate columns (6 or 9), all the same length as `channels`.
    pub replicates: Vec<ReplicateColumn>,
}

impl SampleTable {
    /// Number of channel rows that survived normalization.
    pub fn row_count(&self) -> usize {
        self.channels.len()
    }
}

/// Load and normalize the measurement table of one export.
pub fn load_sample_table(path: &Path, preamble: &Preamble) -> Result<SampleTable, TableError> {
    let bytes = fs::read(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let (text, _, _) = WINDOWS_1252.decode(&bytes);
    from_text(&text, path, preamble)
}

fn from_text(text: &str, path: &Path, preamble: &Preamble) -> Result<SampleTable, TableError> {
    let data_region: String = text
        .lines()
        .skip(preamble.table_start + HEADER_ROWS)
        .collect::<Vec<_>>()
        .join("\n");

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(data_region.as_bytes());

    let mut rows: Vec<(Option<f64>, Vec<Option<f64>>)> = Vec::new();
    let mut replicate_count: Option<usize> = None;

    for record in reader.records() {
        let record = record.map_err(|source| TableError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

        // Blank separator lines carry no layout information.
        if record.len() <= 1 && record.get(0).map(str::trim).unwrap_or("").is_empty() {
            continue;
        }

        let count = match replicate_count {
            Some(count) => count,
            None => {
                let columns = record.len();
                if columns != 7 && columns != 10 {
                    return Err(TableError::UnexpectedLayout {
                        path: path.to_path_buf(),
                        columns,
                    });
                }
                *replicate_count.insert(columns - 1)
            }
        };

        let channel = record.get(0).and_then(parse_cell);
        let values: Vec<Option<f64>> = (1..=count)
            .map(|i| record.get(i).and_then(parse_cell))
            .collect();
        rows.push((channel, values));
    }

    let replicate_count = replicate_count.ok_or_else(|| TableError::EmptyTable {
        path: path.to_path_buf(),
    })?;

    let total_rows = rows.len();

    // Filter order matters and mirrors the instrument format quirks:
    // fully-empty separator rows first, then the trailing sentinel row the
    // instrument always appends, then the per-file zero-artifact policy.
    rows.retain(|(channel, values)| channel.is_some() || values.iter().any(Option::is_some));
    rows.pop();
    rows.retain(|(_, values)| !values.iter().any(|v| *v == Some(0.0)));

    // A row without a parsable diameter cannot be keyed to a channel.
    let unkeyed = rows
        .iter()
        .filter(|(channel, _)| channel.is_none())
        .count();
    if unkeyed > 0 {
        warn!(
            "{}: dropping {unkeyed} rows without a parsable channel diameter",
            path.display()
        );
        rows.retain(|(channel, _)| channel.is_some());
    }

    debug!(
        "{}: kept {} of {} table rows ({} replicate columns)",
        path.display(),
        rows.len(),
        total_rows,
        replicate_count
    );

    let channels: Vec<f64> = rows.iter().filter_map(|(channel, _)| *channel).collect();
    let replicates = build_columns(replicate_count, &preamble.depth_code, &rows);

    Ok(SampleTable {
        path: path.to_path_buf(),
        depth: preamble.depth,
        depth_code: preamble.depth_code.clone(),
        channels,
        replicates,
    })
}

/// Enumerate the (subsample, aliquot) pairs of a layout in column order.
fn layout_keys(replicate_count: usize) -> impl Iterator<Item = (u8, u8)> {
    let subsamples = if replicate_count == 9 { 3 } else { 2 };
    (1..=subsamples).flat_map(|s| (1..=3).map(move |a| (s, a)))
}

fn build_columns(
    replicate_count: usize,
    depth_code: &str,
    rows: &[(Option<f64>, Vec<Option<f64>>)],
) -> Vec<ReplicateColumn> {
    layout_keys(replicate_count)
        .enumerate()
        .map(|(i, (subsample, aliquot))| ReplicateColumn {
            label: ReplicateLabel::new(depth_code, subsample, aliquot),
            subsample,
            aliquot,
            values: rows
                .iter()
                .map(|(_, values)| values.get(i).copied().flatten())
                .collect(),
        })
        .collect()
}

/// Locale-aware numeric coercion: comma decimal separators are normalized to
/// periods before parsing. Failures become `None`, never an error.
fn parse_cell(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }
    cell.replace(',', ".").parse::<f64>().ok()
}
