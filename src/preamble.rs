//! Preamble scanning for raw analyzer exports.
//!
//! Every export starts with a variable-length free-text preamble (instrument
//! settings, operator notes, the original file name) followed by the
//! measurement table. This module locates the table header and pulls the
//! sample depth code out of the preamble without materializing the table.
//!
//! The scan is rule-based rather than offset-based: each extraction is tied to
//! a named marker constant, and every failure surfaces as a structured
//! [`PreambleError`] carrying the file path and the rule that did not match.
//!
//! Preamble text is decoded as windows-1252, the single-byte encoding the
//! instrument writes its header in.

use std::fs;
use std::path::{Path, PathBuf};

use encoding_rs::WINDOWS_1252;

/// Marker contained in the first field of the measurement-table header row
/// ("Kanaldurchmesser unten" - lower channel diameter).
pub const TABLE_HEADER_MARKER: &str = "Kanaldurchmesser";

/// Marker of the preamble row carrying the original export file name.
pub const FILENAME_MARKER: &str = "Dateiname:";

/// Character offset of the depth code within the filename field.
///
/// The instrument writes exports from a fixed filename template, so the depth
/// code sits at a constant position. The offset is not validated against a
/// template schema; a renamed source file will surface as
/// [`PreambleError::DepthFieldTruncated`] or [`PreambleError::DepthNotNumeric`].
pub const DEPTH_OFFSET: usize = 25;

/// Length of the depth code in characters.
pub const DEPTH_LEN: usize = 3;

/// Errors raised while scanning an export preamble. All of them are fatal for
/// the file in question; a missing marker is never silently defaulted.
#[derive(Debug, thiserror::Error)]
pub enum PreambleError {
    /// I/O error reading the export file
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// Path of the offending export
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A named marker was never seen while scanning the file
    #[error("marker {marker:?} not found in {}", .path.display())]
    MarkerNotFound {
        /// Path of the offending export
        path: PathBuf,
        /// The marker rule that did not match
        marker: &'static str,
    },

    /// The filename field is too short to carry a depth code
    #[error(
        "filename field on line {line} of {} is {len} characters long, \
         expected a 3-character depth code at offset 25", .path.display()
    )]
    DepthFieldTruncated {
        /// Path of the offending export
        path: PathBuf,
        /// Zero-based line index of the filename row
        line: usize,
        /// Observed field length in characters
        len: usize,
    },

    /// The extracted depth code does not parse to a finite number
    #[error("depth code {code:?} in {} is not a finite number", .path.display())]
    DepthNotNumeric {
        /// Path of the offending export
        path: PathBuf,
        /// The extracted code
        code: String,
    },
}

/// Result of scanning one export preamble.
#[derive(Debug, Clone, PartialEq)]
pub struct Preamble {
    /// Index of the row immediately preceding the table header row. The
    /// loader skips this many lines and then consumes the header block.
    pub table_start: usize,
    /// Raw 3-character depth code, kept verbatim for replicate labels.
    pub depth_code: String,
    /// Depth code parsed to a number; the join key across files.
    pub depth: f64,
}

/// Scan a preamble in a single pass, returning both the table start row and
/// the parsed depth.
pub fn scan(path: &Path) -> Result<Preamble, PreambleError> {
    let text = read_decoded(path)?;
    let table_start = find_table_start(&text).ok_or_else(|| PreambleError::MarkerNotFound {
        path: path.to_path_buf(),
        marker: TABLE_HEADER_MARKER,
    })?;
    let depth_code = find_depth_code(&text, path)?;
    let depth = parse_depth(&depth_code, path)?;

    Ok(Preamble {
        table_start,
        depth_code,
        depth,
    })
}

/// Locate the measurement table: the index of the row immediately preceding
/// the first row whose first field contains [`TABLE_HEADER_MARKER`].
pub fn locate_table_start(path: &Path) -> Result<usize, PreambleError> {
    let text = read_decoded(path)?;
    find_table_start(&text).ok_or_else(|| PreambleError::MarkerNotFound {
        path: path.to_path_buf(),
        marker: TABLE_HEADER_MARKER,
    })
}

/// Extract the 3-character depth code from the preamble's filename row.
pub fn extract_depth(path: &Path) -> Result<String, PreambleError> {
    let text = read_decoded(path)?;
    find_depth_code(&text, path)
}

fn read_decoded(path: &Path) -> Result<String, PreambleError> {
    let bytes = fs::read(path).map_err(|source| PreambleError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let (text, _, _) = WINDOWS_1252.decode(&bytes);
    Ok(text.into_owned())
}

/// First comma-separated field of a line, with any trailing carriage return
/// stripped (exports use CRLF line endings).
fn first_field(line: &str) -> &str {
    let line = line.trim_end_matches('\r');
    line.split(',').next().unwrap_or("")
}

fn find_table_start(text: &str) -> Option<usize> {
    text.lines()
        .position(|line| first_field(line).contains(TABLE_HEADER_MARKER))
        .map(|marker_row| marker_row.saturating_sub(1))
}

fn find_depth_code(text: &str, path: &Path) -> Result<String, PreambleError> {
    let (line_index, field) = text
        .lines()
        .enumerate()
        .find_map(|(i, line)| {
            let field = first_field(line);
            field.contains(FILENAME_MARKER).then_some((i, field))
        })
        .ok_or_else(|| PreambleError::MarkerNotFound {
            path: path.to_path_buf(),
            marker: FILENAME_MARKER,
        })?;

    let code: String = field.chars().skip(DEPTH_OFFSET).take(DEPTH_LEN).collect();
    if code.chars().count() < DEPTH_LEN {
        return Err(PreambleError::DepthFieldTruncated {
            path: path.to_path_buf(),
            line: line_index,
            len: field.chars().count(),
        });
    }

    Ok(code)
}

fn parse_depth(code: &str, path: &Path) -> Result<f64, PreambleError> {
    code.trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite())
        .ok_or_else(|| PreambleError::DepthNotNumeric {
            path: path.to_path_buf(),
            code: code.to_string(),
        })
}
