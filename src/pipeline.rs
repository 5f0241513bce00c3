//! End-to-end pipeline orchestration.
//!
//! Drives the full transformation over a set of export files: preamble scan,
//! table load, reshape, dead-channel trim, per-replicate clr transform, and
//! replicate aggregation. The pipeline is a pure batch transform over a
//! closed input set; each stage consumes the previous stage's output and
//! there is no shared mutable state across depths.
//!
//! With the `parallel` feature the per-file stages fan out across files via
//! rayon. Results are collected back in input order and every later stage
//! runs sequentially over deterministically sorted keys, so the aggregate
//! output is identical to the sequential run.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::{info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::phi::PhiUnit;
use crate::preamble::{self, PreambleError};
use crate::reshape;
use crate::summary::{summarize, SummaryRow};
use crate::table::{self, SampleTable, TableError};
use crate::transform::{clr_transform, TransformError};
use crate::trim::trim_dead_channels;

/// Errors that can occur while running the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Preamble scanning error
    #[error("preamble error: {0}")]
    Preamble(#[from] PreambleError),

    /// Table loading error
    #[error("table error: {0}")]
    Table(#[from] TableError),

    /// Compositional transform error
    #[error("transform error: {0}")]
    Transform(#[from] TransformError),

    /// The input set is empty
    #[error("no input files given")]
    NoInputs,
}

/// What to do with a file whose preamble or table cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedPolicy {
    /// Abort the whole run on the first malformed file.
    Abort,
    /// Log a warning and continue without the file.
    Skip,
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Unit of the channel diameters in the exports.
    pub unit: PhiUnit,
    /// Zero-replacement delta; `None` uses the 1/n^2 library default.
    pub replacement_delta: Option<f64>,
    /// Policy for malformed input files.
    pub malformed: MalformedPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            unit: PhiUnit::Micrometers,
            replacement_delta: None,
            malformed: MalformedPolicy::Abort,
        }
    }
}

/// Counters describing one pipeline run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineStats {
    /// Files successfully loaded.
    pub files_processed: usize,
    /// Files rejected under [`MalformedPolicy::Skip`].
    pub files_skipped: usize,
    /// Tidy rows after reshaping, before trimming.
    pub tidy_rows: usize,
    /// Channels removed by the dead-channel trim.
    pub channels_trimmed: usize,
    /// Replicate curves that went through the clr transform.
    pub replicate_curves: usize,
}

/// Result of a pipeline run: the summary table plus run counters.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Final per-depth summary curves.
    pub summary: Vec<SummaryRow>,
    /// Run counters.
    pub stats: PipelineStats,
}

/// The configured transformation pipeline.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline with the given configuration.
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run all stages over the given export files.
    pub fn process_files(&self, paths: &[PathBuf]) -> Result<PipelineOutput, PipelineError> {
        if paths.is_empty() {
            return Err(PipelineError::NoInputs);
        }

        let mut stats = PipelineStats::default();
        let mut tables: Vec<SampleTable> = Vec::with_capacity(paths.len());

        for (path, result) in load_tables(paths) {
            match result {
                Ok(table) => {
                    stats.files_processed += 1;
                    tables.push(table);
                }
                Err(err) => match self.config.malformed {
                    MalformedPolicy::Abort => return Err(err),
                    MalformedPolicy::Skip => {
                        warn!("skipping {}: {err}", path.display());
                        stats.files_skipped += 1;
                    }
                },
            }
        }
        info!(
            "loaded {} of {} export files",
            stats.files_processed,
            paths.len()
        );

        let tidy = reshape::reshape_all(tables);
        stats.tidy_rows = tidy.len();

        let channels_before = distinct_channels(&tidy);
        let trimmed = trim_dead_channels(tidy);
        stats.channels_trimmed = channels_before - distinct_channels(&trimmed);
        info!(
            "tidy table: {} rows, {} channels trimmed",
            stats.tidy_rows, stats.channels_trimmed
        );

        let clr_rows = clr_transform(trimmed, self.config.unit, self.config.replacement_delta)?;
        stats.replicate_curves = clr_rows
            .iter()
            .map(|m| (m.depth.to_bits(), m.subsample, m.aliquot))
            .collect::<HashSet<_>>()
            .len();

        let summary = summarize(clr_rows);
        info!(
            "summary: {} rows from {} replicate curves",
            summary.len(),
            stats.replicate_curves
        );

        Ok(PipelineOutput { summary, stats })
    }
}

fn distinct_channels(rows: &[crate::reshape::TidyMeasurement]) -> usize {
    rows.iter()
        .map(|r| r.channel_um.to_bits())
        .collect::<HashSet<_>>()
        .len()
}

fn load_one(path: &Path) -> Result<SampleTable, PipelineError> {
    let scanned = preamble::scan(path)?;
    Ok(table::load_sample_table(path, &scanned)?)
}

#[cfg(feature = "parallel")]
fn load_tables(paths: &[PathBuf]) -> Vec<(PathBuf, Result<SampleTable, PipelineError>)> {
    paths
        .par_iter()
        .map(|path| (path.clone(), load_one(path)))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn load_tables(paths: &[PathBuf]) -> Vec<(PathBuf, Result<SampleTable, PipelineError>)> {
    paths
        .iter()
        .map(|path| (path.clone(), load_one(path)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    /// Write a minimal six-replicate export with the given depth code.
    fn write_export(dir: &TempDir, name: &str, depth_code: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        let preamble = [
            "Messbericht".to_string(),
            String::new(),
            format!("Dateiname: C:\\Lab\\L01\\GS_{depth_code}_1.csv"),
            "Messbereich: 0,04 - 2000,00".to_string(),
            "Probe: Kern A".to_string(),
            String::new(),
            "Messdauer: 30 s".to_string(),
            String::new(),
        ];
        let header = [
            "\t1\t2\t3\t1\t2\t3",
            "Kanaldurchmesser unten [um]\tVol\tVol\tVol\tVol\tVol\tVol",
            "[um]\t[%]\t[%]\t[%]\t[%]\t[%]\t[%]",
        ];
        let data = [
            "63,00\t30,0\t31,0\t29,0\t30,5\t29,5\t30,0",
            "125,00\t70,0\t69,0\t71,0\t69,5\t70,5\t70,0",
            "2000,00\t\t\t\t\t\t",
        ];
        for line in preamble.iter().map(String::as_str).chain(header).chain(data) {
            writeln!(file, "{line}").unwrap();
        }
        path
    }

    #[test]
    fn empty_input_set_is_an_error() {
        let pipeline = Pipeline::new(PipelineConfig::default());
        assert!(matches!(
            pipeline.process_files(&[]),
            Err(PipelineError::NoInputs)
        ));
    }

    #[test]
    fn abort_policy_fails_on_a_malformed_file() {
        let dir = TempDir::new().unwrap();
        let good = write_export(&dir, "good.csv", "150");
        let bad = dir.path().join("bad.csv");
        fs::write(&bad, "not an export at all").unwrap();

        let pipeline = Pipeline::new(PipelineConfig::default());
        let err = pipeline.process_files(&[good, bad]).unwrap_err();
        assert!(matches!(err, PipelineError::Preamble(_)));
    }

    #[test]
    fn skip_policy_continues_past_a_malformed_file() {
        let dir = TempDir::new().unwrap();
        let good = write_export(&dir, "good.csv", "150");
        let bad = dir.path().join("bad.csv");
        fs::write(&bad, "not an export at all").unwrap();

        let pipeline = Pipeline::new(PipelineConfig {
            malformed: MalformedPolicy::Skip,
            ..PipelineConfig::default()
        });
        let output = pipeline.process_files(&[good, bad]).unwrap();
        assert_eq!(output.stats.files_processed, 1);
        assert_eq!(output.stats.files_skipped, 1);
        assert!(!output.summary.is_empty());
    }

    #[test]
    fn two_files_aggregate_into_two_depths() {
        let dir = TempDir::new().unwrap();
        let a = write_export(&dir, "a.csv", "150");
        let b = write_export(&dir, "b.csv", "200");

        let pipeline = Pipeline::new(PipelineConfig::default());
        let output = pipeline.process_files(&[a, b]).unwrap();

        let depths: Vec<f64> = output.summary.iter().map(|r| r.depth).collect();
        assert!(depths.contains(&150.0) && depths.contains(&200.0));
        // Two channels per depth survive (the sentinel is not a channel).
        assert_eq!(output.summary.len(), 4);
        assert_eq!(output.stats.replicate_curves, 12);
        assert!(output.summary.iter().all(|r| r.replicate_count == 6));
    }
}
