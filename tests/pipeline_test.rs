//! Integration tests for the granulo pipeline.
//!
//! These tests build synthetic instrument exports on disk (windows-1252
//! bytes, CRLF line endings, comma decimals - the real format quirks) and
//! verify the full path from preamble scan to the aggregated summary table.

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use granulo::phi::{diameter_to_phi, PhiUnit};
use granulo::pipeline::{MalformedPolicy, Pipeline, PipelineConfig};
use granulo::preamble;

/// Build one export as raw bytes: an 8-line free-text preamble (filename row
/// carrying the depth code at character offset 25), the three-row header
/// block with the channel-diameter marker on line 10 (1-based), and the given
/// data rows.
fn export_bytes(depth_code: &str, data_rows: &[&str]) -> Vec<u8> {
    let mut lines: Vec<Vec<u8>> = vec![
        b"Messbericht Laserbeugung".to_vec(),
        Vec::new(),
        format!("Dateiname: C:\\Lab\\L01\\GS_{depth_code}_1.csv").into_bytes(),
        b"Messbereich: 0,04 - 2000,00 \xB5m".to_vec(),
        b"Probe: Kern A".to_vec(),
        Vec::new(),
        b"Messdauer: 30 s".to_vec(),
        Vec::new(),
        b"\t1\t2\t3\t1\t2\t3".to_vec(),
        b"Kanaldurchmesser unten [\xB5m]\tVol\tVol\tVol\tVol\tVol\tVol".to_vec(),
        b"[\xB5m]\t[%]\t[%]\t[%]\t[%]\t[%]\t[%]".to_vec(),
    ];
    for row in data_rows {
        lines.push(row.as_bytes().to_vec());
    }
    lines.join(&b"\r\n"[..])
}

fn write_export(dir: &TempDir, name: &str, depth_code: &str, data_rows: &[&str]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, export_bytes(depth_code, data_rows)).unwrap();
    path
}

const SIX_REPLICATE_ROWS: &[&str] = &[
    "63,00\t30,0\t31,0\t29,0\t30,5\t29,5\t30,0",
    "125,00\t70,0\t69,0\t71,0\t69,5\t70,5\t70,0",
    "0,04\t0\t0\t0\t0\t0\t0",
    "2000,00\t\t\t\t\t\t",
];

#[test]
fn preamble_scan_finds_the_documented_offsets() {
    let dir = TempDir::new().unwrap();
    let path = write_export(&dir, "gs_150.csv", "150", SIX_REPLICATE_ROWS);

    let scanned = preamble::scan(&path).unwrap();
    // Marker row is line 10 (1-based), so the table starts at row index 8.
    assert_eq!(scanned.table_start, 8);
    assert_eq!(scanned.depth_code, "150");
    assert_eq!(scanned.depth, 150.0);
}

#[test]
fn end_to_end_six_replicate_export() {
    let dir = TempDir::new().unwrap();
    let path = write_export(&dir, "gs_150.csv", "150", SIX_REPLICATE_ROWS);

    let output = Pipeline::new(PipelineConfig::default())
        .process_files(&[path])
        .unwrap();

    // The all-zero row and the trailing sentinel never reach the tidy table:
    // 2 surviving channels x 6 replicate columns.
    assert_eq!(output.stats.files_processed, 1);
    assert_eq!(output.stats.tidy_rows, 12);
    assert_eq!(output.stats.replicate_curves, 6);

    let channels: Vec<f64> = output.summary.iter().map(|r| r.channel_um).collect();
    assert_eq!(channels, vec![63.0, 125.0]);

    for row in &output.summary {
        assert_eq!(row.depth, 150.0);
        assert_eq!(row.replicate_count, 6);
        assert!(row.clr_std.is_some());
        assert!(row.clr_mean.is_finite() && row.clr_median.is_finite());
        let expected_phi = diameter_to_phi(row.channel_um, PhiUnit::Micrometers);
        assert_eq!(row.phi, expected_phi);
    }

    // The coarser channel carries ~70% of the volume, so its clr coordinate
    // sits above the finer channel's.
    assert!(output.summary[1].clr_mean > output.summary[0].clr_mean);
}

#[test]
fn clr_curves_of_two_channels_mirror_each_other() {
    // With exactly two surviving channels, clr coordinates are symmetric
    // around zero within each replicate, so the per-channel means mirror too.
    let dir = TempDir::new().unwrap();
    let path = write_export(&dir, "gs_150.csv", "150", SIX_REPLICATE_ROWS);

    let output = Pipeline::new(PipelineConfig::default())
        .process_files(&[path])
        .unwrap();
    let sum: f64 = output.summary.iter().map(|r| r.clr_mean).sum();
    assert!(sum.abs() < 1e-9);
}

#[test]
fn channel_missing_everywhere_is_trimmed_globally() {
    let rows: &[&str] = &[
        "63,00\t30,0\t31,0\t29,0\t30,5\t29,5\t30,0",
        "500,00\t\t\t\t\t\t",
        "125,00\t70,0\t69,0\t71,0\t69,5\t70,5\t70,0",
        "2000,00\t\t\t\t\t\t",
    ];
    let dir = TempDir::new().unwrap();
    let a = write_export(&dir, "gs_150.csv", "150", rows);
    let b = write_export(&dir, "gs_200.csv", "200", rows);

    let output = Pipeline::new(PipelineConfig::default())
        .process_files(&[a, b])
        .unwrap();

    assert_eq!(output.stats.channels_trimmed, 1);
    assert!(output.summary.iter().all(|r| r.channel_um != 500.0));
    // Two depths x two surviving channels.
    assert_eq!(output.summary.len(), 4);
}

#[test]
fn nine_column_exports_contribute_six_replicate_curves() {
    let rows: &[&str] = &[
        "63,00\t30\t31\t29\t30\t29\t31\t28\t32\t30",
        "125,00\t70\t69\t71\t70\t71\t69\t72\t68\t70",
        "2000,00\t\t\t\t\t\t\t\t\t",
    ];
    let dir = TempDir::new().unwrap();
    let path = write_export(&dir, "gs_042.csv", "042", rows);

    let output = Pipeline::new(PipelineConfig::default())
        .process_files(&[path])
        .unwrap();

    // All nine replicate columns reach the tidy table, but only the regular
    // 2 x 3 structure is transformed and aggregated.
    assert_eq!(output.stats.tidy_rows, 18);
    assert_eq!(output.stats.replicate_curves, 6);
    assert!(output.summary.iter().all(|r| r.replicate_count == 6));
    assert!(output.summary.iter().all(|r| r.depth == 42.0));
}

#[test]
fn depths_are_aggregated_in_ascending_order() {
    let dir = TempDir::new().unwrap();
    let deep = write_export(&dir, "gs_200.csv", "200", SIX_REPLICATE_ROWS);
    let shallow = write_export(&dir, "gs_150.csv", "150", SIX_REPLICATE_ROWS);

    // Input order is deliberately reversed; the summary order is not.
    let output = Pipeline::new(PipelineConfig::default())
        .process_files(&[deep, shallow])
        .unwrap();

    let depths: Vec<f64> = output.summary.iter().map(|r| r.depth).collect();
    assert_eq!(depths, vec![150.0, 150.0, 200.0, 200.0]);
}

#[test]
fn malformed_file_aborts_by_default_but_can_be_skipped() {
    let dir = TempDir::new().unwrap();
    let good = write_export(&dir, "gs_150.csv", "150", SIX_REPLICATE_ROWS);
    let bad = dir.path().join("notes.txt");
    fs::write(&bad, "operator notes, no measurement table").unwrap();

    let abort = Pipeline::new(PipelineConfig::default());
    assert!(abort.process_files(&[good.clone(), bad.clone()]).is_err());

    let skip = Pipeline::new(PipelineConfig {
        malformed: MalformedPolicy::Skip,
        ..PipelineConfig::default()
    });
    let output = skip.process_files(&[good, bad]).unwrap();
    assert_eq!(output.stats.files_processed, 1);
    assert_eq!(output.stats.files_skipped, 1);
    assert_eq!(output.summary.len(), 2);
}

#[test]
fn depth_code_must_be_numeric() {
    let dir = TempDir::new().unwrap();
    // "abc" sits at the depth offset of the filename field.
    let path = write_export(&dir, "gs_abc.csv", "abc", SIX_REPLICATE_ROWS);

    let err = preamble::scan(&path).unwrap_err();
    assert!(matches!(err, preamble::PreambleError::DepthNotNumeric { .. }));
}
