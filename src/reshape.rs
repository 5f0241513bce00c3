//! Wide-to-long reshaping of per-file tables.
//!
//! Melts the replicate columns of each [`SampleTable`] into tidy rows (one
//! observation per channel x replicate) and concatenates all files into a
//! single table. After this stage `(depth, channel_um, subsample, aliquot)`
//! is a key.

use serde::{Deserialize, Serialize};

use crate::table::SampleTable;

/// One tidy observation: a single volume-percent reading for one channel of
/// one replicate at one depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TidyMeasurement {
    /// Sample depth (join key across files).
    pub depth: f64,
    /// Lower-bound channel diameter in micrometers.
    pub channel_um: f64,
    /// Subsample identity.
    pub subsample: u8,
    /// Aliquot identity.
    pub aliquot: u8,
    /// Replicate column label, kept as provenance.
    pub label: String,
    /// Volume percent in [0, 100], or `None` for a cell that failed numeric
    /// coercion.
    pub volume_percent: Option<f64>,
}

/// Melt one per-file table into tidy rows.
pub fn melt(table: SampleTable) -> Vec<TidyMeasurement> {
    let SampleTable {
        depth,
        channels,
        replicates,
        ..
    } = table;

    let mut rows = Vec::with_capacity(channels.len() * replicates.len());
    for column in replicates {
        for (channel_um, volume_percent) in channels.iter().zip(column.values) {
            rows.push(TidyMeasurement {
                depth,
                channel_um: *channel_um,
                subsample: column.subsample,
                aliquot: column.aliquot,
                label: column.label.as_str().to_string(),
                volume_percent,
            });
        }
    }
    rows
}

/// Melt every file's table and unify the results into one long table.
pub fn reshape_all(tables: Vec<SampleTable>) -> Vec<TidyMeasurement> {
    tables.into_iter().flat_map(melt).collect()
}
