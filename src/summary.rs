//! Replicate aggregation into per-depth summary curves.
//!
//! Collapses the replicate structure: for every (depth, channel) the clr
//! coordinates of all contributing replicates (at most 2 subsamples x 3
//! aliquots) are reduced to mean, median, and sample standard deviation.
//! Replicate-identifying fields are dropped; `replicate_count` records how
//! many observations actually contributed, so partial aggregation (after
//! upstream trimming) stays detectable.

use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::transform::ClrMeasurement;

/// Replicates expected per (depth, channel) under the regular 2 x 3 design.
pub const EXPECTED_REPLICATES: usize = 6;

/// One aggregated row of the final summary table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    /// Sample depth.
    pub depth: f64,
    /// Lower-bound channel diameter in micrometers.
    pub channel_um: f64,
    /// Krumbein phi value of the channel.
    pub phi: f64,
    /// Arithmetic mean of the clr coordinates across replicates.
    pub clr_mean: f64,
    /// Median of the clr coordinates across replicates.
    pub clr_median: f64,
    /// Sample standard deviation; `None` when fewer than two replicates
    /// contributed.
    pub clr_std: Option<f64>,
    /// Number of replicates that contributed to this channel.
    pub replicate_count: usize,
}

/// Aggregate clr coordinates into one row per (depth, channel).
///
/// A channel with fewer than [`EXPECTED_REPLICATES`] observations is
/// aggregated over whatever subset is present. Output is sorted by depth,
/// then channel diameter ascending, independent of input order.
pub fn summarize(rows: Vec<ClrMeasurement>) -> Vec<SummaryRow> {
    type GroupKey = (u64, u64);
    let mut groups: HashMap<GroupKey, (f64, Vec<f64>)> = HashMap::new();

    for row in rows {
        let key = (row.depth.to_bits(), row.channel_um.to_bits());
        let entry = groups.entry(key).or_insert_with(|| (row.phi, Vec::new()));
        entry.1.push(row.clr);
    }

    let mut keys: Vec<GroupKey> = groups.keys().copied().collect();
    keys.sort_by(|a, b| {
        f64::from_bits(a.0)
            .total_cmp(&f64::from_bits(b.0))
            .then(f64::from_bits(a.1).total_cmp(&f64::from_bits(b.1)))
    });

    let mut out = Vec::with_capacity(keys.len());
    for key in keys {
        let (depth_bits, channel_bits) = key;
        let (phi, mut values) = match groups.remove(&key) {
            Some(group) => group,
            None => continue,
        };
        values.sort_by(f64::total_cmp);

        let count = values.len();
        let mean = mean(&values);
        out.push(SummaryRow {
            depth: f64::from_bits(depth_bits),
            channel_um: f64::from_bits(channel_bits),
            phi,
            clr_mean: mean,
            clr_median: median(&values),
            clr_std: sample_std(&values, mean),
            replicate_count: count,
        });
    }

    debug!("aggregated {} summary rows", out.len());
    out
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Median of an already-sorted slice.
fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Sample standard deviation (n - 1 denominator); `None` below two values.
fn sample_std(values: &[f64], mean: f64) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some((ss / (n - 1) as f64).sqrt())
}
