//! Global dead-channel trimming.
//!
//! Removes size channels that never carry a reading anywhere in the unified
//! tidy table: channels whose every observation (across all depths and
//! replicates) is exactly zero, and channels whose every observation is
//! missing.
//!
//! This is a different policy from the per-file row filter in
//! [`table`](crate::table): there, a single exact-zero reading discards one
//! file's row; here, a channel is removed globally only when no file ever
//! measured anything in it. The two must stay separate operations.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::reshape::TidyMeasurement;

#[derive(Default)]
struct ChannelStats {
    observations: usize,
    missing: usize,
    zeros: usize,
}

impl ChannelStats {
    fn is_dead(&self) -> bool {
        self.zeros == self.observations || self.missing == self.observations
    }
}

/// Drop channels that are all-zero or all-missing across the entire dataset.
///
/// Equivalent to pivoting wide by channel, dropping dead columns, and melting
/// back, but applied directly to the long table. Idempotent: a second
/// application returns the input unchanged.
pub fn trim_dead_channels(rows: Vec<TidyMeasurement>) -> Vec<TidyMeasurement> {
    let mut stats: HashMap<u64, ChannelStats> = HashMap::new();
    for row in &rows {
        let entry = stats.entry(row.channel_um.to_bits()).or_default();
        entry.observations += 1;
        match row.volume_percent {
            None => entry.missing += 1,
            Some(v) if v == 0.0 => entry.zeros += 1,
            Some(_) => {}
        }
    }

    let dead: HashSet<u64> = stats
        .iter()
        .filter(|(_, s)| s.is_dead())
        .map(|(bits, _)| *bits)
        .collect();

    if !dead.is_empty() {
        debug!("trimming {} dead channels", dead.len());
    }

    rows.into_iter()
        .filter(|row| !dead.contains(&row.channel_um.to_bits()))
        .collect()
}
