//! Per-replicate compositional (clr) transformation.
//!
//! For every (depth, subsample, aliquot) replicate, this stage extracts the
//! volume-percent curve across channels, orders it by phi, replaces missing
//! readings with exact zero, and applies closure, multiplicative zero
//! replacement, and the centered log-ratio transform in that order.
//!
//! Only the regular replicate structure (subsamples 1-2, aliquots 1-3) is
//! transformed; the extra subsample triple of nine-column exports is carried
//! through the tidy stages but does not contribute a curve here.

use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::compositional::{closure, clr, multiplicative_replacement, CompositionError};
use crate::phi::{diameter_to_phi, PhiUnit};
use crate::reshape::TidyMeasurement;

/// Subsamples participating in the transform.
const SUBSAMPLES: [u8; 2] = [1, 2];
/// Aliquots participating in the transform.
const ALIQUOTS: [u8; 3] = [1, 2, 3];

/// Errors raised while transforming replicate curves.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// A replicate curve was not a valid composition
    #[error(
        "invalid composition at depth {depth}, subsample {subsample}, aliquot {aliquot}: {source}"
    )]
    Composition {
        /// Depth of the offending replicate
        depth: f64,
        /// Subsample of the offending replicate
        subsample: u8,
        /// Aliquot of the offending replicate
        aliquot: u8,
        /// Underlying composition error
        #[source]
        source: CompositionError,
    },
}

/// One clr coordinate: the transformed reading for one channel of one
/// replicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClrMeasurement {
    /// Sample depth.
    pub depth: f64,
    /// Lower-bound channel diameter in micrometers.
    pub channel_um: f64,
    /// Krumbein phi value of the channel (the ordering key).
    pub phi: f64,
    /// Subsample identity.
    pub subsample: u8,
    /// Aliquot identity.
    pub aliquot: u8,
    /// Centered log-ratio coordinate.
    pub clr: f64,
}

/// Transform every replicate curve in the tidy table to clr coordinates.
///
/// Missing readings become exact zeros before closure; the zeros are then
/// imputed by multiplicative replacement (`delta` of `None` uses the library
/// default of 1/n^2). A negative reading or an all-missing curve is a fatal
/// [`TransformError`].
pub fn clr_transform(
    rows: Vec<TidyMeasurement>,
    unit: PhiUnit,
    delta: Option<f64>,
) -> Result<Vec<ClrMeasurement>, TransformError> {
    type GroupKey = (u64, u8, u8);
    let mut groups: HashMap<GroupKey, Vec<(f64, Option<f64>)>> = HashMap::new();

    for row in &rows {
        if !SUBSAMPLES.contains(&row.subsample) || !ALIQUOTS.contains(&row.aliquot) {
            continue;
        }
        groups
            .entry((row.depth.to_bits(), row.subsample, row.aliquot))
            .or_default()
            .push((row.channel_um, row.volume_percent));
    }

    let mut keys: Vec<GroupKey> = groups.keys().copied().collect();
    keys.sort_by(|a, b| {
        f64::from_bits(a.0)
            .total_cmp(&f64::from_bits(b.0))
            .then(a.1.cmp(&b.1))
            .then(a.2.cmp(&b.2))
    });

    debug!("transforming {} replicate curves", keys.len());

    let mut out = Vec::with_capacity(rows.len());
    for key in keys {
        let (depth_bits, subsample, aliquot) = key;
        let depth = f64::from_bits(depth_bits);
        let mut curve = groups.remove(&key).unwrap_or_default();

        // Order channels by phi ascending; every replicate of a sample gets
        // the same ordering, so clr positions stay comparable.
        curve.sort_by(|a, b| {
            diameter_to_phi(a.0, unit).total_cmp(&diameter_to_phi(b.0, unit))
        });

        let values: Vec<f64> = curve.iter().map(|(_, v)| v.unwrap_or(0.0)).collect();
        let coords = apply(&values, delta).map_err(|source| TransformError::Composition {
            depth,
            subsample,
            aliquot,
            source,
        })?;

        for ((channel_um, _), clr_value) in curve.into_iter().zip(coords) {
            out.push(ClrMeasurement {
                depth,
                channel_um,
                phi: diameter_to_phi(channel_um, unit),
                subsample,
                aliquot,
                clr: clr_value,
            });
        }
    }

    Ok(out)
}

/// closure -> multiplicative replacement -> clr, per the compositional
/// contract.
fn apply(values: &[f64], delta: Option<f64>) -> Result<Vec<f64>, CompositionError> {
    let closed = closure(values)?;
    let replaced = multiplicative_replacement(&closed, delta)?;
    clr(&replaced)
}
