//! Compositional-data primitives: closure, multiplicative zero replacement,
//! and the centered log-ratio transform.
//!
//! A grain-size distribution is compositional: its channel percentages are
//! non-negative and sum to a constant, so the curve lives in a simplex rather
//! than in unconstrained real space. These three operations carry a curve out
//! of the simplex so that ordinary Euclidean statistics apply:
//!
//! 1. [`closure`] rescales a non-negative vector to sum 1.
//! 2. [`multiplicative_replacement`] imputes exact zeros with a small value
//!    while keeping the vector closed and preserving the ratios of the
//!    non-zero entries (the logarithm of zero is undefined, so zeros must go
//!    before the log-ratio step).
//! 3. [`clr`] maps the closed, zero-free vector to real coordinates via
//!    log-ratios to the geometric mean; the result sums to (approximately)
//!    zero.
//!
//! The contracts follow the classical Aitchison treatment of compositional
//! data as implemented by the usual Python/R packages, so results are
//! comparable across toolchains.

/// Errors raised by the compositional primitives. All of them indicate a
/// caller bug or invalid input data, never a recoverable condition.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompositionError {
    /// The input vector has no entries
    #[error("composition vector is empty")]
    Empty,

    /// Compositions must be non-negative
    #[error("negative entry {value} at position {index} in composition vector")]
    NegativeEntry {
        /// Position of the offending entry
        index: usize,
        /// The offending value
        value: f64,
    },

    /// Closure of an all-zero vector is undefined
    #[error("composition vector sums to zero; closure is undefined")]
    AllZero,

    /// The log-ratio transform needs strictly positive entries
    #[error("non-positive entry {value} at position {index}; run zero replacement first")]
    NonPositiveEntry {
        /// Position of the offending entry
        index: usize,
        /// The offending value
        value: f64,
    },

    /// The replacement delta would consume the whole composition
    #[error("replacement delta {delta} with {zeros} zero entries does not leave a valid composition")]
    DeltaOutOfRange {
        /// The delta in use
        delta: f64,
        /// Number of zero entries being replaced
        zeros: usize,
    },
}

fn check_non_negative(values: &[f64]) -> Result<(), CompositionError> {
    if values.is_empty() {
        return Err(CompositionError::Empty);
    }
    for (index, &value) in values.iter().enumerate() {
        if value < 0.0 || value.is_nan() {
            return Err(CompositionError::NegativeEntry { index, value });
        }
    }
    Ok(())
}

/// Rescale a non-negative vector so its entries sum to 1.
///
/// Idempotent up to floating-point rounding. Fails on negative entries and on
/// an all-zero vector.
pub fn closure(values: &[f64]) -> Result<Vec<f64>, CompositionError> {
    check_non_negative(values)?;
    let sum: f64 = values.iter().sum();
    if sum <= 0.0 {
        return Err(CompositionError::AllZero);
    }
    Ok(values.iter().map(|v| v / sum).collect())
}

/// Replace exact zeros in a composition with a small positive delta,
/// shrinking the non-zero entries so the result stays closed.
///
/// The input is closed first, so raw percentage vectors are accepted
/// directly. `delta` defaults to `1/n^2` for an `n`-part composition, the
/// customary small fraction of the detection threshold. Pairwise ratios of
/// originally non-zero entries are preserved exactly: they are all scaled by
/// the same factor `1 - z * delta` for `z` zero entries.
pub fn multiplicative_replacement(
    values: &[f64],
    delta: Option<f64>,
) -> Result<Vec<f64>, CompositionError> {
    let closed = closure(values)?;
    let zeros = closed.iter().filter(|v| **v == 0.0).count();
    if zeros == 0 {
        return Ok(closed);
    }

    let n = closed.len();
    let delta = delta.unwrap_or(1.0 / (n as f64 * n as f64));
    let shrink = 1.0 - zeros as f64 * delta;
    if delta <= 0.0 || shrink <= 0.0 {
        return Err(CompositionError::DeltaOutOfRange { delta, zeros });
    }

    Ok(closed
        .iter()
        .map(|&v| if v == 0.0 { delta } else { v * shrink })
        .collect())
}

/// Centered log-ratio transform: `clr_i = ln(x_i) - mean_j(ln x_j)`.
///
/// The input is closed first; every entry must be strictly positive (apply
/// [`multiplicative_replacement`] beforehand when zeros are expected). The
/// output has the same length and sums to approximately zero.
pub fn clr(values: &[f64]) -> Result<Vec<f64>, CompositionError> {
    let closed = closure(values)?;
    for (index, &value) in closed.iter().enumerate() {
        if value <= 0.0 {
            return Err(CompositionError::NonPositiveEntry { index, value });
        }
    }

    let logs: Vec<f64> = closed.iter().map(|v| v.ln()).collect();
    let mean = logs.iter().sum::<f64>() / logs.len() as f64;
    Ok(logs.iter().map(|l| l - mean).collect())
}
