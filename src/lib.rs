//! # granulo - Tidy Grain-Size Distributions from Laser-Diffraction Exports
//!
//! `granulo` ingests raw exports from a laser-diffraction particle-size
//! analyzer - semi-structured text files with a free-text preamble followed by
//! a tab-delimited measurement table - and turns them into a single tidy
//! dataset of particle-size distributions per sample depth. Each replicate
//! distribution is then re-expressed through a centered-log-ratio (clr)
//! transform so that ordinary statistics (mean, median, standard deviation)
//! become valid on the sum-constrained percentage data.
//!
//! ## Pipeline
//!
//! 1. **Preamble scan** - locate the measurement table and extract the sample
//!    depth code from the free-text header ([`preamble`]).
//! 2. **Load & normalize** - parse the numeric table, label replicate columns,
//!    fix comma-decimal locale cells, drop degenerate rows ([`table`]).
//! 3. **Reshape** - melt the wide replicate columns into long (tidy) rows and
//!    unify all files into one table ([`reshape`]).
//! 4. **Trim** - remove size channels that never carry a reading anywhere in
//!    the dataset ([`trim`]).
//! 5. **Phi conversion** - logarithmic Krumbein phi scale as the channel
//!    ordering key ([`phi`]).
//! 6. **Compositional transform** - closure, multiplicative zero replacement,
//!    and clr per replicate curve ([`compositional`], [`transform`]).
//! 7. **Aggregate** - collapse the 2 subsample x 3 aliquot replicate structure
//!    into per-depth mean/median/std curves ([`summary`]).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use granulo::pipeline::{Pipeline, PipelineConfig};
//! use std::path::PathBuf;
//!
//! let paths = vec![PathBuf::from("Data/probe_150.csv")];
//! let pipeline = Pipeline::new(PipelineConfig::default());
//! let output = pipeline.process_files(&paths)?;
//!
//! for row in &output.summary {
//!     println!("{} um @ depth {}: clr mean {:.3}", row.channel_um, row.depth, row.clr_mean);
//! }
//! # Ok::<(), granulo::pipeline::PipelineError>(())
//! ```
//!
//! ## Output Schema (summary table)
//!
//! | Column | Type | Description |
//! |--------|------|-------------|
//! | depth | f64 | Sample depth parsed from the preamble |
//! | channel_um | f64 | Lower-bound channel diameter in micrometers |
//! | phi | f64 | Krumbein phi value of the channel |
//! | clr_mean | f64 | Mean clr coordinate across replicates |
//! | clr_median | f64 | Median clr coordinate across replicates |
//! | clr_std | f64? | Sample standard deviation (absent when n < 2) |
//! | replicate_count | usize | Replicates contributing to this channel |
//!
//! ## Why clr?
//!
//! Volume percentages are compositional: non-negative and conceptually summing
//! to 100. Arithmetic means of raw percentages violate the constant-sum
//! constraint and distort covariance structure. The clr transform maps each
//! curve from the simplex into unconstrained real space, at the cost of a zero
//! replacement step beforehand (the logarithm of zero is undefined).

// Documentation lints - enforce complete documentation for publication
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

pub mod compositional;
pub mod phi;
pub mod pipeline;
pub mod preamble;
pub mod reshape;
pub mod summary;
pub mod table;
pub mod transform;
pub mod trim;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::compositional::{closure, clr, multiplicative_replacement, CompositionError};
    pub use crate::phi::{diameter_to_phi, PhiError, PhiUnit};
    pub use crate::pipeline::{
        MalformedPolicy, Pipeline, PipelineConfig, PipelineError, PipelineOutput, PipelineStats,
    };
    pub use crate::preamble::{Preamble, PreambleError};
    pub use crate::reshape::TidyMeasurement;
    pub use crate::summary::{summarize, SummaryRow};
    pub use crate::table::{ReplicateColumn, ReplicateLabel, SampleTable, TableError};
    pub use crate::transform::{clr_transform, ClrMeasurement, TransformError};
    pub use crate::trim::trim_dead_channels;
}
