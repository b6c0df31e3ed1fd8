//! # abcd-model
//!
//! Workspace-parameter synthesis for ABCD background estimation.
//!
//! [`WorkspaceGenerator`] walks a set of blocks, aggregates their yields
//! through the `abcd-core` cache, and emits the parameters and formula
//! factors of the likelihood model as a stream of [`FactoryCall`]s into a
//! [`ModelBuilder`]. Building the actual pdfs, fitting, and persistence are
//! the model builder's business; this crate only decides *what* the model
//! contains and seeds every parameter from the aggregated yields.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod workspace;

pub use builder::{FactoryCall, ModelBuilder, RecordingBuilder};
pub use workspace::{BlindLevel, WorkspaceGenerator};
