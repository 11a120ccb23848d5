//! # Workflows Module
//!
//! End-to-end entry points of the library. Each workflow takes an explicit
//! configuration built once by the caller, reports progress through a
//! [`ProgressReporter`](crate::engine::progress::ProgressReporter) and
//! returns a typed result or an [`EngineError`](crate::engine::error::EngineError).
//!
//! - **Normalization** ([`normalize`]) - Percentile scaling of a single map
//! - **Labeling** ([`label`]) - Per-class voxel labels from an atomic model
//! - **Training** ([`train`]) - Classifier training with per-epoch checkpoints
//! - **Classification** ([`classify`]) - Motif prediction for individual maps
//! - **Evaluation** ([`evaluate`]) - Confusion matrix over class-sorted folders

pub mod classify;
pub mod evaluate;
pub mod label;
pub mod normalize;
pub mod train;
