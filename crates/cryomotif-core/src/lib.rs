//! # cryomotif
//!
//! Voxel labeling of cryo-EM density maps and 3D-CNN classification of RNA
//! secondary-structure motifs.
//!
//! ## Architecture
//!
//! The library is split into three layers with a strict dependency order.
//!
//! - **[`core`]: Data and primitives.** Density volumes, atomic structures,
//!   the structural and motif taxonomies, MRC/PDB/CSV readers, and the pure
//!   volumetric algorithms: percentile normalization, atom-to-voxel labeling,
//!   resampling and patch extraction.
//!
//! - **[`engine`]: Learning and state.** The `burn` classifier network and
//!   its checkpoints, the prefetching training data pipeline, evaluation
//!   metrics, run configuration and progress reporting.
//!
//! - **[`workflows`]: The public API.** Complete procedures (normalize,
//!   label, train, classify, evaluate) that tie `engine` and `core` together.

pub mod core;
pub mod engine;
pub mod workflows;
