//! Closed vocabularies used across the pipeline.
//!
//! - [`structural`] - atom name → backbone / ribose / base classification used by the label mapper
//! - [`motif`] - the coarse motif classes predicted by the network and the fine motif names that map onto them

pub mod motif;
pub mod structural;
