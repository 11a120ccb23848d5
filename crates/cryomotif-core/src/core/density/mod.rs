//! Pure volumetric algorithms.
//!
//! - [`normalize`] - percentile scaling of raw maps to `[0, 1]`
//! - [`labeling`] - atom → voxel projection producing one binary label volume per structural class
//! - [`resample`] - the [`resample::Resampler`] seam and its trilinear default
//! - [`patch`] - fixed-size cube extraction, z-scoring, padding and masking

pub mod labeling;
pub mod normalize;
pub mod patch;
pub mod resample;
