//! # Core Module
//!
//! Stateless building blocks of the motif pipeline: data models, file
//! formats, closed vocabularies and the volumetric algorithms that turn a
//! raw cryo-EM map into classifier input.
//!
//! - **Data** ([`models`]) - density volumes and atomic structures
//! - **File I/O** ([`io`]) - MRC maps, PDB models, CSV manifests
//! - **Vocabularies** ([`taxonomy`]) - structural atom classes and motif labels
//! - **Algorithms** ([`density`]) - normalization, labeling, resampling, patch extraction
//!
//! Nothing in this module holds state between calls or touches the network.

pub mod density;
pub mod io;
pub mod models;
pub mod taxonomy;
