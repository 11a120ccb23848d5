//! # Core Models Module
//!
//! Data structures shared by every stage of the pipeline: density grids and
//! the atomic structures they are labeled against.
//!
//! ## Key Components
//!
//! - [`volume`] - [`volume::DensityVolume`], a `(z, y, x)` grid with voxel size, origin and start
//! - [`structure`] - [`structure::AtomicStructure`] and its incremental builder
//! - [`chain`], [`residue`], [`atom`] - the model → chain → residue → atom hierarchy
//! - [`ids`] - stable slot-map keys for every hierarchy level
//!
//! ## Usage
//!
//! ```ignore
//! use cryomotif::core::models::structure::StructureBuilder;
//!
//! let mut builder = StructureBuilder::new();
//! builder.start_chain('A').start_residue(1, None, "G");
//! builder.add_atom(1, "P", "P", Point3::new(0.0, 0.0, 0.0));
//! let structure = builder.build();
//! ```

pub mod atom;
pub mod chain;
pub mod ids;
pub mod residue;
pub mod structure;
pub mod volume;
