//! Readers and writers for the file formats the pipeline consumes.
//!
//! Volumetric maps go through [`mrc::MrcFile`], atomic models through
//! [`pdb::PdbFile`], both behind the traits in [`traits`]. Training and
//! validation sets are described by CSV manifests ([`manifest`]). The
//! workflows open maps and models through [`asset::load_volume`] and
//! [`asset::load_structure`], which dispatch on the file extension.

pub mod asset;
pub mod manifest;
pub mod mrc;
pub mod pdb;
pub mod traits;
