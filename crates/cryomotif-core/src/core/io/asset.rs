use crate::core::io::mrc::{MrcError, MrcFile};
use crate::core::io::pdb::{PdbError, PdbFile};
use crate::core::io::traits::{StructureFile, VolumeFile};
use crate::core::models::structure::AtomicStructure;
use crate::core::models::volume::DensityVolume;
use std::path::Path;
use thiserror::Error;

/// A file opened by [`load_asset`], tagged by what it contains.
#[derive(Debug, Clone)]
pub enum LoadedAsset {
    Structure(AtomicStructure),
    Volume(DensityVolume),
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Unrecognized file extension for '{0}' (expected .mrc, .map, .ccp4, .pdb or .ent)")]
    UnknownFormat(String),
    #[error("Failed to read map '{path}': {source}")]
    Volume { path: String, source: MrcError },
    #[error("Failed to read structure '{path}': {source}")]
    Structure { path: String, source: PdbError },
    #[error("'{path}' is not a {expected} file")]
    WrongKind { path: String, expected: &'static str },
}

impl LoadedAsset {
    pub fn into_volume(self) -> Option<DensityVolume> {
        match self {
            LoadedAsset::Volume(volume) => Some(volume),
            LoadedAsset::Structure(_) => None,
        }
    }

    pub fn into_structure(self) -> Option<AtomicStructure> {
        match self {
            LoadedAsset::Structure(structure) => Some(structure),
            LoadedAsset::Volume(_) => None,
        }
    }
}

/// [`load_asset`] for a file that must hold a density map.
pub fn load_volume(path: &Path) -> Result<DensityVolume, AssetError> {
    load_asset(path)?
        .into_volume()
        .ok_or_else(|| AssetError::WrongKind {
            path: path.to_string_lossy().to_string(),
            expected: "density map",
        })
}

/// [`load_asset`] for a file that must hold an atomic model.
pub fn load_structure(path: &Path) -> Result<AtomicStructure, AssetError> {
    load_asset(path)?
        .into_structure()
        .ok_or_else(|| AssetError::WrongKind {
            path: path.to_string_lossy().to_string(),
            expected: "structure",
        })
}

/// Opens a map or structure file, dispatching on its extension.
pub fn load_asset(path: &Path) -> Result<LoadedAsset, AssetError> {
    let display = path.to_string_lossy().to_string();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .ok_or_else(|| AssetError::UnknownFormat(display.clone()))?;

    match extension.as_str() {
        "mrc" | "map" | "ccp4" => MrcFile::read_from_path(path)
            .map(LoadedAsset::Volume)
            .map_err(|source| AssetError::Volume {
                path: display,
                source,
            }),
        "pdb" | "ent" => PdbFile::read_from_path(path)
            .map(LoadedAsset::Structure)
            .map_err(|source| AssetError::Structure {
                path: display,
                source,
            }),
        _ => Err(AssetError::UnknownFormat(display)),
    }
}
