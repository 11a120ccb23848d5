use super::checkpoint::CheckpointError;
use super::config::ConfigError;
use super::dataset::SampleError;
use super::network::NetworkError;
use crate::core::density::resample::ResampleError;
use crate::core::io::asset::AssetError;
use crate::core::io::manifest::ManifestError;
use crate::core::io::mrc::MrcError;
use crate::core::io::pdb::PdbError;
use crate::core::models::volume::VolumeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to read density map '{path}': {source}")]
    DensityRead { path: String, source: MrcError },

    #[error("Failed to write map '{path}': {source}")]
    MapWrite { path: String, source: MrcError },

    #[error("Failed to read structure '{path}': {source}")]
    StructureRead { path: String, source: PdbError },

    #[error("I/O error at '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Resampling failed: {0}")]
    Resample(#[from] ResampleError),

    #[error("Invalid volume: {0}")]
    Volume(#[from] VolumeError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Sample error: {0}")]
    Sample(#[from] SampleError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    #[error("No inputs found: {0}")]
    NoInputs(String),
}

impl EngineError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_string_lossy().to_string(),
            source,
        }
    }
}
