use crate::core::density::normalize::{NormalizationOutcome, normalize_map};
use crate::core::io::asset::load_volume;
use crate::core::io::mrc::MrcFile;
use crate::core::io::traits::VolumeFile;
use crate::engine::error::EngineError;
use std::path::Path;
use tracing::{info, instrument};

/// Normalizes the map at `src` and writes it to `dst`.
#[instrument(skip_all, name = "normalize_workflow", fields(map = %src.display()))]
pub fn run(src: &Path, dst: &Path) -> Result<NormalizationOutcome, EngineError> {
    let volume = load_volume(src)?;
    let outcome = normalize_map(&volume);

    if let Some(parent) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
    }
    MrcFile::write_to_path(&outcome.volume, dst).map_err(|source| EngineError::MapWrite {
        path: dst.to_string_lossy().to_string(),
        source,
    })?;

    match outcome.percentile {
        Some(p) => info!(percentile = p, output = %dst.display(), "Map normalized"),
        None => info!(output = %dst.display(), "Map clipped without scaling"),
    }
    Ok(outcome)
}
