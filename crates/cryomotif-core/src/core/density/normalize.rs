use crate::core::io::mrc::{MrcError, MrcFile};
use crate::core::io::traits::VolumeFile;
use crate::core::models::volume::DensityVolume;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Percentile of the nonzero voxels that is mapped to 1.0.
pub const NORMALIZATION_PERCENTILE: f64 = 95.0;

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationOutcome {
    pub volume: DensityVolume,
    /// The divisor that was applied, or `None` when division was skipped.
    pub percentile: Option<f64>,
}

/// Linear-interpolation percentile (`rank = p/100 * (n - 1)`).
///
/// Sorts `values` in place. Returns `None` for an empty slice.
pub fn percentile(values: &mut [f32], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable_by(|a, b| a.total_cmp(b));
    let rank = (p / 100.0).clamp(0.0, 1.0) * (values.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let lower = values[lo] as f64;
    let upper = values[hi] as f64;
    Some(lower + (upper - lower) * (rank - lo as f64))
}

/// Scales a map so its 95th percentile of nonzero density becomes 1.0, then clips to `[0, 1]`.
///
/// A map without nonzero voxels, or whose percentile is not strictly
/// positive, is only clipped. Voxel size, origin and start are preserved.
pub fn normalize_map(volume: &DensityVolume) -> NormalizationOutcome {
    let mut nonzero: Vec<f32> = volume
        .data()
        .iter()
        .copied()
        .filter(|v| *v != 0.0 && !v.is_nan())
        .collect();

    let divisor = match percentile(&mut nonzero, NORMALIZATION_PERCENTILE) {
        None => {
            warn!("Map has no nonzero voxels; skipping percentile scaling");
            None
        }
        Some(p) if p <= 0.0 => {
            warn!(
                percentile = p,
                "Percentile of nonzero voxels is not positive; skipping percentile scaling"
            );
            None
        }
        Some(p) => Some(p),
    };

    let normalized = match divisor {
        Some(p) => volume.mapv(|v| ((v as f64) / p).clamp(0.0, 1.0) as f32),
        None => volume.mapv(|v| v.clamp(0.0, 1.0)),
    };

    NormalizationOutcome {
        volume: normalized,
        percentile: divisor,
    }
}

/// `<dir>/<stem>_normalized.mrc` next to the source map.
pub fn normalized_output_path(src: &Path) -> PathBuf {
    let stem = src
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "map".to_string());
    src.with_file_name(format!("{}_normalized.mrc", stem))
}

/// Reads `src`, normalizes it and writes the result to `dst`.
pub fn normalize_map_file(src: &Path, dst: &Path) -> Result<NormalizationOutcome, MrcError> {
    let volume = MrcFile::read_from_path(src)?;
    let outcome = normalize_map(&volume);
    MrcFile::write_to_path(&outcome.volume, dst)?;
    Ok(outcome)
}
