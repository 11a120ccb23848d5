use super::config::TrainingConfig;
use crate::core::density::patch::{
    center_crop, extract_patch, mask_outside, pad_to_same_box, positive_voxels, zscore,
};
use crate::core::density::resample::{ResampleError, Resampler};
use crate::core::io::manifest::ManifestEntry;
use crate::core::taxonomy::motif::MotifLabel;
use ndarray::Array3;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("Failed to prepare density map '{path}': {source}")]
    Density { path: String, source: ResampleError },
    #[error("Failed to prepare label map '{path}': {source}")]
    Label { path: String, source: ResampleError },
    #[error("Failed to create scratch directory '{path}': {source}")]
    Scratch {
        path: String,
        source: std::io::Error,
    },
}

/// One network-ready training example.
#[derive(Debug, Clone)]
pub struct Sample {
    pub patch: Array3<f32>,
    pub label: MotifLabel,
    pub source: PathBuf,
    /// Whether the patch was centred on the motif's label volume.
    pub guided: bool,
}

/// Scratch file for one example of one epoch; unique across parallel builds.
pub fn scratch_path(scratch_dir: &Path, source: &Path, epoch: usize, index: usize, kind: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "map".to_string());
    scratch_dir.join(format!("{}_e{}_i{}_{}.mrc", stem, epoch, index, kind))
}

fn example_rng(seed: u64, epoch: usize, index: usize) -> StdRng {
    StdRng::seed_from_u64(seed ^ ((epoch as u64) << 32) ^ index as u64)
}

fn discard(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        debug!(path = %path.display(), error = %e, "Could not remove scratch file");
    }
}

/// Resamples one manifest entry and cuts its patch.
///
/// In guided mode a known motif with a label volume is sampled around a
/// random labelled voxel with density outside the label masked away; every
/// other example is a centre crop of the z-scored map. The returned patch is
/// always z-scored.
pub fn build_sample(
    entry: &ManifestEntry,
    epoch: usize,
    index: usize,
    config: &TrainingConfig,
    resampler: &dyn Resampler,
) -> Result<Sample, SampleError> {
    std::fs::create_dir_all(&config.scratch_dir).map_err(|source| SampleError::Scratch {
        path: config.scratch_dir.to_string_lossy().to_string(),
        source,
    })?;
    let size = config.classifier.patch_size;

    let density_scratch = scratch_path(&config.scratch_dir, &entry.path, epoch, index, "density");
    let density = resampler.resample(0.0, &entry.path, &density_scratch, config.target_voxel);
    discard(&density_scratch);
    let density = density.map_err(|source| SampleError::Density {
        path: entry.path.to_string_lossy().to_string(),
        source,
    })?;

    let label_path = config.label_paths.label_path_for(&entry.path);
    if config.guided && entry.label != MotifLabel::Unknown && label_path.is_file() {
        let label_scratch = scratch_path(&config.scratch_dir, &entry.path, epoch, index, "label");
        let label = resampler.resample(0.0, &label_path, &label_scratch, config.target_voxel);
        discard(&label_scratch);
        let label = label.map_err(|source| SampleError::Label {
            path: label_path.to_string_lossy().to_string(),
            source,
        })?;

        let (density_box, label_box) = pad_to_same_box(density.data(), label.data());
        let candidates = positive_voxels(&label_box);
        let mut rng = example_rng(config.seed, epoch, index);
        if let Some(&center) = candidates.choose(&mut rng) {
            let masked = mask_outside(&density_box, &label_box);
            return Ok(Sample {
                patch: zscore(&extract_patch(&masked, center, size)),
                label: entry.label,
                source: entry.path.clone(),
                guided: true,
            });
        }
        debug!(path = %label_path.display(), "Label volume is empty; using a centre crop");
    }

    Ok(Sample {
        patch: center_crop(&zscore(density.data()), size),
        label: entry.label,
        source: entry.path.clone(),
        guided: false,
    })
}
