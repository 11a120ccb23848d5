use crate::core::density::patch::{center_crop, zscore};
use crate::core::density::resample::Resampler;
use crate::engine::checkpoint::Classifier;
use crate::engine::config::InferenceConfig;
use crate::engine::error::EngineError;
use crate::engine::network::Prediction;
use crate::engine::progress::{Progress, ProgressReporter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, instrument};

static SCRATCH_COUNTER: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub path: PathBuf,
    pub prediction: Prediction,
}

fn scratch_file(scratch_dir: &Path, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "map".to_string());
    let n = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
    scratch_dir.join(format!("{}_{}_{}_resampled.mrc", stem, std::process::id(), n))
}

/// Resamples one map to the canonical spacing, z-scores it and classifies
/// its centre patch.
pub fn classify_map(
    path: &Path,
    classifier: &Classifier,
    resampler: &dyn Resampler,
    config: &InferenceConfig,
) -> Result<Prediction, EngineError> {
    std::fs::create_dir_all(&config.scratch_dir).map_err(|e| EngineError::io(&config.scratch_dir, e))?;
    let scratch = scratch_file(&config.scratch_dir, path);
    let resampled = resampler.resample(0.0, path, &scratch, config.target_voxel);
    if let Err(e) = std::fs::remove_file(&scratch) {
        debug!(path = %scratch.display(), error = %e, "Could not remove scratch file");
    }

    let volume = resampled?;
    let patch = center_crop(&zscore(volume.data()), classifier.patch_size());
    Ok(classifier.predict(&patch)?)
}

/// Loads the checkpoint once and classifies every map; the first failure aborts.
#[instrument(skip_all, name = "classify_workflow", fields(maps = paths.len()))]
pub fn run(
    paths: &[PathBuf],
    config: &InferenceConfig,
    resampler: &dyn Resampler,
    reporter: &ProgressReporter,
) -> Result<Vec<Classification>, EngineError> {
    if paths.is_empty() {
        return Err(EngineError::NoInputs("no maps given to classify".to_string()));
    }
    let classifier = Classifier::load(&config.checkpoint, &config.classifier)?;

    reporter.report(Progress::PhaseStart { name: "Classifying" });
    reporter.report(Progress::TaskStart {
        total_steps: paths.len() as u64,
    });
    let mut results = Vec::with_capacity(paths.len());
    for path in paths {
        let prediction = classify_map(path, &classifier, resampler, config)?;
        info!(
            map = %path.display(),
            label = %prediction.label,
            confidence = prediction.confidence(),
            "Map classified"
        );
        results.push(Classification {
            path: path.clone(),
            prediction,
        });
        reporter.report(Progress::TaskIncrement);
    }
    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::density::resample::TrilinearResampler;
    use crate::core::io::mrc::MrcFile;
    use crate::core::io::traits::VolumeFile;
    use crate::core::models::volume::DensityVolume;
    use crate::engine::checkpoint::{CheckpointMeta, save_checkpoint};
    use crate::engine::config::{ClassifierConfig, InferenceConfigBuilder};
    use crate::engine::network::InferenceBackend;
    use ndarray::Array3;
    use tempfile::tempdir;

    fn tiny_classifier(num_classes: usize) -> ClassifierConfig {
        ClassifierConfig {
            num_classes,
            channels: [2, 2, 2],
            hidden: 4,
            patch_size: 8,
        }
    }

    fn saved_checkpoint(dir: &Path, num_classes: usize) -> PathBuf {
        let config = tiny_classifier(num_classes);
        let model = config.init::<InferenceBackend>(&Default::default());
        save_checkpoint(&model, &CheckpointMeta::new(&config, 1.0, None), &dir.join("ckpt")).unwrap()
    }

    #[test]
    fn classifies_maps_of_any_spacing() {
        let dir = tempdir().unwrap();
        let checkpoint = saved_checkpoint(dir.path(), 5);
        let map = dir.path().join("coarse.mrc");
        let volume = DensityVolume::isotropic(Array3::from_shape_fn((6, 6, 6), |(z, _, _)| z as f32), 2.0).unwrap();
        MrcFile::write_to_path(&volume, &map).unwrap();

        let config = InferenceConfigBuilder::new()
            .checkpoint(checkpoint)
            .scratch_dir(dir.path().join("scratch"))
            .classifier(tiny_classifier(5))
            .build()
            .unwrap();
        let results = run(&[map.clone()], &config, &TrilinearResampler::new(), &ProgressReporter::new()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, map);
        let total: f32 = results[0].prediction.probabilities.iter().sum();
        assert!((total - 1.0).abs() < 1e-4);
        assert_eq!(std::fs::read_dir(dir.path().join("scratch")).unwrap().count(), 0);
    }

    #[test]
    fn architecture_mismatch_fails_before_inference() {
        let dir = tempdir().unwrap();
        let checkpoint = saved_checkpoint(dir.path(), 3);
        let config = InferenceConfigBuilder::new()
            .checkpoint(checkpoint)
            .classifier(tiny_classifier(5))
            .build()
            .unwrap();
        let err = run(
            &[dir.path().join("never_read.mrc")],
            &config,
            &TrilinearResampler::new(),
            &ProgressReporter::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Checkpoint(_)));
    }

    #[test]
    fn unreadable_map_is_fatal() {
        let dir = tempdir().unwrap();
        let config = InferenceConfigBuilder::new()
            .checkpoint(saved_checkpoint(dir.path(), 5))
            .scratch_dir(dir.path().join("scratch"))
            .classifier(tiny_classifier(5))
            .build()
            .unwrap();
        let err = run(
            &[dir.path().join("absent.mrc")],
            &config,
            &TrilinearResampler::new(),
            &ProgressReporter::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Resample(_)));
    }
}
