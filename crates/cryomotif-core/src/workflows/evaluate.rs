use super::classify::classify_map;
use crate::core::density::resample::Resampler;
use crate::core::taxonomy::motif::MotifLabel;
use crate::engine::checkpoint::Classifier;
use crate::engine::config::{EvaluationConfig, GroundTruth};
use crate::engine::error::EngineError;
use crate::engine::metrics::ConfusionMatrix;
use crate::engine::progress::{Progress, ProgressReporter};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationFailure {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub matrix: ConfusionMatrix,
    pub evaluated: usize,
    pub failures: Vec<EvaluationFailure>,
    /// Classes whose folder was missing or held no maps.
    pub skipped_classes: Vec<MotifLabel>,
}

fn is_map(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("mrc"))
}

/// Up to `limit` maps from `folder`, chosen by a seeded shuffle.
fn sample_folder(folder: &Path, limit: usize, seed: u64) -> Result<Vec<PathBuf>, EngineError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(folder)
        .map_err(|e| EngineError::io(folder, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_map(path))
        .collect();
    files.sort();
    files.shuffle(&mut StdRng::seed_from_u64(seed));
    files.truncate(limit);
    Ok(files)
}

/// Classifies maps sorted into one folder per motif class and tallies a
/// confusion matrix.
///
/// Missing or empty class folders and per-file failures are reported and
/// skipped. Finding no maps at all is an error.
#[instrument(skip_all, name = "evaluation_workflow", fields(root = %config.root.display()))]
pub fn run(
    config: &EvaluationConfig,
    resampler: &dyn Resampler,
    reporter: &ProgressReporter,
) -> Result<EvaluationReport, EngineError> {
    let inference = &config.inference;
    let classifier = Classifier::load(&inference.checkpoint, &inference.classifier)?;
    let num_classes = inference.classifier.num_classes;

    reporter.report(Progress::PhaseStart {
        name: "Collecting Maps",
    });
    let mut selected = Vec::new();
    let mut skipped_classes = Vec::new();
    for &label in MotifLabel::ALL.iter().take(num_classes) {
        let folder = config.root.join(label.name());
        if !folder.is_dir() {
            warn!(folder = %folder.display(), "Class folder not found; skipping");
            skipped_classes.push(label);
            continue;
        }
        let files = sample_folder(&folder, config.max_per_class, config.seed.wrapping_add(label.index() as u64))?;
        if files.is_empty() {
            warn!(folder = %folder.display(), "Class folder holds no .mrc files; skipping");
            skipped_classes.push(label);
            continue;
        }
        info!(class = %label, count = files.len(), "Maps selected");
        selected.extend(files.into_iter().map(|path| (label, path)));
    }
    reporter.report(Progress::PhaseFinish);

    if selected.is_empty() {
        return Err(EngineError::NoInputs(format!(
            "no .mrc files under any class folder of '{}'",
            config.root.display()
        )));
    }

    reporter.report(Progress::PhaseStart { name: "Evaluating" });
    reporter.report(Progress::TaskStart {
        total_steps: selected.len() as u64,
    });
    let mut matrix = ConfusionMatrix::new(num_classes);
    let mut failures = Vec::new();
    let mut evaluated = 0;

    for (folder_label, path) in selected {
        let truth = match config.ground_truth {
            GroundTruth::Folder => Some(folder_label),
            GroundTruth::Filename => MotifLabel::from_filename(&path),
        };
        let outcome = match truth {
            None => Err("file name carries no motif token".to_string()),
            Some(truth) => classify_map(&path, &classifier, resampler, inference)
                .map_err(|e| e.to_string())
                .and_then(|prediction| {
                    if matrix.record(truth, prediction.label) {
                        Ok(())
                    } else {
                        Err(format!("class '{}' is outside the classifier's range", truth))
                    }
                }),
        };
        match outcome {
            Ok(()) => evaluated += 1,
            Err(reason) => {
                warn!(path = %path.display(), error = %reason, "Evaluation failed for file");
                failures.push(EvaluationFailure { path, reason });
            }
        }
        reporter.report(Progress::TaskIncrement);
    }
    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    info!(
        evaluated,
        failed = failures.len(),
        accuracy = matrix.accuracy(),
        "Evaluation complete"
    );
    Ok(EvaluationReport {
        matrix,
        evaluated,
        failures,
        skipped_classes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::density::resample::TrilinearResampler;
    use crate::core::io::mrc::MrcFile;
    use crate::core::io::traits::VolumeFile;
    use crate::core::models::volume::DensityVolume;
    use crate::engine::checkpoint::{CheckpointMeta, save_checkpoint};
    use crate::engine::config::{ClassifierConfig, EvaluationConfigBuilder, InferenceConfigBuilder};
    use crate::engine::network::InferenceBackend;
    use ndarray::Array3;
    use tempfile::tempdir;

    fn classifier() -> ClassifierConfig {
        ClassifierConfig {
            num_classes: 5,
            channels: [2, 2, 2],
            hidden: 4,
            patch_size: 8,
        }
    }

    fn config(root: &Path, truth: GroundTruth, max_per_class: usize) -> EvaluationConfig {
        let model = classifier().init::<InferenceBackend>(&Default::default());
        let checkpoint = save_checkpoint(
            &model,
            &CheckpointMeta::new(&classifier(), 1.0, None),
            &root.join("ckpt").join("model"),
        )
        .unwrap();
        let inference = InferenceConfigBuilder::new()
            .checkpoint(checkpoint)
            .scratch_dir(root.join("scratch"))
            .classifier(classifier())
            .build()
            .unwrap();
        EvaluationConfigBuilder::new()
            .root(root.join("eval"))
            .max_per_class(max_per_class)
            .ground_truth(truth)
            .inference(inference)
            .build()
            .unwrap()
    }

    fn write_map(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let volume = DensityVolume::isotropic(Array3::from_elem((8, 8, 8), 1.0), 1.0).unwrap();
        MrcFile::write_to_path(&volume, path).unwrap();
    }

    #[test]
    fn evaluates_class_folders_and_counts_failures() {
        let dir = tempdir().unwrap();
        let eval = dir.path().join("eval");
        write_map(&eval.join("hairpin").join("a.mrc"));
        write_map(&eval.join("hairpin").join("b.MRC"));
        write_map(&eval.join("bulge").join("c.mrc"));
        std::fs::write(eval.join("bulge").join("corrupt.mrc"), b"not a map").unwrap();
        std::fs::write(eval.join("bulge").join("notes.txt"), b"ignored").unwrap();
        std::fs::create_dir_all(eval.join("unknown")).unwrap();

        let report = run(
            &config(dir.path(), GroundTruth::Folder, 90),
            &TrilinearResampler::new(),
            &ProgressReporter::new(),
        )
        .unwrap();

        assert_eq!(report.evaluated, 3);
        assert_eq!(report.matrix.total(), 3);
        assert_eq!(report.matrix.rows()[MotifLabel::Hairpin.index()].iter().sum::<usize>(), 2);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].path.ends_with("corrupt.mrc"));
        assert_eq!(
            report.skipped_classes,
            vec![MotifLabel::SymmetricLoop, MotifLabel::AsymmetricLoop, MotifLabel::Unknown]
        );
    }

    #[test]
    fn per_class_cap_is_applied() {
        let dir = tempdir().unwrap();
        for i in 0..5 {
            write_map(&dir.path().join("eval").join("bulge").join(format!("m{}.mrc", i)));
        }
        let report = run(
            &config(dir.path(), GroundTruth::Folder, 2),
            &TrilinearResampler::new(),
            &ProgressReporter::new(),
        )
        .unwrap();
        assert_eq!(report.evaluated, 2);
    }

    #[test]
    fn filename_truth_uses_motif_token() {
        let dir = tempdir().unwrap();
        let eval = dir.path().join("eval").join("hairpin");
        write_map(&eval.join("1abc_A_bulge2_x.mrc"));
        write_map(&eval.join("short.mrc"));

        let report = run(
            &config(dir.path(), GroundTruth::Filename, 90),
            &TrilinearResampler::new(),
            &ProgressReporter::new(),
        )
        .unwrap();
        assert_eq!(report.evaluated, 1);
        assert_eq!(report.matrix.rows()[MotifLabel::Bulge.index()].iter().sum::<usize>(), 1);
        assert_eq!(report.failures.len(), 1);
    }

    #[test]
    fn empty_root_is_an_error() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("eval")).unwrap();
        let err = run(
            &config(dir.path(), GroundTruth::Folder, 90),
            &TrilinearResampler::new(),
            &ProgressReporter::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::NoInputs(_)));
    }
}
