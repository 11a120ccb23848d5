use super::config::ClassifierConfig;
use super::network::{InferenceBackend, MotifClassifier, NetworkError, Prediction};
use crate::core::taxonomy::motif::MotifLabel;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use ndarray::Array3;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

const WEIGHTS_EXTENSION: &str = "mpk";
const META_EXTENSION: &str = "meta.toml";

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Failed to access checkpoint metadata '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid checkpoint metadata in '{path}': {source}")]
    MetaParse {
        path: String,
        source: toml::de::Error,
    },
    #[error("Failed to serialize checkpoint metadata: {0}")]
    MetaWrite(#[from] toml::ser::Error),
    #[error("Failed to record weights at '{path}': {message}")]
    Record { path: String, message: String },
    #[error("Checkpoint architecture mismatch: expected {expected}, found {found}")]
    ArchitectureMismatch { expected: String, found: String },
}

/// Sidecar stored next to the weights as `<stem>.meta.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CheckpointMeta {
    pub architecture: ClassifierConfig,
    pub class_names: Vec<String>,
    pub voxel_size: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch: Option<usize>,
}

impl CheckpointMeta {
    pub fn new(architecture: &ClassifierConfig, voxel_size: f64, epoch: Option<usize>) -> Self {
        Self {
            architecture: architecture.clone(),
            class_names: MotifLabel::ALL
                .iter()
                .take(architecture.num_classes)
                .map(|label| label.name().to_string())
                .collect(),
            voxel_size,
            epoch,
        }
    }
}

type Recorder = NamedMpkFileRecorder<FullPrecisionSettings>;

fn recorder() -> Recorder {
    NamedMpkFileRecorder::<FullPrecisionSettings>::new()
}

/// Accepts either the bare checkpoint stem or the weights file itself.
pub fn checkpoint_stem(path: &Path) -> PathBuf {
    match path.extension() {
        Some(ext) if ext == WEIGHTS_EXTENSION => path.with_extension(""),
        _ => path.to_path_buf(),
    }
}

pub fn weights_path(stem: &Path) -> PathBuf {
    stem.with_extension(WEIGHTS_EXTENSION)
}

pub fn meta_path(stem: &Path) -> PathBuf {
    stem.with_extension(META_EXTENSION)
}

fn describe(config: &ClassifierConfig) -> String {
    format!(
        "{} classes, channels {:?}, hidden {}, patch {}",
        config.num_classes, config.channels, config.hidden, config.patch_size
    )
}

/// Writes `<stem>.mpk` and `<stem>.meta.toml`.
pub fn save_checkpoint<B: Backend>(
    model: &MotifClassifier<B>,
    meta: &CheckpointMeta,
    stem: &Path,
) -> Result<PathBuf, CheckpointError> {
    if let Some(parent) = stem.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| CheckpointError::Io {
            path: parent.to_string_lossy().to_string(),
            source,
        })?;
    }

    let weights = weights_path(stem);
    model
        .clone()
        .save_file(stem.to_path_buf(), &recorder())
        .map_err(|e| CheckpointError::Record {
            path: weights.to_string_lossy().to_string(),
            message: format!("{:?}", e),
        })?;

    let meta_file = meta_path(stem);
    let text = toml::to_string_pretty(meta)?;
    std::fs::write(&meta_file, text).map_err(|source| CheckpointError::Io {
        path: meta_file.to_string_lossy().to_string(),
        source,
    })?;
    debug!(path = %weights.display(), "Checkpoint written");
    Ok(weights)
}

pub fn read_meta(stem: &Path) -> Result<CheckpointMeta, CheckpointError> {
    let path = meta_path(stem);
    let text = std::fs::read_to_string(&path).map_err(|source| CheckpointError::Io {
        path: path.to_string_lossy().to_string(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| CheckpointError::MetaParse {
        path: path.to_string_lossy().to_string(),
        source,
    })
}

/// Loads weights into a network built from `expected`.
///
/// The sidecar, when present, must describe the same architecture; the
/// loaded convolution and dense layers are checked either way.
pub fn load_checkpoint<B: Backend>(
    path: &Path,
    expected: &ClassifierConfig,
    device: &B::Device,
) -> Result<MotifClassifier<B>, CheckpointError> {
    let stem = checkpoint_stem(path);

    match read_meta(&stem) {
        Ok(meta) if meta.architecture != *expected => {
            return Err(CheckpointError::ArchitectureMismatch {
                expected: describe(expected),
                found: describe(&meta.architecture),
            });
        }
        Ok(_) => {}
        Err(CheckpointError::Io { path, .. }) => {
            warn!(path = %path, "No checkpoint metadata found; checking layer shapes only");
        }
        Err(e) => return Err(e),
    }

    let weights = weights_path(&stem);
    let model = expected
        .init::<B>(device)
        .load_file(stem.clone(), &recorder(), device)
        .map_err(|e| CheckpointError::Record {
            path: weights.to_string_lossy().to_string(),
            message: format!("{:?}", e),
        })?;

    let [c1, c2, c3] = expected.channels;
    let found = LayerShapes {
        conv: model.conv_channels(),
        features: model.input_features(),
        classes: model.output_classes(),
    };
    let wanted = LayerShapes {
        conv: [[1, c1], [c1, c2], [c2, c3]],
        features: expected.flattened_features(),
        classes: expected.num_classes,
    };
    if found != wanted {
        return Err(CheckpointError::ArchitectureMismatch {
            expected: wanted.to_string(),
            found: found.to_string(),
        });
    }
    Ok(model)
}

#[derive(Debug, PartialEq, Eq)]
struct LayerShapes {
    conv: [[usize; 2]; 3],
    features: usize,
    classes: usize,
}

impl std::fmt::Display for LayerShapes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let channels: Vec<String> = self.conv.iter().map(|[i, o]| format!("{}->{}", i, o)).collect();
        write!(
            f,
            "conv channels {}, {} classes from {} features",
            channels.join(", "),
            self.classes,
            self.features
        )
    }
}

/// A trained network ready for inference on the CPU backend.
#[derive(Debug)]
pub struct Classifier {
    model: MotifClassifier<InferenceBackend>,
    config: ClassifierConfig,
    device: <InferenceBackend as Backend>::Device,
}

impl Classifier {
    pub fn new(model: MotifClassifier<InferenceBackend>, config: ClassifierConfig) -> Self {
        Self {
            model,
            config,
            device: Default::default(),
        }
    }

    pub fn load(checkpoint: &Path, config: &ClassifierConfig) -> Result<Self, CheckpointError> {
        let device = Default::default();
        let model = load_checkpoint::<InferenceBackend>(checkpoint, config, &device)?;
        Ok(Self {
            model,
            config: config.clone(),
            device,
        })
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn patch_size(&self) -> usize {
        self.config.patch_size
    }

    pub fn predict(&self, patch: &Array3<f32>) -> Result<Prediction, NetworkError> {
        self.model.predict(patch, &self.device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn small_config(num_classes: usize) -> ClassifierConfig {
        ClassifierConfig {
            num_classes,
            channels: [2, 2, 2],
            hidden: 4,
            patch_size: 8,
        }
    }

    #[test]
    fn stem_accepts_weights_file_or_bare_stem() {
        assert_eq!(checkpoint_stem(Path::new("out/m_epoch3.mpk")), PathBuf::from("out/m_epoch3"));
        assert_eq!(checkpoint_stem(Path::new("out/m_epoch3")), PathBuf::from("out/m_epoch3"));
        assert_eq!(meta_path(Path::new("out/m_epoch3")), PathBuf::from("out/m_epoch3.meta.toml"));
    }

    #[test]
    fn saved_checkpoint_reloads_with_identical_predictions() {
        let dir = tempdir().unwrap();
        let config = small_config(5);
        let device = Default::default();
        let model = config.init::<InferenceBackend>(&device);
        let stem = dir.path().join("ckpt").join("m_epoch1");

        let meta = CheckpointMeta::new(&config, 1.0, Some(1));
        let weights = save_checkpoint(&model, &meta, &stem).unwrap();
        assert!(weights.exists());
        assert_eq!(read_meta(&stem).unwrap(), meta);
        assert_eq!(meta.class_names.len(), 5);

        let classifier = Classifier::load(&weights, &config).unwrap();
        let patch = Array3::from_shape_fn((8, 8, 8), |(z, y, x)| (z * y + x) as f32 / 10.0);
        let expected = model.predict(&patch, &device).unwrap();
        let actual = classifier.predict(&patch).unwrap();
        assert_eq!(expected.label, actual.label);
        for (a, b) in expected.probabilities.iter().zip(&actual.probabilities) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn class_count_mismatch_is_fatal() {
        let dir = tempdir().unwrap();
        let trained = small_config(3);
        let device = Default::default();
        let model = trained.init::<InferenceBackend>(&device);
        let stem = dir.path().join("three_class");
        save_checkpoint(&model, &CheckpointMeta::new(&trained, 1.0, None), &stem).unwrap();

        let err = Classifier::load(&stem, &small_config(5)).unwrap_err();
        assert!(matches!(err, CheckpointError::ArchitectureMismatch { .. }));
    }

    #[test]
    fn mismatch_is_detected_without_sidecar() {
        let dir = tempdir().unwrap();
        let trained = small_config(3);
        let device = Default::default();
        let model = trained.init::<InferenceBackend>(&device);
        let stem = dir.path().join("bare");
        save_checkpoint(&model, &CheckpointMeta::new(&trained, 1.0, None), &stem).unwrap();
        std::fs::remove_file(meta_path(&stem)).unwrap();

        let err = load_checkpoint::<InferenceBackend>(&stem, &small_config(5), &device).unwrap_err();
        assert!(matches!(err, CheckpointError::ArchitectureMismatch { .. }));
    }

    #[test]
    fn channel_mismatch_is_detected_without_sidecar() {
        let dir = tempdir().unwrap();
        let trained = small_config(5);
        let device = Default::default();
        let model = trained.init::<InferenceBackend>(&device);
        let stem = dir.path().join("narrow");
        save_checkpoint(&model, &CheckpointMeta::new(&trained, 1.0, None), &stem).unwrap();
        std::fs::remove_file(meta_path(&stem)).unwrap();

        // Same final width, so the dense layers alone cannot tell them apart.
        let wider = ClassifierConfig {
            channels: [4, 3, 2],
            ..small_config(5)
        };
        let err = load_checkpoint::<InferenceBackend>(&stem, &wider, &device).unwrap_err();
        match err {
            CheckpointError::ArchitectureMismatch { expected, found } => {
                assert!(expected.contains("1->4"));
                assert!(found.contains("1->2"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(load_checkpoint::<InferenceBackend>(&stem, &trained, &device).is_ok());
    }

    #[test]
    fn missing_weights_are_a_record_error() {
        let dir = tempdir().unwrap();
        let err = Classifier::load(&dir.path().join("absent"), &small_config(5)).unwrap_err();
        assert!(matches!(err, CheckpointError::Record { .. }));
    }
}
