use crate::core::density::patch::PATCH_SIZE;
use crate::core::density::resample::DEFAULT_TARGET_VOXEL;
use crate::core::taxonomy::motif::MotifLabel;
use crate::core::taxonomy::structural::StructuralClass;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_EPOCHS: usize = 29;
pub const DEFAULT_BATCH_SIZE: usize = 4;
pub const DEFAULT_LEARNING_RATE: f64 = 1e-3;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_MAX_PER_CLASS: usize = 90;
pub const DEFAULT_CHECKPOINT_PREFIX: &str = "label_less_classifier";

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for {parameter}: {reason}")]
    Invalid {
        parameter: &'static str,
        reason: String,
    },
}

fn invalid(parameter: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        parameter,
        reason: reason.into(),
    }
}

fn positive_f64(parameter: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(invalid(parameter, format!("must be a positive number (got {})", value)))
    }
}

fn positive_usize(parameter: &'static str, value: usize) -> Result<usize, ConfigError> {
    if value > 0 {
        Ok(value)
    } else {
        Err(invalid(parameter, "must be at least 1"))
    }
}

/// Architecture of the motif classifier.
///
/// Recorded next to every checkpoint so that weights are never loaded into
/// a differently shaped network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ClassifierConfig {
    pub num_classes: usize,
    pub channels: [usize; 3],
    pub hidden: usize,
    pub patch_size: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            num_classes: MotifLabel::COUNT,
            channels: [16, 32, 64],
            hidden: 128,
            patch_size: PATCH_SIZE,
        }
    }
}

impl ClassifierConfig {
    /// Edge length of the feature volume after the three pooling stages.
    pub fn pooled_size(&self) -> usize {
        self.patch_size / 8
    }

    pub fn flattened_features(&self) -> usize {
        self.channels[2] * self.pooled_size().pow(3)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive_usize("num_classes", self.num_classes)?;
        positive_usize("hidden", self.hidden)?;
        if self.channels.contains(&0) {
            return Err(invalid("channels", "every stage needs at least one channel"));
        }
        if self.patch_size < 8 || self.patch_size % 8 != 0 {
            return Err(invalid(
                "patch_size",
                format!("must be a positive multiple of 8 (got {})", self.patch_size),
            ));
        }
        if self.num_classes > MotifLabel::COUNT {
            return Err(invalid(
                "num_classes",
                format!("at most {} motif classes are defined", MotifLabel::COUNT),
            ));
        }
        Ok(())
    }
}

/// How a label volume is located from a density map path.
///
/// The density path's `density_dir` component is replaced by `label_dir`,
/// the extension is dropped, and `file_name` is appended:
/// `data/densityMap/x.mrc` → `data/labelMap/x/backbone_label.mrc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelPathRule {
    pub density_dir: String,
    pub label_dir: String,
    pub file_name: String,
}

impl Default for LabelPathRule {
    fn default() -> Self {
        Self {
            density_dir: "densityMap".to_string(),
            label_dir: "labelMap".to_string(),
            file_name: "backbone_label.mrc".to_string(),
        }
    }
}

impl LabelPathRule {
    pub fn label_path_for(&self, density: &Path) -> PathBuf {
        let mut out = PathBuf::new();
        let components: Vec<_> = density.components().collect();
        let last = components.len().saturating_sub(1);
        for (i, component) in components.iter().enumerate() {
            let part = component.as_os_str();
            if i == last {
                let stem = density.file_stem().unwrap_or(part);
                out.push(stem);
            } else if part == self.density_dir.as_str() {
                out.push(&self.label_dir);
            } else {
                out.push(part);
            }
        }
        out.join(&self.file_name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    pub train_manifest: PathBuf,
    pub val_manifest: PathBuf,
    pub output_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub checkpoint_prefix: String,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub seed: u64,
    pub target_voxel: f64,
    pub guided: bool,
    pub label_paths: LabelPathRule,
    pub prefetch_batches: usize,
    pub classifier: ClassifierConfig,
}

#[derive(Default)]
pub struct TrainingConfigBuilder {
    train_manifest: Option<PathBuf>,
    val_manifest: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    scratch_dir: Option<PathBuf>,
    checkpoint_prefix: Option<String>,
    epochs: Option<usize>,
    batch_size: Option<usize>,
    learning_rate: Option<f64>,
    seed: Option<u64>,
    target_voxel: Option<f64>,
    guided: Option<bool>,
    label_paths: Option<LabelPathRule>,
    prefetch_batches: Option<usize>,
    classifier: Option<ClassifierConfig>,
}

impl TrainingConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn train_manifest(mut self, path: PathBuf) -> Self {
        self.train_manifest = Some(path);
        self
    }
    pub fn val_manifest(mut self, path: PathBuf) -> Self {
        self.val_manifest = Some(path);
        self
    }
    pub fn output_dir(mut self, path: PathBuf) -> Self {
        self.output_dir = Some(path);
        self
    }
    pub fn scratch_dir(mut self, path: PathBuf) -> Self {
        self.scratch_dir = Some(path);
        self
    }
    pub fn checkpoint_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.checkpoint_prefix = Some(prefix.into());
        self
    }
    pub fn epochs(mut self, epochs: usize) -> Self {
        self.epochs = Some(epochs);
        self
    }
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }
    pub fn learning_rate(mut self, rate: f64) -> Self {
        self.learning_rate = Some(rate);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn target_voxel(mut self, size: f64) -> Self {
        self.target_voxel = Some(size);
        self
    }
    pub fn guided(mut self, guided: bool) -> Self {
        self.guided = Some(guided);
        self
    }
    pub fn label_paths(mut self, rule: LabelPathRule) -> Self {
        self.label_paths = Some(rule);
        self
    }
    pub fn prefetch_batches(mut self, n: usize) -> Self {
        self.prefetch_batches = Some(n);
        self
    }
    pub fn classifier(mut self, config: ClassifierConfig) -> Self {
        self.classifier = Some(config);
        self
    }

    pub fn build(self) -> Result<TrainingConfig, ConfigError> {
        let output_dir = self
            .output_dir
            .ok_or(ConfigError::MissingParameter("output_dir"))?;
        let classifier = self.classifier.unwrap_or_default();
        classifier.validate()?;

        let checkpoint_prefix = self
            .checkpoint_prefix
            .unwrap_or_else(|| DEFAULT_CHECKPOINT_PREFIX.to_string());
        if checkpoint_prefix.trim().is_empty() {
            return Err(invalid("checkpoint_prefix", "must not be empty"));
        }

        Ok(TrainingConfig {
            train_manifest: self
                .train_manifest
                .ok_or(ConfigError::MissingParameter("train_manifest"))?,
            val_manifest: self
                .val_manifest
                .ok_or(ConfigError::MissingParameter("val_manifest"))?,
            scratch_dir: self
                .scratch_dir
                .unwrap_or_else(|| output_dir.join("scratch")),
            output_dir,
            checkpoint_prefix,
            epochs: positive_usize("epochs", self.epochs.unwrap_or(DEFAULT_EPOCHS))?,
            batch_size: positive_usize(
                "batch_size",
                self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            )?,
            learning_rate: positive_f64(
                "learning_rate",
                self.learning_rate.unwrap_or(DEFAULT_LEARNING_RATE),
            )?,
            seed: self.seed.unwrap_or(DEFAULT_SEED),
            target_voxel: positive_f64(
                "target_voxel",
                self.target_voxel.unwrap_or(DEFAULT_TARGET_VOXEL),
            )?,
            guided: self.guided.unwrap_or(false),
            label_paths: self.label_paths.unwrap_or_default(),
            prefetch_batches: positive_usize(
                "prefetch_batches",
                self.prefetch_batches.unwrap_or(2),
            )?,
            classifier,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InferenceConfig {
    pub checkpoint: PathBuf,
    pub target_voxel: f64,
    pub scratch_dir: PathBuf,
    pub classifier: ClassifierConfig,
}

#[derive(Default)]
pub struct InferenceConfigBuilder {
    checkpoint: Option<PathBuf>,
    target_voxel: Option<f64>,
    scratch_dir: Option<PathBuf>,
    classifier: Option<ClassifierConfig>,
}

impl InferenceConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn checkpoint(mut self, path: PathBuf) -> Self {
        self.checkpoint = Some(path);
        self
    }
    pub fn target_voxel(mut self, size: f64) -> Self {
        self.target_voxel = Some(size);
        self
    }
    pub fn scratch_dir(mut self, path: PathBuf) -> Self {
        self.scratch_dir = Some(path);
        self
    }
    pub fn classifier(mut self, config: ClassifierConfig) -> Self {
        self.classifier = Some(config);
        self
    }

    pub fn build(self) -> Result<InferenceConfig, ConfigError> {
        let classifier = self.classifier.unwrap_or_default();
        classifier.validate()?;
        Ok(InferenceConfig {
            checkpoint: self
                .checkpoint
                .ok_or(ConfigError::MissingParameter("checkpoint"))?,
            target_voxel: positive_f64(
                "target_voxel",
                self.target_voxel.unwrap_or(DEFAULT_TARGET_VOXEL),
            )?,
            scratch_dir: self.scratch_dir.unwrap_or_else(std::env::temp_dir),
            classifier,
        })
    }
}

/// Where the true class of an evaluation file comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroundTruth {
    /// The name of the class folder the file was found in.
    #[default]
    Folder,
    /// The motif token embedded in the file name.
    Filename,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationConfig {
    pub root: PathBuf,
    pub max_per_class: usize,
    pub seed: u64,
    pub ground_truth: GroundTruth,
    pub inference: InferenceConfig,
}

#[derive(Default)]
pub struct EvaluationConfigBuilder {
    root: Option<PathBuf>,
    max_per_class: Option<usize>,
    seed: Option<u64>,
    ground_truth: Option<GroundTruth>,
    inference: Option<InferenceConfig>,
}

impl EvaluationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(mut self, path: PathBuf) -> Self {
        self.root = Some(path);
        self
    }
    pub fn max_per_class(mut self, n: usize) -> Self {
        self.max_per_class = Some(n);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn ground_truth(mut self, source: GroundTruth) -> Self {
        self.ground_truth = Some(source);
        self
    }
    pub fn inference(mut self, config: InferenceConfig) -> Self {
        self.inference = Some(config);
        self
    }

    pub fn build(self) -> Result<EvaluationConfig, ConfigError> {
        Ok(EvaluationConfig {
            root: self.root.ok_or(ConfigError::MissingParameter("root"))?,
            max_per_class: positive_usize(
                "max_per_class",
                self.max_per_class.unwrap_or(DEFAULT_MAX_PER_CLASS),
            )?,
            seed: self.seed.unwrap_or(DEFAULT_SEED),
            ground_truth: self.ground_truth.unwrap_or_default(),
            inference: self
                .inference
                .ok_or(ConfigError::MissingParameter("inference"))?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelConfig {
    pub output_dir: PathBuf,
    pub classes: Vec<StructuralClass>,
    pub normalize: bool,
}

#[derive(Default)]
pub struct LabelConfigBuilder {
    output_dir: Option<PathBuf>,
    classes: Option<Vec<StructuralClass>>,
    normalize: Option<bool>,
}

impl LabelConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output_dir(mut self, path: PathBuf) -> Self {
        self.output_dir = Some(path);
        self
    }
    pub fn classes(mut self, classes: Vec<StructuralClass>) -> Self {
        self.classes = Some(classes);
        self
    }
    pub fn normalize(mut self, normalize: bool) -> Self {
        self.normalize = Some(normalize);
        self
    }

    pub fn build(self) -> Result<LabelConfig, ConfigError> {
        let mut classes = self
            .classes
            .unwrap_or_else(|| StructuralClass::ALL.to_vec());
        classes.sort();
        classes.dedup();
        if classes.is_empty() {
            return Err(invalid("classes", "at least one structural class is required"));
        }
        Ok(LabelConfig {
            output_dir: self
                .output_dir
                .ok_or(ConfigError::MissingParameter("output_dir"))?,
            classes,
            normalize: self.normalize.unwrap_or(true),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn training_builder_applies_defaults() {
        let config = TrainingConfigBuilder::new()
            .train_manifest("train.csv".into())
            .val_manifest("val.csv".into())
            .output_dir("out".into())
            .build()
            .unwrap();
        assert_eq!(config.epochs, 29);
        assert_eq!(config.batch_size, 4);
        assert_eq!(config.learning_rate, 1e-3);
        assert_eq!(config.seed, 42);
        assert_eq!(config.target_voxel, 1.0);
        assert!(!config.guided);
        assert_eq!(config.scratch_dir, PathBuf::from("out").join("scratch"));
        assert_eq!(config.checkpoint_prefix, "label_less_classifier");
        assert_eq!(config.classifier, ClassifierConfig::default());
    }

    #[test]
    fn training_builder_reports_missing_parameters() {
        let result = TrainingConfigBuilder::new()
            .train_manifest("train.csv".into())
            .output_dir("out".into())
            .build();
        assert_eq!(result.unwrap_err(), ConfigError::MissingParameter("val_manifest"));
    }

    #[test]
    fn training_builder_rejects_invalid_values() {
        let base = || {
            TrainingConfigBuilder::new()
                .train_manifest("t.csv".into())
                .val_manifest("v.csv".into())
                .output_dir("o".into())
        };
        assert!(matches!(
            base().batch_size(0).build(),
            Err(ConfigError::Invalid { parameter: "batch_size", .. })
        ));
        assert!(matches!(
            base().learning_rate(-1.0).build(),
            Err(ConfigError::Invalid { parameter: "learning_rate", .. })
        ));
        assert!(matches!(
            base().target_voxel(f64::NAN).build(),
            Err(ConfigError::Invalid { parameter: "target_voxel", .. })
        ));
    }

    #[test]
    fn classifier_config_validates_patch_size() {
        let config = ClassifierConfig {
            patch_size: 60,
            ..ClassifierConfig::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(ClassifierConfig::default().flattened_features(), 64 * 8 * 8 * 8);
    }

    #[test]
    fn label_path_rule_swaps_directory_and_appends_file() {
        let rule = LabelPathRule::default();
        assert_eq!(
            rule.label_path_for(Path::new("/data/densityMap/1abc_A_hairpin4.mrc")),
            PathBuf::from("/data/labelMap/1abc_A_hairpin4/backbone_label.mrc")
        );
        assert_eq!(
            rule.label_path_for(Path::new("maps/x.mrc")),
            PathBuf::from("maps/x/backbone_label.mrc")
        );
    }

    #[test]
    fn label_builder_dedupes_classes() {
        let config = LabelConfigBuilder::new()
            .output_dir("labels".into())
            .classes(vec![StructuralClass::Base, StructuralClass::Backbone, StructuralClass::Base])
            .build()
            .unwrap();
        assert_eq!(config.classes, vec![StructuralClass::Backbone, StructuralClass::Base]);
        assert!(config.normalize);

        let empty = LabelConfigBuilder::new()
            .output_dir("labels".into())
            .classes(vec![])
            .build();
        assert!(empty.is_err());
    }

    #[test]
    fn evaluation_builder_defaults_to_folder_truth() {
        let inference = InferenceConfigBuilder::new()
            .checkpoint("model".into())
            .build()
            .unwrap();
        let config = EvaluationConfigBuilder::new()
            .root("eval".into())
            .inference(inference)
            .build()
            .unwrap();
        assert_eq!(config.max_per_class, 90);
        assert_eq!(config.ground_truth, GroundTruth::Folder);
    }
}
