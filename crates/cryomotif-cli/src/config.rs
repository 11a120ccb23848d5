mod defaults;

use crate::cli::{ClassifyArgs, EvaluateArgs, Guidance, TrainArgs};
use crate::error::{CliError, Result};
use cryomotif::engine::config as core_config;
use defaults::DefaultsConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialDataConfig {
    train_csv: Option<PathBuf>,
    val_csv: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    scratch_dir: Option<PathBuf>,
    density_dir: Option<String>,
    label_dir: Option<String>,
    label_file: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialTrainingConfig {
    epochs: Option<usize>,
    batch_size: Option<usize>,
    learning_rate: Option<f64>,
    seed: Option<u64>,
    guided: Option<bool>,
    target_voxel: Option<f64>,
    checkpoint_prefix: Option<String>,
    prefetch_batches: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialModelConfig {
    num_classes: Option<usize>,
    channels: Option<[usize; 3]>,
    hidden: Option<usize>,
    patch_size: Option<usize>,
}

impl PartialModelConfig {
    fn resolve(&self) -> core_config::ClassifierConfig {
        let base = core_config::ClassifierConfig::default();
        core_config::ClassifierConfig {
            num_classes: self.num_classes.unwrap_or(base.num_classes),
            channels: self.channels.unwrap_or(base.channels),
            hidden: self.hidden.unwrap_or(base.hidden),
            patch_size: self.patch_size.unwrap_or(base.patch_size),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialEvaluationConfig {
    max_per_class: Option<usize>,
    truth: Option<core_config::GroundTruth>,
    seed: Option<u64>,
}

/// Contents of a `cryomotif` TOML configuration file; every key is optional.
///
/// ```toml
/// [data]
/// train-csv = "data/train.csv"
/// val-csv = "data/val.csv"
/// output-dir = "checkpoints"
///
/// [training]
/// epochs = 29
/// guided = true
///
/// [model]
/// patch-size = 64
/// ```
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialRunConfig {
    data: Option<PartialDataConfig>,
    training: Option<PartialTrainingConfig>,
    model: Option<PartialModelConfig>,
    evaluation: Option<PartialEvaluationConfig>,
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value)))
}

fn required<T>(value: Option<T>, key: &str, flag: &str) -> Result<T> {
    value.ok_or_else(|| {
        CliError::Config(format!(
            "A value for '{}' is required either in the config file or via {}.",
            key, flag
        ))
    })
}

impl PartialRunConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Reads `path` when given; otherwise every value falls back to its default.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    fn classifier(&self) -> core_config::ClassifierConfig {
        self.model.as_ref().map(PartialModelConfig::resolve).unwrap_or_default()
    }

    /// Resolves a training run: command line, then `--set`, then the file, then defaults.
    pub fn merge_training(mut self, args: &TrainArgs) -> Result<core_config::TrainingConfig> {
        self.apply_set_values(&args.set_values)?;
        let defaults = DefaultsConfig::default();
        let classifier = self.classifier();
        let data = self.data.take().unwrap_or_default();
        let training = self.training.take().unwrap_or_default();

        let train_csv = required(args.train_csv.clone().or(data.train_csv), "data.train-csv", "--train-csv")?;
        let val_csv = required(args.val_csv.clone().or(data.val_csv), "data.val-csv", "--val-csv")?;
        let output_dir = required(args.output_dir.clone().or(data.output_dir), "data.output-dir", "--output-dir")?;
        let scratch_dir = args
            .scratch_dir
            .clone()
            .or(data.scratch_dir)
            .unwrap_or_else(|| output_dir.join(&defaults.scratch_dir_name));

        let rule_defaults = core_config::LabelPathRule::default();
        let label_paths = core_config::LabelPathRule {
            density_dir: data.density_dir.unwrap_or(rule_defaults.density_dir),
            label_dir: data.label_dir.unwrap_or(rule_defaults.label_dir),
            file_name: data.label_file.unwrap_or(rule_defaults.file_name),
        };

        core_config::TrainingConfigBuilder::new()
            .train_manifest(train_csv)
            .val_manifest(val_csv)
            .output_dir(output_dir)
            .scratch_dir(scratch_dir)
            .checkpoint_prefix(training.checkpoint_prefix.unwrap_or(defaults.checkpoint_prefix))
            .epochs(args.epochs.or(training.epochs).unwrap_or(defaults.epochs))
            .batch_size(args.batch_size.or(training.batch_size).unwrap_or(defaults.batch_size))
            .learning_rate(
                args.learning_rate
                    .or(training.learning_rate)
                    .unwrap_or(defaults.learning_rate),
            )
            .seed(args.seed.or(training.seed).unwrap_or(defaults.seed))
            .target_voxel(
                args.target_voxel
                    .or(training.target_voxel)
                    .unwrap_or(defaults.target_voxel),
            )
            .guided(Self::merge_guidance(args.guidance, training.guided, defaults.guided))
            .prefetch_batches(training.prefetch_batches.unwrap_or(defaults.prefetch_batches))
            .label_paths(label_paths)
            .classifier(classifier)
            .build()
            .map_err(|e| CliError::Config(e.to_string()))
    }

    fn merge_guidance(cli_flags: Guidance, file_val: Option<bool>, default: bool) -> bool {
        if cli_flags.guided {
            true
        } else if cli_flags.unguided {
            false
        } else {
            file_val.unwrap_or(default)
        }
    }

    fn inference(
        &self,
        checkpoint: &Path,
        target_voxel: Option<f64>,
        scratch_dir: Option<&PathBuf>,
    ) -> Result<core_config::InferenceConfig> {
        let defaults = DefaultsConfig::default();
        let file_training = self.training.as_ref();
        let file_data = self.data.as_ref();

        let mut builder = core_config::InferenceConfigBuilder::new()
            .checkpoint(checkpoint.to_path_buf())
            .target_voxel(
                target_voxel
                    .or(file_training.and_then(|t| t.target_voxel))
                    .unwrap_or(defaults.target_voxel),
            )
            .classifier(self.classifier());
        if let Some(dir) = scratch_dir.cloned().or_else(|| file_data.and_then(|d| d.scratch_dir.clone())) {
            builder = builder.scratch_dir(dir);
        }
        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }

    pub fn merge_classify(self, args: &ClassifyArgs) -> Result<core_config::InferenceConfig> {
        self.inference(&args.checkpoint, args.target_voxel, args.scratch_dir.as_ref())
    }

    pub fn merge_evaluation(mut self, args: &EvaluateArgs) -> Result<core_config::EvaluationConfig> {
        let inference = self.inference(&args.checkpoint, args.target_voxel, args.scratch_dir.as_ref())?;
        let defaults = DefaultsConfig::default();
        let evaluation = self.evaluation.take().unwrap_or_default();

        core_config::EvaluationConfigBuilder::new()
            .root(args.root.clone())
            .max_per_class(
                args.max_per_class
                    .or(evaluation.max_per_class)
                    .unwrap_or(defaults.max_per_class),
            )
            .seed(args.seed.or(evaluation.seed).unwrap_or(defaults.seed))
            .ground_truth(args.truth.map(Into::into).or(evaluation.truth).unwrap_or_default())
            .inference(inference)
            .build()
            .map_err(|e| CliError::Config(e.to_string()))
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let (key, value) = kv_pair.split_once('=').ok_or_else(|| {
                CliError::Config(format!("Invalid --set format: '{}'. Expected KEY=VALUE.", kv_pair))
            })?;

            match key {
                "data.train-csv" | "data.val-csv" | "data.output-dir" | "data.scratch-dir" => {
                    let data = self.data.get_or_insert_with(Default::default);
                    let path = Some(PathBuf::from(value));
                    match key {
                        "data.train-csv" => data.train_csv = path,
                        "data.val-csv" => data.val_csv = path,
                        "data.output-dir" => data.output_dir = path,
                        _ => data.scratch_dir = path,
                    }
                }
                "training.epochs" => {
                    self.training.get_or_insert_with(Default::default).epochs =
                        Some(parse_value(key, value, "integer")?);
                }
                "training.batch-size" => {
                    self.training.get_or_insert_with(Default::default).batch_size =
                        Some(parse_value(key, value, "integer")?);
                }
                "training.learning-rate" => {
                    self.training.get_or_insert_with(Default::default).learning_rate =
                        Some(parse_value(key, value, "float")?);
                }
                "training.seed" => {
                    self.training.get_or_insert_with(Default::default).seed =
                        Some(parse_value(key, value, "integer")?);
                }
                "training.guided" => {
                    self.training.get_or_insert_with(Default::default).guided =
                        Some(parse_value(key, value, "boolean")?);
                }
                "training.target-voxel" => {
                    self.training.get_or_insert_with(Default::default).target_voxel =
                        Some(parse_value(key, value, "float")?);
                }
                "training.prefetch-batches" => {
                    self.training.get_or_insert_with(Default::default).prefetch_batches =
                        Some(parse_value(key, value, "integer")?);
                }
                "training.checkpoint-prefix" => {
                    self.training.get_or_insert_with(Default::default).checkpoint_prefix =
                        Some(value.to_string());
                }
                "model.hidden" => {
                    self.model.get_or_insert_with(Default::default).hidden =
                        Some(parse_value(key, value, "integer")?);
                }
                "model.patch-size" => {
                    self.model.get_or_insert_with(Default::default).patch_size =
                        Some(parse_value(key, value, "integer")?);
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}
