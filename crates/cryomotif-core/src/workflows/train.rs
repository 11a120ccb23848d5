use crate::core::density::resample::Resampler;
use crate::core::io::manifest::{ManifestEntry, read_manifest};
use crate::core::taxonomy::motif::MotifLabel;
use crate::engine::checkpoint::{CheckpointMeta, save_checkpoint};
use crate::engine::config::TrainingConfig;
use crate::engine::error::EngineError;
use crate::engine::loader::{Batch, BatchLoader};
use crate::engine::network::{
    InferenceBackend, MotifClassifier, TrainingBackend, patches_to_tensor,
};
use crate::engine::progress::{Progress, ProgressReporter};
use burn::module::AutodiffModule;
use burn::nn::loss::CrossEntropyLossConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpochSummary {
    pub epoch: usize,
    /// Sum of per-batch mean losses.
    pub total_loss: f64,
    /// `total_loss` divided by the number of optimizer steps (0 without steps).
    pub mean_loss: f64,
    pub steps: usize,
    pub empty_batches: usize,
    pub skipped_examples: usize,
    pub val_accuracy: f64,
    pub val_samples: usize,
    pub checkpoint: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub train_examples: usize,
    pub val_examples: usize,
    pub epochs: Vec<EpochSummary>,
}

impl TrainingReport {
    pub fn final_checkpoint(&self) -> Option<&PathBuf> {
        self.epochs.last().map(|e| &e.checkpoint)
    }
}

#[derive(Default)]
struct EpochTally {
    total_loss: f64,
    steps: usize,
    empty_batches: usize,
    skipped: usize,
}

fn targets_tensor(targets: &[MotifLabel], device: &<TrainingBackend as Backend>::Device) -> Tensor<TrainingBackend, 1, Int> {
    let indices: Vec<i64> = targets.iter().map(|t| t.index() as i64).collect();
    let n = indices.len();
    Tensor::from_data(TensorData::new(indices, [n]), device)
}

/// Trains the motif classifier from the train/validation manifests.
///
/// Every epoch shuffles the training set, takes one Adam step per
/// non-empty batch, measures validation accuracy on the inner backend and
/// writes `<prefix>_epoch<N>` into the output directory. Examples that fail
/// to load are skipped; an unreadable manifest aborts the run.
#[instrument(skip_all, name = "training_workflow")]
pub fn run(
    config: &TrainingConfig,
    resampler: &dyn Resampler,
    reporter: &ProgressReporter,
) -> Result<TrainingReport, EngineError> {
    reporter.report(Progress::PhaseStart {
        name: "Preparation",
    });
    let train = read_manifest(&config.train_manifest)?;
    let val = read_manifest(&config.val_manifest)?;
    std::fs::create_dir_all(&config.output_dir).map_err(|e| EngineError::io(&config.output_dir, e))?;
    info!(
        train = train.len(),
        val = val.len(),
        epochs = config.epochs,
        guided = config.guided,
        "Starting training"
    );

    TrainingBackend::seed(config.seed);
    let device = <TrainingBackend as Backend>::Device::default();
    let mut model: MotifClassifier<TrainingBackend> = config.classifier.init(&device);
    let mut optimizer = AdamConfig::new().init::<TrainingBackend, MotifClassifier<TrainingBackend>>();
    let loss_fn = CrossEntropyLossConfig::new().init(&device);
    reporter.report(Progress::PhaseFinish);

    reporter.report(Progress::PhaseStart { name: "Training" });
    let train_loader = BatchLoader::new(&train, config, resampler);
    let mut epochs = Vec::with_capacity(config.epochs);

    for epoch in 1..=config.epochs {
        reporter.report(Progress::TaskStart {
            total_steps: train_loader.batch_count() as u64,
        });
        let mut tally = EpochTally::default();

        train_loader.for_each_batch(epoch, true, |batch| -> Result<(), EngineError> {
            match batch {
                Batch::Empty { skipped } => {
                    tally.empty_batches += 1;
                    tally.skipped += skipped;
                }
                Batch::Ready {
                    patches,
                    targets,
                    skipped,
                } => {
                    tally.skipped += skipped;
                    let input = patches_to_tensor::<TrainingBackend>(&patches, config.classifier.patch_size, &device)?;
                    let logits = model.forward(input);
                    let loss = loss_fn.forward(logits, targets_tensor(&targets, &device));
                    tally.total_loss += loss.clone().into_scalar().elem::<f64>();

                    let grads = GradientsParams::from_grads(loss.backward(), &model);
                    model = optimizer.step(config.learning_rate, model.clone(), grads);
                    tally.steps += 1;
                }
            }
            reporter.report(Progress::TaskIncrement);
            Ok(())
        })?;
        reporter.report(Progress::TaskFinish);

        let inference_model = model.valid();
        let (val_accuracy, val_samples) = validate(&inference_model, &val, config, resampler)?;

        let stem = config
            .output_dir
            .join(format!("{}_epoch{}", config.checkpoint_prefix, epoch));
        let meta = CheckpointMeta::new(&config.classifier, config.target_voxel, Some(epoch));
        let checkpoint = save_checkpoint(&inference_model, &meta, &stem)?;

        let mean_loss = if tally.steps > 0 {
            tally.total_loss / tally.steps as f64
        } else {
            0.0
        };
        info!(
            epoch,
            loss = tally.total_loss,
            mean_loss,
            val_accuracy,
            skipped = tally.skipped,
            empty_batches = tally.empty_batches,
            "Epoch complete"
        );
        reporter.report(Progress::EpochFinish {
            epoch,
            mean_loss,
            val_accuracy,
        });

        epochs.push(EpochSummary {
            epoch,
            total_loss: tally.total_loss,
            mean_loss,
            steps: tally.steps,
            empty_batches: tally.empty_batches,
            skipped_examples: tally.skipped,
            val_accuracy,
            val_samples,
            checkpoint,
        });
    }
    reporter.report(Progress::PhaseFinish);

    Ok(TrainingReport {
        train_examples: train.len(),
        val_examples: val.len(),
        epochs,
    })
}

/// Accuracy over every validation example that loads, in manifest order.
fn validate(
    model: &MotifClassifier<InferenceBackend>,
    entries: &[ManifestEntry],
    config: &TrainingConfig,
    resampler: &dyn Resampler,
) -> Result<(f64, usize), EngineError> {
    let device = <InferenceBackend as Backend>::Device::default();
    let loader = BatchLoader::new(entries, config, resampler);
    let mut correct = 0usize;
    let mut total = 0usize;

    // Validation patches do not depend on the epoch.
    loader.for_each_batch(0, false, |batch| -> Result<(), EngineError> {
        if let Batch::Ready { patches, targets, .. } = batch {
            let predictions = model.predict_batch(&patches, &device)?;
            correct += predictions
                .iter()
                .zip(&targets)
                .filter(|(p, t)| p.label == **t)
                .count();
            total += targets.len();
        }
        Ok(())
    })?;

    let accuracy = if total > 0 {
        correct as f64 / total as f64
    } else {
        0.0
    };
    Ok((accuracy, total))
}
