use cryomotif::core::density::resample::DEFAULT_TARGET_VOXEL;
use cryomotif::engine::config::{
    DEFAULT_BATCH_SIZE, DEFAULT_CHECKPOINT_PREFIX, DEFAULT_EPOCHS, DEFAULT_LEARNING_RATE,
    DEFAULT_MAX_PER_CLASS, DEFAULT_SEED,
};

/// Values used when neither the command line, `--set` nor the config file
/// provides one.
pub struct DefaultsConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub seed: u64,
    pub target_voxel: f64,
    pub guided: bool,
    pub prefetch_batches: usize,
    pub checkpoint_prefix: String,
    pub scratch_dir_name: String,
    pub max_per_class: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            epochs: DEFAULT_EPOCHS,
            batch_size: DEFAULT_BATCH_SIZE,
            learning_rate: DEFAULT_LEARNING_RATE,
            seed: DEFAULT_SEED,
            target_voxel: DEFAULT_TARGET_VOXEL,
            guided: false,
            prefetch_batches: 2,
            checkpoint_prefix: DEFAULT_CHECKPOINT_PREFIX.to_string(),
            scratch_dir_name: "scratch".to_string(),
            max_per_class: DEFAULT_MAX_PER_CLASS,
        }
    }
}
