use super::config::TrainingConfig;
use super::dataset::{Sample, build_sample};
use crate::core::density::resample::Resampler;
use crate::core::io::manifest::ManifestEntry;
use crate::core::taxonomy::motif::MotifLabel;
use ndarray::Array3;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use std::sync::mpsc;
use tracing::warn;

/// A batch as handed to the optimizer.
#[derive(Debug)]
pub enum Batch {
    Ready {
        patches: Vec<Array3<f32>>,
        targets: Vec<MotifLabel>,
        skipped: usize,
    },
    /// Every example of the batch failed to load.
    Empty { skipped: usize },
}

impl Batch {
    pub fn skipped(&self) -> usize {
        match self {
            Batch::Ready { skipped, .. } | Batch::Empty { skipped } => *skipped,
        }
    }

    fn from_samples(samples: Vec<Sample>, skipped: usize) -> Self {
        if samples.is_empty() {
            return Batch::Empty { skipped };
        }
        let (patches, targets) = samples.into_iter().map(|s| (s.patch, s.label)).unzip();
        Batch::Ready {
            patches,
            targets,
            skipped,
        }
    }
}

/// Splits a manifest into batches and builds them on a background thread.
///
/// Samples of one batch are built in parallel; up to `prefetch_batches`
/// finished batches wait in a bounded channel while the caller consumes
/// the previous one.
pub struct BatchLoader<'a> {
    entries: &'a [ManifestEntry],
    config: &'a TrainingConfig,
    resampler: &'a dyn Resampler,
}

impl<'a> BatchLoader<'a> {
    pub fn new(entries: &'a [ManifestEntry], config: &'a TrainingConfig, resampler: &'a dyn Resampler) -> Self {
        Self {
            entries,
            config,
            resampler,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn batch_count(&self) -> usize {
        self.entries.len().div_ceil(self.config.batch_size)
    }

    /// Visiting order for one epoch; shuffled orders depend only on seed and epoch.
    pub fn order(&self, epoch: usize, shuffle: bool) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.entries.len()).collect();
        if shuffle {
            let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(epoch as u64));
            order.shuffle(&mut rng);
        }
        order
    }

    fn build_batch(&self, epoch: usize, indices: &[usize]) -> Batch {
        let results: Vec<_> = indices
            .par_iter()
            .map(|&i| build_sample(&self.entries[i], epoch, i, self.config, self.resampler))
            .collect();

        let mut samples = Vec::with_capacity(results.len());
        let mut skipped = 0;
        for (result, &i) in results.into_iter().zip(indices) {
            match result {
                Ok(sample) => samples.push(sample),
                Err(e) => {
                    skipped += 1;
                    warn!(path = %self.entries[i].path.display(), error = %e, "Skipping example");
                }
            }
        }
        Batch::from_samples(samples, skipped)
    }

    /// Feeds every batch of one epoch to `consume`, stopping at its first error.
    pub fn for_each_batch<E>(
        &self,
        epoch: usize,
        shuffle: bool,
        mut consume: impl FnMut(Batch) -> Result<(), E>,
    ) -> Result<(), E> {
        let order = self.order(epoch, shuffle);
        let (tx, rx) = mpsc::sync_channel(self.config.prefetch_batches);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for chunk in order.chunks(self.config.batch_size) {
                    if tx.send(self.build_batch(epoch, chunk)).is_err() {
                        break;
                    }
                }
                drop(tx);
            });

            let mut outcome = Ok(());
            for batch in rx.iter() {
                if let Err(e) = consume(batch) {
                    outcome = Err(e);
                    break;
                }
            }
            drop(rx);
            outcome
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::density::resample::TrilinearResampler;
    use crate::core::io::mrc::MrcFile;
    use crate::core::io::traits::VolumeFile;
    use crate::core::models::volume::DensityVolume;
    use crate::engine::config::{ClassifierConfig, TrainingConfigBuilder};
    use std::path::Path;
    use tempfile::tempdir;

    fn config(root: &Path, batch_size: usize) -> TrainingConfig {
        TrainingConfigBuilder::new()
            .train_manifest(root.join("t.csv"))
            .val_manifest(root.join("v.csv"))
            .output_dir(root.join("out"))
            .batch_size(batch_size)
            .classifier(ClassifierConfig {
                patch_size: 8,
                ..ClassifierConfig::default()
            })
            .build()
            .unwrap()
    }

    fn entries(root: &Path, present: &[bool]) -> Vec<ManifestEntry> {
        present
            .iter()
            .enumerate()
            .map(|(i, &exists)| {
                let path = root.join(format!("map{}.mrc", i));
                if exists {
                    let volume = DensityVolume::isotropic(Array3::from_elem((8, 8, 8), i as f32), 1.0).unwrap();
                    MrcFile::write_to_path(&volume, &path).unwrap();
                }
                ManifestEntry {
                    path,
                    label: MotifLabel::from_index(i % MotifLabel::COUNT).unwrap(),
                }
            })
            .collect()
    }

    #[test]
    fn shuffle_is_seeded_and_complete() {
        let dir = tempdir().unwrap();
        let config = config(dir.path(), 2);
        let entries = entries(dir.path(), &[false; 10]);
        let loader = BatchLoader::new(&entries, &config, &TrilinearResampler);

        assert_eq!(loader.order(1, false), (0..10).collect::<Vec<_>>());
        let a = loader.order(1, true);
        assert_eq!(a, loader.order(1, true));
        let mut sorted = a.clone();
        sorted.sort();
        assert_eq!(sorted, (0..10).collect::<Vec<_>>());
        assert_eq!(loader.batch_count(), 5);
    }

    #[test]
    fn failed_examples_are_skipped_and_order_is_kept() {
        let dir = tempdir().unwrap();
        let config = config(dir.path(), 3);
        let entries = entries(dir.path(), &[true, false, true, false, false, false, true]);
        let loader = BatchLoader::new(&entries, &config, &TrilinearResampler);

        let mut seen = Vec::new();
        loader
            .for_each_batch(1, false, |batch| -> Result<(), ()> {
                seen.push(batch);
                Ok(())
            })
            .unwrap();

        assert_eq!(seen.len(), 3);
        match &seen[0] {
            Batch::Ready { targets, skipped, .. } => {
                assert_eq!(targets, &vec![MotifLabel::SymmetricLoop, MotifLabel::Hairpin]);
                assert_eq!(*skipped, 1);
            }
            other => panic!("expected a ready batch, got {other:?}"),
        }
        assert!(matches!(seen[1], Batch::Empty { skipped: 3 }));
        match &seen[2] {
            Batch::Ready { patches, .. } => assert_eq!(patches[0].dim(), (8, 8, 8)),
            other => panic!("expected a ready batch, got {other:?}"),
        }
    }

    #[test]
    fn consumer_error_stops_the_epoch() {
        let dir = tempdir().unwrap();
        let config = config(dir.path(), 1);
        let entries = entries(dir.path(), &[false; 6]);
        let loader = BatchLoader::new(&entries, &config, &TrilinearResampler);

        let mut calls = 0;
        let result = loader.for_each_batch(1, true, |_| {
            calls += 1;
            if calls == 2 { Err("stop") } else { Ok(()) }
        });
        assert_eq!(result, Err("stop"));
        assert_eq!(calls, 2);
    }
}
