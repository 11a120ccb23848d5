use super::config::ClassifierConfig;
use crate::core::taxonomy::motif::MotifLabel;
use burn::nn::conv::{Conv3d, Conv3dConfig};
use burn::nn::{Linear, LinearConfig, PaddingConfig3d};
use burn::prelude::*;
use burn::tensor::activation::{relu, softmax};
use ndarray::Array3;
use thiserror::Error;

/// CPU backend used for inference and validation.
pub type InferenceBackend = burn::backend::NdArray;
/// [`InferenceBackend`] with automatic differentiation, used for training.
pub type TrainingBackend = burn::backend::Autodiff<InferenceBackend>;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Patch has shape {found:?}, expected a cube of edge {expected}")]
    PatchShape { expected: usize, found: [usize; 3] },
    #[error("Cannot build a batch from zero patches")]
    EmptyBatch,
    #[error("Failed to read tensor data: {0}")]
    TensorData(String),
    #[error("Class index {0} has no motif label")]
    UnknownClass(usize),
}

/// Three-stage 3D CNN mapping a single-channel cubic patch to motif logits.
///
/// Each stage is a 3×3×3 convolution (padding 1), ReLU and a 2×2×2 max
/// pool; the pooled features feed two fully connected layers.
#[derive(Module, Debug)]
pub struct MotifClassifier<B: Backend> {
    conv1: Conv3d<B>,
    conv2: Conv3d<B>,
    conv3: Conv3d<B>,
    fc1: Linear<B>,
    fc2: Linear<B>,
}

/// Class probabilities for one patch.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: MotifLabel,
    /// Softmax output indexed by [`MotifLabel::index`].
    pub probabilities: Vec<f32>,
}

impl Prediction {
    pub fn confidence(&self) -> f32 {
        self.probabilities
            .get(self.label.index())
            .copied()
            .unwrap_or(0.0)
    }
}

impl ClassifierConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> MotifClassifier<B> {
        let [c1, c2, c3] = self.channels;
        let conv = |input: usize, output: usize| {
            Conv3dConfig::new([input, output], [3, 3, 3])
                .with_padding(PaddingConfig3d::Explicit(1, 1, 1))
                .init(device)
        };
        MotifClassifier {
            conv1: conv(1, c1),
            conv2: conv(c1, c2),
            conv3: conv(c2, c3),
            fc1: LinearConfig::new(self.flattened_features(), self.hidden).init(device),
            fc2: LinearConfig::new(self.hidden, self.num_classes).init(device),
        }
    }
}

/// Block maximum over non-overlapping pairs along one spatial axis.
///
/// Axes are pooled one at a time so no intermediate tensor exceeds rank 6.
fn halve_axis<B: Backend>(x: Tensor<B, 5>, axis: usize) -> Tensor<B, 5> {
    let dims = x.dims();
    let mut split = [0usize; 6];
    split[..axis].copy_from_slice(&dims[..axis]);
    split[axis] = dims[axis] / 2;
    split[axis + 1] = 2;
    split[axis + 2..].copy_from_slice(&dims[axis + 1..]);

    let mut pooled = dims;
    pooled[axis] /= 2;
    x.reshape(split).max_dim(axis + 1).reshape(pooled)
}

fn max_pool_2x<B: Backend>(x: Tensor<B, 5>) -> Tensor<B, 5> {
    let x = halve_axis(x, 2);
    let x = halve_axis(x, 3);
    halve_axis(x, 4)
}

impl<B: Backend> MotifClassifier<B> {
    fn stage(conv: &Conv3d<B>, x: Tensor<B, 5>) -> Tensor<B, 5> {
        max_pool_2x(relu(conv.forward(x)))
    }

    /// `(N, 1, S, S, S)` → `(N, num_classes)` logits.
    pub fn forward(&self, input: Tensor<B, 5>) -> Tensor<B, 2> {
        let x = Self::stage(&self.conv1, input);
        let x = Self::stage(&self.conv2, x);
        let x = Self::stage(&self.conv3, x);
        let x: Tensor<B, 2> = x.flatten(1, 4);
        let x = relu(self.fc1.forward(x));
        self.fc2.forward(x)
    }

    /// Number of classes the output layer actually produces.
    pub fn output_classes(&self) -> usize {
        self.fc2.weight.val().dims()[1]
    }

    /// Number of features the first dense layer expects.
    pub fn input_features(&self) -> usize {
        self.fc1.weight.val().dims()[0]
    }

    /// `[input, output]` channels of each convolution stage.
    pub fn conv_channels(&self) -> [[usize; 2]; 3] {
        [&self.conv1, &self.conv2, &self.conv3].map(|conv| {
            let dims = conv.weight.val().dims();
            [dims[1], dims[0]]
        })
    }

    pub fn predict_batch(
        &self,
        patches: &[Array3<f32>],
        device: &B::Device,
    ) -> Result<Vec<Prediction>, NetworkError> {
        let edge = patches.first().map(|p| p.dim().0).ok_or(NetworkError::EmptyBatch)?;
        let input = patches_to_tensor::<B>(patches, edge, device)?;
        let classes = self.output_classes();
        let probabilities = softmax(self.forward(input), 1)
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| NetworkError::TensorData(format!("{:?}", e)))?;

        probabilities
            .chunks(classes)
            .map(|row| {
                let best = argmax(row);
                let label = MotifLabel::from_index(best)
                    .map_err(|_| NetworkError::UnknownClass(best))?;
                Ok(Prediction {
                    label,
                    probabilities: row.to_vec(),
                })
            })
            .collect()
    }

    pub fn predict(&self, patch: &Array3<f32>, device: &B::Device) -> Result<Prediction, NetworkError> {
        let mut predictions = self.predict_batch(std::slice::from_ref(patch), device)?;
        predictions.pop().ok_or(NetworkError::EmptyBatch)
    }
}

/// Index of the largest value; the first one wins ties.
pub fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// Stacks cubic patches into an `(N, 1, S, S, S)` tensor.
pub fn patches_to_tensor<B: Backend>(
    patches: &[Array3<f32>],
    patch_size: usize,
    device: &B::Device,
) -> Result<Tensor<B, 5>, NetworkError> {
    if patches.is_empty() {
        return Err(NetworkError::EmptyBatch);
    }
    let mut values = Vec::with_capacity(patches.len() * patch_size.pow(3));
    for patch in patches {
        let (d0, d1, d2) = patch.dim();
        if [d0, d1, d2] != [patch_size; 3] {
            return Err(NetworkError::PatchShape {
                expected: patch_size,
                found: [d0, d1, d2],
            });
        }
        values.extend(patch.iter().copied());
    }
    let data = TensorData::new(values, [patches.len(), 1, patch_size, patch_size, patch_size]);
    Ok(Tensor::from_data(data, device))
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = InferenceBackend;

    fn small_config() -> ClassifierConfig {
        ClassifierConfig {
            num_classes: 5,
            channels: [2, 3, 4],
            hidden: 8,
            patch_size: 16,
        }
    }

    #[test]
    fn pooling_takes_block_maximum() {
        let device = Default::default();
        let values: Vec<f32> = (0..64).map(|v| v as f32).collect();
        let x = Tensor::<TestBackend, 5>::from_data(TensorData::new(values, [1, 1, 4, 4, 4]), &device);
        let pooled = max_pool_2x(x);
        assert_eq!(pooled.dims(), [1, 1, 2, 2, 2]);
        let out = pooled.into_data().to_vec::<f32>().unwrap();
        // Block (z, y, x) = (0, 0, 0) covers indices up to 16 + 4 + 1.
        assert_eq!(out, vec![21.0, 23.0, 29.0, 31.0, 53.0, 55.0, 61.0, 63.0]);
    }

    #[test]
    fn default_network_maps_patches_to_five_logits() {
        let device = Default::default();
        let config = ClassifierConfig::default();
        let model = config.init::<TestBackend>(&device);
        let patch = Array3::<f32>::from_shape_fn((64, 64, 64), |(z, y, x)| ((z + y + x) % 7) as f32 / 7.0);

        let input = patches_to_tensor::<TestBackend>(&[patch.clone()], 64, &device).unwrap();
        assert_eq!(model.forward(input).dims(), [1, 5]);

        let prediction = model.predict(&patch, &device).unwrap();
        assert_eq!(prediction.probabilities.len(), 5);
        let total: f32 = prediction.probabilities.iter().sum();
        assert!((total - 1.0).abs() < 1e-4);
        assert_eq!(prediction.label.index(), argmax(&prediction.probabilities));
    }

    #[test]
    fn batches_keep_one_row_per_patch() {
        let device = Default::default();
        let model = small_config().init::<TestBackend>(&device);
        let patches = vec![
            Array3::<f32>::zeros((16, 16, 16)),
            Array3::<f32>::ones((16, 16, 16)),
            Array3::<f32>::from_elem((16, 16, 16), -1.0),
        ];
        let input = patches_to_tensor::<TestBackend>(&patches, 16, &device).unwrap();
        assert_eq!(model.forward(input).dims(), [3, 5]);

        let predictions = model.predict_batch(&patches, &device).unwrap();
        assert_eq!(predictions.len(), 3);
        for p in &predictions {
            assert!((p.probabilities.iter().sum::<f32>() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn prediction_is_deterministic() {
        let device = Default::default();
        let model = small_config().init::<TestBackend>(&device);
        let patch = Array3::from_shape_fn((16, 16, 16), |(z, _, _)| z as f32);
        let a = model.predict(&patch, &device).unwrap();
        let b = model.predict(&patch, &device).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn mismatched_patch_shape_is_rejected() {
        let device = Default::default();
        let patches = vec![Array3::<f32>::zeros((16, 16, 16)), Array3::<f32>::zeros((16, 16, 8))];
        assert!(matches!(
            patches_to_tensor::<TestBackend>(&patches, 16, &device),
            Err(NetworkError::PatchShape { found: [16, 16, 8], .. })
        ));
        assert!(matches!(
            patches_to_tensor::<TestBackend>(&[], 16, &device),
            Err(NetworkError::EmptyBatch)
        ));
    }

    #[test]
    fn layer_shapes_follow_config() {
        let device = Default::default();
        let model = small_config().init::<TestBackend>(&device);
        assert_eq!(model.output_classes(), 5);
        assert_eq!(model.input_features(), 4 * 2 * 2 * 2);
    }

    #[test]
    fn argmax_prefers_first_maximum() {
        assert_eq!(argmax(&[0.1, 0.7, 0.7, 0.2]), 1);
        assert_eq!(argmax(&[3.0]), 0);
    }
}
