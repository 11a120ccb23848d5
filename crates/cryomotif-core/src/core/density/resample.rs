use crate::core::io::mrc::{MrcError, MrcFile};
use crate::core::io::traits::VolumeFile;
use crate::core::models::volume::{DensityVolume, VolumeError};
use ndarray::Array3;
use std::path::Path;
use thiserror::Error;

/// Isotropic spacing (Å) every map is brought to before patch extraction.
pub const DEFAULT_TARGET_VOXEL: f64 = 1.0;

const SCALE_TOLERANCE: f64 = 1e-3;

#[derive(Debug, Error)]
pub enum ResampleError {
    #[error("Failed to read '{path}': {source}")]
    Read { path: String, source: MrcError },
    #[error("Failed to write '{path}': {source}")]
    Write { path: String, source: MrcError },
    #[error("Target voxel size must be strictly positive (got {0})")]
    InvalidTarget(f64),
    #[error("Scale {scale} disagrees with the spacing ratio {expected} along {axis}")]
    SpacingMismatch { axis: char, scale: f64, expected: f64 },
    #[error("Resampled grid is invalid: {0}")]
    Volume(#[from] VolumeError),
}

/// Brings a map on disk to a uniform voxel spacing.
///
/// Implementations must write the resampled map to `dst` and return it with
/// `target_voxel` spacing on every axis. A non-positive `scale` asks the
/// implementation to derive the zoom from the source spacing; a positive
/// `scale` is an explicit zoom that must agree with that ratio.
pub trait Resampler: Send + Sync {
    fn resample(
        &self,
        scale: f64,
        src: &Path,
        dst: &Path,
        target_voxel: f64,
    ) -> Result<DensityVolume, ResampleError>;
}

/// Per-axis interpolation weights: `(lower index, upper index, upper weight)`.
fn axis_weights(n_in: usize, n_out: usize, step: f64) -> Vec<(usize, usize, f32)> {
    let last = (n_in - 1) as f64;
    (0..n_out)
        .map(|i| {
            let t = (i as f64 * step).clamp(0.0, last);
            let lo = t.floor() as usize;
            let hi = (lo + 1).min(n_in - 1);
            (lo, hi, (t - lo as f64) as f32)
        })
        .collect()
}

fn lerp(a: f32, b: f32, w: f32) -> f32 {
    a + (b - a) * w
}

/// Trilinear resampler operating in physical space.
///
/// Output voxel `i` along an axis sits at `origin + i * target_voxel`; the
/// output size is `round(n * voxel / target_voxel)` (at least one voxel).
/// Samples beyond the last input voxel are clamped to the edge. Origin and
/// start are kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrilinearResampler;

impl TrilinearResampler {
    pub fn new() -> Self {
        Self
    }

    pub fn resample_volume(
        &self,
        volume: &DensityVolume,
        target_voxel: f64,
    ) -> Result<DensityVolume, ResampleError> {
        if target_voxel.is_nan() || target_voxel <= 0.0 {
            return Err(ResampleError::InvalidTarget(target_voxel));
        }
        let [nz, ny, nx] = volume.shape();
        let [vx, vy, vz] = volume.voxel_size();

        let out_len = |n: usize, v: f64| ((n as f64 * v / target_voxel).round() as usize).max(1);
        let (oz, oy, ox) = (out_len(nz, vz), out_len(ny, vy), out_len(nx, vx));

        let wz = axis_weights(nz, oz, target_voxel / vz);
        let wy = axis_weights(ny, oy, target_voxel / vy);
        let wx = axis_weights(nx, ox, target_voxel / vx);
        let src = volume.data();

        let data = Array3::from_shape_fn((oz, oy, ox), |(k, j, i)| {
            let (z0, z1, fz) = wz[k];
            let (y0, y1, fy) = wy[j];
            let (x0, x1, fx) = wx[i];
            let plane = |z: usize| {
                let row = |y: usize| lerp(src[[z, y, x0]], src[[z, y, x1]], fx);
                lerp(row(y0), row(y1), fy)
            };
            lerp(plane(z0), plane(z1), fz)
        });

        let resampled = DensityVolume::new(data, [target_voxel; 3], volume.origin(), volume.start())?;
        Ok(resampled)
    }

    fn check_scale(volume: &DensityVolume, scale: f64, target_voxel: f64) -> Result<(), ResampleError> {
        for (axis, spacing) in ['x', 'y', 'z'].into_iter().zip(volume.voxel_size()) {
            let expected = spacing / target_voxel;
            if (scale - expected).abs() > SCALE_TOLERANCE {
                return Err(ResampleError::SpacingMismatch {
                    axis,
                    scale,
                    expected,
                });
            }
        }
        Ok(())
    }
}

impl Resampler for TrilinearResampler {
    fn resample(
        &self,
        scale: f64,
        src: &Path,
        dst: &Path,
        target_voxel: f64,
    ) -> Result<DensityVolume, ResampleError> {
        let volume = MrcFile::read_from_path(src).map_err(|source| ResampleError::Read {
            path: src.to_string_lossy().to_string(),
            source,
        })?;
        if scale > 0.0 {
            Self::check_scale(&volume, scale, target_voxel)?;
        }
        let resampled = self.resample_volume(&volume, target_voxel)?;
        MrcFile::write_to_path(&resampled, dst).map_err(|source| ResampleError::Write {
            path: dst.to_string_lossy().to_string(),
            source,
        })?;
        Ok(resampled)
    }
}
