use ndarray::Array3;
use thiserror::Error;

const AXES: [char; 3] = ['x', 'y', 'z'];

#[derive(Debug, Error, PartialEq)]
pub enum VolumeError {
    #[error("Voxel size along {axis} must be strictly positive (got {value})")]
    NonPositiveVoxelSize { axis: char, value: f64 },
    #[error("Volume has a zero-length axis (shape {shape:?})")]
    EmptyShape { shape: [usize; 3] },
}

/// A 3D density grid with its physical placement.
///
/// Voxel values are stored in `(z, y, x)` order, matching the section/row/column
/// layout of MRC files. All metadata (`voxel_size`, `origin`, `start`) is given
/// in `(x, y, z)` order.
///
/// The grid is immutable once built: every transformation in the crate
/// produces a new `DensityVolume` through [`DensityVolume::with_data`] or
/// [`DensityVolume::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct DensityVolume {
    data: Array3<f32>,
    voxel_size: [f64; 3],
    origin: [f64; 3],
    start: [i32; 3],
}

impl DensityVolume {
    /// Builds a volume, validating the voxel size and shape.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::NonPositiveVoxelSize`] when any spacing component
    /// is zero, negative or NaN, and [`VolumeError::EmptyShape`] for a grid with
    /// a zero-length axis.
    pub fn new(
        data: Array3<f32>,
        voxel_size: [f64; 3],
        origin: [f64; 3],
        start: [i32; 3],
    ) -> Result<Self, VolumeError> {
        for (axis, &value) in AXES.iter().zip(voxel_size.iter()) {
            if value.is_nan() || value <= 0.0 {
                return Err(VolumeError::NonPositiveVoxelSize { axis: *axis, value });
            }
        }
        let (nz, ny, nx) = data.dim();
        if nz == 0 || ny == 0 || nx == 0 {
            return Err(VolumeError::EmptyShape {
                shape: [nz, ny, nx],
            });
        }
        Ok(Self {
            data,
            voxel_size,
            origin,
            start,
        })
    }

    /// Convenience constructor for an isotropic grid at the origin.
    pub fn isotropic(data: Array3<f32>, voxel_size: f64) -> Result<Self, VolumeError> {
        Self::new(data, [voxel_size; 3], [0.0; 3], [0; 3])
    }

    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    pub fn into_data(self) -> Array3<f32> {
        self.data
    }

    pub fn voxel_size(&self) -> [f64; 3] {
        self.voxel_size
    }

    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }

    pub fn start(&self) -> [i32; 3] {
        self.start
    }

    /// Grid shape as `[nz, ny, nx]`.
    pub fn shape(&self) -> [usize; 3] {
        let (nz, ny, nx) = self.data.dim();
        [nz, ny, nx]
    }

    /// The voxel at `shape / 2` along each axis, in `(z, y, x)` order.
    pub fn center_index(&self) -> [usize; 3] {
        let [nz, ny, nx] = self.shape();
        [nz / 2, ny / 2, nx / 2]
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn nonzero_count(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0.0).count()
    }

    /// Applies `f` to every voxel, returning a new volume with the same
    /// shape and metadata.
    pub fn mapv(&self, f: impl Fn(f32) -> f32) -> Self {
        Self {
            data: self.data.mapv(f),
            voxel_size: self.voxel_size,
            origin: self.origin,
            start: self.start,
        }
    }

    /// An all-zero volume with this volume's shape and metadata.
    pub fn zeros_like(&self) -> Self {
        self.mapv(|_| 0.0)
    }

    pub(crate) fn data_mut(&mut self) -> &mut Array3<f32> {
        &mut self.data
    }

    /// Returns a new volume carrying this volume's metadata and the given grid.
    ///
    /// The grid may have a different shape (padding helpers rely on this);
    /// spacing, origin and start are copied unchanged.
    pub fn with_data(&self, data: Array3<f32>) -> Result<Self, VolumeError> {
        Self::new(data, self.voxel_size, self.origin, self.start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_non_positive_voxel_size() {
        let data = Array3::<f32>::zeros((2, 2, 2));
        let err = DensityVolume::new(data.clone(), [1.0, 0.0, 1.0], [0.0; 3], [0; 3]).unwrap_err();
        assert_eq!(
            err,
            VolumeError::NonPositiveVoxelSize {
                axis: 'y',
                value: 0.0
            }
        );
        assert!(DensityVolume::new(data.clone(), [1.0, 1.0, -2.0], [0.0; 3], [0; 3]).is_err());
        assert!(DensityVolume::new(data, [f64::NAN, 1.0, 1.0], [0.0; 3], [0; 3]).is_err());
    }

    #[test]
    fn new_rejects_empty_grid() {
        let data = Array3::<f32>::zeros((0, 3, 3));
        assert_eq!(
            DensityVolume::isotropic(data, 1.0).unwrap_err(),
            VolumeError::EmptyShape { shape: [0, 3, 3] }
        );
    }

    #[test]
    fn shape_and_center_follow_zyx_order() {
        let data = Array3::<f32>::zeros((4, 5, 7));
        let volume = DensityVolume::isotropic(data, 1.5).unwrap();
        assert_eq!(volume.shape(), [4, 5, 7]);
        assert_eq!(volume.center_index(), [2, 2, 3]);
        assert_eq!(volume.len(), 140);
    }

    #[test]
    fn nonzero_count_ignores_zeros() {
        let mut data = Array3::<f32>::zeros((3, 3, 3));
        data[[0, 0, 0]] = 1.0;
        data[[2, 1, 0]] = -0.5;
        let volume = DensityVolume::isotropic(data, 1.0).unwrap();
        assert_eq!(volume.nonzero_count(), 2);
    }

    #[test]
    fn with_data_keeps_metadata() {
        let volume = DensityVolume::new(
            Array3::<f32>::zeros((2, 2, 2)),
            [1.0, 2.0, 3.0],
            [10.0, 20.0, 30.0],
            [-4, 5, 6],
        )
        .unwrap();
        let replaced = volume.with_data(Array3::<f32>::ones((3, 3, 3))).unwrap();
        assert_eq!(replaced.voxel_size(), [1.0, 2.0, 3.0]);
        assert_eq!(replaced.origin(), [10.0, 20.0, 30.0]);
        assert_eq!(replaced.start(), [-4, 5, 6]);
        assert_eq!(replaced.shape(), [3, 3, 3]);
    }
}
