use ndarray::{Array3, Zip, s};

/// Edge length of the cubic patches fed to the classifier.
pub const PATCH_SIZE: usize = 64;

/// Overlap of `[start, start + len)` with `[0, n)`, as `(src_start, dst_start, count)`.
fn overlap(start: i64, len: usize, n: usize) -> Option<(usize, usize, usize)> {
    let lo = start.max(0);
    let hi = (start + len as i64).min(n as i64);
    if hi <= lo {
        return None;
    }
    Some((lo as usize, (lo - start) as usize, (hi - lo) as usize))
}

/// Cuts a `size³` cube centred on `center` (array index order), zero-filling
/// whatever falls outside the volume.
///
/// The window along each axis is `[c - size/2, c - size/2 + size)`, so the
/// output shape is exact for any input shape and any center.
pub fn extract_patch(volume: &Array3<f32>, center: [usize; 3], size: usize) -> Array3<f32> {
    let mut patch = Array3::<f32>::zeros((size, size, size));
    let (d0, d1, d2) = volume.dim();
    let half = (size / 2) as i64;

    let ranges = (
        overlap(center[0] as i64 - half, size, d0),
        overlap(center[1] as i64 - half, size, d1),
        overlap(center[2] as i64 - half, size, d2),
    );
    if let (Some((s0, p0, n0)), Some((s1, p1, n1)), Some((s2, p2, n2))) = ranges {
        patch
            .slice_mut(s![p0..p0 + n0, p1..p1 + n1, p2..p2 + n2])
            .assign(&volume.slice(s![s0..s0 + n0, s1..s1 + n1, s2..s2 + n2]));
    }
    patch
}

/// [`extract_patch`] around `shape / 2`.
pub fn center_crop(volume: &Array3<f32>, size: usize) -> Array3<f32> {
    let (d0, d1, d2) = volume.dim();
    extract_patch(volume, [d0 / 2, d1 / 2, d2 / 2], size)
}

/// `(v - mean) / (std + 1e-6)` with the population standard deviation.
pub fn zscore(volume: &Array3<f32>) -> Array3<f32> {
    if volume.is_empty() {
        return volume.clone();
    }
    let n = volume.len() as f64;
    let mean = volume.iter().map(|&v| v as f64).sum::<f64>() / n;
    let variance = volume.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
    let denom = variance.sqrt() + 1e-6;
    volume.mapv(|v| ((v as f64 - mean) / denom) as f32)
}

/// Zero-pads `volume` to `target`, splitting the padding evenly with the
/// extra voxel (if any) on the far side. Axes already at least as large
/// are left alone.
pub fn pad_to_shape(volume: &Array3<f32>, target: [usize; 3]) -> Array3<f32> {
    let (d0, d1, d2) = volume.dim();
    let dims = [d0, d1, d2];
    let shape = [
        target[0].max(d0),
        target[1].max(d1),
        target[2].max(d2),
    ];
    let before: Vec<usize> = (0..3).map(|axis| (shape[axis] - dims[axis]) / 2).collect();

    let mut padded = Array3::<f32>::zeros((shape[0], shape[1], shape[2]));
    padded
        .slice_mut(s![
            before[0]..before[0] + d0,
            before[1]..before[1] + d1,
            before[2]..before[2] + d2
        ])
        .assign(volume);
    padded
}

/// Pads two volumes to their per-axis maximum shape.
pub fn pad_to_same_box(a: &Array3<f32>, b: &Array3<f32>) -> (Array3<f32>, Array3<f32>) {
    let (a0, a1, a2) = a.dim();
    let (b0, b1, b2) = b.dim();
    let target = [a0.max(b0), a1.max(b1), a2.max(b2)];
    (pad_to_shape(a, target), pad_to_shape(b, target))
}

/// Keeps density only where `label > 0`.
///
/// Both arrays must share a shape; see [`pad_to_same_box`].
pub fn mask_outside(density: &Array3<f32>, label: &Array3<f32>) -> Array3<f32> {
    let mut masked = density.clone();
    Zip::from(&mut masked).and(label).for_each(|d, &l| {
        if l <= 0.0 {
            *d = 0.0;
        }
    });
    masked
}

/// Indices of every voxel with a positive value, in array order.
pub fn positive_voxels(volume: &Array3<f32>) -> Vec<[usize; 3]> {
    volume
        .indexed_iter()
        .filter(|(_, v)| **v > 0.0)
        .map(|((i, j, k), _)| [i, j, k])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_shape_is_exact_for_any_input_and_center() {
        let shapes = [(10, 20, 5), (64, 64, 64), (100, 3, 70), (1, 1, 1)];
        let centers = [[0, 0, 0], [5, 10, 2], [99, 2, 69], [500, 500, 500]];
        for &(d0, d1, d2) in &shapes {
            let volume = Array3::<f32>::ones((d0, d1, d2));
            for &center in &centers {
                let patch = extract_patch(&volume, center, PATCH_SIZE);
                assert_eq!(patch.dim(), (64, 64, 64));
            }
            assert_eq!(center_crop(&volume, PATCH_SIZE).dim(), (64, 64, 64));
        }
    }

    #[test]
    fn centered_crop_of_full_cube_is_all_ones() {
        let volume = Array3::<f32>::ones((64, 64, 64));
        let patch = center_crop(&volume, PATCH_SIZE);
        assert!(patch.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn off_center_patch_pads_only_true_edges() {
        let volume = Array3::<f32>::ones((64, 64, 64));
        let patch = extract_patch(&volume, [0, 32, 63], PATCH_SIZE);
        // Axis 0 starts at -32: first 32 planes are outside the volume.
        assert!(patch.slice(s![..32, .., ..]).iter().all(|&v| v == 0.0));
        // Axis 2 window is [31, 95): only the first 33 columns are inside.
        assert!(patch.slice(s![32.., .., ..33]).iter().all(|&v| v == 1.0));
        assert!(patch.slice(s![32.., .., 33..]).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn patch_copies_values_at_matching_offsets() {
        let volume = Array3::from_shape_fn((70, 70, 70), |(i, j, k)| (i * 10_000 + j * 100 + k) as f32);
        let patch = extract_patch(&volume, [40, 35, 50], PATCH_SIZE);
        // Patch (0, 0, 0) corresponds to volume (8, 3, 18).
        assert_eq!(patch[[0, 0, 0]], volume[[8, 3, 18]]);
        assert_eq!(patch[[32, 32, 32]], volume[[40, 35, 50]]);
        // Volume axis 2 ends at 69 = patch index 51.
        assert_eq!(patch[[1, 1, 51]], volume[[9, 4, 69]]);
        assert_eq!(patch[[1, 1, 52]], 0.0);
    }

    #[test]
    fn zscore_has_zero_mean_and_unit_std() {
        let volume = Array3::from_shape_fn((4, 5, 6), |(i, j, k)| (i * 3 + j * 7 + k) as f32);
        let z = zscore(&volume);
        let n = z.len() as f32;
        let mean = z.sum() / n;
        let std = (z.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n).sqrt();
        assert!(mean.abs() < 1e-5);
        assert!((std - 1.0).abs() < 1e-4);
    }

    #[test]
    fn zscore_of_constant_volume_is_zero() {
        let z = zscore(&Array3::from_elem((3, 3, 3), 4.2));
        assert!(z.iter().all(|&v| v.abs() < 1e-3));
    }

    #[test]
    fn pad_to_same_box_centers_both_inputs() {
        let a = Array3::<f32>::ones((10, 12, 14));
        let b = Array3::from_elem((14, 10, 12), 2.0);
        let (pa, pb) = pad_to_same_box(&a, &b);
        assert_eq!(pa.dim(), (14, 12, 14));
        assert_eq!(pb.dim(), (14, 12, 14));

        // a: 4 extra planes on axis 0, split 2 / 2.
        assert!(pa.slice(s![2..12, .., ..]).iter().all(|&v| v == 1.0));
        assert!(pa.slice(s![..2, .., ..]).iter().all(|&v| v == 0.0));
        assert!(pa.slice(s![12.., .., ..]).iter().all(|&v| v == 0.0));
        assert_eq!(pa.sum(), a.sum());

        // b: 2 extra on axes 1 and 2, split 1 / 1.
        assert!(pb.slice(s![.., 1..11, 1..13]).iter().all(|&v| v == 2.0));
        assert_eq!(pb.sum(), b.sum());
    }

    #[test]
    fn odd_padding_puts_remainder_after() {
        let a = Array3::<f32>::ones((1, 1, 1));
        let padded = pad_to_shape(&a, [4, 1, 1]);
        assert_eq!(padded.dim(), (4, 1, 1));
        assert_eq!(padded[[1, 0, 0]], 1.0);
        assert_eq!(padded[[0, 0, 0]], 0.0);
        assert_eq!(padded[[2, 0, 0]], 0.0);
    }

    #[test]
    fn mask_keeps_density_inside_label_only() {
        let density = Array3::from_elem((2, 2, 2), 3.0);
        let mut label = Array3::<f32>::zeros((2, 2, 2));
        label[[0, 1, 1]] = 1.0;
        let masked = mask_outside(&density, &label);
        assert_eq!(masked.sum(), 3.0);
        assert_eq!(masked[[0, 1, 1]], 3.0);
        assert_eq!(positive_voxels(&label), vec![[0, 1, 1]]);
    }
}
