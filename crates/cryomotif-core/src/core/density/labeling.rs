use crate::core::io::mrc::{MrcError, MrcFile};
use crate::core::io::traits::VolumeFile;
use crate::core::models::structure::AtomicStructure;
use crate::core::models::volume::DensityVolume;
use crate::core::taxonomy::structural::StructuralClass;
use nalgebra::Point3;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Converts one physical coordinate to a voxel index along the same axis.
///
/// Ties round to even. Returns `None` when the coordinate is not finite.
pub fn voxel_index(coord: f64, origin: f64, voxel_size: f64) -> Option<i64> {
    let scaled = ((coord - origin) / voxel_size).round_ties_even();
    scaled.is_finite().then_some(scaled as i64)
}

/// Voxel index of a position in `(z, y, x)` order. May lie outside the grid.
pub fn position_to_index(position: &Point3<f64>, volume: &DensityVolume) -> Option<[i64; 3]> {
    let origin = volume.origin();
    let voxel = volume.voxel_size();
    Some([
        voxel_index(position.z, origin[2], voxel[2])?,
        voxel_index(position.y, origin[1], voxel[1])?,
        voxel_index(position.x, origin[0], voxel[0])?,
    ])
}

fn in_bounds(index: [i64; 3], shape: [usize; 3]) -> Option<[usize; 3]> {
    let mut out = [0usize; 3];
    for axis in 0..3 {
        let i = index[axis];
        if i < 0 || i as usize >= shape[axis] {
            return None;
        }
        out[axis] = i as usize;
    }
    Some(out)
}

#[derive(Debug, Clone)]
pub struct LabelingOutcome {
    /// One binary volume per requested class.
    pub volumes: BTreeMap<StructuralClass, DensityVolume>,
    /// Distinct `(z, y, x)` indices of classified atoms that fell outside the grid.
    pub out_of_bounds: BTreeSet<[i64; 3]>,
    /// Classified atoms with a NaN or infinite coordinate.
    pub non_finite: usize,
    /// Classified atoms that landed inside the grid.
    pub atoms_labeled: usize,
    /// Atoms whose name is not in any requested class.
    pub atoms_ignored: usize,
}

impl LabelingOutcome {
    /// Atoms that could not be placed on the grid, counting each distinct
    /// outside voxel once.
    pub fn out_of_bounds_count(&self) -> usize {
        self.out_of_bounds.len() + self.non_finite
    }
}

/// Marks every voxel containing at least one atom of each requested class.
///
/// Label volumes share the shape, voxel size, origin and start of `density`.
/// Several atoms in one voxel leave it at 1.0.
pub fn generate_label_volumes(
    density: &DensityVolume,
    structure: &AtomicStructure,
    classes: &[StructuralClass],
) -> LabelingOutcome {
    let shape = density.shape();
    let mut volumes: BTreeMap<StructuralClass, DensityVolume> = classes
        .iter()
        .map(|&class| (class, density.zeros_like()))
        .collect();

    let mut out_of_bounds = BTreeSet::new();
    let mut non_finite = 0;
    let mut atoms_labeled = 0;
    let mut atoms_ignored = 0;

    for atom in structure.atoms() {
        let label = match StructuralClass::for_atom_name(&atom.name).and_then(|c| volumes.get_mut(&c)) {
            Some(label) => label,
            None => {
                atoms_ignored += 1;
                continue;
            }
        };

        let Some(index) = position_to_index(&atom.position, density) else {
            non_finite += 1;
            continue;
        };
        match in_bounds(index, shape) {
            Some(voxel) => {
                label.data_mut()[voxel] = 1.0;
                atoms_labeled += 1;
            }
            None => {
                out_of_bounds.insert(index);
            }
        }
    }

    LabelingOutcome {
        volumes,
        out_of_bounds,
        non_finite,
        atoms_labeled,
        atoms_ignored,
    }
}

/// `<class>_label_<stem>.mrc`
pub fn label_file_name(class: StructuralClass, stem: &str) -> String {
    format!("{}_label_{}.mrc", class.name(), stem)
}

/// Persists every label volume of `outcome` into `out_dir`.
pub fn write_label_volumes(
    outcome: &LabelingOutcome,
    out_dir: &Path,
    stem: &str,
) -> Result<Vec<PathBuf>, MrcError> {
    std::fs::create_dir_all(out_dir)?;
    let mut written = Vec::with_capacity(outcome.volumes.len());
    for (class, volume) in &outcome.volumes {
        let path = out_dir.join(label_file_name(*class, stem));
        MrcFile::write_to_path(volume, &path)?;
        written.push(path);
    }
    Ok(written)
}
