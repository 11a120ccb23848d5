use crate::core::density::labeling::{generate_label_volumes, write_label_volumes};
use crate::core::density::normalize::normalize_map;
use crate::core::io::asset::{load_structure, load_volume};
use crate::core::io::mrc::MrcFile;
use crate::core::io::traits::VolumeFile;
use crate::engine::config::LabelConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct LabelResult {
    /// Written when normalization is enabled.
    pub normalized_map: Option<PathBuf>,
    pub percentile: Option<f64>,
    pub label_files: Vec<PathBuf>,
    pub atoms_labeled: usize,
    pub atoms_ignored: usize,
    /// Distinct voxel indices outside the grid plus atoms with non-finite coordinates.
    pub out_of_bounds: usize,
}

/// Rasterizes an atomic model onto the grid of a density map, one binary
/// volume per structural class.
///
/// With normalization enabled the map is first scaled to its 95th
/// percentile and written next to the labels as `<stem>_normalized.mrc`.
#[instrument(skip_all, name = "label_workflow", fields(map = %map_path.display(), structure = %structure_path.display()))]
pub fn run(
    map_path: &Path,
    structure_path: &Path,
    config: &LabelConfig,
    reporter: &ProgressReporter,
) -> Result<LabelResult, EngineError> {
    reporter.report(Progress::PhaseStart {
        name: "Loading Inputs",
    });
    let density = load_volume(map_path)?;
    let structure = load_structure(structure_path)?;
    info!(
        shape = ?density.shape(),
        atoms = structure.atom_count(),
        "Inputs loaded"
    );
    reporter.report(Progress::PhaseFinish);

    std::fs::create_dir_all(&config.output_dir).map_err(|e| EngineError::io(&config.output_dir, e))?;
    let stem = map_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "map".to_string());

    let (grid, normalized_map, percentile) = if config.normalize {
        reporter.report(Progress::PhaseStart { name: "Normalizing" });
        let outcome = normalize_map(&density);
        let path = config.output_dir.join(format!("{}_normalized.mrc", stem));
        MrcFile::write_to_path(&outcome.volume, &path).map_err(|source| EngineError::MapWrite {
            path: path.to_string_lossy().to_string(),
            source,
        })?;
        reporter.report(Progress::PhaseFinish);
        (outcome.volume, Some(path), outcome.percentile)
    } else {
        (density, None, None)
    };

    reporter.report(Progress::PhaseStart { name: "Labeling" });
    let outcome = generate_label_volumes(&grid, &structure, &config.classes);
    if outcome.out_of_bounds_count() > 0 {
        warn!(
            structure = %structure_path.display(),
            count = outcome.out_of_bounds_count(),
            "Atoms map outside the density grid and were skipped"
        );
    }
    let label_files =
        write_label_volumes(&outcome, &config.output_dir, &stem).map_err(|source| EngineError::MapWrite {
            path: config.output_dir.to_string_lossy().to_string(),
            source,
        })?;
    reporter.report(Progress::PhaseFinish);

    info!(
        labeled = outcome.atoms_labeled,
        ignored = outcome.atoms_ignored,
        files = label_files.len(),
        "Label volumes written"
    );
    Ok(LabelResult {
        normalized_map,
        percentile,
        label_files,
        atoms_labeled: outcome.atoms_labeled,
        atoms_ignored: outcome.atoms_ignored,
        out_of_bounds: outcome.out_of_bounds_count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::asset::AssetError;
    use crate::core::models::volume::DensityVolume;
    use crate::core::taxonomy::structural::StructuralClass;
    use crate::engine::config::LabelConfigBuilder;
    use ndarray::Array3;
    use std::sync::Mutex;
    use tempfile::tempdir;

    const MODEL: &str = "\
ATOM      1  P     G A   1       2.000   3.000   4.000  1.00 20.00           P
ATOM      2  C4'   G A   1       5.000   5.000   5.000  1.00 20.00           C
ATOM      3  N9    G A   1       6.000   1.000   0.000  1.00 20.00           N
ATOM      4  H1    G A   1       1.000   1.000   1.000  1.00 20.00           H
ATOM      5  OP1   G A   1      90.000   1.000   1.000  1.00 20.00           O
";

    fn inputs(dir: &Path) -> (PathBuf, PathBuf) {
        let map = dir.join("emd_1234.mrc");
        let data = Array3::from_shape_fn((8, 8, 8), |(z, y, x)| (z + y + x) as f32);
        MrcFile::write_to_path(&DensityVolume::isotropic(data, 1.0).unwrap(), &map).unwrap();
        let pdb = dir.join("model.pdb");
        std::fs::write(&pdb, MODEL).unwrap();
        (map, pdb)
    }

    #[test]
    fn labels_every_class_and_writes_normalized_map() {
        let dir = tempdir().unwrap();
        let (map, pdb) = inputs(dir.path());
        let config = LabelConfigBuilder::new()
            .output_dir(dir.path().join("labels"))
            .build()
            .unwrap();

        let phases = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::PhaseStart { name } = event {
                phases.lock().unwrap().push(name);
            }
        }));
        let result = run(&map, &pdb, &config, &reporter).unwrap();
        drop(reporter);

        assert_eq!(
            phases.into_inner().unwrap(),
            vec!["Loading Inputs", "Normalizing", "Labeling"]
        );
        assert_eq!(result.label_files.len(), 3);
        assert_eq!(result.atoms_labeled, 3);
        assert_eq!(result.atoms_ignored, 1);
        assert_eq!(result.out_of_bounds, 1);

        let normalized = result.normalized_map.unwrap();
        assert!(normalized.ends_with("emd_1234_normalized.mrc"));
        let backbone = MrcFile::read_from_path(&dir.path().join("labels").join("backbone_label_emd_1234.mrc")).unwrap();
        assert_eq!(backbone.nonzero_count(), 1);
        assert_eq!(backbone.data()[[4, 3, 2]], 1.0);
    }

    #[test]
    fn requested_classes_only_without_normalization() {
        let dir = tempdir().unwrap();
        let (map, pdb) = inputs(dir.path());
        let config = LabelConfigBuilder::new()
            .output_dir(dir.path().join("labels"))
            .classes(vec![StructuralClass::Base])
            .normalize(false)
            .build()
            .unwrap();
        let result = run(&map, &pdb, &config, &ProgressReporter::new()).unwrap();
        assert!(result.normalized_map.is_none());
        assert_eq!(result.label_files.len(), 1);
        assert!(result.label_files[0].ends_with("base_label_emd_1234.mrc"));
    }

    #[test]
    fn unreadable_structure_is_fatal() {
        let dir = tempdir().unwrap();
        let (map, _) = inputs(dir.path());
        let config = LabelConfigBuilder::new()
            .output_dir(dir.path().join("labels"))
            .build()
            .unwrap();
        let err = run(&map, &dir.path().join("absent.pdb"), &config, &ProgressReporter::new()).unwrap_err();
        assert!(matches!(err, EngineError::Asset(_)));
    }

    #[test]
    fn swapped_inputs_are_rejected_by_kind() {
        let dir = tempdir().unwrap();
        let (map, pdb) = inputs(dir.path());
        let config = LabelConfigBuilder::new()
            .output_dir(dir.path().join("labels"))
            .build()
            .unwrap();
        let err = run(&pdb, &map, &config, &ProgressReporter::new()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Asset(AssetError::WrongKind {
                expected: "density map",
                ..
            })
        ));
    }
}
