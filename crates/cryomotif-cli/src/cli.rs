use clap::{Args, Parser, Subcommand, ValueEnum};
use cryomotif::core::taxonomy::structural::StructuralClass;
use cryomotif::engine::config::GroundTruth;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "The cryomotif developers",
    version,
    about = "cryomotif - Voxel labeling of cryo-EM density maps and 3D-CNN classification of RNA structural motifs.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads used to build training batches.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scale a density map to its 95th percentile and clip it to [0, 1].
    Normalize(NormalizeArgs),
    /// Rasterize an atomic model onto a density map, one label map per structural class.
    Label(LabelArgs),
    /// Train the motif classifier from CSV manifests.
    Train(TrainArgs),
    /// Predict the motif of one or more density maps.
    Classify(ClassifyArgs),
    /// Score a checkpoint against maps sorted into one folder per motif class.
    Evaluate(EvaluateArgs),
}

#[derive(Args, Debug)]
pub struct NormalizeArgs {
    /// Input density map (.mrc, .map or .ccp4).
    #[arg(required = true, value_name = "MAP")]
    pub input: PathBuf,

    /// Output map. Defaults to `<stem>_normalized.mrc` next to the input.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct LabelArgs {
    /// Density map providing the grid.
    #[arg(required = true, value_name = "MAP")]
    pub map: PathBuf,

    /// Atomic model (.pdb or .ent).
    #[arg(required = true, value_name = "MODEL")]
    pub structure: PathBuf,

    /// Directory for the label maps. Defaults to the directory of the map.
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Structural classes to label (backbone, ribose/sugar, base).
    #[arg(long, value_name = "CLASS", value_delimiter = ',')]
    pub classes: Vec<StructuralClass>,

    /// Label the raw map instead of normalizing it first.
    #[arg(long)]
    pub no_normalize: bool,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Optional configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Training manifest (`filepath,label` CSV).
    #[arg(long, value_name = "PATH")]
    pub train_csv: Option<PathBuf>,

    /// Validation manifest (`filepath,label` CSV).
    #[arg(long, value_name = "PATH")]
    pub val_csv: Option<PathBuf>,

    /// Directory receiving one checkpoint per epoch.
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Directory for intermediate resampled maps.
    #[arg(long, value_name = "DIR")]
    pub scratch_dir: Option<PathBuf>,

    #[arg(long, value_name = "INT")]
    pub epochs: Option<usize>,

    #[arg(long, value_name = "INT")]
    pub batch_size: Option<usize>,

    #[arg(long, value_name = "FLOAT")]
    pub learning_rate: Option<f64>,

    /// Seed for weight initialization, shuffling and guided sampling.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Voxel size (Å) every map is resampled to.
    #[arg(long, value_name = "FLOAT")]
    pub target_voxel: Option<f64>,

    #[command(flatten)]
    pub guidance: Guidance,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S training.epochs=5
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Mutually exclusive flags selecting label-guided patch sampling.
#[derive(Args, Debug, Clone, Copy)]
#[group(required = false, multiple = false)]
pub struct Guidance {
    /// Centre training patches on the motif's label map when one exists.
    #[arg(long)]
    pub guided: bool,
    /// Always use centre crops, overriding the config file.
    #[arg(long)]
    pub unguided: bool,
}

#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Density maps to classify.
    #[arg(required = true, num_args = 1.., value_name = "MAP")]
    pub maps: Vec<PathBuf>,

    /// Checkpoint written by `train` (with or without the .mpk extension).
    #[arg(long, required = true, value_name = "PATH")]
    pub checkpoint: PathBuf,

    /// Configuration file whose [model] section describes the network.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[arg(long, value_name = "FLOAT")]
    pub target_voxel: Option<f64>,

    #[arg(long, value_name = "DIR")]
    pub scratch_dir: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruthSource {
    /// The class folder a map was found in.
    Folder,
    /// The motif token in the map's file name.
    Filename,
}

impl From<TruthSource> for GroundTruth {
    fn from(source: TruthSource) -> Self {
        match source {
            TruthSource::Folder => GroundTruth::Folder,
            TruthSource::Filename => GroundTruth::Filename,
        }
    }
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Folder holding one sub-folder per motif class.
    #[arg(required = true, value_name = "DIR")]
    pub root: PathBuf,

    #[arg(long, required = true, value_name = "PATH")]
    pub checkpoint: PathBuf,

    /// Configuration file whose [model] and [evaluation] sections apply.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Maximum number of maps drawn from each class folder.
    #[arg(long, value_name = "INT")]
    pub max_per_class: Option<usize>,

    /// Where the true class of each map comes from.
    #[arg(long, value_enum, value_name = "SOURCE")]
    pub truth: Option<TruthSource>,

    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    #[arg(long, value_name = "FLOAT")]
    pub target_voxel: Option<f64>,

    #[arg(long, value_name = "DIR")]
    pub scratch_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_classes_accept_comma_lists_and_aliases() {
        let cli = Cli::parse_from(["cryomotif", "label", "m.mrc", "x.pdb", "--classes", "backbone,sugar"]);
        match cli.command {
            Commands::Label(args) => {
                assert_eq!(args.classes, vec![StructuralClass::Backbone, StructuralClass::Ribose]);
                assert!(!args.no_normalize);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn guided_flags_are_mutually_exclusive() {
        let result = Cli::try_parse_from(["cryomotif", "train", "--guided", "--unguided"]);
        assert!(result.is_err());
    }

    #[test]
    fn classify_takes_several_maps_and_global_flags() {
        let cli = Cli::parse_from(["cryomotif", "classify", "a.mrc", "b.mrc", "--checkpoint", "m.mpk", "-vv", "-j", "2"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.threads, Some(2));
        match cli.command {
            Commands::Classify(args) => assert_eq!(args.maps.len(), 2),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn evaluate_parses_truth_source() {
        let cli = Cli::parse_from(["cryomotif", "evaluate", "eval", "--checkpoint", "m", "--truth", "filename"]);
        match cli.command {
            Commands::Evaluate(args) => assert_eq!(args.truth, Some(TruthSource::Filename)),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
