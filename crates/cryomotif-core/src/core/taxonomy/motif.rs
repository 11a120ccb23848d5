use phf::{Map, phf_map};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Coarse RNA structural motif used as the classifier's target.
///
/// The discriminant is the network output index and must never change for
/// a trained checkpoint to stay valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotifLabel {
    SymmetricLoop = 0,
    Bulge = 1,
    Hairpin = 2,
    AsymmetricLoop = 3,
    Unknown = 4,
}

static FINE_MOTIFS: Map<&'static str, MotifLabel> = phf_map! {
    "1x1" => MotifLabel::SymmetricLoop,
    "2x2" => MotifLabel::SymmetricLoop,
    "3x3" => MotifLabel::SymmetricLoop,
    "4x4" => MotifLabel::SymmetricLoop,
    "5x5" => MotifLabel::SymmetricLoop,

    "bulge1" => MotifLabel::Bulge,
    "bulge2" => MotifLabel::Bulge,
    "bulge3" => MotifLabel::Bulge,
    "bulge4" => MotifLabel::Bulge,
    "bulge5" => MotifLabel::Bulge,

    "hairpin3" => MotifLabel::Hairpin,
    "hairpin4" => MotifLabel::Hairpin,
    "hairpin5" => MotifLabel::Hairpin,
    "hairpin6" => MotifLabel::Hairpin,
    "hairpin7" => MotifLabel::Hairpin,

    "1x2" => MotifLabel::AsymmetricLoop,
    "1x3" => MotifLabel::AsymmetricLoop,
    "1x4" => MotifLabel::AsymmetricLoop,
    "1x5" => MotifLabel::AsymmetricLoop,
    "2x3" => MotifLabel::AsymmetricLoop,
    "2x4" => MotifLabel::AsymmetricLoop,
    "2x5" => MotifLabel::AsymmetricLoop,
    "3x4" => MotifLabel::AsymmetricLoop,
    "3x5" => MotifLabel::AsymmetricLoop,
    "4x5" => MotifLabel::AsymmetricLoop,

    "unknown" => MotifLabel::Unknown,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MotifLabelError {
    #[error("Unknown motif label '{0}'")]
    UnknownName(String),
    #[error("Motif index {0} is out of range")]
    IndexOutOfRange(usize),
}

impl MotifLabel {
    pub const ALL: [MotifLabel; 5] = [
        MotifLabel::SymmetricLoop,
        MotifLabel::Bulge,
        MotifLabel::Hairpin,
        MotifLabel::AsymmetricLoop,
        MotifLabel::Unknown,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Result<Self, MotifLabelError> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or(MotifLabelError::IndexOutOfRange(index))
    }

    /// The coarse class name, also used as the evaluation folder name.
    pub fn name(self) -> &'static str {
        match self {
            MotifLabel::SymmetricLoop => "symmetricloop",
            MotifLabel::Bulge => "bulge",
            MotifLabel::Hairpin => "hairpin",
            MotifLabel::AsymmetricLoop => "asymmetricloop",
            MotifLabel::Unknown => "unknown",
        }
    }

    /// Maps a fine-grained motif name (`2x2`, `bulge3`, `hairpin5`, `1x4`, ...)
    /// onto the coarse taxonomy.
    pub fn from_fine_motif(name: &str) -> Result<Self, MotifLabelError> {
        FINE_MOTIFS
            .get(name.trim().to_ascii_lowercase().as_str())
            .copied()
            .ok_or_else(|| MotifLabelError::UnknownName(name.to_string()))
    }

    /// Parses either a coarse class name or a fine motif name.
    pub fn parse_any(name: &str) -> Result<Self, MotifLabelError> {
        name.parse().or_else(|_| Self::from_fine_motif(name))
    }

    /// Reads the motif from a file name of the form `<a>_<b>_<motif>_...`.
    ///
    /// Returns `None` when the base name has fewer than three `_`-separated
    /// tokens. A third token that is not a known fine motif yields
    /// [`MotifLabel::Unknown`].
    pub fn from_filename(path: &Path) -> Option<Self> {
        let stem = path.file_stem()?.to_str()?;
        let token = stem.split('_').nth(2)?;
        Some(Self::from_fine_motif(token).unwrap_or(MotifLabel::Unknown))
    }
}

impl fmt::Display for MotifLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MotifLabel {
    type Err = MotifLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|label| label.name() == lowered)
            .ok_or_else(|| MotifLabelError::UnknownName(s.to_string()))
    }
}
