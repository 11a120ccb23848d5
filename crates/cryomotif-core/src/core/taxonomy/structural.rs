use phf::{Map, phf_map};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Coarse structural role of a nucleotide atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StructuralClass {
    Backbone,
    Ribose,
    Base,
}

static ATOM_CLASSES: Map<&'static str, StructuralClass> = phf_map! {
    "P" => StructuralClass::Backbone,
    "O5'" => StructuralClass::Backbone,
    "O3'" => StructuralClass::Backbone,
    "O1P" => StructuralClass::Backbone,
    "O2P" => StructuralClass::Backbone,
    "OP1" => StructuralClass::Backbone,
    "OP2" => StructuralClass::Backbone,

    "C1'" => StructuralClass::Ribose,
    "C2'" => StructuralClass::Ribose,
    "C3'" => StructuralClass::Ribose,
    "C4'" => StructuralClass::Ribose,
    "C5'" => StructuralClass::Ribose,
    "O2'" => StructuralClass::Ribose,
    "O4'" => StructuralClass::Ribose,

    "N1" => StructuralClass::Base,
    "N2" => StructuralClass::Base,
    "N3" => StructuralClass::Base,
    "N4" => StructuralClass::Base,
    "N6" => StructuralClass::Base,
    "N7" => StructuralClass::Base,
    "N9" => StructuralClass::Base,
    "C2" => StructuralClass::Base,
    "C4" => StructuralClass::Base,
    "C5" => StructuralClass::Base,
    "C6" => StructuralClass::Base,
    "C8" => StructuralClass::Base,
    "O2" => StructuralClass::Base,
    "O4" => StructuralClass::Base,
    "O6" => StructuralClass::Base,
};

impl StructuralClass {
    pub const ALL: [StructuralClass; 3] = [
        StructuralClass::Backbone,
        StructuralClass::Ribose,
        StructuralClass::Base,
    ];

    /// Classifies an atom by name. Hydrogens and unknown names map to `None`.
    ///
    /// Names are matched exactly after trimming; `*` is accepted in place of
    /// `'` since older structure files use it for sugar primes.
    pub fn for_atom_name(name: &str) -> Option<Self> {
        let name = name.trim();
        if let Some(class) = ATOM_CLASSES.get(name) {
            return Some(*class);
        }
        if name.contains('*') {
            return ATOM_CLASSES.get(name.replace('*', "'").as_str()).copied();
        }
        None
    }

    pub fn name(&self) -> &'static str {
        match self {
            StructuralClass::Backbone => "backbone",
            StructuralClass::Ribose => "ribose",
            StructuralClass::Base => "base",
        }
    }
}

impl fmt::Display for StructuralClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown structural class '{0}' (expected backbone, ribose, sugar or base)")]
pub struct ParseStructuralClassError(pub String);

impl FromStr for StructuralClass {
    type Err = ParseStructuralClassError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "backbone" => Ok(StructuralClass::Backbone),
            "ribose" | "sugar" => Ok(StructuralClass::Ribose),
            "base" => Ok(StructuralClass::Base),
            _ => Err(ParseStructuralClassError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_atom_name_covers_each_class() {
        assert_eq!(StructuralClass::for_atom_name("P"), Some(StructuralClass::Backbone));
        assert_eq!(StructuralClass::for_atom_name("OP2"), Some(StructuralClass::Backbone));
        assert_eq!(StructuralClass::for_atom_name("C1'"), Some(StructuralClass::Ribose));
        assert_eq!(StructuralClass::for_atom_name("O4'"), Some(StructuralClass::Ribose));
        assert_eq!(StructuralClass::for_atom_name("N9"), Some(StructuralClass::Base));
        assert_eq!(StructuralClass::for_atom_name("O6"), Some(StructuralClass::Base));
    }

    #[test]
    fn for_atom_name_ignores_unlisted_atoms() {
        assert_eq!(StructuralClass::for_atom_name("H5'"), None);
        assert_eq!(StructuralClass::for_atom_name("CA"), None);
        assert_eq!(StructuralClass::for_atom_name(""), None);
    }

    #[test]
    fn for_atom_name_trims_and_accepts_star_primes() {
        assert_eq!(StructuralClass::for_atom_name(" C4' "), Some(StructuralClass::Ribose));
        assert_eq!(StructuralClass::for_atom_name("O5*"), Some(StructuralClass::Backbone));
    }

    #[test]
    fn from_str_accepts_sugar_alias_case_insensitively() {
        assert_eq!("Backbone".parse(), Ok(StructuralClass::Backbone));
        assert_eq!("sugar".parse(), Ok(StructuralClass::Ribose));
        assert_eq!("RIBOSE".parse(), Ok(StructuralClass::Ribose));
        assert_eq!("base".parse(), Ok(StructuralClass::Base));
        assert!("phosphate".parse::<StructuralClass>().is_err());
    }

    #[test]
    fn display_matches_output_file_prefix() {
        assert_eq!(StructuralClass::Backbone.to_string(), "backbone");
        assert_eq!(StructuralClass::Ribose.to_string(), "ribose");
    }
}
