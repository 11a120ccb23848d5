use super::ids::ResidueId;
use nalgebra::Point3;

/// A single atom record of an atomic structure.
///
/// Positions are in Angstroms, expressed in the same reference frame as the
/// origin of the density maps the structure is labeled against.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// The atom name as written in the structure file (e.g. "P", "C1'").
    pub name: String,
    /// Element symbol, upper-cased. Empty when the source file omits it.
    pub element: String,
    /// Serial number from the source file.
    pub serial: usize,
    /// The ID of the parent residue this atom belongs to.
    pub residue_id: ResidueId,
    /// The 3D coordinates of the atom in Angstroms.
    pub position: Point3<f64>,
}

impl Atom {
    /// Creates a new `Atom` with an empty element and serial `0`.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the atom.
    /// * `residue_id` - The ID of the residue this atom belongs to.
    /// * `position` - The 3D coordinates of the atom.
    pub fn new(name: &str, residue_id: ResidueId, position: Point3<f64>) -> Self {
        Self {
            name: name.to_string(),
            element: String::new(),
            serial: 0,
            residue_id,
            position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_atom_has_expected_default_fields() {
        let residue_id = ResidueId::default();
        let atom = Atom::new("P", residue_id, Point3::new(1.0, 2.0, 3.0));

        assert_eq!(atom.name, "P");
        assert_eq!(atom.residue_id, residue_id);
        assert_eq!(atom.position, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(atom.element, "");
        assert_eq!(atom.serial, 0);
    }
}
