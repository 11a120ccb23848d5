use super::atom::Atom;
use super::chain::{Chain, Model};
use super::ids::{AtomId, ChainId, ModelId, ResidueId};
use super::residue::Residue;
use nalgebra::Point3;
use slotmap::SlotMap;
use std::collections::HashMap;

/// A parsed atomic model with its model → chain → residue → atom hierarchy.
///
/// Storage is flat (one slot map per level) and the hierarchy is kept as
/// ordered id lists on each parent, so iteration order always follows the
/// order of the source file. Structures are built once through
/// [`StructureBuilder`] and are read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct AtomicStructure {
    /// Primary storage for models.
    models: SlotMap<ModelId, Model>,
    /// Primary storage for chains.
    chains: SlotMap<ChainId, Chain>,
    /// Primary storage for residues.
    residues: SlotMap<ResidueId, Residue>,
    /// Primary storage for atoms.
    atoms: SlotMap<AtomId, Atom>,
    /// Models in file order.
    model_order: Vec<ModelId>,
}

impl AtomicStructure {
    /// Creates a new, empty structure.
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieves a model by its ID.
    pub fn model(&self, id: ModelId) -> Option<&Model> {
        self.models.get(id)
    }

    /// Retrieves a chain by its ID.
    pub fn chain(&self, id: ChainId) -> Option<&Chain> {
        self.chains.get(id)
    }

    /// Retrieves a residue by its ID.
    pub fn residue(&self, id: ResidueId) -> Option<&Residue> {
        self.residues.get(id)
    }

    /// Retrieves an atom by its ID.
    pub fn atom(&self, id: AtomId) -> Option<&Atom> {
        self.atoms.get(id)
    }

    /// Returns the models in file order.
    pub fn models(&self) -> impl Iterator<Item = (ModelId, &Model)> {
        self.model_order
            .iter()
            .filter_map(|&id| self.models.get(id).map(|m| (id, m)))
    }

    /// Returns the chains of a model in file order.
    pub fn chains_of(&self, model_id: ModelId) -> impl Iterator<Item = (ChainId, &Chain)> {
        self.models
            .get(model_id)
            .map(|m| m.chains.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(|&id| self.chains.get(id).map(|c| (id, c)))
    }

    /// Returns the residues of a chain in file order.
    pub fn residues_of(&self, chain_id: ChainId) -> impl Iterator<Item = (ResidueId, &Residue)> {
        self.chains
            .get(chain_id)
            .map(|c| c.residues.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(|&id| self.residues.get(id).map(|r| (id, r)))
    }

    /// Returns the atoms of a residue in file order.
    pub fn atoms_of(&self, residue_id: ResidueId) -> impl Iterator<Item = (AtomId, &Atom)> {
        self.residues
            .get(residue_id)
            .map(|r| r.atoms.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(|&id| self.atoms.get(id).map(|a| (id, a)))
    }

    /// Walks the full hierarchy and yields every atom in file order.
    pub fn atoms(&self) -> impl Iterator<Item = &Atom> {
        self.models().flat_map(move |(model_id, _)| {
            self.chains_of(model_id).flat_map(move |(chain_id, _)| {
                self.residues_of(chain_id)
                    .flat_map(move |(residue_id, _)| self.atoms_of(residue_id).map(|(_, a)| a))
            })
        })
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }

    pub fn residue_count(&self) -> usize {
        self.residues.len()
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }
}

/// Incremental builder used by the structure readers.
///
/// Missing parents are created on demand: adding a chain before any model
/// opens model 1, and adding an atom before any residue opens an unnamed
/// residue, so the reader never has to special-case sparse files.
pub struct StructureBuilder {
    structure: AtomicStructure,

    current_model: Option<ModelId>,
    current_chain: Option<ChainId>,
    current_residue: Option<ResidueId>,
    chain_map: HashMap<(ModelId, char), ChainId>,
    residue_map: HashMap<(ChainId, isize, Option<char>), ResidueId>,
}

impl Default for StructureBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StructureBuilder {
    pub fn new() -> Self {
        Self {
            structure: AtomicStructure::new(),
            current_model: None,
            current_chain: None,
            current_residue: None,
            chain_map: HashMap::new(),
            residue_map: HashMap::new(),
        }
    }

    pub fn start_model(&mut self, number: usize) -> &mut Self {
        self.open_model(number);
        self
    }

    pub fn start_chain(&mut self, id: char) -> &mut Self {
        self.open_chain(id);
        self
    }

    pub fn start_residue(
        &mut self,
        number: isize,
        insertion_code: Option<char>,
        name: &str,
    ) -> &mut Self {
        self.open_residue(number, insertion_code, name);
        self
    }

    fn open_model(&mut self, number: usize) -> ModelId {
        let id = self.structure.models.insert(Model::new(number));
        self.structure.model_order.push(id);
        self.current_model = Some(id);
        self.current_chain = None;
        self.current_residue = None;
        id
    }

    fn open_chain(&mut self, id: char) -> ChainId {
        let model_id = match self.current_model {
            Some(m) => m,
            None => self.open_model(1),
        };

        let structure = &mut self.structure;
        let chain_id = *self.chain_map.entry((model_id, id)).or_insert_with(|| {
            let chain_id = structure.chains.insert(Chain::new(id, model_id));
            if let Some(model) = structure.models.get_mut(model_id) {
                model.chains.push(chain_id);
            }
            chain_id
        });
        self.current_chain = Some(chain_id);
        self.current_residue = None;
        chain_id
    }

    fn open_residue(&mut self, number: isize, insertion_code: Option<char>, name: &str) -> ResidueId {
        let chain_id = match self.current_chain {
            Some(c) => c,
            None => self.open_chain(' '),
        };

        let structure = &mut self.structure;
        let residue_id = *self
            .residue_map
            .entry((chain_id, number, insertion_code))
            .or_insert_with(|| {
                let residue_id = structure
                    .residues
                    .insert(Residue::new(number, insertion_code, name, chain_id));
                if let Some(chain) = structure.chains.get_mut(chain_id) {
                    chain.residues.push(residue_id);
                }
                residue_id
            });
        self.current_residue = Some(residue_id);
        residue_id
    }

    pub fn add_atom(
        &mut self,
        serial: usize,
        name: &str,
        element: &str,
        position: Point3<f64>,
    ) -> &mut Self {
        let residue_id = match self.current_residue {
            Some(r) => r,
            None => self.open_residue(0, None, ""),
        };

        let mut atom = Atom::new(name, residue_id, position);
        atom.serial = serial;
        atom.element = element.to_ascii_uppercase();

        let atom_id = self.structure.atoms.insert(atom);
        if let Some(residue) = self.structure.residues.get_mut(residue_id) {
            residue.add_atom(name, atom_id);
        }
        self
    }

    pub fn build(self) -> AtomicStructure {
        self.structure
    }
}
