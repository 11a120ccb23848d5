use super::ids::{ChainId, ModelId, ResidueId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    pub id: char,                        // Chain identifier (e.g., 'A', 'B')
    pub model_id: ModelId,               // ID of the parent model
    pub(crate) residues: Vec<ResidueId>, // Ordered list of residues belonging to this chain
}

impl Chain {
    pub(crate) fn new(id: char, model_id: ModelId) -> Self {
        Self {
            id,
            model_id,
            residues: Vec::new(),
        }
    }

    pub fn residues(&self) -> &[ResidueId] {
        &self.residues
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    pub number: usize,                 // MODEL serial; 1 when the file has no MODEL records
    pub(crate) chains: Vec<ChainId>,   // Ordered list of chains in this model
}

impl Model {
    pub(crate) fn new(number: usize) -> Self {
        Self {
            number,
            chains: Vec::new(),
        }
    }

    pub fn chains(&self) -> &[ChainId] {
        &self.chains
    }
}
