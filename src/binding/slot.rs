//! Slot - an ordered list of sources plus binding metadata

use crate::binding::SourceKey;
use crate::core::types::LodRange;

#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub sources: Vec<SourceKey>,
    /// Must hold an object for the owning substitution to validate
    pub mandatory: bool,
    /// The binding may be reassigned while the process runs
    pub variable: bool,
    pub lod: LodRange,
}

impl Slot {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            mandatory: true,
            variable: false,
            lod: LodRange::default(),
        }
    }

    pub fn with_source(source: SourceKey) -> Self {
        Self {
            sources: vec![source],
            ..Self::new()
        }
    }

    pub fn mandatory(mut self, mandatory: bool) -> Self {
        self.mandatory = mandatory;
        self
    }

    pub fn variable(mut self, variable: bool) -> Self {
        self.variable = variable;
        self
    }

    pub fn lod(mut self, lod: LodRange) -> Self {
        self.lod = lod;
        self
    }

    pub fn first(&self) -> Option<SourceKey> {
        self.sources.first().copied()
    }

    pub fn is_list(&self) -> bool {
        !self.sources.is_empty()
    }

    pub fn is_alone(&self) -> bool {
        self.sources.len() == 1
    }
}

impl Default for Slot {
    fn default() -> Self {
        Self::new()
    }
}
