//! Possession stack.
//!
//! A speculative history, not a set: entries are pushed as possessions start
//! and only the most recent one may be retracted, by matching its id.

use crate::events::Possession;
use crate::types::ObservationId;

#[derive(Debug, Clone, Default)]
pub struct PossessionStack {
    entries: Vec<Possession>,
}

impl PossessionStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, possession: Possession) {
        self.entries.push(possession);
    }

    /// Pop the top entry only if its id is `id`.
    pub fn pop_if_top(&mut self, id: &ObservationId) -> Option<Possession> {
        match self.entries.last() {
            Some(top) if &top.id == id => self.entries.pop(),
            _ => None,
        }
    }

    /// Current possession.
    pub fn top(&self) -> Option<&Possession> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Possession> {
        self.entries.iter()
    }
}
