//! Name undo data for chain reorganizations.
//!
//! When a block is connected, the previous record of every name it touches is
//! saved, so that disconnecting the block restores the registry exactly.

use nameforge_primitives::{Name, NameRecord};
use serde::{Deserialize, Serialize};

/// Undo data for a single block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameUndo {
    /// Height of the block this undo data belongs to.
    pub height: u32,

    /// Names touched by the block in application order, along with their
    /// record before the block. `None` marks a registration.
    pub previous: Vec<(Name, Option<NameRecord>)>,
}

impl NameUndo {
    pub fn new(height: u32) -> Self {
        Self {
            height,
            previous: Vec::new(),
        }
    }

    /// Record the state of `name` before it got registered or updated.
    pub fn record(&mut self, name: Name, previous: Option<NameRecord>) {
        self.previous.push((name, previous));
    }

    /// Returns the number of name operations recorded.
    pub fn len(&self) -> usize {
        self.previous.len()
    }

    /// Returns true if the block touched no name.
    pub fn is_empty(&self) -> bool {
        self.previous.is_empty()
    }
}
