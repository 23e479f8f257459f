//! Change events emitted by results controllers.
//!
//! Delete positions (and move sources) address the snapshot as it was before
//! the batch; insert and update positions (and move destinations) address the
//! snapshot after it.

use crate::section::IndexPath;
use alloc::string::String;

/// A row-level change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectChange {
    Insert { new_index_path: IndexPath },
    Delete { index_path: IndexPath },
    Update { index_path: IndexPath },
    Move { from: IndexPath, to: IndexPath },
}

impl ObjectChange {
    pub fn is_insert(&self) -> bool {
        matches!(self, ObjectChange::Insert { .. })
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, ObjectChange::Delete { .. })
    }

    pub fn is_update(&self) -> bool {
        matches!(self, ObjectChange::Update { .. })
    }

    pub fn is_move(&self) -> bool {
        matches!(self, ObjectChange::Move { .. })
    }
}

/// A section-level change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SectionChange {
    Insert { index: usize, name: String },
    Delete { index: usize, name: String },
}

impl SectionChange {
    pub fn index(&self) -> usize {
        match self {
            SectionChange::Insert { index, .. } | SectionChange::Delete { index, .. } => *index,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SectionChange::Insert { name, .. } | SectionChange::Delete { name, .. } => name,
        }
    }
}
