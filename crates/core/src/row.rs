//! Row structure for Lumen.
//!
//! A `Row` is the committed attribute state of one entity. The store hands
//! rows out behind `Rc` and never mutates one in place, so a row observed by a
//! reader is always a consistent, committed snapshot.

use crate::value::Value;
use alloc::vec::Vec;

/// Stable identity (primary key) of an entity within its kind.
pub type RowId = u64;

/// The attribute values of one entity.
#[derive(Clone, Debug)]
pub struct Row {
    /// Stable identity of the entity.
    id: RowId,
    /// Incremented by the store on every committed update.
    version: u64,
    /// Values indexed by column position.
    values: Vec<Value>,
}

impl Row {
    /// Creates a new row with the given identity and values. Version starts at 1.
    pub fn new(id: RowId, values: Vec<Value>) -> Self {
        Self { id, version: 1, values }
    }

    /// Creates a new row with the given identity, version, and values.
    pub fn new_with_version(id: RowId, version: u64, values: Vec<Value>) -> Self {
        Self { id, version, values }
    }

    #[inline]
    pub fn id(&self) -> RowId {
        self.id
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[inline]
    pub fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Gets a value at the given column index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Sets a value at the given column index.
    pub fn set(&mut self, index: usize, value: Value) -> bool {
        if index < self.values.len() {
            self.values[index] = value;
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns true if both rows hold the same attribute values,
    /// regardless of identity and version.
    pub fn same_values(&self, other: &Row) -> bool {
        self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(other.values.iter())
                .all(|(a, b)| a.data_type() == b.data_type() && a == b)
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.same_values(other)
    }
}
