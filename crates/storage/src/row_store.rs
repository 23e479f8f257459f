//! Row storage for one entity kind.

use alloc::rc::Rc;
use alloc::vec::Vec;
use lumen_core::schema::Table;
use lumen_core::{Error, Result, Row, RowId};

/// Identity map backend: HashMap (O(1) lookup) or BTreeMap (ordered scans).
#[cfg(feature = "hash-store")]
type RowMap = hashbrown::HashMap<RowId, Rc<Row>>;
#[cfg(not(feature = "hash-store"))]
type RowMap = alloc::collections::BTreeMap<RowId, Rc<Row>>;

/// Committed rows of a single entity kind.
///
/// Rows are immutable once stored; an update swaps in a new `Rc<Row>` so
/// readers holding the previous one keep a consistent snapshot.
pub struct RowStore {
    schema: Rc<Table>,
    rows: RowMap,
}

impl RowStore {
    pub fn new(schema: Table) -> Self {
        Self {
            schema: Rc::new(schema),
            rows: RowMap::default(),
        }
    }

    pub fn schema(&self) -> &Rc<Table> {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, row_id: RowId) -> bool {
        self.rows.contains_key(&row_id)
    }

    pub fn get(&self, row_id: RowId) -> Option<Rc<Row>> {
        self.rows.get(&row_id).cloned()
    }

    /// Inserts a new entity. The row is validated against the schema and its
    /// version reset to 1.
    pub fn insert(&mut self, row: Row) -> Result<Rc<Row>> {
        self.schema.validate_row(&row)?;
        let row_id = row.id();
        if self.rows.contains_key(&row_id) {
            return Err(Error::duplicate_id(self.schema.name(), row_id));
        }
        let row = Rc::new(Row::new(row_id, row.values().to_vec()));
        self.rows.insert(row_id, row.clone());
        Ok(row)
    }

    /// Replaces an entity's attributes, bumping its version.
    /// Returns `(old, new)`; both are the stored row when nothing changed.
    pub fn update(&mut self, row: Row) -> Result<(Rc<Row>, Rc<Row>)> {
        self.schema.validate_row(&row)?;
        let row_id = row.id();
        let old = self
            .rows
            .get(&row_id)
            .cloned()
            .ok_or_else(|| Error::not_found(self.schema.name(), row_id))?;
        if old.same_values(&row) {
            return Ok((old.clone(), old));
        }
        let new = Rc::new(Row::new_with_version(
            row_id,
            old.version().wrapping_add(1),
            row.values().to_vec(),
        ));
        self.rows.insert(row_id, new.clone());
        Ok((old, new))
    }

    /// Removes an entity, returning its last committed state.
    pub fn delete(&mut self, row_id: RowId) -> Result<Rc<Row>> {
        self.rows
            .remove(&row_id)
            .ok_or_else(|| Error::not_found(self.schema.name(), row_id))
    }

    /// Puts back a previously stored row verbatim (used to undo a failed commit).
    pub(crate) fn restore(&mut self, row: Rc<Row>) {
        self.rows.insert(row.id(), row);
    }

    /// Removes a row without reporting a missing identity.
    pub(crate) fn discard(&mut self, row_id: RowId) {
        self.rows.remove(&row_id);
    }

    /// Returns all rows in ascending identity order.
    pub fn scan(&self) -> Vec<Rc<Row>> {
        #[allow(unused_mut)]
        let mut rows: Vec<Rc<Row>> = self.rows.values().cloned().collect();
        #[cfg(feature = "hash-store")]
        rows.sort_by_key(|r| r.id());
        rows
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }
}
