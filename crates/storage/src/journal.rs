//! Write journal and coalesced change batches.
//!
//! A `Journal` buffers the writes of an open transaction in issue order. At
//! commit they are applied to the `TableCache` and folded into one `TableDiff`
//! per entity kind; the diffs together form the `ChangeBatch` delivered to
//! observers.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use lumen_core::{Row, RowId};

/// A buffered write.
#[derive(Clone, Debug)]
pub enum JournalEntry {
    /// Create a new entity; fails on commit if the identity exists.
    Insert { table: String, row: Row },
    /// Replace an existing entity's attributes; fails on commit if missing.
    Update { table: String, row: Row },
    /// Insert or replace.
    Upsert { table: String, row: Row },
    /// Remove an entity; fails on commit if missing.
    Delete { table: String, row_id: RowId },
}

impl JournalEntry {
    pub fn table(&self) -> &str {
        match self {
            JournalEntry::Insert { table, .. }
            | JournalEntry::Update { table, .. }
            | JournalEntry::Upsert { table, .. }
            | JournalEntry::Delete { table, .. } => table,
        }
    }

    pub fn row_id(&self) -> RowId {
        match self {
            JournalEntry::Insert { row, .. }
            | JournalEntry::Update { row, .. }
            | JournalEntry::Upsert { row, .. } => row.id(),
            JournalEntry::Delete { row_id, .. } => *row_id,
        }
    }
}

/// Buffered writes of one transaction, in issue order.
#[derive(Debug, Default)]
pub struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn record(&mut self, entry: JournalEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hands the buffered entries over for application, leaving the journal empty.
    pub fn take(&mut self) -> Vec<JournalEntry> {
        core::mem::take(&mut self.entries)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// The net change to a single entity within a batch.
#[derive(Clone, Debug)]
pub enum RowChange {
    Inserted(Rc<Row>),
    Updated { old: Rc<Row>, new: Rc<Row> },
    Deleted(Rc<Row>),
}

impl RowChange {
    pub fn row_id(&self) -> RowId {
        match self {
            RowChange::Inserted(row) | RowChange::Deleted(row) => row.id(),
            RowChange::Updated { new, .. } => new.id(),
        }
    }
}

/// Net changes to one entity kind, coalesced per identity.
///
/// Each identity appears in at most one of the three sets:
/// - insert then delete cancels out
/// - insert then update stays an insert carrying the newest row
/// - update then update keeps the first old row and the last new row
/// - delete then insert becomes an update
#[derive(Clone, Debug, Default)]
pub struct TableDiff {
    table_name: String,
    inserted: BTreeMap<RowId, Rc<Row>>,
    updated: BTreeMap<RowId, (Rc<Row>, Rc<Row>)>,
    deleted: BTreeMap<RowId, Rc<Row>>,
}

impl TableDiff {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            inserted: BTreeMap::new(),
            updated: BTreeMap::new(),
            deleted: BTreeMap::new(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Records an insertion.
    pub fn insert(&mut self, row: Rc<Row>) {
        let row_id = row.id();
        if let Some(old) = self.deleted.remove(&row_id) {
            self.updated.insert(row_id, (old, row));
        } else {
            self.inserted.insert(row_id, row);
        }
    }

    /// Records an update.
    pub fn update(&mut self, old: Rc<Row>, new: Rc<Row>) {
        let row_id = new.id();
        if self.inserted.contains_key(&row_id) {
            self.inserted.insert(row_id, new);
        } else if let Some(entry) = self.updated.get_mut(&row_id) {
            entry.1 = new;
        } else {
            self.updated.insert(row_id, (old, new));
        }
    }

    /// Records a deletion.
    pub fn delete(&mut self, row: Rc<Row>) {
        let row_id = row.id();
        if self.inserted.remove(&row_id).is_some() {
            return;
        }
        match self.updated.remove(&row_id) {
            Some((original, _)) => self.deleted.insert(row_id, original),
            None => self.deleted.insert(row_id, row),
        };
    }

    /// Drops updates whose net effect leaves every attribute unchanged.
    pub fn prune_noop_updates(&mut self) {
        self.updated.retain(|_, (old, new)| !old.same_values(new));
    }

    pub fn inserted(&self) -> &BTreeMap<RowId, Rc<Row>> {
        &self.inserted
    }

    pub fn updated(&self) -> &BTreeMap<RowId, (Rc<Row>, Rc<Row>)> {
        &self.updated
    }

    pub fn deleted(&self) -> &BTreeMap<RowId, Rc<Row>> {
        &self.deleted
    }

    /// Net change for one identity, if it was touched by this batch.
    pub fn change_for(&self, row_id: RowId) -> Option<RowChange> {
        if let Some(row) = self.inserted.get(&row_id) {
            return Some(RowChange::Inserted(row.clone()));
        }
        if let Some((old, new)) = self.updated.get(&row_id) {
            return Some(RowChange::Updated {
                old: old.clone(),
                new: new.clone(),
            });
        }
        self.deleted
            .get(&row_id)
            .map(|row| RowChange::Deleted(row.clone()))
    }

    /// All net changes, in identity order within each category.
    pub fn changes(&self) -> Vec<RowChange> {
        let mut out = Vec::with_capacity(self.len());
        out.extend(self.deleted.values().cloned().map(RowChange::Deleted));
        out.extend(self.inserted.values().cloned().map(RowChange::Inserted));
        out.extend(self.updated.values().map(|(old, new)| RowChange::Updated {
            old: old.clone(),
            new: new.clone(),
        }));
        out
    }

    /// Identities touched by this diff.
    pub fn affected_ids(&self) -> Vec<RowId> {
        let mut ids: Vec<RowId> = self
            .inserted
            .keys()
            .chain(self.updated.keys())
            .chain(self.deleted.keys())
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.inserted.len() + self.updated.len() + self.deleted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// All net changes of one committed transaction, keyed by entity kind.
#[derive(Clone, Debug, Default)]
pub struct ChangeBatch {
    diffs: BTreeMap<String, TableDiff>,
}

impl ChangeBatch {
    pub fn new() -> Self {
        Self { diffs: BTreeMap::new() }
    }

    /// Gets or creates the diff for a kind.
    pub fn diff_mut(&mut self, table: &str) -> &mut TableDiff {
        self.diffs
            .entry(String::from(table))
            .or_insert_with(|| TableDiff::new(table))
    }

    pub fn diff(&self, table: &str) -> Option<&TableDiff> {
        self.diffs.get(table)
    }

    /// Kinds with at least one net change.
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.diffs.keys().map(|k| k.as_str())
    }

    pub fn diffs(&self) -> impl Iterator<Item = &TableDiff> {
        self.diffs.values()
    }

    /// Prunes no-op updates and drops kinds left without changes.
    pub fn finalize(&mut self) {
        for diff in self.diffs.values_mut() {
            diff.prune_noop_updates();
        }
        self.diffs.retain(|_, diff| !diff.is_empty());
    }

    pub fn is_empty(&self) -> bool {
        self.diffs.values().all(|d| d.is_empty())
    }
}
