//! Entity kinds held by a store context.
//!
//! `TableCache` owns one `RowStore` per kind and applies committed journals
//! atomically: either every entry lands or the cache is left untouched.

use crate::journal::{ChangeBatch, JournalEntry};
use crate::row_store::RowStore;
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use lumen_core::schema::Table;
use lumen_core::{Error, Result, Row, RowId};

/// Inverse of one applied entry.
enum Undo {
    Remove { table: String, row_id: RowId },
    Restore { table: String, row: Rc<Row> },
}

/// Kind name → RowStore mapping.
pub struct TableCache {
    tables: BTreeMap<String, RowStore>,
}

impl TableCache {
    pub fn new() -> Self {
        Self {
            tables: BTreeMap::new(),
        }
    }

    /// Registers a new entity kind.
    pub fn create_table(&mut self, schema: Table) -> Result<()> {
        let name = schema.name().to_string();
        if self.tables.contains_key(&name) {
            return Err(Error::invalid_schema(format!(
                "Entity kind already exists: {}",
                name
            )));
        }
        self.tables.insert(name, RowStore::new(schema));
        Ok(())
    }

    pub fn get_table(&self, name: &str) -> Option<&RowStore> {
        self.tables.get(name)
    }

    pub fn get_table_mut(&mut self, name: &str) -> Option<&mut RowStore> {
        self.tables.get_mut(name)
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(|s| s.as_str()).collect()
    }

    pub fn get_row(&self, table: &str, row_id: RowId) -> Option<Rc<Row>> {
        self.tables.get(table).and_then(|t| t.get(row_id))
    }

    pub fn total_row_count(&self) -> usize {
        self.tables.values().map(|t| t.len()).sum()
    }

    /// Removes every row of every kind. Schemas are kept.
    pub fn clear(&mut self) {
        for store in self.tables.values_mut() {
            store.clear();
        }
    }

    /// Applies journal entries in order and returns their coalesced effect.
    ///
    /// On the first failing entry every entry already applied is undone and
    /// the error is returned.
    pub fn apply(&mut self, entries: Vec<JournalEntry>) -> Result<ChangeBatch> {
        let mut batch = ChangeBatch::new();
        let mut undo: Vec<Undo> = Vec::with_capacity(entries.len());

        for entry in entries {
            if let Err(err) = self.apply_entry(entry, &mut batch, &mut undo) {
                self.revert(undo);
                return Err(err);
            }
        }

        batch.finalize();
        Ok(batch)
    }

    fn apply_entry(
        &mut self,
        entry: JournalEntry,
        batch: &mut ChangeBatch,
        undo: &mut Vec<Undo>,
    ) -> Result<()> {
        let table = entry.table().to_string();
        let store = self
            .tables
            .get_mut(&table)
            .ok_or_else(|| Error::table_not_found(&table))?;

        match entry {
            JournalEntry::Insert { row, .. } => {
                let row = store.insert(row)?;
                undo.push(Undo::Remove {
                    table: table.clone(),
                    row_id: row.id(),
                });
                batch.diff_mut(&table).insert(row);
            }
            JournalEntry::Update { row, .. } => {
                let (old, new) = store.update(row)?;
                undo.push(Undo::Restore {
                    table: table.clone(),
                    row: old.clone(),
                });
                batch.diff_mut(&table).update(old, new);
            }
            JournalEntry::Upsert { row, .. } => {
                if store.contains(row.id()) {
                    let (old, new) = store.update(row)?;
                    undo.push(Undo::Restore {
                        table: table.clone(),
                        row: old.clone(),
                    });
                    batch.diff_mut(&table).update(old, new);
                } else {
                    let row = store.insert(row)?;
                    undo.push(Undo::Remove {
                        table: table.clone(),
                        row_id: row.id(),
                    });
                    batch.diff_mut(&table).insert(row);
                }
            }
            JournalEntry::Delete { row_id, .. } => {
                let row = store.delete(row_id)?;
                undo.push(Undo::Restore {
                    table: table.clone(),
                    row: row.clone(),
                });
                batch.diff_mut(&table).delete(row);
            }
        }
        Ok(())
    }

    fn revert(&mut self, undo: Vec<Undo>) {
        for step in undo.into_iter().rev() {
            match step {
                Undo::Remove { table, row_id } => {
                    if let Some(store) = self.tables.get_mut(&table) {
                        store.discard(row_id);
                    }
                }
                Undo::Restore { table, row } => {
                    if let Some(store) = self.tables.get_mut(&table) {
                        store.restore(row);
                    }
                }
            }
        }
    }
}

impl Default for TableCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use lumen_core::schema::TableBuilder;
    use lumen_core::{DataType, Value};

    fn test_schema(name: &str) -> Table {
        TableBuilder::new(name)
            .unwrap()
            .add_column("name", DataType::String)
            .unwrap()
            .build()
            .unwrap()
    }

    fn named(id: RowId, name: &str) -> Row {
        Row::new(id, vec![Value::String(name.into())])
    }

    fn insert(table: &str, id: RowId, name: &str) -> JournalEntry {
        JournalEntry::Insert {
            table: table.into(),
            row: named(id, name),
        }
    }

    #[test]
    fn test_cache_create_duplicate_table() {
        let mut cache = TableCache::new();
        cache.create_table(test_schema("users")).unwrap();
        assert!(cache.has_table("users"));
        assert!(cache.create_table(test_schema("users")).is_err());
    }

    #[test]
    fn test_apply_builds_batch() {
        let mut cache = TableCache::new();
        cache.create_table(test_schema("users")).unwrap();
        cache.create_table(test_schema("orders")).unwrap();

        let batch = cache
            .apply(vec![
                insert("users", 1, "alice"),
                insert("users", 2, "bob"),
                insert("orders", 7, "first"),
                JournalEntry::Delete {
                    table: "users".into(),
                    row_id: 2,
                },
            ])
            .unwrap();

        assert_eq!(cache.total_row_count(), 2);
        assert_eq!(batch.diff("users").unwrap().affected_ids(), vec![1]);
        assert_eq!(batch.diff("orders").unwrap().inserted().len(), 1);
    }

    #[test]
    fn test_apply_is_atomic() {
        let mut cache = TableCache::new();
        cache.create_table(test_schema("users")).unwrap();
        cache.apply(vec![insert("users", 1, "alice")]).unwrap();

        let result = cache.apply(vec![
            JournalEntry::Update {
                table: "users".into(),
                row: named(1, "alicia"),
            },
            insert("users", 2, "bob"),
            JournalEntry::Delete {
                table: "users".into(),
                row_id: 1,
            },
            // Fails: identity 1 no longer exists at this point.
            JournalEntry::Delete {
                table: "users".into(),
                row_id: 1,
            },
        ]);

        assert!(matches!(result, Err(Error::NotFound { id: 1, .. })));
        assert_eq!(cache.total_row_count(), 1);
        let alice = cache.get_row("users", 1).unwrap();
        assert_eq!(alice.get(0), Some(&Value::from("alice")));
        assert_eq!(alice.version(), 1);
    }

    #[test]
    fn test_apply_unknown_kind() {
        let mut cache = TableCache::new();
        assert!(matches!(
            cache.apply(vec![insert("ghosts", 1, "boo")]),
            Err(Error::TableNotFound { .. })
        ));
    }

    #[test]
    fn test_upsert_and_noop() {
        let mut cache = TableCache::new();
        cache.create_table(test_schema("users")).unwrap();

        let upsert = |id, name: &str| JournalEntry::Upsert {
            table: "users".into(),
            row: named(id, name),
        };

        let batch = cache.apply(vec![upsert(1, "alice")]).unwrap();
        assert_eq!(batch.diff("users").unwrap().inserted().len(), 1);

        let batch = cache.apply(vec![upsert(1, "alice")]).unwrap();
        assert!(batch.is_empty());

        let batch = cache.apply(vec![upsert(1, "alicia")]).unwrap();
        assert_eq!(batch.diff("users").unwrap().updated().len(), 1);
    }

    #[test]
    fn test_clear_keeps_schemas() {
        let mut cache = TableCache::new();
        cache.create_table(test_schema("users")).unwrap();
        cache.apply(vec![insert("users", 1, "alice")]).unwrap();
        cache.clear();

        assert_eq!(cache.total_row_count(), 0);
        assert_eq!(cache.table_names(), vec!["users"]);
    }
}
