//! Write transactions.
//!
//! Writes are buffered in a `Journal` and become visible only at `commit`,
//! which applies them atomically and then notifies observers with one
//! coalesced `ChangeBatch`.

use crate::context::StoreContext;
use crate::journal::{Journal, JournalEntry};
use crate::observer::StoreEvent;
use alloc::string::String;
use lumen_core::{Error, Result, Row, RowId};

/// Transaction state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

/// A buffered set of writes against a `StoreContext`.
///
/// Dropping an uncommitted transaction discards it.
pub struct Transaction {
    store: StoreContext,
    journal: Journal,
    state: TransactionState,
}

impl Transaction {
    pub(crate) fn new(store: StoreContext) -> Self {
        Self {
            store,
            journal: Journal::new(),
            state: TransactionState::Active,
        }
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Number of buffered writes.
    pub fn pending(&self) -> usize {
        self.journal.len()
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Buffers the creation of a new entity.
    pub fn insert(&mut self, table: &str, row: Row) -> &mut Self {
        self.journal.record(JournalEntry::Insert {
            table: String::from(table),
            row,
        });
        self
    }

    /// Buffers a replacement of an existing entity's attributes.
    pub fn update(&mut self, table: &str, row: Row) -> &mut Self {
        self.journal.record(JournalEntry::Update {
            table: String::from(table),
            row,
        });
        self
    }

    /// Buffers an insert-or-replace.
    pub fn upsert(&mut self, table: &str, row: Row) -> &mut Self {
        self.journal.record(JournalEntry::Upsert {
            table: String::from(table),
            row,
        });
        self
    }

    /// Buffers the removal of an entity.
    pub fn delete(&mut self, table: &str, row_id: RowId) -> &mut Self {
        self.journal.record(JournalEntry::Delete {
            table: String::from(table),
            row_id,
        });
        self
    }

    /// Applies every buffered write and notifies observers.
    ///
    /// On error nothing is applied and nothing is dispatched. A commit whose
    /// net effect is empty (no writes, or only no-op updates) is not
    /// dispatched either.
    pub fn commit(mut self) -> Result<()> {
        if !self.is_active() {
            return Err(Error::invalid_operation("Transaction is not active"));
        }
        let entries = self.journal.take();
        let written = entries.len();

        let applied = self.store.cache().borrow_mut().apply(entries);
        let batch = match applied {
            Ok(batch) => batch,
            Err(err) => {
                self.state = TransactionState::RolledBack;
                tracing::warn!(error = %err, "commit failed, changes discarded");
                return Err(err);
            }
        };
        self.state = TransactionState::Committed;

        if batch.is_empty() {
            tracing::trace!(written, "commit had no net effect");
            return Ok(());
        }
        tracing::debug!(written, "transaction committed");
        self.store.dispatch(StoreEvent::Changed(batch));
        Ok(())
    }

    /// Discards every buffered write.
    pub fn rollback(mut self) {
        self.discard();
    }

    fn discard(&mut self) {
        if self.is_active() {
            if !self.journal.is_empty() {
                tracing::trace!(discarded = self.journal.len(), "transaction rolled back");
            }
            self.journal.clear();
            self.state = TransactionState::RolledBack;
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        self.discard();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use lumen_core::schema::TableBuilder;
    use lumen_core::{DataType, Value};

    fn store() -> StoreContext {
        let store = StoreContext::new();
        store
            .create_table(
                TableBuilder::new("test")
                    .unwrap()
                    .add_column("name", DataType::String)
                    .unwrap()
                    .build()
                    .unwrap(),
            )
            .unwrap();
        store
    }

    fn named(id: RowId, name: &str) -> Row {
        Row::new(id, vec![Value::String(name.into())])
    }

    #[test]
    fn test_writes_invisible_until_commit() {
        let store = store();
        let mut tx = store.begin();
        tx.insert("test", named(1, "a")).insert("test", named(2, "b"));
        assert_eq!(tx.pending(), 2);
        assert_eq!(store.len("test"), 0);

        tx.commit().unwrap();
        assert_eq!(store.len("test"), 2);
    }

    #[test]
    fn test_rollback_and_drop_discard() {
        let store = store();
        let mut tx = store.begin();
        tx.insert("test", named(1, "a"));
        tx.rollback();

        {
            let mut tx = store.begin();
            tx.insert("test", named(2, "b"));
        }

        assert_eq!(store.len("test"), 0);
    }

    #[test]
    fn test_update_and_upsert() {
        let store = store();
        let mut tx = store.begin();
        tx.insert("test", named(1, "a"));
        tx.commit().unwrap();

        let mut tx = store.begin();
        tx.update("test", named(1, "b")).upsert("test", named(2, "c"));
        tx.commit().unwrap();

        let first = store.get("test", 1).unwrap();
        assert_eq!(first.get(0), Some(&Value::from("b")));
        assert_eq!(first.version(), 2);
        assert!(store.get("test", 2).is_some());
    }

    #[test]
    fn test_invalid_row_rejected() {
        let store = store();
        let mut tx = store.begin();
        tx.insert("test", named(1, "ok"));
        tx.insert("test", Row::new(2, vec![Value::Null]));
        assert!(matches!(tx.commit(), Err(Error::NullConstraint { .. })));
        assert_eq!(store.len("test"), 0);
    }
}
