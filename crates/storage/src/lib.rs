//! Lumen Storage - the store context observed by the live-query engine.
//!
//! This crate provides:
//!
//! - `StoreContext`: Shared handle to the in-memory entity store
//! - `RowStore`: Rows of one entity kind, keyed by identity
//! - `Transaction` / `Journal`: Buffered writes applied atomically on commit
//! - `TableDiff` / `ChangeBatch`: Coalesced per-kind mutation batches
//! - `ObserverRegistry`: Weakly-held observers notified of every `StoreEvent`
//!
//! Everything runs on one execution context: writes, dispatch and observer
//! callbacks happen synchronously inside `Transaction::commit`.
//!
//! # Example
//!
//! ```rust
//! use lumen_storage::StoreContext;
//! use lumen_core::schema::TableBuilder;
//! use lumen_core::{DataType, Row, Value};
//!
//! let store = StoreContext::new();
//! let schema = TableBuilder::new("accounts")
//!     .unwrap()
//!     .add_column("username", DataType::String)
//!     .unwrap()
//!     .build()
//!     .unwrap();
//! store.create_table(schema).unwrap();
//!
//! let mut tx = store.begin();
//! tx.insert("accounts", Row::new(1, vec![Value::String("alice".into())]));
//! tx.commit().unwrap();
//!
//! assert_eq!(store.len("accounts"), 1);
//! ```

#![no_std]

extern crate alloc;

pub mod cache;
pub mod context;
pub mod journal;
pub mod observer;
pub mod row_store;
pub mod transaction;

pub use cache::TableCache;
pub use context::{StoreContext, WeakStore};
pub use journal::{ChangeBatch, Journal, JournalEntry, RowChange, TableDiff};
pub use observer::{ObserverId, ObserverRegistry, StoreEvent, StoreObserver};
pub use row_store::RowStore;
pub use transaction::{Transaction, TransactionState};
