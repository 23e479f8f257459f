//! Lumen Reactive - live queries over a Lumen store.
//!
//! This crate keeps consumers in sync with a `StoreContext` as it mutates.
//!
//! # Core Concepts
//!
//! - `FetchConfig`: Predicate, sort descriptors, optional section key and fetch limit
//! - `ResultsController`: Maintains the sectioned results of a `FetchConfig` and
//!   reports every change as ordered insert/delete/move/update events
//! - `EntityListener`: Watches one identity for upserts and its deletion
//! - `SnapshotProvider`: Publishes whole identifier snapshots after each change
//! - `Projection`: The immutable value handed to consumers for each row
//!
//! Everything runs synchronously on the thread that commits to the store.
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use lumen_core::schema::TableBuilder;
//! use lumen_core::{DataType, Row, Value};
//! use lumen_reactive::{FetchConfig, ObjectChange, Record, ResultsController, SortDescriptor};
//! use lumen_storage::StoreContext;
//!
//! let store = StoreContext::new();
//! store
//!     .create_table(
//!         TableBuilder::new("products").unwrap()
//!             .add_column("name", DataType::String).unwrap()
//!             .build().unwrap(),
//!     )
//!     .unwrap();
//!
//! let controller: ResultsController<Record> = ResultsController::new(
//!     &store,
//!     FetchConfig::builder("products")
//!         .sort_by(SortDescriptor::ascending("name"))
//!         .build(),
//! );
//! controller.perform_fetch().unwrap();
//!
//! let changes = Rc::new(RefCell::new(Vec::new()));
//! let sink = changes.clone();
//! controller.on_did_change_object(move |_, change| sink.borrow_mut().push(*change));
//!
//! let mut tx = store.begin();
//! tx.insert("products", Row::new(1, vec![Value::from("Ant")]));
//! tx.commit().unwrap();
//!
//! assert!(changes.borrow()[0].is_insert());
//! ```

#![no_std]

extern crate alloc;

pub mod change;
pub mod controller;
mod diff;
pub mod fetch;
pub mod listener;
pub mod predicate;
pub mod projection;
pub mod section;
pub mod snapshot;
pub mod subscription;

pub use change::{ObjectChange, SectionChange};
pub use controller::ResultsController;
pub use fetch::{FetchConfig, FetchConfigBuilder, FetchError, SortDescriptor};
pub use listener::EntityListener;
pub use predicate::{CompareOp, Predicate};
pub use projection::{Projection, Record};
pub use section::{IndexPath, Section};
pub use snapshot::{FetchResultSnapshot, SnapshotProvider};
pub use subscription::{SubscriptionId, SubscriptionManager};
