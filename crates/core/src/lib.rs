//! Lumen Core - Core types and schema definitions for the Lumen live-query engine.
//!
//! This crate provides the foundational types shared by the store and the
//! reactive layer:
//!
//! - `DataType`: Supported attribute types (Boolean, Int32, Int64, Float64, String, DateTime, Bytes)
//! - `Value`: Runtime attribute values
//! - `Row`: The committed attribute state of one entity, keyed by a stable identity
//! - `schema`: Entity kind definitions (Column, Table)
//! - `Error`: Error types for store operations
//!
//! # Example
//!
//! ```rust
//! use lumen_core::{DataType, Value, Row};
//! use lumen_core::schema::TableBuilder;
//!
//! let products = TableBuilder::new("products")
//!     .unwrap()
//!     .add_column("name", DataType::String)
//!     .unwrap()
//!     .add_column("site_id", DataType::Int64)
//!     .unwrap()
//!     .build()
//!     .unwrap();
//!
//! let row = Row::new(1, vec![Value::String("Zap".into()), Value::Int64(134)]);
//!
//! assert_eq!(row.id(), 1);
//! assert_eq!(products.get_column_index("site_id"), Some(1));
//! assert!(products.validate_row(&row).is_ok());
//! ```

#![no_std]

extern crate alloc;

mod error;
pub mod pattern_match;
mod row;
pub mod schema;
mod types;
mod value;

pub use error::{Error, Result};
pub use row::{Row, RowId};
pub use types::DataType;
pub use value::Value;
