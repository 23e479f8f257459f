//! Read-only projections of store rows.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use lumen_core::schema::Table;
use lumen_core::{Row, RowId, Value};

/// An immutable value copied out of a committed row.
///
/// Projections are the only representation results controllers and entity
/// listeners hand to consumers.
pub trait Projection: Clone + 'static {
    fn from_row(schema: &Table, row: &Row) -> Self;

    fn id(&self) -> RowId;
}

/// Generic projection keeping every attribute by name.
///
/// Equality is by identity.
#[derive(Clone, Debug)]
pub struct Record {
    id: RowId,
    version: u64,
    columns: Rc<[String]>,
    values: Vec<Value>,
}

impl Record {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == key)
            .and_then(|i| self.values.get(i))
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// `(name, value)` pairs in column order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|c| c.as_str()).zip(self.values.iter())
    }
}

impl Projection for Record {
    fn from_row(schema: &Table, row: &Row) -> Self {
        Self {
            id: row.id(),
            version: row.version(),
            columns: schema.columns().iter().map(|c| String::from(c.name())).collect(),
            values: row.values().to_vec(),
        }
    }

    fn id(&self) -> RowId {
        self.id
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Record {}
