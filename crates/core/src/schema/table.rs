//! Entity kind definition.

use super::column::Column;
use crate::error::{Error, Result};
use crate::row::Row;
use crate::types::DataType;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

/// The attribute layout of one entity kind. Identity is carried by the row
/// itself (`Row::id`) and is not a column.
#[derive(Clone, Debug)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
}

impl Table {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn get_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    /// Checks arity, column types and nullability of a row about to be written.
    pub fn validate_row(&self, row: &Row) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(Error::arity_mismatch(&self.name, self.columns.len(), row.len()));
        }
        for (column, value) in self.columns.iter().zip(row.values()) {
            match value.data_type() {
                None if !column.is_nullable() => {
                    return Err(Error::null_constraint(column.name()));
                }
                None => {}
                Some(got) if got != column.data_type() => {
                    return Err(Error::type_mismatch(column.name(), column.data_type(), got));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// Builder for entity kind definitions.
pub struct TableBuilder {
    name: String,
    columns: Vec<Column>,
}

impl TableBuilder {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::check_naming_rules(&name)?;
        Ok(Self {
            name,
            columns: Vec::new(),
        })
    }

    fn check_naming_rules(name: &str) -> Result<()> {
        let mut chars = name.chars();
        match chars.next() {
            None => return Err(Error::invalid_schema("Name cannot be empty")),
            Some(first) if !first.is_ascii_alphabetic() && first != '_' => {
                return Err(Error::invalid_schema(format!(
                    "Name must start with letter or underscore: {}",
                    name
                )));
            }
            Some(_) => {}
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::invalid_schema(format!(
                "Name contains invalid characters: {}",
                name
            )));
        }
        Ok(())
    }

    pub fn add_column(mut self, name: impl Into<String>, data_type: DataType) -> Result<Self> {
        let name = name.into();
        Self::check_naming_rules(&name)?;
        if self.columns.iter().any(|c| c.name() == name) {
            return Err(Error::invalid_schema(format!("Column already exists: {}", name)));
        }
        self.columns.push(Column::new(name, data_type));
        Ok(self)
    }

    /// Marks existing columns as nullable.
    pub fn add_nullable(mut self, columns: &[&str]) -> Self {
        for name in columns {
            if let Some(col) = self.columns.iter_mut().find(|c| c.name() == *name) {
                *col = col.clone().nullable(true);
            }
        }
        self
    }

    pub fn build(self) -> Result<Table> {
        if self.columns.is_empty() {
            return Err(Error::invalid_schema(format!(
                "Table {} declares no columns",
                self.name
            )));
        }
        let columns = self
            .columns
            .into_iter()
            .enumerate()
            .map(|(i, c)| c.with_index(i))
            .collect();
        Ok(Table {
            name: self.name,
            columns,
        })
    }
}
