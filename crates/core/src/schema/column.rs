//! Column definition.

use crate::types::DataType;

use alloc::string::String;

/// One attribute of an entity kind.
#[derive(Clone, Debug)]
pub struct Column {
    name: String,
    data_type: DataType,
    nullable: bool,
    /// Position within the row (0-based).
    index: usize,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: data_type.is_nullable_by_default(),
            index: 0,
        }
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub(crate) fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    #[inline]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }
}

impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.data_type == other.data_type
    }
}
