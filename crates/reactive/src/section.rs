//! Sections and index paths.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// A `(section, row)` coordinate into a controller snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexPath {
    pub section: usize,
    pub row: usize,
}

impl IndexPath {
    pub const fn new(section: usize, row: usize) -> Self {
        Self { section, row }
    }
}

impl fmt::Display for IndexPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.section, self.row)
    }
}

/// A named, ordered group of projections.
#[derive(Clone, Debug, PartialEq)]
pub struct Section<P> {
    name: String,
    objects: Vec<P>,
}

impl<P> Section<P> {
    pub fn new(name: impl Into<String>, objects: Vec<P>) -> Self {
        Self {
            name: name.into(),
            objects,
        }
    }

    /// Rendering of the section key value; `""` for unsectioned results.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn objects(&self) -> &[P] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, row: usize) -> Option<&P> {
        self.objects.get(row)
    }

    pub(crate) fn push(&mut self, object: P) {
        self.objects.push(object);
    }
}
