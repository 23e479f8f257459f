//! Schema definitions: the attribute layout of each entity kind.

mod column;
mod table;

pub use column::Column;
pub use table::{Table, TableBuilder};
