//! Fetch configuration: what a results controller shows and in which order.

use crate::predicate::{CompiledPredicate, Predicate};
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt;
use lumen_core::schema::Table;
use lumen_core::{DataType, Row, RowId, Value};

/// Result type for fetch operations.
pub type Result<T> = core::result::Result<T, FetchError>;

/// Why a fetch configuration could not be evaluated.
#[derive(Clone, Debug, PartialEq)]
pub enum FetchError {
    /// Every strong handle to the store has been dropped.
    StoreUnavailable,
    /// The configured entity kind does not exist in the store.
    UnknownEntity { kind: String },
    /// A predicate, sort descriptor or section key names a missing attribute.
    UnknownAttribute { kind: String, key: String },
    /// A predicate literal cannot be compared with the attribute's type.
    TypeMismatch {
        key: String,
        expected: DataType,
        got: DataType,
    },
    /// The sort descriptor chain is empty.
    EmptySortDescriptors,
    /// A fetch limit of zero was configured.
    ZeroFetchLimit,
    /// The section key is not the first sort descriptor's key.
    SectionKeyNotLeading { key: String },
    /// Error reported by the store.
    Store(lumen_core::Error),
}

impl FetchError {
    pub fn unknown_entity(kind: impl Into<String>) -> Self {
        FetchError::UnknownEntity { kind: kind.into() }
    }

    pub fn unknown_attribute(kind: impl Into<String>, key: impl Into<String>) -> Self {
        FetchError::UnknownAttribute {
            kind: kind.into(),
            key: key.into(),
        }
    }

    pub fn type_mismatch(key: impl Into<String>, expected: DataType, got: DataType) -> Self {
        FetchError::TypeMismatch {
            key: key.into(),
            expected,
            got,
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::StoreUnavailable => write!(f, "Store is no longer available"),
            FetchError::UnknownEntity { kind } => write!(f, "Unknown entity kind: {}", kind),
            FetchError::UnknownAttribute { kind, key } => {
                write!(f, "Unknown attribute {} on {}", key, kind)
            }
            FetchError::TypeMismatch { key, expected, got } => write!(
                f,
                "Type mismatch on {}: attribute is {:?}, literal is {:?}",
                key, expected, got
            ),
            FetchError::EmptySortDescriptors => write!(f, "At least one sort descriptor is required"),
            FetchError::ZeroFetchLimit => write!(f, "Fetch limit must be greater than zero"),
            FetchError::SectionKeyNotLeading { key } => {
                write!(f, "Section key {} must be the first sort descriptor", key)
            }
            FetchError::Store(err) => write!(f, "Store error: {}", err),
        }
    }
}

impl From<lumen_core::Error> for FetchError {
    fn from(err: lumen_core::Error) -> Self {
        match err {
            lumen_core::Error::TableNotFound { name } => FetchError::UnknownEntity { kind: name },
            other => FetchError::Store(other),
        }
    }
}

/// One link of a sort chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortDescriptor {
    pub key: String,
    pub ascending: bool,
    /// Fold strings to lowercase before comparing.
    pub case_insensitive: bool,
}

impl SortDescriptor {
    pub fn ascending(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ascending: true,
            case_insensitive: false,
        }
    }

    pub fn descending(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ascending: false,
            case_insensitive: false,
        }
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }
}

/// The query a results controller keeps live.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchConfig {
    kind: String,
    predicate: Predicate,
    sort_descriptors: Vec<SortDescriptor>,
    section_key: Option<String>,
    fetch_limit: Option<usize>,
}

impl FetchConfig {
    pub fn builder(kind: impl Into<String>) -> FetchConfigBuilder {
        FetchConfigBuilder {
            config: FetchConfig {
                kind: kind.into(),
                predicate: Predicate::True,
                sort_descriptors: Vec::new(),
                section_key: None,
                fetch_limit: None,
            },
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn sort_descriptors(&self) -> &[SortDescriptor] {
        &self.sort_descriptors
    }

    pub fn section_key(&self) -> Option<&str> {
        self.section_key.as_deref()
    }

    pub fn fetch_limit(&self) -> Option<usize> {
        self.fetch_limit
    }

    pub(crate) fn set_sort_descriptors(&mut self, descriptors: Vec<SortDescriptor>) {
        self.sort_descriptors = descriptors;
    }

    /// Checks the configuration against `schema` and resolves every key.
    pub fn compile(&self, schema: &Table) -> Result<CompiledFetch> {
        if self.sort_descriptors.is_empty() {
            return Err(FetchError::EmptySortDescriptors);
        }
        if self.fetch_limit == Some(0) {
            return Err(FetchError::ZeroFetchLimit);
        }

        let predicate = self.predicate.compile(schema)?;
        let sort = self
            .sort_descriptors
            .iter()
            .map(|d| {
                schema
                    .get_column_index(&d.key)
                    .map(|index| SortColumn {
                        index,
                        ascending: d.ascending,
                        case_insensitive: d.case_insensitive,
                    })
                    .ok_or_else(|| FetchError::unknown_attribute(schema.name(), d.key.as_str()))
            })
            .collect::<Result<Vec<_>>>()?;
        let section = match &self.section_key {
            Some(key) => Some(
                schema
                    .get_column_index(key)
                    .ok_or_else(|| FetchError::unknown_attribute(schema.name(), key.as_str()))?,
            ),
            None => None,
        };
        if let Some(key) = &self.section_key {
            if self.sort_descriptors[0].key != *key {
                return Err(FetchError::SectionKeyNotLeading { key: key.clone() });
            }
        }

        Ok(CompiledFetch {
            predicate,
            sort,
            section,
            limit: self.fetch_limit,
        })
    }
}

/// Builder for `FetchConfig`.
#[derive(Clone, Debug)]
pub struct FetchConfigBuilder {
    config: FetchConfig,
}

impl FetchConfigBuilder {
    pub fn predicate(mut self, predicate: Predicate) -> Self {
        self.config.predicate = predicate;
        self
    }

    /// Appends a descriptor to the sort chain.
    pub fn sort_by(mut self, descriptor: SortDescriptor) -> Self {
        self.config.sort_descriptors.push(descriptor);
        self
    }

    pub fn sort_descriptors(mut self, descriptors: Vec<SortDescriptor>) -> Self {
        self.config.sort_descriptors = descriptors;
        self
    }

    pub fn section_key(mut self, key: impl Into<String>) -> Self {
        self.config.section_key = Some(key.into());
        self
    }

    pub fn fetch_limit(mut self, limit: usize) -> Self {
        self.config.fetch_limit = Some(limit);
        self
    }

    pub fn build(self) -> FetchConfig {
        self.config
    }
}

#[derive(Clone, Copy, Debug)]
struct SortColumn {
    index: usize,
    ascending: bool,
    case_insensitive: bool,
}

/// A `FetchConfig` resolved against one schema.
#[derive(Clone, Debug)]
pub struct CompiledFetch {
    predicate: CompiledPredicate,
    sort: Vec<SortColumn>,
    section: Option<usize>,
    limit: Option<usize>,
}

impl CompiledFetch {
    pub fn matches(&self, row: &Row) -> bool {
        self.predicate.eval(row)
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn is_sectioned(&self) -> bool {
        self.section.is_some()
    }

    /// Section name of a row: the rendering of its section attribute, or
    /// `""` when the configuration has no section key.
    pub fn section_name(&self, row: &Row) -> String {
        self.section
            .and_then(|index| row.get(index))
            .map(|value| value.to_string())
            .unwrap_or_default()
    }

    /// Sort key of a row under this configuration.
    pub fn sort_key(&self, row: &Row) -> SortKey {
        SortKey {
            parts: self
                .sort
                .iter()
                .map(|col| KeyPart {
                    value: row.get(col.index).cloned().unwrap_or(Value::Null),
                    ascending: col.ascending,
                    case_insensitive: col.case_insensitive,
                })
                .collect(),
            id: row.id(),
        }
    }
}

#[derive(Clone, Debug)]
struct KeyPart {
    value: Value,
    ascending: bool,
    case_insensitive: bool,
}

/// Position of a row in sort order: the descriptor chain, then identity.
///
/// Two keys built from the same configuration are totally ordered; keys from
/// different configurations must not be mixed.
#[derive(Clone, Debug)]
pub struct SortKey {
    parts: Vec<KeyPart>,
    id: RowId,
}

impl SortKey {
    pub fn id(&self) -> RowId {
        self.id
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.parts.iter().zip(&other.parts) {
            let ord = a.value.cmp_with_case(&b.value, a.case_insensitive);
            let ord = if a.ascending { ord } else { ord.reverse() };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        self.id.cmp(&other.id)
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SortKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortKey {}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use lumen_core::schema::TableBuilder;

    fn products() -> Table {
        TableBuilder::new("products")
            .unwrap()
            .add_column("name", DataType::String)
            .unwrap()
            .add_column("category", DataType::String)
            .unwrap()
            .add_column("stock", DataType::Int64)
            .unwrap()
            .add_nullable(&["category"])
            .build()
            .unwrap()
    }

    fn product(id: RowId, name: &str, category: Option<&str>, stock: i64) -> Row {
        Row::new(
            id,
            vec![
                Value::from(name),
                category.map_or(Value::Null, Value::from),
                Value::Int64(stock),
            ],
        )
    }

    #[test]
    fn test_compile_errors() {
        let schema = products();
        let empty = FetchConfig::builder("products").build();
        assert_eq!(empty.compile(&schema).unwrap_err(), FetchError::EmptySortDescriptors);

        let zero = FetchConfig::builder("products")
            .sort_by(SortDescriptor::ascending("name"))
            .fetch_limit(0)
            .build();
        assert_eq!(zero.compile(&schema).unwrap_err(), FetchError::ZeroFetchLimit);

        let bad_sort = FetchConfig::builder("products")
            .sort_by(SortDescriptor::ascending("missing"))
            .build();
        assert!(matches!(
            bad_sort.compile(&schema),
            Err(FetchError::UnknownAttribute { .. })
        ));

        let bad_section = FetchConfig::builder("products")
            .sort_by(SortDescriptor::ascending("name"))
            .section_key("missing")
            .build();
        assert!(matches!(
            bad_section.compile(&schema),
            Err(FetchError::UnknownAttribute { .. })
        ));
    }

    #[test]
    fn test_case_insensitive_sort() {
        let schema = products();
        let config = FetchConfig::builder("products")
            .sort_by(SortDescriptor::ascending("name").case_insensitive())
            .build();
        let fetch = config.compile(&schema).unwrap();

        let zap = fetch.sort_key(&product(1, "Zap", None, 0));
        let fun = fetch.sort_key(&product(2, "fun house", None, 0));
        assert!(fun < zap);

        let sensitive = FetchConfig::builder("products")
            .sort_by(SortDescriptor::ascending("name"))
            .build()
            .compile(&schema)
            .unwrap();
        assert!(sensitive.sort_key(&product(1, "Zap", None, 0))
            < sensitive.sort_key(&product(2, "fun house", None, 0)));
    }

    #[test]
    fn test_chain_and_identity_tie_break() {
        let schema = products();
        let fetch = FetchConfig::builder("products")
            .sort_by(SortDescriptor::descending("stock"))
            .sort_by(SortDescriptor::ascending("name"))
            .build()
            .compile(&schema)
            .unwrap();

        let a = fetch.sort_key(&product(1, "b", None, 5));
        let b = fetch.sort_key(&product(2, "a", None, 5));
        let c = fetch.sort_key(&product(3, "a", None, 9));
        let d = fetch.sort_key(&product(4, "a", None, 5));
        assert!(c < b && b < a);
        assert!(b < d && d < a);
    }

    #[test]
    fn test_section_key_must_lead_sort_chain() {
        let schema = products();
        let config = FetchConfig::builder("products")
            .sort_by(SortDescriptor::ascending("name"))
            .sort_by(SortDescriptor::ascending("category"))
            .section_key("category")
            .build();
        assert_eq!(
            config.compile(&schema).unwrap_err(),
            FetchError::SectionKeyNotLeading {
                key: String::from("category")
            }
        );
    }

    #[test]
    fn test_section_name() {
        let schema = products();
        let fetch = FetchConfig::builder("products")
            .sort_by(SortDescriptor::ascending("category"))
            .sort_by(SortDescriptor::ascending("name"))
            .section_key("category")
            .build()
            .compile(&schema)
            .unwrap();
        assert!(fetch.is_sectioned());
        assert_eq!(fetch.section_name(&product(1, "a", Some("tools"), 0)), "tools");
        assert_eq!(fetch.section_name(&product(1, "a", None, 0)), "");
    }

    #[test]
    fn test_store_error_conversion() {
        let err: FetchError = lumen_core::Error::table_not_found("ghosts").into();
        assert_eq!(err, FetchError::unknown_entity("ghosts"));
        assert_eq!(
            alloc::format!("{}", FetchError::ZeroFetchLimit),
            "Fetch limit must be greater than zero"
        );
    }
}
