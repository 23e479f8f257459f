//! Row predicates for fetch configurations.
//!
//! A `Predicate` names attributes by key. Before it can be evaluated it is
//! compiled against the kind's schema into a `CompiledPredicate`, which
//! resolves keys to column positions and checks literal types.

use crate::fetch::FetchError;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use lumen_core::pattern_match;
use lumen_core::schema::Table;
use lumen_core::{DataType, Row, Value};

/// Comparison operator of a `Predicate::Compare`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A filter over the attributes of one entity kind.
///
/// Ordering comparisons never match a null attribute; `Eq`/`Ne` against a
/// null literal compare nullness.
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    /// Matches every entity.
    True,
    Compare {
        key: String,
        op: CompareOp,
        value: Value,
    },
    In {
        key: String,
        values: Vec<Value>,
    },
    /// Inclusive on both ends.
    Between {
        key: String,
        low: Value,
        high: Value,
    },
    /// SQL `LIKE` with `%` and `_` wildcards. String attributes only.
    Like {
        key: String,
        pattern: String,
        case_insensitive: bool,
    },
    IsNull(String),
    IsNotNull(String),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn compare(key: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            key: key.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(key, CompareOp::Eq, value)
    }

    pub fn ne(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(key, CompareOp::Ne, value)
    }

    pub fn lt(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(key, CompareOp::Lt, value)
    }

    pub fn le(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(key, CompareOp::Le, value)
    }

    pub fn gt(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(key, CompareOp::Gt, value)
    }

    pub fn ge(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(key, CompareOp::Ge, value)
    }

    pub fn in_list(key: impl Into<String>, values: Vec<Value>) -> Self {
        Predicate::In {
            key: key.into(),
            values,
        }
    }

    pub fn between(key: impl Into<String>, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Predicate::Between {
            key: key.into(),
            low: low.into(),
            high: high.into(),
        }
    }

    pub fn like(key: impl Into<String>, pattern: impl Into<String>) -> Self {
        Predicate::Like {
            key: key.into(),
            pattern: pattern.into(),
            case_insensitive: false,
        }
    }

    pub fn like_ignore_case(key: impl Into<String>, pattern: impl Into<String>) -> Self {
        Predicate::Like {
            key: key.into(),
            pattern: pattern.into(),
            case_insensitive: true,
        }
    }

    pub fn is_null(key: impl Into<String>) -> Self {
        Predicate::IsNull(key.into())
    }

    pub fn is_not_null(key: impl Into<String>) -> Self {
        Predicate::IsNotNull(key.into())
    }

    /// Conjunction, flattening nested `And`s.
    pub fn and(self, other: Predicate) -> Self {
        match (self, other) {
            (Predicate::True, p) | (p, Predicate::True) => p,
            (Predicate::And(mut a), Predicate::And(b)) => {
                a.extend(b);
                Predicate::And(a)
            }
            (Predicate::And(mut a), p) => {
                a.push(p);
                Predicate::And(a)
            }
            (p, q) => Predicate::And(alloc::vec![p, q]),
        }
    }

    pub fn or(self, other: Predicate) -> Self {
        match (self, other) {
            (Predicate::Or(mut a), Predicate::Or(b)) => {
                a.extend(b);
                Predicate::Or(a)
            }
            (Predicate::Or(mut a), p) => {
                a.push(p);
                Predicate::Or(a)
            }
            (p, q) => Predicate::Or(alloc::vec![p, q]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    /// Resolves attribute keys against `schema` and checks literal types.
    pub fn compile(&self, schema: &Table) -> Result<CompiledPredicate, FetchError> {
        let column = |key: &str| -> Result<(usize, DataType), FetchError> {
            schema
                .get_column(key)
                .map(|c| (c.index(), c.data_type()))
                .ok_or_else(|| FetchError::unknown_attribute(schema.name(), key))
        };
        let check = |key: &str, data_type: DataType, value: &Value| -> Result<(), FetchError> {
            match value.data_type() {
                Some(got) if !data_type.is_comparable_with(got) => {
                    Err(FetchError::type_mismatch(key, data_type, got))
                }
                _ => Ok(()),
            }
        };

        Ok(match self {
            Predicate::True => CompiledPredicate::True,
            Predicate::Compare { key, op, value } => {
                let (index, data_type) = column(key)?;
                check(key, data_type, value)?;
                CompiledPredicate::Compare {
                    index,
                    op: *op,
                    value: value.clone(),
                }
            }
            Predicate::In { key, values } => {
                let (index, data_type) = column(key)?;
                for value in values {
                    check(key, data_type, value)?;
                }
                CompiledPredicate::In {
                    index,
                    values: values.clone(),
                }
            }
            Predicate::Between { key, low, high } => {
                let (index, data_type) = column(key)?;
                check(key, data_type, low)?;
                check(key, data_type, high)?;
                CompiledPredicate::Between {
                    index,
                    low: low.clone(),
                    high: high.clone(),
                }
            }
            Predicate::Like {
                key,
                pattern,
                case_insensitive,
            } => {
                let (index, data_type) = column(key)?;
                if data_type != DataType::String {
                    return Err(FetchError::type_mismatch(key, data_type, DataType::String));
                }
                CompiledPredicate::Like {
                    index,
                    pattern: pattern.clone(),
                    case_insensitive: *case_insensitive,
                }
            }
            Predicate::IsNull(key) => CompiledPredicate::IsNull(column(key)?.0),
            Predicate::IsNotNull(key) => CompiledPredicate::IsNotNull(column(key)?.0),
            Predicate::And(parts) => CompiledPredicate::And(
                parts
                    .iter()
                    .map(|p| p.compile(schema))
                    .collect::<Result<_, _>>()?,
            ),
            Predicate::Or(parts) => CompiledPredicate::Or(
                parts
                    .iter()
                    .map(|p| p.compile(schema))
                    .collect::<Result<_, _>>()?,
            ),
            Predicate::Not(inner) => CompiledPredicate::Not(Box::new(inner.compile(schema)?)),
        })
    }
}

impl Default for Predicate {
    fn default() -> Self {
        Predicate::True
    }
}

/// A predicate bound to column positions of one schema.
#[derive(Clone, Debug)]
pub enum CompiledPredicate {
    True,
    Compare {
        index: usize,
        op: CompareOp,
        value: Value,
    },
    In {
        index: usize,
        values: Vec<Value>,
    },
    Between {
        index: usize,
        low: Value,
        high: Value,
    },
    Like {
        index: usize,
        pattern: String,
        case_insensitive: bool,
    },
    IsNull(usize),
    IsNotNull(usize),
    And(Vec<CompiledPredicate>),
    Or(Vec<CompiledPredicate>),
    Not(Box<CompiledPredicate>),
}

impl CompiledPredicate {
    pub fn eval(&self, row: &Row) -> bool {
        match self {
            CompiledPredicate::True => true,
            CompiledPredicate::Compare { index, op, value } => {
                let Some(field) = row.get(*index) else {
                    return false;
                };
                match op {
                    CompareOp::Eq => field == value,
                    CompareOp::Ne => field != value,
                    _ if field.is_null() || value.is_null() => false,
                    CompareOp::Lt => field < value,
                    CompareOp::Le => field <= value,
                    CompareOp::Gt => field > value,
                    CompareOp::Ge => field >= value,
                }
            }
            CompiledPredicate::In { index, values } => row
                .get(*index)
                .map_or(false, |field| values.iter().any(|v| v == field)),
            CompiledPredicate::Between { index, low, high } => {
                row.get(*index).map_or(false, |field| {
                    !field.is_null() && field >= low && field <= high
                })
            }
            CompiledPredicate::Like {
                index,
                pattern,
                case_insensitive,
            } => match row.get(*index).and_then(|v| v.as_str()) {
                Some(s) if *case_insensitive => pattern_match::like_ignore_case(s, pattern),
                Some(s) => pattern_match::like(s, pattern),
                None => false,
            },
            CompiledPredicate::IsNull(index) => row.get(*index).map_or(true, |v| v.is_null()),
            CompiledPredicate::IsNotNull(index) => row.get(*index).map_or(false, |v| !v.is_null()),
            CompiledPredicate::And(parts) => parts.iter().all(|p| p.eval(row)),
            CompiledPredicate::Or(parts) => parts.iter().any(|p| p.eval(row)),
            CompiledPredicate::Not(inner) => !inner.eval(row),
        }
    }
}

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
            .add_column("site_id", DataType::Int64)
            .unwrap()
            .add_column("price", DataType::Float64)
            .unwrap()
            .add_nullable(&["price"])
            .build()
            .unwrap()
    }

    fn product(id: u64, name: &str, site: i64, price: Option<f64>) -> Row {
        Row::new(
            id,
            vec![
                Value::String(name.into()),
                Value::Int64(site),
                price.map_or(Value::Null, Value::Float64),
            ],
        )
    }

    #[test]
    fn test_compare() {
        let schema = products();
        let p = Predicate::eq("site_id", 134i64).compile(&schema).unwrap();
        assert!(p.eval(&product(1, "Zap", 134, None)));
        assert!(!p.eval(&product(2, "Zap", 7, None)));

        // Int literal against a float column compares numerically.
        let p = Predicate::gt("price", 10i64).compile(&schema).unwrap();
        assert!(p.eval(&product(1, "a", 1, Some(10.5))));
        assert!(!p.eval(&product(1, "a", 1, Some(9.0))));
        assert!(!p.eval(&product(1, "a", 1, None)));
    }

    #[test]
    fn test_null_checks() {
        let schema = products();
        let null = Predicate::is_null("price").compile(&schema).unwrap();
        let not_null = Predicate::is_not_null("price").compile(&schema).unwrap();
        let row = product(1, "a", 1, None);
        assert!(null.eval(&row));
        assert!(!not_null.eval(&row));
    }

    #[test]
    fn test_like_in_between() {
        let schema = products();
        let row = product(1, "Fun House", 5, Some(3.0));

        assert!(Predicate::like_ignore_case("name", "fun%").compile(&schema).unwrap().eval(&row));
        assert!(!Predicate::like("name", "fun%").compile(&schema).unwrap().eval(&row));
        assert!(Predicate::in_list("site_id", vec![Value::Int64(4), Value::Int64(5)])
            .compile(&schema)
            .unwrap()
            .eval(&row));
        assert!(Predicate::between("price", 3.0, 4.0).compile(&schema).unwrap().eval(&row));
    }

    #[test]
    fn test_combinators() {
        let schema = products();
        let p = Predicate::eq("site_id", 1i64)
            .and(Predicate::like("name", "Z%"))
            .or(Predicate::is_null("price").not().not().and(Predicate::eq("site_id", 2i64)));
        let p = p.compile(&schema).unwrap();

        assert!(p.eval(&product(1, "Zap", 1, Some(1.0))));
        assert!(!p.eval(&product(2, "Ant", 1, Some(1.0))));
        assert!(p.eval(&product(3, "Ant", 2, None)));
        assert_eq!(Predicate::True.and(Predicate::is_null("x")), Predicate::is_null("x"));
    }

    #[test]
    fn test_compile_errors() {
        let schema = products();
        assert!(matches!(
            Predicate::eq("nope", 1i64).compile(&schema),
            Err(FetchError::UnknownAttribute { .. })
        ));
        assert!(matches!(
            Predicate::eq("site_id", "x").compile(&schema),
            Err(FetchError::TypeMismatch { .. })
        ));
        assert!(matches!(
            Predicate::like("site_id", "1%").compile(&schema),
            Err(FetchError::TypeMismatch { .. })
        ));
    }
}
