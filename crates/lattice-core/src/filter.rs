//! Metadata filter expressions
//!
//! A structured boolean expression over document metadata fields. Each
//! vector store crate owns the compiler from this AST into its native
//! query syntax (Cosmos SQL fragments, Chroma where-clauses).

use serde_json::Value;

/// A boolean filter over metadata fields
///
/// Comparison and membership variants carry the metadata key and the
/// literal value(s) to compare against.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpression {
    Eq(String, Value),
    Ne(String, Value),
    Gt(String, Value),
    Gte(String, Value),
    Lt(String, Value),
    Lte(String, Value),
    In(String, Vec<Value>),
    Nin(String, Vec<Value>),
    And(Box<FilterExpression>, Box<FilterExpression>),
    Or(Box<FilterExpression>, Box<FilterExpression>),
    Not(Box<FilterExpression>),
}

impl FilterExpression {
    /// Combine with another expression via AND
    pub fn and(self, other: FilterExpression) -> FilterExpression {
        FilterExpression::And(Box::new(self), Box::new(other))
    }

    /// Combine with another expression via OR
    pub fn or(self, other: FilterExpression) -> FilterExpression {
        FilterExpression::Or(Box::new(self), Box::new(other))
    }

    /// Negate this expression
    pub fn negate(self) -> FilterExpression {
        FilterExpression::Not(Box::new(self))
    }
}

/// `key == value`
pub fn eq(key: impl Into<String>, value: impl Into<Value>) -> FilterExpression {
    FilterExpression::Eq(key.into(), value.into())
}

/// `key != value`
pub fn ne(key: impl Into<String>, value: impl Into<Value>) -> FilterExpression {
    FilterExpression::Ne(key.into(), value.into())
}

/// `key > value`
pub fn gt(key: impl Into<String>, value: impl Into<Value>) -> FilterExpression {
    FilterExpression::Gt(key.into(), value.into())
}

/// `key >= value`
pub fn gte(key: impl Into<String>, value: impl Into<Value>) -> FilterExpression {
    FilterExpression::Gte(key.into(), value.into())
}

/// `key < value`
pub fn lt(key: impl Into<String>, value: impl Into<Value>) -> FilterExpression {
    FilterExpression::Lt(key.into(), value.into())
}

/// `key <= value`
pub fn lte(key: impl Into<String>, value: impl Into<Value>) -> FilterExpression {
    FilterExpression::Lte(key.into(), value.into())
}

/// `key in [values...]`
pub fn in_list<V: Into<Value>>(
    key: impl Into<String>,
    values: Vec<V>,
) -> FilterExpression {
    FilterExpression::In(key.into(), values.into_iter().map(Into::into).collect())
}

/// `key not in [values...]`
pub fn nin_list<V: Into<Value>>(
    key: impl Into<String>,
    values: Vec<V>,
) -> FilterExpression {
    FilterExpression::Nin(key.into(), values.into_iter().map(Into::into).collect())
}
