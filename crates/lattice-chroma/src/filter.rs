//! Chroma where-clause compiler
//!
//! Translates the metadata filter AST into the JSON where-clauses the
//! Chroma query endpoint evaluates server-side.

use lattice_core::filter::FilterExpression;
use serde_json::{json, Value};

/// Compile a filter into a Chroma where-clause
pub fn compile(expr: &FilterExpression) -> Value {
    match expr {
        FilterExpression::Eq(key, value) => operator(key, "$eq", value.clone()),
        FilterExpression::Ne(key, value) => operator(key, "$ne", value.clone()),
        FilterExpression::Gt(key, value) => operator(key, "$gt", value.clone()),
        FilterExpression::Gte(key, value) => operator(key, "$gte", value.clone()),
        FilterExpression::Lt(key, value) => operator(key, "$lt", value.clone()),
        FilterExpression::Lte(key, value) => operator(key, "$lte", value.clone()),
        FilterExpression::In(key, values) => operator(key, "$in", Value::Array(values.clone())),
        FilterExpression::Nin(key, values) => operator(key, "$nin", Value::Array(values.clone())),
        FilterExpression::And(left, right) => json!({ "$and": [compile(left), compile(right)] }),
        FilterExpression::Or(left, right) => json!({ "$or": [compile(left), compile(right)] }),
        // Chroma has no $not; push the negation down De Morgan style
        FilterExpression::Not(inner) => compile(&negate(inner)),
    }
}

fn operator(key: &str, op: &str, value: Value) -> Value {
    json!({ key: { op: value } })
}

fn negate(expr: &FilterExpression) -> FilterExpression {
    match expr {
        FilterExpression::Eq(k, v) => FilterExpression::Ne(k.clone(), v.clone()),
        FilterExpression::Ne(k, v) => FilterExpression::Eq(k.clone(), v.clone()),
        FilterExpression::Gt(k, v) => FilterExpression::Lte(k.clone(), v.clone()),
        FilterExpression::Gte(k, v) => FilterExpression::Lt(k.clone(), v.clone()),
        FilterExpression::Lt(k, v) => FilterExpression::Gte(k.clone(), v.clone()),
        FilterExpression::Lte(k, v) => FilterExpression::Gt(k.clone(), v.clone()),
        FilterExpression::In(k, vs) => FilterExpression::Nin(k.clone(), vs.clone()),
        FilterExpression::Nin(k, vs) => FilterExpression::In(k.clone(), vs.clone()),
        FilterExpression::And(l, r) => {
            FilterExpression::Or(Box::new(negate(l)), Box::new(negate(r)))
        }
        FilterExpression::Or(l, r) => {
            FilterExpression::And(Box::new(negate(l)), Box::new(negate(r)))
        }
        FilterExpression::Not(inner) => (**inner).clone(),
    }
}
