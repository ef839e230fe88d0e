//! Cosmos SQL filter compiler
//!
//! Translates the metadata filter AST into boolean fragments of the
//! store's SQL dialect. Metadata keys resolve under the `metadata`
//! subtree of the wire record, which is the indexed one.

use lattice_core::filter::FilterExpression;
use serde_json::Value;

/// Compile a filter into a Cosmos SQL boolean fragment
pub fn compile(expr: &FilterExpression) -> String {
    match expr {
        FilterExpression::Eq(key, value) => comparison(key, "=", value),
        FilterExpression::Ne(key, value) => comparison(key, "!=", value),
        FilterExpression::Gt(key, value) => comparison(key, ">", value),
        FilterExpression::Gte(key, value) => comparison(key, ">=", value),
        FilterExpression::Lt(key, value) => comparison(key, "<", value),
        FilterExpression::Lte(key, value) => comparison(key, "<=", value),
        FilterExpression::In(key, values) => membership(key, values),
        FilterExpression::Nin(key, values) => format!("NOT ({})", membership(key, values)),
        FilterExpression::And(left, right) => {
            format!("({} AND {})", compile(left), compile(right))
        }
        FilterExpression::Or(left, right) => {
            format!("({} OR {})", compile(left), compile(right))
        }
        FilterExpression::Not(inner) => format!("NOT ({})", compile(inner)),
    }
}

fn field_ref(key: &str) -> String {
    format!("c.metadata.{key}")
}

fn comparison(key: &str, op: &str, value: &Value) -> String {
    format!("{} {} {}", field_ref(key), op, literal(value))
}

fn membership(key: &str, values: &[Value]) -> String {
    // An empty membership list can never match
    if values.is_empty() {
        return "false".to_string();
    }

    let rendered: Vec<String> = values.iter().map(literal).collect();
    format!("{} IN ({})", field_ref(key), rendered.join(", "))
}

fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => {
            let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
            format!("\"{escaped}\"")
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_core::filter::{eq, gt, in_list, ne, nin_list};

    #[test]
    fn test_equality() {
        assert_eq!(
            compile(&eq("author", "john")),
            r#"c.metadata.author = "john""#
        );
        assert_eq!(compile(&ne("author", "jack")), r#"c.metadata.author != "jack""#);
    }

    #[test]
    fn test_numeric_comparison() {
        assert_eq!(compile(&gt("year", 2020)), "c.metadata.year > 2020");
    }

    #[test]
    fn test_membership() {
        assert_eq!(
            compile(&in_list("author", vec!["john", "jill"])),
            r#"c.metadata.author IN ("john", "jill")"#
        );
    }

    #[test]
    fn test_negated_membership() {
        assert_eq!(
            compile(&nin_list("author", vec!["jack"])),
            r#"NOT (c.metadata.author IN ("jack"))"#
        );
    }

    #[test]
    fn test_empty_membership_never_matches() {
        assert_eq!(compile(&in_list("author", Vec::<String>::new())), "false");
    }

    // The worked example: author in [john, jill] AND article_type == blog
    // narrows three documents {1: john/blog, 2: jack/social, 3: jill/paper}
    // down to {1}; the OR variant widens to {1, 3}.
    #[test]
    fn test_and_composition() {
        let expr = in_list("author", vec!["john", "jill"]).and(eq("article_type", "blog"));
        assert_eq!(
            compile(&expr),
            r#"(c.metadata.author IN ("john", "jill") AND c.metadata.article_type = "blog")"#
        );
    }

    #[test]
    fn test_or_composition() {
        let expr = in_list("author", vec!["john"]).or(eq("article_type", "paper"));
        assert_eq!(
            compile(&expr),
            r#"(c.metadata.author IN ("john") OR c.metadata.article_type = "paper")"#
        );
    }

    #[test]
    fn test_nested_composition_parenthesizes() {
        let expr = eq("a", 1).and(eq("b", 2).or(eq("c", 3)));
        assert_eq!(
            compile(&expr),
            "(c.metadata.a = 1 AND (c.metadata.b = 2 OR c.metadata.c = 3))"
        );
    }

    #[test]
    fn test_string_literal_escaping() {
        let expr = eq("title", r#"he said "hi""#);
        assert_eq!(
            compile(&expr),
            r#"c.metadata.title = "he said \"hi\"""#
        );
    }
}
