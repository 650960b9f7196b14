//! Literal values used by `literal(..)` schemas, variants and union tags.
use std::fmt;
use std::hash::{Hash, Hasher};

use ordered_float::OrderedFloat;
use serde_json::Value;

/// A constant a value must equal.
///
/// Numbers compare by their `f64` value so `1` and `1.0` are the same literal.
/// Arrays and objects are kept as raw JSON and compared structurally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Null,
    Bool(bool),
    Number(OrderedFloat<f64>),
    String(String),
    Json(Value),
}

impl Literal {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Literal::Null,
            Value::Bool(b) => Literal::Bool(*b),
            Value::Number(n) => match n.as_f64() {
                Some(f) => Literal::Number(OrderedFloat(f)),
                None => Literal::Json(value.clone()),
            },
            Value::String(s) => Literal::String(s.clone()),
            Value::Array(_) | Value::Object(_) => Literal::Json(value.clone()),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Number(n) => number_value(n.0),
            Literal::String(s) => Value::String(s.clone()),
            Literal::Json(v) => v.clone(),
        }
    }

    /// True when `value` is this literal.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Literal::Null, Value::Null) => true,
            (Literal::Bool(a), Value::Bool(b)) => a == b,
            (Literal::Number(a), Value::Number(b)) => b.as_f64().is_some_and(|b| OrderedFloat(b) == *a),
            (Literal::String(a), Value::String(b)) => a == b,
            (Literal::Json(a), b) => a == b,
            _ => false,
        }
    }

    /// Primitive literals can key a discriminant index.
    pub fn is_primitive(&self) -> bool {
        !matches!(self, Literal::Json(_))
    }
}

// keeps integral floats rendering as integers (`1` rather than `1.0`)
fn number_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.is_finite() && f.abs() < (i64::MAX as f64) {
        Value::from(f as i64)
    } else {
        serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
    }
}

impl Hash for Literal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Literal::Null | Literal::Json(_) => {}
            Literal::Bool(b) => b.hash(state),
            Literal::Number(n) => n.hash(state),
            Literal::String(s) => s.hash(state),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self { Literal::String(s.to_string()) }
}

impl From<String> for Literal {
    fn from(s: String) -> Self { Literal::String(s) }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self { Literal::Bool(b) }
}

impl From<i64> for Literal {
    fn from(n: i64) -> Self { Literal::Number(OrderedFloat(n as f64)) }
}

impl From<i32> for Literal {
    fn from(n: i32) -> Self { Literal::Number(OrderedFloat(n as f64)) }
}

impl From<f64> for Literal {
    fn from(n: f64) -> Self { Literal::Number(OrderedFloat(n)) }
}

impl From<Value> for Literal {
    fn from(value: Value) -> Self { Literal::from_value(&value) }
}

impl From<()> for Literal {
    fn from(_: ()) -> Self { Literal::Null }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_match_across_integer_and_float_forms() {
        let lit = Literal::from(1);
        assert!(lit.matches(&json!(1)));
        assert!(lit.matches(&json!(1.0)));
        assert!(!lit.matches(&json!("1")));
        assert_eq!(lit.to_value(), json!(1));
    }

    #[test]
    fn composite_literals_compare_structurally() {
        let lit = Literal::from(json!({"a": [1, 2]}));
        assert!(!lit.is_primitive());
        assert!(lit.matches(&json!({"a": [1, 2]})));
        assert!(!lit.matches(&json!({"a": [2, 1]})));
    }
}
