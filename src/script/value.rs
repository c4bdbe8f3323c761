//! Runtime value types for script execution.

use crate::gateway::Point;
use crate::script::text::quote;
use std::fmt;

/// A dynamic script value.
///
/// Variables are stringly typed at the language level: conditions compare
/// [`as_string`](Value::as_string) renderings and numeric comparisons coerce
/// through [`as_number`](Value::as_number).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// String value.
    String(String),
    /// Numeric value.
    Number(f64),
    /// Boolean value.
    Bool(bool),
    /// Coordinates returned by `findText` / `findImage`.
    Point(i32, i32),
    /// "Not found" result of a search.
    Null,
}

impl Value {
    /// Convert the value to a string.
    pub fn as_string(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Number(n) => format_number(*n),
            Value::Bool(b) => b.to_string(),
            Value::Point(x, y) => format!("{},{}", x, y),
            Value::Null => "null".to_string(),
        }
    }

    /// Try to convert the value to a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Point(..) | Value::Null => None,
        }
    }

    /// Truthiness of a lone term in a condition: its string form must read
    /// `true`.
    pub fn is_true(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            other => other.as_string().trim().eq_ignore_ascii_case("true"),
        }
    }

    /// Render the value as a script literal that evaluates back to an
    /// equivalent value.
    pub fn to_literal(&self) -> String {
        match self {
            Value::String(s) => quote(s),
            Value::Point(x, y) => format!("\"{},{}\"", x, y),
            other => other.as_string(),
        }
    }

    /// Get the type name of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Number(_) => "number",
            Value::Bool(_) => "bool",
            Value::Point(..) => "point",
            Value::Null => "null",
        }
    }
}

/// Integral numbers print without a fractional part.
pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Option<Point>> for Value {
    fn from(point: Option<Point>) -> Self {
        match point {
            Some(p) => Value::Point(p.x, p.y),
            None => Value::Null,
        }
    }
}
