//! The four arithmetic tools.

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArithmeticError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow in {0}")]
    Overflow(&'static str),
}

pub fn multiply(a: i64, b: i64) -> Result<i64, ArithmeticError> {
    a.checked_mul(b).ok_or(ArithmeticError::Overflow("multiply"))
}

pub fn add(a: i64, b: i64) -> Result<i64, ArithmeticError> {
    a.checked_add(b).ok_or(ArithmeticError::Overflow("add"))
}

pub fn subtract(a: i64, b: i64) -> Result<i64, ArithmeticError> {
    a.checked_sub(b).ok_or(ArithmeticError::Overflow("subtract"))
}

/// True quotient: `divide(7, 2) == 3.5`.
pub fn divide(a: i64, b: i64) -> Result<f64, ArithmeticError> {
    if b == 0 {
        return Err(ArithmeticError::DivisionByZero);
    }
    Ok(a as f64 / b as f64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Multiply,
    Add,
    Subtract,
    Divide,
}

impl Operation {
    pub const ALL: [Operation; 4] = [Self::Multiply, Self::Add, Self::Subtract, Self::Divide];

    pub fn name(self) -> &'static str {
        match self {
            Self::Multiply => "Multiply",
            Self::Add => "Add",
            Self::Subtract => "Subtract",
            Self::Divide => "Divide",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Multiply => "Multiply two integers.",
            Self::Add => "Add two integers.",
            Self::Subtract => "Subtract two integers.",
            Self::Divide => "Divide two integers.",
        }
    }

    /// Argument schema shared by all four operations.
    pub fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "a": {
                    "type": "integer",
                    "description": "The first integer.",
                },
                "b": {
                    "type": "integer",
                    "description": "The second integer.",
                },
            },
            "required": ["a", "b"],
        })
    }

    pub fn apply(self, args: ArithmeticArgs) -> Result<Value, ArithmeticError> {
        let ArithmeticArgs { a, b } = args;
        Ok(match self {
            Self::Multiply => json!(multiply(a, b)?),
            Self::Add => json!(add(a, b)?),
            Self::Subtract => json!(subtract(a, b)?),
            Self::Divide => json!(divide(a, b)?),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ArithmeticArgs {
    #[serde(deserialize_with = "integer")]
    pub a: i64,
    #[serde(deserialize_with = "integer")]
    pub b: i64,
}

/// Accepts `6`, `6.0` and `"6"`; rejects `6.5`, `true`, `null`.
fn integer<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    coerce_integer(&value)
        .ok_or_else(|| de::Error::custom(format!("expected an integer, got {value}")))
}

fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
