//! Runtime value representation
//!
//! Integers of every C type are held as `i64` and truncated to the declared
//! width whenever they are stored. String literals only ever flow into
//! `printf`.

/// Runtime values in the interpreter
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Value {
    Int(i64),
    Str(String),
    #[default]
    Uninitialized,
}

impl Value {
    pub fn is_initialized(&self) -> bool {
        !matches!(self, Value::Uninitialized)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Short description for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Str(_) => "string",
            Value::Uninitialized => "uninitialized value",
        }
    }
}
