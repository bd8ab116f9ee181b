// ABOUTME: Error types for parsing and evaluation failures in the condition language

use crate::value::Value;
use thiserror::Error;

/// Errors produced while turning condition text into an expression tree.
///
/// Every variant carries the byte offset of the offending token so callers
/// can point at the exact spot in the source text.
#[derive(Error, Debug, Clone)]
pub enum ParseError {
    #[error("illegal token {lexeme:?} at offset {pos}")]
    IllegalToken { lexeme: String, pos: usize },

    #[error("unexpected {found} at offset {pos}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: String,
        pos: usize,
    },

    #[error("unterminated string literal starting at offset {pos}")]
    UnterminatedString { pos: usize },

    #[error("unterminated regex literal starting at offset {pos}")]
    UnterminatedRegex { pos: usize },

    #[error("malformed variable reference at offset {pos}")]
    MalformedVariable { pos: usize },

    /// A number, string, list, or regex literal where a boolean expression
    /// is required (an operand of AND/OR/XOR/NAND).
    #[error("operand of {op} at offset {pos} is not a boolean expression")]
    NonBooleanOperand { op: String, pos: usize },

    #[error("comparisons cannot be chained (offset {pos})")]
    ChainedComparison { pos: usize },

    #[error("regex literal at offset {pos} is only valid on the right side of =~ or !~")]
    MisplacedRegex { pos: usize },

    #[error("invalid regex at offset {pos}: {source}")]
    InvalidRegex {
        pos: usize,
        #[source]
        source: regex::Error,
    },

    #[error("invalid number {lexeme:?} at offset {pos}")]
    InvalidNumber { lexeme: String, pos: usize },
}

/// Errors produced while evaluating an expression tree against an
/// environment. Evaluation halts at the first error; branches skipped by
/// AND/OR short-circuiting never surface one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("unknown variable: {0}")]
    UnknownVariable(String),

    /// Operator is not defined for the operand kinds it received.
    #[error("{op}: cannot combine {lhs} and {rhs}")]
    TypeMismatch {
        op: String,
        lhs: String,
        rhs: String,
    },

    /// Operand has the wrong shape for the operator, e.g. HAS with a list
    /// on the right or INTERSECTS over a list of numbers.
    #[error("{op}: {detail}")]
    InvalidOperand { op: String, detail: String },

    /// The left side of =~ / !~ did not evaluate to a string.
    #[error("left side of {op} evaluates to {actual}, expected a string")]
    RegexOperand { op: String, actual: String },

    /// The root expression evaluated to something other than a boolean.
    #[error("condition evaluates to {actual}, expected a boolean")]
    NonBooleanCondition { actual: String },
}

impl EvalError {
    /// Create a type mismatch error from the two offending values
    pub fn type_mismatch(op: &str, lhs: &Value, rhs: &Value) -> Self {
        EvalError::TypeMismatch {
            op: op.to_string(),
            lhs: lhs.type_name().to_string(),
            rhs: rhs.type_name().to_string(),
        }
    }

    /// Create an invalid operand error with operator context
    pub fn invalid_operand(op: &str, detail: impl Into<String>) -> Self {
        EvalError::InvalidOperand {
            op: op.to_string(),
            detail: detail.into(),
        }
    }

    /// Create a regex operand error for a non-string match subject
    pub fn regex_operand(op: &str, actual: &Value) -> Self {
        EvalError::RegexOperand {
            op: op.to_string(),
            actual: actual.type_name().to_string(),
        }
    }
}

/// Errors produced while ingesting a JSON document as an environment.
#[derive(Error, Debug)]
pub enum EnvError {
    #[error("environment JSON must be an object")]
    NotAnObject,

    #[error("unsupported value for {key:?}: {detail}")]
    Unsupported { key: String, detail: String },

    #[error("invalid environment JSON: {0}")]
    Json(#[from] serde_json::Error),
}
