use thiserror::Error;

/// Result type local to gridsql-plan.
pub type Result<T> = std::result::Result<T, PlanError>;

/// Malformed, truncated, or invariant-violating plan bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanDecodeError {
    #[error("truncated input reading {what}: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        what: &'static str,
        needed: usize,
        remaining: usize,
    },

    #[error("unknown {what} tag {tag}")]
    UnknownTag { what: &'static str, tag: u8 },

    #[error("invalid length {len} for {what}")]
    InvalidLength { what: &'static str, len: i64 },

    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,

    #[error("invalid field: {0}")]
    InvalidField(String),

    #[error("plan nested deeper than {0} levels")]
    TooDeep(usize),

    #[error("{0} trailing bytes after plan root")]
    TrailingBytes(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// A node or expression was built with fields that break its invariants.
    #[error("invalid plan node: {0}")]
    Invariant(String),

    #[error(transparent)]
    Decode(#[from] PlanDecodeError),
}

/// Row-level evaluation failure of an expression or aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("column {index} out of range for row of width {width}")]
    ColumnOutOfRange { index: i32, width: usize },

    #[error("division by zero")]
    DivisionByZero,

    #[error("numeric overflow in {0}")]
    Overflow(&'static str),
}
