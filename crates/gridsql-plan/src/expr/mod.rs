//! Row evaluators used by plan nodes.
//!
//! SQL semantics in brief: any NULL operand of a comparison or arithmetic
//! yields NULL; AND/OR/NOT use three-valued logic; integer arithmetic is
//! checked; numerics widen I32 -> I64 -> F64.

pub mod aggregate;

use std::cmp::Ordering;
use std::fmt;

use gridsql_core::types::{Row, Scalar};

use crate::codec::{PlanReader, PlanWriter, WireObject};
use crate::error::{EvalError, PlanDecodeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    fn matches(self, ord: Ordering) -> bool {
        match self {
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::NotEq => ord != Ordering::Equal,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::LtEq => ord != Ordering::Greater,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::GtEq => ord != Ordering::Less,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "<>",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        }
    }

    fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => CompareOp::Eq,
            1 => CompareOp::NotEq,
            2 => CompareOp::Lt,
            3 => CompareOp::LtEq,
            4 => CompareOp::Gt,
            5 => CompareOp::GtEq,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl ArithmeticOp {
    fn symbol(self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Subtract => "-",
            ArithmeticOp::Multiply => "*",
            ArithmeticOp::Divide => "/",
        }
    }

    fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => ArithmeticOp::Add,
            1 => ArithmeticOp::Subtract,
            2 => ArithmeticOp::Multiply,
            3 => ArithmeticOp::Divide,
            _ => return None,
        })
    }

    fn apply_i64(self, a: i64, b: i64) -> Result<i64, EvalError> {
        let out = match self {
            ArithmeticOp::Add => a.checked_add(b),
            ArithmeticOp::Subtract => a.checked_sub(b),
            ArithmeticOp::Multiply => a.checked_mul(b),
            ArithmeticOp::Divide => {
                if b == 0 {
                    return Err(EvalError::DivisionByZero);
                }
                a.checked_div(b)
            }
        };
        out.ok_or(EvalError::Overflow(self.symbol()))
    }

    fn apply_f64(self, a: f64, b: f64) -> Result<f64, EvalError> {
        Ok(match self {
            ArithmeticOp::Add => a + b,
            ArithmeticOp::Subtract => a - b,
            ArithmeticOp::Multiply => a * b,
            ArithmeticOp::Divide => {
                if b == 0.0 {
                    return Err(EvalError::DivisionByZero);
                }
                a / b
            }
        })
    }
}

/// Scalar expression over a single row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expression {
    /// Zero-based column reference.
    Column(i32),
    Literal(Scalar),
    Compare {
        op: CompareOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
    IsNull(Box<Expression>),
}

/// Column reference shorthand.
pub fn col(index: i32) -> Expression {
    Expression::Column(index)
}

/// Literal shorthand.
pub fn lit(value: impl Into<Scalar>) -> Expression {
    Expression::Literal(value.into())
}

impl Expression {
    pub fn compare(op: CompareOp, left: Expression, right: Expression) -> Self {
        Expression::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn arithmetic(op: ArithmeticOp, left: Expression, right: Expression) -> Self {
        Expression::Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn equal(self, other: Expression) -> Self {
        Self::compare(CompareOp::Eq, self, other)
    }

    pub fn not_equal(self, other: Expression) -> Self {
        Self::compare(CompareOp::NotEq, self, other)
    }

    pub fn lt(self, other: Expression) -> Self {
        Self::compare(CompareOp::Lt, self, other)
    }

    pub fn lt_eq(self, other: Expression) -> Self {
        Self::compare(CompareOp::LtEq, self, other)
    }

    pub fn gt(self, other: Expression) -> Self {
        Self::compare(CompareOp::Gt, self, other)
    }

    pub fn gt_eq(self, other: Expression) -> Self {
        Self::compare(CompareOp::GtEq, self, other)
    }

    pub fn plus(self, other: Expression) -> Self {
        Self::arithmetic(ArithmeticOp::Add, self, other)
    }

    pub fn minus(self, other: Expression) -> Self {
        Self::arithmetic(ArithmeticOp::Subtract, self, other)
    }

    pub fn times(self, other: Expression) -> Self {
        Self::arithmetic(ArithmeticOp::Multiply, self, other)
    }

    pub fn divide(self, other: Expression) -> Self {
        Self::arithmetic(ArithmeticOp::Divide, self, other)
    }

    pub fn and(self, other: Expression) -> Self {
        Expression::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Expression) -> Self {
        Expression::Or(Box::new(self), Box::new(other))
    }

    pub fn negate(self) -> Self {
        Expression::Not(Box::new(self))
    }

    pub fn is_null(self) -> Self {
        Expression::IsNull(Box::new(self))
    }

    /// Largest column index referenced, if any.
    pub fn max_column(&self) -> Option<i32> {
        match self {
            Expression::Column(i) => Some(*i),
            Expression::Literal(_) => None,
            Expression::Compare { left, right, .. }
            | Expression::Arithmetic { left, right, .. }
            | Expression::And(left, right)
            | Expression::Or(left, right) => left.max_column().max(right.max_column()),
            Expression::Not(inner) | Expression::IsNull(inner) => inner.max_column(),
        }
    }

    pub fn evaluate(&self, row: &Row) -> Result<Scalar, EvalError> {
        match self {
            Expression::Column(idx) => {
                let value = usize::try_from(*idx).ok().and_then(|i| row.get(i));
                value.cloned().ok_or(EvalError::ColumnOutOfRange {
                    index: *idx,
                    width: row.width(),
                })
            }
            Expression::Literal(v) => Ok(v.clone()),
            Expression::Compare { op, left, right } => {
                let l = left.evaluate(row)?;
                let r = right.evaluate(row)?;
                if l.is_null() || r.is_null() {
                    return Ok(Scalar::Null);
                }
                let ord = l.sql_cmp(&r).ok_or_else(|| {
                    EvalError::TypeMismatch(format!(
                        "cannot compare {} {} {}",
                        l.type_name(),
                        op.symbol(),
                        r.type_name()
                    ))
                })?;
                Ok(Scalar::Bool(op.matches(ord)))
            }
            Expression::Arithmetic { op, left, right } => {
                let l = left.evaluate(row)?;
                let r = right.evaluate(row)?;
                arithmetic(*op, &l, &r)
            }
            Expression::And(left, right) => {
                let l = as_bool(left.evaluate(row)?, "AND")?;
                if l == Some(false) {
                    return Ok(Scalar::Bool(false));
                }
                let r = as_bool(right.evaluate(row)?, "AND")?;
                Ok(match (l, r) {
                    (_, Some(false)) => Scalar::Bool(false),
                    (Some(true), Some(true)) => Scalar::Bool(true),
                    _ => Scalar::Null,
                })
            }
            Expression::Or(left, right) => {
                let l = as_bool(left.evaluate(row)?, "OR")?;
                if l == Some(true) {
                    return Ok(Scalar::Bool(true));
                }
                let r = as_bool(right.evaluate(row)?, "OR")?;
                Ok(match (l, r) {
                    (_, Some(true)) => Scalar::Bool(true),
                    (Some(false), Some(false)) => Scalar::Bool(false),
                    _ => Scalar::Null,
                })
            }
            Expression::Not(inner) => Ok(match as_bool(inner.evaluate(row)?, "NOT")? {
                Some(v) => Scalar::Bool(!v),
                None => Scalar::Null,
            }),
            Expression::IsNull(inner) => Ok(Scalar::Bool(inner.evaluate(row)?.is_null())),
        }
    }

    /// Filter semantics: only TRUE passes; FALSE and NULL do not.
    pub fn evaluate_predicate(&self, row: &Row) -> Result<bool, EvalError> {
        Ok(as_bool(self.evaluate(row)?, "predicate")? == Some(true))
    }
}

fn as_bool(v: Scalar, ctx: &str) -> Result<Option<bool>, EvalError> {
    match v {
        Scalar::Bool(b) => Ok(Some(b)),
        Scalar::Null => Ok(None),
        other => Err(EvalError::TypeMismatch(format!(
            "{ctx} expects BOOLEAN, got {}",
            other.type_name()
        ))),
    }
}

fn arithmetic(op: ArithmeticOp, l: &Scalar, r: &Scalar) -> Result<Scalar, EvalError> {
    use Scalar::*;
    match (l, r) {
        (Null, _) | (_, Null) => Ok(Null),
        (I32(a), I32(b)) => {
            let v = op.apply_i64(*a as i64, *b as i64)?;
            i32::try_from(v)
                .map(I32)
                .map_err(|_| EvalError::Overflow(op.symbol()))
        }
        (I32(_) | I64(_), I32(_) | I64(_)) => {
            // Both sides are integral here, so as_i64 cannot fail.
            let (a, b) = (l.as_i64().unwrap_or_default(), r.as_i64().unwrap_or_default());
            Ok(I64(op.apply_i64(a, b)?))
        }
        _ => match (l.as_f64(), r.as_f64()) {
            (Some(a), Some(b)) => Ok(F64(op.apply_f64(a, b)?)),
            _ => Err(EvalError::TypeMismatch(format!(
                "cannot apply {} to {} and {}",
                op.symbol(),
                l.type_name(),
                r.type_name()
            ))),
        },
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Column(i) => write!(f, "${i}"),
            Expression::Literal(v) => write!(f, "{v}"),
            Expression::Compare { op, left, right } => {
                write!(f, "({left} {} {right})", op.symbol())
            }
            Expression::Arithmetic { op, left, right } => {
                write!(f, "({left} {} {right})", op.symbol())
            }
            Expression::And(l, r) => write!(f, "({l} AND {r})"),
            Expression::Or(l, r) => write!(f, "({l} OR {r})"),
            Expression::Not(e) => write!(f, "NOT {e}"),
            Expression::IsNull(e) => write!(f, "{e} IS NULL"),
        }
    }
}

const EXPR_COLUMN: u8 = 0;
const EXPR_LITERAL: u8 = 1;
const EXPR_COMPARE: u8 = 2;
const EXPR_ARITHMETIC: u8 = 3;
const EXPR_AND: u8 = 4;
const EXPR_OR: u8 = 5;
const EXPR_NOT: u8 = 6;
const EXPR_IS_NULL: u8 = 7;

impl WireObject for Expression {
    fn write_to(&self, out: &mut PlanWriter) {
        match self {
            Expression::Column(i) => {
                out.write_byte(EXPR_COLUMN);
                out.write_int(*i);
            }
            Expression::Literal(v) => {
                out.write_byte(EXPR_LITERAL);
                out.write_object(v);
            }
            Expression::Compare { op, left, right } => {
                out.write_byte(EXPR_COMPARE);
                out.write_byte(*op as u8);
                out.write_object(left.as_ref());
                out.write_object(right.as_ref());
            }
            Expression::Arithmetic { op, left, right } => {
                out.write_byte(EXPR_ARITHMETIC);
                out.write_byte(*op as u8);
                out.write_object(left.as_ref());
                out.write_object(right.as_ref());
            }
            Expression::And(l, r) => {
                out.write_byte(EXPR_AND);
                out.write_object(l.as_ref());
                out.write_object(r.as_ref());
            }
            Expression::Or(l, r) => {
                out.write_byte(EXPR_OR);
                out.write_object(l.as_ref());
                out.write_object(r.as_ref());
            }
            Expression::Not(e) => {
                out.write_byte(EXPR_NOT);
                out.write_object(e.as_ref());
            }
            Expression::IsNull(e) => {
                out.write_byte(EXPR_IS_NULL);
                out.write_object(e.as_ref());
            }
        }
    }

    fn read_from(input: &mut PlanReader) -> Result<Self, PlanDecodeError> {
        let tag = input.read_byte("expression tag")?;
        Ok(match tag {
            EXPR_COLUMN => {
                let idx = input.read_int("column index")?;
                if idx < 0 {
                    return Err(PlanDecodeError::InvalidField(format!(
                        "negative column index {idx}"
                    )));
                }
                Expression::Column(idx)
            }
            EXPR_LITERAL => Expression::Literal(input.read_object()?),
            EXPR_COMPARE => {
                let raw = input.read_byte("compare op")?;
                let op = CompareOp::from_u8(raw).ok_or(PlanDecodeError::UnknownTag {
                    what: "compare op",
                    tag: raw,
                })?;
                let left = input.read_object()?;
                let right = input.read_object()?;
                Expression::compare(op, left, right)
            }
            EXPR_ARITHMETIC => {
                let raw = input.read_byte("arithmetic op")?;
                let op = ArithmeticOp::from_u8(raw).ok_or(PlanDecodeError::UnknownTag {
                    what: "arithmetic op",
                    tag: raw,
                })?;
                let left = input.read_object()?;
                let right = input.read_object()?;
                Expression::arithmetic(op, left, right)
            }
            EXPR_AND => Expression::And(Box::new(input.read_object()?), Box::new(input.read_object()?)),
            EXPR_OR => Expression::Or(Box::new(input.read_object()?), Box::new(input.read_object()?)),
            EXPR_NOT => Expression::Not(Box::new(input.read_object()?)),
            EXPR_IS_NULL => Expression::IsNull(Box::new(input.read_object()?)),
            tag => {
                return Err(PlanDecodeError::UnknownTag {
                    what: "expression",
                    tag,
                })
            }
        })
    }
}
