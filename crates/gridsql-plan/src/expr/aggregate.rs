//! Aggregate functions and their per-group accumulator state.

use std::collections::HashSet;
use std::fmt;

use gridsql_core::types::{Row, Scalar};

use crate::codec::{PlanReader, PlanWriter, WireObject};
use crate::error::{EvalError, PlanDecodeError, PlanError, Result};
use crate::expr::Expression;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

impl AggregateFunction {
    pub fn name(self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
            AggregateFunction::Avg => "AVG",
        }
    }

    fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => AggregateFunction::Count,
            1 => AggregateFunction::Sum,
            2 => AggregateFunction::Min,
            3 => AggregateFunction::Max,
            4 => AggregateFunction::Avg,
            _ => return None,
        })
    }
}

/// One aggregate call, e.g. `SUM(DISTINCT $2)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregateExpression {
    function: AggregateFunction,
    operand: Option<Expression>,
    distinct: bool,
}

impl AggregateExpression {
    /// Only `COUNT` accepts a missing operand (`COUNT(*)`).
    pub fn new(
        function: AggregateFunction,
        operand: Option<Expression>,
        distinct: bool,
    ) -> Result<Self> {
        if operand.is_none() && function != AggregateFunction::Count {
            return Err(PlanError::Invariant(format!(
                "{} requires an operand",
                function.name()
            )));
        }
        if operand.is_none() && distinct {
            return Err(PlanError::Invariant(
                "COUNT(DISTINCT *) is not a valid aggregate".into(),
            ));
        }
        Ok(Self {
            function,
            operand,
            distinct,
        })
    }

    pub fn count_star() -> Self {
        Self {
            function: AggregateFunction::Count,
            operand: None,
            distinct: false,
        }
    }

    fn unary(function: AggregateFunction, operand: Expression) -> Self {
        Self {
            function,
            operand: Some(operand),
            distinct: false,
        }
    }

    pub fn count(operand: Expression) -> Self {
        Self::unary(AggregateFunction::Count, operand)
    }

    pub fn sum(operand: Expression) -> Self {
        Self::unary(AggregateFunction::Sum, operand)
    }

    pub fn min(operand: Expression) -> Self {
        Self::unary(AggregateFunction::Min, operand)
    }

    pub fn max(operand: Expression) -> Self {
        Self::unary(AggregateFunction::Max, operand)
    }

    pub fn avg(operand: Expression) -> Self {
        Self::unary(AggregateFunction::Avg, operand)
    }

    /// Deduplicate operand values per group. No-op for `COUNT(*)`.
    pub fn distinct(mut self) -> Self {
        self.distinct = self.operand.is_some();
        self
    }

    pub fn function(&self) -> AggregateFunction {
        self.function
    }

    pub fn operand(&self) -> Option<&Expression> {
        self.operand.as_ref()
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    pub fn create_accumulator(&self) -> Accumulator {
        Accumulator {
            function: self.function,
            operand: self.operand.clone(),
            seen: self.distinct.then(HashSet::new),
            state: State::Empty,
            count: 0,
            heap: 0,
        }
    }
}

impl fmt::Display for AggregateExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let distinct = if self.distinct { "DISTINCT " } else { "" };
        match &self.operand {
            Some(e) => write!(f, "{}({distinct}{e})", self.function.name()),
            None => write!(f, "{}(*)", self.function.name()),
        }
    }
}

impl WireObject for AggregateExpression {
    fn write_to(&self, out: &mut PlanWriter) {
        out.write_byte(self.function as u8);
        out.write_optional(self.operand.as_ref());
        out.write_boolean(self.distinct);
    }

    fn read_from(input: &mut PlanReader) -> std::result::Result<Self, PlanDecodeError> {
        let raw = input.read_byte("aggregate function")?;
        let function = AggregateFunction::from_u8(raw).ok_or(PlanDecodeError::UnknownTag {
            what: "aggregate function",
            tag: raw,
        })?;
        let operand = input.read_optional("aggregate operand")?;
        let distinct = input.read_boolean("aggregate distinct")?;
        Self::new(function, operand, distinct)
            .map_err(|e| PlanDecodeError::InvalidField(e.to_string()))
    }
}

#[derive(Debug, Clone)]
enum State {
    Empty,
    Int(i64),
    Float(f64),
    Value(Scalar),
}

/// Running state of one aggregate for one group.
#[derive(Debug, Clone)]
pub struct Accumulator {
    function: AggregateFunction,
    operand: Option<Expression>,
    seen: Option<HashSet<Scalar>>,
    state: State,
    count: i64,
    heap: usize,
}

impl Accumulator {
    pub fn accumulate(&mut self, row: &Row) -> std::result::Result<(), EvalError> {
        let value = match &self.operand {
            None => {
                self.count += 1;
                return Ok(());
            }
            Some(expr) => expr.evaluate(row)?,
        };
        if value.is_null() {
            return Ok(());
        }
        if let Some(seen) = &mut self.seen {
            if !seen.insert(value.clone()) {
                return Ok(());
            }
            self.heap += value.approx_size();
        }
        self.update(value)
    }

    fn update(&mut self, value: Scalar) -> std::result::Result<(), EvalError> {
        self.count += 1;
        match self.function {
            AggregateFunction::Count => {}
            AggregateFunction::Sum | AggregateFunction::Avg => {
                let next = match (&self.state, &value) {
                    (State::Empty, Scalar::I32(_) | Scalar::I64(_)) => {
                        State::Int(value.as_i64().unwrap_or_default())
                    }
                    (State::Empty, Scalar::F64(v)) => State::Float(*v),
                    (State::Int(acc), Scalar::I32(_) | Scalar::I64(_)) => State::Int(
                        acc.checked_add(value.as_i64().unwrap_or_default())
                            .ok_or(EvalError::Overflow(self.function.name()))?,
                    ),
                    (State::Int(acc), Scalar::F64(v)) => State::Float(*acc as f64 + v),
                    (State::Float(acc), v) if v.as_f64().is_some() => {
                        State::Float(acc + v.as_f64().unwrap_or_default())
                    }
                    _ => {
                        return Err(EvalError::TypeMismatch(format!(
                            "{} over {}",
                            self.function.name(),
                            value.type_name()
                        )))
                    }
                };
                self.state = next;
            }
            AggregateFunction::Min | AggregateFunction::Max => {
                let replace = match &self.state {
                    State::Value(current) => {
                        let ord = value.sql_cmp(current).ok_or_else(|| {
                            EvalError::TypeMismatch(format!(
                                "{} over {} and {}",
                                self.function.name(),
                                current.type_name(),
                                value.type_name()
                            ))
                        })?;
                        if self.function == AggregateFunction::Min {
                            ord.is_lt()
                        } else {
                            ord.is_gt()
                        }
                    }
                    _ => true,
                };
                if replace {
                    if let State::Value(old) = &self.state {
                        self.heap -= old.approx_size();
                    }
                    self.heap += value.approx_size();
                    self.state = State::Value(value);
                }
            }
        }
        Ok(())
    }

    pub fn finalize(&self) -> Scalar {
        match self.function {
            AggregateFunction::Count => Scalar::I64(self.count),
            AggregateFunction::Sum => match &self.state {
                State::Int(v) => Scalar::I64(*v),
                State::Float(v) => Scalar::F64(*v),
                _ => Scalar::Null,
            },
            AggregateFunction::Avg => match &self.state {
                State::Int(v) => Scalar::F64(*v as f64 / self.count as f64),
                State::Float(v) => Scalar::F64(*v / self.count as f64),
                _ => Scalar::Null,
            },
            AggregateFunction::Min | AggregateFunction::Max => match &self.state {
                State::Value(v) => v.clone(),
                _ => Scalar::Null,
            },
        }
    }

    /// Approximate footprint, for budget accounting. Maintained
    /// incrementally so it is cheap to call per row.
    pub fn approx_size(&self) -> usize {
        std::mem::size_of::<Accumulator>() + self.heap
    }
}
