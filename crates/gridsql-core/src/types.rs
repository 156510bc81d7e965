//! Scalar values and the fixed-width row tuple that flows between operators.
//!
//! Structural equality/hashing on `Scalar` is total (floats by canonical bit
//! pattern) so scalars can key group maps and plan caches. SQL comparison with
//! numeric widening and NULL propagation lives in [`Scalar::sql_cmp`].

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    Str(String),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Null => "NULL",
            Scalar::Bool(_) => "BOOLEAN",
            Scalar::I32(_) => "INT",
            Scalar::I64(_) => "BIGINT",
            Scalar::F64(_) => "DOUBLE",
            Scalar::Str(_) => "VARCHAR",
        }
    }

    /// Numeric view used for widening; `None` for non-numeric values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::I32(v) => Some(*v as f64),
            Scalar::I64(v) => Some(*v as f64),
            Scalar::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::I32(v) => Some(*v as i64),
            Scalar::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// SQL comparison. Returns `None` when either side is NULL or the types
    /// are not comparable.
    pub fn sql_cmp(&self, other: &Scalar) -> Option<Ordering> {
        use Scalar::*;
        match (self, other) {
            (Null, _) | (_, Null) => None,
            (Bool(a), Bool(b)) => Some(a.cmp(b)),
            (Str(a), Str(b)) => Some(a.cmp(b)),
            (I32(_) | I64(_), I32(_) | I64(_)) => {
                Some(self.as_i64()?.cmp(&other.as_i64()?))
            }
            (I32(_) | I64(_) | F64(_), I32(_) | I64(_) | F64(_)) => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            _ => None,
        }
    }

    /// Total order for sorted inputs (merge join keys, deterministic output).
    ///
    /// Nulls sort first; numerics compare after widening; mixed non-numeric
    /// types order by variant.
    pub fn total_cmp(&self, other: &Scalar) -> Ordering {
        use Scalar::*;
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Null, _) => Ordering::Less,
            (_, Null) => Ordering::Greater,
            (F64(a), F64(b)) => a.total_cmp(b),
            (I32(_) | I64(_) | F64(_), I32(_) | I64(_) | F64(_)) => self
                .sql_cmp(other)
                .unwrap_or_else(|| type_order(self).cmp(&type_order(other))),
            (Bool(a), Bool(b)) => a.cmp(b),
            (Str(a), Str(b)) => a.cmp(b),
            _ => type_order(self).cmp(&type_order(other)),
        }
    }

    /// Rough in-memory size, used for budget accounting.
    pub fn approx_size(&self) -> usize {
        let base = std::mem::size_of::<Scalar>();
        match self {
            Scalar::Str(s) => base + s.len(),
            _ => base,
        }
    }
}

fn type_order(s: &Scalar) -> u8 {
    use Scalar::*;
    match s {
        Null => 0,
        Bool(_) => 1,
        I32(_) => 2,
        I64(_) => 3,
        F64(_) => 4,
        Str(_) => 5,
    }
}

fn canonical_bits(v: f64) -> u64 {
    if v.is_nan() {
        f64::NAN.to_bits()
    } else {
        v.to_bits()
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        use Scalar::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (I32(a), I32(b)) => a == b,
            (I64(a), I64(b)) => a == b,
            (F64(a), F64(b)) => canonical_bits(*a) == canonical_bits(*b),
            (Str(a), Str(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Scalar {}

impl Hash for Scalar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        type_order(self).hash(state);
        match self {
            Scalar::Null => {}
            Scalar::Bool(v) => v.hash(state),
            Scalar::I32(v) => v.hash(state),
            Scalar::I64(v) => v.hash(state),
            Scalar::F64(v) => canonical_bits(*v).hash(state),
            Scalar::Str(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "NULL"),
            Scalar::Bool(v) => write!(f, "{v}"),
            Scalar::I32(v) => write!(f, "{v}"),
            Scalar::I64(v) => write!(f, "{v}"),
            Scalar::F64(v) => write!(f, "{v}"),
            Scalar::Str(v) => write!(f, "'{v}'"),
        }
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::I32(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::I64(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::F64(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Str(v)
    }
}

/// Fixed-width row. Operators index columns positionally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Row {
    values: Vec<Scalar>,
}

impl Row {
    pub fn new(values: Vec<Scalar>) -> Self {
        Self { values }
    }

    /// Row of `width` NULLs (outer-join padding).
    pub fn nulls(width: usize) -> Self {
        Self {
            values: vec![Scalar::Null; width],
        }
    }

    pub fn width(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, idx: usize) -> Option<&Scalar> {
        self.values.get(idx)
    }

    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Scalar> {
        self.values
    }

    /// Left columns followed by right columns.
    pub fn concat(left: &Row, right: &Row) -> Row {
        let mut values = Vec::with_capacity(left.width() + right.width());
        values.extend_from_slice(&left.values);
        values.extend_from_slice(&right.values);
        Row { values }
    }

    /// Pick columns by index; `None` if an index is out of range.
    pub fn project(&self, indices: &[usize]) -> Option<Row> {
        indices
            .iter()
            .map(|&i| self.values.get(i).cloned())
            .collect::<Option<Vec<_>>>()
            .map(Row::new)
    }

    pub fn approx_size(&self) -> usize {
        std::mem::size_of::<Row>() + self.values.iter().map(Scalar::approx_size).sum::<usize>()
    }
}

impl From<Vec<Scalar>> for Row {
    fn from(values: Vec<Scalar>) -> Self {
        Row::new(values)
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        write!(f, ")")
    }
}

/// Build a [`Row`] from a list of values convertible into [`Scalar`].
#[macro_export]
macro_rules! row {
    () => { $crate::types::Row::default() };
    ($($v:expr),+ $(,)?) => {
        $crate::types::Row::new(vec![$($crate::types::Scalar::from($v)),+])
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sql_cmp_widens_numerics() {
        assert_eq!(Scalar::I32(3).sql_cmp(&Scalar::I64(3)), Some(Ordering::Equal));
        assert_eq!(Scalar::I64(2).sql_cmp(&Scalar::F64(2.5)), Some(Ordering::Less));
        assert_eq!(Scalar::Null.sql_cmp(&Scalar::I32(1)), None);
        assert_eq!(Scalar::Str("a".into()).sql_cmp(&Scalar::I32(1)), None);
    }

    #[test]
    fn test_nan_is_a_usable_key() {
        let mut keys = HashSet::new();
        keys.insert(Scalar::F64(f64::NAN));
        assert!(keys.contains(&Scalar::F64(f64::NAN)));
    }

    #[test]
    fn test_total_cmp_sorts_nulls_first() {
        let mut vals = vec![Scalar::I64(5), Scalar::Null, Scalar::I32(1)];
        vals.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(vals, vec![Scalar::Null, Scalar::I32(1), Scalar::I64(5)]);
    }

    #[test]
    fn test_row_concat_and_project() {
        let left = row![1, "a"];
        let right = row![2.5];
        let joined = Row::concat(&left, &right);
        assert_eq!(joined.width(), 3);
        assert_eq!(joined.project(&[2, 0]), Some(row![2.5, 1]));
        assert_eq!(joined.project(&[3]), None);
        assert_eq!(Row::nulls(2), Row::new(vec![Scalar::Null, Scalar::Null]));
    }
}
