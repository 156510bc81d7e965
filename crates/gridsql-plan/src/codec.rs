//! Binary wire codec for plans.
//!
//! Layout conventions (all integers big-endian):
//! - `int`: 4 bytes, `long`: 8 bytes, `double`: IEEE-754 bits as 8 bytes
//! - `boolean`: one byte, 0 or 1
//! - `string`: `int` byte length, then UTF-8
//! - `list<T>`: `int` element count, then each element
//! - `optional<T>`: `boolean` presence, then the element if present
//! - polymorphic objects (nodes, expressions, scalars): one tag byte + body
//!
//! There is no version header; both ends run the same build.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use gridsql_core::config::ExecConfig;
use gridsql_core::types::Scalar;

use crate::error::PlanDecodeError;
use crate::node::PhysicalNode;

type DecodeResult<T> = std::result::Result<T, PlanDecodeError>;

/// A value with a fixed wire layout.
///
/// `read_from` must return a fully validated value; there is no
/// default-then-populate step.
pub trait WireObject: Sized {
    fn write_to(&self, out: &mut PlanWriter);
    fn read_from(input: &mut PlanReader) -> DecodeResult<Self>;
}

/// Bounds applied while decoding untrusted bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    pub max_depth: usize,
    pub max_list_len: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self::from_config(&ExecConfig::default())
    }
}

impl DecodeLimits {
    pub fn from_config(cfg: &ExecConfig) -> Self {
        Self {
            max_depth: cfg.decode_max_depth,
            max_list_len: cfg.decode_max_list_len,
        }
    }
}

#[derive(Debug, Default)]
pub struct PlanWriter {
    buf: BytesMut,
}

impl PlanWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_byte(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn write_int(&mut self, v: i32) {
        self.buf.put_i32(v);
    }

    pub fn write_long(&mut self, v: i64) {
        self.buf.put_i64(v);
    }

    pub fn write_double(&mut self, v: f64) {
        self.buf.put_f64(v);
    }

    pub fn write_boolean(&mut self, v: bool) {
        self.buf.put_u8(v as u8);
    }

    pub fn write_string(&mut self, v: &str) {
        self.write_len(v.len());
        self.buf.extend_from_slice(v.as_bytes());
    }

    pub fn write_object<T: WireObject>(&mut self, v: &T) {
        v.write_to(self);
    }

    /// Length-prefixed homogeneous sequence.
    pub fn write_list<T: WireObject>(&mut self, items: &[T]) {
        self.write_len(items.len());
        for item in items {
            item.write_to(self);
        }
    }

    pub fn write_optional<T: WireObject>(&mut self, v: Option<&T>) {
        match v {
            Some(item) => {
                self.write_boolean(true);
                item.write_to(self);
            }
            None => self.write_boolean(false),
        }
    }

    fn write_len(&mut self, len: usize) {
        // Lengths above i32::MAX cannot be produced by a sane planner; clamp so
        // the reader rejects them instead of misreading a wrapped value.
        self.write_int(i32::try_from(len).unwrap_or(i32::MAX));
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

pub struct PlanReader {
    buf: Bytes,
    limits: DecodeLimits,
    depth: usize,
}

impl PlanReader {
    pub fn new(buf: Bytes, limits: DecodeLimits) -> Self {
        Self {
            buf,
            limits,
            depth: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn limits(&self) -> DecodeLimits {
        self.limits
    }

    fn ensure(&self, needed: usize, what: &'static str) -> DecodeResult<()> {
        let remaining = self.buf.remaining();
        if remaining < needed {
            return Err(PlanDecodeError::Truncated {
                what,
                needed,
                remaining,
            });
        }
        Ok(())
    }

    pub fn read_byte(&mut self, what: &'static str) -> DecodeResult<u8> {
        self.ensure(1, what)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_int(&mut self, what: &'static str) -> DecodeResult<i32> {
        self.ensure(4, what)?;
        Ok(self.buf.get_i32())
    }

    pub fn read_long(&mut self, what: &'static str) -> DecodeResult<i64> {
        self.ensure(8, what)?;
        Ok(self.buf.get_i64())
    }

    pub fn read_double(&mut self, what: &'static str) -> DecodeResult<f64> {
        self.ensure(8, what)?;
        Ok(self.buf.get_f64())
    }

    pub fn read_boolean(&mut self, what: &'static str) -> DecodeResult<bool> {
        match self.read_byte(what)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(PlanDecodeError::InvalidField(format!(
                "{what}: boolean byte {other}"
            ))),
        }
    }

    pub fn read_string(&mut self, what: &'static str) -> DecodeResult<String> {
        let len = self.read_len(what)?;
        self.ensure(len, what)?;
        let raw = self.buf.split_to(len);
        String::from_utf8(raw.to_vec()).map_err(|_| PlanDecodeError::InvalidUtf8)
    }

    /// Read a nested object, enforcing the nesting limit.
    pub fn read_object<T: WireObject>(&mut self) -> DecodeResult<T> {
        if self.depth >= self.limits.max_depth {
            return Err(PlanDecodeError::TooDeep(self.limits.max_depth));
        }
        self.depth += 1;
        let out = T::read_from(self);
        self.depth -= 1;
        out
    }

    pub fn read_list<T: WireObject>(&mut self, what: &'static str) -> DecodeResult<Vec<T>> {
        let len = self.read_len(what)?;
        // Every element takes at least one byte; a larger count is truncated input.
        self.ensure(len, what)?;
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(self.read_object()?);
        }
        Ok(items)
    }

    pub fn read_optional<T: WireObject>(&mut self, what: &'static str) -> DecodeResult<Option<T>> {
        if self.read_boolean(what)? {
            Ok(Some(self.read_object()?))
        } else {
            Ok(None)
        }
    }

    fn read_len(&mut self, what: &'static str) -> DecodeResult<usize> {
        let len = self.read_int(what)?;
        if len < 0 || len as usize > self.limits.max_list_len {
            return Err(PlanDecodeError::InvalidLength {
                what,
                len: len as i64,
            });
        }
        Ok(len as usize)
    }

    /// Fail if anything is left after the root object.
    pub fn finish(self) -> DecodeResult<()> {
        match self.buf.remaining() {
            0 => Ok(()),
            n => Err(PlanDecodeError::TrailingBytes(n)),
        }
    }
}

/// Serialize a plan tree for shipping to members.
pub fn encode_plan(plan: &PhysicalNode) -> Bytes {
    let mut out = PlanWriter::new();
    out.write_object(plan);
    out.finish()
}

/// Decode a complete plan tree; trailing bytes are an error.
pub fn decode_plan(bytes: Bytes, limits: &DecodeLimits) -> DecodeResult<PhysicalNode> {
    let mut input = PlanReader::new(bytes, *limits);
    let plan = input.read_object::<PhysicalNode>()?;
    input.finish()?;
    Ok(plan)
}

// ----- primitive impls -----

impl WireObject for i32 {
    fn write_to(&self, out: &mut PlanWriter) {
        out.write_int(*self);
    }

    fn read_from(input: &mut PlanReader) -> DecodeResult<Self> {
        input.read_int("int")
    }
}

impl WireObject for String {
    fn write_to(&self, out: &mut PlanWriter) {
        out.write_string(self);
    }

    fn read_from(input: &mut PlanReader) -> DecodeResult<Self> {
        input.read_string("string")
    }
}

const SCALAR_NULL: u8 = 0;
const SCALAR_BOOL: u8 = 1;
const SCALAR_I32: u8 = 2;
const SCALAR_I64: u8 = 3;
const SCALAR_F64: u8 = 4;
const SCALAR_STR: u8 = 5;

impl WireObject for Scalar {
    fn write_to(&self, out: &mut PlanWriter) {
        match self {
            Scalar::Null => out.write_byte(SCALAR_NULL),
            Scalar::Bool(v) => {
                out.write_byte(SCALAR_BOOL);
                out.write_boolean(*v);
            }
            Scalar::I32(v) => {
                out.write_byte(SCALAR_I32);
                out.write_int(*v);
            }
            Scalar::I64(v) => {
                out.write_byte(SCALAR_I64);
                out.write_long(*v);
            }
            Scalar::F64(v) => {
                out.write_byte(SCALAR_F64);
                out.write_double(*v);
            }
            Scalar::Str(v) => {
                out.write_byte(SCALAR_STR);
                out.write_string(v);
            }
        }
    }

    fn read_from(input: &mut PlanReader) -> DecodeResult<Self> {
        match input.read_byte("scalar tag")? {
            SCALAR_NULL => Ok(Scalar::Null),
            SCALAR_BOOL => Ok(Scalar::Bool(input.read_boolean("bool scalar")?)),
            SCALAR_I32 => Ok(Scalar::I32(input.read_int("int scalar")?)),
            SCALAR_I64 => Ok(Scalar::I64(input.read_long("bigint scalar")?)),
            SCALAR_F64 => Ok(Scalar::F64(input.read_double("double scalar")?)),
            SCALAR_STR => Ok(Scalar::Str(input.read_string("varchar scalar")?)),
            tag => Err(PlanDecodeError::UnknownTag {
                what: "scalar",
                tag,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(bytes: Bytes) -> PlanReader {
        PlanReader::new(bytes, DecodeLimits::default())
    }

    #[test]
    fn test_primitives_share_layout() {
        let mut out = PlanWriter::new();
        out.write_int(-7);
        out.write_boolean(true);
        out.write_string("map");
        out.write_list(&[1i32, 2, 3]);
        out.write_optional::<i32>(None);
        let bytes = out.finish();
        assert_eq!(bytes.len(), 4 + 1 + (4 + 3) + (4 + 12) + 1);

        let mut input = reader(bytes);
        assert_eq!(input.read_int("a").unwrap(), -7);
        assert!(input.read_boolean("b").unwrap());
        assert_eq!(input.read_string("c").unwrap(), "map");
        assert_eq!(input.read_list::<i32>("d").unwrap(), vec![1, 2, 3]);
        assert_eq!(input.read_optional::<i32>("e").unwrap(), None);
        input.finish().unwrap();
    }

    #[test]
    fn test_truncated_int_reports_shortfall() {
        let mut input = reader(Bytes::from_static(&[0, 1]));
        let err = input.read_int("sorted prefix size").unwrap_err();
        assert_eq!(
            err,
            PlanDecodeError::Truncated {
                what: "sorted prefix size",
                needed: 4,
                remaining: 2
            }
        );
    }

    #[test]
    fn test_negative_and_huge_lengths_rejected() {
        let mut out = PlanWriter::new();
        out.write_int(-1);
        let mut input = reader(out.finish());
        assert!(matches!(
            input.read_list::<i32>("group key"),
            Err(PlanDecodeError::InvalidLength { len: -1, .. })
        ));

        let mut out = PlanWriter::new();
        out.write_int(1_000_000);
        let mut input = reader(out.finish());
        assert!(matches!(
            input.read_list::<i32>("group key"),
            Err(PlanDecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn test_bad_boolean_and_scalar_tag() {
        let mut input = reader(Bytes::from_static(&[2]));
        assert!(matches!(
            input.read_boolean("outer"),
            Err(PlanDecodeError::InvalidField(_))
        ));

        let mut input = reader(Bytes::from_static(&[9]));
        assert_eq!(
            input.read_object::<Scalar>().unwrap_err(),
            PlanDecodeError::UnknownTag {
                what: "scalar",
                tag: 9
            }
        );
    }

    #[test]
    fn test_scalar_wire_preserves_values() {
        let values = vec![
            Scalar::Null,
            Scalar::Bool(false),
            Scalar::I32(i32::MIN),
            Scalar::I64(i64::MAX),
            Scalar::F64(-0.5),
            Scalar::Str("héllo".into()),
        ];
        let mut out = PlanWriter::new();
        out.write_list(&values);
        let mut input = reader(out.finish());
        assert_eq!(input.read_list::<Scalar>("values").unwrap(), values);
    }

    #[test]
    fn test_trailing_bytes_detected() {
        let input = reader(Bytes::from_static(&[0]));
        assert_eq!(input.finish(), Err(PlanDecodeError::TrailingBytes(1)));
    }
}
