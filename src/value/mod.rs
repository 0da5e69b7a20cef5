mod convert;
mod object;
mod ops;
pub mod serializer;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use log::warn;

pub use convert::ToValue;
pub use object::{Object, ObjectKind, Record};

/// The datum wrapped by a [`Value`].
///
/// Closed over the scalar kinds the engine understands natively. Host aggregates
/// that are not plain lists or string-keyed maps enter through [`Datum::Object`].
#[derive(Debug, Clone)]
pub enum Datum {
    Nil,
    Bool(bool),
    Str(String),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    I128(i128),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    U128(u128),
    F32(f32),
    F64(f64),
    /// Date without time zone
    Date(NaiveDate),
    /// Date and time without time zone
    DateTime(NaiveDateTime),
    /// Date and time in UTC
    DateTimeUtc(DateTime<Utc>),
    /// Ordered list of values
    List(Arc<Vec<Value>>),
    /// String-keyed mapping
    Map(Arc<HashMap<String, Value>>),
    /// Host aggregate accessed through the [`Object`] capability
    Object(Arc<dyn Object>),
    /// Pointer-like reference; `None` is a nil reference
    Shared(Option<Arc<Value>>),
}

static NIL: Datum = Datum::Nil;

/// A dynamically typed template value.
///
/// `safe` values skip HTML escaping when written to the output.
#[derive(Debug, Clone)]
pub struct Value {
    datum: Datum,
    safe: bool,
}

impl Default for Value {
    fn default() -> Self {
        Self::nil()
    }
}

impl Value {
    pub fn new(datum: Datum) -> Self {
        Self { datum, safe: false }
    }

    /// Wraps a datum that bypasses escaping on output.
    pub fn new_safe(datum: Datum) -> Self {
        Self { datum, safe: true }
    }

    pub fn nil() -> Self {
        Self::new(Datum::Nil)
    }

    pub fn from_object<T: Object + 'static>(object: T) -> Self {
        Self::new(Datum::Object(Arc::new(object)))
    }

    /// Wraps a reference to another value; `None` is a nil reference.
    pub fn reference(target: Option<Arc<Value>>) -> Self {
        Self::new(Datum::Shared(target))
    }

    pub fn is_safe(&self) -> bool {
        self.safe
    }

    /// Returns the same datum flagged as safe.
    pub fn into_safe(mut self) -> Self {
        self.safe = true;
        self
    }

    /// The wrapped datum as given, without dereferencing.
    pub fn datum(&self) -> &Datum {
        &self.datum
    }

    /// Dereferences one level of [`Datum::Shared`]. A nil reference resolves to
    /// [`Datum::Nil`]. Never mutates the wrapped datum.
    pub fn resolve(&self) -> &Datum {
        match &self.datum {
            Datum::Shared(Some(target)) => &target.datum,
            Datum::Shared(None) => &NIL,
            datum => datum,
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self.resolve(), Datum::Str(_))
    }

    pub fn is_bool(&self) -> bool {
        matches!(self.resolve(), Datum::Bool(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self.resolve(), Datum::F32(_) | Datum::F64(_))
    }

    pub fn is_integer(&self) -> bool {
        self.int_value().is_some()
    }

    pub fn is_number(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn is_time(&self) -> bool {
        matches!(
            self.resolve(),
            Datum::Date(_) | Datum::DateTime(_) | Datum::DateTimeUtc(_)
        )
    }

    pub fn is_nil(&self) -> bool {
        matches!(self.resolve(), Datum::Nil)
    }

    /// Integer kinds widened to `i128`. `u128` values above `i128::MAX` saturate.
    pub(crate) fn int_value(&self) -> Option<i128> {
        let n = match *self.resolve() {
            Datum::I8(n) => n as i128,
            Datum::I16(n) => n as i128,
            Datum::I32(n) => n as i128,
            Datum::I64(n) => n as i128,
            Datum::I128(n) => n,
            Datum::U8(n) => n as i128,
            Datum::U16(n) => n as i128,
            Datum::U32(n) => n as i128,
            Datum::U64(n) => n as i128,
            Datum::U128(n) => i128::try_from(n).unwrap_or(i128::MAX),
            _ => return None,
        };
        Some(n)
    }

    fn float_value(&self) -> Option<f64> {
        match *self.resolve() {
            Datum::F32(f) => Some(f as f64),
            Datum::F64(f) => Some(f),
            _ => self.int_value().map(|n| n as f64),
        }
    }

    pub(crate) fn time_value(&self) -> Option<NaiveDateTime> {
        match self.resolve() {
            Datum::Date(d) => d.and_hms_opt(0, 0, 0),
            Datum::DateTime(dt) => Some(*dt),
            Datum::DateTimeUtc(dt) => Some(dt.naive_utc()),
            _ => None,
        }
    }

    /// Returns the value as an integer. Strings are parsed as floats and
    /// truncated; anything unconvertible yields 0.
    pub fn to_integer(&self) -> i64 {
        if let Some(n) = self.int_value() {
            return n as i64;
        }
        match self.resolve() {
            Datum::F32(f) => *f as i64,
            Datum::F64(f) => *f as i64,
            Datum::Str(s) => s.parse::<f64>().map(|f| f as i64).unwrap_or(0),
            Datum::Nil => 0,
            other => {
                warn!("Value::to_integer() not available for {}", kind_name(other));
                0
            }
        }
    }

    /// Returns the value as a float, 0.0 when unconvertible.
    pub fn to_float(&self) -> f64 {
        if let Some(f) = self.float_value() {
            return f;
        }
        match self.resolve() {
            Datum::Str(s) => s.parse::<f64>().unwrap_or(0.0),
            Datum::Nil => 0.0,
            other => {
                warn!("Value::to_float() not available for {}", kind_name(other));
                0.0
            }
        }
    }

    /// Only a boolean datum yields its own value. This is not a truthiness test,
    /// see [`Value::is_true`].
    pub fn to_bool(&self) -> bool {
        match self.resolve() {
            Datum::Bool(b) => *b,
            Datum::Nil => false,
            other => {
                warn!("Value::to_bool() not available for {}", kind_name(other));
                false
            }
        }
    }

    /// Python-style truthiness.
    ///
    /// Non-zero numbers, non-empty strings and containers are true, booleans are
    /// taken as-is, struct-like aggregates and timestamps are always true, nil is
    /// always false.
    pub fn is_true(&self) -> bool {
        match self.resolve() {
            Datum::Nil => false,
            Datum::Bool(b) => *b,
            Datum::Str(s) => !s.is_empty(),
            Datum::F32(f) => *f != 0.0,
            Datum::F64(f) => *f != 0.0,
            Datum::List(items) => !items.is_empty(),
            Datum::Map(map) => !map.is_empty(),
            Datum::Date(_) | Datum::DateTime(_) | Datum::DateTimeUtc(_) => true,
            Datum::Object(obj) => match obj.kind() {
                ObjectKind::Struct => true,
                ObjectKind::Seq | ObjectKind::Map => obj.len().unwrap_or(0) > 0,
            },
            _ => self.int_value().is_some_and(|n| n != 0),
        }
    }

    /// Logical NOT under [`Value::is_true`] rules.
    ///
    /// Integers negate to `0`/`1`; floats negate to `0.0`/`1.1`, which is kept
    /// for output compatibility with existing templates.
    pub fn negate(&self) -> Value {
        let datum = self.resolve();
        match datum {
            Datum::Nil => Value::from(true),
            Datum::Bool(b) => Value::from(!*b),
            Datum::Str(s) => Value::from(s.is_empty()),
            Datum::F32(_) | Datum::F64(_) => {
                if self.to_float() != 0.0 {
                    Value::from(0.0)
                } else {
                    Value::from(1.1)
                }
            }
            _ if self.is_integer() => {
                if self.to_integer() != 0 {
                    Value::from(0i64)
                } else {
                    Value::from(1i64)
                }
            }
            _ => Value::from(!self.is_true()),
        }
    }

    /// Rune count for strings, element count for sequences and mappings.
    pub fn len(&self) -> usize {
        match self.resolve() {
            Datum::Nil => 0,
            Datum::Str(s) => s.chars().count(),
            Datum::List(items) => items.len(),
            Datum::Map(map) => map.len(),
            Datum::Object(obj) if obj.kind() != ObjectKind::Struct => obj.len().unwrap_or(0),
            other => {
                warn!("Value::len() not available for {}", kind_name(other));
                0
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the `i`-th rune of a string or element of a sequence.
    /// Out of range yields nil.
    pub fn index(&self, i: usize) -> Value {
        match self.resolve() {
            Datum::Nil => Value::nil(),
            Datum::Str(s) => s
                .chars()
                .nth(i)
                .map(|c| Value::from(c.to_string()))
                .unwrap_or_default(),
            Datum::List(items) => items.get(i).cloned().unwrap_or_default(),
            Datum::Object(obj) if obj.kind() == ObjectKind::Seq => {
                obj.get_indexed(i).unwrap_or_default()
            }
            other => {
                warn!("Value::index() not available for {}", kind_name(other));
                Value::from(Vec::<Value>::new())
            }
        }
    }

    /// Slices a string (by rune) or a sequence.
    ///
    /// Bounds are not clamped: an out-of-range slice is a caller error, reported
    /// through the log and answered with an empty list.
    pub fn slice(&self, i: usize, j: usize) -> Value {
        let out_of_range = |len: usize| {
            warn!("Value::slice({i}, {j}) out of range for length {len}");
            Value::from(Vec::<Value>::new())
        };
        match self.resolve() {
            Datum::Nil => Value::from(Vec::<Value>::new()),
            Datum::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                match chars.get(i..j) {
                    Some(part) => Value::from(part.iter().collect::<String>()),
                    None => out_of_range(chars.len()),
                }
            }
            Datum::List(items) => match items.get(i..j) {
                Some(part) => Value::from(part.to_vec()),
                None => out_of_range(items.len()),
            },
            Datum::Object(obj) if obj.kind() == ObjectKind::Seq => {
                let len = obj.len().unwrap_or(0);
                if i > j || j > len {
                    return out_of_range(len);
                }
                Value::from(
                    (i..j)
                        .map(|idx| obj.get_indexed(idx).unwrap_or_default())
                        .collect::<Vec<_>>(),
                )
            }
            other => {
                warn!("Value::slice() not available for {}", kind_name(other));
                Value::from(Vec::<Value>::new())
            }
        }
    }

    /// True for strings and sequences.
    pub fn can_slice(&self) -> bool {
        match self.resolve() {
            Datum::Str(_) | Datum::List(_) => true,
            Datum::Object(obj) => obj.kind() == ObjectKind::Seq,
            _ => false,
        }
    }
}

/// C `printf`-style `%f` formatting: six decimals, `NaN`, `+Inf`, `-Inf`.
pub(crate) fn write_float(out: &mut dyn fmt::Write, f: f64) -> fmt::Result {
    if f.is_nan() {
        out.write_str("NaN")
    } else if f.is_infinite() {
        out.write_str(if f > 0.0 { "+Inf" } else { "-Inf" })
    } else {
        write!(out, "{:.6}", f)
    }
}

pub(crate) fn kind_name(datum: &Datum) -> &'static str {
    match datum {
        Datum::Nil => "nil",
        Datum::Bool(_) => "bool",
        Datum::Str(_) => "string",
        Datum::I8(_) => "i8",
        Datum::I16(_) => "i16",
        Datum::I32(_) => "i32",
        Datum::I64(_) => "i64",
        Datum::I128(_) => "i128",
        Datum::U8(_) => "u8",
        Datum::U16(_) => "u16",
        Datum::U32(_) => "u32",
        Datum::U64(_) => "u64",
        Datum::U128(_) => "u128",
        Datum::F32(_) => "f32",
        Datum::F64(_) => "f64",
        Datum::Date(_) => "date",
        Datum::DateTime(_) => "datetime",
        Datum::DateTimeUtc(_) => "datetime(utc)",
        Datum::List(_) => "list",
        Datum::Map(_) => "map",
        Datum::Object(obj) => obj.type_name(),
        Datum::Shared(_) => "reference",
    }
}

fn write_repr(out: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value.resolve() {
        Datum::Str(s) => write!(out, "{:?}", s),
        Datum::List(items) => {
            out.write_str("[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.write_str(", ")?;
                }
                write_repr(out, item)?;
            }
            out.write_str("]")
        }
        Datum::Map(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.write_str("{")?;
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.write_str(", ")?;
                }
                write!(out, "{:?}: ", key)?;
                write_repr(out, &map[key])?;
            }
            out.write_str("}")
        }
        Datum::Object(obj) => write!(out, "{:?}", obj),
        Datum::Shared(_) => out.write_str("<reference>"),
        _ => write!(out, "{}", value),
    }
}

impl fmt::Display for Value {
    /// Strings as-is, integers in decimal, floats with six decimals, booleans as
    /// `True`/`False`, nil as the empty string. Timestamps and objects with their
    /// own stringifier defer to it; everything else falls back to a debug
    /// representation and is logged.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.resolve() {
            Datum::Nil => Ok(()),
            Datum::Str(s) => f.write_str(s),
            Datum::Bool(true) => f.write_str("True"),
            Datum::Bool(false) => f.write_str("False"),
            Datum::I8(n) => write!(f, "{}", n),
            Datum::I16(n) => write!(f, "{}", n),
            Datum::I32(n) => write!(f, "{}", n),
            Datum::I64(n) => write!(f, "{}", n),
            Datum::I128(n) => write!(f, "{}", n),
            Datum::U8(n) => write!(f, "{}", n),
            Datum::U16(n) => write!(f, "{}", n),
            Datum::U32(n) => write!(f, "{}", n),
            Datum::U64(n) => write!(f, "{}", n),
            Datum::U128(n) => write!(f, "{}", n),
            Datum::F32(n) => write_float(f, *n as f64),
            Datum::F64(n) => write_float(f, *n),
            Datum::Date(d) => write!(f, "{}", d),
            Datum::DateTime(dt) => write!(f, "{}", dt),
            Datum::DateTimeUtc(dt) => write!(f, "{}", dt),
            Datum::Object(obj) => match obj.render() {
                Some(text) => f.write_str(&text),
                None => {
                    warn!("Value::to_string() not implemented for {}", obj.type_name());
                    write_repr(f, self)
                }
            },
            datum @ (Datum::List(_) | Datum::Map(_) | Datum::Shared(_)) => {
                warn!("Value::to_string() not implemented for {}", kind_name(datum));
                write_repr(f, self)
            }
        }
    }
}

macro_rules! impl_from_for_value {
    ($rust_type:ty, $variant:ident) => {
        impl From<$rust_type> for Value {
            fn from(v: $rust_type) -> Self {
                Value::new(Datum::$variant(v))
            }
        }
    };
}

impl_from_for_value!(bool, Bool);
impl_from_for_value!(String, Str);
impl_from_for_value!(i8, I8);
impl_from_for_value!(i16, I16);
impl_from_for_value!(i32, I32);
impl_from_for_value!(i64, I64);
impl_from_for_value!(i128, I128);
impl_from_for_value!(u8, U8);
impl_from_for_value!(u16, U16);
impl_from_for_value!(u32, U32);
impl_from_for_value!(u64, U64);
impl_from_for_value!(u128, U128);
impl_from_for_value!(f32, F32);
impl_from_for_value!(f64, F64);
impl_from_for_value!(NaiveDate, Date);
impl_from_for_value!(NaiveDateTime, DateTime);
impl_from_for_value!(DateTime<Utc>, DateTimeUtc);

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::new(Datum::U64(v as u64))
    }
}

impl From<isize> for Value {
    fn from(v: isize) -> Self {
        Value::new(Datum::I64(v as i64))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::new(Datum::Str(v.to_string()))
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::new(Datum::List(Arc::new(v)))
    }
}

impl From<HashMap<String, Value>> for Value {
    fn from(v: HashMap<String, Value>) -> Self {
        Value::new(Datum::Map(Arc::new(v)))
    }
}

impl From<Datum> for Value {
    fn from(datum: Datum) -> Self {
        Value::new(datum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_string_scalars() {
        assert_eq!(Value::from("abc").to_string(), "abc");
        assert_eq!(Value::from(42i32).to_string(), "42");
        assert_eq!(Value::from(u64::MAX).to_string(), "18446744073709551615");
        assert_eq!(Value::from(-7i8).to_string(), "-7");
        assert_eq!(Value::from(3.5f64).to_string(), "3.500000");
        assert_eq!(Value::from(0.1f32).to_string(), "0.100000");
        assert_eq!(Value::from(true).to_string(), "True");
        assert_eq!(Value::from(false).to_string(), "False");
        assert_eq!(Value::nil().to_string(), "");
        assert_eq!(Value::from(f64::NAN).to_string(), "NaN");
        assert_eq!(Value::from(f64::NEG_INFINITY).to_string(), "-Inf");
    }

    #[test]
    fn test_to_string_roundtrip_through_coercions() {
        let v = Value::from(-1234i64);
        assert_eq!(Value::from(v.to_string()).to_integer(), -1234);
        let v = Value::from(2.25f64);
        assert_eq!(Value::from(v.to_string()).to_float(), 2.25);
        let v = Value::from(12u16);
        assert_eq!(Value::from(v.to_string()).to_integer(), 12);
    }

    #[test]
    fn test_conversions_saturate_to_zero() {
        assert_eq!(Value::from("abc").to_integer(), 0);
        assert_eq!(Value::from("abc").to_float(), 0.0);
        assert_eq!(Value::from("12.9").to_integer(), 12);
        assert_eq!(Value::from(vec![Value::from(1)]).to_integer(), 0);
        assert_eq!(Value::nil().to_float(), 0.0);
        assert_eq!(Value::from(9.99f64).to_integer(), 9);
    }

    #[test]
    fn test_to_bool_is_not_truthiness() {
        assert!(Value::from(true).to_bool());
        assert!(!Value::from(1i32).to_bool());
        assert!(!Value::from("true").to_bool());
        assert!(Value::from(1i32).is_true());
    }

    #[test]
    fn test_is_true() {
        assert!(!Value::from("").is_true());
        assert!(!Value::from(0i8).is_true());
        assert!(!Value::from(0u128).is_true());
        assert!(!Value::from(0.0f32).is_true());
        assert!(!Value::from(false).is_true());
        assert!(!Value::nil().is_true());
        assert!(!Value::from(Vec::<Value>::new()).is_true());

        assert!(Value::from(" ").is_true());
        assert!(Value::from(-1i64).is_true());
        assert!(Value::from(0.5f64).is_true());
        assert!(Value::from(vec![Value::nil()]).is_true());
    }

    #[test]
    fn test_negate() {
        assert_eq!(Value::from(5i32).negate().to_integer(), 0);
        assert_eq!(Value::from(0u8).negate().to_integer(), 1);
        assert_eq!(Value::from(0.0f64).negate().to_float(), 1.1);
        assert_eq!(Value::from(2.0f64).negate().to_float(), 0.0);
        assert!(Value::nil().negate().to_bool());
        assert!(Value::from("").negate().to_bool());
        assert!(!Value::from("x").negate().to_bool());
        assert!(!Value::from(true).negate().to_bool());
    }

    #[test]
    fn test_len_counts_runes() {
        assert_eq!(Value::from("héllo").len(), 5);
        assert_eq!(Value::from(vec![Value::from(1), Value::from(2)]).len(), 2);
        assert_eq!(Value::from(true).len(), 0);
        assert_eq!(Value::nil().len(), 0);
    }

    #[test]
    fn test_index_and_slice() {
        let s = Value::from("añb");
        assert_eq!(s.index(1).to_string(), "ñ");
        assert!(s.index(3).is_nil());
        assert_eq!(s.slice(1, 3).to_string(), "ñb");

        let list = Value::from(vec![Value::from(1), Value::from(2), Value::from(3)]);
        assert_eq!(list.index(2).to_integer(), 3);
        assert!(list.index(3).is_nil());
        assert_eq!(list.slice(0, 2).len(), 2);
        assert_eq!(list.slice(2, 9).len(), 0);
    }

    #[test]
    fn test_resolve_reference() {
        let target = Arc::new(Value::from(7i64));
        let v = Value::reference(Some(target));
        assert!(v.is_integer());
        assert_eq!(v.to_integer(), 7);
        assert!(matches!(v.resolve(), Datum::I64(7)));
        // resolving does not change the wrapped datum
        assert!(matches!(v.datum(), Datum::Shared(Some(_))));
        assert!(matches!(v.resolve(), Datum::I64(7)));

        let nil_ref = Value::reference(None);
        assert!(nil_ref.is_nil());
        assert_eq!(nil_ref.to_string(), "");
    }

    #[test]
    fn test_predicates() {
        assert!(Value::from(1u8).is_integer());
        assert!(Value::from(1u8).is_number());
        assert!(!Value::from(1u8).is_float());
        assert!(Value::from(1.0f32).is_float());
        assert!(Value::from("x").is_string());
        assert!(Value::from(false).is_bool());
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert!(Value::from(date).is_time());
    }
}
