use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

use crate::Result;
use crate::value::serializer::ValueSerializer;
use crate::value::{Datum, Value};

/// Any host type that can be handed to a template.
pub trait ToValue {
    fn to_value(&self) -> Value;
}

macro_rules! impl_to_value_primitive {
    ($rust_type:ty, $variant:ident) => {
        impl ToValue for $rust_type {
            fn to_value(&self) -> Value {
                Value::new(Datum::$variant(self.clone()))
            }
        }
    };
}

impl_to_value_primitive!(bool, Bool);
impl_to_value_primitive!(String, Str);
impl_to_value_primitive!(i8, I8);
impl_to_value_primitive!(i16, I16);
impl_to_value_primitive!(i32, I32);
impl_to_value_primitive!(i64, I64);
impl_to_value_primitive!(i128, I128);
impl_to_value_primitive!(u8, U8);
impl_to_value_primitive!(u16, U16);
impl_to_value_primitive!(u32, U32);
impl_to_value_primitive!(u64, U64);
impl_to_value_primitive!(u128, U128);
impl_to_value_primitive!(f32, F32);
impl_to_value_primitive!(f64, F64);
impl_to_value_primitive!(NaiveDate, Date);
impl_to_value_primitive!(NaiveDateTime, DateTime);
impl_to_value_primitive!(DateTime<Utc>, DateTimeUtc);

impl ToValue for isize {
    fn to_value(&self) -> Value {
        Value::new(Datum::I64(*self as i64))
    }
}

impl ToValue for usize {
    fn to_value(&self) -> Value {
        Value::new(Datum::U64(*self as u64))
    }
}

impl ToValue for char {
    fn to_value(&self) -> Value {
        Value::new(Datum::Str(self.to_string()))
    }
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::new(Datum::Str(self.to_string()))
    }
}

// Allow Value to be passed as a context entry
impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl ToValue for () {
    fn to_value(&self) -> Value {
        Value::nil()
    }
}

// Blanket implementation for references
impl<T> ToValue for &T
where
    T: ToValue + ?Sized,
{
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

// Pointer-like wrappers keep one level of indirection
impl<T: ToValue + ?Sized> ToValue for Arc<T> {
    fn to_value(&self) -> Value {
        Value::reference(Some(Arc::new((**self).to_value())))
    }
}

impl<T: ToValue + ?Sized> ToValue for Box<T> {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::nil(),
        }
    }
}

impl<T: ToValue> ToValue for [T] {
    fn to_value(&self) -> Value {
        Value::from(self.iter().map(|v| v.to_value()).collect::<Vec<_>>())
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(&self) -> Value {
        self.as_slice().to_value()
    }
}

impl<T: ToValue> ToValue for HashMap<String, T> {
    fn to_value(&self) -> Value {
        let mut map = HashMap::with_capacity(self.len());
        for (k, v) in self {
            map.insert(k.clone(), v.to_value());
        }
        Value::from(map)
    }
}

impl<T: ToValue> ToValue for BTreeMap<String, T> {
    fn to_value(&self) -> Value {
        let mut map = HashMap::with_capacity(self.len());
        for (k, v) in self {
            map.insert(k.clone(), v.to_value());
        }
        Value::from(map)
    }
}

impl Value {
    /// Converts any `Serialize` type. Structs become [`Record`](crate::value::Record)
    /// objects whose fields are looked up by name at render time.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
        value.serialize(ValueSerializer)
    }
}
