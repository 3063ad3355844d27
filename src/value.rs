//! Dynamic values exchanged between models, converters and views.

use std::{cell::RefCell, collections::BTreeMap, fmt, rc::Rc};

use bytes::Bytes;

use crate::{Error, Model, ModelRef, Result, TypeTag};

/// A dynamically typed value.
///
/// Scalars appear in views. [`Value::Model`] only lives on the model side and
/// must be converted before it can be written to a view.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Bytes),
    Model(ModelRef),
    List(Vec<Value>),
    /// Entries in insertion order.
    Map(Vec<(Value, Value)>),
}

/// The declared kind of a property or value position.
#[derive(Clone, Debug, PartialEq)]
pub enum ValueKind {
    /// No constraint.
    Any,
    Bool,
    Int,
    Float,
    String,
    Bytes,
    Model(TypeTag),
    List(Box<ValueKind>),
    Map(Box<ValueKind>, Box<ValueKind>),
}

static ANY: ValueKind = ValueKind::Any;
static STRING: ValueKind = ValueKind::String;

impl ValueKind {
    /// Element kind of a list, value kind of a map, [`ValueKind::Any`] otherwise.
    pub fn element(&self) -> &ValueKind {
        match self {
            ValueKind::List(element) | ValueKind::Map(_, element) => element,
            _ => &ANY,
        }
    }

    /// Key kind of a map; strings for everything else.
    pub fn key(&self) -> &ValueKind {
        match self {
            ValueKind::Map(key, _) => key,
            _ => &STRING,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            ValueKind::Bool | ValueKind::Int | ValueKind::Float | ValueKind::String | ValueKind::Bytes
        )
    }

    pub fn model_tag(&self) -> Option<TypeTag> {
        match self {
            ValueKind::Model(tag) => Some(*tag),
            _ => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Any => f.write_str("any"),
            ValueKind::Bool => f.write_str("bool"),
            ValueKind::Int => f.write_str("int"),
            ValueKind::Float => f.write_str("float"),
            ValueKind::String => f.write_str("string"),
            ValueKind::Bytes => f.write_str("bytes"),
            ValueKind::Model(tag) => f.write_str(tag.name()),
            ValueKind::List(element) => write!(f, "list<{element}>"),
            ValueKind::Map(key, value) => write!(f, "map<{key}, {value}>"),
        }
    }
}

impl Value {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Runtime kind of this value, `None` for null.
    pub fn kind(&self) -> Option<ValueKind> {
        Some(match self {
            Value::Null => return None,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::String(_) => ValueKind::String,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::Model(model) => ValueKind::Model(model.model_type().tag()),
            Value::List(_) => ValueKind::List(Box::new(ValueKind::Any)),
            Value::Map(_) => ValueKind::Map(Box::new(ValueKind::Any), Box::new(ValueKind::Any)),
        })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Model(model) => model.model_type().name(),
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_model(&self) -> Option<&ModelRef> {
        match self {
            Value::Model(model) => Some(model),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Converts this value to the declared `kind` where a lossless or textual
    /// conversion exists.
    ///
    /// Null passes through unchanged. Strings parse into numbers and booleans,
    /// which lets map keys read back from a view as their declared kind.
    pub fn coerce(self, kind: &ValueKind) -> Result<Value> {
        let found = self.type_name();
        let mismatch = || Error::mismatch(kind, found);
        match (kind, self) {
            (_, Value::Null) => Ok(Value::Null),
            (ValueKind::Any, value) => Ok(value),

            (ValueKind::Bool, value @ Value::Bool(_)) => Ok(value),
            (ValueKind::Bool, Value::String(s)) => s.parse().map(Value::Bool).map_err(|_| mismatch()),

            (ValueKind::Int, value @ Value::Int(_)) => Ok(value),
            (ValueKind::Int, Value::Float(f))
                if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 =>
            {
                Ok(Value::Int(f as i64))
            }
            (ValueKind::Int, Value::String(s)) => s.parse().map(Value::Int).map_err(|_| mismatch()),

            (ValueKind::Float, value @ Value::Float(_)) => Ok(value),
            (ValueKind::Float, Value::Int(n)) => Ok(Value::Float(n as f64)),
            (ValueKind::Float, Value::String(s)) => {
                s.parse().map(Value::Float).map_err(|_| mismatch())
            }

            (ValueKind::String, value @ Value::String(_)) => Ok(value),
            (ValueKind::String, value @ (Value::Bool(_) | Value::Int(_) | Value::Float(_))) => {
                Ok(Value::String(value.to_string()))
            }

            (ValueKind::Bytes, value @ Value::Bytes(_)) => Ok(value),
            (ValueKind::Bytes, Value::String(s)) => Ok(Value::Bytes(Bytes::from(s.into_bytes()))),

            (ValueKind::Model(tag), Value::Model(model)) => {
                if model.model_type().distance_to(tag.key()).is_some() {
                    Ok(Value::Model(model))
                } else {
                    Err(mismatch())
                }
            }

            (ValueKind::List(element), Value::List(items)) => items
                .into_iter()
                .map(|item| item.coerce(element))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),

            (ValueKind::Map(key, value), Value::Map(entries)) => entries
                .into_iter()
                .map(|(k, v)| Ok((k.coerce(key)?, v.coerce(value)?)))
                .collect::<Result<Vec<_>>>()
                .map(Value::Map),

            _ => Err(mismatch()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::String(s) => f.write_str(s),
            Value::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Value::Model(model) => write!(f, "<{}>", model.model_type().name()),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

// ============ Conversions between Rust types and Value ============

/// Conversion of a Rust value into a [`Value`].
pub trait IntoValue {
    fn into_value(self) -> Value;
}

/// Conversion of a [`Value`] back into a Rust value.
pub trait FromValue: Sized {
    /// The kind a property of this Rust type declares.
    fn kind() -> ValueKind;

    fn from_value(value: Value) -> Result<Self>;
}

impl IntoValue for Value {
    #[inline]
    fn into_value(self) -> Value {
        self
    }
}

impl FromValue for Value {
    fn kind() -> ValueKind {
        ValueKind::Any
    }

    #[inline]
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

macro_rules! int_value {
    ($($t:ty),*) => {
        $(
            impl IntoValue for $t {
                #[inline]
                fn into_value(self) -> Value {
                    Value::Int(i64::from(self))
                }
            }

            impl FromValue for $t {
                fn kind() -> ValueKind {
                    ValueKind::Int
                }

                fn from_value(value: Value) -> Result<Self> {
                    let found = value.type_name();
                    match value.coerce(&ValueKind::Int)? {
                        Value::Int(n) => <$t>::try_from(n).map_err(|_| {
                            Error::custom(format!("{n} is out of range for {}", stringify!($t)))
                        }),
                        _ => Err(Error::mismatch(stringify!($t), found)),
                    }
                }
            }

            impl From<$t> for Value {
                #[inline]
                fn from(value: $t) -> Self {
                    value.into_value()
                }
            }
        )*
    };
}

int_value!(i8, i16, i32, i64, u8, u16, u32);

impl IntoValue for f64 {
    #[inline]
    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl FromValue for f64 {
    fn kind() -> ValueKind {
        ValueKind::Float
    }

    fn from_value(value: Value) -> Result<Self> {
        let found = value.type_name();
        match value.coerce(&ValueKind::Float)? {
            Value::Float(n) => Ok(n),
            _ => Err(Error::mismatch("f64", found)),
        }
    }
}

impl IntoValue for f32 {
    #[inline]
    fn into_value(self) -> Value {
        Value::Float(f64::from(self))
    }
}

impl FromValue for f32 {
    fn kind() -> ValueKind {
        ValueKind::Float
    }

    fn from_value(value: Value) -> Result<Self> {
        f64::from_value(value).map(|n| n as f32)
    }
}

impl IntoValue for bool {
    #[inline]
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl FromValue for bool {
    fn kind() -> ValueKind {
        ValueKind::Bool
    }

    fn from_value(value: Value) -> Result<Self> {
        let found = value.type_name();
        match value.coerce(&ValueKind::Bool)? {
            Value::Bool(b) => Ok(b),
            _ => Err(Error::mismatch("bool", found)),
        }
    }
}

impl IntoValue for String {
    #[inline]
    fn into_value(self) -> Value {
        Value::String(self)
    }
}

impl IntoValue for &str {
    #[inline]
    fn into_value(self) -> Value {
        Value::String(self.to_string())
    }
}

impl FromValue for String {
    fn kind() -> ValueKind {
        ValueKind::String
    }

    fn from_value(value: Value) -> Result<Self> {
        let found = value.type_name();
        match value.coerce(&ValueKind::String)? {
            Value::String(s) => Ok(s),
            _ => Err(Error::mismatch("string", found)),
        }
    }
}

impl IntoValue for Bytes {
    #[inline]
    fn into_value(self) -> Value {
        Value::Bytes(self)
    }
}

impl FromValue for Bytes {
    fn kind() -> ValueKind {
        ValueKind::Bytes
    }

    fn from_value(value: Value) -> Result<Self> {
        let found = value.type_name();
        match value.coerce(&ValueKind::Bytes)? {
            Value::Bytes(bytes) => Ok(bytes),
            _ => Err(Error::mismatch("bytes", found)),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<ModelRef> for Value {
    fn from(value: ModelRef) -> Self {
        Value::Model(value)
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        match self {
            Some(value) => value.into_value(),
            None => Value::Null,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn kind() -> ValueKind {
        T::kind()
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            value => T::from_value(value).map(Some),
        }
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn kind() -> ValueKind {
        ValueKind::List(Box::new(T::kind()))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            Value::Null => Ok(Vec::new()),
            other => Err(Error::mismatch("list", other.type_name())),
        }
    }
}

impl<K: IntoValue, V: IntoValue> IntoValue for BTreeMap<K, V> {
    fn into_value(self) -> Value {
        Value::Map(
            self.into_iter()
                .map(|(key, value)| (key.into_value(), value.into_value()))
                .collect(),
        )
    }
}

impl<K: FromValue + Ord, V: FromValue> FromValue for BTreeMap<K, V> {
    fn kind() -> ValueKind {
        ValueKind::Map(Box::new(K::kind()), Box::new(V::kind()))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Map(entries) => entries
                .into_iter()
                .map(|(key, value)| Ok((K::from_value(key)?, V::from_value(value)?)))
                .collect(),
            Value::Null => Ok(BTreeMap::new()),
            other => Err(Error::mismatch("map", other.type_name())),
        }
    }
}

impl IntoValue for ModelRef {
    #[inline]
    fn into_value(self) -> Value {
        Value::Model(self)
    }
}

impl FromValue for ModelRef {
    fn kind() -> ValueKind {
        ValueKind::Any
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Model(model) => Ok(model),
            other => Err(Error::mismatch("model", other.type_name())),
        }
    }
}

impl<T: Model> IntoValue for Rc<RefCell<T>> {
    fn into_value(self) -> Value {
        Value::Model(ModelRef::from_rc(self))
    }
}

impl<T: Model> FromValue for Rc<RefCell<T>> {
    fn kind() -> ValueKind {
        ValueKind::Model(TypeTag::of::<T>())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Model(model) => model
                .downcast::<T>()
                .ok_or_else(|| Error::mismatch(TypeTag::of::<T>().name(), model.model_type().name())),
            other => Err(Error::mismatch(TypeTag::of::<T>().name(), other.type_name())),
        }
    }
}
