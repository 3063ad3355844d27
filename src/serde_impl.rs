//! Serde support for values and whole views.
//!
//! A view serializes in nested form: objects become maps keyed by member
//! name, arrays become sequences and `VALUE`, `META` and `DISCRIMINATOR`
//! events become their values. Deserializing walks any self-describing
//! format back into events, so a view can travel through `serde_json` (or
//! any other serde format) and be applied on the other side.
//!
//! # Example
//!
//! ```
//! use prospect::{Event, View};
//!
//! let view = View::new(vec![
//!     Event::begin_object(None),
//!     Event::value(Some("name"), "Ann"),
//!     Event::end_object(None),
//! ]);
//! let json = serde_json::to_string(&view).unwrap();
//! assert_eq!(json, r#"{"name":"Ann"}"#);
//!
//! let back: View = serde_json::from_str(&json).unwrap();
//! assert_eq!(back, view);
//! ```

use std::fmt;

use bytes::Bytes;
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{self, DeserializeSeed, MapAccess, SeqAccess, Visitor},
    ser::{self, SerializeMap, SerializeSeq},
};

use crate::{Event, EventType, Result, Value, View, ViewOptions, event::match_blocks};

// ============ Value ============

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Float(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Bytes(bytes) => serializer.serialize_bytes(bytes),
            Value::Model(model) => Err(ser::Error::custom(format_args!(
                "a `{}` model must be converted before it can be serialized",
                model.model_type().name()
            ))),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(&key.to_string(), value)?;
                }
                map.end()
            }
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("any value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Value, E> {
        Ok(Value::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Value, E> {
        Ok(i64::try_from(v).map_or(Value::Float(v as f64), Value::Int))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> std::result::Result<Value, E> {
        Ok(Value::Bytes(Bytes::copy_from_slice(v)))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> std::result::Result<Value, E> {
        Ok(Value::Bytes(Bytes::from(v)))
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Value, A::Error> {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some(entry) = map.next_entry()? {
            entries.push(entry);
        }
        Ok(Value::Map(entries))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

// ============ View, nested form ============

/// A view prepared for serialization under explicit [`ViewOptions`].
///
/// `impl Serialize for View` uses the default options; this type is what to
/// reach for when null members or the root wrapper matter.
pub struct SerializableView<'v> {
    events: &'v [Event],
    ends: Vec<usize>,
    options: ViewOptions,
}

impl View {
    /// Pairs this view with output options for serialization.
    ///
    /// Fails if the view is not balanced.
    pub fn serializable(&self, options: &ViewOptions) -> Result<SerializableView<'_>> {
        Ok(SerializableView {
            events: self.events(),
            ends: match_blocks(self.events())?,
            options: *options,
        })
    }
}

impl Serialize for SerializableView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let Some(root) = self.events.first() else {
            return serializer.serialize_unit();
        };
        let nested = Nested { view: self, index: 0 };
        match root.name() {
            Some(name) if self.options.wrap_named_root => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(name, &nested)?;
                map.end()
            }
            _ => nested.serialize(serializer),
        }
    }
}

/// The structure starting at one event of a view.
struct Nested<'s, 'v> {
    view: &'s SerializableView<'v>,
    index: usize,
}

impl Nested<'_, '_> {
    /// Indices of the direct children of the container at `self.index`.
    fn children(&self) -> impl Iterator<Item = usize> + '_ {
        let end = self.view.ends[self.index];
        let mut next = self.index + 1;
        std::iter::from_fn(move || {
            if next >= end {
                return None;
            }
            let current = next;
            next = self.view.ends[current] + 1;
            Some(current)
        })
    }

    fn at(&self, index: usize) -> Nested<'_, '_> {
        Nested {
            view: self.view,
            index,
        }
    }
}

impl Serialize for Nested<'_, '_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let events = self.view.events;
        let event = &events[self.index];
        match event.kind() {
            EventType::BeginObject => {
                let mut map = serializer.serialize_map(None)?;
                for child in self.children() {
                    let member = &events[child];
                    let skipped = member.kind() == EventType::Value
                        && member.value_ref().is_null()
                        && !self.view.options.include_null_properties;
                    if skipped {
                        continue;
                    }
                    let Some(name) = member.name() else {
                        return Err(ser::Error::custom(format_args!(
                            "object member without a name: {member}"
                        )));
                    };
                    map.serialize_entry(name, &self.at(child))?;
                }
                map.end()
            }
            EventType::BeginArray => {
                let mut seq = serializer.serialize_seq(None)?;
                for child in self.children() {
                    seq.serialize_element(&self.at(child))?;
                }
                seq.end()
            }
            EventType::Value | EventType::Meta | EventType::Discriminator => {
                event.value_ref().serialize(serializer)
            }
            EventType::EndObject | EventType::EndArray => Err(ser::Error::custom(format_args!(
                "unexpected {event}"
            ))),
        }
    }
}

impl Serialize for View {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.serializable(&ViewOptions::default())
            .map_err(ser::Error::custom)?
            .serialize(serializer)
    }
}

// ============ View, from any self-describing format ============

/// Appends the events of one deserialized structure, named `name`.
struct EventSeed<'e> {
    name: Option<String>,
    events: &'e mut Vec<Event>,
}

impl EventSeed<'_> {
    fn scalar(self, value: Value) {
        self.events
            .push(Event::new(EventType::Value, self.name, None, value));
    }
}

impl<'de> DeserializeSeed<'de> for EventSeed<'_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<(), D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for EventSeed<'_> {
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a view")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<(), E> {
        self.scalar(Value::Bool(v));
        Ok(())
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<(), E> {
        self.scalar(Value::Int(v));
        Ok(())
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<(), E> {
        let value = ValueVisitor.visit_u64::<E>(v)?;
        self.scalar(value);
        Ok(())
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<(), E> {
        self.scalar(Value::Float(v));
        Ok(())
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<(), E> {
        self.scalar(Value::String(v.to_string()));
        Ok(())
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<(), E> {
        self.scalar(Value::String(v));
        Ok(())
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> std::result::Result<(), E> {
        self.scalar(Value::Bytes(Bytes::copy_from_slice(v)));
        Ok(())
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> std::result::Result<(), E> {
        self.scalar(Value::Bytes(Bytes::from(v)));
        Ok(())
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<(), E> {
        self.scalar(Value::Null);
        Ok(())
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<(), E> {
        self.scalar(Value::Null);
        Ok(())
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<(), D::Error> {
        deserializer.deserialize_any(self)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<(), A::Error> {
        let name = self.name.as_deref();
        self.events.push(Event::begin_array(name));
        while seq
            .next_element_seed(EventSeed {
                name: None,
                events: &mut *self.events,
            })?
            .is_some()
        {}
        self.events.push(Event::end_array(name));
        Ok(())
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<(), A::Error> {
        let name = self.name.as_deref();
        self.events.push(Event::begin_object(name));
        while let Some(key) = map.next_key::<String>()? {
            map.next_value_seed(EventSeed {
                name: Some(key),
                events: &mut *self.events,
            })?;
        }
        self.events.push(Event::end_object(name));
        Ok(())
    }
}

impl<'de> Deserialize<'de> for View {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let mut events = Vec::new();
        EventSeed {
            name: None,
            events: &mut events,
        }
        .deserialize(deserializer)?;
        Ok(View::new(events))
    }
}
