//! The event vocabulary of a view.
//!
//! A view is a flat, replayable sequence of [`Event`]s. Containers open with a
//! `BEGIN_*` event and close with the matching `END_*` event; everything in
//! between belongs to that container.

use std::fmt;

use crate::{Error, Result, Value};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The kind of a view event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum EventType {
    BeginObject,
    EndObject,
    BeginArray,
    EndArray,
    Value,
    Meta,
    Discriminator,
}

impl EventType {
    #[inline]
    pub const fn is_begin(self) -> bool {
        matches!(self, EventType::BeginObject | EventType::BeginArray)
    }

    #[inline]
    pub const fn is_end(self) -> bool {
        matches!(self, EventType::EndObject | EventType::EndArray)
    }

    /// The event type that closes `self`, if `self` opens a container.
    pub const fn closing(self) -> Option<EventType> {
        match self {
            EventType::BeginObject => Some(EventType::EndObject),
            EventType::BeginArray => Some(EventType::EndArray),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            EventType::BeginObject => "BEGIN_OBJECT",
            EventType::EndObject => "END_OBJECT",
            EventType::BeginArray => "BEGIN_ARRAY",
            EventType::EndArray => "END_ARRAY",
            EventType::Value => "VALUE",
            EventType::Meta => "META",
            EventType::Discriminator => "DISCRIMINATOR",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event of a view.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Event {
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    kind: EventType,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    name: Option<String>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    namespace: Option<String>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Value::is_null"))]
    value: Value,
}

impl Event {
    pub fn new(kind: EventType, name: Option<String>, namespace: Option<String>, value: Value) -> Self {
        Event {
            kind,
            name,
            namespace,
            value,
        }
    }

    pub fn begin_object(name: Option<&str>) -> Self {
        Event::new(EventType::BeginObject, name.map(str::to_string), None, Value::Null)
    }

    pub fn end_object(name: Option<&str>) -> Self {
        Event::new(EventType::EndObject, name.map(str::to_string), None, Value::Null)
    }

    pub fn begin_array(name: Option<&str>) -> Self {
        Event::new(EventType::BeginArray, name.map(str::to_string), None, Value::Null)
    }

    pub fn end_array(name: Option<&str>) -> Self {
        Event::new(EventType::EndArray, name.map(str::to_string), None, Value::Null)
    }

    pub fn value(name: Option<&str>, value: impl Into<Value>) -> Self {
        Event::new(EventType::Value, name.map(str::to_string), None, value.into())
    }

    pub fn meta(name: &str, value: impl Into<Value>) -> Self {
        Event::new(EventType::Meta, Some(name.to_string()), None, value.into())
    }

    pub fn discriminator(name: &str, tag: &str) -> Self {
        Event::new(
            EventType::Discriminator,
            Some(name.to_string()),
            None,
            Value::String(tag.to_string()),
        )
    }

    /// Returns `self` with the given namespace.
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }

    #[inline]
    pub fn kind(&self) -> EventType {
        self.kind
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    #[inline]
    pub fn value_ref(&self) -> &Value {
        &self.value
    }

    #[inline]
    pub fn into_value(self) -> Value {
        self.value
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.as_str())?;
        if let Some(name) = &self.name {
            write!(f, "({name})")?;
        }
        if matches!(self.kind, EventType::Value | EventType::Meta | EventType::Discriminator) {
            write!(f, " = {}", self.value)?;
        }
        Ok(())
    }
}

/// An immutable, replayable sequence of events.
///
/// # Example
///
/// ```
/// use prospect::{Event, View};
///
/// let view = View::new(vec![
///     Event::begin_object(None),
///     Event::value(Some("name"), "Ann"),
///     Event::end_object(None),
/// ]);
/// assert!(view.validate().is_ok());
/// assert_eq!(view.len(), 3);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct View {
    events: Vec<Event>,
}

impl View {
    pub fn new(events: Vec<Event>) -> Self {
        View { events }
    }

    #[inline]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    /// Checks that the view is well formed.
    ///
    /// Every `BEGIN_*` is closed by the matching `END_*` (with the same name
    /// when both carry one), and the view holds exactly one root structure.
    pub fn validate(&self) -> Result<()> {
        let ends = match_blocks(&self.events)?;
        if let Some(first) = self.events.first().filter(|e| !e.kind.is_begin()) {
            return Err(Error::UnexpectedEvent {
                path: "/".into(),
                expected: "BEGIN_OBJECT or BEGIN_ARRAY".into(),
                found: first.to_string(),
            });
        }
        match ends.first() {
            None => Err(Error::UnexpectedEnd { path: "/".into() }),
            Some(&end) if end + 1 < self.events.len() => {
                Err(Error::TrailingEvents(self.events.len() - end - 1))
            }
            Some(_) => Ok(()),
        }
    }
}

impl<'a> IntoIterator for &'a View {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

impl IntoIterator for View {
    type Item = Event;
    type IntoIter = std::vec::IntoIter<Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

impl FromIterator<Event> for View {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        View::new(iter.into_iter().collect())
    }
}

/// For each event, the index of the event that closes it.
///
/// Scalar events close themselves; a `BEGIN_*` maps to its matching `END_*`.
pub(crate) fn match_blocks(events: &[Event]) -> Result<Vec<usize>> {
    let mut ends: Vec<usize> = (0..events.len()).collect();
    let mut open: Vec<usize> = Vec::new();
    for (index, event) in events.iter().enumerate() {
        if event.kind.is_begin() {
            open.push(index);
        } else if event.kind.is_end() {
            let start = open.pop().ok_or_else(|| Error::UnexpectedEvent {
                path: "/".into(),
                expected: "a BEGIN event before".into(),
                found: event.to_string(),
            })?;
            let begin = &events[start];
            let names_differ = matches!((begin.name(), event.name()), (Some(a), Some(b)) if a != b);
            if begin.kind.closing() != Some(event.kind) || names_differ {
                return Err(Error::UnexpectedEvent {
                    path: "/".into(),
                    expected: format!("the end of {begin}"),
                    found: event.to_string(),
                });
            }
            ends[start] = index;
        }
    }
    if !open.is_empty() {
        return Err(Error::UnexpectedEnd { path: "/".into() });
    }
    Ok(ends)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_blocks_pairs_containers() {
        let events = vec![
            Event::begin_object(None),
            Event::begin_array(Some("pets")),
            Event::value(None, 1),
            Event::end_array(Some("pets")),
            Event::end_object(None),
        ];
        assert_eq!(match_blocks(&events).unwrap(), vec![4, 3, 2, 3, 4]);
    }

    #[test]
    fn test_validate_rejects_mismatched_end() {
        let view = View::new(vec![Event::begin_object(None), Event::end_array(None)]);
        assert!(matches!(view.validate(), Err(Error::UnexpectedEvent { .. })));
    }

    #[test]
    fn test_validate_rejects_renamed_end() {
        let view = View::new(vec![
            Event::begin_object(Some("a")),
            Event::end_object(Some("b")),
        ]);
        assert!(view.validate().is_err());
    }

    #[test]
    fn test_validate_reports_trailing_events() {
        let view = View::new(vec![
            Event::begin_object(None),
            Event::end_object(None),
            Event::value(Some("x"), 1),
        ]);
        assert!(matches!(view.validate(), Err(Error::TrailingEvents(1))));
    }

    #[test]
    fn test_validate_reports_unclosed() {
        let view = View::new(vec![Event::begin_object(None)]);
        assert!(matches!(view.validate(), Err(Error::UnexpectedEnd { .. })));
    }

    #[test]
    fn test_event_display() {
        assert_eq!(Event::value(Some("name"), "Ann").to_string(), "VALUE(name) = Ann");
        assert_eq!(Event::begin_array(None).to_string(), "BEGIN_ARRAY");
    }
}
