//! The encoder side of a view.
//!
//! A format encoder implements [`ViewWriter`] and receives the events of a
//! view through [`View::write_to`], with the output options already applied:
//! null members are dropped unless `include_null_properties` is set, and a
//! named root object is wrapped in an unnamed one when `wrap_named_root` is
//! set.

use crate::{Event, EventType, Result, Value, View, ViewOptions};

/// Receives the structure of a view, one call per written event.
pub trait ViewWriter {
    fn begin_object(&mut self, name: Option<&str>, namespace: Option<&str>) -> Result<()>;

    fn end_object(&mut self, name: Option<&str>) -> Result<()>;

    fn begin_array(&mut self, name: Option<&str>, namespace: Option<&str>) -> Result<()>;

    fn end_array(&mut self, name: Option<&str>) -> Result<()>;

    fn value(&mut self, name: Option<&str>, namespace: Option<&str>, value: &Value) -> Result<()>;

    /// Written like a value unless the format has its own notation.
    fn meta(&mut self, name: Option<&str>, namespace: Option<&str>, value: &Value) -> Result<()> {
        self.value(name, namespace, value)
    }

    /// Written like a value unless the format has its own notation.
    fn discriminator(&mut self, name: Option<&str>, namespace: Option<&str>, tag: &Value) -> Result<()> {
        self.value(name, namespace, tag)
    }

    fn before_view(&mut self) -> Result<()> {
        Ok(())
    }

    fn after_view(&mut self) -> Result<()> {
        Ok(())
    }
}

impl View {
    /// Replays this view into `writer`.
    ///
    /// Null `VALUE` members of objects are suppressed unless
    /// `include_null_properties` is set; null array elements are always
    /// written so positions are kept.
    pub fn write_to<W>(&self, writer: &mut W, options: &ViewOptions) -> Result<()>
    where
        W: ViewWriter + ?Sized,
    {
        writer.before_view()?;
        let wrap = options.wrap_named_root
            && self.events().first().is_some_and(|root| root.name().is_some());
        if wrap {
            writer.begin_object(None, None)?;
        }
        // Whether each open container is an array.
        let mut arrays: Vec<bool> = Vec::new();
        for event in self.events() {
            let in_array = arrays.last().copied().unwrap_or(false);
            write_event(writer, event, in_array, options)?;
            match event.kind() {
                EventType::BeginObject => arrays.push(false),
                EventType::BeginArray => arrays.push(true),
                EventType::EndObject | EventType::EndArray => {
                    arrays.pop();
                }
                _ => {}
            }
        }
        if wrap {
            writer.end_object(None)?;
        }
        writer.after_view()
    }
}

fn write_event<W>(writer: &mut W, event: &Event, in_array: bool, options: &ViewOptions) -> Result<()>
where
    W: ViewWriter + ?Sized,
{
    let (name, namespace) = (event.name(), event.namespace());
    match event.kind() {
        EventType::BeginObject => writer.begin_object(name, namespace),
        EventType::EndObject => writer.end_object(name),
        EventType::BeginArray => writer.begin_array(name, namespace),
        EventType::EndArray => writer.end_array(name),
        EventType::Value => {
            if event.value_ref().is_null() && !in_array && !options.include_null_properties {
                return Ok(());
            }
            writer.value(name, namespace, event.value_ref())
        }
        EventType::Meta => writer.meta(name, namespace, event.value_ref()),
        EventType::Discriminator => writer.discriminator(name, namespace, event.value_ref()),
    }
}
