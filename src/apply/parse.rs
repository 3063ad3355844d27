use tracing::debug;

use super::{Applier, FieldValue, ViewEntity};
use crate::{
    Error, Event, EventType, Node, NodeKind, PropertyEvent, Result, SubtypeTable, Value,
    ValueKind, Variant, ViewMode,
};

// ============ Cursor ============

impl<'a> Applier<'a, '_> {
    fn next(&mut self) -> Result<&'a Event> {
        let event = self.peek()?;
        self.pos += 1;
        Ok(event)
    }

    fn peek(&self) -> Result<&'a Event> {
        self.events.get(self.pos).ok_or_else(|| Error::UnexpectedEnd {
            path: self.scope.path().to_string(),
        })
    }

    fn unexpected(&self, expected: &str, found: Option<&Event>) -> Error {
        Error::UnexpectedEvent {
            path: self.scope.path().to_string(),
            expected: expected.to_string(),
            found: found.map_or_else(|| "end of view".to_string(), Event::to_string),
        }
    }

    /// Consumes the rest of the structure `event` opens, if it opens one.
    fn skip(&mut self, event: &Event) -> Result<()> {
        if !event.kind().is_begin() {
            return Ok(());
        }
        let mut depth = 1usize;
        while depth > 0 {
            let event = self.next()?;
            if event.kind().is_begin() {
                depth += 1;
            } else if event.kind().is_end() {
                depth -= 1;
            }
        }
        Ok(())
    }
}

// ============ Structure ============

impl<'a> Applier<'a, '_> {
    pub(super) fn parse_root(&mut self, root: &'a Node) -> Result<ViewEntity<'a>> {
        self.scope.push(root);
        let begin = self.next()?;
        if begin.kind() != EventType::BeginObject {
            return Err(self.unexpected("BEGIN_OBJECT", Some(begin)));
        }
        let entity = self.parse_object(root)?;
        self.scope.pop();
        match self.events.len() - self.pos {
            0 => Ok(entity),
            remaining => Err(Error::TrailingEvents(remaining)),
        }
    }

    /// Reads the array of a list template.
    pub(super) fn parse_root_list(&mut self, root: &'a Node) -> Result<FieldValue<'a>> {
        self.scope.push(root);
        let begin = self.next()?;
        if begin.kind() != EventType::BeginArray {
            return Err(self.unexpected("BEGIN_ARRAY", Some(begin)));
        }
        let value = self.parse_field(root, begin)?.unwrap_or(FieldValue::Null);
        self.scope.pop();
        match self.events.len() - self.pos {
            0 => Ok(value),
            remaining => Err(Error::TrailingEvents(remaining)),
        }
    }

    /// Reads the members of an object whose `BEGIN_OBJECT` was consumed, up
    /// to and including its `END_OBJECT`.
    fn parse_object(&mut self, node: &'a Node) -> Result<ViewEntity<'a>> {
        let (model_type, children) = match node.subtypes() {
            Some(table) => {
                let variant = self.read_discriminator(table)?;
                (variant.model_type().clone(), variant.children())
            }
            None => {
                let model_type = node.model_type().cloned().ok_or_else(|| {
                    Error::InvalidTemplate(format!("node `{}` has no model type", node.label()))
                })?;
                (model_type, node.children())
            }
        };
        let mut entity = ViewEntity::new(model_type);
        loop {
            let event = self.next()?;
            match event.kind() {
                EventType::EndObject => return Ok(entity),
                EventType::EndArray => return Err(self.unexpected("END_OBJECT", Some(event))),
                _ => self.parse_member(children, event, &mut entity)?,
            }
        }
    }

    /// Selects the variant named by the discriminator, which must be the
    /// first member of a polymorphic object.
    ///
    /// A `VALUE` or `META` event carrying the discriminator's name stands in
    /// for a `DISCRIMINATOR` event, as decoders of textual formats produce.
    fn read_discriminator(&mut self, table: &'a SubtypeTable) -> Result<&'a Variant> {
        let event = self.peek()?;
        let is_tag = match event.kind() {
            EventType::Discriminator => true,
            EventType::Value | EventType::Meta => event.name() == Some(table.discriminator()),
            _ => false,
        };
        if !is_tag {
            return Err(Error::MissingDiscriminator {
                path: self.scope.path().to_string(),
                discriminator: table.discriminator().to_string(),
            });
        }
        self.pos += 1;
        let tag = match event.value_ref() {
            Value::String(tag) => tag.clone(),
            other => other.to_string(),
        };
        match table.by_tag(&tag) {
            Some(variant) => Ok(variant.as_ref()),
            None => Err(Error::UnknownDiscriminator {
                path: self.scope.path().to_string(),
                tag,
            }),
        }
    }

    fn parse_member(
        &mut self,
        children: &'a [Node],
        event: &'a Event,
        entity: &mut ViewEntity<'a>,
    ) -> Result<()> {
        let Some(name) = event.name() else {
            return Err(self.unexpected("a named member", Some(event)));
        };
        let Some((splices, node)) = find_member(children, name) else {
            debug!(path = %self.scope.path(), member = name, "skipping unknown member");
            return self.skip(event);
        };
        self.scope.push(node);
        let value = self.parse_field(node, event);
        self.scope.pop();
        let Some(value) = value? else {
            return Ok(());
        };
        let mut target = entity;
        for splice in splices {
            target = target.spliced(splice);
        }
        target.push(node, value);
        Ok(())
    }
}

/// The child named `name`, looking through spliced templates. Returns the
/// chain of splice nodes crossed on the way.
fn find_member<'a>(children: &'a [Node], name: &str) -> Option<(Vec<&'a Node>, &'a Node)> {
    if let Some(node) = children.iter().find(|child| child.name() == Some(name)) {
        return Some((Vec::new(), node));
    }
    children.iter().find_map(|child| match child.kind() {
        NodeKind::Splice(template) => {
            find_member(template.root().children(), name).map(|(mut chain, node)| {
                chain.insert(0, child);
                (chain, node)
            })
        }
        _ => None,
    })
}

// ============ Fields ============

impl<'a> Applier<'a, '_> {
    /// Parses the value of one member. `None` drops the member, as for a
    /// one-directional converter.
    fn parse_field(&mut self, node: &'a Node, event: &'a Event) -> Result<Option<FieldValue<'a>>> {
        match node.kind() {
            NodeKind::Value => {
                let raw = self.scalar(event)?;
                Ok(self.to_model(node, node.value_kind(), raw)?.map(FieldValue::Value))
            }
            NodeKind::Meta(_) => {
                let raw = self.scalar(event)?;
                Ok(Some(FieldValue::Value(self.injected(node, raw))))
            }
            NodeKind::ArrayOfValues => match event.kind() {
                EventType::BeginArray => {
                    let element = node.value_kind().element();
                    let mut items = Vec::new();
                    loop {
                        let event = self.next()?;
                        if event.kind() == EventType::EndArray {
                            break;
                        }
                        let raw = self.scalar(event)?;
                        match self.convert(node, element, raw)? {
                            Some(item) => items.push(item),
                            None => {
                                self.skip_rest(EventType::EndArray)?;
                                return Ok(None);
                            }
                        }
                    }
                    Ok(Some(FieldValue::Value(self.injected(node, Value::List(items)))))
                }
                _ => self.null_or(event, "BEGIN_ARRAY"),
            },
            NodeKind::MapOfValues => match event.kind() {
                EventType::BeginObject => {
                    let kind = node.value_kind();
                    let mut entries = Vec::new();
                    loop {
                        let event = self.next()?;
                        if event.kind() == EventType::EndObject {
                            break;
                        }
                        let key = self.map_key(node, kind.key(), event)?;
                        let raw = self.scalar(event)?;
                        match (key, self.convert(node, kind.element(), raw)?) {
                            (Some(key), Some(value)) => entries.push((key, value)),
                            _ => {
                                self.skip_rest(EventType::EndObject)?;
                                return Ok(None);
                            }
                        }
                    }
                    Ok(Some(FieldValue::Value(self.injected(node, Value::Map(entries)))))
                }
                _ => self.null_or(event, "BEGIN_OBJECT"),
            },
            NodeKind::Object | NodeKind::Reference | NodeKind::Subtype | NodeKind::Envelope => {
                match event.kind() {
                    EventType::BeginObject => Ok(Some(FieldValue::Entity(self.parse_object(node)?))),
                    EventType::Value if !matches!(node.kind(), NodeKind::Envelope) => {
                        self.scalar_object(node, node.value_kind(), event)
                    }
                    _ => Err(self.unexpected("BEGIN_OBJECT", Some(event))),
                }
            }
            NodeKind::ArrayOfObjects | NodeKind::ArrayOfReferences => match event.kind() {
                EventType::BeginArray => {
                    let mut entities = Vec::new();
                    loop {
                        let event = self.next()?;
                        match event.kind() {
                            EventType::EndArray => break,
                            EventType::BeginObject => {
                                self.scope.push_element(node, None);
                                let entity = self.parse_object(node);
                                self.scope.pop();
                                entities.push(entity?);
                            }
                            EventType::Value => {
                                self.scalar_object(node, node.value_kind().element(), event)?;
                            }
                            _ => return Err(self.unexpected("BEGIN_OBJECT", Some(event))),
                        }
                    }
                    Ok(Some(FieldValue::Entities(entities)))
                }
                _ => self.null_or(event, "BEGIN_ARRAY"),
            },
            NodeKind::MapOfObjects | NodeKind::MapOfReferences => match event.kind() {
                EventType::BeginObject => {
                    let key_kind = node.value_kind().key();
                    let mut entries = Vec::new();
                    loop {
                        let event = self.next()?;
                        match event.kind() {
                            EventType::EndObject => break,
                            EventType::BeginObject => {
                                let key = self.map_key(node, key_kind, event)?;
                                self.scope.push_element(node, event.name());
                                let entity = self.parse_object(node);
                                self.scope.pop();
                                let entity = entity?;
                                if let Some(key) = key {
                                    entries.push((key, entity));
                                }
                            }
                            EventType::Value => {
                                self.scalar_object(node, node.value_kind().element(), event)?;
                            }
                            _ => return Err(self.unexpected("BEGIN_OBJECT", Some(event))),
                        }
                    }
                    Ok(Some(FieldValue::Keyed(entries)))
                }
                _ => self.null_or(event, "BEGIN_OBJECT"),
            },
            NodeKind::Splice(_) => {
                self.skip(event)?;
                Ok(None)
            }
        }
    }

    /// The value of a `VALUE` or `META` event.
    fn scalar(&self, event: &Event) -> Result<Value> {
        match event.kind() {
            EventType::Value | EventType::Meta => Ok(event.value_ref().clone()),
            _ => Err(self.unexpected("VALUE", Some(event))),
        }
    }

    /// `FieldValue::Null` for a null `VALUE`, else an unexpected-event error.
    fn null_or(&self, event: &Event, expected: &str) -> Result<Option<FieldValue<'a>>> {
        if is_null(event) {
            Ok(Some(FieldValue::Null))
        } else {
            Err(self.unexpected(expected, Some(event)))
        }
    }

    /// An object position written as a scalar: null, or a value a converter
    /// rendered from the object. A one-directional converter drops it.
    fn scalar_object(&self, node: &Node, kind: &ValueKind, event: &Event) -> Result<Option<FieldValue<'a>>> {
        match self.convert(node, kind, event.value_ref().clone())? {
            None => Ok(None),
            Some(Value::Null) => Ok(Some(FieldValue::Null)),
            Some(_) => Err(self.unexpected("BEGIN_OBJECT", Some(event))),
        }
    }

    fn skip_rest(&mut self, end: EventType) -> Result<()> {
        loop {
            let event = self.next()?;
            if event.kind() == end {
                return Ok(());
            }
            self.skip(event)?;
        }
    }

    fn map_key(&self, node: &Node, kind: &ValueKind, event: &Event) -> Result<Option<Value>> {
        let Some(name) = event.name() else {
            return Err(self.unexpected("a named map entry", Some(event)));
        };
        self.convert(node, kind, Value::String(name.to_string()))
    }

    /// Converts a view value and runs the injection hooks on the result.
    fn to_model(&self, node: &Node, kind: &ValueKind, raw: Value) -> Result<Option<Value>> {
        Ok(self.convert(node, kind, raw)?.map(|value| self.injected(node, value)))
    }

    fn convert(&self, node: &Node, kind: &ValueKind, raw: Value) -> Result<Option<Value>> {
        self.scope.converters_for(node).to_model_value(kind, raw, &self.scope)
    }

    fn injected(&self, node: &Node, value: Value) -> Value {
        let value = self.will_inject(node, value);
        let event = self.property_event(node);
        self.scope.listeners().property_visited(&event, &value);
        value
    }

    fn will_inject(&self, node: &Node, value: Value) -> Value {
        let event = self.property_event(node);
        self.scope.listeners().will_inject_value(&event, value)
    }

    fn property_event<'e>(&'e self, node: &'e Node) -> PropertyEvent<'e> {
        PropertyEvent {
            mode: ViewMode::Apply,
            node,
            owner: None,
            path: self.scope.path(),
        }
    }
}

fn is_null(event: &Event) -> bool {
    event.kind() == EventType::Value && event.value_ref().is_null()
}
