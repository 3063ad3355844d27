//! Model to view: a depth-first walk of the template that writes events.

use tracing::{debug, trace};

use crate::{
    Error, Event, EventType, ModelRef, Node, NodeEvent, NodeKind, PropertyEvent, Result,
    ScopedViewContext, Value, View, ViewContext, ViewMode, Visit,
};

pub(crate) fn generate(root: &Node, model: &ModelRef, context: &ViewContext) -> Result<View> {
    if let Some(expected) = root.model_type() {
        if !model.model_type().is_assignable_to(expected) {
            return Err(Error::mismatch(expected, model.model_type()));
        }
    }
    let mut generator = Generator::new(context);
    generator.visit_root(root, model)?;
    generator.finish(root)
}

/// Generates the view of a template whose root is an array.
pub(crate) fn generate_list(root: &Node, items: Vec<Value>, context: &ViewContext) -> Result<View> {
    let mut generator = Generator::new(context);
    generator.scope.push(root);
    let result = generator.guarded(root, None, |this| this.write_list(root, items));
    generator.scope.pop();
    result?;
    generator.finish(root)
}

struct Generator<'c> {
    scope: ScopedViewContext<'c>,
    events: Vec<Event>,
}

impl<'c> Generator<'c> {
    fn new(context: &'c ViewContext) -> Self {
        Generator {
            scope: ScopedViewContext::new(context, ViewMode::Generate),
            events: Vec::new(),
        }
    }

    fn finish(self, root: &Node) -> Result<View> {
        debug!(
            root = %root.label(),
            events = self.events.len(),
            "generated view"
        );
        Ok(View::new(self.events))
    }
}

impl Generator<'_> {
    fn visit_root(&mut self, root: &Node, model: &ModelRef) -> Result<()> {
        self.scope.push(root);
        let result = self.guarded(root, Some(model), |this| {
            this.write_object(root, root.name(), model)
        });
        self.scope.pop();
        result
    }

    fn visit(&mut self, node: &Node, owner: &ModelRef) -> Result<()> {
        let node = node.bound_to(owner.model_type())?;
        self.scope.push(&node);
        let result = self.guarded(&node, Some(owner), |this| this.evaluate(&node, owner));
        self.scope.pop();
        result
    }

    /// Runs `body` between the before and after visit hooks, unless a
    /// listener vetoes the node.
    fn guarded<F>(&mut self, node: &Node, model: Option<&ModelRef>, body: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let listeners = self.scope.listeners();
        let event = NodeEvent {
            mode: ViewMode::Generate,
            node,
            model,
            path: self.scope.path(),
        };
        if listeners.will_visit(&event) == Visit::SkipSubtree {
            trace!(path = %self.scope.path(), "subtree skipped by listener");
            return Ok(());
        }
        body(&mut *self)?;
        listeners.visited(&NodeEvent {
            mode: ViewMode::Generate,
            node,
            model,
            path: self.scope.path(),
        });
        Ok(())
    }

    fn evaluate(&mut self, node: &Node, owner: &ModelRef) -> Result<()> {
        match node.kind() {
            NodeKind::Value => {
                let Some(value) = self.read(node, owner)? else {
                    return Ok(());
                };
                let value = self.to_view(node, value)?;
                self.visited(node, owner, &value);
                self.emit(node, EventType::Value, node.name(), value);
            }
            NodeKind::Meta(handler) => {
                let value = handler.produce(node, owner, &self.scope)?;
                self.visited(node, owner, &value);
                self.emit(node, EventType::Meta, node.name(), value);
            }
            NodeKind::Envelope => {
                self.emit(node, EventType::BeginObject, node.name(), Value::Null);
                for child in node.children() {
                    self.visit(child, owner)?;
                }
                self.emit(node, EventType::EndObject, node.name(), Value::Null);
            }
            NodeKind::Splice(template) => {
                let target = match node.accessor() {
                    None => owner.clone(),
                    Some(_) => match self.read(node, owner)? {
                        None | Some(Value::Null) => return Ok(()),
                        Some(Value::Model(model)) => model,
                        Some(other) => return Err(self.not_a_model(node, &other)),
                    },
                };
                for child in template.root().children() {
                    self.visit(child, &target)?;
                }
            }
            NodeKind::Object | NodeKind::Reference | NodeKind::Subtype => {
                let Some(value) = self.read(node, owner)? else {
                    return Ok(());
                };
                let value = self.to_view(node, value)?;
                self.visited(node, owner, &value);
                self.write_element(node, node.name(), value)?;
            }
            NodeKind::ArrayOfValues => {
                let Some(value) = self.read(node, owner)? else {
                    return Ok(());
                };
                let value = match value {
                    Value::List(items) => Value::List(
                        items
                            .into_iter()
                            .map(|item| self.to_view(node, item))
                            .collect::<Result<_>>()?,
                    ),
                    other => self.to_view(node, other)?,
                };
                self.visited(node, owner, &value);
                match value {
                    Value::List(items) => {
                        self.emit(node, EventType::BeginArray, node.name(), Value::Null);
                        for item in items {
                            self.emit(node, EventType::Value, node.element_name(), item);
                        }
                        self.emit(node, EventType::EndArray, node.name(), Value::Null);
                    }
                    scalar => self.emit(node, EventType::Value, node.name(), scalar),
                }
            }
            NodeKind::MapOfValues => {
                let Some(value) = self.read(node, owner)? else {
                    return Ok(());
                };
                let value = match value {
                    Value::Map(entries) => Value::Map(
                        entries
                            .into_iter()
                            .map(|(key, value)| Ok((self.to_view(node, key)?, self.to_view(node, value)?)))
                            .collect::<Result<_>>()?,
                    ),
                    other => self.to_view(node, other)?,
                };
                self.visited(node, owner, &value);
                match value {
                    Value::Map(entries) => {
                        self.emit(node, EventType::BeginObject, node.name(), Value::Null);
                        for (key, value) in entries {
                            let key = self.key_name(key)?;
                            self.emit(node, EventType::Value, Some(&key), value);
                        }
                        self.emit(node, EventType::EndObject, node.name(), Value::Null);
                    }
                    scalar => self.emit(node, EventType::Value, node.name(), scalar),
                }
            }
            NodeKind::ArrayOfObjects | NodeKind::ArrayOfReferences => {
                let Some(value) = self.read(node, owner)? else {
                    return Ok(());
                };
                self.visited(node, owner, &value);
                match value {
                    Value::List(items) => {
                        self.emit(node, EventType::BeginArray, node.name(), Value::Null);
                        for item in items {
                            self.scope.push_element(node, None);
                            let result = self
                                .to_view(node, item)
                                .and_then(|item| self.write_element(node, node.element_name(), item));
                            self.scope.pop();
                            result?;
                        }
                        self.emit(node, EventType::EndArray, node.name(), Value::Null);
                    }
                    Value::Null => self.emit(node, EventType::Value, node.name(), Value::Null),
                    other => return Err(Error::mismatch("list", other.type_name()).in_property(&node.label())),
                }
            }
            NodeKind::MapOfObjects | NodeKind::MapOfReferences => {
                let Some(value) = self.read(node, owner)? else {
                    return Ok(());
                };
                self.visited(node, owner, &value);
                match value {
                    Value::Map(entries) => {
                        self.emit(node, EventType::BeginObject, node.name(), Value::Null);
                        for (key, item) in entries {
                            let key = self.to_view(node, key)?;
                            let key = self.key_name(key)?;
                            self.scope.push_element(node, Some(&key));
                            let result = self
                                .to_view(node, item)
                                .and_then(|item| self.write_element(node, Some(&key), item));
                            self.scope.pop();
                            result?;
                        }
                        self.emit(node, EventType::EndObject, node.name(), Value::Null);
                    }
                    Value::Null => self.emit(node, EventType::Value, node.name(), Value::Null),
                    other => return Err(Error::mismatch("map", other.type_name()).in_property(&node.label())),
                }
            }
        }
        Ok(())
    }

    /// Writes the root array of a list template.
    fn write_list(&mut self, root: &Node, items: Vec<Value>) -> Result<()> {
        self.emit(root, EventType::BeginArray, root.name(), Value::Null);
        for item in items {
            self.scope.push_element(root, None);
            let result = self.to_view(root, item).and_then(|item| match root.kind() {
                NodeKind::ArrayOfValues => {
                    self.emit(root, EventType::Value, root.element_name(), item);
                    Ok(())
                }
                _ => self.write_element(root, root.element_name(), item),
            });
            self.scope.pop();
            result?;
        }
        self.emit(root, EventType::EndArray, root.name(), Value::Null);
        Ok(())
    }

    /// Writes one object position: a nested object for a model instance, a
    /// single `VALUE` for null or for a model a converter rendered as a scalar.
    fn write_element(&mut self, node: &Node, name: Option<&str>, value: Value) -> Result<()> {
        match value {
            Value::Model(model) => self.write_object(node, name, &model),
            Value::List(_) | Value::Map(_) => Err(self.not_a_model(node, &value)),
            scalar => {
                self.emit(node, EventType::Value, name, scalar);
                Ok(())
            }
        }
    }

    fn write_object(&mut self, node: &Node, name: Option<&str>, model: &ModelRef) -> Result<()> {
        self.emit(node, EventType::BeginObject, name, Value::Null);
        let variant;
        let children = match node.subtypes() {
            Some(table) => {
                variant = table.for_type(model.model_type())?;
                self.emit(
                    node,
                    EventType::Discriminator,
                    Some(table.discriminator()),
                    Value::String(variant.tag().to_string()),
                );
                variant.children()
            }
            None => node.children(),
        };
        for child in children {
            self.visit(child, model)?;
        }
        self.emit(node, EventType::EndObject, name, Value::Null);
        Ok(())
    }

    /// Reads the node's property and runs the extraction hooks.
    ///
    /// `None` when the accessor cannot read.
    fn read(&self, node: &Node, owner: &ModelRef) -> Result<Option<Value>> {
        let Some(accessor) = node.accessor() else {
            return Ok(None);
        };
        let Some(value) = accessor.get(owner)? else {
            return Ok(None);
        };
        let event = self.property_event(node, owner);
        Ok(Some(self.scope.listeners().did_extract_value(&event, value)))
    }

    fn to_view(&self, node: &Node, value: Value) -> Result<Value> {
        self.scope.converters_for(node).to_view_value(value, &self.scope)
    }

    fn visited(&self, node: &Node, owner: &ModelRef, value: &Value) {
        let event = self.property_event(node, owner);
        self.scope.listeners().property_visited(&event, value);
    }

    fn property_event<'a>(&'a self, node: &'a Node, owner: &'a ModelRef) -> PropertyEvent<'a> {
        PropertyEvent {
            mode: ViewMode::Generate,
            node,
            owner: Some(owner),
            path: self.scope.path(),
        }
    }

    fn key_name(&self, key: Value) -> Result<String> {
        match key {
            Value::Null => Err(Error::NullKey {
                path: self.scope.path().to_string(),
            }),
            Value::String(key) => Ok(key),
            other => Ok(other.to_string()),
        }
    }

    fn not_a_model(&self, node: &Node, value: &Value) -> Error {
        Error::mismatch(
            node.model_type().map_or("model", |ty| ty.name()),
            value.type_name(),
        )
        .in_property(&node.label())
    }

    fn emit(&mut self, node: &Node, kind: EventType, name: Option<&str>, value: Value) {
        self.events.push(Event::new(
            kind,
            name.map(str::to_string),
            node.namespace().map(str::to_string),
            value,
        ));
    }
}
