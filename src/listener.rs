use std::{fmt, sync::Arc};

use crate::{ModelRef, Node, Value, ViewMode, ViewPath};

/// Decision returned by [`ViewListener::before_visit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Visit {
    #[default]
    Continue,
    /// Skip this node and its whole subtree. Only honored while generating.
    SkipSubtree,
}

/// A node about to be, or just, visited during generation.
#[derive(Clone, Copy)]
pub struct NodeEvent<'a> {
    pub mode: ViewMode,
    pub node: &'a Node,
    pub model: Option<&'a ModelRef>,
    pub path: &'a ViewPath,
}

/// A property value crossing between model and view, or an entity created or
/// discarded during application.
#[derive(Clone, Copy)]
pub struct PropertyEvent<'a> {
    pub mode: ViewMode,
    pub node: &'a Node,
    /// The model owning the property, when one exists at this point.
    pub owner: Option<&'a ModelRef>,
    pub path: &'a ViewPath,
}

/// Observer hooks fired as the engine traverses a template.
///
/// Every method has a no-op default. Value hooks may substitute the value they
/// are given; substitutions chain through listeners in registration order.
///
/// Generation fires `before_visit`, `did_extract_value`, `property_visited`
/// and `after_visit`. Application fires `will_inject_value`,
/// `property_visited`, `entity_created` and `entity_discarded`.
pub trait ViewListener {
    fn before_visit(&self, event: &NodeEvent<'_>) -> Visit {
        let _ = event;
        Visit::Continue
    }

    fn after_visit(&self, event: &NodeEvent<'_>) {
        let _ = event;
    }

    fn did_extract_value(&self, event: &PropertyEvent<'_>, value: Value) -> Value {
        let _ = event;
        value
    }

    fn will_inject_value(&self, event: &PropertyEvent<'_>, value: Value) -> Value {
        let _ = event;
        value
    }

    fn property_visited(&self, event: &PropertyEvent<'_>, value: &Value) {
        let _ = (event, value);
    }

    fn entity_created(&self, event: &PropertyEvent<'_>, entity: &ModelRef) {
        let _ = (event, entity);
    }

    fn entity_discarded(&self, event: &PropertyEvent<'_>, entity: &ModelRef) {
        let _ = (event, entity);
    }
}

/// Ordered listener list with the dispatch rules applied.
#[derive(Clone, Default)]
pub struct Listeners(Vec<Arc<dyn ViewListener>>);

impl Listeners {
    pub fn append(&mut self, listener: Arc<dyn ViewListener>) {
        self.0.push(listener);
    }

    pub fn prepend(&mut self, listener: Arc<dyn ViewListener>) {
        self.0.insert(0, listener);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Asks each listener in turn; the first veto wins and later listeners are
    /// not consulted.
    pub(crate) fn will_visit(&self, event: &NodeEvent<'_>) -> Visit {
        for listener in &self.0 {
            if listener.before_visit(event) == Visit::SkipSubtree {
                return Visit::SkipSubtree;
            }
        }
        Visit::Continue
    }

    pub(crate) fn visited(&self, event: &NodeEvent<'_>) {
        for listener in &self.0 {
            listener.after_visit(event);
        }
    }

    pub(crate) fn did_extract_value(&self, event: &PropertyEvent<'_>, value: Value) -> Value {
        self.0
            .iter()
            .fold(value, |value, listener| listener.did_extract_value(event, value))
    }

    pub(crate) fn will_inject_value(&self, event: &PropertyEvent<'_>, value: Value) -> Value {
        self.0
            .iter()
            .fold(value, |value, listener| listener.will_inject_value(event, value))
    }

    pub(crate) fn property_visited(&self, event: &PropertyEvent<'_>, value: &Value) {
        for listener in &self.0 {
            listener.property_visited(event, value);
        }
    }

    pub(crate) fn entity_created(&self, event: &PropertyEvent<'_>, entity: &ModelRef) {
        for listener in &self.0 {
            listener.entity_created(event, entity);
        }
    }

    pub(crate) fn entity_discarded(&self, event: &PropertyEvent<'_>, entity: &ModelRef) {
        for listener in &self.0 {
            listener.entity_discarded(event, entity);
        }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listeners({})", self.0.len())
    }
}
