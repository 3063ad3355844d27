//! View to model.
//!
//! Application runs in two phases. The parse phase reads the events against
//! the template into a tree of [`ViewEntity`] records, converting values and
//! firing the injection hooks; nothing touches the model yet. The inject
//! phase then writes the entities into the target, reconciling collections
//! through association managers. References are collected during injection
//! and resolved last, so a reference may name an instance that appears later
//! in the same view.

use std::fmt;

use tracing::debug;

use crate::{
    Error, Event, EventType, ModelRef, Node, NodeKind, Result, ScopedViewContext, Value,
    ViewContext, ViewMode, ViewPath, ViewTemplate, event::match_blocks, node::BoundNode,
};

mod entity;
mod inject;
mod parse;

pub use entity::*;

use entity::FieldValue;

/// Applies one view to models.
///
/// Obtained from [`ViewTemplate::create_applicator`]. Each call to
/// [`create`](Self::create) or [`update`](Self::update) is an independent
/// pass with its own reference table.
pub struct ViewApplicator<'t> {
    template: &'t ViewTemplate,
    events: Vec<Event>,
    context: ViewContext,
}

impl<'t> ViewApplicator<'t> {
    pub(crate) fn new(template: &'t ViewTemplate, events: Vec<Event>, context: ViewContext) -> Self {
        ViewApplicator {
            template,
            events,
            context,
        }
    }

    /// The events this applicator reads.
    #[inline]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Builds a new model graph from the view.
    pub fn create(&self) -> Result<ModelRef> {
        let root = self.object_root("create_list")?;
        let mut applier = Applier::new(&self.events, &self.context);
        let entity = applier.parse_root(root)?;
        let target = entity.model_type().new_instance()?;
        applier.apply_root(root, &entity, &target)?;
        Ok(target)
    }

    /// Writes the view into an existing model graph.
    ///
    /// Properties absent from the view are left unchanged. On failure the
    /// target may be partially updated.
    pub fn update(&self, target: &ModelRef) -> Result<()> {
        let root = self.object_root("update_list")?;
        let mut applier = Applier::new(&self.events, &self.context);
        let entity = applier.parse_root(root)?;
        if !target.model_type().is_assignable_to(entity.model_type()) {
            return Err(Error::mismatch(entity.model_type(), target.model_type()));
        }
        applier.apply_root(root, &entity, target)
    }

    /// Builds the list an array-rooted view describes: new instances for an
    /// array of objects, converted scalars for an array of values.
    pub fn create_list(&self) -> Result<Vec<Value>> {
        let root = self.list_root("create")?;
        let mut applier = Applier::new(&self.events, &self.context);
        match applier.parse_root_list(root)? {
            FieldValue::Value(Value::List(items)) => Ok(items),
            FieldValue::Entities(entities) => {
                let created = applier.apply_root_list(root, &entities, &[])?;
                Ok(created.into_iter().map(Value::Model).collect())
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Reconciles `target` with an array-of-objects view the way an owned
    /// collection is reconciled: equivalent elements are updated in place,
    /// the others are created, and elements nothing matched are dropped.
    ///
    /// `target` is replaced only when the whole pass succeeds, though matched
    /// elements may already have been updated on failure.
    pub fn update_list(&self, target: &mut Vec<ModelRef>) -> Result<()> {
        let root = self.list_root("update")?;
        if !matches!(root.kind(), NodeKind::ArrayOfObjects) {
            return Err(Error::InvalidTemplate(
                "an array of values has no instances to update; use `create_list`".into(),
            ));
        }
        let mut applier = Applier::new(&self.events, &self.context);
        let entities = match applier.parse_root_list(root)? {
            FieldValue::Entities(entities) => entities,
            _ => Vec::new(),
        };
        *target = applier.apply_root_list(root, &entities, target)?;
        Ok(())
    }

    fn object_root(&self, use_instead: &str) -> Result<&'t Node> {
        if self.template.is_list() {
            return Err(self.template.wrong_root(use_instead));
        }
        Ok(self.template.root())
    }

    fn list_root(&self, use_instead: &str) -> Result<&'t Node> {
        if !self.template.is_list() {
            return Err(self.template.wrong_root(use_instead));
        }
        Ok(self.template.root())
    }
}

impl fmt::Debug for ViewApplicator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewApplicator")
            .field("root", &self.template.root().label())
            .field("events", &self.events.len())
            .finish()
    }
}

/// A reference field whose resolution waits for the end of the pass.
struct PendingReference<'a> {
    node: BoundNode<'a>,
    owner: ModelRef,
    value: FieldValue<'a>,
    path: ViewPath,
}

/// State of one application pass.
struct Applier<'a, 'c> {
    events: &'a [Event],
    pos: usize,
    scope: ScopedViewContext<'c>,
    pending: Vec<PendingReference<'a>>,
    created: usize,
    discarded: usize,
}

impl<'a, 'c> Applier<'a, 'c> {
    fn new(events: &'a [Event], context: &'c ViewContext) -> Self {
        Applier {
            events,
            pos: 0,
            scope: ScopedViewContext::new(context, ViewMode::Apply),
            pending: Vec::new(),
            created: 0,
            discarded: 0,
        }
    }

    fn apply_root(&mut self, root: &'a Node, entity: &ViewEntity<'a>, target: &ModelRef) -> Result<()> {
        self.scope.push(root);
        let result = self.inject_entity(entity, target);
        self.scope.pop();
        result?;
        self.finish(root)
    }

    fn apply_root_list(
        &mut self,
        root: &'a Node,
        entities: &[ViewEntity<'a>],
        existing: &[ModelRef],
    ) -> Result<Vec<ModelRef>> {
        self.scope.push(root);
        let result = self.reconcile_root(root, entities, existing);
        self.scope.pop();
        let elements = result?;
        self.finish(root)?;
        Ok(elements)
    }

    /// Resolves the references collected during injection.
    fn finish(&mut self, root: &Node) -> Result<()> {
        let references = self.pending.len();
        self.resolve_references()?;
        debug!(
            root = %root.label(),
            created = self.created,
            discarded = self.discarded,
            references,
            "applied view"
        );
        Ok(())
    }
}

/// The events of the object stored under `data_key` in the root object.
pub(crate) fn extract_data(events: &[Event], data_key: &str) -> Result<Vec<Event>> {
    let ends = match_blocks(events)?;
    let not_found = || Error::DataKeyNotFound(data_key.to_string());
    let root_end = match events.first() {
        Some(first) if first.kind() == EventType::BeginObject => ends[0],
        _ => return Err(not_found()),
    };
    let mut index = 1;
    while index < root_end {
        let event = &events[index];
        if event.kind() == EventType::BeginObject && event.name() == Some(data_key) {
            return Ok(events[index..=ends[index]].to_vec());
        }
        index = ends[index] + 1;
    }
    Err(not_found())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;

    #[test]
    fn test_extract_data_finds_direct_child() {
        let events = vec![
            Event::begin_object(None),
            Event::begin_object(Some("meta")),
            Event::begin_object(Some("data")),
            Event::end_object(Some("data")),
            Event::end_object(Some("meta")),
            Event::begin_object(Some("data")),
            Event::value(Some("name"), "Ann"),
            Event::end_object(Some("data")),
            Event::end_object(None),
        ];
        let data = extract_data(&events, "data").unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(data[1].value_ref(), &Value::from("Ann"));
    }

    #[test]
    fn test_extract_data_missing_key() {
        let events = vec![
            Event::begin_object(None),
            Event::value(Some("data"), 1),
            Event::end_object(None),
        ];
        assert!(matches!(
            extract_data(&events, "data"),
            Err(Error::DataKeyNotFound(key)) if key == "data"
        ));
    }
}
