use std::sync::Arc;

use tracing::trace;

use super::{Applier, FieldValue, PendingReference, ViewEntity};
use crate::{
    AccessorListManager, AccessorMapManager, CollectionOrdering, Error, ModelRef, Node, NodeKind,
    PropertyEvent, Result, ToManyManager, ToManyMappedManager, Value, ViewMode, node::BoundNode,
};

// ============ Entities ============

impl<'a> Applier<'a, '_> {
    /// Writes every field of `entity` into `target`, then registers `target`
    /// for reference resolution.
    ///
    /// Field nodes are re-bound to the runtime type of `target`, which may be
    /// a subtype of the type the entity was parsed as.
    pub(super) fn inject_entity(&mut self, entity: &ViewEntity<'a>, target: &ModelRef) -> Result<()> {
        for field in entity.fields() {
            let node = field.node.bound_to(target.model_type())?;
            self.scope.push(&node);
            let result = self.inject_field(node.clone(), &field.value, target);
            self.scope.pop();
            result?;
        }
        for (splice, spliced) in entity.splices() {
            let splice = splice.bound_to(target.model_type())?;
            self.scope.push(&splice);
            let result = self.inject_splice(&splice, spliced, target);
            self.scope.pop();
            result?;
        }
        self.remember(target)
    }

    fn inject_field(&mut self, node: BoundNode<'a>, value: &FieldValue<'a>, target: &ModelRef) -> Result<()> {
        match (node.kind(), value) {
            (NodeKind::Meta(handler), FieldValue::Value(value)) => {
                handler.consume(&node, target, value.clone(), &self.scope)
            }
            (NodeKind::Value | NodeKind::ArrayOfValues | NodeKind::MapOfValues, _) => {
                let value = match value {
                    FieldValue::Value(value) => value.clone(),
                    _ => Value::Null,
                };
                self.write(&node, target, value)
            }
            (NodeKind::Envelope, FieldValue::Entity(inner)) => self.inject_entity(inner, target),
            (NodeKind::Object | NodeKind::Subtype, _) => self.inject_to_one(&node, value, target),
            (NodeKind::ArrayOfObjects, _) => self.reconcile_list(&node, value, target),
            (NodeKind::MapOfObjects, _) => self.reconcile_map(&node, value, target),
            (NodeKind::Reference | NodeKind::ArrayOfReferences | NodeKind::MapOfReferences, _) => {
                if node.accessor().is_some_and(|accessor| accessor.can_write()) {
                    self.pending.push(PendingReference {
                        node: node.clone(),
                        owner: target.clone(),
                        value: value.clone(),
                        path: self.scope.path().clone(),
                    });
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn write(&self, node: &Node, target: &ModelRef, value: Value) -> Result<()> {
        match node.accessor() {
            Some(accessor) => accessor.set(target, value),
            None => Ok(()),
        }
    }

    fn inject_splice(&mut self, splice: &Node, entity: &ViewEntity<'a>, target: &ModelRef) -> Result<()> {
        let Some(accessor) = splice.accessor() else {
            return self.inject_entity(entity, target);
        };
        match accessor.get(target)? {
            Some(Value::Model(existing)) => self.inject_entity(entity, &existing),
            _ if accessor.can_write() => {
                let created = entity.model_type().new_instance()?;
                self.inject_entity(entity, &created)?;
                accessor.set(target, Value::Model(created.clone()))?;
                self.notify_created(splice, Some(target), &created);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// A to-one object: updated in place while the current instance still
    /// fits the entity, replaced otherwise.
    fn inject_to_one(&mut self, node: &Node, value: &FieldValue<'a>, target: &ModelRef) -> Result<()> {
        let Some(accessor) = node.accessor().filter(|accessor| accessor.can_write()) else {
            trace!(path = %self.scope.path(), "object not writable, skipped");
            return Ok(());
        };
        let current = match accessor.get(target)? {
            Some(Value::Model(model)) => Some(model),
            _ => None,
        };
        match value {
            FieldValue::Null => {
                accessor.set(target, Value::Null)?;
                if let Some(old) = current {
                    self.notify_discarded(node, Some(target), &old);
                }
            }
            FieldValue::Entity(entity) => match current {
                Some(existing) if fits(node, &existing, entity) => {
                    self.inject_entity(entity, &existing)?;
                }
                previous => {
                    let created = entity.model_type().new_instance()?;
                    self.inject_entity(entity, &created)?;
                    accessor.set(target, Value::Model(created.clone()))?;
                    if let Some(old) = previous {
                        self.notify_discarded(node, Some(target), &old);
                    }
                    self.notify_created(node, Some(target), &created);
                }
            },
            _ => {}
        }
        Ok(())
    }
}

// ============ Owned collections ============

impl<'a> Applier<'a, '_> {
    fn list_manager(&self, node: &Node, owner: &ModelRef) -> Option<Arc<dyn ToManyManager>> {
        let accessor = node.accessor()?;
        if let Some(manager) = node.manager() {
            return Some(Arc::clone(manager));
        }
        let managers = self.scope.context().managers();
        if let Some(manager) = node
            .model_type()
            .and_then(|element| managers.find(owner.model_type(), element))
        {
            return Some(Arc::clone(manager));
        }
        Some(Arc::new(AccessorListManager::new(accessor.clone(), node.ordering())))
    }

    fn map_manager(&self, node: &Node, owner: &ModelRef) -> Option<Arc<dyn ToManyMappedManager>> {
        let accessor = node.accessor()?;
        if let Some(manager) = node.map_manager() {
            return Some(Arc::clone(manager));
        }
        let managers = self.scope.context().managers();
        if let Some(manager) = node
            .model_type()
            .and_then(|element| managers.find_mapped(owner.model_type(), element))
        {
            return Some(Arc::clone(manager));
        }
        Some(Arc::new(AccessorMapManager::new(accessor.clone())))
    }

    /// Reconciles a sequence of owned objects with the incoming entities.
    ///
    /// Each entity is matched to an existing element by model equality against
    /// a candidate built from the entity's scalar fields; ordered collections
    /// try the element at the same position first. Matches are updated in
    /// place, the rest are created, and elements nothing matched are removed.
    fn reconcile_list(&mut self, node: &Node, value: &FieldValue<'a>, owner: &ModelRef) -> Result<()> {
        if !node.accessor().is_some_and(|accessor| accessor.can_write()) {
            return Ok(());
        }
        let Some(manager) = self.list_manager(node, owner) else {
            return Ok(());
        };
        let incoming: &[ViewEntity<'a>] = match value {
            FieldValue::Entities(entities) => entities,
            FieldValue::Null => &[],
            _ => return Ok(()),
        };
        let ordered = manager.ordering() == CollectionOrdering::Ordered;
        let existing = manager.elements(owner)?;
        let mut claimed = vec![false; existing.len()];
        let mut result = Vec::with_capacity(incoming.len());

        for (index, entity) in incoming.iter().enumerate() {
            self.scope.push_element(node, None);
            let element = self
                .reconcile_element(Some((manager.as_ref(), owner)), &existing, &mut claimed, (index, entity), ordered)
                .and_then(|(element, created)| {
                    if created {
                        manager.add(owner, element.clone())?;
                        self.notify_created(node, Some(owner), &element);
                    }
                    Ok(element)
                });
            self.scope.pop();
            result.push(element?);
        }

        for (element, _) in existing.iter().zip(&claimed).filter(|(_, claimed)| !**claimed) {
            manager.remove(owner, element)?;
            self.notify_discarded(node, Some(owner), element);
        }
        if ordered {
            manager.reorder(owner, &result)?;
        }
        Ok(())
    }

    /// Reconciles the elements of a list template like an owned collection
    /// with no owner, and returns the resulting list in view order.
    pub(super) fn reconcile_root(
        &mut self,
        root: &Node,
        incoming: &[ViewEntity<'a>],
        existing: &[ModelRef],
    ) -> Result<Vec<ModelRef>> {
        let ordered = root.ordering() == CollectionOrdering::Ordered;
        let mut claimed = vec![false; existing.len()];
        let mut result = Vec::with_capacity(incoming.len());

        for (index, entity) in incoming.iter().enumerate() {
            self.scope.push_element(root, None);
            let element = self
                .reconcile_element(None, existing, &mut claimed, (index, entity), ordered)
                .map(|(element, created)| {
                    if created {
                        self.notify_created(root, None, &element);
                    }
                    element
                });
            self.scope.pop();
            result.push(element?);
        }

        for (element, _) in existing.iter().zip(&claimed).filter(|(_, claimed)| !**claimed) {
            self.notify_discarded(root, None, element);
        }
        Ok(result)
    }

    /// Finds the existing element an entity describes and updates it, or
    /// builds a new one. The flag is set for a new element, which the caller
    /// adds to its collection.
    fn reconcile_element(
        &mut self,
        managed: Option<(&dyn ToManyManager, &ModelRef)>,
        existing: &[ModelRef],
        claimed: &mut [bool],
        (index, entity): (usize, &ViewEntity<'a>),
        ordered: bool,
    ) -> Result<(ModelRef, bool)> {
        let candidate = self.candidate(entity)?;

        let mut position = None;
        if ordered && index < existing.len() && !claimed[index] && existing[index] == candidate {
            position = Some(index);
        }
        if position.is_none() {
            match managed {
                Some((manager, owner)) => {
                    if let Some(found) = manager.find(owner, &candidate)? {
                        position = first_unclaimed(existing, claimed, |element| element.ptr_eq(&found))
                            .or_else(|| first_unclaimed(existing, claimed, |element| *element == candidate));
                    }
                }
                None => position = first_unclaimed(existing, claimed, |element| *element == candidate),
            }
        }

        match position {
            Some(position) => {
                trace!(path = %self.scope.path(), index, position, "updating matched element");
                claimed[position] = true;
                let element = existing[position].clone();
                self.inject_entity(entity, &element)?;
                Ok((element, false))
            }
            None => {
                trace!(path = %self.scope.path(), index, "adding new element");
                self.inject_entity(entity, &candidate)?;
                Ok((candidate, true))
            }
        }
    }

    /// A fresh instance holding only the entity's scalar fields, used to
    /// look for an equivalent existing element.
    fn candidate(&self, entity: &ViewEntity<'a>) -> Result<ModelRef> {
        let candidate = entity.model_type().new_instance()?;
        self.inject_scalars(entity, &candidate)?;
        Ok(candidate)
    }

    fn inject_scalars(&self, entity: &ViewEntity<'a>, target: &ModelRef) -> Result<()> {
        for field in entity.fields() {
            if let (true, FieldValue::Value(value)) = (field.node.kind().holds_values(), &field.value) {
                let node = field.node.bound_to(target.model_type())?;
                self.write(&node, target, value.clone())?;
            }
        }
        for (splice, spliced) in entity.splices() {
            if splice.accessor().is_none() {
                self.inject_scalars(spliced, target)?;
            }
        }
        Ok(())
    }

    /// Reconciles a keyed map of owned objects: entries under a known key
    /// are updated in place while they still fit the entity.
    fn reconcile_map(&mut self, node: &Node, value: &FieldValue<'a>, owner: &ModelRef) -> Result<()> {
        if !node.accessor().is_some_and(|accessor| accessor.can_write()) {
            return Ok(());
        }
        let Some(manager) = self.map_manager(node, owner) else {
            return Ok(());
        };
        let incoming: &[(Value, ViewEntity<'a>)] = match value {
            FieldValue::Keyed(entries) => entries,
            FieldValue::Null => &[],
            _ => return Ok(()),
        };
        let existing = manager.entries(owner)?;

        for (key, entity) in incoming {
            self.scope.push_element(node, Some(&key.to_string()));
            let result = self.reconcile_entry(node, manager.as_ref(), owner, &existing, key, entity);
            self.scope.pop();
            result?;
        }

        for (key, element) in &existing {
            if !incoming.iter().any(|(k, _)| k == key) {
                manager.remove(owner, key)?;
                self.notify_discarded(node, Some(owner), element);
            }
        }
        Ok(())
    }

    fn reconcile_entry(
        &mut self,
        node: &Node,
        manager: &dyn ToManyMappedManager,
        owner: &ModelRef,
        existing: &[(Value, ModelRef)],
        key: &Value,
        entity: &ViewEntity<'a>,
    ) -> Result<()> {
        let previous = existing
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, element)| element);
        match previous {
            Some(current) if fits(node, current, entity) => self.inject_entity(entity, current),
            previous => {
                let created = entity.model_type().new_instance()?;
                self.inject_entity(entity, &created)?;
                manager.put(owner, key.clone(), created.clone())?;
                if let Some(old) = previous {
                    self.notify_discarded(node, Some(owner), old);
                }
                self.notify_created(node, Some(owner), &created);
                Ok(())
            }
        }
    }
}

/// Whether `existing` can take the fields of `entity` in place.
///
/// A polymorphic node keeps an instance whose variant carries the entity's
/// tag, so an undeclared subtype survives a round trip through its closest
/// declared variant. Any other node keeps instances of the mapped type and
/// its subtypes.
fn fits(node: &Node, existing: &ModelRef, entity: &ViewEntity<'_>) -> bool {
    match node.subtypes() {
        Some(table) => table
            .for_type(existing.model_type())
            .ok()
            .and_then(|variant| table.by_tag(variant.tag()))
            .is_some_and(|variant| variant.model_type() == entity.model_type()),
        None => existing.model_type().is_assignable_to(entity.model_type()),
    }
}

/// First element not yet matched to an incoming entity, in iteration order.
fn first_unclaimed<F>(existing: &[ModelRef], claimed: &[bool], matches: F) -> Option<usize>
where
    F: Fn(&ModelRef) -> bool,
{
    (0..existing.len()).find(|&i| !claimed[i] && matches(&existing[i]))
}

// ============ References ============

impl<'a> Applier<'a, '_> {
    pub(super) fn resolve_references(&mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.pending);
        for reference in pending {
            let saved = self.scope.replace_path(reference.path);
            let result = self.resolve_reference(&reference.node, &reference.owner, &reference.value);
            self.scope.replace_path(saved);
            result?;
        }
        Ok(())
    }

    fn resolve_reference(&mut self, node: &Node, owner: &ModelRef, value: &FieldValue<'a>) -> Result<()> {
        let Some(accessor) = node.accessor() else {
            return Ok(());
        };
        match node.kind() {
            NodeKind::Reference => {
                let resolved = match value {
                    FieldValue::Entity(entity) => Value::Model(self.lookup(entity)?),
                    _ => Value::Null,
                };
                accessor.set(owner, resolved)
            }
            NodeKind::ArrayOfReferences => {
                let Some(manager) = self.list_manager(node, owner) else {
                    return Ok(());
                };
                let resolved = match value {
                    FieldValue::Entities(entities) => entities
                        .iter()
                        .map(|entity| self.lookup(entity))
                        .collect::<Result<Vec<_>>>()?,
                    _ => Vec::new(),
                };
                let current = manager.elements(owner)?;
                for element in &current {
                    if !resolved.iter().any(|r| r.ptr_eq(element)) {
                        manager.remove(owner, element)?;
                    }
                }
                for element in &resolved {
                    if !current.iter().any(|c| c.ptr_eq(element)) {
                        manager.add(owner, element.clone())?;
                    }
                }
                if manager.ordering() == CollectionOrdering::Ordered {
                    manager.reorder(owner, &resolved)?;
                }
                Ok(())
            }
            NodeKind::MapOfReferences => {
                let Some(manager) = self.map_manager(node, owner) else {
                    return Ok(());
                };
                let resolved = match value {
                    FieldValue::Keyed(entries) => entries
                        .iter()
                        .map(|(key, entity)| Ok((key.clone(), self.lookup(entity)?)))
                        .collect::<Result<Vec<_>>>()?,
                    _ => Vec::new(),
                };
                let current = manager.entries(owner)?;
                for (key, _) in &current {
                    if !resolved.iter().any(|(k, _)| k == key) {
                        manager.remove(owner, key)?;
                    }
                }
                for (key, element) in resolved {
                    let unchanged = current
                        .iter()
                        .any(|(k, existing)| *k == key && existing.ptr_eq(&element));
                    if !unchanged {
                        manager.put(owner, key, element)?;
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// The instance a reference entity names: first among the instances of
    /// this pass, then through the resolver.
    fn lookup(&self, entity: &ViewEntity<'a>) -> Result<ModelRef> {
        let model_type = entity.model_type();
        let unresolved = || Error::UnresolvedReference {
            model: model_type.name().to_string(),
            path: self.scope.path().to_string(),
        };
        let Some(resolver) = self.scope.context().resolvers().find(model_type) else {
            return Err(unresolved());
        };
        let key = resolver.entity_key(entity)?;
        if key.is_null() {
            return Err(unresolved());
        }
        if let Some(known) = self.scope.references().lookup(model_type, &key) {
            return Ok(known.clone());
        }
        resolver.resolve(model_type, &key)?.ok_or_else(unresolved)
    }

    fn remember(&mut self, target: &ModelRef) -> Result<()> {
        let Some(resolver) = self.scope.context().resolvers().find(target.model_type()) else {
            return Ok(());
        };
        let key = resolver.model_key(target)?;
        if !key.is_null() {
            self.scope.references_mut().register(key, target.clone());
        }
        Ok(())
    }
}

// ============ Notifications ============

impl Applier<'_, '_> {
    fn notify_created(&mut self, node: &Node, owner: Option<&ModelRef>, entity: &ModelRef) {
        self.created += 1;
        let event = PropertyEvent {
            mode: ViewMode::Apply,
            node,
            owner,
            path: self.scope.path(),
        };
        self.scope.listeners().entity_created(&event, entity);
    }

    fn notify_discarded(&mut self, node: &Node, owner: Option<&ModelRef>, entity: &ModelRef) {
        self.discarded += 1;
        let event = PropertyEvent {
            mode: ViewMode::Apply,
            node,
            owner,
            path: self.scope.path(),
        };
        self.scope.listeners().entity_discarded(&event, entity);
    }
}
