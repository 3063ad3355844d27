use std::{
    collections::HashMap,
    ops::Deref,
    sync::{Arc, PoisonError, RwLock},
};

use tracing::trace;

use crate::{ModelType, Node, Result, TypeKey};

/// Copies of one node re-bound to runtime subtypes of its accessor's owner.
#[derive(Default)]
pub(crate) struct Rebound(RwLock<HashMap<TypeKey, Arc<Node>>>);

/// A node ready to read or write one instance: the node as declared, or its
/// copy re-bound to the instance's type.
#[derive(Clone)]
pub(crate) enum BoundNode<'a> {
    Declared(&'a Node),
    Rebound(Arc<Node>),
}

impl Deref for BoundNode<'_> {
    type Target = Node;

    #[inline]
    fn deref(&self) -> &Node {
        match self {
            BoundNode::Declared(node) => node,
            BoundNode::Rebound(node) => node,
        }
    }
}

impl Node {
    /// This node with its accessor bound to `owner`, the runtime type of the
    /// instance it is about to read or write.
    ///
    /// Accessors are bound to the declared type when the template is built.
    /// For an instance of a subtype the subtype's property of the same name is
    /// used instead, resolved once per type and cached on the node.
    pub(crate) fn bound_to(&self, owner: &ModelType) -> Result<BoundNode<'_>> {
        let Some(accessor) = &self.accessor else {
            return Ok(BoundNode::Declared(self));
        };
        if accessor.owner() == owner || !owner.is_assignable_to(accessor.owner()) {
            return Ok(BoundNode::Declared(self));
        }
        {
            let cache = self.rebound.0.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(node) = cache.get(&owner.key()) {
                return Ok(BoundNode::Rebound(Arc::clone(node)));
            }
        }
        let node = Arc::new(self.for_subtype(owner)?);
        trace!(
            node = %self.label(),
            declared = accessor.owner().name(),
            runtime = owner.name(),
            "re-bound accessor"
        );
        let mut cache = self.rebound.0.write().unwrap_or_else(PoisonError::into_inner);
        Ok(BoundNode::Rebound(Arc::clone(
            cache.entry(owner.key()).or_insert(node),
        )))
    }
}
