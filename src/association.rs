//! Association managers own membership changes of multi-valued attributes.
//!
//! The engine never edits a collection attribute directly while reconciling;
//! it asks a [`ToManyManager`] (sequences) or [`ToManyMappedManager`] (keyed
//! maps) to enumerate, find, add, remove and reorder elements. When neither a
//! node nor the context supplies one, an accessor-backed manager is used.

use std::{fmt, sync::Arc};

use crate::{Accessor, Error, ModelRef, ModelType, Result, Value};

/// How reconciliation matches incoming elements to existing ones.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CollectionOrdering {
    /// Incoming element `i` is matched against existing element `i` first, and
    /// the final order follows the view.
    #[default]
    Ordered,
    /// Elements are matched by equivalence regardless of position.
    Unordered,
}

/// Manages the elements of a sequence-valued association.
pub trait ToManyManager: Send + Sync {
    /// Whether this manager handles `owner`'s collection of `element`s.
    fn supports(&self, owner: &ModelType, element: &ModelType) -> bool;

    fn ordering(&self) -> CollectionOrdering {
        CollectionOrdering::Unordered
    }

    /// Snapshot of the current elements in iteration order.
    fn elements(&self, owner: &ModelRef) -> Result<Vec<ModelRef>>;

    /// First existing element equivalent to `candidate` under model-defined
    /// equality.
    fn find(&self, owner: &ModelRef, candidate: &ModelRef) -> Result<Option<ModelRef>> {
        Ok(self
            .elements(owner)?
            .into_iter()
            .find(|element| element == candidate))
    }

    fn add(&self, owner: &ModelRef, element: ModelRef) -> Result<()>;

    fn remove(&self, owner: &ModelRef, element: &ModelRef) -> Result<()>;

    /// Puts the elements in the given order. Unordered managers ignore it.
    fn reorder(&self, owner: &ModelRef, elements: &[ModelRef]) -> Result<()> {
        let _ = (owner, elements);
        Ok(())
    }
}

/// Manages the entries of a keyed association.
pub trait ToManyMappedManager: Send + Sync {
    fn supports(&self, owner: &ModelType, element: &ModelType) -> bool;

    fn entries(&self, owner: &ModelRef) -> Result<Vec<(Value, ModelRef)>>;

    fn get(&self, owner: &ModelRef, key: &Value) -> Result<Option<ModelRef>> {
        Ok(self
            .entries(owner)?
            .into_iter()
            .find_map(|(k, element)| (k == *key).then_some(element)))
    }

    fn put(&self, owner: &ModelRef, key: Value, element: ModelRef) -> Result<()>;

    fn remove(&self, owner: &ModelRef, key: &Value) -> Result<()>;
}

/// Ordered registries of managers; the first one that supports a pair wins.
#[derive(Clone, Default)]
pub struct CollectionManagers {
    sequences: Vec<Arc<dyn ToManyManager>>,
    maps: Vec<Arc<dyn ToManyMappedManager>>,
}

impl CollectionManagers {
    pub fn append(&mut self, manager: Arc<dyn ToManyManager>) {
        self.sequences.push(manager);
    }

    pub fn prepend(&mut self, manager: Arc<dyn ToManyManager>) {
        self.sequences.insert(0, manager);
    }

    pub fn append_mapped(&mut self, manager: Arc<dyn ToManyMappedManager>) {
        self.maps.push(manager);
    }

    pub fn prepend_mapped(&mut self, manager: Arc<dyn ToManyMappedManager>) {
        self.maps.insert(0, manager);
    }

    pub fn find(&self, owner: &ModelType, element: &ModelType) -> Option<&Arc<dyn ToManyManager>> {
        self.sequences.iter().find(|m| m.supports(owner, element))
    }

    pub fn find_mapped(
        &self,
        owner: &ModelType,
        element: &ModelType,
    ) -> Option<&Arc<dyn ToManyMappedManager>> {
        self.maps.iter().find(|m| m.supports(owner, element))
    }
}

impl fmt::Debug for CollectionManagers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionManagers")
            .field("sequences", &self.sequences.len())
            .field("maps", &self.maps.len())
            .finish()
    }
}

// ============ Accessor-backed defaults ============

/// Manages a list attribute by reading it, editing the copy and writing it
/// back through the accessor.
pub struct AccessorListManager {
    accessor: Accessor,
    ordering: CollectionOrdering,
}

impl AccessorListManager {
    pub fn new(accessor: Accessor, ordering: CollectionOrdering) -> Self {
        AccessorListManager { accessor, ordering }
    }

    fn items(&self, owner: &ModelRef) -> Result<Vec<Value>> {
        Ok(self.accessor.get_all(owner)?.unwrap_or_default())
    }
}

impl ToManyManager for AccessorListManager {
    fn supports(&self, _owner: &ModelType, _element: &ModelType) -> bool {
        true
    }

    fn ordering(&self) -> CollectionOrdering {
        self.ordering
    }

    fn elements(&self, owner: &ModelRef) -> Result<Vec<ModelRef>> {
        self.items(owner)?
            .into_iter()
            .filter(|item| !item.is_null())
            .map(|item| match item {
                Value::Model(model) => Ok(model),
                other => Err(Error::mismatch("model", other.type_name()).in_property(self.accessor.name())),
            })
            .collect()
    }

    fn add(&self, owner: &ModelRef, element: ModelRef) -> Result<()> {
        let mut items = self.items(owner)?;
        items.push(Value::Model(element));
        self.accessor.set(owner, Value::List(items))
    }

    fn remove(&self, owner: &ModelRef, element: &ModelRef) -> Result<()> {
        let mut items = self.items(owner)?;
        items.retain(|item| !matches!(item, Value::Model(model) if model.ptr_eq(element)));
        self.accessor.set(owner, Value::List(items))
    }

    fn reorder(&self, owner: &ModelRef, elements: &[ModelRef]) -> Result<()> {
        if self.ordering == CollectionOrdering::Unordered {
            return Ok(());
        }
        let items = elements.iter().cloned().map(Value::Model).collect();
        self.accessor.set(owner, Value::List(items))
    }
}

/// Manages a map attribute through its accessor.
pub struct AccessorMapManager {
    accessor: Accessor,
}

impl AccessorMapManager {
    pub fn new(accessor: Accessor) -> Self {
        AccessorMapManager { accessor }
    }

    fn raw(&self, owner: &ModelRef) -> Result<Vec<(Value, Value)>> {
        match self.accessor.get(owner)? {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Map(entries)) => Ok(entries),
            Some(other) => Err(Error::mismatch("map", other.type_name()).in_property(self.accessor.name())),
        }
    }
}

impl ToManyMappedManager for AccessorMapManager {
    fn supports(&self, _owner: &ModelType, _element: &ModelType) -> bool {
        true
    }

    fn entries(&self, owner: &ModelRef) -> Result<Vec<(Value, ModelRef)>> {
        Ok(self
            .raw(owner)?
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::Model(model) => Some((key, model)),
                _ => None,
            })
            .collect())
    }

    fn put(&self, owner: &ModelRef, key: Value, element: ModelRef) -> Result<()> {
        let mut entries = self.raw(owner)?;
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = Value::Model(element),
            None => entries.push((key, Value::Model(element))),
        }
        self.accessor.set(owner, Value::Map(entries))
    }

    fn remove(&self, owner: &ModelRef, key: &Value) -> Result<()> {
        let mut entries = self.raw(owner)?;
        entries.retain(|(k, _)| k != key);
        self.accessor.set(owner, Value::Map(entries))
    }
}
