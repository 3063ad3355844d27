use std::fmt;

use crate::{ModelType, Node, Value};

/// The parsed form of one object of an applied view.
///
/// Entities are built from the events before anything touches the model, so
/// a structural error leaves the target untouched. Only fields present in the
/// view are recorded; absent fields leave their properties unchanged.
#[derive(Clone)]
pub struct ViewEntity<'t> {
    model_type: ModelType,
    fields: Vec<EntityField<'t>>,
    spliced: Vec<(&'t Node, ViewEntity<'t>)>,
}

#[derive(Clone)]
pub(crate) struct EntityField<'t> {
    pub(crate) node: &'t Node,
    pub(crate) value: FieldValue<'t>,
}

#[derive(Clone)]
pub(crate) enum FieldValue<'t> {
    /// A converted scalar, list or map of scalars, or a meta value.
    Value(Value),
    /// An object position that was explicitly null.
    Null,
    Entity(ViewEntity<'t>),
    Entities(Vec<ViewEntity<'t>>),
    Keyed(Vec<(Value, ViewEntity<'t>)>),
}

impl<'t> ViewEntity<'t> {
    pub(crate) fn new(model_type: ModelType) -> Self {
        ViewEntity {
            model_type,
            fields: Vec::new(),
            spliced: Vec::new(),
        }
    }

    /// The concrete type this entity describes, after discriminator lookup.
    #[inline]
    pub fn model_type(&self) -> &ModelType {
        &self.model_type
    }

    /// The scalar carried under `name`, looking through spliced fields.
    pub fn get(&self, name: &str) -> Option<&Value> {
        const NULL: &Value = &Value::Null;
        self.fields
            .iter()
            .filter(|field| field.node.name() == Some(name))
            .find_map(|field| match &field.value {
                FieldValue::Value(value) => Some(value),
                FieldValue::Null => Some(NULL),
                _ => None,
            })
            .or_else(|| self.spliced.iter().find_map(|(_, entity)| entity.get(name)))
    }

    /// The nested entity carried under `name`.
    pub fn entity(&self, name: &str) -> Option<&ViewEntity<'t>> {
        self.fields
            .iter()
            .filter(|field| field.node.name() == Some(name))
            .find_map(|field| match &field.value {
                FieldValue::Entity(entity) => Some(entity),
                _ => None,
            })
            .or_else(|| self.spliced.iter().find_map(|(_, entity)| entity.entity(name)))
    }

    /// Number of fields read, spliced ones included.
    pub fn len(&self) -> usize {
        self.fields.len() + self.spliced.iter().map(|(_, entity)| entity.len()).sum::<usize>()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn fields(&self) -> &[EntityField<'t>] {
        &self.fields
    }

    pub(crate) fn splices(&self) -> &[(&'t Node, ViewEntity<'t>)] {
        &self.spliced
    }

    pub(crate) fn push(&mut self, node: &'t Node, value: FieldValue<'t>) {
        self.fields.push(EntityField { node, value });
    }

    /// The entity collecting the fields of `splice`, created on first use.
    pub(crate) fn spliced(&mut self, splice: &'t Node) -> &mut ViewEntity<'t> {
        let index = match self
            .spliced
            .iter()
            .position(|(node, _)| std::ptr::eq(*node, splice))
        {
            Some(index) => index,
            None => {
                let model_type = splice
                    .model_type()
                    .cloned()
                    .unwrap_or_else(|| self.model_type.clone());
                self.spliced.push((splice, ViewEntity::new(model_type)));
                self.spliced.len() - 1
            }
        };
        &mut self.spliced[index].1
    }
}

impl fmt::Debug for ViewEntity<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.model_type.name())?;
        let mut map = f.debug_map();
        for field in &self.fields {
            let key = field.node.name().unwrap_or_default();
            match &field.value {
                FieldValue::Value(value) => map.entry(&key, value),
                FieldValue::Null => map.entry(&key, &Value::Null),
                FieldValue::Entity(entity) => map.entry(&key, entity),
                FieldValue::Entities(entities) => map.entry(&key, entities),
                FieldValue::Keyed(entries) => map.entry(&key, entries),
            };
        }
        for (_, entity) in &self.spliced {
            map.entry(&"..", entity);
        }
        map.finish()
    }
}
