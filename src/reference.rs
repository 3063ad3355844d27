//! Reference resolution: turning the natural key carried by a reference
//! entity into an existing model instance.
//!
//! Instances created or updated earlier in the same application pass are
//! registered in the per-call [`ReferenceTable`] and take precedence over
//! anything a resolver looks up on its own.

use std::{fmt, rc::Rc};

use crate::{Accessor, Error, ModelRef, ModelType, Result, Value, ViewEntity};

/// Maps reference entities and model instances to natural keys.
pub trait ReferenceResolver {
    fn supports(&self, model_type: &ModelType) -> bool;

    /// Key carried by an incoming reference entity.
    fn entity_key(&self, entity: &ViewEntity<'_>) -> Result<Value>;

    /// Key of an existing model instance.
    fn model_key(&self, model: &ModelRef) -> Result<Value>;

    /// Looks up an instance outside the current pass, such as a repository.
    fn resolve(&self, model_type: &ModelType, key: &Value) -> Result<Option<ModelRef>> {
        let _ = (model_type, key);
        Ok(None)
    }
}

/// Ordered resolver registry; the first resolver that supports a type wins.
#[derive(Clone, Default)]
pub struct ReferenceResolvers(Vec<Rc<dyn ReferenceResolver>>);

impl ReferenceResolvers {
    pub fn append(&mut self, resolver: Rc<dyn ReferenceResolver>) {
        self.0.push(resolver);
    }

    pub fn prepend(&mut self, resolver: Rc<dyn ReferenceResolver>) {
        self.0.insert(0, resolver);
    }

    pub fn find(&self, model_type: &ModelType) -> Option<&Rc<dyn ReferenceResolver>> {
        self.0.iter().find(|resolver| resolver.supports(model_type))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ReferenceResolvers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReferenceResolvers({})", self.0.len())
    }
}

/// Instances known to the current application pass, by type and key.
#[derive(Clone, Debug, Default)]
pub struct ReferenceTable {
    entries: Vec<(ModelType, Value, ModelRef)>,
}

impl ReferenceTable {
    pub(crate) fn register(&mut self, key: Value, model: ModelRef) {
        if self.entries.iter().any(|(_, _, known)| known.ptr_eq(&model)) {
            return;
        }
        self.entries.push((model.model_type().clone(), key, model));
    }

    /// The first registered instance assignable to `model_type` with `key`.
    pub fn lookup(&self, model_type: &ModelType, key: &Value) -> Option<&ModelRef> {
        self.entries
            .iter()
            .find(|(ty, k, _)| k == key && ty.is_assignable_to(model_type))
            .map(|(_, _, model)| model)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolves references by a single key property, such as `id`.
///
/// Instances supplied through [`KeyPropertyResolver::with_known`] act as the
/// repository consulted after the current pass.
///
/// # Example
///
/// ```
/// use std::{rc::Rc, sync::OnceLock};
/// use prospect::{
///     KeyPropertyResolver, Model, ModelRef, ModelType, ReferenceResolver, Value, ViewContext,
/// };
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Player {
///     id: String,
/// }
///
/// impl Model for Player {
///     fn model_type() -> ModelType {
///         static TYPE: OnceLock<ModelType> = OnceLock::new();
///         TYPE.get_or_init(|| {
///             ModelType::of::<Player>()
///                 .property("id", |p: &Player| p.id.clone(), |p: &mut Player, v| p.id = v)
///                 .build()
///         })
///         .clone()
///     }
/// }
///
/// # fn main() -> prospect::Result<()> {
/// let existing = ModelRef::new(Player { id: "p1".into() });
/// let resolver = KeyPropertyResolver::new(Player::model_type(), "id")?
///     .with_known([existing.clone()]);
///
/// let found = resolver.resolve(&Player::model_type(), &Value::from("p1"))?;
/// assert!(found.is_some_and(|player| player.ptr_eq(&existing)));
///
/// let _ctx = ViewContext::new().with_resolver(Rc::new(resolver));
/// # Ok(())
/// # }
/// ```
pub struct KeyPropertyResolver {
    model_type: ModelType,
    property: String,
    known: Vec<ModelRef>,
}

impl KeyPropertyResolver {
    pub fn new(model_type: ModelType, property: &str) -> Result<Self> {
        Accessor::resolve(&model_type, property)?;
        Ok(KeyPropertyResolver {
            model_type,
            property: property.to_string(),
            known: Vec::new(),
        })
    }

    pub fn with_known(mut self, known: impl IntoIterator<Item = ModelRef>) -> Self {
        self.known.extend(known);
        self
    }
}

impl ReferenceResolver for KeyPropertyResolver {
    fn supports(&self, model_type: &ModelType) -> bool {
        model_type.is_assignable_to(&self.model_type)
    }

    fn entity_key(&self, entity: &ViewEntity<'_>) -> Result<Value> {
        entity.get(&self.property).cloned().ok_or_else(|| {
            Error::custom(format!(
                "reference to `{}` carries no `{}`",
                entity.model_type().name(),
                self.property
            ))
        })
    }

    fn model_key(&self, model: &ModelRef) -> Result<Value> {
        let accessor = Accessor::resolve(model.model_type(), &self.property)?;
        Ok(accessor.get(model)?.unwrap_or_default())
    }

    fn resolve(&self, model_type: &ModelType, key: &Value) -> Result<Option<ModelRef>> {
        for model in &self.known {
            if model.model_type().is_assignable_to(model_type) && self.model_key(model)? == *key {
                return Ok(Some(model.clone()));
            }
        }
        Ok(None)
    }
}
