//! Runtime model descriptors and shared model handles.
//!
//! Rust has no runtime reflection, so each model type publishes a
//! [`ModelType`]: its identity, optional parent, a factory, an equality
//! function and a table of named [`Property`] entries. Instances travel
//! through the engine as [`ModelRef`], a shared mutable handle that can be
//! downcast back to the concrete struct.
//!
//! # Example
//!
//! ```
//! use std::sync::OnceLock;
//! use prospect::{Model, ModelRef, ModelType};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Tag {
//!     label: String,
//! }
//!
//! impl Model for Tag {
//!     fn model_type() -> ModelType {
//!         static TYPE: OnceLock<ModelType> = OnceLock::new();
//!         TYPE.get_or_init(|| {
//!             ModelType::of::<Tag>()
//!                 .property("label", |t: &Tag| t.label.clone(), |t: &mut Tag, v| t.label = v)
//!                 .build()
//!         })
//!         .clone()
//!     }
//! }
//!
//! let tag = ModelRef::new(Tag { label: "urgent".into() });
//! assert_eq!(tag.model_type().name(), "Tag");
//! assert_eq!(tag.borrow::<Tag>().unwrap().label, "urgent");
//! ```

use std::{
    any::{Any, TypeId},
    cell::{Ref, RefCell, RefMut},
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
    rc::Rc,
    sync::Arc,
};

use crate::{AccessModes, Error, FromValue, IntoValue, Result, Value, ValueKind};

/// A type that can be mapped by a template.
///
/// Implementations usually cache the descriptor in a `OnceLock` so that it is
/// built once per process.
pub trait Model: Any {
    fn model_type() -> ModelType;
}

/// Identity of a model type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeKey {
    /// A concrete Rust type.
    Rust(TypeId),
    /// An abstract type known only by name.
    Named(&'static str),
}

/// Lightweight identity plus display name, used inside [`ValueKind`].
#[derive(Clone, Copy, Debug)]
pub struct TypeTag {
    key: TypeKey,
    name: &'static str,
}

impl TypeTag {
    pub fn of<T: 'static>() -> Self {
        TypeTag {
            key: TypeKey::Rust(TypeId::of::<T>()),
            name: short_type_name::<T>(),
        }
    }

    pub const fn named(name: &'static str) -> Self {
        TypeTag {
            key: TypeKey::Named(name),
            name,
        }
    }

    #[inline]
    pub fn key(&self) -> TypeKey {
        self.key
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for TypeTag {}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

pub(crate) type Getter = Arc<dyn Fn(&ModelRef) -> Result<Value> + Send + Sync>;
pub(crate) type Setter = Arc<dyn Fn(&ModelRef, Value) -> Result<()> + Send + Sync>;

/// A named, typed attribute of a model type.
///
/// Properties declared on abstract types carry no getter or setter; they are
/// re-bound to the concrete type's property of the same name at use.
#[derive(Clone)]
pub struct Property {
    name: String,
    kind: ValueKind,
    getter: Option<Getter>,
    setter: Option<Setter>,
}

impl Property {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    /// The access modes this property supports.
    pub fn modes(&self) -> AccessModes {
        if self.is_abstract() {
            return AccessModes::READ_WRITE;
        }
        AccessModes::new(self.getter.is_some(), self.setter.is_some())
    }

    pub fn is_abstract(&self) -> bool {
        self.getter.is_none() && self.setter.is_none()
    }

    pub(crate) fn read(&self, model: &ModelRef) -> Result<Option<Value>> {
        match &self.getter {
            Some(getter) => getter(model).map(Some),
            None => Ok(None),
        }
    }

    pub(crate) fn write(&self, model: &ModelRef, value: Value) -> Result<bool> {
        match &self.setter {
            Some(setter) => setter(model, value).map(|()| true),
            None => Ok(false),
        }
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("modes", &self.modes())
            .finish()
    }
}

struct TypeInfo {
    tag: TypeTag,
    parent: Option<ModelType>,
    factory: Option<fn() -> ModelRef>,
    equality: Option<fn(&ModelRef, &ModelRef) -> bool>,
    properties: Vec<Property>,
}

/// Runtime descriptor of a model type.
///
/// Cloning is cheap. Two descriptors are equal when they describe the same
/// type.
#[derive(Clone)]
pub struct ModelType(Arc<TypeInfo>);

fn instantiate<T: Model + Default>() -> ModelRef {
    ModelRef::new(T::default())
}

fn model_eq<T: Model + PartialEq>(a: &ModelRef, b: &ModelRef) -> bool {
    match (a.borrow::<T>(), b.borrow::<T>()) {
        (Ok(a), Ok(b)) => *a == *b,
        _ => false,
    }
}

impl ModelType {
    /// Starts describing a concrete type that the engine can instantiate.
    pub fn of<T: Model + Default + PartialEq>() -> TypeBuilder<T> {
        TypeBuilder::new(TypeInfo {
            tag: TypeTag::of::<T>(),
            parent: None,
            factory: Some(instantiate::<T>),
            equality: Some(model_eq::<T>),
            properties: Vec::new(),
        })
    }

    /// Starts describing a concrete type that has no default constructor.
    ///
    /// The engine can read and update such instances but never creates them.
    pub fn without_default<T: Model + PartialEq>() -> TypeBuilder<T> {
        TypeBuilder::new(TypeInfo {
            tag: TypeTag::of::<T>(),
            parent: None,
            factory: None,
            equality: Some(model_eq::<T>),
            properties: Vec::new(),
        })
    }

    /// Starts describing an abstract type identified by name.
    pub fn interface(name: &'static str) -> TypeBuilder<()> {
        TypeBuilder::new(TypeInfo {
            tag: TypeTag::named(name),
            parent: None,
            factory: None,
            equality: None,
            properties: Vec::new(),
        })
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.0.tag.name
    }

    #[inline]
    pub fn tag(&self) -> TypeTag {
        self.0.tag
    }

    #[inline]
    pub fn key(&self) -> TypeKey {
        self.0.tag.key
    }

    pub fn parent(&self) -> Option<&ModelType> {
        self.0.parent.as_ref()
    }

    /// Whether the engine cannot create instances of this type.
    pub fn is_abstract(&self) -> bool {
        self.0.factory.is_none()
    }

    /// Number of parent steps from `self` up to `key`, if `key` is an ancestor
    /// or `self` itself.
    pub fn distance_to(&self, key: TypeKey) -> Option<usize> {
        let mut current = Some(self);
        let mut distance = 0;
        while let Some(ty) = current {
            if ty.key() == key {
                return Some(distance);
            }
            current = ty.parent();
            distance += 1;
        }
        None
    }

    pub fn is_assignable_to(&self, other: &ModelType) -> bool {
        self.distance_to(other.key()).is_some()
    }

    /// Looks a property up on this type, then on its ancestors.
    ///
    /// Only abstract declarations are inherited. A concrete property reads
    /// and writes its declaring struct, which an instance of a subtype is not,
    /// so subtypes redeclare the properties they share with a concrete parent.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.0
            .properties
            .iter()
            .find(|property| property.name == name)
            .or_else(|| {
                self.parent()
                    .and_then(|parent| parent.property(name))
                    .filter(|property| property.is_abstract())
            })
    }

    /// Properties declared directly on this type.
    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.0.properties.iter()
    }

    /// Creates a fresh instance with default attribute values.
    pub fn new_instance(&self) -> Result<ModelRef> {
        match self.0.factory {
            Some(factory) => Ok(factory()),
            None => Err(Error::NoFactory(self.name().to_string())),
        }
    }

    pub(crate) fn equals(&self, a: &ModelRef, b: &ModelRef) -> bool {
        self.0.equality.is_some_and(|eq| eq(a, b))
    }
}

impl PartialEq for ModelType {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ModelType {}

impl Hash for ModelType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Debug for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelType({})", self.name())
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Builder returned by [`ModelType::of`], [`ModelType::without_default`] and
/// [`ModelType::interface`].
pub struct TypeBuilder<T> {
    info: TypeInfo,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypeBuilder<T> {
    fn new(info: TypeInfo) -> Self {
        TypeBuilder {
            info,
            _marker: PhantomData,
        }
    }

    /// Declares the parent type. Abstract properties not found on this type
    /// are looked up on the parent.
    pub fn extends(mut self, parent: ModelType) -> Self {
        self.info.parent = Some(parent);
        self
    }

    /// Declares an abstract property: a name and kind with no accessors.
    pub fn declare(mut self, name: &str, kind: ValueKind) -> Self {
        self.push(Property {
            name: name.to_string(),
            kind,
            getter: None,
            setter: None,
        });
        self
    }

    pub fn build(self) -> ModelType {
        ModelType(Arc::new(self.info))
    }

    fn push(&mut self, property: Property) {
        self.info.properties.retain(|existing| existing.name != property.name);
        self.info.properties.push(property);
    }
}

impl<T: Model> TypeBuilder<T> {
    /// Declares a readable and writable property.
    pub fn property<V, G, S>(mut self, name: &str, get: G, set: S) -> Self
    where
        V: IntoValue + FromValue,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.push(Property {
            name: name.to_string(),
            kind: V::kind(),
            getter: Some(getter(get)),
            setter: Some(setter(set)),
        });
        self
    }

    /// Declares a property that can only be read.
    pub fn read_only<V, G>(mut self, name: &str, get: G) -> Self
    where
        V: IntoValue + FromValue,
        G: Fn(&T) -> V + Send + Sync + 'static,
    {
        self.push(Property {
            name: name.to_string(),
            kind: V::kind(),
            getter: Some(getter(get)),
            setter: None,
        });
        self
    }

    /// Declares a property that can only be written.
    pub fn write_only<V, S>(mut self, name: &str, set: S) -> Self
    where
        V: FromValue,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.push(Property {
            name: name.to_string(),
            kind: V::kind(),
            getter: None,
            setter: Some(setter(set)),
        });
        self
    }
}

fn getter<T, V, G>(get: G) -> Getter
where
    T: Model,
    V: IntoValue,
    G: Fn(&T) -> V + Send + Sync + 'static,
{
    Arc::new(move |model: &ModelRef| {
        let instance = model.borrow::<T>()?;
        Ok(get(&*instance).into_value())
    })
}

fn setter<T, V, S>(set: S) -> Setter
where
    T: Model,
    V: FromValue,
    S: Fn(&mut T, V) + Send + Sync + 'static,
{
    Arc::new(move |model: &ModelRef, value: Value| {
        let value = V::from_value(value)?;
        let mut instance = model.borrow_mut::<T>()?;
        set(&mut *instance, value);
        Ok(())
    })
}

/// Shared, mutable handle to a model instance.
///
/// Equality (`==`) is the model-defined equality of the instance's type;
/// use [`ModelRef::ptr_eq`] for identity.
#[derive(Clone)]
pub struct ModelRef {
    cell: Rc<dyn Any>,
    model_type: ModelType,
}

impl ModelRef {
    pub fn new<T: Model>(value: T) -> Self {
        ModelRef::from_rc(Rc::new(RefCell::new(value)))
    }

    /// Wraps an existing shared instance without copying it.
    pub fn from_rc<T: Model>(rc: Rc<RefCell<T>>) -> Self {
        ModelRef {
            cell: rc,
            model_type: T::model_type(),
        }
    }

    #[inline]
    pub fn model_type(&self) -> &ModelType {
        &self.model_type
    }

    pub fn is<T: Model>(&self) -> bool {
        (*self.cell).is::<RefCell<T>>()
    }

    /// Recovers the typed shared handle.
    pub fn downcast<T: Model>(&self) -> Option<Rc<RefCell<T>>> {
        Rc::clone(&self.cell).downcast::<RefCell<T>>().ok()
    }

    pub fn borrow<T: Model>(&self) -> Result<Ref<'_, T>> {
        self.cell_of::<T>()?
            .try_borrow()
            .map_err(|_| Error::ModelBorrowed(self.model_type.name().to_string()))
    }

    pub fn borrow_mut<T: Model>(&self) -> Result<RefMut<'_, T>> {
        self.cell_of::<T>()?
            .try_borrow_mut()
            .map_err(|_| Error::ModelBorrowed(self.model_type.name().to_string()))
    }

    /// Whether both handles point at the same instance.
    #[inline]
    pub fn ptr_eq(&self, other: &ModelRef) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }

    fn cell_of<T: Model>(&self) -> Result<&RefCell<T>> {
        (*self.cell)
            .downcast_ref::<RefCell<T>>()
            .ok_or_else(|| Error::mismatch(short_type_name::<T>(), self.model_type.name()))
    }
}

impl PartialEq for ModelRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (self.model_type == other.model_type && self.model_type.equals(self, other))
    }
}

impl fmt::Debug for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelRef({}@{:p})", self.model_type.name(), Rc::as_ptr(&self.cell))
    }
}

impl<T: Model> From<Rc<RefCell<T>>> for ModelRef {
    fn from(rc: Rc<RefCell<T>>) -> Self {
        ModelRef::from_rc(rc)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::OnceLock;

    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Point {
        x: i64,
    }

    impl Model for Point {
        fn model_type() -> ModelType {
            static TYPE: OnceLock<ModelType> = OnceLock::new();
            TYPE.get_or_init(|| {
                ModelType::of::<Point>()
                    .extends(ModelType::interface("Shape").build())
                    .property("x", |p: &Point| p.x, |p: &mut Point, v| p.x = v)
                    .build()
            })
            .clone()
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct Pixel {
        lit: bool,
    }

    impl Model for Pixel {
        fn model_type() -> ModelType {
            static TYPE: OnceLock<ModelType> = OnceLock::new();
            TYPE.get_or_init(|| {
                ModelType::of::<Pixel>()
                    .extends(Point::model_type())
                    .property("lit", |p: &Pixel| p.lit, |p: &mut Pixel, v| p.lit = v)
                    .build()
            })
            .clone()
        }
    }

    #[test]
    fn test_only_abstract_properties_are_inherited() {
        let pixel = Pixel::model_type();
        assert!(pixel.property("lit").is_some());
        assert!(pixel.property("x").is_none());

        let solid = ModelType::interface("Solid")
            .declare("volume", ValueKind::Float)
            .build();
        let cube = ModelType::interface("Cube").extends(solid).build();
        assert!(cube.property("volume").is_some_and(Property::is_abstract));
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(Point::model_type().name(), "Point");
        assert_eq!(short_type_name::<Vec<String>>(), "Vec");
    }

    #[test]
    fn test_assignability_walks_parents() {
        let point = Point::model_type();
        let shape = point.parent().unwrap().clone();
        assert_eq!(point.distance_to(point.key()), Some(0));
        assert_eq!(point.distance_to(shape.key()), Some(1));
        assert!(point.is_assignable_to(&shape));
        assert!(!shape.is_assignable_to(&point));
        assert!(shape.is_abstract());
        assert!(matches!(shape.new_instance(), Err(Error::NoFactory(_))));
    }

    #[test]
    fn test_model_ref_equality_and_identity() {
        let a = ModelRef::new(Point { x: 1 });
        let b = ModelRef::new(Point { x: 1 });
        assert_eq!(a, b);
        assert!(!a.ptr_eq(&b));
        assert!(a.ptr_eq(&a.clone()));
    }

    #[test]
    fn test_borrow_conflict_is_reported() {
        let a = ModelRef::new(Point { x: 1 });
        let _guard = a.borrow_mut::<Point>().unwrap();
        assert!(matches!(a.borrow::<Point>(), Err(Error::ModelBorrowed(_))));
    }

    #[test]
    fn test_downcast_round_trips_the_same_cell() {
        let rc = Rc::new(RefCell::new(Point { x: 7 }));
        let handle = ModelRef::from_rc(rc.clone());
        assert!(handle.is::<Point>());
        assert!(Rc::ptr_eq(&handle.downcast::<Point>().unwrap(), &rc));
    }
}
