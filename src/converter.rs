//! Value converters translate between model-side and view-side values.
//!
//! A [`Converters`] chain picks, for a given kind, the converter reporting the
//! smallest specificity distance. Ties go to the converter registered first.
//! When no converter matches, the value passes through unchanged (model to
//! view) or is coerced to the declared kind (view to model).

use std::{fmt, sync::Arc};

use tracing::trace;

use crate::{Accessor, Error, ModelType, Result, ScopedViewContext, Value, ValueKind};

/// Bidirectional value translation.
///
/// `to_model_value` may return `Ok(None)` to signal that the converter is
/// one-directional. The engine then skips the injection.
pub trait ValueConverter: Send + Sync {
    fn supports(&self, kind: &ValueKind) -> bool;

    /// Distance of this converter from `kind`; lower is more specific.
    fn specificity(&self, kind: &ValueKind) -> Option<usize> {
        self.supports(kind).then_some(0)
    }

    /// Distance of this converter from a runtime model type.
    fn model_specificity(&self, model_type: &ModelType) -> Option<usize> {
        self.specificity(&ValueKind::Model(model_type.tag()))
    }

    fn to_view_value(&self, value: Value, scope: &ScopedViewContext<'_>) -> Result<Value>;

    fn to_model_value(
        &self,
        kind: &ValueKind,
        value: Value,
        scope: &ScopedViewContext<'_>,
    ) -> Result<Option<Value>>;
}

/// Ordered converter chain.
#[derive(Clone, Default)]
pub struct Converters(Vec<Arc<dyn ValueConverter>>);

impl Converters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, converter: Arc<dyn ValueConverter>) {
        self.0.push(converter);
    }

    pub fn prepend(&mut self, converter: Arc<dyn ValueConverter>) {
        self.0.insert(0, converter);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Most specific converter for a declared kind.
    pub fn find(&self, kind: &ValueKind) -> Option<&Arc<dyn ValueConverter>> {
        self.best(|converter| converter.specificity(kind))
    }

    /// Most specific converter for a runtime value.
    pub fn find_for(&self, value: &Value) -> Option<&Arc<dyn ValueConverter>> {
        match value {
            Value::Null => None,
            Value::Model(model) => self.best(|c| c.model_specificity(model.model_type())),
            other => {
                let kind = other.kind()?;
                self.find(&kind)
            }
        }
    }

    fn best<F>(&self, distance: F) -> Option<&Arc<dyn ValueConverter>>
    where
        F: Fn(&dyn ValueConverter) -> Option<usize>,
    {
        let mut best: Option<(usize, &Arc<dyn ValueConverter>)> = None;
        for converter in &self.0 {
            if let Some(d) = distance(converter.as_ref()) {
                if best.is_none_or(|(current, _)| d < current) {
                    best = Some((d, converter));
                }
            }
        }
        best.map(|(_, converter)| converter)
    }

    pub fn to_view_value(&self, value: Value, scope: &ScopedViewContext<'_>) -> Result<Value> {
        match self.find_for(&value) {
            Some(converter) => converter.to_view_value(value, scope),
            None => Ok(value),
        }
    }

    /// `Ok(None)` when the selected converter is one-directional.
    pub fn to_model_value(
        &self,
        kind: &ValueKind,
        value: Value,
        scope: &ScopedViewContext<'_>,
    ) -> Result<Option<Value>> {
        if value.is_null() {
            return Ok(Some(Value::Null));
        }
        match self.find(kind) {
            Some(converter) => converter.to_model_value(kind, value, scope),
            None => value.coerce(kind).map(Some),
        }
    }
}

impl fmt::Debug for Converters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Converters({})", self.0.len())
    }
}

type Convert = Box<dyn Fn(Value) -> Result<Value> + Send + Sync>;

/// A converter built from closures for a single kind.
///
/// # Example
///
/// ```
/// use prospect::{FnConverter, ValueKind, Value};
///
/// // Renders integers as strings and parses them back.
/// let converter = FnConverter::new(
///     ValueKind::Int,
///     |v| Ok(Value::String(v.to_string())),
///     |v| v.coerce(&ValueKind::Int),
/// );
/// # let _ = converter;
/// ```
pub struct FnConverter {
    kind: ValueKind,
    to_view: Convert,
    to_model: Option<Convert>,
}

impl FnConverter {
    pub fn new<V, M>(kind: ValueKind, to_view: V, to_model: M) -> Self
    where
        V: Fn(Value) -> Result<Value> + Send + Sync + 'static,
        M: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        FnConverter {
            kind,
            to_view: Box::new(to_view),
            to_model: Some(Box::new(to_model)),
        }
    }

    /// A converter that only renders values; reading back skips the property.
    pub fn one_way<V>(kind: ValueKind, to_view: V) -> Self
    where
        V: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        FnConverter {
            kind,
            to_view: Box::new(to_view),
            to_model: None,
        }
    }
}

impl ValueConverter for FnConverter {
    fn supports(&self, kind: &ValueKind) -> bool {
        matches!(self.kind, ValueKind::Any) || matches!(kind, ValueKind::Any) || self.kind == *kind
    }

    /// An exact kind match beats a catch-all.
    fn specificity(&self, kind: &ValueKind) -> Option<usize> {
        if self.kind == *kind {
            Some(0)
        } else {
            self.supports(kind).then_some(1)
        }
    }

    fn to_view_value(&self, value: Value, _scope: &ScopedViewContext<'_>) -> Result<Value> {
        (self.to_view)(value)
    }

    fn to_model_value(
        &self,
        _kind: &ValueKind,
        value: Value,
        _scope: &ScopedViewContext<'_>,
    ) -> Result<Option<Value>> {
        match &self.to_model {
            Some(to_model) => to_model(value).map(Some),
            None => Ok(None),
        }
    }
}

/// Renders a model instance as one of its scalar properties.
///
/// The conversion is one-directional: reading the view back never replaces
/// the model instance.
pub struct PropertyExtractingConverter {
    model_type: ModelType,
    property: String,
    support_subtypes: bool,
}

impl PropertyExtractingConverter {
    /// Fails when `property` is unknown or not scalar.
    pub fn new(model_type: ModelType, property: &str) -> Result<Self> {
        let accessor = Accessor::resolve(&model_type, property)?;
        if !accessor.kind().is_scalar() {
            return Err(Error::UnsupportedValueType {
                node: format!("{}.{}", model_type.name(), property),
                kind: accessor.kind().to_string(),
            });
        }
        Ok(PropertyExtractingConverter {
            model_type,
            property: property.to_string(),
            support_subtypes: true,
        })
    }

    /// Whether instances of subtypes are handled as well. Enabled by default.
    pub fn support_subtypes(mut self, enabled: bool) -> Self {
        self.support_subtypes = enabled;
        self
    }
}

impl ValueConverter for PropertyExtractingConverter {
    fn supports(&self, kind: &ValueKind) -> bool {
        match kind {
            ValueKind::Any => true,
            ValueKind::Model(tag) => tag.key() == self.model_type.key(),
            _ => false,
        }
    }

    fn model_specificity(&self, model_type: &ModelType) -> Option<usize> {
        match model_type.distance_to(self.model_type.key())? {
            0 => Some(0),
            distance if self.support_subtypes => Some(distance),
            _ => None,
        }
    }

    fn to_view_value(&self, value: Value, _scope: &ScopedViewContext<'_>) -> Result<Value> {
        match value {
            Value::Model(model) => {
                let accessor = Accessor::resolve(model.model_type(), &self.property)?;
                Ok(accessor.get(&model)?.unwrap_or_default())
            }
            other => Ok(other),
        }
    }

    fn to_model_value(
        &self,
        _kind: &ValueKind,
        _value: Value,
        scope: &ScopedViewContext<'_>,
    ) -> Result<Option<Value>> {
        trace!(path = %scope.path(), property = %self.property, "one-directional conversion");
        Ok(None)
    }
}
