//! Per-call configuration and per-call traversal state.

use std::{fmt, rc::Rc, sync::Arc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    CollectionManagers, Converters, Listeners, ModelType, Node, ReferenceResolver,
    ReferenceResolvers, ReferenceTable, ToManyManager, ToManyMappedManager, ValueConverter,
    ViewListener,
};

/// Direction of the current traversal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViewMode {
    /// Model to view.
    Generate,
    /// View to model.
    Apply,
}

/// Output options honored by view writers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "kebab-case"))]
pub struct ViewOptions {
    /// Write `VALUE` events whose value is null instead of dropping them.
    pub include_null_properties: bool,
    /// Wrap a named root object in an outer object keyed by its name.
    pub wrap_named_root: bool,
}

/// Configuration for one generate or apply call.
///
/// The context is not modified by a call and can be reused.
///
/// # Example
///
/// ```
/// use prospect::{ViewContext, ViewOptions};
///
/// let ctx = ViewContext::new().with_options(ViewOptions {
///     include_null_properties: true,
///     ..ViewOptions::default()
/// });
/// assert!(ctx.options().include_null_properties);
/// ```
#[derive(Clone, Default)]
pub struct ViewContext {
    listeners: Listeners,
    converters: Converters,
    managers: CollectionManagers,
    resolvers: ReferenceResolvers,
    options: ViewOptions,
}

impl ViewContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listener(mut self, listener: Arc<dyn ViewListener>) -> Self {
        self.listeners.append(listener);
        self
    }

    pub fn with_converter(mut self, converter: Arc<dyn ValueConverter>) -> Self {
        self.converters.append(converter);
        self
    }

    pub fn with_manager(mut self, manager: Arc<dyn ToManyManager>) -> Self {
        self.managers.append(manager);
        self
    }

    pub fn with_map_manager(mut self, manager: Arc<dyn ToManyMappedManager>) -> Self {
        self.managers.append_mapped(manager);
        self
    }

    pub fn with_resolver(mut self, resolver: Rc<dyn ReferenceResolver>) -> Self {
        self.resolvers.append(resolver);
        self
    }

    pub fn with_options(mut self, options: ViewOptions) -> Self {
        self.options = options;
        self
    }

    #[inline]
    pub fn listeners(&self) -> &Listeners {
        &self.listeners
    }

    pub fn listeners_mut(&mut self) -> &mut Listeners {
        &mut self.listeners
    }

    #[inline]
    pub fn converters(&self) -> &Converters {
        &self.converters
    }

    pub fn converters_mut(&mut self) -> &mut Converters {
        &mut self.converters
    }

    #[inline]
    pub fn managers(&self) -> &CollectionManagers {
        &self.managers
    }

    pub fn managers_mut(&mut self) -> &mut CollectionManagers {
        &mut self.managers
    }

    #[inline]
    pub fn resolvers(&self) -> &ReferenceResolvers {
        &self.resolvers
    }

    pub fn resolvers_mut(&mut self) -> &mut ReferenceResolvers {
        &mut self.resolvers
    }

    #[inline]
    pub fn options(&self) -> &ViewOptions {
        &self.options
    }
}

impl fmt::Debug for ViewContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewContext")
            .field("listeners", &self.listeners)
            .field("converters", &self.converters)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// One step of a [`ViewPath`].
#[derive(Clone, Debug)]
pub struct PathSegment {
    pub name: Option<String>,
    pub model_type: Option<ModelType>,
}

/// The logical position of the traversal, root first.
///
/// Renders as `/`-separated node names; unnamed steps such as the root or
/// array elements are left out.
#[derive(Clone, Debug, Default)]
pub struct ViewPath(Vec<PathSegment>);

impl ViewPath {
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }

    fn push(&mut self, name: Option<&str>, model_type: Option<&ModelType>) {
        self.0.push(PathSegment {
            name: name.map(str::to_string),
            model_type: model_type.cloned(),
        });
    }

    fn pop(&mut self) {
        self.0.pop();
    }
}

impl fmt::Display for ViewPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut wrote = false;
        for name in self.0.iter().filter_map(|segment| segment.name.as_deref()) {
            write!(f, "/{name}")?;
            wrote = true;
        }
        if !wrote {
            f.write_str("/")?;
        }
        Ok(())
    }
}

/// State owned by exactly one generate or apply call.
pub struct ScopedViewContext<'c> {
    context: &'c ViewContext,
    mode: ViewMode,
    path: ViewPath,
    references: ReferenceTable,
}

impl<'c> ScopedViewContext<'c> {
    pub(crate) fn new(context: &'c ViewContext, mode: ViewMode) -> Self {
        ScopedViewContext {
            context,
            mode,
            path: ViewPath::default(),
            references: ReferenceTable::default(),
        }
    }

    #[inline]
    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    #[inline]
    pub fn path(&self) -> &ViewPath {
        &self.path
    }

    #[inline]
    pub fn context(&self) -> &'c ViewContext {
        self.context
    }

    #[inline]
    pub fn options(&self) -> &'c ViewOptions {
        &self.context.options
    }

    /// Instances registered for reference resolution so far in this call.
    #[inline]
    pub fn references(&self) -> &ReferenceTable {
        &self.references
    }

    pub(crate) fn references_mut(&mut self) -> &mut ReferenceTable {
        &mut self.references
    }

    #[inline]
    pub(crate) fn listeners(&self) -> &'c Listeners {
        &self.context.listeners
    }

    /// The node's own converters when it has any, else the context chain.
    pub(crate) fn converters_for<'a>(&'a self, node: &'a Node) -> &'a Converters {
        if node.converters().is_empty() {
            &self.context.converters
        } else {
            node.converters()
        }
    }

    pub(crate) fn push(&mut self, node: &Node) {
        self.path.push(node.name(), node.model_type());
    }

    pub(crate) fn push_element(&mut self, node: &Node, name: Option<&str>) {
        self.path.push(name, node.model_type());
    }

    pub(crate) fn pop(&mut self) {
        self.path.pop();
    }

    pub(crate) fn replace_path(&mut self, path: ViewPath) -> ViewPath {
        std::mem::replace(&mut self.path, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_skips_unnamed_segments() {
        let mut path = ViewPath::default();
        assert_eq!(path.to_string(), "/");
        path.push(None, None);
        path.push(Some("pets"), None);
        path.push(None, None);
        path.push(Some("name"), None);
        assert_eq!(path.to_string(), "/pets/name");
        path.pop();
        assert_eq!(path.len(), 3);
        assert_eq!(path.to_string(), "/pets");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_options_from_json() {
        let options: ViewOptions = serde_json::from_str(r#"{"include-null-properties": true}"#).unwrap();
        assert!(options.include_null_properties);
        assert!(!options.wrap_named_root);
    }
}
