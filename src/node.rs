//! Template nodes.
//!
//! A template is a tree of [`Node`]s. Nodes are declared with the
//! constructors and builder methods below, then bound and validated as a
//! whole by [`ViewTemplate::new`](crate::ViewTemplate::new). Binding resolves
//! each node's accessor against the model type of its parent position.

use std::{fmt, sync::Arc};

use crate::{
    AccessModes, Accessor, CollectionOrdering, Converters, MetaHandler, ModelType,
    ToManyManager, ToManyMappedManager, ValueConverter, ValueKind, ViewTemplate,
};

mod bind;
mod rebind;
mod subtype;

pub(crate) use rebind::BoundNode;
pub use subtype::*;

use rebind::Rebound;

/// Default name of the discriminator event of polymorphic objects.
pub const DEFAULT_DISCRIMINATOR: &str = "type";

/// The variant of a template node.
#[derive(Clone)]
pub enum NodeKind {
    /// A scalar attribute.
    Value,
    /// A sequence of scalars.
    ArrayOfValues,
    /// A map of scalars, written as an object keyed by the map keys.
    MapOfValues,
    /// A to-one object attribute.
    Object,
    /// A named grouping level with no model attribute of its own.
    Envelope,
    /// A to-one attribute resolved by key instead of being created.
    Reference,
    ArrayOfObjects,
    ArrayOfReferences,
    MapOfObjects,
    MapOfReferences,
    /// A value supplied by a handler rather than by a property.
    Meta(Arc<dyn MetaHandler>),
    /// The root children of another template, inlined at this level.
    Splice(ViewTemplate),
    /// A to-one object whose shape depends on its concrete type.
    Subtype,
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Value => "value",
            NodeKind::ArrayOfValues => "array of values",
            NodeKind::MapOfValues => "map of values",
            NodeKind::Object => "object",
            NodeKind::Envelope => "envelope",
            NodeKind::Reference => "reference",
            NodeKind::ArrayOfObjects => "array of objects",
            NodeKind::ArrayOfReferences => "array of references",
            NodeKind::MapOfObjects => "map of objects",
            NodeKind::MapOfReferences => "map of references",
            NodeKind::Meta(_) => "meta",
            NodeKind::Splice(_) => "splice",
            NodeKind::Subtype => "subtype",
        }
    }

    /// Whether the node writes a `BEGIN_*`/`END_*` pair.
    pub fn is_container(&self) -> bool {
        !matches!(
            self,
            NodeKind::Value | NodeKind::Meta(_) | NodeKind::Splice(_)
        )
    }

    pub fn is_array(&self) -> bool {
        matches!(
            self,
            NodeKind::ArrayOfValues | NodeKind::ArrayOfObjects | NodeKind::ArrayOfReferences
        )
    }

    pub fn is_map(&self) -> bool {
        matches!(
            self,
            NodeKind::MapOfValues | NodeKind::MapOfObjects | NodeKind::MapOfReferences
        )
    }

    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            NodeKind::Reference | NodeKind::ArrayOfReferences | NodeKind::MapOfReferences
        )
    }

    /// Whether the node's values are model instances.
    pub fn holds_objects(&self) -> bool {
        matches!(
            self,
            NodeKind::Object
                | NodeKind::Reference
                | NodeKind::Subtype
                | NodeKind::ArrayOfObjects
                | NodeKind::ArrayOfReferences
                | NodeKind::MapOfObjects
                | NodeKind::MapOfReferences
        )
    }

    /// Whether the node's values are scalars written through its accessor.
    pub fn holds_values(&self) -> bool {
        matches!(
            self,
            NodeKind::Value | NodeKind::ArrayOfValues | NodeKind::MapOfValues
        )
    }
}

impl fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One position of a template tree.
#[derive(Clone)]
pub struct Node {
    name: Option<String>,
    namespace: Option<String>,
    kind: NodeKind,
    model_type: Option<ModelType>,
    source: Option<String>,
    access: AccessModes,
    accessor: Option<Accessor>,
    converters: Converters,
    element_name: Option<String>,
    ordering: CollectionOrdering,
    list_manager: Option<Arc<dyn ToManyManager>>,
    map_manager: Option<Arc<dyn ToManyMappedManager>>,
    children: Vec<Node>,
    discriminator: String,
    variants: Vec<SubtypeVariant>,
    subtypes: Option<Arc<SubtypeTable>>,
    rebound: Arc<Rebound>,
}

// ============ Constructors ============

impl Node {
    fn with_kind(kind: NodeKind, name: Option<&str>, model_type: Option<ModelType>) -> Node {
        Node {
            name: name.map(str::to_string),
            namespace: None,
            kind,
            model_type,
            source: None,
            access: AccessModes::READ_WRITE,
            accessor: None,
            converters: Converters::new(),
            element_name: None,
            ordering: CollectionOrdering::Ordered,
            list_manager: None,
            map_manager: None,
            children: Vec::new(),
            discriminator: DEFAULT_DISCRIMINATOR.to_string(),
            variants: Vec::new(),
            subtypes: None,
            rebound: Arc::default(),
        }
    }

    /// An unnamed root object node for `model_type`.
    pub fn root(model_type: ModelType) -> Node {
        Node::with_kind(NodeKind::Object, None, Some(model_type))
    }

    /// An unnamed polymorphic root node over `base`.
    pub fn subtype_root(base: ModelType) -> Node {
        Node::with_kind(NodeKind::Subtype, None, Some(base))
    }

    /// An unnamed root array whose elements are `element` instances.
    ///
    /// Templates with this root generate from and apply to a list of
    /// instances rather than a single one.
    pub fn root_array_of_objects(element: ModelType) -> Node {
        Node::with_kind(NodeKind::ArrayOfObjects, None, Some(element))
    }

    /// An unnamed root array of scalars.
    pub fn root_array_of_values() -> Node {
        Node::with_kind(NodeKind::ArrayOfValues, None, None)
    }

    pub fn value(name: &str) -> Node {
        Node::with_kind(NodeKind::Value, Some(name), None)
    }

    pub fn array_of_values(name: &str) -> Node {
        Node::with_kind(NodeKind::ArrayOfValues, Some(name), None)
    }

    pub fn map_of_values(name: &str) -> Node {
        Node::with_kind(NodeKind::MapOfValues, Some(name), None)
    }

    pub fn object(name: &str, model_type: ModelType) -> Node {
        Node::with_kind(NodeKind::Object, Some(name), Some(model_type))
    }

    pub fn reference(name: &str, model_type: ModelType) -> Node {
        Node::with_kind(NodeKind::Reference, Some(name), Some(model_type))
    }

    /// A named grouping whose children read the enclosing model.
    pub fn envelope(name: &str) -> Node {
        Node::with_kind(NodeKind::Envelope, Some(name), None)
    }

    pub fn subtype(name: &str, base: ModelType) -> Node {
        Node::with_kind(NodeKind::Subtype, Some(name), Some(base))
    }

    pub fn array_of_objects(name: &str, element: ModelType) -> Node {
        Node::with_kind(NodeKind::ArrayOfObjects, Some(name), Some(element))
    }

    pub fn array_of_references(name: &str, element: ModelType) -> Node {
        Node::with_kind(NodeKind::ArrayOfReferences, Some(name), Some(element))
    }

    pub fn map_of_objects(name: &str, element: ModelType) -> Node {
        Node::with_kind(NodeKind::MapOfObjects, Some(name), Some(element))
    }

    pub fn map_of_references(name: &str, element: ModelType) -> Node {
        Node::with_kind(NodeKind::MapOfReferences, Some(name), Some(element))
    }

    pub fn meta(name: &str, handler: Arc<dyn MetaHandler>) -> Node {
        Node::with_kind(NodeKind::Meta(handler), Some(name), None)
    }

    /// Inlines the root children of `template` at this level.
    ///
    /// The children read the enclosing model, or the object held by the
    /// property named with [`Node::source`].
    pub fn splice(template: &ViewTemplate) -> Node {
        let model_type = template.root().model_type().cloned();
        Node::with_kind(NodeKind::Splice(template.clone()), None, model_type)
    }

    /// An object node shaped like the root of `template`.
    pub fn object_from(name: &str, template: &ViewTemplate) -> Node {
        let kind = match template.root().kind() {
            NodeKind::Subtype => NodeKind::Subtype,
            _ => NodeKind::Object,
        };
        Node::shaped_like(kind, Some(name), template)
    }

    /// An array node whose elements are shaped like the root of `template`.
    pub fn array_of_objects_from(name: &str, template: &ViewTemplate) -> Node {
        Node::shaped_like(NodeKind::ArrayOfObjects, Some(name), template)
    }

    /// A map node whose values are shaped like the root of `template`.
    pub fn map_of_objects_from(name: &str, template: &ViewTemplate) -> Node {
        Node::shaped_like(NodeKind::MapOfObjects, Some(name), template)
    }

    /// An unnamed root array whose elements are shaped like the root of
    /// `template`.
    pub fn root_array_of_objects_from(template: &ViewTemplate) -> Node {
        Node::shaped_like(NodeKind::ArrayOfObjects, None, template)
    }

    fn shaped_like(kind: NodeKind, name: Option<&str>, template: &ViewTemplate) -> Node {
        let root = template.root();
        let mut node = Node::with_kind(kind, name, root.model_type.clone());
        node.children = root.children.clone();
        node.discriminator = root.discriminator.clone();
        node.subtypes = root.subtypes.clone();
        node
    }
}

// ============ Declaration builders ============

impl Node {
    /// Sets the event name.
    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }

    /// Binds the node to a property whose name differs from the event name.
    pub fn source(mut self, property: &str) -> Self {
        self.source = Some(property.to_string());
        self
    }

    /// Restricts the directions in which the node's property is used.
    pub fn access(mut self, modes: AccessModes) -> Self {
        self.access = modes;
        self
    }

    /// Adds a node-level converter. Node converters replace the context chain
    /// for this node.
    pub fn converter(mut self, converter: Arc<dyn ValueConverter>) -> Self {
        self.converters.append(converter);
        self
    }

    /// Event name of each element of an array node.
    pub fn with_element_name(mut self, name: &str) -> Self {
        self.element_name = Some(name.to_string());
        self
    }

    pub fn with_ordering(mut self, ordering: CollectionOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn unordered(self) -> Self {
        self.with_ordering(CollectionOrdering::Unordered)
    }

    /// Overrides the association manager of an array node.
    pub fn with_manager(mut self, manager: Arc<dyn ToManyManager>) -> Self {
        self.list_manager = Some(manager);
        self
    }

    /// Overrides the association manager of a map node.
    pub fn with_map_manager(mut self, manager: Arc<dyn ToManyMappedManager>) -> Self {
        self.map_manager = Some(manager);
        self
    }

    pub fn child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(children);
        self
    }

    /// Name of the discriminator event of a polymorphic node.
    pub fn with_discriminator(mut self, name: &str) -> Self {
        self.discriminator = name.to_string();
        self
    }

    /// Declares one concrete variant of a polymorphic node.
    ///
    /// Subtype nodes require at least one. Array and map of objects nodes
    /// with variants become polymorphic per element.
    pub fn variant(mut self, variant: SubtypeVariant) -> Self {
        self.variants.push(variant);
        self
    }
}

// ============ Accessors ============

impl Node {
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    #[inline]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// The model type at this position: the object type for object-valued
    /// nodes, the enclosing type for envelopes, `None` for scalar nodes.
    #[inline]
    pub fn model_type(&self) -> Option<&ModelType> {
        self.model_type.as_ref()
    }

    #[inline]
    pub fn accessor(&self) -> Option<&Accessor> {
        self.accessor.as_ref()
    }

    #[inline]
    pub fn converters(&self) -> &Converters {
        &self.converters
    }

    #[inline]
    pub fn element_name(&self) -> Option<&str> {
        self.element_name.as_deref()
    }

    #[inline]
    pub fn ordering(&self) -> CollectionOrdering {
        self.ordering
    }

    pub fn manager(&self) -> Option<&Arc<dyn ToManyManager>> {
        self.list_manager.as_ref()
    }

    pub fn map_manager(&self) -> Option<&Arc<dyn ToManyMappedManager>> {
        self.map_manager.as_ref()
    }

    #[inline]
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Variant table of a polymorphic node, after binding.
    pub fn subtypes(&self) -> Option<&Arc<SubtypeTable>> {
        self.subtypes.as_ref()
    }

    /// Declared kind of the bound property, [`ValueKind::Any`] when unbound.
    pub fn value_kind(&self) -> &ValueKind {
        static ANY: ValueKind = ValueKind::Any;
        self.accessor.as_ref().map_or(&ANY, Accessor::kind)
    }

    /// Finds a direct child by event name.
    pub fn find_child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|child| child.name() == Some(name))
    }

    /// Display label used in diagnostics.
    pub(crate) fn label(&self) -> String {
        match (&self.name, &self.model_type) {
            (Some(name), _) => name.clone(),
            (None, Some(model_type)) => format!("<{}>", model_type.name()),
            (None, None) => format!("<{}>", self.kind.name()),
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("model_type", &self.model_type)
            .field("accessor", &self.accessor)
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}
