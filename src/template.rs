//! Built templates: the entry points for generating and applying views.

use std::{collections::VecDeque, fmt, sync::Arc};

use tracing::debug;

use crate::{
    Error, IntoValue, ModelRef, Node, NodeKind, Result, View, ViewApplicator, ViewContext, apply,
    generate,
};

/// Order in which [`ViewTemplate::traverse`] visits nodes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TraversalOrder {
    /// Pre-order: a node, then each child subtree in declaration order.
    #[default]
    DepthFirst,
    /// Level by level, in declaration order within a level.
    BreadthFirst,
}

/// An immutable, validated template tree.
///
/// Templates are built once and shared; cloning is cheap and a template can be
/// used from several threads at once. Each generate or apply call keeps its
/// own state.
///
/// # Example
///
/// ```
/// use std::{cell::RefCell, rc::Rc, sync::OnceLock};
/// use prospect::{Model, ModelRef, ModelType, Node, ViewContext, ViewTemplate};
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Pet {
///     name: String,
/// }
///
/// impl Model for Pet {
///     fn model_type() -> ModelType {
///         static TYPE: OnceLock<ModelType> = OnceLock::new();
///         TYPE.get_or_init(|| {
///             ModelType::of::<Pet>()
///                 .property("name", |p: &Pet| p.name.clone(), |p: &mut Pet, v| p.name = v)
///                 .build()
///         })
///         .clone()
///     }
/// }
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Person {
///     name: String,
///     pets: Vec<Rc<RefCell<Pet>>>,
/// }
///
/// impl Model for Person {
///     fn model_type() -> ModelType {
///         static TYPE: OnceLock<ModelType> = OnceLock::new();
///         TYPE.get_or_init(|| {
///             ModelType::of::<Person>()
///                 .property("name", |p: &Person| p.name.clone(), |p: &mut Person, v| p.name = v)
///                 .property("pets", |p: &Person| p.pets.clone(), |p: &mut Person, v| p.pets = v)
///                 .build()
///         })
///         .clone()
///     }
/// }
///
/// # fn main() -> prospect::Result<()> {
/// let template = ViewTemplate::new(
///     Node::root(Person::model_type())
///         .child(Node::value("name"))
///         .child(Node::array_of_objects("pets", Pet::model_type()).child(Node::value("name"))),
/// )?;
/// let person = ModelRef::new(Person {
///     name: "Ann".into(),
///     pets: vec![Rc::new(RefCell::new(Pet { name: "Fido".into() }))],
/// });
/// let view = template.generate_view(&person, &ViewContext::new())?;
/// let copy = template.create_applicator(&view, &ViewContext::new())?.create()?;
/// assert_eq!(copy.borrow::<Person>()?.pets[0].borrow().name, "Fido");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ViewTemplate {
    root: Arc<Node>,
}

impl ViewTemplate {
    /// Binds every node to its property and validates the tree.
    ///
    /// Fails on unknown properties, value kinds no node converter supports,
    /// ambiguous or invalid subtype variants, and roots that are not object,
    /// subtype, array of objects or array of values nodes.
    pub fn new(root: Node) -> Result<ViewTemplate> {
        if !matches!(
            root.kind(),
            NodeKind::Object | NodeKind::Subtype | NodeKind::ArrayOfObjects | NodeKind::ArrayOfValues
        ) {
            return Err(Error::InvalidTemplate(format!(
                "the root must be an object, subtype or array node, not {}",
                root.kind().name()
            )));
        }
        let root = root.bind(None)?;
        let template = ViewTemplate {
            root: Arc::new(root),
        };
        debug!(
            root = %template.root.label(),
            nodes = template.node_count(),
            "built view template"
        );
        Ok(template)
    }

    #[inline]
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Whether the root is an array, so that the template maps lists with
    /// [`generate_list_view`](Self::generate_list_view),
    /// [`ViewApplicator::create_list`] and [`ViewApplicator::update_list`].
    #[inline]
    pub fn is_list(&self) -> bool {
        self.root.kind().is_array()
    }

    /// Writes `model` as a view.
    pub fn generate_view(&self, model: &ModelRef, context: &ViewContext) -> Result<View> {
        if self.is_list() {
            return Err(self.wrong_root("generate_list_view"));
        }
        generate::generate(&self.root, model, context)
    }

    /// Writes a list as the view of an array-rooted template.
    ///
    /// Items are model instances for an array of objects and scalars for an
    /// array of values.
    pub fn generate_list_view<I>(&self, items: I, context: &ViewContext) -> Result<View>
    where
        I: IntoIterator,
        I::Item: IntoValue,
    {
        if !self.is_list() {
            return Err(self.wrong_root("generate_view"));
        }
        let items = items.into_iter().map(IntoValue::into_value).collect();
        generate::generate_list(&self.root, items, context)
    }

    /// Prepares to read `view` into models.
    pub fn create_applicator(&self, view: &View, context: &ViewContext) -> Result<ViewApplicator<'_>> {
        view.validate()?;
        Ok(ViewApplicator::new(self, view.events().to_vec(), context.clone()))
    }

    /// Like [`create_applicator`](Self::create_applicator), for a view whose
    /// payload is the object stored under `data_key` of its root object.
    pub fn create_applicator_at(
        &self,
        view: &View,
        context: &ViewContext,
        data_key: &str,
    ) -> Result<ViewApplicator<'_>> {
        view.validate()?;
        let events = apply::extract_data(view.events(), data_key)?;
        Ok(ViewApplicator::new(self, events, context.clone()))
    }

    /// Visits every node of the tree with its depth (the root is at 0).
    ///
    /// Spliced templates are not entered. Subtype variants contribute their
    /// common children only, as declared on the node.
    pub fn traverse<F>(&self, order: TraversalOrder, mut visit: F)
    where
        F: FnMut(&Node, usize),
    {
        match order {
            TraversalOrder::DepthFirst => walk(&self.root, 0, &mut visit),
            TraversalOrder::BreadthFirst => {
                let mut queue = VecDeque::from([(&*self.root, 0)]);
                while let Some((node, depth)) = queue.pop_front() {
                    visit(node, depth);
                    queue.extend(node.children().iter().map(|child| (child, depth + 1)));
                }
            }
        }
    }

    /// The error for calling the single-object entry points on an array
    /// template or the reverse.
    pub(crate) fn wrong_root(&self, use_instead: &str) -> Error {
        Error::InvalidTemplate(format!(
            "template rooted at {} node `{}` maps {}; use `{use_instead}`",
            self.root.kind().name(),
            self.root.label(),
            if self.is_list() { "a list" } else { "a single object" },
        ))
    }

    fn node_count(&self) -> usize {
        let mut count = 0;
        self.traverse(TraversalOrder::DepthFirst, |_, _| count += 1);
        count
    }
}

fn walk<F: FnMut(&Node, usize)>(node: &Node, depth: usize, visit: &mut F) {
    visit(node, depth);
    for child in node.children() {
        walk(child, depth + 1, visit);
    }
}

impl fmt::Debug for ViewTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ViewTemplate").field(&self.root).finish()
    }
}
