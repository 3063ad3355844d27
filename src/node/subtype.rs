use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use tracing::trace;

use crate::{Error, ModelType, Node, Result, TypeKey};

/// Declaration of one concrete variant of a polymorphic node.
#[derive(Clone)]
pub struct SubtypeVariant {
    tag: String,
    model_type: ModelType,
    children: Vec<Node>,
}

impl SubtypeVariant {
    /// `tag` is the discriminator value written for instances of `model_type`.
    pub fn new(tag: &str, model_type: ModelType) -> Self {
        SubtypeVariant {
            tag: tag.to_string(),
            model_type,
            children: Vec::new(),
        }
    }

    /// Adds a child that only this variant has.
    pub fn child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(children);
        self
    }
}

/// A bound variant: its tag, concrete type and full child list.
pub struct Variant {
    tag: String,
    model_type: ModelType,
    children: Vec<Node>,
    extra: Vec<Node>,
}

impl Variant {
    #[inline]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    #[inline]
    pub fn model_type(&self) -> &ModelType {
        &self.model_type
    }

    /// Common children re-bound to this variant, followed by its own.
    #[inline]
    pub fn children(&self) -> &[Node] {
        &self.children
    }
}

impl fmt::Debug for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variant")
            .field("tag", &self.tag)
            .field("model_type", &self.model_type)
            .field("children", &self.children.len())
            .finish()
    }
}

/// Variant table of a polymorphic node.
///
/// Declared variants are specialized when the template is built. A runtime
/// type that is a subtype of a declared variant without being one gets its
/// own specialization on first use, cached for later calls.
pub struct SubtypeTable {
    discriminator: String,
    base: ModelType,
    common: Vec<Node>,
    variants: Vec<Arc<Variant>>,
    derived: RwLock<HashMap<TypeKey, Arc<Variant>>>,
}

impl SubtypeTable {
    pub(crate) fn build(
        label: &str,
        discriminator: &str,
        base: &ModelType,
        common: &[Node],
        declared: Vec<SubtypeVariant>,
    ) -> Result<SubtypeTable> {
        let unresolvable = |detail: String| Error::UnresolvableSubtype {
            node: label.to_string(),
            detail,
        };
        if declared.is_empty() {
            return Err(unresolvable("no variants declared".into()));
        }
        let mut variants: Vec<Arc<Variant>> = Vec::with_capacity(declared.len());
        for SubtypeVariant {
            tag,
            model_type,
            children,
        } in declared
        {
            if !model_type.is_assignable_to(base) {
                return Err(unresolvable(format!(
                    "`{}` is not a subtype of `{}`",
                    model_type.name(),
                    base.name()
                )));
            }
            if let Some(clash) = variants
                .iter()
                .find(|v| v.tag == tag || v.model_type == model_type)
            {
                return Err(unresolvable(format!(
                    "ambiguous variants `{}` ({}) and `{}` ({})",
                    clash.tag,
                    clash.model_type.name(),
                    tag,
                    model_type.name()
                )));
            }
            let extra = children
                .into_iter()
                .map(|child| child.bind(Some(&model_type)))
                .collect::<Result<Vec<_>>>()?;
            let children = common
                .iter()
                .map(|child| child.for_subtype(&model_type))
                .chain(extra.iter().map(|child| Ok(child.clone())))
                .collect::<Result<Vec<_>>>()?;
            super::bind::check_unique_names(label, &children)?;
            variants.push(Arc::new(Variant {
                tag,
                model_type,
                children,
                extra,
            }));
        }
        Ok(SubtypeTable {
            discriminator: discriminator.to_string(),
            base: base.clone(),
            common: common.to_vec(),
            variants,
            derived: RwLock::new(HashMap::new()),
        })
    }

    /// Name of the discriminator event.
    #[inline]
    pub fn discriminator(&self) -> &str {
        &self.discriminator
    }

    #[inline]
    pub fn base(&self) -> &ModelType {
        &self.base
    }

    pub fn variants(&self) -> &[Arc<Variant>] {
        &self.variants
    }

    /// The declared variant written with `tag`.
    pub fn by_tag(&self, tag: &str) -> Option<&Arc<Variant>> {
        self.variants.iter().find(|variant| variant.tag == tag)
    }

    /// The specialization for a runtime type: the declared variant of that
    /// exact type, or else one derived from the most specific declared variant
    /// the type is assignable to.
    pub fn for_type(&self, model_type: &ModelType) -> Result<Arc<Variant>> {
        if let Some(variant) = self.variants.iter().find(|v| v.model_type == *model_type) {
            return Ok(Arc::clone(variant));
        }
        {
            let derived = self.derived.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(variant) = derived.get(&model_type.key()) {
                return Ok(Arc::clone(variant));
            }
        }
        let closest = self
            .variants
            .iter()
            .filter_map(|v| model_type.distance_to(v.model_type.key()).map(|d| (d, v)))
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, variant)| variant)
            .ok_or_else(|| Error::UnresolvableSubtype {
                node: self.base.name().to_string(),
                detail: format!("`{}` matches no declared variant", model_type.name()),
            })?;
        let children = self
            .common
            .iter()
            .chain(closest.extra.iter())
            .map(|child| child.for_subtype(model_type))
            .collect::<Result<Vec<_>>>()?;
        trace!(
            runtime = model_type.name(),
            variant = %closest.tag,
            "derived subtype specialization"
        );
        let variant = Arc::new(Variant {
            tag: closest.tag.clone(),
            model_type: model_type.clone(),
            children,
            extra: closest.extra.clone(),
        });
        self.derived
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(model_type.key(), Arc::clone(&variant));
        Ok(variant)
    }
}

impl fmt::Debug for SubtypeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubtypeTable")
            .field("discriminator", &self.discriminator)
            .field("base", &self.base)
            .field("variants", &self.variants)
            .finish_non_exhaustive()
    }
}
