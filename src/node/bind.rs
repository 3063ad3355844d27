use std::sync::Arc;

use crate::{Accessor, Error, ModelType, Node, NodeKind, Result, SubtypeTable, ValueKind};

impl Node {
    /// Resolves this node's accessor against `owner` and binds its subtree.
    ///
    /// `owner` is `None` only for the template root. Nodes that already carry
    /// an accessor, such as those copied from a built template, keep it.
    pub(crate) fn bind(mut self, owner: Option<&ModelType>) -> Result<Node> {
        self.rebound = Arc::default();
        match (&self.kind, owner) {
            (NodeKind::Envelope, Some(owner)) => self.model_type = Some(owner.clone()),
            (NodeKind::Meta(_), _) | (_, None) => {}
            (NodeKind::Splice(template), Some(owner)) => {
                if template.root().subtypes().is_some() {
                    return Err(Error::InvalidTemplate(
                        "a polymorphic template cannot be spliced".into(),
                    ));
                }
                match (self.accessor.is_none(), self.source.clone()) {
                    (true, Some(source)) => {
                        self.accessor = Some(Accessor::resolve(owner, &source)?.restrict(self.access));
                    }
                    (true, None) => {
                        let spliced = template.root().model_type();
                        if spliced.is_some_and(|ty| !owner.is_assignable_to(ty)) {
                            return Err(Error::InvalidTemplate(format!(
                                "cannot splice {} into `{}`",
                                template.root().label(),
                                owner.name()
                            )));
                        }
                    }
                    (false, _) => {}
                }
            }
            (_, Some(owner)) => {
                if self.accessor.is_none() {
                    self.accessor = Some(self.resolve_accessor(owner)?);
                }
            }
        }
        self.check_binding()?;

        let label = self.label();
        let children = std::mem::take(&mut self.children);
        if !children.is_empty() {
            let scope = self.model_type.clone().ok_or_else(|| {
                Error::InvalidTemplate(format!("{} node `{label}` cannot have children", self.kind.name()))
            })?;
            self.children = children
                .into_iter()
                .map(|child| child.bind(Some(&scope)))
                .collect::<Result<Vec<_>>>()?;
            check_unique_names(&label, &self.children)?;
        }

        let polymorphic = matches!(self.kind, NodeKind::Subtype) || !self.variants.is_empty();
        if polymorphic && self.subtypes.is_none() {
            if !matches!(
                self.kind,
                NodeKind::Subtype | NodeKind::ArrayOfObjects | NodeKind::MapOfObjects
            ) {
                return Err(Error::InvalidTemplate(format!(
                    "{} node `{label}` cannot declare subtype variants",
                    self.kind.name()
                )));
            }
            let base = self.model_type.clone().ok_or_else(|| {
                Error::InvalidTemplate(format!("polymorphic node `{label}` has no base type"))
            })?;
            let declared = std::mem::take(&mut self.variants);
            let table = SubtypeTable::build(&label, &self.discriminator, &base, &self.children, declared)?;
            self.subtypes = Some(Arc::new(table));
        }
        Ok(self)
    }

    /// A copy of this node with its accessor re-bound to `model_type`.
    ///
    /// Envelopes re-bind their children too, since those read the same model.
    pub(crate) fn for_subtype(&self, model_type: &ModelType) -> Result<Node> {
        let mut node = self.clone();
        node.rebound = Arc::default();
        if let Some(accessor) = &self.accessor {
            node.accessor = Some(accessor.for_subtype(model_type)?);
        }
        if matches!(self.kind, NodeKind::Envelope) {
            node.model_type = Some(model_type.clone());
            node.children = self
                .children
                .iter()
                .map(|child| child.for_subtype(model_type))
                .collect::<Result<Vec<_>>>()?;
        }
        Ok(node)
    }

    fn resolve_accessor(&self, owner: &ModelType) -> Result<Accessor> {
        let property = self
            .source
            .as_deref()
            .or(self.name.as_deref())
            .ok_or_else(|| {
                Error::InvalidTemplate(format!(
                    "{} node needs a name or a source property",
                    self.kind.name()
                ))
            })?;
        Ok(Accessor::resolve(owner, property)?.restrict(self.access))
    }

    fn check_binding(&self) -> Result<()> {
        let Some(accessor) = &self.accessor else {
            return Ok(());
        };
        let kind = accessor.kind();
        match &self.kind {
            NodeKind::Value => self.check_value_kind(kind),
            NodeKind::ArrayOfValues => {
                self.check_shape(kind, matches!(kind, ValueKind::List(_)), "list")?;
                self.check_value_kind(kind.element())
            }
            NodeKind::MapOfValues => {
                self.check_shape(kind, matches!(kind, ValueKind::Map(..)), "map")?;
                self.check_value_kind(kind.element())
            }
            NodeKind::Object | NodeKind::Reference | NodeKind::Subtype | NodeKind::Splice(_) => {
                self.check_model_kind(kind)
            }
            NodeKind::ArrayOfObjects | NodeKind::ArrayOfReferences => {
                self.check_shape(kind, matches!(kind, ValueKind::List(_)), "list")?;
                self.check_model_kind(kind.element())
            }
            NodeKind::MapOfObjects | NodeKind::MapOfReferences => {
                self.check_shape(kind, matches!(kind, ValueKind::Map(..)), "map")?;
                self.check_model_kind(kind.element())
            }
            NodeKind::Envelope | NodeKind::Meta(_) => Ok(()),
        }
    }

    fn check_shape(&self, kind: &ValueKind, matches: bool, expected: &str) -> Result<()> {
        if matches || matches!(kind, ValueKind::Any) {
            return Ok(());
        }
        Err(Error::InvalidTemplate(format!(
            "{} node `{}` needs a {expected} property, found {kind}",
            self.kind.name(),
            self.label()
        )))
    }

    /// Without node converters only scalar kinds can be written as values;
    /// with them, some converter of the chain must support the kind.
    fn check_value_kind(&self, kind: &ValueKind) -> Result<()> {
        let supported = if self.converters.is_empty() {
            !matches!(kind, ValueKind::Model(_) | ValueKind::List(_) | ValueKind::Map(..))
        } else {
            self.converters.find(kind).is_some()
        };
        if !supported {
            return Err(Error::UnsupportedValueType {
                node: self.label(),
                kind: kind.to_string(),
            });
        }
        Ok(())
    }

    fn check_model_kind(&self, kind: &ValueKind) -> Result<()> {
        let Some(model_type) = &self.model_type else {
            return Ok(());
        };
        match kind {
            ValueKind::Any => Ok(()),
            ValueKind::Model(tag) if model_type.distance_to(tag.key()).is_some() => Ok(()),
            other => Err(Error::InvalidTemplate(format!(
                "{} node `{}` maps `{}` but its property holds {other}",
                self.kind.name(),
                self.label(),
                model_type.name()
            ))),
        }
    }
}

pub(super) fn check_unique_names(label: &str, children: &[Node]) -> Result<()> {
    for (i, child) in children.iter().enumerate() {
        let Some(name) = child.name() else { continue };
        if children[..i].iter().any(|earlier| earlier.name() == Some(name)) {
            return Err(Error::InvalidTemplate(format!(
                "node `{label}` has two children named `{name}`"
            )));
        }
    }
    Ok(())
}
