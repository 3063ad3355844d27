use std::{cell::RefCell, rc::Rc, sync::OnceLock};

use prospect::{Model, ModelRef, ModelType, Node, SubtypeVariant, View, ViewContext, ViewTemplate};

#[derive(Debug, Default, PartialEq)]
struct Item {
    id: i64,
    label: String,
    tags: Vec<String>,
}

impl Model for Item {
    fn model_type() -> ModelType {
        static TYPE: OnceLock<ModelType> = OnceLock::new();
        TYPE.get_or_init(|| {
            ModelType::of::<Item>()
                .property("id", |i: &Item| i.id, |i: &mut Item, v| i.id = v)
                .property("label", |i: &Item| i.label.clone(), |i: &mut Item, v| i.label = v)
                .property("tags", |i: &Item| i.tags.clone(), |i: &mut Item, v| i.tags = v)
                .build()
        })
        .clone()
    }
}

#[derive(Debug, Default, PartialEq)]
struct Special {
    id: i64,
    label: String,
    tags: Vec<String>,
    weight: f64,
}

impl Model for Special {
    fn model_type() -> ModelType {
        static TYPE: OnceLock<ModelType> = OnceLock::new();
        TYPE.get_or_init(|| {
            ModelType::of::<Special>()
                .extends(Item::model_type())
                .property("id", |s: &Special| s.id, |s: &mut Special, v| s.id = v)
                .property("label", |s: &Special| s.label.clone(), |s: &mut Special, v| s.label = v)
                .property("tags", |s: &Special| s.tags.clone(), |s: &mut Special, v| s.tags = v)
                .property("weight", |s: &Special| s.weight, |s: &mut Special, v| s.weight = v)
                .build()
        })
        .clone()
    }
}

#[derive(Debug, Default, PartialEq)]
struct Shelf {
    name: String,
    items: Vec<Rc<RefCell<Item>>>,
    featured: Option<ModelRef>,
}

impl Model for Shelf {
    fn model_type() -> ModelType {
        static TYPE: OnceLock<ModelType> = OnceLock::new();
        TYPE.get_or_init(|| {
            ModelType::of::<Shelf>()
                .property("name", |s: &Shelf| s.name.clone(), |s: &mut Shelf, v| s.name = v)
                .property("items", |s: &Shelf| s.items.clone(), |s: &mut Shelf, v| s.items = v)
                .property("featured", |s: &Shelf| s.featured.clone(), |s: &mut Shelf, v| s.featured = v)
                .build()
        })
        .clone()
    }
}

fn template() -> &'static ViewTemplate {
    static TEMPLATE: OnceLock<ViewTemplate> = OnceLock::new();
    TEMPLATE.get_or_init(|| {
        ViewTemplate::new(
            Node::root(Shelf::model_type())
                .child(Node::value("name"))
                .child(
                    Node::array_of_objects("items", Item::model_type())
                        .child(Node::value("id"))
                        .child(Node::value("label"))
                        .child(Node::array_of_values("tags")),
                )
                .child(
                    Node::subtype("featured", Item::model_type())
                        .child(Node::value("id"))
                        .variant(SubtypeVariant::new("item", Item::model_type()))
                        .variant(
                            SubtypeVariant::new("special", Special::model_type())
                                .child(Node::value("weight")),
                        ),
                ),
        )
        .unwrap()
    })
}

/// Decodes `data` as a JSON view and applies it, both as a fresh graph and as
/// an update of a populated one. Whatever applies must generate again.
pub fn test_apply(data: &[u8]) {
    let Ok(view) = serde_json::from_slice::<View>(data) else {
        return;
    };
    let template = template();
    let ctx = ViewContext::new();
    let Ok(applicator) = template.create_applicator(&view, &ctx) else {
        return;
    };

    if let Ok(created) = applicator.create() {
        let view = template.generate_view(&created, &ctx).unwrap();
        let _ = serde_json::to_vec(&view).unwrap();
    }

    let target = ModelRef::new(Shelf {
        name: "top".into(),
        items: vec![Rc::new(RefCell::new(Item {
            id: 1,
            label: "one".into(),
            tags: vec!["a".into()],
        }))],
        featured: Some(ModelRef::new(Special::default())),
    });
    if applicator.update(&target).is_ok() {
        template.generate_view(&target, &ctx).unwrap();
    }
}
