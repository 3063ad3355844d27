mod common;

use std::sync::OnceLock;

use common::*;
use pretty_assertions::assert_eq;
use prospect::{
    Error, Event, Model, ModelRef, ModelType, Node, SubtypeVariant, Value, View, ViewContext,
    ViewTemplate,
};

fn owner_with(pet: ModelRef) -> ModelRef {
    ModelRef::new(Owner {
        name: "Ann".into(),
        pet: Some(pet),
    })
}

fn cat_view(extra: Vec<Event>) -> View {
    let mut events = vec![
        Event::begin_object(None),
        Event::value(Some("name"), "Ann"),
        Event::begin_object(Some("pet")),
    ];
    events.extend(extra);
    events.push(Event::end_object(Some("pet")));
    events.push(Event::end_object(None));
    View::new(events)
}

#[test]
fn test_generate_writes_the_discriminator_first() {
    let owner = owner_with(ModelRef::new(Cat {
        name: "Tom".into(),
        lives: 9,
    }));
    let view = owner_template().generate_view(&owner, &ViewContext::new()).unwrap();

    assert_eq!(
        view.events(),
        &[
            Event::begin_object(None),
            Event::value(Some("name"), "Ann"),
            Event::begin_object(Some("pet")),
            Event::discriminator("type", "cat"),
            Event::value(Some("name"), "Tom"),
            Event::value(Some("lives"), 9),
            Event::end_object(Some("pet")),
            Event::end_object(None),
        ]
    );
}

#[test]
fn test_apply_instantiates_the_tagged_variant() {
    let view = cat_view(vec![
        Event::discriminator("type", "cat"),
        Event::value(Some("name"), "Tom"),
        Event::value(Some("lives"), 7),
    ]);
    let created = owner_template()
        .create_applicator(&view, &ViewContext::new())
        .unwrap()
        .create()
        .unwrap();

    let owner = created.borrow::<Owner>().unwrap();
    let pet = owner.pet.as_ref().unwrap();
    assert!(pet.is::<Cat>());
    assert_eq!(
        *pet.borrow::<Cat>().unwrap(),
        Cat {
            name: "Tom".into(),
            lives: 7
        }
    );
}

#[test]
fn test_tag_written_as_a_named_value_is_accepted() {
    let view = cat_view(vec![Event::value(Some("type"), "dog"), Event::value(Some("good"), true)]);
    let created = owner_template()
        .create_applicator(&view, &ViewContext::new())
        .unwrap()
        .create()
        .unwrap();

    let owner = created.borrow::<Owner>().unwrap();
    assert!(owner.pet.as_ref().unwrap().borrow::<Dog>().unwrap().good);
}

#[test]
fn test_changed_variant_replaces_the_instance() {
    let dog = ModelRef::new(Dog {
        name: "Rex".into(),
        good: true,
    });
    let target = owner_with(dog.clone());
    let recorder = recorder();
    let ctx = ViewContext::new().with_listener(recorder.clone());
    let view = cat_view(vec![
        Event::discriminator("type", "cat"),
        Event::value(Some("name"), "Tom"),
    ]);

    owner_template().create_applicator(&view, &ctx).unwrap().update(&target).unwrap();

    let owner = target.borrow::<Owner>().unwrap();
    let pet = owner.pet.as_ref().unwrap();
    assert!(pet.is::<Cat>());
    assert!(!pet.ptr_eq(&dog));
    assert_eq!(recorder.count("discarded pet Dog"), 1);
    assert_eq!(recorder.count("created pet Cat"), 1);
}

#[test]
fn test_same_variant_is_updated_in_place() {
    let cat = ModelRef::new(Cat {
        name: "Tom".into(),
        lives: 9,
    });
    let target = owner_with(cat.clone());
    let view = cat_view(vec![
        Event::discriminator("type", "cat"),
        Event::value(Some("lives"), 8),
    ]);

    owner_template()
        .create_applicator(&view, &ViewContext::new())
        .unwrap()
        .update(&target)
        .unwrap();

    assert!(target.borrow::<Owner>().unwrap().pet.as_ref().unwrap().ptr_eq(&cat));
    assert_eq!(cat.borrow::<Cat>().unwrap().lives, 8);
    assert_eq!(cat.borrow::<Cat>().unwrap().name, "Tom");
}

#[test]
fn test_unknown_tag_is_rejected() {
    let view = cat_view(vec![Event::discriminator("type", "parrot")]);
    let result = owner_template()
        .create_applicator(&view, &ViewContext::new())
        .unwrap()
        .create();

    match result {
        Err(Error::UnknownDiscriminator { path, tag }) => {
            assert_eq!(path, "/pet");
            assert_eq!(tag, "parrot");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_missing_tag_is_rejected() {
    let view = cat_view(vec![Event::value(Some("name"), "Tom")]);
    let result = owner_template()
        .create_applicator(&view, &ViewContext::new())
        .unwrap()
        .create();

    assert!(matches!(
        result,
        Err(Error::MissingDiscriminator { path, discriminator }) if path == "/pet" && discriminator == "type"
    ));
}

#[test]
fn test_undeclared_subtype_uses_the_closest_variant() {
    let owner = owner_with(ModelRef::new(HouseCat {
        name: "Mia".into(),
        lives: 9,
        indoor: true,
    }));
    let view = owner_template().generate_view(&owner, &ViewContext::new()).unwrap();

    assert_eq!(
        &view.events()[3..6],
        &[
            Event::discriminator("type", "cat"),
            Event::value(Some("name"), "Mia"),
            Event::value(Some("lives"), 9),
        ]
    );
    // Specializations are cached, so a second pass behaves the same.
    let again = owner_template().generate_view(&owner, &ViewContext::new()).unwrap();
    assert_eq!(again, view);
}

#[test]
fn test_polymorphic_root() {
    let template = ViewTemplate::new(
        Node::subtype_root(animal_type())
            .with_discriminator("kind")
            .child(Node::value("name"))
            .variant(SubtypeVariant::new("cat", Cat::model_type()).child(Node::value("lives")))
            .variant(SubtypeVariant::new("dog", Dog::model_type())),
    )
    .unwrap();
    let ctx = ViewContext::new();
    let dog = ModelRef::new(Dog {
        name: "Rex".into(),
        good: true,
    });
    let view = template.generate_view(&dog, &ctx).unwrap();
    assert_eq!(view.events()[1], Event::discriminator("kind", "dog"));

    let copy = template.create_applicator(&view, &ctx).unwrap().create().unwrap();
    assert_eq!(
        *copy.borrow::<Dog>().unwrap(),
        Dog {
            name: "Rex".into(),
            good: false
        }
    );
}

// ============ Runtime subtypes ============

#[test]
fn test_interface_root_reads_through_the_runtime_type() {
    let template = ViewTemplate::new(Node::root(animal_type()).child(Node::value("name"))).unwrap();
    let ctx = ViewContext::new();
    let dog = ModelRef::new(Dog {
        name: "Rex".into(),
        good: true,
    });
    let view = template.generate_view(&dog, &ctx).unwrap();
    assert_eq!(
        view.events(),
        &[
            Event::begin_object(None),
            Event::value(Some("name"), "Rex"),
            Event::end_object(None),
        ]
    );

    let cat = ModelRef::new(Cat {
        name: "Tom".into(),
        lives: 9,
    });
    template.create_applicator(&view, &ctx).unwrap().update(&cat).unwrap();
    assert_eq!(
        *cat.borrow::<Cat>().unwrap(),
        Cat {
            name: "Rex".into(),
            lives: 9
        }
    );
}

fn cat_owner_template() -> ViewTemplate {
    ViewTemplate::new(
        Node::root(Owner::model_type())
            .child(Node::value("name"))
            .child(
                Node::object("pet", Cat::model_type())
                    .child(Node::value("name"))
                    .child(Node::value("lives")),
            ),
    )
    .unwrap()
}

fn house_cat() -> ModelRef {
    ModelRef::new(HouseCat {
        name: "Mia".into(),
        lives: 9,
        indoor: true,
    })
}

#[test]
fn test_object_node_generates_from_a_subtype_instance() {
    let view = cat_owner_template()
        .generate_view(&owner_with(house_cat()), &ViewContext::new())
        .unwrap();

    assert_eq!(
        &view.events()[2..6],
        &[
            Event::begin_object(Some("pet")),
            Event::value(Some("name"), "Mia"),
            Event::value(Some("lives"), 9),
            Event::end_object(Some("pet")),
        ]
    );
}

#[test]
fn test_object_node_updates_a_subtype_instance_in_place() {
    let mia = house_cat();
    let target = owner_with(mia.clone());
    let view = cat_view(vec![Event::value(Some("lives"), 8)]);

    cat_owner_template()
        .create_applicator(&view, &ViewContext::new())
        .unwrap()
        .update(&target)
        .unwrap();

    assert!(target.borrow::<Owner>().unwrap().pet.as_ref().unwrap().ptr_eq(&mia));
    assert_eq!(
        *mia.borrow::<HouseCat>().unwrap(),
        HouseCat {
            name: "Mia".into(),
            lives: 8,
            indoor: true,
        }
    );
}

#[test]
fn test_undeclared_subtype_is_updated_in_place() {
    let mia = house_cat();
    let target = owner_with(mia.clone());
    let recorder = recorder();
    let ctx = ViewContext::new().with_listener(recorder.clone());
    let view = cat_view(vec![
        Event::discriminator("type", "cat"),
        Event::value(Some("name"), "Kit"),
    ]);

    owner_template().create_applicator(&view, &ctx).unwrap().update(&target).unwrap();

    assert!(target.borrow::<Owner>().unwrap().pet.as_ref().unwrap().ptr_eq(&mia));
    assert_eq!(mia.borrow::<HouseCat>().unwrap().name, "Kit");
    assert!(mia.borrow::<HouseCat>().unwrap().indoor);
    assert_eq!(recorder.count("created"), 0);
    assert_eq!(recorder.count("discarded"), 0);
}

/// A cat that declares only its own property.
#[derive(Debug, Default, PartialEq)]
struct Kitten {
    toy: String,
}

impl Model for Kitten {
    fn model_type() -> ModelType {
        static TYPE: OnceLock<ModelType> = OnceLock::new();
        TYPE.get_or_init(|| {
            ModelType::of::<Kitten>()
                .extends(Cat::model_type())
                .property("toy", |k: &Kitten| k.toy.clone(), |k: &mut Kitten, v| k.toy = v)
                .build()
        })
        .clone()
    }
}

#[test]
fn test_variant_must_declare_the_common_properties() {
    let result = ViewTemplate::new(
        Node::subtype_root(Cat::model_type())
            .child(Node::value("name"))
            .variant(SubtypeVariant::new("kitten", Kitten::model_type()).child(Node::value("toy"))),
    );

    match result {
        Err(Error::UnknownProperty { model, property }) => {
            assert_eq!(model, "Kitten");
            assert_eq!(property, "name");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

// ============ Template errors ============

fn unresolvable(node: Node) -> bool {
    let template = ViewTemplate::new(Node::root(Owner::model_type()).child(node));
    matches!(template, Err(Error::UnresolvableSubtype { .. }))
}

#[test]
fn test_duplicate_tags_are_ambiguous() {
    assert!(unresolvable(
        Node::subtype("pet", animal_type())
            .variant(SubtypeVariant::new("cat", Cat::model_type()))
            .variant(SubtypeVariant::new("cat", Dog::model_type())),
    ));
}

#[test]
fn test_subtype_node_needs_variants() {
    assert!(unresolvable(Node::subtype("pet", animal_type())));
}

#[test]
fn test_variant_must_extend_the_base() {
    assert!(unresolvable(
        Node::subtype("pet", animal_type()).variant(SubtypeVariant::new("pet", Pet::model_type())),
    ));
}

#[test]
fn test_unlisted_runtime_type_is_unresolvable() {
    let template = ViewTemplate::new(
        Node::root(Owner::model_type()).child(
            Node::subtype("pet", animal_type())
                .variant(SubtypeVariant::new("dog", Dog::model_type())),
        ),
    )
    .unwrap();
    let owner = owner_with(ModelRef::new(Cat::default()));
    assert!(matches!(
        template.generate_view(&owner, &ViewContext::new()),
        Err(Error::UnresolvableSubtype { .. })
    ));
}

#[test]
fn test_null_polymorphic_value_is_written_as_null() {
    let owner = ModelRef::new(Owner {
        name: "Ann".into(),
        pet: None,
    });
    let view = owner_template().generate_view(&owner, &ViewContext::new()).unwrap();
    assert_eq!(view.events()[2], Event::value(Some("pet"), Value::Null));
}
