mod common;

use std::sync::Arc;

use common::*;
use pretty_assertions::assert_eq;
use prospect::{
    Error, FnConverter, Model, ModelRef, Node, SubtypeVariant, TraversalOrder, Value, ValueKind,
    ViewContext, ViewTemplate,
};

fn build(root: Node) -> Result<ViewTemplate, Error> {
    ViewTemplate::new(root)
}

#[test]
fn test_unknown_property() {
    let result = build(Node::root(Person::model_type()).child(Node::value("height")));
    match result {
        Err(Error::UnknownProperty { model, property }) => {
            assert_eq!(model, "Person");
            assert_eq!(property, "height");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_source_names_the_property() {
    let template = build(Node::root(Person::model_type()).child(Node::value("full_name").source("name")));
    assert!(template.is_ok());
}

#[test]
fn test_value_node_needs_a_scalar_property() {
    let result = build(Node::root(Person::model_type()).child(Node::value("best")));
    assert!(matches!(
        result,
        Err(Error::UnsupportedValueType { node, .. }) if node.contains("best")
    ));
}

#[test]
fn test_node_converter_must_support_the_property_kind() {
    let floats = FnConverter::new(ValueKind::Float, Ok, Ok);
    let result = build(
        Node::root(Person::model_type()).child(Node::value("name").converter(Arc::new(floats))),
    );
    assert!(matches!(result, Err(Error::UnsupportedValueType { .. })));
}

#[test]
fn test_scalar_converter_cannot_write_a_model_or_a_list() {
    let ints = FnConverter::new(ValueKind::Int, Ok, Ok);
    let result = build(
        Node::root(Person::model_type()).child(Node::value("best").converter(Arc::new(ints))),
    );
    assert!(matches!(
        result,
        Err(Error::UnsupportedValueType { node, .. }) if node.contains("best")
    ));

    let strings = FnConverter::new(ValueKind::String, Ok, Ok);
    let result = build(
        Node::root(Person::model_type()).child(Node::value("pets").converter(Arc::new(strings))),
    );
    assert!(matches!(result, Err(Error::UnsupportedValueType { .. })));
}

#[test]
fn test_node_converter_may_render_a_model() {
    let names = FnConverter::one_way(ValueKind::Any, |v| Ok(Value::String(v.to_string())));
    let result = build(
        Node::root(Person::model_type()).child(Node::value("best").converter(Arc::new(names))),
    );
    assert!(result.is_ok());
}

#[test]
fn test_root_must_be_an_object_or_an_array() {
    assert!(matches!(build(Node::value("name")), Err(Error::InvalidTemplate(_))));
    assert!(matches!(build(Node::map_of_values("scores")), Err(Error::InvalidTemplate(_))));
    assert!(matches!(
        build(Node::array_of_references("pets", Pet::model_type())),
        Err(Error::InvalidTemplate(_))
    ));
    assert!(build(Node::root_array_of_objects(Pet::model_type()).child(Node::value("name"))).is_ok());
    assert!(build(Node::root_array_of_values()).is_ok());
}

#[test]
fn test_duplicate_child_names() {
    let result = build(
        Node::root(Person::model_type())
            .child(Node::value("name"))
            .child(Node::value("name").source("age")),
    );
    assert!(matches!(result, Err(Error::InvalidTemplate(message)) if message.contains("name")));
}

#[test]
fn test_collection_node_needs_a_collection_property() {
    let result = build(
        Node::root(Person::model_type())
            .child(Node::array_of_objects("name", Pet::model_type()).child(Node::value("name"))),
    );
    assert!(matches!(result, Err(Error::InvalidTemplate(_))));

    let result = build(Node::root(Person::model_type()).child(Node::map_of_values("nicknames")));
    assert!(matches!(result, Err(Error::InvalidTemplate(_))));
}

#[test]
fn test_object_node_type_must_match_the_property() {
    let result = build(
        Node::root(Person::model_type()).child(Node::object("best", Person::model_type())),
    );
    assert!(matches!(result, Err(Error::InvalidTemplate(_))));
}

#[test]
fn test_value_nodes_cannot_have_children() {
    let result = build(
        Node::root(Person::model_type()).child(Node::value("name").child(Node::value("age"))),
    );
    assert!(matches!(result, Err(Error::InvalidTemplate(_))));
}

#[test]
fn test_children_are_checked_against_their_model() {
    let result = build(
        Node::root(Person::model_type())
            .child(Node::array_of_objects("pets", Pet::model_type()).child(Node::value("nicknames"))),
    );
    assert!(matches!(result, Err(Error::UnknownProperty { model, .. }) if model == "Pet"));
}

#[test]
fn test_polymorphic_template_cannot_be_spliced() {
    let animals = build(
        Node::subtype_root(animal_type())
            .variant(SubtypeVariant::new("cat", Cat::model_type()))
            .variant(SubtypeVariant::new("dog", Dog::model_type())),
    )
    .unwrap();
    let result = build(Node::root(Owner::model_type()).child(Node::splice(&animals).source("pet")));
    assert!(matches!(result, Err(Error::InvalidTemplate(_))));
}

#[test]
fn test_splice_of_an_unrelated_model_is_rejected() {
    let pets = build(Node::root(Pet::model_type()).child(Node::value("age"))).unwrap();
    let result = build(Node::root(Person::model_type()).child(Node::splice(&pets)));
    assert!(matches!(result, Err(Error::InvalidTemplate(_))));
}

#[test]
fn test_templates_compose() {
    let pets = build(
        Node::root(Pet::model_type())
            .child(Node::value("name"))
            .child(Node::value("age")),
    )
    .unwrap();
    let template = build(
        Node::root(Person::model_type())
            .child(Node::object_from("best", &pets))
            .child(Node::array_of_objects_from("pets", &pets))
            .child(Node::map_of_objects_from("kennel", &pets)),
    )
    .unwrap();

    let root = template.root();
    assert_eq!(root.children().len(), 3);
    for child in root.children() {
        assert_eq!(child.children().len(), 2);
        assert_eq!(child.model_type(), Some(&Pet::model_type()));
    }
}

// ============ Traversal ============

fn traversal(order: TraversalOrder) -> Vec<(String, usize)> {
    let mut seen = Vec::new();
    person_template().traverse(order, |node, depth| {
        seen.push((node.name().unwrap_or("<root>").to_string(), depth));
    });
    seen
}

fn pairs(items: &[(&str, usize)]) -> Vec<(String, usize)> {
    items.iter().map(|(name, depth)| (name.to_string(), *depth)).collect()
}

#[test]
fn test_traverse_depth_first() {
    assert_eq!(
        traversal(TraversalOrder::DepthFirst),
        pairs(&[
            ("<root>", 0),
            ("name", 1),
            ("age", 1),
            ("pets", 1),
            ("name", 2),
            ("age", 2),
            ("nicknames", 1),
            ("scores", 1),
        ])
    );
}

#[test]
fn test_traverse_breadth_first() {
    assert_eq!(
        traversal(TraversalOrder::BreadthFirst),
        pairs(&[
            ("<root>", 0),
            ("name", 1),
            ("age", 1),
            ("pets", 1),
            ("nicknames", 1),
            ("scores", 1),
            ("name", 2),
            ("age", 2),
        ])
    );
}

#[test]
fn test_find_child() {
    let template = person_template();
    let pets = template.root().find_child("pets").unwrap();
    assert!(pets.kind().holds_objects());
    assert!(pets.find_child("age").is_some());
    assert!(template.root().find_child("best").is_none());
}

// ============ Sharing ============

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn test_template_is_send_and_sync() {
    assert_send_sync::<ViewTemplate>();
    assert_send_sync::<Node>();
}

#[test]
fn test_one_template_serves_several_threads() {
    let template = ViewTemplate::new(
        Node::root(Owner::model_type())
            .child(Node::value("name"))
            .child(animal_node("pet")),
    )
    .unwrap();

    std::thread::scope(|scope| {
        for lives in 1..=4 {
            let template = &template;
            scope.spawn(move || {
                let ctx = ViewContext::new();
                let owner = ModelRef::new(Owner {
                    name: format!("owner {lives}"),
                    pet: Some(ModelRef::new(HouseCat {
                        name: "Mia".into(),
                        lives,
                        indoor: true,
                    })),
                });
                let view = template.generate_view(&owner, &ctx).unwrap();
                let copy = template.create_applicator(&view, &ctx).unwrap().create().unwrap();

                let copy = copy.borrow::<Owner>().unwrap();
                assert_eq!(copy.name, format!("owner {lives}"));
                assert_eq!(copy.pet.as_ref().unwrap().borrow::<Cat>().unwrap().lives, lives);
            });
        }
    });
}
