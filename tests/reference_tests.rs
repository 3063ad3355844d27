mod common;

use std::{
    cell::RefCell,
    collections::BTreeMap,
    rc::Rc,
    sync::OnceLock,
};

use common::*;
use pretty_assertions::assert_eq;
use prospect::{
    Error, Event, KeyPropertyResolver, Model, ModelRef, ModelType, Node, View, ViewContext,
    ViewTemplate,
};

fn players_by_id() -> ViewContext {
    let resolver = KeyPropertyResolver::new(Player::model_type(), "id").unwrap();
    ViewContext::new().with_resolver(Rc::new(resolver))
}

fn league() -> League {
    let ann = player("p1", "Ann");
    let bob = player("p2", "Bob");
    let team = Team {
        name: "Reds".into(),
        captain: Some(bob.clone()),
        roster: vec![ann.clone(), bob.clone()],
    };
    League {
        teams: vec![Rc::new(std::cell::RefCell::new(team))],
        players: vec![ann, bob],
    }
}

#[test]
fn test_references_are_written_as_keys() {
    let view = league_template()
        .generate_view(&ModelRef::new(league()), &players_by_id())
        .unwrap();

    assert_eq!(
        &view.events()[..12],
        &[
            Event::begin_object(None),
            Event::begin_array(Some("teams")),
            Event::begin_object(None),
            Event::value(Some("name"), "Reds"),
            Event::begin_object(Some("captain")),
            Event::value(Some("id"), "p2"),
            Event::end_object(Some("captain")),
            Event::begin_array(Some("roster")),
            Event::begin_object(None),
            Event::value(Some("id"), "p1"),
            Event::end_object(None),
            Event::begin_object(None),
        ]
    );
}

#[test]
fn test_forward_references_resolve_to_instances_of_the_same_pass() {
    let template = league_template();
    let ctx = players_by_id();
    let view = template.generate_view(&ModelRef::new(league()), &ctx).unwrap();

    let created = template.create_applicator(&view, &ctx).unwrap().create().unwrap();

    let league = created.borrow::<League>().unwrap();
    assert_eq!(league.players.len(), 2);
    let team = league.teams[0].borrow();
    assert_eq!(team.name, "Reds");
    assert!(Rc::ptr_eq(team.captain.as_ref().unwrap(), &league.players[1]));
    assert_eq!(team.roster.len(), 2);
    assert!(Rc::ptr_eq(&team.roster[0], &league.players[0]));
    assert!(Rc::ptr_eq(&team.roster[1], &league.players[1]));
}

#[test]
fn test_resolver_finds_instances_outside_the_view() {
    let veteran = player("p9", "Vic");
    let resolver = KeyPropertyResolver::new(Player::model_type(), "id")
        .unwrap()
        .with_known([ModelRef::from(veteran.clone())]);
    let ctx = ViewContext::new().with_resolver(Rc::new(resolver));
    let view = View::new(vec![
        Event::begin_object(None),
        Event::begin_array(Some("teams")),
        Event::begin_object(None),
        Event::value(Some("name"), "Blues"),
        Event::begin_object(Some("captain")),
        Event::value(Some("id"), "p9"),
        Event::end_object(Some("captain")),
        Event::end_object(None),
        Event::end_array(Some("teams")),
        Event::end_object(None),
    ]);

    let created = league_template()
        .create_applicator(&view, &ctx)
        .unwrap()
        .create()
        .unwrap();

    let league = created.borrow::<League>().unwrap();
    let team = league.teams[0].borrow();
    assert!(Rc::ptr_eq(team.captain.as_ref().unwrap(), &veteran));
    assert!(league.players.is_empty());
}

#[test]
fn test_unknown_key_is_unresolved() {
    let view = View::new(vec![
        Event::begin_object(None),
        Event::begin_array(Some("teams")),
        Event::begin_object(None),
        Event::begin_object(Some("captain")),
        Event::value(Some("id"), "nobody"),
        Event::end_object(Some("captain")),
        Event::end_object(None),
        Event::end_array(Some("teams")),
        Event::end_object(None),
    ]);

    let result = league_template()
        .create_applicator(&view, &players_by_id())
        .unwrap()
        .create();

    match result {
        Err(Error::UnresolvedReference { model, path }) => {
            assert_eq!(model, "Player");
            assert_eq!(path, "/teams/captain");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_references_need_a_resolver() {
    let template = league_template();
    let view = template
        .generate_view(&ModelRef::new(league()), &ViewContext::new())
        .unwrap();

    let result = template
        .create_applicator(&view, &ViewContext::new())
        .unwrap()
        .create();
    assert!(matches!(result, Err(Error::UnresolvedReference { .. })));
}

#[test]
fn test_update_repoints_references_without_discarding() {
    let template = league_template();
    let ctx = players_by_id();
    let target = ModelRef::new(league());
    let view = View::new(vec![
        Event::begin_object(None),
        Event::begin_array(Some("teams")),
        Event::begin_object(None),
        Event::value(Some("name"), "Reds"),
        Event::begin_object(Some("captain")),
        Event::value(Some("id"), "p1"),
        Event::end_object(Some("captain")),
        Event::begin_array(Some("roster")),
        Event::begin_object(None),
        Event::value(Some("id"), "p1"),
        Event::end_object(None),
        Event::end_array(Some("roster")),
        Event::end_object(None),
        Event::end_array(Some("teams")),
        Event::begin_array(Some("players")),
        Event::begin_object(None),
        Event::value(Some("id"), "p1"),
        Event::value(Some("name"), "Ann"),
        Event::end_object(None),
        Event::begin_object(None),
        Event::value(Some("id"), "p2"),
        Event::value(Some("name"), "Bob"),
        Event::end_object(None),
        Event::end_array(Some("players")),
        Event::end_object(None),
    ]);
    let before = target.borrow::<League>().unwrap().players.clone();

    template.create_applicator(&view, &ctx).unwrap().update(&target).unwrap();

    let league = target.borrow::<League>().unwrap();
    assert!(Rc::ptr_eq(&league.players[0], &before[0]));
    assert!(Rc::ptr_eq(&league.players[1], &before[1]));
    let team = league.teams[0].borrow();
    assert!(Rc::ptr_eq(team.captain.as_ref().unwrap(), &before[0]));
    assert_eq!(team.roster.len(), 1);
    assert!(Rc::ptr_eq(&team.roster[0], &before[0]));
}

// ============ Keyed references ============

/// Players with the roles they fill, keyed by role.
#[derive(Debug, Default, PartialEq)]
struct Club {
    players: Vec<Rc<RefCell<Player>>>,
    roles: BTreeMap<String, Rc<RefCell<Player>>>,
}

impl Model for Club {
    fn model_type() -> ModelType {
        static TYPE: OnceLock<ModelType> = OnceLock::new();
        TYPE.get_or_init(|| {
            ModelType::of::<Club>()
                .property("players", |c: &Club| c.players.clone(), |c: &mut Club, v| c.players = v)
                .property("roles", |c: &Club| c.roles.clone(), |c: &mut Club, v| c.roles = v)
                .build()
        })
        .clone()
    }
}

fn club_template() -> ViewTemplate {
    ViewTemplate::new(
        Node::root(Club::model_type())
            .child(
                Node::array_of_objects("players", Player::model_type())
                    .child(Node::value("id"))
                    .child(Node::value("name")),
            )
            .child(Node::map_of_references("roles", Player::model_type()).child(Node::value("id"))),
    )
    .unwrap()
}

fn club(roles: &[(&str, usize)]) -> Club {
    let players = vec![player("p1", "Ann"), player("p2", "Bob")];
    let roles = roles
        .iter()
        .map(|(role, index)| (role.to_string(), players[*index].clone()))
        .collect();
    Club { players, roles }
}

#[test]
fn test_keyed_references_are_written_as_keys() {
    let view = club_template()
        .generate_view(&ModelRef::new(club(&[("keeper", 0)])), &players_by_id())
        .unwrap();

    assert_eq!(
        &view.events()[11..],
        &[
            Event::begin_object(Some("roles")),
            Event::begin_object(Some("keeper")),
            Event::value(Some("id"), "p1"),
            Event::end_object(Some("keeper")),
            Event::end_object(Some("roles")),
            Event::end_object(None),
        ]
    );
}

#[test]
fn test_keyed_references_resolve_on_create() {
    let template = club_template();
    let ctx = players_by_id();
    let view = template
        .generate_view(&ModelRef::new(club(&[("keeper", 0), ("striker", 1)])), &ctx)
        .unwrap();

    let created = template.create_applicator(&view, &ctx).unwrap().create().unwrap();

    let club = created.borrow::<Club>().unwrap();
    assert_eq!(club.roles.len(), 2);
    assert!(Rc::ptr_eq(&club.roles["keeper"], &club.players[0]));
    assert!(Rc::ptr_eq(&club.roles["striker"], &club.players[1]));
}

#[test]
fn test_update_repoints_keyed_references() {
    let template = club_template();
    let ctx = players_by_id();
    let target = ModelRef::new(club(&[("keeper", 0), ("striker", 1)]));
    let before = target.borrow::<Club>().unwrap().players.clone();
    let recorder = recorder();
    let view = template
        .generate_view(&ModelRef::new(club(&[("keeper", 1)])), &ctx)
        .unwrap();

    template
        .create_applicator(&view, &ctx.with_listener(recorder.clone()))
        .unwrap()
        .update(&target)
        .unwrap();

    let club = target.borrow::<Club>().unwrap();
    assert!(Rc::ptr_eq(&club.players[0], &before[0]));
    assert!(Rc::ptr_eq(&club.players[1], &before[1]));
    assert_eq!(club.roles.len(), 1);
    assert!(Rc::ptr_eq(&club.roles["keeper"], &before[1]));
    assert_eq!(recorder.count("discarded"), 0);
}
