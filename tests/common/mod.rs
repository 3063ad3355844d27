#![allow(dead_code)]

use std::{
    cell::RefCell,
    collections::BTreeMap,
    rc::Rc,
    sync::{Arc, Mutex, OnceLock},
};

use prospect::{
    Model, ModelRef, ModelType, Node, NodeEvent, PropertyEvent, SubtypeVariant, Value, ValueKind,
    ViewListener, ViewTemplate, Visit,
};

// ============ People and pets ============

#[derive(Debug, Default)]
pub struct Pet {
    pub name: String,
    pub age: i64,
}

/// Pets are the same pet when they share a name.
impl PartialEq for Pet {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Model for Pet {
    fn model_type() -> ModelType {
        static TYPE: OnceLock<ModelType> = OnceLock::new();
        TYPE.get_or_init(|| {
            ModelType::of::<Pet>()
                .property("name", |p: &Pet| p.name.clone(), |p: &mut Pet, v| p.name = v)
                .property("age", |p: &Pet| p.age, |p: &mut Pet, v| p.age = v)
                .build()
        })
        .clone()
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct Person {
    pub name: String,
    pub age: Option<i64>,
    pub pets: Vec<Rc<RefCell<Pet>>>,
    pub nicknames: Vec<String>,
    pub scores: BTreeMap<String, i64>,
    pub kennel: BTreeMap<String, Rc<RefCell<Pet>>>,
    pub best: Option<Rc<RefCell<Pet>>>,
}

impl Model for Person {
    fn model_type() -> ModelType {
        static TYPE: OnceLock<ModelType> = OnceLock::new();
        TYPE.get_or_init(|| {
            ModelType::of::<Person>()
                .property("name", |p: &Person| p.name.clone(), |p: &mut Person, v| p.name = v)
                .property("age", |p: &Person| p.age, |p: &mut Person, v| p.age = v)
                .property("pets", |p: &Person| p.pets.clone(), |p: &mut Person, v| p.pets = v)
                .property(
                    "nicknames",
                    |p: &Person| p.nicknames.clone(),
                    |p: &mut Person, v| p.nicknames = v,
                )
                .property("scores", |p: &Person| p.scores.clone(), |p: &mut Person, v| p.scores = v)
                .property("kennel", |p: &Person| p.kennel.clone(), |p: &mut Person, v| p.kennel = v)
                .property("best", |p: &Person| p.best.clone(), |p: &mut Person, v| p.best = v)
                .build()
        })
        .clone()
    }
}

pub fn pet(name: &str, age: i64) -> Rc<RefCell<Pet>> {
    Rc::new(RefCell::new(Pet {
        name: name.to_string(),
        age,
    }))
}

/// Ann, 30, with Rex (3) and Tom (5).
pub fn ann() -> Person {
    Person {
        name: "Ann".into(),
        age: Some(30),
        pets: vec![pet("Rex", 3), pet("Tom", 5)],
        nicknames: vec!["annie".into()],
        scores: BTreeMap::from([("math".to_string(), 90)]),
        ..Person::default()
    }
}

pub fn pets_node() -> Node {
    Node::array_of_objects("pets", Pet::model_type())
        .child(Node::value("name"))
        .child(Node::value("age"))
}

/// name, age, pets, nicknames and scores.
pub fn person_root() -> Node {
    Node::root(Person::model_type())
        .child(Node::value("name"))
        .child(Node::value("age"))
        .child(pets_node())
        .child(Node::array_of_values("nicknames"))
        .child(Node::map_of_values("scores"))
}

pub fn person_template() -> ViewTemplate {
    ViewTemplate::new(person_root()).unwrap()
}

// ============ Animals ============

pub fn animal_type() -> ModelType {
    static TYPE: OnceLock<ModelType> = OnceLock::new();
    TYPE.get_or_init(|| {
        ModelType::interface("Animal")
            .declare("name", ValueKind::String)
            .build()
    })
    .clone()
}

#[derive(Debug, Default, PartialEq)]
pub struct Cat {
    pub name: String,
    pub lives: i64,
}

impl Model for Cat {
    fn model_type() -> ModelType {
        static TYPE: OnceLock<ModelType> = OnceLock::new();
        TYPE.get_or_init(|| {
            ModelType::of::<Cat>()
                .extends(animal_type())
                .property("name", |c: &Cat| c.name.clone(), |c: &mut Cat, v| c.name = v)
                .property("lives", |c: &Cat| c.lives, |c: &mut Cat, v| c.lives = v)
                .build()
        })
        .clone()
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct Dog {
    pub name: String,
    pub good: bool,
}

impl Model for Dog {
    fn model_type() -> ModelType {
        static TYPE: OnceLock<ModelType> = OnceLock::new();
        TYPE.get_or_init(|| {
            ModelType::of::<Dog>()
                .extends(animal_type())
                .property("name", |d: &Dog| d.name.clone(), |d: &mut Dog, v| d.name = v)
                .property("good", |d: &Dog| d.good, |d: &mut Dog, v| d.good = v)
                .build()
        })
        .clone()
    }
}

/// A house cat is a cat the templates never declare.
#[derive(Debug, Default, PartialEq)]
pub struct HouseCat {
    pub name: String,
    pub lives: i64,
    pub indoor: bool,
}

impl Model for HouseCat {
    fn model_type() -> ModelType {
        static TYPE: OnceLock<ModelType> = OnceLock::new();
        TYPE.get_or_init(|| {
            ModelType::of::<HouseCat>()
                .extends(Cat::model_type())
                .property("name", |c: &HouseCat| c.name.clone(), |c: &mut HouseCat, v| c.name = v)
                .property("lives", |c: &HouseCat| c.lives, |c: &mut HouseCat, v| c.lives = v)
                .property("indoor", |c: &HouseCat| c.indoor, |c: &mut HouseCat, v| c.indoor = v)
                .build()
        })
        .clone()
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct Owner {
    pub name: String,
    pub pet: Option<ModelRef>,
}

impl Model for Owner {
    fn model_type() -> ModelType {
        static TYPE: OnceLock<ModelType> = OnceLock::new();
        TYPE.get_or_init(|| {
            ModelType::of::<Owner>()
                .property("name", |o: &Owner| o.name.clone(), |o: &mut Owner, v| o.name = v)
                .property("pet", |o: &Owner| o.pet.clone(), |o: &mut Owner, v| o.pet = v)
                .build()
        })
        .clone()
    }
}

pub fn animal_node(name: &str) -> Node {
    Node::subtype(name, animal_type())
        .child(Node::value("name"))
        .variant(SubtypeVariant::new("cat", Cat::model_type()).child(Node::value("lives")))
        .variant(SubtypeVariant::new("dog", Dog::model_type()).child(Node::value("good")))
}

pub fn owner_template() -> ViewTemplate {
    ViewTemplate::new(
        Node::root(Owner::model_type())
            .child(Node::value("name"))
            .child(animal_node("pet")),
    )
    .unwrap()
}

// ============ Leagues ============

#[derive(Debug, Default, PartialEq)]
pub struct Player {
    pub id: String,
    pub name: String,
}

impl Model for Player {
    fn model_type() -> ModelType {
        static TYPE: OnceLock<ModelType> = OnceLock::new();
        TYPE.get_or_init(|| {
            ModelType::of::<Player>()
                .property("id", |p: &Player| p.id.clone(), |p: &mut Player, v| p.id = v)
                .property("name", |p: &Player| p.name.clone(), |p: &mut Player, v| p.name = v)
                .build()
        })
        .clone()
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct Team {
    pub name: String,
    pub captain: Option<Rc<RefCell<Player>>>,
    pub roster: Vec<Rc<RefCell<Player>>>,
}

impl Model for Team {
    fn model_type() -> ModelType {
        static TYPE: OnceLock<ModelType> = OnceLock::new();
        TYPE.get_or_init(|| {
            ModelType::of::<Team>()
                .property("name", |t: &Team| t.name.clone(), |t: &mut Team, v| t.name = v)
                .property("captain", |t: &Team| t.captain.clone(), |t: &mut Team, v| t.captain = v)
                .property("roster", |t: &Team| t.roster.clone(), |t: &mut Team, v| t.roster = v)
                .build()
        })
        .clone()
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct League {
    pub teams: Vec<Rc<RefCell<Team>>>,
    pub players: Vec<Rc<RefCell<Player>>>,
}

impl Model for League {
    fn model_type() -> ModelType {
        static TYPE: OnceLock<ModelType> = OnceLock::new();
        TYPE.get_or_init(|| {
            ModelType::of::<League>()
                .property("teams", |l: &League| l.teams.clone(), |l: &mut League, v| l.teams = v)
                .property("players", |l: &League| l.players.clone(), |l: &mut League, v| l.players = v)
                .build()
        })
        .clone()
    }
}

pub fn player(id: &str, name: &str) -> Rc<RefCell<Player>> {
    Rc::new(RefCell::new(Player {
        id: id.to_string(),
        name: name.to_string(),
    }))
}

/// Teams come first, so their references point forward to the players.
pub fn league_template() -> ViewTemplate {
    ViewTemplate::new(
        Node::root(League::model_type())
            .child(
                Node::array_of_objects("teams", Team::model_type())
                    .child(Node::value("name"))
                    .child(Node::reference("captain", Player::model_type()).child(Node::value("id")))
                    .child(
                        Node::array_of_references("roster", Player::model_type())
                            .child(Node::value("id")),
                    ),
            )
            .child(
                Node::array_of_objects("players", Player::model_type())
                    .child(Node::value("id"))
                    .child(Node::value("name")),
            ),
    )
    .unwrap()
}

// ============ Listeners ============

/// Records every hook it receives as a short line.
#[derive(Default)]
pub struct Recorder {
    pub lines: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.lines().iter().filter(|line| line.starts_with(prefix)).count()
    }

    fn push(&self, line: String) {
        self.lines.lock().unwrap().push(line);
    }
}

fn label(node: &Node) -> String {
    node.name().unwrap_or("<root>").to_string()
}

impl ViewListener for Recorder {
    fn before_visit(&self, event: &NodeEvent<'_>) -> Visit {
        self.push(format!("before {}", label(event.node)));
        Visit::Continue
    }

    fn after_visit(&self, event: &NodeEvent<'_>) {
        self.push(format!("after {}", label(event.node)));
    }

    fn will_inject_value(&self, event: &PropertyEvent<'_>, value: Value) -> Value {
        self.push(format!("inject {} = {value}", label(event.node)));
        value
    }

    fn property_visited(&self, event: &PropertyEvent<'_>, value: &Value) {
        self.push(format!("visited {} = {value}", label(event.node)));
    }

    fn entity_created(&self, event: &PropertyEvent<'_>, entity: &ModelRef) {
        self.push(format!("created {} {}", label(event.node), entity.model_type()));
    }

    fn entity_discarded(&self, event: &PropertyEvent<'_>, entity: &ModelRef) {
        self.push(format!("discarded {} {}", label(event.node), entity.model_type()));
    }
}

pub fn recorder() -> Arc<Recorder> {
    Arc::new(Recorder::default())
}
