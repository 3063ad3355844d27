//! Declarative, bidirectional mapping between object models and hierarchical
//! view event streams.
//!
//! A [`ViewTemplate`] is a tree of [`Node`]s describing which properties of a
//! model graph appear in a view and how. The same template both generates a
//! [`View`] from a model and applies a view back onto models, creating,
//! updating and discarding instances as needed.
//!
//! # Example
//!
//! ```
//! use std::sync::OnceLock;
//! use prospect::{Event, Model, ModelRef, ModelType, Node, ViewContext, ViewTemplate};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Book {
//!     title: String,
//!     pages: i64,
//! }
//!
//! impl Model for Book {
//!     fn model_type() -> ModelType {
//!         static TYPE: OnceLock<ModelType> = OnceLock::new();
//!         TYPE.get_or_init(|| {
//!             ModelType::of::<Book>()
//!                 .property("title", |b: &Book| b.title.clone(), |b: &mut Book, v| b.title = v)
//!                 .property("pages", |b: &Book| b.pages, |b: &mut Book, v| b.pages = v)
//!                 .build()
//!         })
//!         .clone()
//!     }
//! }
//!
//! let template = ViewTemplate::new(
//!     Node::root(Book::model_type())
//!         .child(Node::value("title"))
//!         .child(Node::value("pages")),
//! )
//! .unwrap();
//! let ctx = ViewContext::new();
//!
//! let book = ModelRef::new(Book { title: "Dune".into(), pages: 412 });
//! let view = template.generate_view(&book, &ctx).unwrap();
//! assert_eq!(view.events()[1], Event::value(Some("title"), "Dune"));
//!
//! let copy = template.create_applicator(&view, &ctx).unwrap().create().unwrap();
//! assert_eq!(copy, book);
//! ```

mod accessor;
mod apply;
mod association;
mod context;
mod converter;
mod error;
mod event;
mod generate;
mod listener;
mod meta;
mod model;
mod node;
mod reference;
#[cfg(feature = "serde")]
mod serde_impl;
mod template;
mod value;
mod writer;

pub use accessor::*;
pub use apply::*;
pub use association::*;
pub use context::*;
pub use converter::*;
pub use error::*;
pub use event::*;
pub use listener::*;
pub use meta::*;
pub use model::*;
pub use node::*;
pub use reference::*;
#[cfg(feature = "serde")]
pub use serde_impl::*;
pub use template::*;
pub use value::*;
pub use writer::*;
