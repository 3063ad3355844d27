//! Error types for template construction, view generation and view application.
//!
//! Every failure the engine can report is a variant of [`Error`]. Failures are
//! grouped by phase:
//!
//! - template build: [`UnknownProperty`](Error::UnknownProperty),
//!   [`UnsupportedValueType`](Error::UnsupportedValueType),
//!   [`UnresolvableSubtype`](Error::UnresolvableSubtype),
//!   [`InvalidTemplate`](Error::InvalidTemplate)
//! - structural, while reading a view: [`UnexpectedEvent`](Error::UnexpectedEvent),
//!   [`UnexpectedEnd`](Error::UnexpectedEnd), [`TrailingEvents`](Error::TrailingEvents),
//!   [`UnknownDiscriminator`](Error::UnknownDiscriminator),
//!   [`MissingDiscriminator`](Error::MissingDiscriminator)
//! - model access: [`ModelAccess`](Error::ModelAccess), [`TypeMismatch`](Error::TypeMismatch),
//!   [`ModelBorrowed`](Error::ModelBorrowed), [`NoFactory`](Error::NoFactory)
//! - reconciliation: [`UnresolvedReference`](Error::UnresolvedReference),
//!   [`NullKey`](Error::NullKey)
//!
//! # Example
//!
//! ```
//! use prospect::{Error, Result};
//!
//! fn describe(result: Result<()>) -> &'static str {
//!     match result {
//!         Ok(()) => "ok",
//!         Err(Error::UnexpectedEnd { .. }) => "truncated view",
//!         Err(Error::UnresolvedReference { .. }) => "dangling reference",
//!         Err(_) => "other failure",
//!     }
//! }
//!
//! assert_eq!(describe(Ok(())), "ok");
//! ```

use std::fmt::Display;

use thiserror::Error as ThisError;

/// Alias for a `Result` with the error type [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// All failures surfaced by template building, generation and application.
///
/// Path fields render the logical position inside the view (for example
/// `/pets/name`) at which the failure was detected.
#[derive(Debug, ThisError)]
pub enum Error {
    /// A failure reported by a converter, listener, handler or resolver.
    #[error("{0}")]
    Message(String),

    /// A template node names a property the model type does not declare.
    #[error("model type `{model}` has no property named `{property}`")]
    UnknownProperty { model: String, property: String },

    /// A value node is bound to a property whose value kind no configured
    /// converter supports.
    #[error("node `{node}`: no converter supports values of kind {kind}")]
    UnsupportedValueType { node: String, kind: String },

    /// A subtype mapping is ambiguous, or a runtime type matches no declared
    /// variant.
    #[error("node `{node}`: {detail}")]
    UnresolvableSubtype { node: String, detail: String },

    /// The template tree is malformed.
    #[error("invalid template: {0}")]
    InvalidTemplate(String),

    /// The view contains an event the template does not allow at this position.
    #[error("at {path}: expected {expected}, found {found}")]
    UnexpectedEvent {
        path: String,
        expected: String,
        found: String,
    },

    /// The view ended before every structure was closed.
    #[error("at {path}: view ended unexpectedly")]
    UnexpectedEnd { path: String },

    /// Events remain after the root structure was closed.
    ///
    /// A view describes exactly one root structure. The count of remaining
    /// events is reported.
    #[error("{0} events remain after the root structure")]
    TrailingEvents(usize),

    /// A polymorphic object names a variant its node does not declare.
    #[error("at {path}: discriminator `{tag}` does not name a known subtype")]
    UnknownDiscriminator { path: String, tag: String },

    /// A polymorphic object does not start with its discriminator.
    #[error("at {path}: polymorphic object is missing its `{discriminator}` discriminator")]
    MissingDiscriminator { path: String, discriminator: String },

    /// The requested data key is not a direct child of the view root.
    #[error("view has no object under key `{0}`")]
    DataKeyNotFound(String),

    /// Reading or writing a model property failed.
    #[error("property `{property}`: {source}")]
    ModelAccess {
        property: String,
        #[source]
        source: Box<Error>,
    },

    /// A value does not have the kind the receiving side requires.
    #[error("expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// A model instance is already mutably borrowed elsewhere.
    #[error("model instance of type `{0}` is already borrowed")]
    ModelBorrowed(String),

    /// The engine needs to instantiate a type that has no factory.
    #[error("model type `{0}` cannot be instantiated")]
    NoFactory(String),

    /// A map key converted to the null value.
    #[error("at {path}: map key cannot be null")]
    NullKey { path: String },

    /// A reference names no instance known to the pass or to any resolver.
    #[error("at {path}: no `{model}` instance matches the reference")]
    UnresolvedReference { model: String, path: String },
}

impl Error {
    /// Creates an [`Error::Message`] from anything displayable.
    #[inline]
    pub fn custom<T: Display>(msg: T) -> Self {
        Error::Message(msg.to_string())
    }

    #[inline]
    pub(crate) fn mismatch(expected: impl Display, found: impl Display) -> Self {
        Error::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Wraps `self` as a failure of the named property.
    pub(crate) fn in_property(self, property: &str) -> Self {
        match self {
            already @ Error::ModelAccess { .. } => already,
            source => Error::ModelAccess {
                property: property.to_string(),
                source: Box::new(source),
            },
        }
    }
}
