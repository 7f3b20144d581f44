//! Fatal errors
//!
//! Each variant carries the location it is reported at and renders as
//! `<location>: lobster error: <message>`, the same text the fatal
//! [`Diagnostic`](crate::Diagnostic) recorded for it renders as.

use crate::item::ItemError;
use crate::location::Location;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Unrecognized input in a policy file.
    #[error("{location}: lobster error: {message}")]
    Lex { location: Location, message: String },

    /// Unexpected token in a policy file.
    #[error("{location}: lobster error: {message}")]
    Syntax { location: Location, message: String },

    /// Well-formed policy that does not make sense (duplicate level,
    /// misplaced property, unknown trace target, ...).
    #[error("{location}: lobster error: {message}")]
    Semantic { location: Location, message: String },

    /// A persisted report or interchange file with the wrong shape or an
    /// unsupported schema.
    #[error("{location}: lobster error: {message}")]
    Schema { location: Location, message: String },

    /// An item inside an otherwise valid file could not be reconstructed.
    #[error("{location}: lobster error: malformed data")]
    Malformed {
        location: Location,
        #[source]
        source: ItemError,
    },

    #[error("{location}: lobster error: {source}")]
    Io {
        location: Location,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn location(&self) -> &Location {
        match self {
            Error::Lex { location, .. }
            | Error::Syntax { location, .. }
            | Error::Semantic { location, .. }
            | Error::Schema { location, .. }
            | Error::Malformed { location, .. }
            | Error::Io { location, .. } => location,
        }
    }

    /// The message without the location prefix.
    pub fn message(&self) -> String {
        match self {
            Error::Lex { message, .. }
            | Error::Syntax { message, .. }
            | Error::Semantic { message, .. }
            | Error::Schema { message, .. } => message.clone(),
            Error::Malformed { .. } => "malformed data".to_string(),
            Error::Io { source, .. } => source.to_string(),
        }
    }

    pub(crate) fn schema(location: &Location, message: impl Into<String>) -> Self {
        Error::Schema {
            location: location.clone(),
            message: message.into(),
        }
    }

    pub(crate) fn semantic(location: &Location, message: impl Into<String>) -> Self {
        Error::Semantic {
            location: location.clone(),
            message: message.into(),
        }
    }
}
