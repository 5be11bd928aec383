//! SQLite persistence provider plumbing.
//!
//! # Responsibility
//! - Open and configure SQLite connections from `StoreConfig`.
//! - Render composed queries and pending writes into parameterized SQL.
//! - Define the provider error type shared by sessions and repositories.
//!
//! # Invariants
//! - Identifiers are validated before they reach SQL text; values are
//!   always bound as parameters.
//! - Schema management stays with the caller; this layer never issues DDL.

use crate::entity::{KeyValue, MappingError};
use std::error::Error;
use std::fmt::{Display, Formatter};

mod open;
pub(crate) mod sql;

pub use open::open_connection;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// A table or column name that is not a plain SQL identifier.
    InvalidIdentifier(String),
    Mapping(MappingError),
    /// The operation needs a primary key and the entity has none.
    KeyNotSet {
        entity: &'static str,
    },
    /// A state transition was requested for an entity the session does not track.
    Detached {
        entity: &'static str,
    },
    /// Another instance with the same key is already tracked by the session.
    AlreadyTracked {
        entity: &'static str,
        key: KeyValue,
    },
    /// The session lost its connection (an awaitable operation was cancelled
    /// or its worker panicked).
    SessionUnavailable,
    /// The blocking worker running an awaitable operation failed.
    Background(String),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::InvalidIdentifier(name) => write!(f, "invalid sql identifier `{name}`"),
            Self::Mapping(err) => write!(f, "{err}"),
            Self::KeyNotSet { entity } => write!(f, "{entity} entity has no primary key set"),
            Self::Detached { entity } => {
                write!(f, "{entity} entity is not attached to this session")
            }
            Self::AlreadyTracked { entity, key } => {
                write!(f, "{entity} entity with key {key} is already tracked")
            }
            Self::SessionUnavailable => write!(f, "session connection is no longer available"),
            Self::Background(message) => write!(f, "background database task failed: {message}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Mapping(err) => Some(err),
            Self::InvalidIdentifier(_)
            | Self::KeyNotSet { .. }
            | Self::Detached { .. }
            | Self::AlreadyTracked { .. }
            | Self::SessionUnavailable
            | Self::Background(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<MappingError> for DbError {
    fn from(value: MappingError) -> Self {
        Self::Mapping(value)
    }
}
