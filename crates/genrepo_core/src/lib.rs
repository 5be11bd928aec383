//! Generic repository over a relational persistence provider.
//!
//! Entities describe their table mapping through [`Entity`]; repositories
//! expose uniform CRUD and composed queries for any such type, either over
//! one long-lived session ([`SharedContextRepository`]) or one fresh session
//! per call ([`FactoryRepository`]).

pub mod config;
pub mod db;
pub mod entity;
pub mod logging;
pub mod query;
pub mod repo;
pub mod session;

pub use config::{JournalMode, LogSettings, StoreConfig};
pub use db::{open_connection, DbError, DbResult};
pub use entity::{
    Entity, EntityKey, EntityMeta, EntityState, KeyValue, MappingError, Record, Relation, Value,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use query::{Column, Filter, OrderedQuery, Query, QuerySpec};
pub use repo::{FactoryRepository, RepoError, RepoResult, Repository, SharedContextRepository};
pub use session::{
    CollectionHandle, Commit, Session, SessionFactory, SqliteSession, SqliteSessionFactory,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
