//! Generic repository contract and its two session strategies.
//!
//! # Responsibility
//! - Expose uniform CRUD and query operations for any `Entity`.
//! - Keep session acquisition a property of the implementation, never of
//!   the caller.
//!
//! # Invariants
//! - Every mutating call is its own unit of work and commits immediately.
//! - Query faults are absorbed into empty results; lookup, attach and
//!   commit faults are returned to the caller unchanged and never retried.
//! - `delete_by_key` on an absent key is a `NullEntity` fault, not `false`.

use crate::db::DbError;
use crate::entity::{Entity, Relation};
use crate::query::QuerySpec;
use async_trait::async_trait;
use log::{debug, error};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub mod factory;
pub mod shared;
mod unit;

pub use factory::FactoryRepository;
pub use shared::SharedContextRepository;

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    /// Lookup, attachment or session acquisition failed.
    Db(DbError),
    /// The provider rejected a commit.
    Commit(DbError),
    /// An operation that needs an entity received none.
    NullEntity { entity: &'static str },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Commit(err) => write!(f, "commit failed: {err}"),
            Self::NullEntity { entity } => {
                write!(f, "no {entity} entity to operate on (null entity)")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) | Self::Commit(err) => Some(err),
            Self::NullEntity { .. } => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

/// CRUD and query operations over one entity type.
///
/// Every operation has a blocking and an awaitable form with the same
/// semantics.
#[async_trait]
pub trait Repository<E: Entity>: Send {
    fn get(&mut self, id: &E::Key) -> RepoResult<Option<E>>;
    fn get_all(&mut self, includes: Vec<Relation<E>>) -> Vec<E>;
    /// Filtered, ordered query with eager includes.
    fn find(&mut self, spec: QuerySpec<E>) -> Vec<E>;
    /// Persists a new entity and returns it with any generated key.
    fn insert(&mut self, entity: E) -> RepoResult<E>;
    /// Overwrites the stored row; last write wins.
    fn update(&mut self, entity: E) -> RepoResult<E>;
    /// Returns whether at least one row was removed.
    fn delete(&mut self, entity: E) -> RepoResult<bool>;
    fn delete_by_key(&mut self, id: &E::Key) -> RepoResult<bool>;

    async fn get_async(&mut self, id: &E::Key) -> RepoResult<Option<E>>;
    async fn get_all_async(&mut self, includes: Vec<Relation<E>>) -> Vec<E>;
    async fn find_async(&mut self, spec: QuerySpec<E>) -> Vec<E>;
    async fn insert_async(&mut self, entity: E) -> RepoResult<E>;
    async fn update_async(&mut self, entity: E) -> RepoResult<E>;
    async fn delete_async(&mut self, entity: E) -> RepoResult<bool>;
    async fn delete_by_key_async(&mut self, id: &E::Key) -> RepoResult<bool>;
}

/// Emits one `repo_<operation>` event for a finished mutating call.
pub(crate) fn log_outcome<E: Entity, T>(
    operation: &str,
    strategy: &str,
    started_at: Instant,
    result: &RepoResult<T>,
) {
    match result {
        Ok(_) => debug!(
            "event=repo_{} module=repo status=ok strategy={} entity={} duration_ms={}",
            operation,
            strategy,
            E::TABLE,
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=repo_{} module=repo status=error strategy={} entity={} duration_ms={} error={}",
            operation,
            strategy,
            E::TABLE,
            started_at.elapsed().as_millis(),
            err
        ),
    }
}
