//! Unit-of-work sessions over the persistence provider.
//!
//! # Responsibility
//! - Define the provider contract repositories are written against.
//! - Provide the SQLite-backed session and session factory.
//!
//! # Invariants
//! - A session is used by one operation at a time (`&mut self` receivers).
//! - Dropping a session releases its connection and forgets tracked state.
//! - Awaitable operations suspend only while the provider performs I/O.

use crate::db::DbResult;
use crate::entity::{Entity, EntityState};
use crate::query::Query;
use async_trait::async_trait;

mod collection;
pub mod sqlite;
pub(crate) mod tracker;

pub use collection::CollectionHandle;
pub use sqlite::{SqliteSession, SqliteSessionFactory};

/// Provider-generated row id for one inserted entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratedKey {
    pub table: &'static str,
    pub row_id: i64,
}

/// Result of flushing pending changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Commit {
    pub rows_affected: usize,
    pub generated: Vec<GeneratedKey>,
}

impl Commit {
    /// Most recent row id generated for `table` in this commit.
    pub fn generated_key(&self, table: &str) -> Option<i64> {
        self.generated
            .iter()
            .rev()
            .find(|generated| generated.table == table)
            .map(|generated| generated.row_id)
    }
}

/// One unit of work against the persistence provider.
#[async_trait]
pub trait Session: Send {
    /// Keyed lookup. Errors are propagated, absence is `Ok(None)`.
    fn find<E: Entity>(&mut self, key: &E::Key) -> DbResult<Option<E>>;
    async fn find_async<E: Entity>(&mut self, key: &E::Key) -> DbResult<Option<E>>;

    fn state_of<E: Entity>(&self, entity: &E) -> EntityState;
    fn attach<E: Entity>(&mut self, entity: &E) -> DbResult<()>;
    fn add<E: Entity>(&mut self, entity: &E) -> DbResult<()>;
    fn remove<E: Entity>(&mut self, entity: &E) -> DbResult<()>;
    fn set_state<E: Entity>(&mut self, entity: &E, state: EntityState) -> DbResult<()>;

    /// Flushes every pending change in one transaction.
    fn commit(&mut self) -> DbResult<Commit>;
    async fn commit_async(&mut self) -> DbResult<Commit>;

    fn to_sequence<E: Entity>(&mut self, query: &Query<E>) -> DbResult<Vec<E>>;
    async fn to_sequence_async<E: Entity>(&mut self, query: &Query<E>) -> DbResult<Vec<E>>;

    /// Typed view over all persisted `E` within this session.
    fn collection<E: Entity>(&mut self) -> CollectionHandle<'_, Self, E>
    where
        Self: Sized,
    {
        CollectionHandle::new(self)
    }
}

/// Produces independent sessions; shared by concurrent callers.
pub trait SessionFactory: Send + Sync {
    type Session: Session;

    fn create_session(&self) -> DbResult<Self::Session>;
}
