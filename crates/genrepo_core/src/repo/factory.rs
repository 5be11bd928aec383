//! Repository that acquires a fresh session for every operation.
//!
//! # Invariants
//! - Each call owns its session and releases it before returning, whether
//!   the call succeeds or fails.
//! - No tracked state survives between calls; entities passed to `update`
//!   and `delete` are attached to the new session first.
//! - Clones share the factory, so concurrent callers each hold their own
//!   clone.

use super::{log_outcome, unit, RepoResult, Repository};
use crate::entity::{Entity, Relation};
use crate::query::composer::absorb;
use crate::query::{compose, materialize, materialize_async, QuerySpec};
use crate::session::{Session, SessionFactory};
use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

const STRATEGY: &str = "factory";

pub struct FactoryRepository<F, E> {
    factory: Arc<F>,
    _entity: PhantomData<fn() -> E>,
}

impl<F, E> Clone for FactoryRepository<F, E> {
    fn clone(&self) -> Self {
        Self {
            factory: Arc::clone(&self.factory),
            _entity: PhantomData,
        }
    }
}

impl<F: SessionFactory, E: Entity> FactoryRepository<F, E> {
    pub fn new(factory: F) -> Self {
        Self::from_shared(Arc::new(factory))
    }

    /// Builds a repository over a factory already shared with other repositories.
    pub fn from_shared(factory: Arc<F>) -> Self {
        Self {
            factory,
            _entity: PhantomData,
        }
    }

    pub fn factory(&self) -> &Arc<F> {
        &self.factory
    }

    fn acquire(&self) -> RepoResult<F::Session> {
        Ok(self.factory.create_session()?)
    }
}

#[async_trait]
impl<F: SessionFactory, E: Entity> Repository<E> for FactoryRepository<F, E> {
    fn get(&mut self, id: &E::Key) -> RepoResult<Option<E>> {
        let mut session = self.acquire()?;
        let found = session.collection::<E>().find(id)?;
        Ok(found)
    }

    fn get_all(&mut self, includes: Vec<Relation<E>>) -> Vec<E> {
        self.find(QuerySpec::new().includes(includes))
    }

    fn find(&mut self, spec: QuerySpec<E>) -> Vec<E> {
        let started_at = Instant::now();
        let mut session = match self.factory.create_session() {
            Ok(session) => session,
            Err(err) => return absorb::<E>(&err, started_at),
        };
        let mut items = session.collection::<E>();
        let query = compose(&items, spec);
        materialize(&mut items, &query)
    }

    fn insert(&mut self, entity: E) -> RepoResult<E> {
        let started_at = Instant::now();
        let result = self
            .acquire()
            .and_then(|mut session| unit::insert(&mut session, entity));
        log_outcome::<E, _>("insert", STRATEGY, started_at, &result);
        result
    }

    fn update(&mut self, entity: E) -> RepoResult<E> {
        let started_at = Instant::now();
        let result = self
            .acquire()
            .and_then(|mut session| unit::update(&mut session, entity));
        log_outcome::<E, _>("update", STRATEGY, started_at, &result);
        result
    }

    fn delete(&mut self, entity: E) -> RepoResult<bool> {
        let started_at = Instant::now();
        let result = self
            .acquire()
            .and_then(|mut session| unit::delete(&mut session, &entity));
        log_outcome::<E, _>("delete", STRATEGY, started_at, &result);
        result
    }

    fn delete_by_key(&mut self, id: &E::Key) -> RepoResult<bool> {
        let found = self.get(id)?;
        self.delete(unit::require_entity(found)?)
    }

    async fn get_async(&mut self, id: &E::Key) -> RepoResult<Option<E>> {
        let mut session = self.acquire()?;
        let found = session.collection::<E>().find_async(id).await?;
        Ok(found)
    }

    async fn get_all_async(&mut self, includes: Vec<Relation<E>>) -> Vec<E> {
        self.find_async(QuerySpec::new().includes(includes)).await
    }

    async fn find_async(&mut self, spec: QuerySpec<E>) -> Vec<E> {
        let started_at = Instant::now();
        let mut session = match self.factory.create_session() {
            Ok(session) => session,
            Err(err) => return absorb::<E>(&err, started_at),
        };
        let mut items = session.collection::<E>();
        let query = compose(&items, spec);
        materialize_async(&mut items, &query).await
    }

    async fn insert_async(&mut self, entity: E) -> RepoResult<E> {
        let started_at = Instant::now();
        let result = match self.acquire() {
            Ok(mut session) => unit::insert_async(&mut session, entity).await,
            Err(err) => Err(err),
        };
        log_outcome::<E, _>("insert", STRATEGY, started_at, &result);
        result
    }

    async fn update_async(&mut self, entity: E) -> RepoResult<E> {
        let started_at = Instant::now();
        let result = match self.acquire() {
            Ok(mut session) => unit::update_async(&mut session, entity).await,
            Err(err) => Err(err),
        };
        log_outcome::<E, _>("update", STRATEGY, started_at, &result);
        result
    }

    async fn delete_async(&mut self, entity: E) -> RepoResult<bool> {
        let started_at = Instant::now();
        let result = match self.acquire() {
            Ok(mut session) => unit::delete_async(&mut session, &entity).await,
            Err(err) => Err(err),
        };
        log_outcome::<E, _>("delete", STRATEGY, started_at, &result);
        result
    }

    async fn delete_by_key_async(&mut self, id: &E::Key) -> RepoResult<bool> {
        let found = self.get_async(id).await?;
        self.delete_async(unit::require_entity(found)?).await
    }
}

impl<F, E> std::fmt::Debug for FactoryRepository<F, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactoryRepository")
            .field("entity", &std::any::type_name::<E>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DbError, DbResult};
    use crate::repo::RepoError;
    use crate::session::SqliteSession;

    struct Unavailable;

    impl SessionFactory for Unavailable {
        type Session = SqliteSession;

        fn create_session(&self) -> DbResult<SqliteSession> {
            Err(DbError::SessionUnavailable)
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Tag {
        id: Option<i64>,
        label: String,
    }

    impl Entity for Tag {
        type Key = i64;
        const TABLE: &'static str = "tags";
        const PRIMARY_KEY: &'static str = "id";
        const COLUMNS: &'static [&'static str] = &["label"];

        fn key(&self) -> Option<i64> {
            self.id
        }

        fn set_key(&mut self, key: i64) {
            self.id = Some(key);
        }

        fn to_record(&self) -> crate::entity::Record {
            crate::entity::Record::new()
                .with("id", self.id)
                .with("label", self.label.as_str())
        }

        fn from_record(
            record: &crate::entity::Record,
        ) -> Result<Self, crate::entity::MappingError> {
            Ok(Self {
                id: record.opt_integer("id")?,
                label: record.text("label")?,
            })
        }
    }

    #[test]
    fn session_acquisition_failure_is_absorbed_by_queries() {
        let mut repo = FactoryRepository::<_, Tag>::new(Unavailable);
        assert!(repo.find(QuerySpec::new()).is_empty());
        assert!(repo.get_all(Vec::new()).is_empty());
    }

    #[test]
    fn session_acquisition_failure_is_returned_by_writes() {
        let mut repo = FactoryRepository::<_, Tag>::new(Unavailable);
        let tag = Tag {
            id: None,
            label: "rust".to_string(),
        };
        assert!(matches!(
            repo.insert(tag),
            Err(RepoError::Db(DbError::SessionUnavailable))
        ));
        assert!(matches!(
            repo.get(&1),
            Err(RepoError::Db(DbError::SessionUnavailable))
        ));
    }

    #[test]
    fn clones_share_the_factory() {
        let repo = FactoryRepository::<_, Tag>::new(Unavailable);
        let clone = repo.clone();
        assert!(Arc::ptr_eq(repo.factory(), clone.factory()));
    }
}
