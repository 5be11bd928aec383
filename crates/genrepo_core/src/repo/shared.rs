//! Repository bound to one long-lived session.
//!
//! # Invariants
//! - Every operation reuses the session given at construction; tracked
//!   entities persist across calls.
//! - `&mut self` receivers allow one logical caller at a time. Callers that
//!   need concurrency use `FactoryRepository` instead of sharing this type
//!   behind a lock.
//! - A failed write discards every pending change in the shared session;
//!   later operations start from what the database holds.
//! - Loaded entities stay tracked until the session is dropped or
//!   [`SqliteSession::clear_tracked`](crate::SqliteSession::clear_tracked)
//!   is called through [`SharedContextRepository::session_mut`].

use super::{log_outcome, unit, RepoResult, Repository};
use crate::entity::{Entity, Relation};
use crate::query::{compose, materialize, materialize_async, QuerySpec};
use crate::session::Session;
use async_trait::async_trait;
use std::marker::PhantomData;
use std::time::Instant;

const STRATEGY: &str = "shared";

pub struct SharedContextRepository<S, E> {
    session: S,
    _entity: PhantomData<fn() -> E>,
}

impl<S: Session, E: Entity> SharedContextRepository<S, E> {
    pub fn new(session: S) -> Self {
        Self {
            session,
            _entity: PhantomData,
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    pub fn into_session(self) -> S {
        self.session
    }
}

#[async_trait]
impl<S: Session, E: Entity> Repository<E> for SharedContextRepository<S, E> {
    fn get(&mut self, id: &E::Key) -> RepoResult<Option<E>> {
        Ok(self.session.collection::<E>().find(id)?)
    }

    fn get_all(&mut self, includes: Vec<Relation<E>>) -> Vec<E> {
        self.find(QuerySpec::new().includes(includes))
    }

    fn find(&mut self, spec: QuerySpec<E>) -> Vec<E> {
        let mut items = self.session.collection::<E>();
        let query = compose(&items, spec);
        materialize(&mut items, &query)
    }

    fn insert(&mut self, entity: E) -> RepoResult<E> {
        let started_at = Instant::now();
        let result = unit::insert(&mut self.session, entity);
        log_outcome::<E, _>("insert", STRATEGY, started_at, &result);
        result
    }

    fn update(&mut self, entity: E) -> RepoResult<E> {
        let started_at = Instant::now();
        let result = unit::update(&mut self.session, entity);
        log_outcome::<E, _>("update", STRATEGY, started_at, &result);
        result
    }

    fn delete(&mut self, entity: E) -> RepoResult<bool> {
        let started_at = Instant::now();
        let result = unit::delete(&mut self.session, &entity);
        log_outcome::<E, _>("delete", STRATEGY, started_at, &result);
        result
    }

    fn delete_by_key(&mut self, id: &E::Key) -> RepoResult<bool> {
        let found = self.get(id)?;
        self.delete(unit::require_entity(found)?)
    }

    async fn get_async(&mut self, id: &E::Key) -> RepoResult<Option<E>> {
        Ok(self.session.collection::<E>().find_async(id).await?)
    }

    async fn get_all_async(&mut self, includes: Vec<Relation<E>>) -> Vec<E> {
        self.find_async(QuerySpec::new().includes(includes)).await
    }

    async fn find_async(&mut self, spec: QuerySpec<E>) -> Vec<E> {
        let mut items = self.session.collection::<E>();
        let query = compose(&items, spec);
        materialize_async(&mut items, &query).await
    }

    async fn insert_async(&mut self, entity: E) -> RepoResult<E> {
        let started_at = Instant::now();
        let result = unit::insert_async(&mut self.session, entity).await;
        log_outcome::<E, _>("insert", STRATEGY, started_at, &result);
        result
    }

    async fn update_async(&mut self, entity: E) -> RepoResult<E> {
        let started_at = Instant::now();
        let result = unit::update_async(&mut self.session, entity).await;
        log_outcome::<E, _>("update", STRATEGY, started_at, &result);
        result
    }

    async fn delete_async(&mut self, entity: E) -> RepoResult<bool> {
        let started_at = Instant::now();
        let result = unit::delete_async(&mut self.session, &entity).await;
        log_outcome::<E, _>("delete", STRATEGY, started_at, &result);
        result
    }

    async fn delete_by_key_async(&mut self, id: &E::Key) -> RepoResult<bool> {
        let found = self.get_async(id).await?;
        self.delete_async(unit::require_entity(found)?).await
    }
}
