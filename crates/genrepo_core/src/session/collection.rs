//! Session-scoped typed collection handle.

use super::Session;
use crate::db::DbResult;
use crate::entity::{Entity, EntityState};
use crate::query::Query;
use std::marker::PhantomData;

/// View over all persisted `E` in one session. Borrowing the session keeps
/// the handle from outliving it.
pub struct CollectionHandle<'s, S, E> {
    session: &'s mut S,
    _entity: PhantomData<fn() -> E>,
}

impl<'s, S: Session, E: Entity> CollectionHandle<'s, S, E> {
    pub(crate) fn new(session: &'s mut S) -> Self {
        Self {
            session,
            _entity: PhantomData,
        }
    }

    /// Starting point of every composed query: the whole collection.
    pub fn query(&self) -> Query<E> {
        Query::all()
    }

    pub fn find(&mut self, key: &E::Key) -> DbResult<Option<E>> {
        self.session.find::<E>(key)
    }

    pub async fn find_async(&mut self, key: &E::Key) -> DbResult<Option<E>> {
        self.session.find_async::<E>(key).await
    }

    pub fn state_of(&self, entity: &E) -> EntityState {
        self.session.state_of(entity)
    }

    pub fn attach(&mut self, entity: &E) -> DbResult<()> {
        self.session.attach(entity)
    }

    pub fn add(&mut self, entity: &E) -> DbResult<()> {
        self.session.add(entity)
    }

    pub fn remove(&mut self, entity: &E) -> DbResult<()> {
        self.session.remove(entity)
    }

    pub fn set_state(&mut self, entity: &E, state: EntityState) -> DbResult<()> {
        self.session.set_state(entity, state)
    }

    pub fn to_vec(&mut self, query: &Query<E>) -> DbResult<Vec<E>> {
        self.session.to_sequence(query)
    }

    pub async fn to_vec_async(&mut self, query: &Query<E>) -> DbResult<Vec<E>> {
        self.session.to_sequence_async(query).await
    }
}
