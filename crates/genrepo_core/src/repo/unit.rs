//! Single-session building blocks shared by both repository strategies.
//!
//! Each function performs one complete unit of work on the session it is
//! given: stage the change, commit, report.

use super::{RepoError, RepoResult};
use crate::entity::{Entity, EntityKey, EntityState};
use crate::session::{Commit, Session};

fn adopt_generated_key<E: Entity>(entity: &mut E, commit: &Commit) {
    if entity.key().is_some() {
        return;
    }
    let generated = commit
        .generated_key(E::TABLE)
        .and_then(<E::Key as EntityKey>::from_generated);
    if let Some(key) = generated {
        entity.set_key(key);
    }
}

fn stage_update<S: Session, E: Entity>(session: &mut S, entity: &E) -> RepoResult<()> {
    let mut items = session.collection::<E>();
    if items.state_of(entity) == EntityState::Unattached {
        items.attach(entity)?;
    }
    items.set_state(entity, EntityState::Modified)?;
    Ok(())
}

fn stage_delete<S: Session, E: Entity>(session: &mut S, entity: &E) -> RepoResult<()> {
    let mut items = session.collection::<E>();
    if items.state_of(entity) == EntityState::Unattached {
        items.attach(entity)?;
    }
    items.remove(entity)?;
    Ok(())
}

pub(crate) fn insert<S: Session, E: Entity>(session: &mut S, mut entity: E) -> RepoResult<E> {
    session.collection::<E>().add(&entity)?;
    let commit = session.commit().map_err(RepoError::Commit)?;
    adopt_generated_key(&mut entity, &commit);
    Ok(entity)
}

pub(crate) async fn insert_async<S: Session, E: Entity>(
    session: &mut S,
    mut entity: E,
) -> RepoResult<E> {
    session.collection::<E>().add(&entity)?;
    let commit = session.commit_async().await.map_err(RepoError::Commit)?;
    adopt_generated_key(&mut entity, &commit);
    Ok(entity)
}

pub(crate) fn update<S: Session, E: Entity>(session: &mut S, entity: E) -> RepoResult<E> {
    stage_update(session, &entity)?;
    session.commit().map_err(RepoError::Commit)?;
    Ok(entity)
}

pub(crate) async fn update_async<S: Session, E: Entity>(
    session: &mut S,
    entity: E,
) -> RepoResult<E> {
    stage_update(session, &entity)?;
    session.commit_async().await.map_err(RepoError::Commit)?;
    Ok(entity)
}

pub(crate) fn delete<S: Session, E: Entity>(session: &mut S, entity: &E) -> RepoResult<bool> {
    stage_delete(session, entity)?;
    let commit = session.commit().map_err(RepoError::Commit)?;
    Ok(commit.rows_affected >= 1)
}

pub(crate) async fn delete_async<S: Session, E: Entity>(
    session: &mut S,
    entity: &E,
) -> RepoResult<bool> {
    stage_delete(session, entity)?;
    let commit = session.commit_async().await.map_err(RepoError::Commit)?;
    Ok(commit.rows_affected >= 1)
}

/// Unwraps a key lookup for chaining into delete.
pub(crate) fn require_entity<E: Entity>(found: Option<E>) -> RepoResult<E> {
    found.ok_or(RepoError::NullEntity { entity: E::TABLE })
}
