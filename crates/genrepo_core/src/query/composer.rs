//! Query composition and materialization.
//!
//! # Responsibility
//! - Turn a `QuerySpec` into one `Query` against a collection handle.
//! - Execute composed queries, absorbing provider failures.
//!
//! # Invariants
//! - Composition order is fixed: full collection, filter, includes, ordering.
//! - When an ordering is supplied its result is returned as-is; nothing
//!   re-orders it afterwards.
//! - Materialization never fails: a provider error yields an empty result
//!   and a `query_absorbed` warning. Callers cannot tell "no rows" from
//!   "query failed" through this path.

use super::order::Query;
use super::spec::QuerySpec;
use crate::db::DbError;
use crate::entity::Entity;
use crate::session::{CollectionHandle, Session};
use log::warn;
use std::time::Instant;

/// Builds the query described by `spec` over the handle's collection.
pub fn compose<S, E>(handle: &CollectionHandle<'_, S, E>, spec: QuerySpec<E>) -> Query<E>
where
    S: Session,
    E: Entity,
{
    let QuerySpec {
        filter,
        order_by,
        includes,
    } = spec;

    let mut query = handle.query();
    if let Some(filter) = filter {
        query = query.filter(filter);
    }
    for relation in includes {
        query = query.include(relation);
    }

    match order_by {
        Some(order) => order(query).into_query(),
        None => query,
    }
}

/// Executes `query`, returning an empty result on any provider failure.
pub fn materialize<S, E>(handle: &mut CollectionHandle<'_, S, E>, query: &Query<E>) -> Vec<E>
where
    S: Session,
    E: Entity,
{
    let started_at = Instant::now();
    match handle.to_vec(query) {
        Ok(rows) => rows,
        Err(err) => absorb::<E>(&err, started_at),
    }
}

/// Awaitable form of [`materialize`].
pub async fn materialize_async<S, E>(
    handle: &mut CollectionHandle<'_, S, E>,
    query: &Query<E>,
) -> Vec<E>
where
    S: Session,
    E: Entity,
{
    let started_at = Instant::now();
    match handle.to_vec_async(query).await {
        Ok(rows) => rows,
        Err(err) => absorb::<E>(&err, started_at),
    }
}

pub(crate) fn absorb<E: Entity>(err: &DbError, started_at: Instant) -> Vec<E> {
    warn!(
        "event=query_absorbed module=query status=error entity={} duration_ms={} error={}",
        E::TABLE,
        started_at.elapsed().as_millis(),
        err
    );
    Vec::new()
}
