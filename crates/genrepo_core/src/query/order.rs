//! Composed queries and their ordered form.
//!
//! # Responsibility
//! - Hold filter, eager includes, sort keys and paging for one query.
//! - Keep ordering a separate, final step: only `OrderedQuery` can page.
//!
//! # Invariants
//! - `order_by` replaces every previous sort key.
//! - Includes are unique by relation name; re-including is a no-op.
//! - Successive filters are combined with `AND`.

use super::filter::{Column, Filter};
use crate::entity::Relation;
use std::fmt::{Debug, Formatter};

/// Sort direction of one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub column: &'static str,
    pub direction: Direction,
}

/// A composed query over all rows of `E`, not executed yet.
pub struct Query<E> {
    pub(crate) filter: Option<Filter<E>>,
    pub(crate) includes: Vec<Relation<E>>,
    pub(crate) sort: Vec<SortKey>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: u64,
}

impl<E> Query<E> {
    /// The full collection, unfiltered and in provider order.
    pub fn all() -> Self {
        Self {
            filter: None,
            includes: Vec::new(),
            sort: Vec::new(),
            limit: None,
            offset: 0,
        }
    }

    pub fn filter(mut self, filter: Filter<E>) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(filter),
            None => filter,
        });
        self
    }

    pub fn include(mut self, relation: Relation<E>) -> Self {
        if !self
            .includes
            .iter()
            .any(|existing| existing.name() == relation.name())
        {
            self.includes.push(relation);
        }
        self
    }

    pub fn order_by(self, column: Column<E>) -> OrderedQuery<E> {
        self.sorted(column, Direction::Ascending)
    }

    pub fn order_by_desc(self, column: Column<E>) -> OrderedQuery<E> {
        self.sorted(column, Direction::Descending)
    }

    fn sorted(mut self, column: Column<E>, direction: Direction) -> OrderedQuery<E> {
        self.sort = vec![SortKey {
            column: column.name(),
            direction,
        }];
        OrderedQuery { inner: self }
    }

    pub fn filter_ref(&self) -> Option<&Filter<E>> {
        self.filter.as_ref()
    }

    pub fn includes(&self) -> &[Relation<E>] {
        &self.includes
    }

    pub fn sort_keys(&self) -> &[SortKey] {
        &self.sort
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }
}

impl<E> Clone for Query<E> {
    fn clone(&self) -> Self {
        Self {
            filter: self.filter.clone(),
            includes: self.includes.clone(),
            sort: self.sort.clone(),
            limit: self.limit,
            offset: self.offset,
        }
    }
}

impl<E> Debug for Query<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("filter", &self.filter)
            .field(
                "includes",
                &self.includes.iter().map(Relation::name).collect::<Vec<_>>(),
            )
            .field("sort", &self.sort)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .finish()
    }
}

/// A query with an authoritative ordering; may additionally be paged.
pub struct OrderedQuery<E> {
    inner: Query<E>,
}

impl<E> OrderedQuery<E> {
    pub fn then_by(mut self, column: Column<E>) -> Self {
        self.inner.sort.push(SortKey {
            column: column.name(),
            direction: Direction::Ascending,
        });
        self
    }

    pub fn then_by_desc(mut self, column: Column<E>) -> Self {
        self.inner.sort.push(SortKey {
            column: column.name(),
            direction: Direction::Descending,
        });
        self
    }

    /// Keeps at most `count` rows of the ordered result.
    pub fn take(mut self, count: u64) -> Self {
        self.inner.limit = Some(count);
        self
    }

    /// Skips the first `count` rows of the ordered result.
    pub fn skip(mut self, count: u64) -> Self {
        self.inner.offset = count;
        self
    }

    pub fn into_query(self) -> Query<E> {
        self.inner
    }
}

impl<E> Debug for OrderedQuery<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("OrderedQuery").field(&self.inner).finish()
    }
}
