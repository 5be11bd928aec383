//! Caller-facing description of one query.

use super::filter::Filter;
use super::order::{OrderedQuery, Query};
use crate::entity::Relation;
use std::fmt::{Debug, Formatter};

/// Ordering step applied after filtering and inclusion.
pub type OrderFn<E> = Box<dyn FnOnce(Query<E>) -> OrderedQuery<E> + Send>;

/// Filter, ordering and eager includes for one call. Every field defaults
/// to "no effect".
pub struct QuerySpec<E> {
    pub filter: Option<Filter<E>>,
    pub order_by: Option<OrderFn<E>>,
    pub includes: Vec<Relation<E>>,
}

impl<E> QuerySpec<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter<E>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn order_by(
        mut self,
        order: impl FnOnce(Query<E>) -> OrderedQuery<E> + Send + 'static,
    ) -> Self {
        self.order_by = Some(Box::new(order));
        self
    }

    pub fn include(mut self, relation: Relation<E>) -> Self {
        self.includes.push(relation);
        self
    }

    pub fn includes(mut self, relations: impl IntoIterator<Item = Relation<E>>) -> Self {
        self.includes.extend(relations);
        self
    }
}

impl<E> Default for QuerySpec<E> {
    fn default() -> Self {
        Self {
            filter: None,
            order_by: None,
            includes: Vec::new(),
        }
    }
}

impl<E> Debug for QuerySpec<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuerySpec")
            .field("filter", &self.filter)
            .field("order_by", &self.order_by.as_ref().map(|_| "<fn>"))
            .field(
                "includes",
                &self.includes.iter().map(Relation::name).collect::<Vec<_>>(),
            )
            .finish()
    }
}
