//! Query specification and composition.
//!
//! # Responsibility
//! - Express filters, orderings and eager includes as typed values.
//! - Compose them into one executable `Query` per call.
//!
//! # Invariants
//! - Includes never change which rows match or their order.
//! - Ordering is applied strictly after filtering.

pub mod composer;
pub mod filter;
pub mod order;
pub mod spec;

pub use composer::{compose, materialize, materialize_async};
pub use filter::{Column, CompareOp, Expr, Filter};
pub use order::{Direction, OrderedQuery, Query, SortKey};
pub use spec::{OrderFn, QuerySpec};
