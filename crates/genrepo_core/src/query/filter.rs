//! Typed column tokens and filter predicates.
//!
//! # Invariants
//! - A `Filter<E>` only ever references columns declared through
//!   `Column<E>`, so filters cannot cross entity types.
//! - Filters are pure descriptions; translation happens in the provider.

use crate::entity::Value;
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;

/// Comparison operator of a [`Expr::Compare`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Like,
}

impl CompareOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Like => "LIKE",
        }
    }
}

/// Untyped predicate tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Compare {
        column: &'static str,
        op: CompareOp,
        value: Value,
    },
    IsNull {
        column: &'static str,
        negated: bool,
    },
    In {
        column: &'static str,
        values: Vec<Value>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

/// Column of entity `E`, usable in filters and orderings.
pub struct Column<E> {
    name: &'static str,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Column<E> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _entity: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn compare(self, op: CompareOp, value: impl Into<Value>) -> Filter<E> {
        Filter::from_expr(Expr::Compare {
            column: self.name,
            op,
            value: value.into(),
        })
    }

    pub fn eq(self, value: impl Into<Value>) -> Filter<E> {
        self.compare(CompareOp::Eq, value)
    }

    pub fn ne(self, value: impl Into<Value>) -> Filter<E> {
        self.compare(CompareOp::Ne, value)
    }

    pub fn gt(self, value: impl Into<Value>) -> Filter<E> {
        self.compare(CompareOp::Gt, value)
    }

    pub fn ge(self, value: impl Into<Value>) -> Filter<E> {
        self.compare(CompareOp::Ge, value)
    }

    pub fn lt(self, value: impl Into<Value>) -> Filter<E> {
        self.compare(CompareOp::Lt, value)
    }

    pub fn le(self, value: impl Into<Value>) -> Filter<E> {
        self.compare(CompareOp::Le, value)
    }

    /// SQL `LIKE` pattern match (`%` and `_` wildcards).
    pub fn like(self, pattern: impl Into<String>) -> Filter<E> {
        self.compare(CompareOp::Like, Value::Text(pattern.into()))
    }

    pub fn is_null(self) -> Filter<E> {
        Filter::from_expr(Expr::IsNull {
            column: self.name,
            negated: false,
        })
    }

    pub fn is_not_null(self) -> Filter<E> {
        Filter::from_expr(Expr::IsNull {
            column: self.name,
            negated: true,
        })
    }

    /// Membership test. An empty list matches nothing.
    pub fn is_in<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Filter<E> {
        Filter::from_expr(Expr::In {
            column: self.name,
            values: values.into_iter().map(Into::into).collect(),
        })
    }
}

impl<E> Clone for Column<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for Column<E> {}

impl<E> Debug for Column<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Column").field(&self.name).finish()
    }
}

/// Predicate over entity `E`.
pub struct Filter<E> {
    expr: Expr,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Filter<E> {
    fn from_expr(expr: Expr) -> Self {
        Self {
            expr,
            _entity: PhantomData,
        }
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn and(self, other: Filter<E>) -> Self {
        Self::from_expr(Expr::And(Box::new(self.expr), Box::new(other.expr)))
    }

    pub fn or(self, other: Filter<E>) -> Self {
        Self::from_expr(Expr::Or(Box::new(self.expr), Box::new(other.expr)))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::from_expr(Expr::Not(Box::new(self.expr)))
    }
}

impl<E> Clone for Filter<E> {
    fn clone(&self) -> Self {
        Self::from_expr(self.expr.clone())
    }
}

impl<E> Debug for Filter<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Filter").field(&self.expr).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{Column, CompareOp, Expr};
    use crate::entity::Value;

    struct Sample;

    const SCORE: Column<Sample> = Column::new("score");
    const LABEL: Column<Sample> = Column::new("label");

    #[test]
    fn combinators_nest_left_to_right() {
        let filter = SCORE.ge(10).and(LABEL.is_null().or(LABEL.like("a%")));

        match filter.expr() {
            Expr::And(left, right) => {
                assert_eq!(
                    **left,
                    Expr::Compare {
                        column: "score",
                        op: CompareOp::Ge,
                        value: Value::Integer(10),
                    }
                );
                assert!(matches!(**right, Expr::Or(_, _)));
            }
            other => panic!("unexpected expr: {other:?}"),
        }
    }

    #[test]
    fn is_in_collects_values() {
        let filter = SCORE.is_in([1_i64, 2, 3]);
        assert_eq!(
            filter.expr(),
            &Expr::In {
                column: "score",
                values: vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)],
            }
        );
    }
}
