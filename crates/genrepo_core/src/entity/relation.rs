//! Typed relation-path tokens for eager inclusion.
//!
//! A `Relation<E>` names one relation of `E`, knows the target table and the
//! linking column, and knows how to store decoded related rows on a parent.
//! The provider loads the related rows; the relation only assigns them.

use super::{Entity, EntityMeta, MappingError, Record};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

type AssignFn<E> = dyn Fn(&mut E, Vec<Record>) -> Result<(), MappingError> + Send + Sync;

/// How parent rows and related rows are linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    /// `target.foreign_key = parent.primary_key`; zero or more targets.
    HasMany { foreign_key: &'static str },
    /// `target.primary_key = parent.local_key`; zero or one target.
    BelongsTo { local_key: &'static str },
}

/// Eager-inclusion request for one relation of `E`.
pub struct Relation<E> {
    name: &'static str,
    target: EntityMeta,
    link: Link,
    assign: Arc<AssignFn<E>>,
}

impl<E: Entity> Relation<E> {
    /// One-to-many relation: `T` rows whose `foreign_key` equals the parent key.
    pub fn has_many<T: Entity>(
        name: &'static str,
        foreign_key: &'static str,
        assign: fn(&mut E, Vec<T>),
    ) -> Self {
        Self {
            name,
            target: EntityMeta::of::<T>(),
            link: Link::HasMany { foreign_key },
            assign: Arc::new(move |parent: &mut E, records: Vec<Record>| {
                let items = records
                    .iter()
                    .map(T::from_record)
                    .collect::<Result<Vec<_>, _>>()?;
                assign(parent, items);
                Ok(())
            }),
        }
    }

    /// Many-to-one relation: the `T` row whose key equals the parent's `local_key`.
    pub fn belongs_to<T: Entity>(
        name: &'static str,
        local_key: &'static str,
        assign: fn(&mut E, Option<T>),
    ) -> Self {
        Self {
            name,
            target: EntityMeta::of::<T>(),
            link: Link::BelongsTo { local_key },
            assign: Arc::new(move |parent: &mut E, records: Vec<Record>| {
                let item = records.first().map(T::from_record).transpose()?;
                assign(parent, item);
                Ok(())
            }),
        }
    }

    /// Column on the parent row whose value selects related rows.
    pub fn parent_column(&self) -> &'static str {
        match self.link {
            Link::HasMany { .. } => E::PRIMARY_KEY,
            Link::BelongsTo { local_key } => local_key,
        }
    }
}

impl<E> Relation<E> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn target(&self) -> &EntityMeta {
        &self.target
    }

    pub fn link(&self) -> Link {
        self.link
    }

    /// Column on the related rows matched against [`Relation::parent_column`].
    pub fn target_column(&self) -> &'static str {
        match self.link {
            Link::HasMany { foreign_key } => foreign_key,
            Link::BelongsTo { .. } => self.target.primary_key,
        }
    }

    /// Stores the related rows belonging to `parent`.
    pub fn assign(&self, parent: &mut E, related: Vec<Record>) -> Result<(), MappingError> {
        (self.assign)(parent, related)
    }
}

impl<E> Clone for Relation<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            target: self.target,
            link: self.link,
            assign: Arc::clone(&self.assign),
        }
    }
}

impl<E> Debug for Relation<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relation")
            .field("name", &self.name)
            .field("target", &self.target.table)
            .field("link", &self.link)
            .finish()
    }
}
