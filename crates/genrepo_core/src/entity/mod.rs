//! Entity mapping contracts.
//!
//! # Responsibility
//! - Describe how an application record type maps onto one table.
//! - Define primary-key values and per-session attachment states.
//!
//! # Invariants
//! - `Entity::to_record` must contain every column in `COLUMNS`.
//! - An entity without a key (`key() == None`) can only be inserted, and
//!   only when its key type is generated; every other state transition
//!   requires a key.

use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod record;
pub mod relation;

pub use record::{MappingError, Record, Value};
pub use relation::{Link, Relation};

/// Hashable primary-key value as seen by the change tracker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyValue {
    Integer(i64),
    Text(String),
}

impl Display for KeyValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
        }
    }
}

impl From<KeyValue> for Value {
    fn from(value: KeyValue) -> Self {
        match value {
            KeyValue::Integer(value) => Value::Integer(value),
            KeyValue::Text(value) => Value::Text(value),
        }
    }
}

/// Primary-key type of an entity.
pub trait EntityKey: Clone + std::fmt::Debug + Send + Sync + 'static {
    /// Whether the provider assigns this key on insert when it is unset.
    const GENERATED: bool = false;

    fn key_value(&self) -> KeyValue;

    /// Adopts a row id generated by the provider on insert.
    ///
    /// Returns `None` for key types that are always caller-assigned.
    fn from_generated(_row_id: i64) -> Option<Self> {
        None
    }
}

impl EntityKey for i64 {
    const GENERATED: bool = true;

    fn key_value(&self) -> KeyValue {
        KeyValue::Integer(*self)
    }

    fn from_generated(row_id: i64) -> Option<Self> {
        Some(row_id)
    }
}

impl EntityKey for String {
    fn key_value(&self) -> KeyValue {
        KeyValue::Text(self.clone())
    }
}

impl EntityKey for Uuid {
    fn key_value(&self) -> KeyValue {
        KeyValue::Text(self.to_string())
    }
}

/// A record type persisted in exactly one table.
pub trait Entity: Clone + Send + Sync + 'static {
    type Key: EntityKey;

    const TABLE: &'static str;
    const PRIMARY_KEY: &'static str;
    /// Persisted non-key columns.
    const COLUMNS: &'static [&'static str];

    fn key(&self) -> Option<Self::Key>;
    fn set_key(&mut self, key: Self::Key);

    /// Column values for persistence. The key column may be omitted or
    /// `Null` when the key is not assigned yet.
    fn to_record(&self) -> Record;
    fn from_record(record: &Record) -> Result<Self, MappingError>;
}

/// Static table description shared by the tracker and the SQL renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityMeta {
    pub table: &'static str,
    pub primary_key: &'static str,
    pub columns: &'static [&'static str],
    /// Keyless inserts are accepted and adopt the provider row id.
    pub generated_key: bool,
}

impl EntityMeta {
    pub fn of<E: Entity>() -> Self {
        Self {
            table: E::TABLE,
            primary_key: E::PRIMARY_KEY,
            columns: E::COLUMNS,
            generated_key: <E::Key as EntityKey>::GENERATED,
        }
    }

    /// Key column followed by the non-key columns.
    pub fn select_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once(self.primary_key).chain(self.columns.iter().copied())
    }
}

/// Attachment state of one entity instance within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityState {
    /// Not known to the session.
    Unattached,
    /// Pending insert.
    Added,
    /// Tracked and in sync with the last commit or load.
    Unmodified,
    /// Tracked with pending field changes.
    Modified,
    /// Tracked and pending removal.
    Deleted,
}

impl EntityState {
    pub fn is_tracked(self) -> bool {
        !matches!(self, Self::Unattached)
    }

    /// Whether commit has work to do for an entity in this state.
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Added | Self::Modified | Self::Deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::{EntityKey, EntityState, KeyValue};
    use uuid::Uuid;

    #[test]
    fn integer_keys_adopt_generated_row_ids() {
        assert_eq!(i64::from_generated(42), Some(42));
        assert_eq!(String::from_generated(42), None);
        assert_eq!(Uuid::from_generated(42), None);
        assert!(i64::GENERATED);
        assert!(!String::GENERATED);
        assert!(!Uuid::GENERATED);
    }

    #[test]
    fn uuid_keys_are_tracked_as_hyphenated_text() {
        let id = Uuid::new_v4();
        assert_eq!(id.key_value(), KeyValue::Text(id.to_string()));
    }

    #[test]
    fn only_added_modified_and_deleted_are_pending() {
        assert!(EntityState::Added.is_pending());
        assert!(EntityState::Modified.is_pending());
        assert!(EntityState::Deleted.is_pending());
        assert!(!EntityState::Unmodified.is_pending());
        assert!(!EntityState::Unattached.is_tracked());
    }
}
