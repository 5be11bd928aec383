//! Per-session change tracking.
//!
//! # Responsibility
//! - Record the attachment state of every entity a session knows about.
//! - Produce the ordered list of writes a commit has to perform.
//!
//! # Invariants
//! - At most one entry per `(table, key)`; keyed entries are indexed.
//! - Entries keep tracking order; commit writes pending entries in it.
//! - State transitions other than `attach`/`add` require an existing entry.
//! - Keyless entries are only accepted for tables whose key the provider
//!   generates.

use crate::db::{DbError, DbResult};
use crate::entity::{EntityMeta, EntityState, KeyValue, Record};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct TrackedEntry {
    meta: EntityMeta,
    key: Option<KeyValue>,
    state: EntityState,
    record: Record,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteKind {
    Insert,
    Update,
    Delete,
}

/// One write to perform during commit.
#[derive(Debug, Clone)]
pub(crate) struct PendingWrite {
    /// Index of the originating entry, used to apply generated keys.
    pub entry: usize,
    pub kind: WriteKind,
    pub meta: EntityMeta,
    pub key: Option<KeyValue>,
    pub record: Record,
}

#[derive(Debug, Default)]
pub(crate) struct ChangeTracker {
    entries: Vec<TrackedEntry>,
    index: HashMap<&'static str, HashMap<KeyValue, usize>>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn position(&self, table: &str, key: &KeyValue) -> Option<usize> {
        self.index.get(table).and_then(|keys| keys.get(key)).copied()
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (position, entry) in self.entries.iter().enumerate() {
            if let Some(key) = &entry.key {
                self.index
                    .entry(entry.meta.table)
                    .or_default()
                    .insert(key.clone(), position);
            }
        }
    }

    fn push(&mut self, entry: TrackedEntry) {
        if let Some(key) = &entry.key {
            self.index
                .entry(entry.meta.table)
                .or_default()
                .insert(key.clone(), self.entries.len());
        }
        self.entries.push(entry);
    }

    pub fn state(&self, table: &str, key: Option<&KeyValue>) -> EntityState {
        key.and_then(|key| self.position(table, key))
            .map_or(EntityState::Unattached, |index| self.entries[index].state)
    }

    /// Tracked values for `key`: `Some(None)` when the entity is pending
    /// deletion, `None` when the key is not tracked at all.
    pub fn lookup(&self, table: &str, key: &KeyValue) -> Option<Option<&Record>> {
        self.position(table, key).map(|index| {
            let entry = &self.entries[index];
            if entry.state == EntityState::Deleted {
                None
            } else {
                Some(&entry.record)
            }
        })
    }

    /// Tracks a freshly loaded row unless its key is already tracked.
    pub fn track_loaded(&mut self, meta: EntityMeta, key: KeyValue, record: Record) {
        if self.position(meta.table, &key).is_none() {
            self.push(TrackedEntry {
                meta,
                key: Some(key),
                state: EntityState::Unmodified,
                record,
            });
        }
    }

    pub fn attach(
        &mut self,
        meta: EntityMeta,
        key: Option<KeyValue>,
        record: Record,
    ) -> DbResult<()> {
        let key = key.ok_or(DbError::KeyNotSet { entity: meta.table })?;
        self.push_new(meta, Some(key), record, EntityState::Unmodified)
    }

    /// Stages an insert. An unset key is only valid when the provider
    /// generates it.
    pub fn add(&mut self, meta: EntityMeta, key: Option<KeyValue>, record: Record) -> DbResult<()> {
        if key.is_none() && !meta.generated_key {
            return Err(DbError::KeyNotSet { entity: meta.table });
        }
        self.push_new(meta, key, record, EntityState::Added)
    }

    fn push_new(
        &mut self,
        meta: EntityMeta,
        key: Option<KeyValue>,
        record: Record,
        state: EntityState,
    ) -> DbResult<()> {
        if let Some(existing) = &key {
            if self.position(meta.table, existing).is_some() {
                return Err(DbError::AlreadyTracked {
                    entity: meta.table,
                    key: existing.clone(),
                });
            }
        }
        self.push(TrackedEntry {
            meta,
            key,
            state,
            record,
        });
        Ok(())
    }

    /// Moves a tracked entity to `state`, refreshing its tracked values.
    ///
    /// `Deleted` on a pending insert and `Unattached` both drop the entry.
    pub fn set_state(
        &mut self,
        meta: EntityMeta,
        key: Option<KeyValue>,
        record: Record,
        state: EntityState,
    ) -> DbResult<()> {
        let key = key.ok_or(DbError::KeyNotSet { entity: meta.table })?;
        let index = self
            .position(meta.table, &key)
            .ok_or(DbError::Detached { entity: meta.table })?;

        let current = self.entries[index].state;
        let next = match (current, state) {
            (_, EntityState::Unattached) | (EntityState::Added, EntityState::Deleted) => None,
            (EntityState::Added, EntityState::Modified) => Some(EntityState::Added),
            (_, next) => Some(next),
        };

        match next {
            Some(next) => {
                let entry = &mut self.entries[index];
                entry.state = next;
                entry.record = record;
            }
            None => {
                self.entries.remove(index);
                self.reindex();
            }
        }
        Ok(())
    }

    pub fn pending_writes(&self) -> Vec<PendingWrite> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                let kind = match entry.state {
                    EntityState::Added => WriteKind::Insert,
                    EntityState::Modified => WriteKind::Update,
                    EntityState::Deleted => WriteKind::Delete,
                    EntityState::Unmodified | EntityState::Unattached => return None,
                };
                Some(PendingWrite {
                    entry: index,
                    kind,
                    meta: entry.meta,
                    key: entry.key.clone(),
                    record: entry.record.clone(),
                })
            })
            .collect()
    }

    /// Applies a successful commit: generated keys are adopted, deleted
    /// entries are forgotten and everything else becomes `Unmodified`.
    pub fn accept(&mut self, generated: &[(usize, i64)]) {
        for (index, row_id) in generated {
            if let Some(entry) = self.entries.get_mut(*index) {
                if entry.key.is_none() && entry.meta.generated_key {
                    entry.key = Some(KeyValue::Integer(*row_id));
                    entry.record.set(entry.meta.primary_key, *row_id);
                }
            }
        }

        self.entries
            .retain(|entry| entry.state != EntityState::Deleted);
        for entry in &mut self.entries {
            entry.state = EntityState::Unmodified;
        }
        self.reindex();
    }

    /// Applies a failed commit: every entry with pending changes is
    /// forgotten, so the next commit starts clean and the database stays
    /// the source of truth for those rows.
    pub fn reject(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| !entry.state.is_pending());
        self.reindex();
        before - self.entries.len()
    }

    /// Forgets entities without pending changes.
    pub fn clear_unmodified(&mut self) {
        self.entries.retain(|entry| entry.state.is_pending());
        self.reindex();
    }
}
