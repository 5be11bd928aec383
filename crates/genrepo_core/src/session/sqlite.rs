//! SQLite-backed session and session factory.
//!
//! # Responsibility
//! - Implement the `Session` contract on one rusqlite connection.
//! - Execute composed queries, eager includes and commits.
//!
//! # Invariants
//! - Commit writes run inside one `BEGIN IMMEDIATE` transaction; on failure
//!   nothing is written and every pending change is discarded, so a later
//!   commit never replays a rejected write.
//! - `find` serves tracked entities before reading the database and tracks
//!   what it loads; query results are not tracked.
//! - Awaitable operations run on tokio's blocking pool with the connection
//!   moved out of the session for the duration of the call.

use super::tracker::{ChangeTracker, PendingWrite, WriteKind};
use super::{Commit, GeneratedKey, Session, SessionFactory};
use crate::config::StoreConfig;
use crate::db::sql::{self, Statement};
use crate::db::{open_connection, DbError, DbResult};
use crate::entity::{Entity, EntityKey, EntityMeta, EntityState, KeyValue, Record, Relation, Value};
use crate::query::Query;
use async_trait::async_trait;
use log::{debug, error};
use rusqlite::{Connection, TransactionBehavior};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Upper bound on bound parameters per eager-include lookup.
const RELATED_CHUNK_SIZE: usize = 500;

/// A unit of work over one SQLite connection.
pub struct SqliteSession {
    id: Uuid,
    conn: Option<Connection>,
    tracker: ChangeTracker,
    opened_at: Instant,
}

impl SqliteSession {
    /// Opens a fresh connection for `config`.
    pub fn open(config: &StoreConfig) -> DbResult<Self> {
        let conn = open_connection(config)?;
        Ok(Self::from_connection(conn))
    }

    /// Wraps an already configured connection.
    pub fn from_connection(conn: Connection) -> Self {
        let session = Self {
            id: Uuid::new_v4(),
            conn: Some(conn),
            tracker: ChangeTracker::new(),
            opened_at: Instant::now(),
        };
        debug!(
            "event=session_acquire module=session status=ok session_id={}",
            session.id
        );
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Number of entities currently tracked by this session.
    pub fn tracked_count(&self) -> usize {
        self.tracker.len()
    }

    /// Forgets loaded entities that have no pending changes, so later
    /// lookups read the database again.
    pub fn clear_tracked(&mut self) {
        self.tracker.clear_unmodified();
    }

    /// Underlying connection, e.g. for schema setup by the caller.
    pub fn connection(&self) -> DbResult<&Connection> {
        self.conn.as_ref().ok_or(DbError::SessionUnavailable)
    }

    fn connection_mut(&mut self) -> DbResult<&mut Connection> {
        self.conn.as_mut().ok_or(DbError::SessionUnavailable)
    }

    /// Runs `op` on the blocking pool with this session's connection.
    ///
    /// The connection comes back only if the worker completes; a cancelled
    /// or panicked call leaves the session without a connection.
    async fn run_blocking<T, F>(&mut self, op: F) -> DbResult<T>
    where
        F: FnOnce(&mut Connection) -> DbResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let mut conn = self.conn.take().ok_or(DbError::SessionUnavailable)?;
        let joined = tokio::task::spawn_blocking(move || {
            let result = op(&mut conn);
            (conn, result)
        })
        .await;

        match joined {
            Ok((conn, result)) => {
                self.conn = Some(conn);
                result
            }
            Err(err) => {
                error!(
                    "event=session_worker module=session status=error session_id={} error={}",
                    self.id, err
                );
                Err(DbError::Background(err.to_string()))
            }
        }
    }

    /// `Some(found)` when the key is tracked, `None` when the database must be read.
    fn tracked<E: Entity>(&self, key: &KeyValue) -> DbResult<Option<Option<E>>> {
        match self.tracker.lookup(E::TABLE, key) {
            Some(Some(record)) => Ok(Some(Some(E::from_record(record)?))),
            Some(None) => Ok(Some(None)),
            None => Ok(None),
        }
    }

    fn track_found<E: Entity>(&mut self, key: KeyValue, record: Option<Record>) -> DbResult<Option<E>> {
        match record {
            Some(record) => {
                let entity = E::from_record(&record)?;
                self.tracker
                    .track_loaded(EntityMeta::of::<E>(), key, record);
                Ok(Some(entity))
            }
            None => Ok(None),
        }
    }

    fn finish_commit(
        &mut self,
        outcome: DbResult<WriteOutcome>,
        started_at: Instant,
    ) -> DbResult<Commit> {
        match outcome {
            Ok(outcome) => {
                self.tracker.accept(&outcome.generated_by_entry);
                debug!(
                    "event=session_commit module=session status=ok session_id={} rows_affected={} duration_ms={}",
                    self.id,
                    outcome.commit.rows_affected,
                    started_at.elapsed().as_millis()
                );
                Ok(outcome.commit)
            }
            Err(err) => {
                let discarded = self.tracker.reject();
                error!(
                    "event=session_commit module=session status=error session_id={} discarded={} duration_ms={} error={}",
                    self.id,
                    discarded,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }
}

impl Drop for SqliteSession {
    fn drop(&mut self) {
        debug!(
            "event=session_release module=session status=ok session_id={} tracked={} duration_ms={}",
            self.id,
            self.tracker.len(),
            self.opened_at.elapsed().as_millis()
        );
    }
}

fn key_of<E: Entity>(entity: &E) -> Option<KeyValue> {
    entity.key().map(|key| key.key_value())
}

#[async_trait]
impl Session for SqliteSession {
    fn find<E: Entity>(&mut self, key: &E::Key) -> DbResult<Option<E>> {
        let key = key.key_value();
        if let Some(found) = self.tracked::<E>(&key)? {
            return Ok(found);
        }

        let statement = sql::find_by_key(&EntityMeta::of::<E>(), &key)?;
        let record = sql::fetch_records(self.connection()?, &statement)?
            .into_iter()
            .next();
        self.track_found(key, record)
    }

    async fn find_async<E: Entity>(&mut self, key: &E::Key) -> DbResult<Option<E>> {
        let key = key.key_value();
        if let Some(found) = self.tracked::<E>(&key)? {
            return Ok(found);
        }

        let statement = sql::find_by_key(&EntityMeta::of::<E>(), &key)?;
        let record = self
            .run_blocking(move |conn| sql::fetch_records(conn, &statement))
            .await?
            .into_iter()
            .next();
        self.track_found(key, record)
    }

    fn state_of<E: Entity>(&self, entity: &E) -> EntityState {
        self.tracker.state(E::TABLE, key_of(entity).as_ref())
    }

    fn attach<E: Entity>(&mut self, entity: &E) -> DbResult<()> {
        self.tracker
            .attach(EntityMeta::of::<E>(), key_of(entity), entity.to_record())
    }

    fn add<E: Entity>(&mut self, entity: &E) -> DbResult<()> {
        self.tracker
            .add(EntityMeta::of::<E>(), key_of(entity), entity.to_record())
    }

    fn remove<E: Entity>(&mut self, entity: &E) -> DbResult<()> {
        self.set_state(entity, EntityState::Deleted)
    }

    fn set_state<E: Entity>(&mut self, entity: &E, state: EntityState) -> DbResult<()> {
        self.tracker.set_state(
            EntityMeta::of::<E>(),
            key_of(entity),
            entity.to_record(),
            state,
        )
    }

    fn commit(&mut self) -> DbResult<Commit> {
        let started_at = Instant::now();
        let writes = self.tracker.pending_writes();
        let outcome = match self.connection_mut() {
            Ok(conn) => execute_writes(conn, &writes),
            Err(err) => Err(err),
        };
        self.finish_commit(outcome, started_at)
    }

    async fn commit_async(&mut self) -> DbResult<Commit> {
        let started_at = Instant::now();
        let writes = self.tracker.pending_writes();
        let outcome = self
            .run_blocking(move |conn| execute_writes(conn, &writes))
            .await;
        self.finish_commit(outcome, started_at)
    }

    fn to_sequence<E: Entity>(&mut self, query: &Query<E>) -> DbResult<Vec<E>> {
        let plan = QueryPlan::build(query)?;
        execute_plan(self.connection()?, plan)
    }

    async fn to_sequence_async<E: Entity>(&mut self, query: &Query<E>) -> DbResult<Vec<E>> {
        let plan = QueryPlan::build(query)?;
        self.run_blocking(move |conn| execute_plan(conn, plan)).await
    }
}

#[derive(Debug, Default)]
struct WriteOutcome {
    commit: Commit,
    generated_by_entry: Vec<(usize, i64)>,
}

fn execute_writes(conn: &mut Connection, writes: &[PendingWrite]) -> DbResult<WriteOutcome> {
    let mut outcome = WriteOutcome::default();
    if writes.is_empty() {
        return Ok(outcome);
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    for write in writes {
        let statement = sql::render_write(write)?;
        outcome.commit.rows_affected += sql::execute(&tx, &statement)?;

        if write.kind == WriteKind::Insert && write.key.is_none() && write.meta.generated_key {
            let row_id = tx.last_insert_rowid();
            outcome.commit.generated.push(GeneratedKey {
                table: write.meta.table,
                row_id,
            });
            outcome.generated_by_entry.push((write.entry, row_id));
        }
    }
    tx.commit()?;

    Ok(outcome)
}

/// Everything needed to run a composed query away from the session.
struct QueryPlan<E> {
    statement: Statement,
    includes: Vec<Relation<E>>,
}

impl<E: Entity> QueryPlan<E> {
    fn build(query: &Query<E>) -> DbResult<Self> {
        Ok(Self {
            statement: sql::select_query(&EntityMeta::of::<E>(), query)?,
            includes: query.includes().to_vec(),
        })
    }
}

fn execute_plan<E: Entity>(conn: &Connection, plan: QueryPlan<E>) -> DbResult<Vec<E>> {
    let mut rows = sql::fetch_records(conn, &plan.statement)?
        .into_iter()
        .map(|record| {
            let entity = E::from_record(&record)?;
            Ok((record, entity))
        })
        .collect::<DbResult<Vec<_>>>()?;

    for relation in &plan.includes {
        load_relation(conn, relation, &mut rows)?;
    }

    Ok(rows.into_iter().map(|(_, entity)| entity).collect())
}

/// Link value usable for matching parents to related rows. Only integer
/// and text columns link; anything else matches nothing.
fn link_key(value: &Value) -> Option<KeyValue> {
    match value {
        Value::Integer(value) => Some(KeyValue::Integer(*value)),
        Value::Text(value) => Some(KeyValue::Text(value.clone())),
        Value::Null | Value::Real(_) | Value::Blob(_) => None,
    }
}

/// Loads one relation for every parent row and assigns the matches.
fn load_relation<E: Entity>(
    conn: &Connection,
    relation: &Relation<E>,
    rows: &mut [(Record, E)],
) -> DbResult<()> {
    let parent_column = relation.parent_column();
    let target_column = relation.target_column();

    let mut seen = HashSet::new();
    let mut wanted: Vec<Value> = Vec::new();
    for (record, _) in rows.iter() {
        if let Some(key) = record.get(parent_column).and_then(link_key) {
            if seen.insert(key.clone()) {
                wanted.push(key.into());
            }
        }
    }

    let mut related: HashMap<KeyValue, Vec<Record>> = HashMap::new();
    for chunk in wanted.chunks(RELATED_CHUNK_SIZE) {
        let statement = sql::select_related(relation.target(), target_column, chunk)?;
        for candidate in sql::fetch_records(conn, &statement)? {
            if let Some(key) = candidate.get(target_column).and_then(link_key) {
                related.entry(key).or_default().push(candidate);
            }
        }
    }

    for (record, entity) in rows.iter_mut() {
        let matches = record
            .get(parent_column)
            .and_then(link_key)
            .and_then(|key| related.get(&key))
            .cloned()
            .unwrap_or_default();
        relation.assign(entity, matches)?;
    }
    Ok(())
}

/// Opens one new SQLite session per call.
#[derive(Debug, Clone)]
pub struct SqliteSessionFactory {
    config: Arc<StoreConfig>,
}

impl SqliteSessionFactory {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

impl SessionFactory for SqliteSessionFactory {
    type Session = SqliteSession;

    fn create_session(&self) -> DbResult<SqliteSession> {
        SqliteSession::open(&self.config)
    }
}
