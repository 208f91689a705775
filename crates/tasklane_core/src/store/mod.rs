//! In-memory entity collections synchronized with the remote backend.
//!
//! # Responsibility
//! - Keep one ordered, newest-first cache per entity type.
//! - Reconcile the cache only after the backend confirms a write.
//!
//! # Invariants
//! - The owner id is resolved from the backend on every owner-scoped call,
//!   never from cached session state.
//! - Failed writes leave the cache untouched and return the error.
//! - Failed reads are logged and absorbed; the cache keeps its prior value.
//! - Creates are prepended; the cache is never re-sorted locally.
//! - Concurrent writes to one id are last-writer-wins with no version check.
//! - The state lock is never held across a backend call.

use crate::backend::{Embed, RemoteBackend, Row, SelectQuery, Table};
use crate::error::{SyncError, SyncResult};
use crate::model::user::UserId;
use log::{debug, error, info};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use uuid::Uuid;

pub mod project_store;
pub mod task_store;

pub use project_store::ProjectStore;
pub use task_store::TaskStore;

/// Row type managed by an [`EntityStore`].
pub trait Entity: Clone + Send + Sync + DeserializeOwned + 'static {
    /// Insert payload, without the owner id.
    type Draft: Serialize + Send + Sync;
    /// Partial update payload.
    type Patch: Serialize + Send + Sync;

    const TABLE: Table;
    /// Relation re-selected with every read and write.
    const EMBED: Option<Embed> = None;

    fn id(&self) -> Uuid;
}

struct StoreState<T> {
    items: Vec<T>,
    loading: bool,
    last_fetch_error: Option<SyncError>,
}

/// Ordered cache of one entity type plus its CRUD operations.
pub struct EntityStore<T: Entity, B: RemoteBackend + ?Sized> {
    backend: Arc<B>,
    state: Mutex<StoreState<T>>,
}

impl<T: Entity, B: RemoteBackend + ?Sized> EntityStore<T, B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            state: Mutex::new(StoreState {
                items: Vec::new(),
                loading: false,
                last_fetch_error: None,
            }),
        }
    }

    /// Snapshot of the cached collection, newest-created first.
    pub fn items(&self) -> Vec<T> {
        self.lock().items.clone()
    }

    pub fn get(&self, id: Uuid) -> Option<T> {
        self.lock().items.iter().find(|item| item.id() == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    /// Error recorded by the most recent fetch, cleared by the next success.
    pub fn last_fetch_error(&self) -> Option<SyncError> {
        self.lock().last_fetch_error.clone()
    }

    /// Drops every cached entry.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.items.clear();
        state.last_fetch_error = None;
    }

    /// Replaces the cache with every row the current user owns.
    ///
    /// Failures are logged and recorded in [`Self::last_fetch_error`]; the
    /// cache keeps its prior contents. `loading` is reset on every exit path.
    pub async fn fetch(&self) {
        let _loading = LoadingGuard::engage(&self.state);
        let started_at = Instant::now();
        let table = T::TABLE;

        match self.load_rows().await {
            Ok(items) => {
                let count = items.len();
                {
                    let mut state = self.lock();
                    state.items = items;
                    state.last_fetch_error = None;
                }
                info!(
                    "event=store_fetch module=store status=ok table={table} count={count} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
            }
            Err(err) => {
                error!(
                    "event=store_fetch module=store status=error table={table} duration_ms={} error_code={} error={}",
                    started_at.elapsed().as_millis(),
                    err.code(),
                    err
                );
                self.lock().last_fetch_error = Some(err);
            }
        }
    }

    /// Inserts a row for the current user and prepends the canonical result.
    pub async fn create(&self, draft: T::Draft) -> SyncResult<T> {
        let table = T::TABLE;
        let result = self.insert_row(draft).await;
        match &result {
            Ok(entity) => {
                self.lock().items.insert(0, entity.clone());
                info!(
                    "event=store_create module=store status=ok table={table} id={}",
                    entity.id()
                );
            }
            Err(err) => log_write_failure("create", table, None, err),
        }
        result
    }

    /// Applies a partial update and replaces the cached entry in place.
    ///
    /// An entry removed locally in the meantime is not re-added.
    pub async fn update(&self, id: Uuid, patch: T::Patch) -> SyncResult<T> {
        let table = T::TABLE;
        let result = self.update_row(id, patch).await;
        match &result {
            Ok(entity) => {
                let replaced = {
                    let mut state = self.lock();
                    let position = state.items.iter().position(|item| item.id() == id);
                    match position {
                        Some(index) => {
                            state.items[index] = entity.clone();
                            true
                        }
                        None => false,
                    }
                };
                info!(
                    "event=store_update module=store status=ok table={table} id={id} cached={replaced}"
                );
            }
            Err(err) => log_write_failure("update", table, Some(id), err),
        }
        result
    }

    /// Deletes the row remotely, then drops every cached entry with `id`.
    pub async fn delete(&self, id: Uuid) -> SyncResult<()> {
        let table = T::TABLE;
        if let Err(err) = self.backend.delete(table, id).await {
            let err = SyncError::from(err);
            log_write_failure("delete", table, Some(id), &err);
            return Err(err);
        }

        let removed = {
            let mut state = self.lock();
            let before = state.items.len();
            state.items.retain(|item| item.id() != id);
            before - state.items.len()
        };
        info!("event=store_delete module=store status=ok table={table} id={id} removed={removed}");
        Ok(())
    }

    async fn current_user_id(&self) -> SyncResult<UserId> {
        match self.backend.get_current_user().await? {
            Some(user) => Ok(user.id),
            None => Err(SyncError::NotAuthenticated),
        }
    }

    async fn load_rows(&self) -> SyncResult<Vec<T>> {
        let owner = self.current_user_id().await?;
        let query = SelectQuery::owned_by(owner).with_embed(T::EMBED);
        let rows = self.backend.select(T::TABLE, &query).await?;
        rows.into_iter().map(decode_row).collect()
    }

    async fn insert_row(&self, draft: T::Draft) -> SyncResult<T> {
        let owner = self.current_user_id().await?;
        let mut row = encode_row(&draft)?;
        row.insert("user_id".to_string(), Value::String(owner.to_string()));
        let inserted = self.backend.insert(T::TABLE, row, T::EMBED).await?;
        decode_row(inserted)
    }

    async fn update_row(&self, id: Uuid, patch: T::Patch) -> SyncResult<T> {
        let patch = encode_row(&patch)?;
        match self.backend.update(T::TABLE, id, patch, T::EMBED).await? {
            Some(row) => decode_row(row),
            None => Err(SyncError::NotFound(id)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState<T>> {
        lock_state(&self.state)
    }
}

/// Holds `loading = true` for its lifetime.
struct LoadingGuard<'a, T> {
    state: &'a Mutex<StoreState<T>>,
}

impl<'a, T> LoadingGuard<'a, T> {
    fn engage(state: &'a Mutex<StoreState<T>>) -> Self {
        lock_state(state).loading = true;
        Self { state }
    }
}

impl<T> Drop for LoadingGuard<'_, T> {
    fn drop(&mut self) {
        lock_state(self.state).loading = false;
    }
}

fn lock_state<T>(state: &Mutex<StoreState<T>>) -> MutexGuard<'_, StoreState<T>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn encode_row(value: &impl Serialize) -> SyncResult<Row> {
    match serde_json::to_value(value)? {
        Value::Object(row) => Ok(row),
        other => Err(SyncError::InvalidRow(format!(
            "payload must encode to an object, got `{other}`"
        ))),
    }
}

fn decode_row<T: DeserializeOwned>(row: Row) -> SyncResult<T> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

fn log_write_failure(operation: &str, table: Table, id: Option<Uuid>, err: &SyncError) {
    match id {
        Some(id) => error!(
            "event=store_{operation} module=store status=error table={table} id={id} error_code={} error={}",
            err.code(),
            err
        ),
        None => error!(
            "event=store_{operation} module=store status=error table={table} error_code={} error={}",
            err.code(),
            err
        ),
    }
    debug!("event=store_{operation} module=store status=unchanged table={table}");
}
