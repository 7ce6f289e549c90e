//! Generic list orchestrator for entity types with a single pagination stream.

use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::{Map, Value};

use super::{LoadGuard, LoadTicket, Scope, SearchDebouncer};
use crate::api::{DeleteTarget, Gateway, ListOptions, Payload};
use crate::diff::{diff_records, to_map};
use crate::errors::ApiError;
use crate::models::{Breadcrumb, Entity};
use crate::store::{EntityStore, LoadingState};

/// Orchestrates one [`EntityStore`] against its REST collection.
pub struct EntityList<E: Entity<Key = i64>> {
    pub(crate) gateway: Arc<Gateway>,
    store: RwLock<EntityStore<E>>,
    scope: Mutex<Scope>,
    loads: LoadGuard,
    debouncer: SearchDebouncer,
}

impl<E: Entity<Key = i64>> EntityList<E> {
    pub fn new(gateway: Arc<Gateway>, debouncer: SearchDebouncer) -> Self {
        Self::with_store(gateway, EntityStore::new(), debouncer)
    }

    pub fn with_store(gateway: Arc<Gateway>, store: EntityStore<E>, debouncer: SearchDebouncer) -> Self {
        Self {
            gateway,
            store: RwLock::new(store),
            scope: Mutex::new(Scope::all()),
            loads: LoadGuard::default(),
            debouncer,
        }
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, EntityStore<E>> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, EntityStore<E>> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn scope(&self) -> Scope {
        self.scope.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    // ==================== FETCHING ====================

    /// Fresh load of `scope`, replacing the collection. Remembers the scope
    /// for later searches and refreshes.
    pub async fn fetch(&self, scope: Scope) -> Result<(), ApiError> {
        tracing::info!("Loading {} list {:?}", E::KIND.as_str(), scope.filters());
        *self.scope.lock().unwrap_or_else(PoisonError::into_inner) = scope.clone();
        self.fresh_load(ListOptions::with_query(scope.query(None))).await
    }

    /// Fresh load of the current scope.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        let scope = self.scope();
        self.fresh_load(ListOptions::with_query(scope.query(None))).await
    }

    /// Filtered fresh load within the current scope. An empty term lists the
    /// whole scope.
    pub async fn search(&self, term: &str) -> Result<(), ApiError> {
        let term = term.trim();
        let search = (!term.is_empty()).then_some(term);
        let options = ListOptions::with_query(self.scope().query(search));
        self.fresh_load(options).await
    }

    /// Search once typing pauses. Returns `Ok(false)` when a newer term
    /// superseded this one before it was sent.
    pub async fn search_debounced(&self, term: &str) -> Result<bool, ApiError> {
        match self.debouncer.settle(term).await {
            Some(term) => self.search(&term).await.map(|_| true),
            None => Ok(false),
        }
    }

    /// Follow the `next` cursor and merge the page. Returns `Ok(false)` when
    /// there is nothing more to load.
    pub async fn load_more(&self) -> Result<bool, ApiError> {
        let next = self.read().next().map(str::to_string);
        let Some(next) = next else {
            return Ok(false);
        };

        let ticket = self.loads.join_current();
        self.load(ListOptions::continuation(next), ticket).await?;
        Ok(true)
    }

    async fn fresh_load(&self, options: ListOptions) -> Result<(), ApiError> {
        let ticket = self.loads.begin_fresh();
        self.load(options, ticket).await
    }

    async fn load(&self, options: ListOptions, ticket: LoadTicket) -> Result<(), ApiError> {
        self.write().begin_fetch();

        let continuation = options.is_continuation();
        let result = ticket.run(self.gateway.list::<E>(E::KIND, &options)).await;

        match result {
            Ok((page, breadcrumb)) => {
                let applied = self.loads.apply_if_current(&ticket, || {
                    self.write().fetch_succeeded(page, breadcrumb, continuation);
                });
                if applied.is_none() {
                    tracing::debug!("Discarding superseded {} page", E::KIND.as_str());
                    return Err(ApiError::Cancelled);
                }
                Ok(())
            }
            Err(ApiError::Cancelled) => {
                tracing::debug!("{} load superseded", E::KIND.as_str());
                Err(ApiError::Cancelled)
            }
            Err(err) => {
                self.loads
                    .apply_if_current(&ticket, || self.write().fetch_failed());
                tracing::warn!("Failed to load {} list: {}", E::KIND.as_str(), err);
                Err(err)
            }
        }
    }

    // ==================== WRITES ====================

    /// POST a new record and add it to the store.
    pub async fn create(&self, data: Map<String, Value>) -> Result<E, ApiError> {
        self.create_with(Payload::Json(data)).await
    }

    pub async fn create_with(&self, payload: Payload) -> Result<E, ApiError> {
        let entity: E = self.gateway.create(E::KIND, payload, &[]).await?;
        tracing::info!("Created {} {}", E::KIND.as_str(), entity.key());
        self.write().add_one(entity.clone());
        Ok(entity)
    }

    /// Send only the fields that differ between `original` and `edited`.
    ///
    /// No request is made when nothing changed.
    pub async fn update(&self, original: &E, edited: &E) -> Result<E, ApiError> {
        let changes = diff_records(original, edited)?;
        if changes.is_empty() {
            tracing::debug!("No changes for {} {}", E::KIND.as_str(), original.key());
            return Ok(original.clone());
        }
        self.update_fields(original.key(), changes).await
    }

    /// PATCH an explicit change set and apply the returned record.
    pub async fn update_fields(&self, id: i64, changes: Map<String, Value>) -> Result<E, ApiError> {
        self.update_with(id, Payload::Json(changes)).await
    }

    pub(crate) async fn update_with(&self, id: i64, payload: Payload) -> Result<E, ApiError> {
        let entity: E = self.gateway.update(E::KIND, id, payload, &[]).await?;
        self.apply_update(&entity)?;
        tracing::info!("Updated {} {}", E::KIND.as_str(), id);
        Ok(entity)
    }

    fn apply_update(&self, entity: &E) -> Result<(), ApiError> {
        let changes = to_map(entity)?;
        self.write().update_one(&entity.key(), changes);
        Ok(())
    }

    pub async fn remove(&self, id: i64) -> Result<(), ApiError> {
        self.gateway
            .delete(E::KIND, &DeleteTarget::One(id), &[])
            .await?;
        self.write().remove_one(&id);
        tracing::info!("Deleted {} {}", E::KIND.as_str(), id);
        Ok(())
    }

    /// Delete several records with one bulk request.
    pub async fn remove_many(&self, ids: &[i64]) -> Result<(), ApiError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.gateway
            .delete(E::KIND, &DeleteTarget::Many(ids.to_vec()), &[])
            .await?;
        let removed = self.write().remove_many(ids);
        tracing::info!("Deleted {} {} records", removed, E::KIND.as_str());
        Ok(())
    }

    // ==================== SELECTORS ====================

    pub fn select_all(&self) -> Vec<E> {
        self.read().select_all()
    }

    pub fn select_by_id(&self, id: i64) -> Option<E> {
        self.read().select_by_id(&id)
    }

    pub fn loading_state(&self) -> LoadingState {
        self.read().loading_state()
    }

    pub fn count(&self) -> u64 {
        self.read().count()
    }

    pub fn has_more(&self) -> bool {
        self.read().next().is_some()
    }

    pub fn breadcrumb(&self) -> Option<Breadcrumb> {
        self.read().breadcrumb().cloned()
    }
}
