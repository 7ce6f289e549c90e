//! Question list orchestrator.
//!
//! The API paginates each question sub-type separately, so one logical list
//! is backed by five concurrent streams with independent cursors. Loads are
//! all-or-nothing: if any stream fails, nothing from that cycle is merged.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::future::try_join_all;
use serde_json::{Map, Value};

use super::{LoadGuard, LoadTicket, SearchDebouncer};
use crate::api::{DeleteTarget, Gateway, ListOptions, Payload};
use crate::diff::{diff_records, to_map};
use crate::errors::ApiError;
use crate::models::{Entity, EntityKind, PageCursor, Question, QuestionContentType, QuestionKey};
use crate::store::{EntityStore, LoadingState};

const CONTENT_TYPE: &str = "content_type";

/// Merged question collection plus one cursor per sub-type stream.
#[derive(Default)]
pub struct QuestionState {
    pub store: EntityStore<Question>,
    pub streams: BTreeMap<QuestionContentType, PageCursor>,
}

impl QuestionState {
    fn total(&self) -> u64 {
        self.streams.values().map(|cursor| cursor.count).sum()
    }
}

pub struct QuestionList {
    gateway: Arc<Gateway>,
    state: RwLock<QuestionState>,
    query: Mutex<Vec<(String, String)>>,
    loads: LoadGuard,
    debouncer: SearchDebouncer,
}

impl QuestionList {
    pub fn new(gateway: Arc<Gateway>, debouncer: SearchDebouncer) -> Self {
        Self {
            gateway,
            state: RwLock::new(QuestionState::default()),
            query: Mutex::new(Vec::new()),
            loads: LoadGuard::default(),
            debouncer,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, QuestionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, QuestionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ==================== FETCHING ====================

    /// Fresh load of every sub-type with the given filters.
    pub async fn fetch(&self, query: Vec<(String, String)>) -> Result<(), ApiError> {
        tracing::info!("Loading question lists {:?}", query);
        *self.query.lock().unwrap_or_else(PoisonError::into_inner) = query.clone();

        let requests = QuestionContentType::ALL
            .into_iter()
            .map(|content_type| {
                let options = ListOptions::with_query(query.clone()).param(CONTENT_TYPE, content_type);
                (content_type, options)
            })
            .collect();

        let ticket = self.loads.begin_fresh();
        self.load(requests, ticket, false).await
    }

    /// Fresh load filtered by a search term, keeping the other filters.
    pub async fn search(&self, term: &str) -> Result<(), ApiError> {
        let mut query: Vec<(String, String)> = self
            .query
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(key, _)| key != "search")
            .cloned()
            .collect();
        let term = term.trim();
        if !term.is_empty() {
            query.push(("search".to_string(), term.to_string()));
        }
        self.fetch(query).await
    }

    /// Search once typing pauses; `Ok(false)` when superseded.
    pub async fn search_debounced(&self, term: &str) -> Result<bool, ApiError> {
        match self.debouncer.settle(term).await {
            Some(term) => self.search(&term).await.map(|_| true),
            None => Ok(false),
        }
    }

    /// Re-fetch explicit pages, replacing the collection and the cursors with
    /// exactly these streams.
    pub async fn fetch_pages(&self, pages: Vec<(QuestionContentType, String)>) -> Result<(), ApiError> {
        let requests = pages
            .into_iter()
            .map(|(content_type, url)| (content_type, ListOptions::continuation(url)))
            .collect();

        let ticket = self.loads.begin_fresh();
        self.load(requests, ticket, false).await
    }

    /// Advance every stream that still has a `next` cursor, concurrently.
    /// Returns `Ok(false)` when all streams are exhausted.
    pub async fn load_more(&self) -> Result<bool, ApiError> {
        let requests: Vec<_> = self
            .read()
            .streams
            .iter()
            .filter_map(|(content_type, cursor)| {
                cursor
                    .next
                    .as_ref()
                    .map(|next| (*content_type, ListOptions::continuation(next.clone())))
            })
            .collect();

        if requests.is_empty() {
            return Ok(false);
        }

        let ticket = self.loads.join_current();
        self.load(requests, ticket, true).await?;
        Ok(true)
    }

    async fn load(
        &self,
        requests: Vec<(QuestionContentType, ListOptions)>,
        ticket: LoadTicket,
        continuation: bool,
    ) -> Result<(), ApiError> {
        self.write().store.begin_fetch();

        let gateway = &self.gateway;
        let fan_out = try_join_all(requests.into_iter().map(|(content_type, options)| async move {
            let (page, _) = gateway
                .list::<Question>(EntityKind::Question, &options)
                .await?;
            Ok::<_, ApiError>((content_type, page))
        }));

        let pages = match ticket.run(fan_out).await {
            Ok(pages) => pages,
            Err(ApiError::Cancelled) => return Err(ApiError::Cancelled),
            Err(err) => {
                self.loads
                    .apply_if_current(&ticket, || self.write().store.fetch_failed());
                tracing::warn!("Question fan-out failed, nothing merged: {}", err);
                return Err(err);
            }
        };

        let applied = self.loads.apply_if_current(&ticket, || {
            let mut state = self.write();
            if !continuation {
                state.streams.clear();
            }

            let mut results = Vec::new();
            for (content_type, page) in pages {
                state.streams.insert(content_type, page.cursor());
                results.extend(page.results);
            }

            let total = state.total();
            state.store.settle(total, results, continuation);
        });

        match applied {
            Some(()) => Ok(()),
            None => {
                tracing::debug!("Discarding superseded question pages");
                Err(ApiError::Cancelled)
            }
        }
    }

    // ==================== WRITES ====================

    pub async fn create(
        &self,
        content_type: QuestionContentType,
        mut data: Map<String, Value>,
    ) -> Result<Question, ApiError> {
        data.insert(CONTENT_TYPE.to_string(), Value::from(content_type.as_str()));
        let question: Question = self
            .gateway
            .create(EntityKind::Question, Payload::Json(data), &content_type_query(content_type))
            .await?;
        tracing::info!("Created question {}", question.key());
        self.write().store.add_one(question.clone());
        Ok(question)
    }

    /// Send only the changed fields of an edited question.
    pub async fn update(&self, original: &Question, edited: &Question) -> Result<Question, ApiError> {
        let changes = diff_records(original, edited)?;
        if changes.is_empty() {
            return Ok(original.clone());
        }
        self.update_fields(original.key(), changes).await
    }

    pub async fn update_fields(&self, key: QuestionKey, changes: Map<String, Value>) -> Result<Question, ApiError> {
        let question: Question = self
            .gateway
            .update(
                EntityKind::Question,
                key.id,
                Payload::Json(changes),
                &content_type_query(key.content_type),
            )
            .await?;
        let changes = to_map(&question)?;
        self.write().store.update_one(&key, changes);
        tracing::info!("Updated question {}", key);
        Ok(question)
    }

    pub async fn remove(&self, key: QuestionKey) -> Result<(), ApiError> {
        self.gateway
            .delete(
                EntityKind::Question,
                &DeleteTarget::One(key.id),
                &content_type_query(key.content_type),
            )
            .await?;
        self.write().store.remove_one(&key);
        tracing::info!("Deleted question {}", key);
        Ok(())
    }

    /// Bulk delete, one request per sub-type issued concurrently. The store
    /// is only touched once every request succeeded.
    pub async fn remove_many(&self, keys: &[QuestionKey]) -> Result<(), ApiError> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut groups: BTreeMap<QuestionContentType, Vec<i64>> = BTreeMap::new();
        for key in keys {
            groups.entry(key.content_type).or_default().push(key.id);
        }

        let gateway = &self.gateway;
        try_join_all(groups.into_iter().map(|(content_type, ids)| async move {
            gateway
                .delete(
                    EntityKind::Question,
                    &DeleteTarget::Many(ids),
                    &content_type_query(content_type),
                )
                .await
        }))
        .await?;

        let removed = self.write().store.remove_many(keys);
        tracing::info!("Deleted {} questions", removed);
        Ok(())
    }

    // ==================== SELECTORS ====================

    pub fn select_all(&self) -> Vec<Question> {
        self.read().store.select_all()
    }

    pub fn select_by_id(&self, key: &QuestionKey) -> Option<Question> {
        self.read().store.select_by_id(key)
    }

    pub fn loading_state(&self) -> LoadingState {
        self.read().store.loading_state()
    }

    /// Total across all sub-types.
    pub fn count(&self) -> u64 {
        self.read().total()
    }

    pub fn stream(&self, content_type: QuestionContentType) -> Option<PageCursor> {
        self.read().streams.get(&content_type).cloned()
    }

    /// True while at least one sub-type stream has a `next` cursor.
    pub fn has_more(&self) -> bool {
        self.read().streams.values().any(PageCursor::has_more)
    }
}

fn content_type_query(content_type: QuestionContentType) -> Vec<(String, String)> {
    vec![(CONTENT_TYPE.to_string(), content_type.to_string())]
}
