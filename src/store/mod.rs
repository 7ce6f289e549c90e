//! In-memory list state for one entity type.
//!
//! The store is the single source of truth for its entity type within a
//! session. It never performs network calls and never fails: fetch outcomes
//! are reflected through [`LoadingState`] only.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::diff::to_map;
use crate::models::{by_created_at, Breadcrumb, Entity, Page, PageCursor};

/// Fetch lifecycle of a list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadingState {
    #[default]
    Idle,
    Pending,
    Success,
    Failed,
}

impl LoadingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadingState::Idle => "idle",
            LoadingState::Pending => "pending",
            LoadingState::Success => "success",
            LoadingState::Failed => "failed",
        }
    }
}

/// Display order of a store's entities.
pub type Comparator<E> = Arc<dyn Fn(&E, &E) -> Ordering + Send + Sync>;

/// Normalized collection of one entity type plus its pagination envelope.
pub struct EntityStore<E: Entity> {
    entities: HashMap<E::Key, E>,
    loading_state: LoadingState,
    cursor: PageCursor,
    breadcrumb: Option<Breadcrumb>,
    comparator: Comparator<E>,
}

impl<E: Entity> Default for EntityStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> EntityStore<E> {
    /// Empty store ordered by ascending `created_at`.
    pub fn new() -> Self {
        Self::with_comparator(Arc::new(by_created_at::<E>))
    }

    pub fn with_comparator(comparator: Comparator<E>) -> Self {
        Self {
            entities: HashMap::new(),
            loading_state: LoadingState::Idle,
            cursor: PageCursor::default(),
            breadcrumb: None,
            comparator,
        }
    }

    // ==================== MUTATIONS ====================

    /// Replace the whole collection.
    pub fn set_all(&mut self, entities: impl IntoIterator<Item = E>) {
        self.entities = entities
            .into_iter()
            .map(|entity| (entity.key(), entity))
            .collect();
    }

    /// Merge entities into the collection, replacing existing keys.
    pub fn add_many(&mut self, entities: impl IntoIterator<Item = E>) {
        for entity in entities {
            self.entities.insert(entity.key(), entity);
        }
    }

    /// Insert an entity unless its key is already present.
    pub fn add_one(&mut self, entity: E) -> bool {
        let key = entity.key();
        if self.entities.contains_key(&key) {
            return false;
        }
        self.entities.insert(key, entity);
        true
    }

    /// Shallow-merge `changes` into the stored entity.
    ///
    /// No-op when the key is unknown or the merged record is not a valid `E`.
    /// A change to the entity's identity moves it to its new key.
    pub fn update_one(&mut self, key: &E::Key, changes: Map<String, Value>) -> bool {
        let Some(current) = self.entities.get(key) else {
            return false;
        };

        let merged = match to_map(current) {
            Ok(mut fields) => {
                fields.extend(changes);
                serde_json::from_value::<E>(Value::Object(fields))
            }
            Err(err) => Err(err),
        };

        match merged {
            Ok(updated) => {
                self.entities.remove(key);
                self.entities.insert(updated.key(), updated);
                true
            }
            Err(err) => {
                tracing::warn!(
                    "Ignoring update for {} {:?}: merged record is invalid: {}",
                    E::KIND.as_str(),
                    key,
                    err
                );
                false
            }
        }
    }

    pub fn remove_one(&mut self, key: &E::Key) -> bool {
        self.entities.remove(key).is_some()
    }

    pub fn remove_many<'a>(&mut self, keys: impl IntoIterator<Item = &'a E::Key>) -> usize {
        keys.into_iter()
            .filter(|key| self.entities.remove(*key).is_some())
            .count()
    }

    // ==================== FETCH LIFECYCLE ====================

    /// A fetch started. Only an empty list shows as pending, so background
    /// refreshes and load-more never blank a populated view.
    pub fn begin_fetch(&mut self) {
        if self.cursor.count == 0 {
            self.loading_state = LoadingState::Pending;
        }
    }

    /// A fetch settled successfully.
    ///
    /// `continuation` is true when the page came from a `next` cursor; its
    /// results are merged instead of replacing the collection.
    pub fn fetch_succeeded(&mut self, page: Page<E>, breadcrumb: Option<Breadcrumb>, continuation: bool) {
        self.loading_state = LoadingState::Success;
        self.cursor = page.cursor();
        if breadcrumb.is_some() {
            self.breadcrumb = breadcrumb;
        }

        if continuation {
            self.add_many(page.results);
        } else {
            self.set_all(page.results);
        }
    }

    /// A fetch failed. Populated lists keep their data and state.
    pub fn fetch_failed(&mut self) {
        if self.cursor.count == 0 {
            self.loading_state = LoadingState::Failed;
        }
    }

    /// Settle a fetch whose pagination is tracked elsewhere (question
    /// sub-type streams).
    pub fn settle(&mut self, total: u64, entities: Vec<E>, continuation: bool) {
        self.loading_state = LoadingState::Success;
        self.cursor = PageCursor {
            count: total,
            next: None,
            previous: None,
        };
        if continuation {
            self.add_many(entities);
        } else {
            self.set_all(entities);
        }
    }

    // ==================== SELECTORS ====================

    /// Entities in display order.
    pub fn select_all(&self) -> Vec<E> {
        let mut entities: Vec<E> = self.entities.values().cloned().collect();
        entities.sort_by(|a, b| (self.comparator)(a, b));
        entities
    }

    pub fn select_by_id(&self, key: &E::Key) -> Option<E> {
        self.entities.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn loading_state(&self) -> LoadingState {
        self.loading_state
    }

    pub fn count(&self) -> u64 {
        self.cursor.count
    }

    pub fn next(&self) -> Option<&str> {
        self.cursor.next.as_deref()
    }

    pub fn breadcrumb(&self) -> Option<&Breadcrumb> {
        self.breadcrumb.as_ref()
    }
}
