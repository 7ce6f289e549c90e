//! Fetch orchestration.
//!
//! Translates UI intent (fresh load, search, load more, create, edit, delete)
//! into gateway calls and store mutations, one orchestrator per entity type.

mod courses;
mod debounce;
mod list;
mod questions;

pub use debounce::*;
pub use list::*;
pub use questions::*;

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::errors::ApiError;
use crate::models::EntityKind;

/// Parent-scope filters of a list, e.g. `course=4` for modules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    filters: Vec<(String, String)>,
}

impl Scope {
    /// Unscoped: the whole collection.
    pub fn all() -> Self {
        Self::default()
    }

    /// Children of `parent_id` for a nested collection. Collections without a
    /// parent yield an unscoped list.
    pub fn within(kind: EntityKind, parent_id: i64) -> Self {
        match kind.parent_param() {
            Some(param) => Self::all().filter(param, parent_id),
            None => {
                tracing::warn!("{} lists have no parent scope", kind.as_str());
                Self::all()
            }
        }
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        let key = key.into();
        self.filters.retain(|(existing, _)| *existing != key);
        self.filters.push((key, value.to_string()));
        self
    }

    pub fn filters(&self) -> &[(String, String)] {
        &self.filters
    }

    /// Query parameters for a fresh load, with an optional search term.
    pub fn query(&self, search: Option<&str>) -> Vec<(String, String)> {
        let mut query = self.filters.clone();
        if let Some(term) = search {
            query.push(("search".to_string(), term.to_string()));
        }
        query
    }
}

/// Identity of one in-flight load.
#[derive(Debug, Clone)]
pub(crate) struct LoadTicket {
    generation: u64,
    token: CancellationToken,
}

impl LoadTicket {
    /// Run `request` unless a newer fresh load cancels it first.
    pub(crate) async fn run<T>(
        &self,
        request: impl Future<Output = Result<T, ApiError>>,
    ) -> Result<T, ApiError> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(ApiError::Cancelled),
            result = request => result,
        }
    }
}

/// Supersession of fresh loads within one list.
///
/// Each fresh load starts a new generation and cancels everything issued
/// under the previous one, so a stale response can never overwrite newer
/// data regardless of completion order.
#[derive(Debug, Default)]
pub(crate) struct LoadGuard {
    current: Mutex<(u64, CancellationToken)>,
}

impl LoadGuard {
    fn lock(&self) -> MutexGuard<'_, (u64, CancellationToken)> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a fresh load, cancelling in-flight loads of the previous one.
    pub(crate) fn begin_fresh(&self) -> LoadTicket {
        let mut current = self.lock();
        current.1.cancel();
        current.0 += 1;
        current.1 = CancellationToken::new();
        LoadTicket {
            generation: current.0,
            token: current.1.child_token(),
        }
    }

    /// Join the current generation (load more).
    pub(crate) fn join_current(&self) -> LoadTicket {
        let current = self.lock();
        LoadTicket {
            generation: current.0,
            token: current.1.child_token(),
        }
    }

    /// Run `apply` only if `ticket` still belongs to the current generation.
    pub(crate) fn apply_if_current<R>(&self, ticket: &LoadTicket, apply: impl FnOnce() -> R) -> Option<R> {
        let current = self.lock();
        (current.0 == ticket.generation).then(apply)
    }
}
