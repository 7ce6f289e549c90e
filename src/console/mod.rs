//! Application root.
//!
//! Builds one gateway and hands it to every list orchestrator, plus the
//! signed-in user's session state.

use std::sync::{Arc, PoisonError, RwLock};

use serde_json::{Map, Value};

use crate::api::Gateway;
use crate::config::Config;
use crate::errors::ApiError;
use crate::models::{Course, Lesson, Module, Tag, Topic, User};
use crate::store::LoadingState;
use crate::sync::{EntityList, QuestionList, SearchDebouncer};

/// The signed-in user and the state of its last fetch.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub loading_state: LoadingState,
    pub user: Option<User>,
}

pub struct Console {
    pub gateway: Arc<Gateway>,
    pub courses: EntityList<Course>,
    pub modules: EntityList<Module>,
    pub lessons: EntityList<Lesson>,
    pub topics: EntityList<Topic>,
    pub tags: EntityList<Tag>,
    pub questions: QuestionList,
    session: RwLock<SessionState>,
}

impl Console {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let gateway = Arc::new(Gateway::new(config)?);
        Ok(Self::with_gateway(gateway, config))
    }

    pub fn with_gateway(gateway: Arc<Gateway>, config: &Config) -> Self {
        let debouncer = || SearchDebouncer::new(config.search_debounce);

        Self {
            courses: EntityList::new(gateway.clone(), debouncer()),
            modules: EntityList::new(gateway.clone(), debouncer()),
            lessons: EntityList::new(gateway.clone(), debouncer()),
            topics: EntityList::new(gateway.clone(), debouncer()),
            tags: EntityList::new(gateway.clone(), debouncer()),
            questions: QuestionList::new(gateway.clone(), debouncer()),
            gateway,
            session: RwLock::new(SessionState::default()),
        }
    }

    // ==================== SESSION ====================

    pub fn session(&self) -> SessionState {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.session().user
    }

    /// Fetch the signed-in user.
    pub async fn load_current_user(&self) -> Result<User, ApiError> {
        self.update_session(|session| session.loading_state = LoadingState::Pending);

        match self.gateway.current_user().await {
            Ok(user) => {
                tracing::info!("Signed in as {}", user.display_name());
                self.update_session(|session| {
                    session.loading_state = LoadingState::Success;
                    session.user = Some(user.clone());
                });
                Ok(user)
            }
            Err(err) => {
                tracing::warn!("Failed to load current user: {}", err);
                self.update_session(|session| session.loading_state = LoadingState::Failed);
                Err(err)
            }
        }
    }

    pub async fn update_current_user(&self, changes: Map<String, Value>) -> Result<User, ApiError> {
        let user = self.gateway.update_current_user(&changes).await?;
        self.update_session(|session| session.user = Some(user.clone()));
        Ok(user)
    }

    fn update_session(&self, apply: impl FnOnce(&mut SessionState)) {
        let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
        apply(&mut session);
    }
}
