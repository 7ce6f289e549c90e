//! The contract every cached record type fulfils.

use std::cmp::Ordering;
use std::fmt::Debug;
use std::hash::Hash;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// The six record types held in list stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Course,
    Module,
    Lesson,
    Topic,
    Question,
    Tag,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Course => "course",
            EntityKind::Module => "module",
            EntityKind::Lesson => "lesson",
            EntityKind::Topic => "topic",
            EntityKind::Question => "question",
            EntityKind::Tag => "tag",
        }
    }

    /// Collection path relative to the API base URL.
    pub fn collection_path(&self) -> &'static str {
        match self {
            EntityKind::Course => "/api/catalogue/courses/",
            EntityKind::Module => "/api/catalogue/modules/",
            EntityKind::Lesson => "/api/catalogue/lessons/",
            EntityKind::Topic => "/api/catalogue/topics/",
            EntityKind::Question => "/api/assessment/questions/",
            EntityKind::Tag => "/api/metadata/tags/",
        }
    }

    /// Query parameter naming the parent a nested list is scoped to.
    pub fn parent_param(&self) -> Option<&'static str> {
        match self {
            EntityKind::Module => Some("course"),
            EntityKind::Lesson => Some("module"),
            EntityKind::Topic => Some("lesson"),
            _ => None,
        }
    }
}

/// A server-identified record of one domain type.
pub trait Entity: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Identity within one store.
    type Key: Clone + Debug + Eq + Hash + Ord + Send + Sync + 'static;

    const KIND: EntityKind;

    fn key(&self) -> Self::Key;

    fn created_at(&self) -> Option<DateTime<Utc>>;
}

/// Default display order: ascending `created_at`, then key.
///
/// Records without a timestamp sort before timestamped ones.
pub fn by_created_at<E: Entity>(a: &E, b: &E) -> Ordering {
    a.created_at()
        .cmp(&b.created_at())
        .then_with(|| a.key().cmp(&b.key()))
}
