//! Pagination envelope and the breadcrumb that accompanies nested lists.

use serde::{Deserialize, Serialize};

/// The server's response shape for list queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn cursor(&self) -> PageCursor {
        PageCursor {
            count: self.count,
            next: self.next.clone(),
            previous: self.previous.clone(),
        }
    }
}

/// Pagination bookkeeping kept by a list after each settled fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageCursor {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
}

impl PageCursor {
    pub fn has_more(&self) -> bool {
        self.next.is_some()
    }
}

/// One ancestor in the hierarchy path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crumb {
    pub id: i64,
    pub name: String,
}

/// Path from the course down to the current list's parent.
///
/// Module lists carry `course`; lesson lists add `module`; topic lists add
/// `lesson`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<Crumb>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<Crumb>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson: Option<Crumb>,
}

impl Breadcrumb {
    /// Ancestors root-first, paired with their type name.
    pub fn trail(&self) -> Vec<(&'static str, &Crumb)> {
        [
            ("course", self.course.as_ref()),
            ("module", self.module.as_ref()),
            ("lesson", self.lesson.as_ref()),
        ]
        .into_iter()
        .filter_map(|(kind, crumb)| crumb.map(|crumb| (kind, crumb)))
        .collect()
    }
}

/// A list response, either a bare envelope or the nested-resource wrapper
/// `{ "breadcrumb": .., "response": envelope }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ListResponse<T> {
    Nested {
        #[serde(default)]
        breadcrumb: Option<Breadcrumb>,
        response: Page<T>,
    },
    Flat(Page<T>),
}

impl<T> ListResponse<T> {
    pub fn into_parts(self) -> (Page<T>, Option<Breadcrumb>) {
        match self {
            ListResponse::Nested {
                breadcrumb,
                response,
            } => (response, breadcrumb),
            ListResponse::Flat(page) => (page, None),
        }
    }
}
