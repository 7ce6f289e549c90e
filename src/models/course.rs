//! Course model and the request shapes used to create and edit courses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Entity, EntityKind, Tag};

/// Root of the catalogue hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_visible: bool,
    /// URL of the uploaded illustration image
    #[serde(default)]
    pub illustration: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Course {
    type Key = i64;

    const KIND: EntityKind = EntityKind::Course;

    fn key(&self) -> i64 {
        self.id
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        Some(self.created_at)
    }
}

/// A binary file sent as one part of a multipart request.
#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }
}

/// Form values for a new course. Always submitted as multipart.
#[derive(Debug, Clone)]
pub struct NewCourse {
    pub name: String,
    pub description: Option<String>,
    pub is_visible: bool,
    pub tags: Vec<i64>,
    pub illustration: Upload,
}

/// Edited form values for an existing course.
///
/// `course` carries the non-binary fields as edited; `illustration` is set
/// only when the user picked a new file.
#[derive(Debug, Clone)]
pub struct CourseEdit {
    pub course: Course,
    pub illustration: Option<Upload>,
}

impl CourseEdit {
    pub fn new(course: Course) -> Self {
        Self {
            course,
            illustration: None,
        }
    }

    pub fn with_illustration(mut self, upload: Upload) -> Self {
        self.illustration = Some(upload);
        self
    }
}
