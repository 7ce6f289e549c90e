//! Course-specific writes: the illustration is a binary upload.

use serde_json::{Map, Value};

use super::EntityList;
use crate::api::{MultipartBody, Payload};
use crate::diff::diff_records;
use crate::errors::ApiError;
use crate::models::{Course, CourseEdit, NewCourse};

/// Field that only ever travels as a multipart file part.
const ILLUSTRATION: &str = "illustration";

impl EntityList<Course> {
    /// Create a course with its illustration in one multipart request.
    pub async fn create_course(&self, course: NewCourse) -> Result<Course, ApiError> {
        let mut fields = Map::new();
        fields.insert("name".to_string(), Value::from(course.name));
        fields.insert("description".to_string(), Value::from(course.description));
        fields.insert("is_visible".to_string(), Value::from(course.is_visible));
        fields.insert("tags".to_string(), Value::from(course.tags));

        let body = MultipartBody::new()
            .record(&fields)
            .file(ILLUSTRATION, course.illustration);

        self.create_with(Payload::Multipart(body)).await
    }

    /// Save an edited course.
    ///
    /// A new illustration is uploaded first as a multipart PATCH and its
    /// confirmed record applied to the store; only then are the remaining
    /// changed fields sent as a JSON PATCH. Returns the final record.
    ///
    /// The two requests are not atomic. If the field PATCH fails after the
    /// illustration was saved, its error is returned while the store already
    /// holds the record with the new illustration (see `select_by_id`).
    pub async fn update_course(&self, original: &Course, edit: CourseEdit) -> Result<Course, ApiError> {
        let mut changes = diff_records(original, &edit.course)?;
        changes.remove(ILLUSTRATION);

        let mut current = original.clone();
        let uploaded = edit.illustration.is_some();

        if let Some(upload) = edit.illustration {
            let body = MultipartBody::new().file(ILLUSTRATION, upload);
            current = self.update_with(original.id, Payload::Multipart(body)).await?;
            tracing::debug!(
                "Course {} illustration now {}",
                current.id,
                current.illustration.as_deref().unwrap_or("<none>")
            );
        }

        if changes.is_empty() {
            return Ok(current);
        }

        self.update_fields(original.id, changes).await.map_err(|err| {
            if uploaded {
                tracing::warn!(
                    "Course {} illustration saved but field update failed: {}",
                    original.id,
                    err
                );
            }
            err
        })
    }
}
