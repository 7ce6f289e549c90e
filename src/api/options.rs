//! Request options shared by every entity collection.

use serde_json::{Map, Value};

use crate::models::Upload;

/// Pseudo-id addressing the batch-removal endpoint.
pub const BULK_DELETE: &str = "bulk-delete";

/// Options for a list request.
///
/// A continuation `url` is followed verbatim and wins over `query`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub url: Option<String>,
    pub query: Vec<(String, String)>,
}

impl ListOptions {
    /// Follow a server-provided cursor.
    pub fn continuation(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            query: Vec::new(),
        }
    }

    pub fn with_query(query: Vec<(String, String)>) -> Self {
        Self { url: None, query }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn is_continuation(&self) -> bool {
        self.url.is_some()
    }
}

/// Body of a create or update request.
#[derive(Debug, Clone)]
pub enum Payload {
    Json(Map<String, Value>),
    Multipart(MultipartBody),
}

/// Text fields and files of a multipart form.
#[derive(Debug, Clone, Default)]
pub struct MultipartBody {
    pub fields: Vec<(String, String)>,
    pub files: Vec<(String, Upload)>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record's fields. Arrays become repeated fields, `null` is
    /// skipped, other non-string values are sent in their JSON text form.
    pub fn record(mut self, record: &Map<String, Value>) -> Self {
        for (key, value) in record {
            self.push_value(key, value);
        }
        self
    }

    pub fn file(mut self, key: impl Into<String>, upload: Upload) -> Self {
        self.files.push((key.into(), upload));
        self
    }

    fn push_value(&mut self, key: &str, value: &Value) {
        match value {
            Value::Null => {}
            Value::String(text) => self.fields.push((key.to_string(), text.clone())),
            Value::Array(items) => {
                for item in items {
                    self.push_value(key, item);
                }
            }
            other => self.fields.push((key.to_string(), other.to_string())),
        }
    }

    pub(crate) fn into_form(self) -> Result<reqwest::multipart::Form, reqwest::Error> {
        let mut form = reqwest::multipart::Form::new();
        for (key, value) in self.fields {
            form = form.text(key, value);
        }
        for (key, upload) in self.files {
            let part = reqwest::multipart::Part::bytes(upload.bytes)
                .file_name(upload.file_name)
                .mime_str(&upload.mime_type)?;
            form = form.part(key, part);
        }
        Ok(form)
    }
}

/// What a delete request addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteTarget {
    One(i64),
    /// One batched request for all ids.
    Many(Vec<i64>),
}

/// Comma-joined id list for the `ids` parameter.
pub fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
