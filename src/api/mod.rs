//! API gateway.
//!
//! One authenticated HTTP client exposing list/create/update/delete for every
//! entity collection with uniform path and pagination conventions.

mod options;
mod users;

pub use options::*;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::errors::ApiError;
use crate::models::{Breadcrumb, EntityKind, ListResponse, Page};

/// HTTP client for the catalogue REST API.
///
/// Built once at start-up and shared by reference; see [`crate::console::Console`].
pub struct Gateway {
    client: reqwest::Client,
    base_url: String,
}

impl Gateway {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        reqwest::Url::parse(&config.api_base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", config.api_base_url, e)))?;

        let mut headers = HeaderMap::new();
        if let Some(token) = &config.api_token {
            let value = HeaderValue::from_str(&format!("{} {}", config.auth_scheme, token))
                .map_err(|e| ApiError::InvalidHeader(e.to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self::with_client(client, &config.api_base_url))
    }

    /// Create a gateway reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ==================== ENTITY OPERATIONS ====================

    /// GET a page of a collection.
    pub async fn list<T: DeserializeOwned>(
        &self,
        kind: EntityKind,
        options: &ListOptions,
    ) -> Result<(Page<T>, Option<Breadcrumb>), ApiError> {
        let request = match &options.url {
            Some(url) => self.request(Method::GET, url),
            None => self
                .request(Method::GET, kind.collection_path())
                .query(&options.query),
        };

        let response: ListResponse<T> = self.fetch_json(request).await?;
        let (page, breadcrumb) = response.into_parts();

        tracing::debug!(
            "Listed {} page: {} of {} results, next={:?}",
            kind.as_str(),
            page.results.len(),
            page.count,
            page.next
        );

        Ok((page, breadcrumb))
    }

    /// POST a new record; returns the created record.
    pub async fn create<T: DeserializeOwned>(
        &self,
        kind: EntityKind,
        payload: Payload,
        query: &[(String, String)],
    ) -> Result<T, ApiError> {
        let request = self
            .request(Method::POST, kind.collection_path())
            .query(query);
        let request = Self::with_payload(request, payload)?;
        self.fetch_json(request).await
    }

    /// PATCH the changed fields of a record; returns the full updated record.
    pub async fn update<T: DeserializeOwned>(
        &self,
        kind: EntityKind,
        id: i64,
        payload: Payload,
        query: &[(String, String)],
    ) -> Result<T, ApiError> {
        let request = self
            .request(Method::PATCH, &detail_path(kind, &id.to_string()))
            .query(query);
        let request = Self::with_payload(request, payload)?;
        self.fetch_json(request).await
    }

    /// DELETE one record, or many through the bulk-delete endpoint.
    pub async fn delete(
        &self,
        kind: EntityKind,
        target: &DeleteTarget,
        query: &[(String, String)],
    ) -> Result<(), ApiError> {
        let request = match target {
            DeleteTarget::One(id) => self
                .request(Method::DELETE, &detail_path(kind, &id.to_string()))
                .query(query),
            DeleteTarget::Many(ids) => self
                .request(Method::DELETE, &detail_path(kind, BULK_DELETE))
                .query(&[("ids", join_ids(ids))])
                .query(query),
        };

        self.send(request).await?;
        Ok(())
    }

    // ==================== TRANSPORT HELPERS ====================

    /// Absolute URLs (continuation cursors) are used verbatim; paths are
    /// resolved against the base URL.
    fn resolve(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.resolve(path);
        tracing::debug!("{} {}", method, url);
        self.client.request(method, url)
    }

    fn with_payload(request: RequestBuilder, payload: Payload) -> Result<RequestBuilder, ApiError> {
        Ok(match payload {
            Payload::Json(body) => request.json(&body),
            Payload::Multipart(body) => request.multipart(body.into_form()?),
        })
    }

    /// Send a request and ensure it succeeded.
    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!("Request failed: {}", e);
            ApiError::from(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        let err = ApiError::from_status(status.as_u16(), body);

        tracing::warn!("{} from {}: {}", err.error_code(), url, err);
        Err(err)
    }

    /// Send a request and parse its JSON body.
    async fn fetch_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

fn detail_path(kind: EntityKind, id: &str) -> String {
    format!("{}{}/", kind.collection_path(), id)
}
