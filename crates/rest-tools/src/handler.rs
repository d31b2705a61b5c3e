//! Tool-handler boundary.
//!
//! Per-entity tool handlers build an [`ApiRequest`] and a markdown renderer and hand both to a
//! [`ToolContext`]. The context runs the call, normalizes the body, builds the pagination
//! window where needed and returns a bounded `CallToolResult`. Upstream failures come back as
//! an error result carrying one classified line; they never escape as Rust errors.

use rmcp::model::{CallToolResult, Content};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::config::{ConfigError, PaginationConfig, RestApiConfig};
use crate::errors::{ErrorCategory, classify};
use crate::format::{OutputFormatter, ResponseFormat};
use crate::normalize::{
    CanonicalCollection, CanonicalRecord, Normalized, flatten_record, normalize,
};
use crate::pagination::{PageRequest, PaginationWindow, window_from_local_slice, window_from_server};
use crate::transport::{ApiRequest, HttpTransport, Transport};

/// Shared, immutable state for all tool handlers of one upstream API.
#[derive(Clone)]
pub struct ToolContext {
    transport: Arc<dyn Transport>,
    formatter: OutputFormatter,
    pagination: PaginationConfig,
}

impl ToolContext {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, config: &RestApiConfig) -> Self {
        Self {
            transport,
            formatter: OutputFormatter::new(&config.output),
            pagination: config.pagination.clone(),
        }
    }

    /// Build a context backed by [`HttpTransport`].
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or has no credential.
    pub fn from_config(config: &RestApiConfig) -> Result<Self, ConfigError> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(Arc::new(transport), config))
    }

    #[must_use]
    pub fn formatter(&self) -> &OutputFormatter {
        &self.formatter
    }

    #[must_use]
    pub fn pagination(&self) -> &PaginationConfig {
        &self.pagination
    }

    /// Page requested by the tool arguments (`offset`, `limit`).
    #[must_use]
    pub fn page_request(&self, arguments: &Value) -> PageRequest {
        PageRequest::from_arguments(arguments, &self.pagination)
    }

    /// Run one request and normalize its body.
    ///
    /// # Errors
    ///
    /// Returns the classified cause when the transport fails.
    pub async fn call(&self, request: ApiRequest) -> Result<Normalized, ErrorCategory> {
        match self.transport.request(request.clone()).await {
            Ok(body) => Ok(normalize(body)),
            Err(e) => {
                let category = classify(&e);
                warn!(
                    method = %request.method,
                    endpoint = %request.endpoint,
                    category = category.kind(),
                    error = %e,
                    "upstream API call failed"
                );
                Err(category)
            }
        }
    }

    /// Fetch a single resource.
    pub async fn get_record<F>(
        &self,
        request: ApiRequest,
        format: ResponseFormat,
        render: F,
    ) -> CallToolResult
    where
        F: FnOnce(&Normalized) -> String,
    {
        match self.call(request).await {
            Ok(normalized) => success_result(self.formatter.format(&normalized, render, format)),
            Err(category) => error_result(&category),
        }
    }

    /// List a resource the upstream paginates: `page` is forwarded as query parameters and the
    /// returned page is windowed against the server-reported total.
    pub async fn list_paginated<F>(
        &self,
        request: ApiRequest,
        page: PageRequest,
        format: ResponseFormat,
        render: F,
    ) -> CallToolResult
    where
        F: FnOnce(&PaginationWindow) -> String,
    {
        let request = request.query_pairs(page.query_pairs(&self.pagination));
        let normalized = match self.call(request).await {
            Ok(n) => n,
            Err(category) => return error_result(&category),
        };

        match normalized.into_collection() {
            Some(collection) => {
                let window = window_from_server(collection, page);
                success_result(self.formatter.format(&window, render, format))
            }
            None => error_result(&ErrorCategory::unexpected(
                "expected a list response from the API",
            )),
        }
    }

    /// List a child collection embedded in a parent resource under `field`.
    ///
    /// The upstream has no paging for it, so the whole collection is fetched once and `page` is
    /// sliced locally. A missing field is an empty collection.
    pub async fn list_embedded<F>(
        &self,
        request: ApiRequest,
        field: &str,
        page: PageRequest,
        format: ResponseFormat,
        render: F,
    ) -> CallToolResult
    where
        F: FnOnce(&PaginationWindow) -> String,
    {
        let parent = match self.call(request).await {
            Ok(n) => n,
            Err(category) => return error_result(&category),
        };

        let children = embedded_children(&parent, field);
        let window = window_from_local_slice(children, page);
        success_result(self.formatter.format(&window, render, format))
    }

    /// Create, update or delete. An empty response body renders `confirmation` instead of
    /// calling `render`.
    pub async fn mutate<F>(
        &self,
        request: ApiRequest,
        format: ResponseFormat,
        confirmation: &str,
        render: F,
    ) -> CallToolResult
    where
        F: FnOnce(&Normalized) -> String,
    {
        match self.call(request).await {
            Ok(Normalized::Passthrough(Value::Null)) => {
                success_result(self.formatter.truncate(confirmation.to_string()))
            }
            Ok(normalized) => success_result(self.formatter.format(&normalized, render, format)),
            Err(category) => error_result(&category),
        }
    }
}

/// Successful result carrying the rendered text.
#[must_use]
pub fn success_result(text: String) -> CallToolResult {
    CallToolResult::success(vec![Content::text(text)])
}

/// One-line error result for a classified failure.
#[must_use]
pub fn error_result(category: &ErrorCategory) -> CallToolResult {
    CallToolResult::error(vec![Content::text(category.to_string())])
}

fn embedded_children(parent: &Normalized, field: &str) -> Vec<CanonicalRecord> {
    let child = match parent {
        Normalized::Record(record) => record.get(field),
        Normalized::Passthrough(value) => value.get(field),
        Normalized::Collection(_) => None,
    };

    match child {
        Some(Value::Array(items)) => items.iter().map(flatten_record).collect(),
        // Relationship-style `{ data: [...] }` wrapper.
        Some(value @ Value::Object(_)) => normalize(value.clone())
            .into_collection()
            .map(|CanonicalCollection { items, .. }| items)
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}
