//! Range-aware object delivery.

use crate::domain::video::content_type;
use crate::error::ApiError;
use crate::ports::storage::{ObjectBody, ObjectStore};
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use futures::TryStreamExt;
use std::sync::Arc;

/// Serves stored objects, whole or by byte range.
#[derive(Clone)]
pub struct Delivery {
    store: Arc<dyn ObjectStore>,
}

impl Delivery {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Serve `key`. A non-empty `range` yields `206` with the store's range
    /// headers; otherwise the whole object is sent with `200`, and
    /// `download_name` (source files only) becomes an attachment disposition.
    pub async fn serve(
        &self,
        key: &str,
        range: Option<&str>,
        download_name: Option<&str>,
    ) -> Result<Response, ApiError> {
        match range.map(str::trim).filter(|r| !r.is_empty()) {
            Some(range) => {
                tracing::debug!(key, range, "serving partial object");
                let object = self.store.get_range(key, range).await?;
                Ok(partial_response(key, object))
            }
            None => {
                let object = self.store.get(key).await?;
                Ok(full_response(key, object, download_name))
            }
        }
    }
}

fn full_response(key: &str, object: ObjectBody, download_name: Option<&str>) -> Response {
    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type(key))
        .header(header::CONTENT_LENGTH, object.content_length);

    if let Some(name) = download_name {
        let disposition = format!("attachment; filename={name}");
        match HeaderValue::from_str(&disposition) {
            Ok(value) => response = response.header(header::CONTENT_DISPOSITION, value),
            Err(_) => tracing::warn!(key, name, "download name is not a valid header value"),
        }
    }

    finish(response, key, object)
}

fn partial_response(key: &str, object: ObjectBody) -> Response {
    let mut response = Response::builder()
        .status(StatusCode::PARTIAL_CONTENT)
        .header(header::CONTENT_TYPE, content_type(key))
        .header(header::CONTENT_LENGTH, object.content_length);

    if let Some(value) = object.content_range.as_deref() {
        response = response.header(header::CONTENT_RANGE, value);
    }
    if let Some(value) = object.accept_ranges.as_deref() {
        response = response.header(header::ACCEPT_RANGES, value);
    }

    finish(response, key, object)
}

fn finish(builder: axum::http::response::Builder, key: &str, object: ObjectBody) -> Response {
    let logged_key = key.to_string();
    // Headers are committed once streaming starts; a failure can only end the body.
    let body = object.body.inspect_err(move |e| {
        tracing::error!(key = %logged_key, error = %e, "object stream failed mid-body");
    });

    builder
        .body(Body::from_stream(body))
        .unwrap_or_else(|e| {
            tracing::error!(key, error = %e, "cannot build object response");
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        })
}
