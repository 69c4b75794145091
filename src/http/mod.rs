//! HTTP inbound adapter.

mod handlers;

use crate::application::{CatalogService, Delivery, TransformationDispatcher};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, put};
use axum::Router;
use std::sync::Arc;

/// Largest accepted edit form (cover plus subtitles).
pub const MAX_EDIT_BYTES: usize = 32 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub delivery: Delivery,
    pub dispatcher: Arc<TransformationDispatcher>,
    pub catalog: CatalogService,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/v1/videos/:id/cover",
            get(handlers::cover).head(handlers::cover_head),
        )
        .route(
            "/api/v1/videos/:id/streams/master.m3u8",
            get(handlers::master),
        )
        .route(
            "/api/v1/videos/:id/streams/source.mp4",
            get(handlers::source),
        )
        .route(
            "/api/v1/videos/:id/streams/:quality/:filename",
            get(handlers::segment),
        )
        .route(
            "/api/v1/videos/:id/subtitles/:filename",
            get(handlers::subtitles),
        )
        .route(
            "/api/v1/videos/:id",
            put(handlers::edit).layer(DefaultBodyLimit::max(MAX_EDIT_BYTES)),
        )
        .with_state(state)
}
