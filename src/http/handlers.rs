use super::AppState;
use crate::application::catalog::{Upload, VideoEdit};
use crate::domain::video::{content_type, is_valid_id, keys, SegmentRequest, VideoAsset};
use crate::error::ApiError;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

fn range_of(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::RANGE).and_then(|v| v.to_str().ok())
}

fn valid_id(id: &str) -> Result<(), ApiError> {
    if is_valid_id(id) {
        Ok(())
    } else {
        Err(ApiError::Validation(format!("invalid video id {id}")))
    }
}

async fn cover_key(state: &AppState, id: &str) -> Result<String, ApiError> {
    let video = state.catalog.get(id).await?;
    video
        .cover_key
        .ok_or_else(|| ApiError::NotFound(format!("cover of video {id}")))
}

pub async fn cover(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let key = cover_key(&state, &id).await?;
    state.delivery.serve(&key, None, None).await
}

pub async fn cover_head(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let key = cover_key(&state, &id).await?;
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, content_type(&key))]).into_response())
}

pub async fn master(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    valid_id(&id)?;
    state.delivery.serve(&keys::master(&id), None, None).await
}

pub async fn source(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let video = state.catalog.get(&id).await?;
    state
        .delivery
        .serve(
            &video.source_key,
            range_of(&headers),
            Some(&video.download_name()),
        )
        .await
}

pub async fn segment(
    State(state): State<AppState>,
    Path((id, quality, filename)): Path<(String, String, String)>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    valid_id(&id)?;
    let filters = params
        .into_iter()
        .filter(|(name, _)| name == "filter")
        .map(|(_, value)| value);
    let request = SegmentRequest::new(id, quality, filename, filters);

    if request.bypasses_transformation() {
        return state
            .delivery
            .serve(&request.key(), range_of(&headers), None)
            .await;
    }

    let output = state.dispatcher.dispatch(&request).await.inspect_err(|e| {
        tracing::error!(
            video_id = %request.video_id,
            key = %request.key(),
            filters = ?request.filter_chain,
            error = %e,
            "segment transformation failed"
        );
    })?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type(&request.filename))],
        output,
    )
        .into_response())
}

pub async fn subtitles(
    State(state): State<AppState>,
    Path((id, filename)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    valid_id(&id)?;
    state
        .delivery
        .serve(&keys::subtitle_file(&id, &filename), None, None)
        .await
}

pub async fn edit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<VideoAsset>, ApiError> {
    valid_id(&id)?;

    let mut edit = VideoEdit::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => {
                let title = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Validation(e.body_text()))?;
                edit.title = Some(title);
            }
            "cover" | "subs" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Validation(e.body_text()))?;
                let upload = Some(Upload { file_name, data });
                if name == "cover" {
                    edit.cover = upload;
                } else {
                    edit.subs = upload;
                }
            }
            other => tracing::debug!(video_id = %id, field = other, "ignoring form field"),
        }
    }

    Ok(Json(state.catalog.edit(&id, edit).await?))
}
