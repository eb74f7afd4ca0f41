use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use magalia_core::domain::quote::QuoteId;
use magalia_core::domain::version::{QuoteVersion, VersionId, VersionListFilter};
use magalia_core::domain::view::QuoteView;
use serde::{Deserialize, Serialize};

use super::{ApiError, OrReject};
use crate::services::{RequestContext, VersionPatch};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct VersionListQuery {
    pub include_archived: Option<bool>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl VersionListQuery {
    fn filter(&self) -> VersionListFilter {
        let defaults = VersionListFilter::default();
        VersionListFilter {
            include_archived: self.include_archived.unwrap_or(defaults.include_archived),
            limit: self.limit.unwrap_or(defaults.limit),
            offset: self.offset.unwrap_or(defaults.offset),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VersionListResponse {
    pub items: Vec<QuoteVersion>,
    pub total: u64,
    pub has_more: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateVersionRequest {
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PatchVersionRequest {
    pub label: Option<String>,
    pub comment: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
    Query(query): Query<VersionListQuery>,
) -> Result<Json<VersionListResponse>, ApiError> {
    let (page, filter) =
        state.versions.list(QuoteId(id), query.filter()).await.or_reject(&context)?;
    let has_more = page.has_more(&filter);
    Ok(Json(VersionListResponse { items: page.items, total: page.total, has_more }))
}

pub async fn create(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
    Json(request): Json<CreateVersionRequest>,
) -> Result<(StatusCode, Json<QuoteVersion>), ApiError> {
    let version = state
        .versions
        .create_manual(&context, QuoteId(id), &request.comment)
        .await
        .or_reject(&context)?;
    Ok((StatusCode::CREATED, Json(version)))
}

pub async fn get(
    State(state): State<AppState>,
    context: RequestContext,
    Path((id, version_id)): Path<(i64, i64)>,
) -> Result<Json<QuoteVersion>, ApiError> {
    state.versions.get(QuoteId(id), VersionId(version_id)).await.or_reject(&context).map(Json)
}

pub async fn patch(
    State(state): State<AppState>,
    context: RequestContext,
    Path((id, version_id)): Path<(i64, i64)>,
    Json(request): Json<PatchVersionRequest>,
) -> Result<Json<QuoteVersion>, ApiError> {
    let patch = VersionPatch { label: request.label, comment: request.comment };
    state
        .versions
        .patch(&context, QuoteId(id), VersionId(version_id), patch)
        .await
        .or_reject(&context)
        .map(Json)
}

pub async fn archive(
    State(state): State<AppState>,
    context: RequestContext,
    Path((id, version_id)): Path<(i64, i64)>,
) -> Result<Json<QuoteVersion>, ApiError> {
    state
        .versions
        .archive(&context, QuoteId(id), VersionId(version_id))
        .await
        .or_reject(&context)
        .map(Json)
}

pub async fn restore(
    State(state): State<AppState>,
    context: RequestContext,
    Path((id, version_id)): Path<(i64, i64)>,
) -> Result<Json<QuoteView>, ApiError> {
    state
        .versions
        .restore(&context, QuoteId(id), VersionId(version_id))
        .await
        .or_reject(&context)
        .map(Json)
}
