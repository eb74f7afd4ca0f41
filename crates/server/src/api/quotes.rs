use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use magalia_core::domain::input::QuoteInput;
use magalia_core::domain::quote::QuoteId;
use magalia_core::domain::view::{QuoteSummary, QuoteView};
use magalia_core::pricing::PricingResult;
use serde::Deserialize;

use super::{ApiError, OrReject};
use crate::services::{DestinationRangePatch, RequestContext};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<u32>,
}

pub async fn create(
    State(state): State<AppState>,
    context: RequestContext,
    Json(input): Json<QuoteInput>,
) -> Result<(StatusCode, Json<QuoteView>), ApiError> {
    let view = state.quotes.create(&context, input).await.or_reject(&context)?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn recent(
    State(state): State<AppState>,
    context: RequestContext,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<QuoteSummary>>, ApiError> {
    state.quotes.recent(query.limit).await.or_reject(&context).map(Json)
}

pub async fn get(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
) -> Result<Json<QuoteView>, ApiError> {
    state.quotes.get(QuoteId(id)).await.or_reject(&context).map(Json)
}

pub async fn update(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
    Json(input): Json<QuoteInput>,
) -> Result<Json<QuoteView>, ApiError> {
    state.quotes.update(&context, QuoteId(id), input).await.or_reject(&context).map(Json)
}

pub async fn reprice(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
) -> Result<Json<PricingResult>, ApiError> {
    state.quotes.reprice(&context, QuoteId(id)).await.or_reject(&context).map(Json)
}

pub async fn patch_days(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
    Json(patch): Json<DestinationRangePatch>,
) -> Result<Json<QuoteView>, ApiError> {
    state
        .quotes
        .patch_destination_range(&context, QuoteId(id), patch)
        .await
        .or_reject(&context)
        .map(Json)
}
