use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use magalia_core::domain::quote::QuoteId;
use serde::Deserialize;

use super::{ApiError, OrReject};
use crate::services::{ExportedDocument, RequestContext};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ExcelExportQuery {
    #[serde(default)]
    pub create_version: bool,
}

fn attachment(document: ExportedDocument) -> Response {
    (
        [
            (header::CONTENT_TYPE, document.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", document.file_name),
            ),
        ],
        document.bytes,
    )
        .into_response()
}

pub async fn word(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    state.exports.word(&context, QuoteId(id)).await.or_reject(&context).map(attachment)
}

pub async fn excel(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
    Query(query): Query<ExcelExportQuery>,
) -> Result<Response, ApiError> {
    state
        .exports
        .excel(&context, QuoteId(id), query.create_version)
        .await
        .or_reject(&context)
        .map(attachment)
}
