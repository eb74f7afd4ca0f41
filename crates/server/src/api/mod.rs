//! JSON API over the quote services.
//!
//! - `POST  /api/quotes`                                  create a quote
//! - `GET   /api/quotes/recent?limit=`                    recently updated quotes
//! - `GET   /api/quotes/{id}` / `PUT /api/quotes/{id}`    read / replace
//! - `POST  /api/quotes/{id}/reprice`                     pricing breakdown
//! - `PATCH /api/quotes/{id}/days`                        destination range
//! - `GET   /api/quotes/{id}/versions`                    version history
//! - `POST  /api/quotes/{id}/versions`                    manual version
//! - `GET   /api/quotes/{id}/versions/{vid}` / `PATCH`    read / relabel
//! - `POST  /api/quotes/{id}/versions/{vid}/archive`      archive
//! - `POST  /api/quotes/{id}/versions/{vid}/restore`      restore
//! - `GET   /api/quotes/{id}/export/word`                 itinerary document
//! - `GET   /api/quotes/{id}/export/excel`                pricing workbook

mod error;
mod exports;
mod quotes;
mod versions;

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::routing::{get, patch, post};
use axum::Router;
use magalia_core::errors::ApplicationError;

pub use error::{ApiError, ErrorBody};

use crate::services::RequestContext;
use crate::state::AppState;

/// Optional caller identity recorded as `created_by` and audit actor.
pub const ACTOR_HEADER: &str = "x-actor";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/quotes", post(quotes::create))
        .route("/api/quotes/recent", get(quotes::recent))
        .route("/api/quotes/{id}", get(quotes::get).put(quotes::update))
        .route("/api/quotes/{id}/reprice", post(quotes::reprice))
        .route("/api/quotes/{id}/days", patch(quotes::patch_days))
        .route("/api/quotes/{id}/versions", get(versions::list).post(versions::create))
        .route("/api/quotes/{id}/versions/{vid}", get(versions::get).patch(versions::patch))
        .route("/api/quotes/{id}/versions/{vid}/archive", post(versions::archive))
        .route("/api/quotes/{id}/versions/{vid}/restore", post(versions::restore))
        .route("/api/quotes/{id}/export/word", get(exports::word))
        .route("/api/quotes/{id}/export/excel", get(exports::excel))
        .with_state(state)
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        Ok(RequestContext::new(actor))
    }
}

pub(crate) trait OrReject<T> {
    fn or_reject(self, context: &RequestContext) -> Result<T, ApiError>;
}

impl<T> OrReject<T> for Result<T, ApplicationError> {
    fn or_reject(self, context: &RequestContext) -> Result<T, ApiError> {
        self.map_err(|error| ApiError::from_application(error, &context.correlation_id))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use axum::Router;
    use magalia_core::config::AppConfig;
    use magalia_export::MemoryImageFetcher;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::router;
    use crate::services::tests::fixture;
    use crate::state::AppState;

    fn app() -> Router {
        let fixture = fixture();
        let mut config = AppConfig::default();
        config.export.word_template_path =
            std::env::temp_dir().join("magalia-api-tests").join("missing.docx");
        router(AppState::new(&fixture.repositories, &config, Arc::new(MemoryImageFetcher::new())))
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, _, bytes) = send_raw(app, method, uri, body, None).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }

    async fn send_raw(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
        actor: Option<&str>,
    ) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(actor) = actor {
            request = request.header("X-Actor", actor);
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .expect("request");

        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body bytes");
        (status, headers, bytes.to_vec())
    }

    fn quote_payload() -> Value {
        json!({
            "title": "Amalfi coast",
            "pax": 4,
            "days": [
                {
                    "date": "2024-05-10",
                    "destination": "Positano",
                    "lines": [{
                        "category": "Activity",
                        "title": "Boat tour",
                        "achat_eur": "250",
                        "raw_json": {"start_time": "10:00"}
                    }]
                },
                {"date": "2024-05-11", "destination": "Positano", "lines": []}
            ]
        })
    }

    async fn create_quote(app: &Router) -> i64 {
        let (status, body) = send(app, Method::POST, "/api/quotes", Some(quote_payload())).await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().expect("quote id")
    }

    #[tokio::test]
    async fn create_then_get_returns_the_read_view() {
        let app = app();
        let id = create_quote(&app).await;

        let (status, body) = send(&app, Method::GET, &format!("/api/quotes/{id}"), None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Amalfi coast");
        assert_eq!(body["days"].as_array().map(Vec::len), Some(2));
        assert_eq!(body["days"][0]["lines"][0]["raw_json"], json!({"start_time": "10:00"}));
        assert_eq!(body["onspot_total"], "27");
    }

    #[tokio::test]
    async fn unknown_quote_returns_404_with_correlation_id() {
        let app = app();

        let (status, body) = send(&app, Method::GET, "/api/quotes/4040", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "The requested resource does not exist.");
        assert_eq!(body["detail"], "quote `4040` not found");
        assert!(body["correlation_id"].as_str().is_some_and(|id| !id.is_empty()));
    }

    #[tokio::test]
    async fn invalid_date_returns_400() {
        let app = app();

        let payload = json!({"start_date": "2024-13-45"});
        let (status, body) = send(&app, Method::POST, "/api/quotes", Some(payload)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().is_some_and(|detail| detail.contains("start_date")));
    }

    #[tokio::test]
    async fn manual_version_records_actor_and_lists_newest_first() {
        let app = app();
        let id = create_quote(&app).await;

        let (status, _, bytes) = send_raw(
            &app,
            Method::POST,
            &format!("/api/quotes/{id}/versions"),
            Some(json!({"comment": "sent to client"})),
            Some("lea@magalia.travel"),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let created: Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(created["label"], "v2");
        assert_eq!(created["created_by"], "lea@magalia.travel");

        let (status, page) =
            send(&app, Method::GET, &format!("/api/quotes/{id}/versions?limit=1"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total"], 2);
        assert_eq!(page["has_more"], true);
        assert_eq!(page["items"][0]["label"], "v2");
    }

    #[tokio::test]
    async fn blank_manual_comment_is_rejected() {
        let app = app();
        let id = create_quote(&app).await;

        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/api/quotes/{id}/versions"),
            Some(json!({"comment": "  "})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn archive_hides_version_from_default_listing() {
        let app = app();
        let id = create_quote(&app).await;
        let (_, page) = send(&app, Method::GET, &format!("/api/quotes/{id}/versions"), None).await;
        let version_id = page["items"][0]["id"].as_i64().expect("version id");

        let (status, archived) = send(
            &app,
            Method::POST,
            &format!("/api/quotes/{id}/versions/{version_id}/archive"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(archived["archived_at"].is_string());

        let (_, page) = send(&app, Method::GET, &format!("/api/quotes/{id}/versions"), None).await;
        assert_eq!(page["total"], 0);
        let (_, page) = send(
            &app,
            Method::GET,
            &format!("/api/quotes/{id}/versions?include_archived=true"),
            None,
        )
        .await;
        assert_eq!(page["total"], 1);
    }

    #[tokio::test]
    async fn restore_returns_the_restored_quote() {
        let app = app();
        let id = create_quote(&app).await;
        let (_, page) = send(&app, Method::GET, &format!("/api/quotes/{id}/versions"), None).await;
        let initial = page["items"][0]["id"].as_i64().expect("version id");

        let mut edit = quote_payload();
        edit["title"] = json!("Sicily instead");
        let (status, _) = send(&app, Method::PUT, &format!("/api/quotes/{id}"), Some(edit)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, restored) = send(
            &app,
            Method::POST,
            &format!("/api/quotes/{id}/versions/{initial}/restore"),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(restored["title"], "Amalfi coast");
    }

    #[tokio::test]
    async fn reprice_returns_breakdown() {
        let app = app();
        let id = create_quote(&app).await;

        let (status, body) =
            send(&app, Method::POST, &format!("/api/quotes/{id}/reprice"), None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["trip_days"], 2);
        assert_eq!(body["effective_days"], 3);
        assert_eq!(body["onspot_cards"], 1);
        assert!(body["trace"].as_array().is_some_and(|steps| !steps.is_empty()));
    }

    #[tokio::test]
    async fn recent_lists_summaries() {
        let app = app();
        create_quote(&app).await;
        create_quote(&app).await;

        let (status, body) = send(&app, Method::GET, "/api/quotes/recent?limit=1", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(1));
        assert_eq!(body[0]["title"], "Amalfi coast");
    }

    #[tokio::test]
    async fn destination_patch_updates_days() {
        let app = app();
        let id = create_quote(&app).await;

        let (status, body) = send(
            &app,
            Method::PATCH,
            &format!("/api/quotes/{id}/days"),
            Some(json!({
                "start_date": "2024-05-11",
                "nights": 1,
                "destination": "Ravello",
                "overwrite": true
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["days"][1]["destination"], "Ravello");
    }

    #[tokio::test]
    async fn excel_export_is_an_attachment() {
        let app = app();
        let id = create_quote(&app).await;

        let (status, headers, bytes) = send_raw(
            &app,
            Method::GET,
            &format!("/api/quotes/{id}/export/excel?create_version=true"),
            None,
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            headers[header::CONTENT_TYPE],
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        );
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            format!("attachment; filename=\"quote_{id}.xlsx\"").as_str()
        );
        assert_eq!(&bytes[..2], b"PK");

        let (_, page) = send(&app, Method::GET, &format!("/api/quotes/{id}/versions"), None).await;
        assert_eq!(page["items"][0]["type"], "auto_export_excel");
    }

    #[tokio::test]
    async fn word_export_uses_the_docx_mime_type() {
        let app = app();
        let id = create_quote(&app).await;

        let uri = format!("/api/quotes/{id}/export/word");
        let (status, headers, _) = send_raw(&app, Method::GET, &uri, None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            headers[header::CONTENT_TYPE],
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        );
    }
}
