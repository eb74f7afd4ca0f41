use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use magalia_core::domain::quote::{DayId, Quote, QuoteId, QuoteTotals};
use magalia_core::domain::version::{
    NewQuoteVersion, QuoteVersion, VersionId, VersionListFilter, VersionPage, VersionType,
};
use magalia_core::domain::view::QuoteSummary;
use magalia_core::errors::ApplicationError;

pub mod audit;
pub mod catalog;
pub mod memory;
pub mod quote;
pub mod version;

pub use audit::SqlAuditSink;
pub use catalog::SqlServiceCatalog;
pub use memory::{InMemoryQuoteRepository, InMemoryServiceCatalog, InMemoryVersionRepository};
pub use quote::SqlQuoteRepository;
pub use version::SqlVersionRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        ApplicationError::Persistence(error.to_string())
    }
}

#[async_trait]
pub trait QuoteRepository: Send + Sync {
    /// Loads the quote with days and lines ordered by position.
    async fn find_by_id(&self, id: QuoteId) -> Result<Option<Quote>, RepositoryError>;

    /// Inserts the quote graph and returns it as stored, ids assigned.
    async fn create(&self, quote: Quote) -> Result<Quote, RepositoryError>;

    /// Overwrites the scalars and swaps every day and line for the given ones in
    /// a single transaction. Returns `None` when the quote does not exist.
    async fn replace(&self, quote: Quote) -> Result<Option<Quote>, RepositoryError>;

    async fn save_totals(
        &self,
        id: QuoteId,
        totals: &QuoteTotals,
        updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    async fn list_recent(&self, limit: u32) -> Result<Vec<QuoteSummary>, RepositoryError>;

    /// Sets the destination of individual days without touching lines.
    async fn set_day_destinations(
        &self,
        id: QuoteId,
        destinations: &[(DayId, String)],
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait VersionRepository: Send + Sync {
    async fn insert(&self, version: NewQuoteVersion) -> Result<QuoteVersion, RepositoryError>;

    async fn find(
        &self,
        quote_id: QuoteId,
        version_id: VersionId,
    ) -> Result<Option<QuoteVersion>, RepositoryError>;

    /// Newest first.
    async fn list(
        &self,
        quote_id: QuoteId,
        filter: &VersionListFilter,
    ) -> Result<VersionPage, RepositoryError>;

    async fn latest_active_label(&self, quote_id: QuoteId)
        -> Result<Option<String>, RepositoryError>;

    /// Every label ever issued for the quote, archived versions included.
    async fn all_labels(&self, quote_id: QuoteId) -> Result<Vec<String>, RepositoryError>;

    /// Whether a non-archived version of `version_type` was created at or after `since`.
    async fn exists_since(
        &self,
        quote_id: QuoteId,
        version_type: VersionType,
        since: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    async fn update_metadata(
        &self,
        quote_id: QuoteId,
        version_id: VersionId,
        label: Option<String>,
        comment: Option<String>,
    ) -> Result<Option<QuoteVersion>, RepositoryError>;

    /// Stamps `archived_at` unless already set.
    async fn archive(
        &self,
        quote_id: QuoteId,
        version_id: VersionId,
        archived_at: DateTime<Utc>,
    ) -> Result<Option<QuoteVersion>, RepositoryError>;
}

/// Read-only view of the service catalog filled by the import pipeline.
#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    /// First image URL (lowest position) per service id. Services without images
    /// are absent from the map.
    async fn first_image_urls(
        &self,
        service_ids: &[i64],
    ) -> Result<HashMap<i64, String>, RepositoryError>;
}

pub(crate) fn timestamp_text(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("timestamp `{value}`: {e}")))
}

pub(crate) fn parse_date(value: Option<String>) -> Result<Option<NaiveDate>, RepositoryError> {
    value
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| {
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .map_err(|e| RepositoryError::Decode(format!("date `{raw}`: {e}")))
        })
        .transpose()
}

pub(crate) fn parse_decimal(value: Option<String>) -> Result<Option<Decimal>, RepositoryError> {
    value
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| {
            raw.trim()
                .parse::<Decimal>()
                .map_err(|e| RepositoryError::Decode(format!("decimal `{raw}`: {e}")))
        })
        .transpose()
}

pub(crate) fn decimal_text(value: Option<Decimal>) -> Option<String> {
    value.map(|amount| amount.to_string())
}

pub(crate) fn date_text(value: Option<NaiveDate>) -> Option<String> {
    value.map(|date| date.format("%Y-%m-%d").to_string())
}
