use std::sync::Arc;

use chrono::Utc;
use magalia_core::audit::{AuditEntity, AuditEvent, AuditOutcome, AuditSink};
use magalia_core::domain::input::{parse_date, QuoteInput};
use magalia_core::domain::quote::{DayId, Quote, QuoteId};
use magalia_core::domain::version::VersionType;
use magalia_core::domain::view::{QuoteSummary, QuoteView};
use magalia_core::errors::{ApplicationError, DomainError};
use magalia_core::pricing::{PricingEngine, PricingResult};
use magalia_core::versioning::VersionDraft;
use magalia_db::repositories::QuoteRepository;
use serde::Deserialize;
use tracing::info;

use super::versioning::VersioningService;
use super::{record_audit, Repositories, RequestContext};

pub const DEFAULT_RECENT_LIMIT: u32 = 10;
pub const MAX_RECENT_LIMIT: u32 = 50;

/// Assigns one destination to a run of consecutive days.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DestinationRangePatch {
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub day_id: Option<i64>,
    pub nights: i64,
    pub destination: String,
    /// Days that already carry a destination are skipped unless set.
    #[serde(default)]
    pub overwrite: bool,
}

#[derive(Clone)]
pub struct QuoteService {
    quotes: Arc<dyn QuoteRepository>,
    audit: Arc<dyn AuditSink>,
    pricing: Arc<dyn PricingEngine>,
    versions: VersioningService,
}

impl QuoteService {
    pub fn new(
        repositories: &Repositories,
        pricing: Arc<dyn PricingEngine>,
        versions: VersioningService,
    ) -> Self {
        Self {
            quotes: repositories.quotes.clone(),
            audit: repositories.audit.clone(),
            pricing,
            versions,
        }
    }

    async fn load(&self, id: QuoteId) -> Result<Quote, ApplicationError> {
        self.quotes.find_by_id(id).await?.ok_or_else(|| ApplicationError::not_found("quote", id))
    }

    /// Persists a new quote with its cached totals. The initial snapshot is
    /// best-effort: the quote is returned even when it cannot be written.
    pub async fn create(
        &self,
        context: &RequestContext,
        input: QuoteInput,
    ) -> Result<QuoteView, ApplicationError> {
        let mut quote = input.into_new_quote()?;
        quote.totals = self.pricing.reprice(&quote).totals();
        let stored = self.quotes.create(quote).await?;

        self.versions
            .create_auto(
                context,
                &stored,
                VersionDraft::automatic(VersionType::AutoInitial, context.actor.clone()),
            )
            .await;

        info!(
            event_name = "quote.created",
            correlation_id = %context.correlation_id,
            quote_id = %stored.id,
            days = stored.days.len(),
            "quote created"
        );
        self.audit_quote(context, stored.id, "quote.created").await;
        Ok(QuoteView::from(&stored))
    }

    pub async fn get(&self, id: QuoteId) -> Result<QuoteView, ApplicationError> {
        Ok(QuoteView::from(&self.load(id).await?))
    }

    /// Full replacement of scalars, days and lines. Line FX is reconciled
    /// against the stored line each incoming line replaces.
    pub async fn update(
        &self,
        context: &RequestContext,
        id: QuoteId,
        input: QuoteInput,
    ) -> Result<QuoteView, ApplicationError> {
        let existing = self.load(id).await?;
        let mut quote = input.apply_to(&existing)?;
        quote.totals = self.pricing.reprice(&quote).totals();

        let stored = self
            .quotes
            .replace(quote)
            .await?
            .ok_or_else(|| ApplicationError::not_found("quote", id))?;

        info!(
            event_name = "quote.updated",
            correlation_id = %context.correlation_id,
            quote_id = %id,
            days = stored.days.len(),
            "quote updated"
        );
        self.audit_quote(context, id, "quote.updated").await;
        Ok(QuoteView::from(&stored))
    }

    /// Recomputes the pricing breakdown and stores the refreshed totals.
    pub async fn reprice(
        &self,
        context: &RequestContext,
        id: QuoteId,
    ) -> Result<PricingResult, ApplicationError> {
        let quote = self.load(id).await?;
        let result = self.pricing.reprice(&quote);
        self.quotes.save_totals(id, &result.totals(), Utc::now()).await?;

        info!(
            event_name = "quote.repriced",
            correlation_id = %context.correlation_id,
            quote_id = %id,
            grand_total = %result.grand_total,
            "quote repriced"
        );
        Ok(result)
    }

    pub async fn recent(&self, limit: Option<u32>) -> Result<Vec<QuoteSummary>, ApplicationError> {
        let limit = limit.unwrap_or(DEFAULT_RECENT_LIMIT).clamp(1, MAX_RECENT_LIMIT);
        Ok(self.quotes.list_recent(limit).await?)
    }

    pub async fn patch_destination_range(
        &self,
        context: &RequestContext,
        id: QuoteId,
        patch: DestinationRangePatch,
    ) -> Result<QuoteView, ApplicationError> {
        if patch.nights < 1 {
            return Err(DomainError::Validation("nights must be at least 1".to_string()).into());
        }
        let destination = patch.destination.trim().to_string();
        if destination.is_empty() {
            return Err(DomainError::Validation("destination is required".to_string()).into());
        }

        let quote = self.load(id).await?;
        let view = QuoteView::from(&quote);
        let start = match (patch.day_id, parse_date("start_date", patch.start_date.as_deref())?) {
            (Some(day_id), _) => view
                .days
                .iter()
                .position(|day| day.id == Some(DayId(day_id)))
                .ok_or_else(|| ApplicationError::not_found("day", day_id))?,
            (None, Some(date)) => view
                .days
                .iter()
                .position(|day| day.date == Some(date))
                .ok_or_else(|| ApplicationError::not_found("day", date))?,
            (None, None) => {
                return Err(DomainError::Validation(
                    "either day_id or start_date is required".to_string(),
                )
                .into())
            }
        };

        let assignments: Vec<(DayId, String)> = view
            .days
            .iter()
            .skip(start)
            .take(patch.nights as usize)
            .filter(|day| {
                patch.overwrite
                    || day.destination.as_deref().map(str::trim).unwrap_or_default().is_empty()
            })
            .filter_map(|day| day.id.map(|day_id| (day_id, destination.clone())))
            .collect();

        if !assignments.is_empty() {
            self.quotes.set_day_destinations(id, &assignments).await?;
        }

        info!(
            event_name = "quote.days.destination_assigned",
            correlation_id = %context.correlation_id,
            quote_id = %id,
            destination = %destination,
            days_changed = assignments.len(),
            "destination range applied"
        );
        self.audit_quote(context, id, "quote.days.updated").await;
        self.get(id).await
    }

    async fn audit_quote(&self, context: &RequestContext, id: QuoteId, action: &str) {
        record_audit(
            self.audit.as_ref(),
            AuditEvent::new(
                Some(id),
                context.correlation_id.clone(),
                action,
                AuditEntity::Quote,
                id.to_string(),
                context.actor_label(),
                AuditOutcome::Success,
            ),
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use magalia_core::domain::input::{DayInput, LineInput, QuoteInput};
    use magalia_core::domain::quote::QuoteId;
    use magalia_core::domain::version::{VersionListFilter, VersionType};
    use magalia_core::errors::{ApplicationError, DomainError};
    use magalia_core::pricing::DeterministicPricingEngine;
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{DestinationRangePatch, QuoteService};
    use crate::services::tests::{context, fixture, Fixture};
    use crate::services::versioning::VersioningService;

    fn services(fixture: &Fixture) -> (QuoteService, VersioningService) {
        let pricing = Arc::new(DeterministicPricingEngine);
        let versions = VersioningService::new(&fixture.repositories, pricing.clone(), 60);
        (QuoteService::new(&fixture.repositories, pricing, versions.clone()), versions)
    }

    fn dec(value: &str) -> Decimal {
        value.parse().expect("decimal literal")
    }

    fn day(date: &str, destination: &str, lines: Vec<LineInput>) -> DayInput {
        DayInput {
            date: Some(date.to_string()),
            destination: Some(destination.to_string()),
            lines,
            ..DayInput::default()
        }
    }

    fn buffered_line(fx_rate: Option<Decimal>) -> LineInput {
        LineInput {
            category: Some("Hotel".to_string()),
            title: Some("Riad Dar Anika".to_string()),
            achat_eur: Some(dec("100")),
            achat_usd: Some(dec("110")),
            fx_rate,
            raw_json: json!({"buff_pct": 10, "room_type": "Deluxe"}),
            ..LineInput::default()
        }
    }

    fn input() -> QuoteInput {
        QuoteInput {
            title: Some("Morocco loop".to_string()),
            pax: Some(7),
            days: vec![
                day("2024-01-01", "Marrakech", vec![buffered_line(Some(dec("0.95")))]),
                day("2024-01-02", "Marrakech", Vec::new()),
                day("2024-01-03", "", Vec::new()),
            ],
            ..QuoteInput::default()
        }
    }

    #[tokio::test]
    async fn create_persists_totals_and_initial_version() {
        let fixture = fixture();
        let (quotes, versions) = services(&fixture);

        let view = quotes.create(&context(), input()).await.expect("create");

        assert_ne!(view.id, QuoteId::UNASSIGNED);
        assert_eq!(view.onspot_total, Some(dec("54")));
        assert_eq!(view.hassle_total, Some(dec("1050")));
        assert_eq!(view.days[0].lines[0].fx_rate, Some(dec("0.950000")));

        let (page, _) = versions.list(view.id, VersionListFilter::default()).await.expect("list");
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].version_type, VersionType::AutoInitial);
        assert_eq!(page.items[0].label, "v1");
        assert_eq!(fixture.audit.events().await[0].action, "quote.created");
    }

    #[tokio::test]
    async fn invalid_date_is_a_validation_error() {
        let fixture = fixture();
        let (quotes, _) = services(&fixture);

        let error = quotes
            .create(
                &context(),
                QuoteInput { start_date: Some("01/06/2024".to_string()), ..QuoteInput::default() },
            )
            .await
            .expect_err("bad date");

        assert!(matches!(error, ApplicationError::Domain(DomainError::InvalidDate { .. })));
    }

    #[tokio::test]
    async fn update_keeps_buffered_fx_when_none_supplied() {
        let fixture = fixture();
        let (quotes, _) = services(&fixture);
        let created = quotes.create(&context(), input()).await.expect("create");

        let mut edit = input();
        edit.title = Some("Morocco loop, revised".to_string());
        edit.days[0].lines[0] = buffered_line(None);
        let updated = quotes.update(&context(), created.id, edit).await.expect("update");

        assert_eq!(updated.title.as_deref(), Some("Morocco loop, revised"));
        assert_eq!(updated.days[0].lines[0].fx_rate, Some(dec("0.950000")));
        assert_eq!(updated.days[0].lines[0].raw_json.as_value()["room_type"], json!("Deluxe"));
    }

    #[tokio::test]
    async fn update_of_unknown_quote_is_not_found() {
        let fixture = fixture();
        let (quotes, _) = services(&fixture);

        let error =
            quotes.update(&context(), QuoteId(404), input()).await.expect_err("missing quote");

        assert!(matches!(error, ApplicationError::NotFound { entity: "quote", .. }));
    }

    #[tokio::test]
    async fn reprice_stores_refreshed_totals() {
        let fixture = fixture();
        let (quotes, _) = services(&fixture);
        let created = quotes.create(&context(), input()).await.expect("create");

        let result = quotes.reprice(&context(), created.id).await.expect("reprice");
        let stored = quotes.get(created.id).await.expect("get");

        assert_eq!(result.onspot_cards, 2);
        assert_eq!(result.effective_days, 3);
        assert_eq!(stored.grand_total, Some(result.grand_total));
    }

    #[tokio::test]
    async fn recent_limit_is_clamped() {
        let fixture = fixture();
        let (quotes, _) = services(&fixture);
        for _ in 0..3 {
            quotes.create(&context(), input()).await.expect("create");
        }

        assert_eq!(quotes.recent(Some(0)).await.expect("recent").len(), 1);
        assert_eq!(quotes.recent(Some(500)).await.expect("recent").len(), 3);
        assert_eq!(quotes.recent(None).await.expect("recent").len(), 3);
    }

    #[tokio::test]
    async fn destination_range_fills_empty_days_only() {
        let fixture = fixture();
        let (quotes, _) = services(&fixture);
        let created = quotes.create(&context(), input()).await.expect("create");

        let view = quotes
            .patch_destination_range(
                &context(),
                created.id,
                DestinationRangePatch {
                    start_date: Some("2024-01-02".to_string()),
                    nights: 2,
                    destination: " Fes ".to_string(),
                    ..DestinationRangePatch::default()
                },
            )
            .await
            .expect("patch");

        let destinations: Vec<Option<&str>> =
            view.days.iter().map(|day| day.destination.as_deref()).collect();
        assert_eq!(destinations, vec![Some("Marrakech"), Some("Marrakech"), Some("Fes")]);
        assert_eq!(view.days[2].date, NaiveDate::from_ymd_opt(2024, 1, 3));
    }

    #[tokio::test]
    async fn destination_range_overwrites_from_day_id() {
        let fixture = fixture();
        let (quotes, _) = services(&fixture);
        let created = quotes.create(&context(), input()).await.expect("create");
        let first_day = created.days[0].id.expect("stored day id");

        let view = quotes
            .patch_destination_range(
                &context(),
                created.id,
                DestinationRangePatch {
                    day_id: Some(first_day.0),
                    nights: 5,
                    destination: "Essaouira".to_string(),
                    overwrite: true,
                    ..DestinationRangePatch::default()
                },
            )
            .await
            .expect("patch");

        assert!(view.days.iter().all(|day| day.destination.as_deref() == Some("Essaouira")));
    }

    #[tokio::test]
    async fn destination_range_rejects_bad_requests() {
        let fixture = fixture();
        let (quotes, _) = services(&fixture);
        let created = quotes.create(&context(), input()).await.expect("create");

        let zero_nights = quotes
            .patch_destination_range(
                &context(),
                created.id,
                DestinationRangePatch {
                    start_date: Some("2024-01-01".to_string()),
                    nights: 0,
                    destination: "Fes".to_string(),
                    ..DestinationRangePatch::default()
                },
            )
            .await
            .expect_err("nights");
        assert!(matches!(zero_nights, ApplicationError::Domain(DomainError::Validation(_))));

        let unknown_start = quotes
            .patch_destination_range(
                &context(),
                created.id,
                DestinationRangePatch {
                    start_date: Some("2030-01-01".to_string()),
                    nights: 1,
                    destination: "Fes".to_string(),
                    ..DestinationRangePatch::default()
                },
            )
            .await
            .expect_err("unknown day");
        assert!(matches!(unknown_start, ApplicationError::NotFound { entity: "day", .. }));
    }
}
