use std::sync::Arc;

use chrono::Utc;
use magalia_core::audit::{AuditEntity, AuditEvent, AuditOutcome, AuditSink};
use magalia_core::domain::quote::{Quote, QuoteId};
use magalia_core::domain::version::{QuoteVersion, VersionId, VersionListFilter, VersionPage};
use magalia_core::domain::view::QuoteView;
use magalia_core::errors::ApplicationError;
use magalia_core::pricing::PricingEngine;
use magalia_core::versioning::{
    apply_snapshot, next_label, parse_snapshot, should_auto_create, throttle_window_start,
    VersionDraft,
};
use magalia_db::repositories::{QuoteRepository, VersionRepository};
use tracing::{info, warn};

use super::{record_audit, Repositories, RequestContext};

pub const MAX_PAGE_SIZE: u32 = 200;

/// Label and comment edits. Blank values leave the stored field alone.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VersionPatch {
    pub label: Option<String>,
    pub comment: Option<String>,
}

impl VersionPatch {
    fn trimmed(value: Option<String>) -> Option<String> {
        value.map(|raw| raw.trim().to_string()).filter(|value| !value.is_empty())
    }
}

#[derive(Clone)]
pub struct VersioningService {
    quotes: Arc<dyn QuoteRepository>,
    versions: Arc<dyn VersionRepository>,
    audit: Arc<dyn AuditSink>,
    pricing: Arc<dyn PricingEngine>,
    throttle_minutes: i64,
}

impl VersioningService {
    pub fn new(
        repositories: &Repositories,
        pricing: Arc<dyn PricingEngine>,
        throttle_minutes: i64,
    ) -> Self {
        Self {
            quotes: repositories.quotes.clone(),
            versions: repositories.versions.clone(),
            audit: repositories.audit.clone(),
            pricing,
            throttle_minutes,
        }
    }

    async fn load_quote(&self, quote_id: QuoteId) -> Result<Quote, ApplicationError> {
        self.quotes
            .find_by_id(quote_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("quote", quote_id))
    }

    async fn load_version(
        &self,
        quote_id: QuoteId,
        version_id: VersionId,
    ) -> Result<QuoteVersion, ApplicationError> {
        self.versions
            .find(quote_id, version_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("version", version_id))
    }

    /// Snapshots `quote` under the next free label.
    async fn write(
        &self,
        quote: &Quote,
        draft: VersionDraft,
    ) -> Result<QuoteVersion, ApplicationError> {
        let latest = self.versions.latest_active_label(quote.id).await?;
        let all_labels = self.versions.all_labels(quote.id).await?;
        let label = next_label(latest.as_deref(), all_labels.iter().map(String::as_str));
        let total_price = self.pricing.reprice(quote).grand_total;

        let version = draft.into_new_version(quote, label, Some(total_price))?;
        Ok(self.versions.insert(version).await?)
    }

    async fn recently_created(
        &self,
        quote: &Quote,
        draft: &VersionDraft,
    ) -> Result<bool, ApplicationError> {
        if !draft.version_type.is_throttled() || self.throttle_minutes <= 0 {
            return Ok(false);
        }
        let since = throttle_window_start(Utc::now(), self.throttle_minutes);
        Ok(self.versions.exists_since(quote.id, draft.version_type, since).await?)
    }

    /// Best-effort automatic snapshot. Throttled or failed attempts return `None`
    /// and never surface to the caller.
    pub async fn create_auto(
        &self,
        context: &RequestContext,
        quote: &Quote,
        draft: VersionDraft,
    ) -> Option<QuoteVersion> {
        let version_type = draft.version_type;
        let recent = match self.recently_created(quote, &draft).await {
            Ok(recent) => recent,
            Err(error) => {
                warn!(
                    event_name = "quote.version.auto_failed",
                    correlation_id = %context.correlation_id,
                    quote_id = %quote.id,
                    version_type = version_type.as_str(),
                    error = %error,
                    "throttle lookup failed; skipping automatic version"
                );
                return None;
            }
        };

        if !should_auto_create(version_type, recent) {
            info!(
                event_name = "quote.version.auto_throttled",
                correlation_id = %context.correlation_id,
                quote_id = %quote.id,
                version_type = version_type.as_str(),
                window_minutes = self.throttle_minutes,
                "automatic version skipped inside throttle window"
            );
            return None;
        }

        match self.write(quote, draft).await {
            Ok(version) => {
                info!(
                    event_name = "quote.version.created",
                    correlation_id = %context.correlation_id,
                    quote_id = %quote.id,
                    version_id = %version.id,
                    label = %version.label,
                    version_type = version_type.as_str(),
                    "automatic version created"
                );
                Some(version)
            }
            Err(error) => {
                warn!(
                    event_name = "quote.version.auto_failed",
                    correlation_id = %context.correlation_id,
                    quote_id = %quote.id,
                    version_type = version_type.as_str(),
                    error = %error,
                    "automatic version could not be written"
                );
                None
            }
        }
    }

    pub async fn list(
        &self,
        quote_id: QuoteId,
        filter: VersionListFilter,
    ) -> Result<(VersionPage, VersionListFilter), ApplicationError> {
        self.load_quote(quote_id).await?;
        let filter =
            VersionListFilter { limit: filter.limit.clamp(1, MAX_PAGE_SIZE), ..filter };
        let page = self.versions.list(quote_id, &filter).await?;
        Ok((page, filter))
    }

    pub async fn get(
        &self,
        quote_id: QuoteId,
        version_id: VersionId,
    ) -> Result<QuoteVersion, ApplicationError> {
        self.load_quote(quote_id).await?;
        self.load_version(quote_id, version_id).await
    }

    pub async fn create_manual(
        &self,
        context: &RequestContext,
        quote_id: QuoteId,
        comment: &str,
    ) -> Result<QuoteVersion, ApplicationError> {
        let draft = VersionDraft::manual(comment, context.actor.clone())?;
        let quote = self.load_quote(quote_id).await?;
        let version = self.write(&quote, draft).await?;

        info!(
            event_name = "quote.version.created",
            correlation_id = %context.correlation_id,
            quote_id = %quote_id,
            version_id = %version.id,
            label = %version.label,
            version_type = version.version_type.as_str(),
            "manual version created"
        );
        self.audit_version(context, &version, "version.created").await;
        Ok(version)
    }

    pub async fn patch(
        &self,
        context: &RequestContext,
        quote_id: QuoteId,
        version_id: VersionId,
        patch: VersionPatch,
    ) -> Result<QuoteVersion, ApplicationError> {
        self.load_quote(quote_id).await?;
        let label = VersionPatch::trimmed(patch.label);
        let comment = VersionPatch::trimmed(patch.comment);

        let version = self
            .versions
            .update_metadata(quote_id, version_id, label, comment)
            .await?
            .ok_or_else(|| ApplicationError::not_found("version", version_id))?;

        info!(
            event_name = "quote.version.updated",
            correlation_id = %context.correlation_id,
            quote_id = %quote_id,
            version_id = %version_id,
            label = %version.label,
            "version metadata updated"
        );
        self.audit_version(context, &version, "version.updated").await;
        Ok(version)
    }

    /// Idempotent: an archived version keeps its original timestamp.
    pub async fn archive(
        &self,
        context: &RequestContext,
        quote_id: QuoteId,
        version_id: VersionId,
    ) -> Result<QuoteVersion, ApplicationError> {
        self.load_quote(quote_id).await?;
        let version = self
            .versions
            .archive(quote_id, version_id, Utc::now())
            .await?
            .ok_or_else(|| ApplicationError::not_found("version", version_id))?;

        info!(
            event_name = "quote.version.archived",
            correlation_id = %context.correlation_id,
            quote_id = %quote_id,
            version_id = %version_id,
            label = %version.label,
            "version archived"
        );
        self.audit_version(context, &version, "version.archived").await;
        Ok(version)
    }

    /// Saves the live state as `auto_before_restore`, then overwrites the quote
    /// with the target snapshot and refreshes its cached totals.
    pub async fn restore(
        &self,
        context: &RequestContext,
        quote_id: QuoteId,
        version_id: VersionId,
    ) -> Result<QuoteView, ApplicationError> {
        let mut quote = self.load_quote(quote_id).await?;
        let target = self.load_version(quote_id, version_id).await?;
        parse_snapshot(&target.snapshot_json)?;

        let safety_copy = self
            .write(&quote, VersionDraft::before_restore(&target.label, context.actor.clone()))
            .await?;

        apply_snapshot(&mut quote, &target.snapshot_json)?;
        quote.totals = self.pricing.reprice(&quote).totals();
        let restored = self
            .quotes
            .replace(quote)
            .await?
            .ok_or_else(|| ApplicationError::not_found("quote", quote_id))?;

        info!(
            event_name = "quote.version.restored",
            correlation_id = %context.correlation_id,
            quote_id = %quote_id,
            version_id = %version_id,
            label = %target.label,
            safety_version_id = %safety_copy.id,
            "quote restored from version"
        );
        record_audit(
            self.audit.as_ref(),
            AuditEvent::new(
                Some(quote_id),
                context.correlation_id.clone(),
                "quote.restored",
                AuditEntity::Quote,
                quote_id.to_string(),
                context.actor_label(),
                AuditOutcome::Success,
            )
            .with_metadata("restored_from", target.label.clone())
            .with_metadata("safety_label", safety_copy.label.clone()),
        )
        .await;

        Ok(QuoteView::from(&restored))
    }

    async fn audit_version(&self, context: &RequestContext, version: &QuoteVersion, action: &str) {
        record_audit(
            self.audit.as_ref(),
            AuditEvent::new(
                Some(version.quote_id),
                context.correlation_id.clone(),
                action,
                AuditEntity::QuoteVersion,
                version.id.to_string(),
                context.actor_label(),
                AuditOutcome::Success,
            )
            .with_metadata("label", version.label.clone())
            .with_metadata("type", version.version_type.as_str()),
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use magalia_core::domain::quote::{Quote, QuoteDay, QuoteLine};
    use magalia_core::domain::version::{VersionId, VersionListFilter, VersionType};
    use magalia_core::errors::{ApplicationError, DomainError};
    use magalia_core::pricing::DeterministicPricingEngine;
    use magalia_core::versioning::VersionDraft;
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{VersionPatch, VersioningService};
    use crate::services::tests::{context, fixture, Fixture};

    fn service(fixture: &Fixture, throttle_minutes: i64) -> VersioningService {
        VersioningService::new(
            &fixture.repositories,
            Arc::new(DeterministicPricingEngine),
            throttle_minutes,
        )
    }

    async fn stored_quote(fixture: &Fixture) -> Quote {
        let mut quote = Quote::new(Some("Kyoto in autumn"));
        quote.pax = Some(2);
        let mut day = QuoteDay::new(None, Some("Kyoto"));
        let mut line = QuoteLine::new("Activity", "Tea ceremony");
        line.achat_eur = Some(Decimal::new(120, 0));
        line.vente_usd = Some(Decimal::new(200, 0));
        day.lines.push(line);
        quote.days.push(day);
        fixture.repositories.quotes.create(quote).await.expect("create quote")
    }

    #[tokio::test]
    async fn manual_versions_are_labelled_in_sequence() {
        let fixture = fixture();
        let versions = service(&fixture, 60);
        let quote = stored_quote(&fixture).await;

        let first = versions.create_manual(&context(), quote.id, "first pass").await.expect("v1");
        let second = versions.create_manual(&context(), quote.id, "  revised  ").await.expect("v2");

        assert_eq!(first.label, "v1");
        assert_eq!(second.label, "v2");
        assert_eq!(second.comment.as_deref(), Some("revised"));
        assert_eq!(second.created_by.as_deref(), Some("agent@magalia.travel"));
        assert!(second.total_price.is_some());
        assert_eq!(fixture.audit.events().await.len(), 2);
    }

    #[tokio::test]
    async fn blank_comment_is_rejected() {
        let fixture = fixture();
        let quote = stored_quote(&fixture).await;

        let error = service(&fixture, 60)
            .create_manual(&context(), quote.id, "   ")
            .await
            .expect_err("comment required");

        assert_eq!(error, ApplicationError::Domain(DomainError::MissingComment));
    }

    #[tokio::test]
    async fn archived_label_numbers_are_not_reused() {
        let fixture = fixture();
        let versions = service(&fixture, 60);
        let quote = stored_quote(&fixture).await;

        versions.create_manual(&context(), quote.id, "one").await.expect("v1");
        let second = versions.create_manual(&context(), quote.id, "two").await.expect("v2");
        versions.archive(&context(), quote.id, second.id).await.expect("archive");
        let third = versions.create_manual(&context(), quote.id, "three").await.expect("v3");

        assert_eq!(third.label, "v3");
    }

    #[tokio::test]
    async fn export_versions_are_throttled_inside_the_window() {
        let fixture = fixture();
        let versions = service(&fixture, 60);
        let quote = stored_quote(&fixture).await;

        let draft = || {
            VersionDraft::automatic(VersionType::AutoExportWord, None)
                .with_export_file(format!("quote_{}.docx", quote.id))
        };
        let first = versions.create_auto(&context(), &quote, draft()).await;
        let second = versions.create_auto(&context(), &quote, draft()).await;

        let first = first.expect("first export version");
        assert_eq!(first.export_file_name.as_deref(), Some("quote_1.docx"));
        assert!(second.is_none());

        let excel = versions
            .create_auto(
                &context(),
                &quote,
                VersionDraft::automatic(VersionType::AutoExportExcel, None),
            )
            .await;
        assert!(excel.is_some(), "throttle is per version type");
    }

    #[tokio::test]
    async fn zero_window_disables_the_throttle() {
        let fixture = fixture();
        let versions = service(&fixture, 0);
        let quote = stored_quote(&fixture).await;

        for _ in 0..2 {
            let created = versions
                .create_auto(
                    &context(),
                    &quote,
                    VersionDraft::automatic(VersionType::AutoExportExcel, None),
                )
                .await;
            assert!(created.is_some());
        }
    }

    #[tokio::test]
    async fn archiving_twice_keeps_the_first_timestamp() {
        let fixture = fixture();
        let versions = service(&fixture, 60);
        let quote = stored_quote(&fixture).await;
        let version = versions.create_manual(&context(), quote.id, "keep").await.expect("v1");

        let first = versions.archive(&context(), quote.id, version.id).await.expect("archive");
        let second = versions.archive(&context(), quote.id, version.id).await.expect("again");

        assert!(first.archived_at.is_some());
        assert_eq!(first.archived_at, second.archived_at);

        let (page, _) = versions
            .list(quote.id, VersionListFilter::default())
            .await
            .expect("list");
        assert!(page.items.is_empty());
        let fetched = versions.get(quote.id, version.id).await.expect("still retrievable");
        assert!(fetched.is_archived());
    }

    #[tokio::test]
    async fn patch_trims_and_ignores_blank_values() {
        let fixture = fixture();
        let versions = service(&fixture, 60);
        let quote = stored_quote(&fixture).await;
        let version = versions.create_manual(&context(), quote.id, "draft").await.expect("v1");

        let patched = versions
            .patch(
                &context(),
                quote.id,
                version.id,
                VersionPatch {
                    label: Some("  Final  ".to_string()),
                    comment: Some("  ".to_string()),
                },
            )
            .await
            .expect("patch");

        assert_eq!(patched.label, "Final");
        assert_eq!(patched.comment.as_deref(), Some("draft"));
    }

    #[tokio::test]
    async fn unknown_version_is_not_found() {
        let fixture = fixture();
        let versions = service(&fixture, 60);
        let quote = stored_quote(&fixture).await;

        let error = versions.get(quote.id, VersionId(999)).await.expect_err("missing");
        assert!(matches!(error, ApplicationError::NotFound { entity: "version", .. }));
    }

    #[tokio::test]
    async fn restore_saves_current_state_then_applies_snapshot() {
        let fixture = fixture();
        let versions = service(&fixture, 60);
        let quote = stored_quote(&fixture).await;
        let original =
            versions.create_manual(&context(), quote.id, "before edits").await.expect("v1");

        let mut edited = quote.clone();
        edited.title = Some("Osaka instead".to_string());
        edited.days.clear();
        fixture.repositories.quotes.replace(edited).await.expect("replace").expect("exists");

        let restored =
            versions.restore(&context(), quote.id, original.id).await.expect("restore");

        assert_eq!(restored.title.as_deref(), Some("Kyoto in autumn"));
        assert_eq!(restored.days.len(), 1);
        assert_eq!(restored.days[0].lines[0].title.as_deref(), Some("Tea ceremony"));
        assert!(restored.grand_total.is_some());

        let (page, _) = versions.list(quote.id, VersionListFilter::default()).await.expect("list");
        let safety = page
            .items
            .iter()
            .find(|version| version.version_type == VersionType::AutoBeforeRestore)
            .expect("safety copy");
        assert_eq!(safety.label, "v2");
        assert_eq!(safety.comment.as_deref(), Some("Auto: state before restore from v1"));
        assert_eq!(safety.snapshot_json["title"], json!("Osaka instead"));
    }

    #[tokio::test]
    async fn restore_rejects_empty_snapshot_without_side_effects() {
        let fixture = fixture();
        let versions = service(&fixture, 60);
        let quote = stored_quote(&fixture).await;

        let mut broken = VersionDraft::automatic(VersionType::AutoInitial, None)
            .into_new_version(&quote, "v1".to_string(), None)
            .expect("draft");
        broken.snapshot_json = json!({});
        let broken = fixture.repositories.versions.insert(broken).await.expect("insert");

        let error = versions.restore(&context(), quote.id, broken.id).await.expect_err("invalid");

        assert!(matches!(error, ApplicationError::Domain(DomainError::InvalidSnapshot(_))));
        let (page, _) = versions.list(quote.id, VersionListFilter::default()).await.expect("list");
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn list_clamps_page_size() {
        let fixture = fixture();
        let versions = service(&fixture, 60);
        let quote = stored_quote(&fixture).await;

        let (_, filter) = versions
            .list(quote.id, VersionListFilter { limit: 10_000, ..VersionListFilter::default() })
            .await
            .expect("list");
        assert_eq!(filter.limit, 200);

        let (_, filter) = versions
            .list(quote.id, VersionListFilter { limit: 0, ..VersionListFilter::default() })
            .await
            .expect("list");
        assert_eq!(filter.limit, 1);
    }
}
