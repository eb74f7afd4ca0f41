use std::collections::BTreeSet;
use std::sync::Arc;

use magalia_core::audit::{AuditEntity, AuditEvent, AuditOutcome, AuditSink};
use magalia_core::domain::quote::{Quote, QuoteId};
use magalia_core::domain::version::{ExportKind, VersionType};
use magalia_core::domain::view::QuoteView;
use magalia_core::errors::ApplicationError;
use magalia_core::pricing::PricingEngine;
use magalia_core::versioning::VersionDraft;
use magalia_db::repositories::{QuoteRepository, ServiceCatalog};
use magalia_export::{ExcelExporter, ImageFetcher, WordExporter, WORD_MIME, XLSX_MIME};
use tracing::{info, warn};

use super::versioning::VersioningService;
use super::{record_audit, Repositories, RequestContext};

/// A rendered file ready to be sent as an attachment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportedDocument {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl ExportedDocument {
    pub fn file_name_for(id: QuoteId, kind: ExportKind) -> String {
        let extension = match kind {
            ExportKind::Word => "docx",
            ExportKind::Excel => "xlsx",
            ExportKind::Pdf => "pdf",
        };
        format!("quote_{id}.{extension}")
    }
}

#[derive(Clone)]
pub struct ExportService {
    quotes: Arc<dyn QuoteRepository>,
    catalog: Arc<dyn ServiceCatalog>,
    audit: Arc<dyn AuditSink>,
    pricing: Arc<dyn PricingEngine>,
    versions: VersioningService,
    fetcher: Arc<dyn ImageFetcher>,
    word: Arc<WordExporter>,
    excel: ExcelExporter,
}

impl ExportService {
    pub fn new(
        repositories: &Repositories,
        pricing: Arc<dyn PricingEngine>,
        versions: VersioningService,
        fetcher: Arc<dyn ImageFetcher>,
        word: WordExporter,
    ) -> Self {
        Self {
            quotes: repositories.quotes.clone(),
            catalog: repositories.catalog.clone(),
            audit: repositories.audit.clone(),
            pricing,
            versions,
            fetcher,
            word: Arc::new(word),
            excel: ExcelExporter::new(),
        }
    }

    /// Loads the quote with fresh totals and attaches catalog images to its
    /// lines. Catalog failures leave the lines without images.
    async fn prepare(
        &self,
        context: &RequestContext,
        id: QuoteId,
    ) -> Result<(Quote, QuoteView), ApplicationError> {
        let mut quote = self
            .quotes
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("quote", id))?;
        quote.totals = self.pricing.reprice(&quote).totals();

        let mut view = QuoteView::from(&quote);
        let service_ids: Vec<i64> = view
            .days
            .iter()
            .flat_map(|day| day.lines.iter())
            .filter_map(|line| line.service_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if !service_ids.is_empty() {
            match self.catalog.first_image_urls(&service_ids).await {
                Ok(images) => {
                    for line in view.lines_mut() {
                        line.first_image_url =
                            line.service_id.and_then(|service_id| images.get(&service_id).cloned());
                    }
                }
                Err(error) => warn!(
                    event_name = "export.catalog.lookup_failed",
                    correlation_id = %context.correlation_id,
                    quote_id = %id,
                    error = %error,
                    "service images unavailable; exporting without them"
                ),
            }
        }

        Ok((quote, view))
    }

    /// Renders the client itinerary. A successful render also records a
    /// throttled `auto_export_word` version.
    pub async fn word(
        &self,
        context: &RequestContext,
        id: QuoteId,
    ) -> Result<ExportedDocument, ApplicationError> {
        let (quote, view) = self.prepare(context, id).await?;
        let bytes = self.word.render(&view, self.fetcher.as_ref()).await?;
        let document = ExportedDocument {
            file_name: ExportedDocument::file_name_for(id, ExportKind::Word),
            content_type: WORD_MIME,
            bytes,
        };

        self.versions
            .create_auto(
                context,
                &quote,
                VersionDraft::automatic(VersionType::AutoExportWord, context.actor.clone())
                    .with_export_file(document.file_name.clone()),
            )
            .await;
        self.finish(context, id, ExportKind::Word, &document).await;
        Ok(document)
    }

    /// Renders the pricing workbook, recording an `auto_export_excel` version
    /// only when asked to.
    pub async fn excel(
        &self,
        context: &RequestContext,
        id: QuoteId,
        create_version: bool,
    ) -> Result<ExportedDocument, ApplicationError> {
        let (quote, view) = self.prepare(context, id).await?;
        let bytes = self.excel.render(&view)?;
        let document = ExportedDocument {
            file_name: ExportedDocument::file_name_for(id, ExportKind::Excel),
            content_type: XLSX_MIME,
            bytes,
        };

        if create_version {
            self.versions
                .create_auto(
                    context,
                    &quote,
                    VersionDraft::automatic(VersionType::AutoExportExcel, context.actor.clone())
                        .with_export_file(document.file_name.clone()),
                )
                .await;
        }
        self.finish(context, id, ExportKind::Excel, &document).await;
        Ok(document)
    }

    async fn finish(
        &self,
        context: &RequestContext,
        id: QuoteId,
        kind: ExportKind,
        document: &ExportedDocument,
    ) {
        info!(
            event_name = "quote.exported",
            correlation_id = %context.correlation_id,
            quote_id = %id,
            export_type = kind.as_str(),
            bytes = document.bytes.len(),
            "quote exported"
        );
        record_audit(
            self.audit.as_ref(),
            AuditEvent::new(
                Some(id),
                context.correlation_id.clone(),
                "quote.exported",
                AuditEntity::Quote,
                id.to_string(),
                context.actor_label(),
                AuditOutcome::Success,
            )
            .with_metadata("export_type", kind.as_str())
            .with_metadata("file_name", document.file_name.clone()),
        )
        .await;
    }
}
