pub mod export;
pub mod quote;
pub mod versioning;

use std::sync::Arc;

use magalia_core::audit::{AuditEvent, AuditSink};
use magalia_db::repositories::{
    QuoteRepository, RepositoryError, ServiceCatalog, SqlAuditSink, SqlQuoteRepository,
    SqlServiceCatalog, SqlVersionRepository, VersionRepository,
};
use magalia_db::DbPool;
use tracing::warn;
use uuid::Uuid;

pub use export::{ExportService, ExportedDocument};
pub use quote::{DestinationRangePatch, QuoteService};
pub use versioning::{VersionPatch, VersioningService};

const ANONYMOUS_ACTOR: &str = "anonymous";

/// Per-request identity carried into logs, audit rows and version authorship.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestContext {
    pub correlation_id: String,
    pub actor: Option<String>,
}

impl RequestContext {
    pub fn new(actor: Option<String>) -> Self {
        let actor = actor.map(|value| value.trim().to_string()).filter(|value| !value.is_empty());
        Self { correlation_id: Uuid::new_v4().to_string(), actor }
    }

    pub fn actor_label(&self) -> &str {
        self.actor.as_deref().unwrap_or(ANONYMOUS_ACTOR)
    }
}

/// Storage collaborators shared by every service.
#[derive(Clone)]
pub struct Repositories {
    pub quotes: Arc<dyn QuoteRepository>,
    pub versions: Arc<dyn VersionRepository>,
    pub catalog: Arc<dyn ServiceCatalog>,
    pub audit: Arc<dyn AuditSink>,
}

impl Repositories {
    pub async fn sql(pool: DbPool) -> Result<Self, RepositoryError> {
        let audit = SqlAuditSink::new(pool.clone()).await?;
        Ok(Self {
            quotes: Arc::new(SqlQuoteRepository::new(pool.clone())),
            versions: Arc::new(SqlVersionRepository::new(pool.clone())),
            catalog: Arc::new(SqlServiceCatalog::new(pool)),
            audit: Arc::new(audit),
        })
    }
}

/// Audit writes never fail the request that produced them.
pub(crate) async fn record_audit(sink: &dyn AuditSink, event: AuditEvent) {
    let action = event.action.clone();
    let correlation_id = event.correlation_id.clone();
    if let Err(error) = sink.record(event).await {
        warn!(
            event_name = "audit.write_failed",
            correlation_id = %correlation_id,
            action = %action,
            error = %error,
            "failed to record audit event"
        );
    }
}
