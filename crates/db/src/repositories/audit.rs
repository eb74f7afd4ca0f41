use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite};

use magalia_core::audit::{AuditEvent, AuditSink};
use magalia_core::errors::ApplicationError;

use super::{timestamp_text, RepositoryError};
use crate::DbPool;

/// Columns the sink knows how to fill, in insert order.
const AUDIT_COLUMNS: &[&str] =
    &["created_at", "actor", "action", "entity", "entity_id", "correlation_id", "payload_json"];

/// Writes audit events to `audit_logs`.
///
/// Deployments that predate some columns keep working: the table layout is read
/// once at construction and only columns that exist are written.
pub struct SqlAuditSink {
    pool: DbPool,
    columns: Vec<&'static str>,
}

impl SqlAuditSink {
    pub async fn new(pool: DbPool) -> Result<Self, RepositoryError> {
        let rows = sqlx::query("PRAGMA table_info(audit_logs)").fetch_all(&pool).await?;
        let mut present = HashSet::new();
        for row in rows {
            let name: String =
                row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            present.insert(name);
        }

        let columns =
            AUDIT_COLUMNS.iter().copied().filter(|column| present.contains(*column)).collect();
        Ok(Self { pool, columns })
    }

    pub fn columns(&self) -> &[&'static str] {
        &self.columns
    }

    async fn insert(&self, event: &AuditEvent) -> Result<(), RepositoryError> {
        if self.columns.is_empty() {
            return Ok(());
        }

        let payload = serde_json::to_string(&event.payload())
            .map_err(|e| RepositoryError::Decode(format!("audit payload: {e}")))?;

        let mut query_builder: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("INSERT INTO audit_logs (");
        query_builder.push(self.columns.join(", "));
        query_builder.push(") VALUES (");
        let mut separated = query_builder.separated(", ");
        for column in &self.columns {
            let value = match *column {
                "created_at" => timestamp_text(event.occurred_at),
                "actor" => event.actor.clone(),
                "action" => event.action.clone(),
                "entity" => event.entity.as_str().to_string(),
                "entity_id" => event.entity_id.clone(),
                "correlation_id" => event.correlation_id.clone(),
                _ => payload.clone(),
            };
            separated.push_bind(value);
        }
        query_builder.push(")");

        query_builder.build().execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl AuditSink for SqlAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), ApplicationError> {
        self.insert(&event).await.map_err(ApplicationError::from)
    }
}
