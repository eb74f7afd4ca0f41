use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use magalia_core::domain::quote::QuoteId;
use magalia_core::domain::version::{
    ExportKind, NewQuoteVersion, QuoteVersion, VersionId, VersionListFilter, VersionPage,
    VersionType,
};

use super::{
    decimal_text, parse_decimal, parse_timestamp, timestamp_text, RepositoryError,
    VersionRepository,
};
use crate::DbPool;

const VERSION_COLUMNS: &str = "id, quote_id, label, comment, created_at, created_by, type,
    export_type, export_file_name, total_price, snapshot_json, archived_at";

pub struct SqlVersionRepository {
    pool: DbPool,
}

impl SqlVersionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_version(row: &SqliteRow) -> Result<QuoteVersion, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quote_id: i64 =
        row.try_get("quote_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let label: String = row.try_get("label").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let comment: Option<String> =
        row.try_get("comment").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_by: Option<String> =
        row.try_get("created_by").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let type_str: String = row.try_get("type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let export_type_str: Option<String> =
        row.try_get("export_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let export_file_name: Option<String> =
        row.try_get("export_file_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let total_price: Option<String> =
        row.try_get("total_price").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let snapshot_str: String =
        row.try_get("snapshot_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let archived_at_str: Option<String> =
        row.try_get("archived_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let version_type = VersionType::parse(&type_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown version type `{type_str}`")))?;
    let export_type = export_type_str.as_deref().and_then(ExportKind::parse);
    let snapshot_json = if snapshot_str.trim().is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_str(&snapshot_str)
            .map_err(|e| RepositoryError::Decode(format!("snapshot_json: {e}")))?
    };
    let archived_at = archived_at_str.as_deref().map(parse_timestamp).transpose()?;

    Ok(QuoteVersion {
        id: VersionId(id),
        quote_id: QuoteId(quote_id),
        label,
        comment,
        created_at: parse_timestamp(&created_at_str)?,
        created_by,
        version_type,
        export_type,
        export_file_name,
        total_price: parse_decimal(total_price)?,
        snapshot_json,
        archived_at,
    })
}

#[async_trait::async_trait]
impl VersionRepository for SqlVersionRepository {
    async fn insert(&self, version: NewQuoteVersion) -> Result<QuoteVersion, RepositoryError> {
        let snapshot = serde_json::to_string(&version.snapshot_json)
            .map_err(|e| RepositoryError::Decode(format!("snapshot_json: {e}")))?;

        let id = sqlx::query(
            "INSERT INTO quote_versions (quote_id, label, comment, created_at, created_by, type,
                                         export_type, export_file_name, total_price, snapshot_json)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(version.quote_id.0)
        .bind(&version.label)
        .bind(&version.comment)
        .bind(timestamp_text(version.created_at))
        .bind(&version.created_by)
        .bind(version.version_type.as_str())
        .bind(version.export_type.map(|kind| kind.as_str()))
        .bind(&version.export_file_name)
        .bind(decimal_text(version.total_price))
        .bind(snapshot)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(version.into_version(VersionId(id)))
    }

    async fn find(
        &self,
        quote_id: QuoteId,
        version_id: VersionId,
    ) -> Result<Option<QuoteVersion>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {VERSION_COLUMNS} FROM quote_versions WHERE id = ? AND quote_id = ?"
        ))
        .bind(version_id.0)
        .bind(quote_id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_version(r)?)),
            None => Ok(None),
        }
    }

    async fn list(
        &self,
        quote_id: QuoteId,
        filter: &VersionListFilter,
    ) -> Result<VersionPage, RepositoryError> {
        let archived_clause =
            if filter.include_archived { "" } else { " AND archived_at IS NULL" };

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM quote_versions WHERE quote_id = ?{archived_clause}"
        ))
        .bind(quote_id.0)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query(&format!(
            "SELECT {VERSION_COLUMNS} FROM quote_versions
             WHERE quote_id = ?{archived_clause}
             ORDER BY created_at DESC, id DESC
             LIMIT ? OFFSET ?"
        ))
        .bind(quote_id.0)
        .bind(i64::from(filter.limit))
        .bind(i64::from(filter.offset))
        .fetch_all(&self.pool)
        .await?;

        let items = rows.iter().map(row_to_version).collect::<Result<Vec<_>, _>>()?;
        Ok(VersionPage { items, total: total.max(0) as u64 })
    }

    async fn latest_active_label(
        &self,
        quote_id: QuoteId,
    ) -> Result<Option<String>, RepositoryError> {
        let label: Option<String> = sqlx::query_scalar(
            "SELECT label FROM quote_versions
             WHERE quote_id = ? AND archived_at IS NULL
             ORDER BY created_at DESC, id DESC
             LIMIT 1",
        )
        .bind(quote_id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(label)
    }

    async fn all_labels(&self, quote_id: QuoteId) -> Result<Vec<String>, RepositoryError> {
        let labels: Vec<String> =
            sqlx::query_scalar("SELECT label FROM quote_versions WHERE quote_id = ?")
                .bind(quote_id.0)
                .fetch_all(&self.pool)
                .await?;

        Ok(labels)
    }

    async fn exists_since(
        &self,
        quote_id: QuoteId,
        version_type: VersionType,
        since: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM quote_versions
             WHERE quote_id = ? AND type = ? AND archived_at IS NULL AND created_at >= ?",
        )
        .bind(quote_id.0)
        .bind(version_type.as_str())
        .bind(timestamp_text(since))
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn update_metadata(
        &self,
        quote_id: QuoteId,
        version_id: VersionId,
        label: Option<String>,
        comment: Option<String>,
    ) -> Result<Option<QuoteVersion>, RepositoryError> {
        sqlx::query(
            "UPDATE quote_versions
             SET label = COALESCE(?, label), comment = COALESCE(?, comment)
             WHERE id = ? AND quote_id = ?",
        )
        .bind(label)
        .bind(comment)
        .bind(version_id.0)
        .bind(quote_id.0)
        .execute(&self.pool)
        .await?;

        self.find(quote_id, version_id).await
    }

    async fn archive(
        &self,
        quote_id: QuoteId,
        version_id: VersionId,
        archived_at: DateTime<Utc>,
    ) -> Result<Option<QuoteVersion>, RepositoryError> {
        sqlx::query(
            "UPDATE quote_versions SET archived_at = ?
             WHERE id = ? AND quote_id = ? AND archived_at IS NULL",
        )
        .bind(timestamp_text(archived_at))
        .bind(version_id.0)
        .bind(quote_id.0)
        .execute(&self.pool)
        .await?;

        self.find(quote_id, version_id).await
    }
}
