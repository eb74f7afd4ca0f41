use std::collections::HashMap;

use sqlx::{QueryBuilder, Row, Sqlite};

use super::{RepositoryError, ServiceCatalog};
use crate::DbPool;

pub struct SqlServiceCatalog {
    pool: DbPool,
}

impl SqlServiceCatalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ServiceCatalog for SqlServiceCatalog {
    async fn first_image_urls(
        &self,
        service_ids: &[i64],
    ) -> Result<HashMap<i64, String>, RepositoryError> {
        if service_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query_builder: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("SELECT service_id, url FROM service_images WHERE service_id IN (");
        let mut separated = query_builder.separated(", ");
        for id in service_ids {
            separated.push_bind(*id);
        }
        query_builder.push(") AND TRIM(url) <> '' ORDER BY service_id, position, id");

        let rows = query_builder.build().fetch_all(&self.pool).await?;

        let mut urls = HashMap::new();
        for row in rows {
            let service_id: i64 =
                row.try_get("service_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let url: String =
                row.try_get("url").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            urls.entry(service_id).or_insert(url);
        }

        Ok(urls)
    }
}
