use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use magalia_core::domain::quote::{DayId, LineId, Quote, QuoteDay, QuoteId, QuoteTotals};
use magalia_core::domain::version::{
    NewQuoteVersion, QuoteVersion, VersionId, VersionListFilter, VersionPage, VersionType,
};
use magalia_core::domain::view::QuoteSummary;

use super::{QuoteRepository, RepositoryError, ServiceCatalog, VersionRepository};

#[derive(Default)]
pub struct InMemoryQuoteRepository {
    quotes: RwLock<HashMap<i64, Quote>>,
    next_quote_id: AtomicI64,
    next_child_id: AtomicI64,
}

impl InMemoryQuoteRepository {
    fn next_id(counter: &AtomicI64) -> i64 {
        counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Mirrors the SQL store: every day and line gets a fresh id and positions
    /// follow the list order.
    fn assign_child_ids(&self, days: &mut [QuoteDay]) {
        for (day_index, day) in days.iter_mut().enumerate() {
            day.id = Some(DayId(Self::next_id(&self.next_child_id)));
            day.position = day_index as i64;
            for (line_index, line) in day.lines.iter_mut().enumerate() {
                line.id = Some(LineId(Self::next_id(&self.next_child_id)));
                line.position = line_index as i64;
            }
        }
    }
}

#[async_trait::async_trait]
impl QuoteRepository for InMemoryQuoteRepository {
    async fn find_by_id(&self, id: QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let quotes = self.quotes.read().await;
        Ok(quotes.get(&id.0).cloned())
    }

    async fn create(&self, mut quote: Quote) -> Result<Quote, RepositoryError> {
        quote.id = QuoteId(Self::next_id(&self.next_quote_id));
        self.assign_child_ids(&mut quote.days);

        let mut quotes = self.quotes.write().await;
        quotes.insert(quote.id.0, quote.clone());
        Ok(quote)
    }

    async fn replace(&self, mut quote: Quote) -> Result<Option<Quote>, RepositoryError> {
        let mut quotes = self.quotes.write().await;
        let Some(existing) = quotes.get(&quote.id.0) else {
            return Ok(None);
        };

        quote.created_at = existing.created_at;
        self.assign_child_ids(&mut quote.days);
        quotes.insert(quote.id.0, quote.clone());
        Ok(Some(quote))
    }

    async fn save_totals(
        &self,
        id: QuoteId,
        totals: &QuoteTotals,
        updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut quotes = self.quotes.write().await;
        if let Some(quote) = quotes.get_mut(&id.0) {
            quote.totals = totals.clone();
            quote.updated_at = updated_at;
        }
        Ok(())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<QuoteSummary>, RepositoryError> {
        let quotes = self.quotes.read().await;
        let mut summaries: Vec<QuoteSummary> = quotes.values().map(QuoteSummary::from).collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        summaries.truncate(limit as usize);
        Ok(summaries)
    }

    async fn set_day_destinations(
        &self,
        id: QuoteId,
        destinations: &[(DayId, String)],
    ) -> Result<(), RepositoryError> {
        let mut quotes = self.quotes.write().await;
        let Some(quote) = quotes.get_mut(&id.0) else {
            return Ok(());
        };

        for (day_id, destination) in destinations {
            if let Some(day) = quote.days.iter_mut().find(|day| day.id == Some(*day_id)) {
                day.destination = Some(destination.clone());
            }
        }
        quote.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryVersionRepository {
    versions: RwLock<Vec<QuoteVersion>>,
    next_id: AtomicI64,
}

impl InMemoryVersionRepository {
    fn newest_first(versions: &mut [QuoteVersion]) {
        versions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    }
}

#[async_trait::async_trait]
impl VersionRepository for InMemoryVersionRepository {
    async fn insert(&self, version: NewQuoteVersion) -> Result<QuoteVersion, RepositoryError> {
        let id = VersionId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let stored = version.into_version(id);
        self.versions.write().await.push(stored.clone());
        Ok(stored)
    }

    async fn find(
        &self,
        quote_id: QuoteId,
        version_id: VersionId,
    ) -> Result<Option<QuoteVersion>, RepositoryError> {
        let versions = self.versions.read().await;
        Ok(versions
            .iter()
            .find(|version| version.id == version_id && version.quote_id == quote_id)
            .cloned())
    }

    async fn list(
        &self,
        quote_id: QuoteId,
        filter: &VersionListFilter,
    ) -> Result<VersionPage, RepositoryError> {
        let versions = self.versions.read().await;
        let mut matching: Vec<QuoteVersion> = versions
            .iter()
            .filter(|version| version.quote_id == quote_id)
            .filter(|version| filter.include_archived || !version.is_archived())
            .cloned()
            .collect();
        Self::newest_first(&mut matching);

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .collect();
        Ok(VersionPage { items, total })
    }

    async fn latest_active_label(
        &self,
        quote_id: QuoteId,
    ) -> Result<Option<String>, RepositoryError> {
        let versions = self.versions.read().await;
        let mut active: Vec<QuoteVersion> = versions
            .iter()
            .filter(|version| version.quote_id == quote_id && !version.is_archived())
            .cloned()
            .collect();
        Self::newest_first(&mut active);
        Ok(active.into_iter().next().map(|version| version.label))
    }

    async fn all_labels(&self, quote_id: QuoteId) -> Result<Vec<String>, RepositoryError> {
        let versions = self.versions.read().await;
        Ok(versions
            .iter()
            .filter(|version| version.quote_id == quote_id)
            .map(|version| version.label.clone())
            .collect())
    }

    async fn exists_since(
        &self,
        quote_id: QuoteId,
        version_type: VersionType,
        since: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let versions = self.versions.read().await;
        Ok(versions.iter().any(|version| {
            version.quote_id == quote_id
                && version.version_type == version_type
                && !version.is_archived()
                && version.created_at >= since
        }))
    }

    async fn update_metadata(
        &self,
        quote_id: QuoteId,
        version_id: VersionId,
        label: Option<String>,
        comment: Option<String>,
    ) -> Result<Option<QuoteVersion>, RepositoryError> {
        let mut versions = self.versions.write().await;
        let Some(version) = versions
            .iter_mut()
            .find(|version| version.id == version_id && version.quote_id == quote_id)
        else {
            return Ok(None);
        };

        if let Some(label) = label {
            version.label = label;
        }
        if let Some(comment) = comment {
            version.comment = Some(comment);
        }
        Ok(Some(version.clone()))
    }

    async fn archive(
        &self,
        quote_id: QuoteId,
        version_id: VersionId,
        archived_at: DateTime<Utc>,
    ) -> Result<Option<QuoteVersion>, RepositoryError> {
        let mut versions = self.versions.write().await;
        let Some(version) = versions
            .iter_mut()
            .find(|version| version.id == version_id && version.quote_id == quote_id)
        else {
            return Ok(None);
        };

        if version.archived_at.is_none() {
            version.archived_at = Some(archived_at);
        }
        Ok(Some(version.clone()))
    }
}

/// Catalog images keyed by service id, kept in position order.
#[derive(Default)]
pub struct InMemoryServiceCatalog {
    images: HashMap<i64, Vec<String>>,
}

impl InMemoryServiceCatalog {
    pub fn with_image(mut self, service_id: i64, url: impl Into<String>) -> Self {
        self.images.entry(service_id).or_default().push(url.into());
        self
    }
}

#[async_trait::async_trait]
impl ServiceCatalog for InMemoryServiceCatalog {
    async fn first_image_urls(
        &self,
        service_ids: &[i64],
    ) -> Result<HashMap<i64, String>, RepositoryError> {
        Ok(service_ids
            .iter()
            .filter_map(|id| {
                self.images
                    .get(id)
                    .and_then(|urls| urls.iter().find(|url| !url.trim().is_empty()))
                    .map(|url| (*id, url.clone()))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use serde_json::json;

    use magalia_core::domain::quote::{Quote, QuoteDay, QuoteId, QuoteLine};
    use magalia_core::domain::version::{NewQuoteVersion, VersionListFilter, VersionType};

    use crate::repositories::{
        InMemoryQuoteRepository, InMemoryServiceCatalog, InMemoryVersionRepository,
        QuoteRepository, ServiceCatalog, VersionRepository,
    };

    fn quote_with_lines() -> Quote {
        let mut quote = Quote::new(Some("Lisbon"));
        let mut day = QuoteDay::new(None, Some("Lisbon"));
        day.lines.push(QuoteLine::new("Hotel", "Pestana Palace"));
        day.lines.push(QuoteLine::new("Guide", "Alfama walk"));
        quote.days.push(day);
        quote
    }

    fn version(quote_id: QuoteId, label: &str) -> NewQuoteVersion {
        NewQuoteVersion {
            quote_id,
            label: label.to_string(),
            comment: None,
            created_at: Utc::now(),
            created_by: None,
            version_type: VersionType::Manual,
            export_type: None,
            export_file_name: None,
            total_price: None,
            snapshot_json: json!({}),
        }
    }

    #[tokio::test]
    async fn quote_repo_assigns_ids_and_replaces_graph() {
        let repo = InMemoryQuoteRepository::default();
        let stored = repo.create(quote_with_lines()).await.expect("create");
        assert_eq!(stored.id, QuoteId(1));
        assert!(stored.days[0].lines.iter().all(|line| line.id.is_some()));

        let mut edited = stored.clone();
        edited.days[0].lines.pop();
        let replaced = repo.replace(edited).await.expect("replace").expect("exists");
        assert_eq!(replaced.days[0].lines.len(), 1);
        assert_ne!(replaced.days[0].lines[0].id, stored.days[0].lines[0].id);
        assert_eq!(replaced.created_at, stored.created_at);

        let mut ghost = quote_with_lines();
        ghost.id = QuoteId(77);
        assert!(repo.replace(ghost).await.expect("replace").is_none());
    }

    #[tokio::test]
    async fn quote_repo_lists_recent_first() {
        let repo = InMemoryQuoteRepository::default();
        let older = repo.create(Quote::new(Some("older"))).await.expect("create");
        let newer = repo.create(Quote::new(Some("newer"))).await.expect("create");
        repo.save_totals(older.id, &Default::default(), Utc::now() - Duration::hours(1))
            .await
            .expect("totals");

        let recent = repo.list_recent(10).await.expect("recent");
        assert_eq!(recent[0].id, newer.id);
        assert_eq!(repo.list_recent(1).await.expect("recent").len(), 1);
    }

    #[tokio::test]
    async fn version_repo_tracks_labels_and_archival() {
        let repo = InMemoryVersionRepository::default();
        let quote_id = QuoteId(5);
        let first = repo.insert(version(quote_id, "v1")).await.expect("insert");
        let mut later = version(quote_id, "v2");
        later.created_at = Utc::now() + Duration::seconds(5);
        let second = repo.insert(later).await.expect("insert");

        assert_eq!(repo.latest_active_label(quote_id).await.expect("latest"), Some("v2".into()));
        repo.archive(quote_id, second.id, Utc::now()).await.expect("archive");
        assert_eq!(repo.latest_active_label(quote_id).await.expect("latest"), Some("v1".into()));
        assert_eq!(repo.all_labels(quote_id).await.expect("labels").len(), 2);

        let page = repo.list(quote_id, &VersionListFilter::default()).await.expect("list");
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, first.id);
        assert!(repo.find(QuoteId(6), first.id).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn catalog_returns_first_non_blank_url() {
        let catalog = InMemoryServiceCatalog::default()
            .with_image(1, " ")
            .with_image(1, "https://img.example/a.jpg")
            .with_image(1, "https://img.example/b.jpg");

        let urls = catalog.first_image_urls(&[1, 2]).await.expect("lookup");
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[&1], "https://img.example/a.jpg");
    }
}
