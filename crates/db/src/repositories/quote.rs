use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, Transaction};

use magalia_core::domain::payload::LinePayload;
use magalia_core::domain::quote::{
    DayId, LineId, Quote, QuoteDay, QuoteId, QuoteLine, QuoteTotals, Visibility,
};
use magalia_core::domain::view::QuoteSummary;

use super::{
    date_text, decimal_text, parse_date, parse_decimal, parse_timestamp, timestamp_text,
    QuoteRepository, RepositoryError,
};
use crate::DbPool;

const QUOTE_COLUMNS: &str = "id, title, display_title, hero_photo_1, hero_photo_2, pax,
    start_date, end_date, travel_agency, travel_advisor, client_name, fx_rate, internal_note,
    margin_pct, onspot_manual, hassle_manual, onspot_total, hassle_total, commissionable_net,
    commission_total, sell_total, grand_total, created_at, updated_at";

pub struct SqlQuoteRepository {
    pool: DbPool,
}

impl SqlQuoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode<T>(result: Result<T, sqlx::Error>) -> Result<T, RepositoryError> {
    result.map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn row_to_quote(row: &SqliteRow) -> Result<Quote, RepositoryError> {
    let id: i64 = decode(row.try_get("id"))?;
    let margin_pct = parse_decimal(decode(row.try_get("margin_pct"))?)?
        .unwrap_or(magalia_core::domain::quote::DEFAULT_MARGIN_PCT);
    let created_at: String = decode(row.try_get("created_at"))?;
    let updated_at: String = decode(row.try_get("updated_at"))?;

    Ok(Quote {
        id: QuoteId(id),
        title: decode(row.try_get("title"))?,
        display_title: decode(row.try_get("display_title"))?,
        hero_photo_1: decode(row.try_get("hero_photo_1"))?,
        hero_photo_2: decode(row.try_get("hero_photo_2"))?,
        pax: decode(row.try_get("pax"))?,
        start_date: parse_date(decode(row.try_get("start_date"))?)?,
        end_date: parse_date(decode(row.try_get("end_date"))?)?,
        travel_agency: decode(row.try_get("travel_agency"))?,
        travel_advisor: decode(row.try_get("travel_advisor"))?,
        client_name: decode(row.try_get("client_name"))?,
        fx_rate: parse_decimal(decode(row.try_get("fx_rate"))?)?,
        internal_note: decode(row.try_get("internal_note"))?,
        margin_pct,
        onspot_manual: parse_decimal(decode(row.try_get("onspot_manual"))?)?,
        hassle_manual: parse_decimal(decode(row.try_get("hassle_manual"))?)?,
        totals: QuoteTotals {
            onspot_total: parse_decimal(decode(row.try_get("onspot_total"))?)?,
            hassle_total: parse_decimal(decode(row.try_get("hassle_total"))?)?,
            commissionable_net: parse_decimal(decode(row.try_get("commissionable_net"))?)?,
            commission_total: parse_decimal(decode(row.try_get("commission_total"))?)?,
            sell_total: parse_decimal(decode(row.try_get("sell_total"))?)?,
            grand_total: parse_decimal(decode(row.try_get("grand_total"))?)?,
        },
        days: Vec::new(),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn row_to_day(row: &SqliteRow) -> Result<QuoteDay, RepositoryError> {
    let images_json: Option<String> = decode(row.try_get("decorative_images"))?;
    let decorative_images = match images_json.as_deref().map(str::trim) {
        None | Some("") => Vec::new(),
        Some(raw) => serde_json::from_str::<Vec<String>>(raw)
            .map_err(|e| RepositoryError::Decode(format!("decorative_images: {e}")))?,
    };

    Ok(QuoteDay {
        id: Some(DayId(decode(row.try_get("id"))?)),
        position: decode(row.try_get("position"))?,
        date: parse_date(decode(row.try_get("date"))?)?,
        destination: decode(row.try_get("destination"))?,
        decorative_images,
        lines: Vec::new(),
    })
}

fn row_to_line(row: &SqliteRow) -> Result<QuoteLine, RepositoryError> {
    let raw_json: String = decode(row.try_get("raw_json"))?;
    let raw_json = serde_json::from_str(&raw_json)
        .map_err(|e| RepositoryError::Decode(format!("raw_json: {e}")))?;
    let visibility: Option<String> = decode(row.try_get("visibility"))?;

    Ok(QuoteLine {
        id: Some(LineId(decode(row.try_get("id"))?)),
        position: decode(row.try_get("position"))?,
        service_id: decode(row.try_get("service_id"))?,
        category: decode(row.try_get("category"))?,
        title: decode(row.try_get("title"))?,
        supplier_name: decode(row.try_get("supplier_name"))?,
        visibility: Visibility::parse_lenient(visibility.as_deref()),
        achat_eur: parse_decimal(decode(row.try_get("achat_eur"))?)?,
        achat_usd: parse_decimal(decode(row.try_get("achat_usd"))?)?,
        vente_usd: parse_decimal(decode(row.try_get("vente_usd"))?)?,
        fx_rate: parse_decimal(decode(row.try_get("fx_rate"))?)?,
        currency: decode(row.try_get("currency"))?,
        base_net_amount: parse_decimal(decode(row.try_get("base_net_amount"))?)?,
        raw_json: LinePayload::new(raw_json),
    })
}

fn row_to_summary(row: &SqliteRow) -> Result<QuoteSummary, RepositoryError> {
    let updated_at: String = decode(row.try_get("updated_at"))?;
    Ok(QuoteSummary {
        id: QuoteId(decode(row.try_get("id"))?),
        title: decode(row.try_get("title"))?,
        client_name: decode(row.try_get("client_name"))?,
        start_date: parse_date(decode(row.try_get("start_date"))?)?,
        end_date: parse_date(decode(row.try_get("end_date"))?)?,
        pax: decode(row.try_get("pax"))?,
        grand_total: parse_decimal(decode(row.try_get("grand_total"))?)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

async fn insert_days(
    tx: &mut Transaction<'_, Sqlite>,
    quote_id: QuoteId,
    days: &[QuoteDay],
) -> Result<(), RepositoryError> {
    for day in days {
        let images = serde_json::to_string(&day.decorative_images)
            .map_err(|e| RepositoryError::Decode(format!("decorative_images: {e}")))?;
        let day_id = sqlx::query(
            "INSERT INTO quote_days (quote_id, position, date, destination, decorative_images)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(quote_id.0)
        .bind(day.position)
        .bind(date_text(day.date))
        .bind(&day.destination)
        .bind(images)
        .execute(&mut **tx)
        .await?
        .last_insert_rowid();

        for line in &day.lines {
            let raw_json = serde_json::to_string(&line.raw_json)
                .map_err(|e| RepositoryError::Decode(format!("raw_json: {e}")))?;
            sqlx::query(
                "INSERT INTO quote_lines (day_id, position, service_id, category, title,
                                          supplier_name, visibility, achat_eur, achat_usd,
                                          vente_usd, fx_rate, currency, base_net_amount, raw_json)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(day_id)
            .bind(line.position)
            .bind(line.service_id)
            .bind(&line.category)
            .bind(&line.title)
            .bind(&line.supplier_name)
            .bind(line.visibility.as_str())
            .bind(decimal_text(line.achat_eur))
            .bind(decimal_text(line.achat_usd))
            .bind(decimal_text(line.vente_usd))
            .bind(decimal_text(line.fx_rate))
            .bind(&line.currency)
            .bind(decimal_text(line.base_net_amount))
            .bind(raw_json)
            .execute(&mut **tx)
            .await?;
        }
    }
    Ok(())
}

impl SqlQuoteRepository {
    async fn load_days(&self, quote_id: QuoteId) -> Result<Vec<QuoteDay>, RepositoryError> {
        let day_rows = sqlx::query(
            "SELECT id, position, date, destination, decorative_images
             FROM quote_days WHERE quote_id = ? ORDER BY position ASC, id ASC",
        )
        .bind(quote_id.0)
        .fetch_all(&self.pool)
        .await?;
        let mut days = day_rows.iter().map(row_to_day).collect::<Result<Vec<_>, _>>()?;

        let line_rows = sqlx::query(
            "SELECT l.id, l.day_id, l.position, l.service_id, l.category, l.title,
                    l.supplier_name, l.visibility, l.achat_eur, l.achat_usd, l.vente_usd,
                    l.fx_rate, l.currency, l.base_net_amount, l.raw_json
             FROM quote_lines l
             JOIN quote_days d ON d.id = l.day_id
             WHERE d.quote_id = ?
             ORDER BY l.day_id ASC, l.position ASC, l.id ASC",
        )
        .bind(quote_id.0)
        .fetch_all(&self.pool)
        .await?;

        let mut lines_by_day: HashMap<i64, Vec<QuoteLine>> = HashMap::new();
        for row in &line_rows {
            let day_id: i64 = decode(row.try_get("day_id"))?;
            lines_by_day.entry(day_id).or_default().push(row_to_line(row)?);
        }
        for day in &mut days {
            if let Some(DayId(day_id)) = day.id {
                day.lines = lines_by_day.remove(&day_id).unwrap_or_default();
            }
        }
        Ok(days)
    }

    async fn fetch(&self, id: QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {QUOTE_COLUMNS} FROM quotes WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => {
                let mut quote = row_to_quote(r)?;
                quote.days = self.load_days(id).await?;
                Ok(Some(quote))
            }
            None => Ok(None),
        }
    }
}

#[async_trait::async_trait]
impl QuoteRepository for SqlQuoteRepository {
    async fn find_by_id(&self, id: QuoteId) -> Result<Option<Quote>, RepositoryError> {
        self.fetch(id).await
    }

    async fn create(&self, quote: Quote) -> Result<Quote, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let id = sqlx::query(
            "INSERT INTO quotes (title, display_title, hero_photo_1, hero_photo_2, pax,
                                 start_date, end_date, travel_agency, travel_advisor, client_name,
                                 fx_rate, internal_note, margin_pct, onspot_manual, hassle_manual,
                                 onspot_total, hassle_total, commissionable_net, commission_total,
                                 sell_total, grand_total, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&quote.title)
        .bind(&quote.display_title)
        .bind(&quote.hero_photo_1)
        .bind(&quote.hero_photo_2)
        .bind(quote.pax)
        .bind(date_text(quote.start_date))
        .bind(date_text(quote.end_date))
        .bind(&quote.travel_agency)
        .bind(&quote.travel_advisor)
        .bind(&quote.client_name)
        .bind(decimal_text(quote.fx_rate))
        .bind(&quote.internal_note)
        .bind(quote.margin_pct.to_string())
        .bind(decimal_text(quote.onspot_manual))
        .bind(decimal_text(quote.hassle_manual))
        .bind(decimal_text(quote.totals.onspot_total))
        .bind(decimal_text(quote.totals.hassle_total))
        .bind(decimal_text(quote.totals.commissionable_net))
        .bind(decimal_text(quote.totals.commission_total))
        .bind(decimal_text(quote.totals.sell_total))
        .bind(decimal_text(quote.totals.grand_total))
        .bind(timestamp_text(quote.created_at))
        .bind(timestamp_text(quote.updated_at))
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        insert_days(&mut tx, QuoteId(id), &quote.days).await?;
        tx.commit().await?;

        self.fetch(QuoteId(id))
            .await?
            .ok_or_else(|| RepositoryError::Decode(format!("quote {id} vanished after insert")))
    }

    async fn replace(&self, quote: Quote) -> Result<Option<Quote>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            "UPDATE quotes SET
                 title = ?, display_title = ?, hero_photo_1 = ?, hero_photo_2 = ?, pax = ?,
                 start_date = ?, end_date = ?, travel_agency = ?, travel_advisor = ?,
                 client_name = ?, fx_rate = ?, internal_note = ?, margin_pct = ?,
                 onspot_manual = ?, hassle_manual = ?, onspot_total = ?, hassle_total = ?,
                 commissionable_net = ?, commission_total = ?, sell_total = ?, grand_total = ?,
                 updated_at = ?
             WHERE id = ?",
        )
        .bind(&quote.title)
        .bind(&quote.display_title)
        .bind(&quote.hero_photo_1)
        .bind(&quote.hero_photo_2)
        .bind(quote.pax)
        .bind(date_text(quote.start_date))
        .bind(date_text(quote.end_date))
        .bind(&quote.travel_agency)
        .bind(&quote.travel_advisor)
        .bind(&quote.client_name)
        .bind(decimal_text(quote.fx_rate))
        .bind(&quote.internal_note)
        .bind(quote.margin_pct.to_string())
        .bind(decimal_text(quote.onspot_manual))
        .bind(decimal_text(quote.hassle_manual))
        .bind(decimal_text(quote.totals.onspot_total))
        .bind(decimal_text(quote.totals.hassle_total))
        .bind(decimal_text(quote.totals.commissionable_net))
        .bind(decimal_text(quote.totals.commission_total))
        .bind(decimal_text(quote.totals.sell_total))
        .bind(decimal_text(quote.totals.grand_total))
        .bind(timestamp_text(quote.updated_at))
        .bind(quote.id.0)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        // lines go with their days through ON DELETE CASCADE
        sqlx::query("DELETE FROM quote_days WHERE quote_id = ?")
            .bind(quote.id.0)
            .execute(&mut *tx)
            .await?;
        insert_days(&mut tx, quote.id, &quote.days).await?;
        tx.commit().await?;

        self.fetch(quote.id).await
    }

    async fn save_totals(
        &self,
        id: QuoteId,
        totals: &QuoteTotals,
        updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE quotes SET onspot_total = ?, hassle_total = ?, commissionable_net = ?,
                               commission_total = ?, sell_total = ?, grand_total = ?,
                               updated_at = ?
             WHERE id = ?",
        )
        .bind(decimal_text(totals.onspot_total))
        .bind(decimal_text(totals.hassle_total))
        .bind(decimal_text(totals.commissionable_net))
        .bind(decimal_text(totals.commission_total))
        .bind(decimal_text(totals.sell_total))
        .bind(decimal_text(totals.grand_total))
        .bind(timestamp_text(updated_at))
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<QuoteSummary>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, title, client_name, start_date, end_date, pax, grand_total, updated_at
             FROM quotes ORDER BY updated_at DESC, id DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_summary).collect::<Result<Vec<_>, _>>()
    }

    async fn set_day_destinations(
        &self,
        id: QuoteId,
        destinations: &[(DayId, String)],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        for (day_id, destination) in destinations {
            sqlx::query("UPDATE quote_days SET destination = ? WHERE id = ? AND quote_id = ?")
                .bind(destination)
                .bind(day_id.0)
                .bind(id.0)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("UPDATE quotes SET updated_at = ? WHERE id = ?")
            .bind(timestamp_text(Utc::now()))
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use serde_json::json;

    use magalia_core::domain::payload::LinePayload;
    use magalia_core::domain::quote::{DayId, Quote, QuoteDay, QuoteId, QuoteLine, Visibility};

    use super::SqlQuoteRepository;
    use crate::repositories::QuoteRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn sample_quote() -> Quote {
        let mut quote = Quote::new(Some("Provence in spring"));
        quote.pax = Some(4);
        quote.client_name = Some("Famille Roux".to_string());
        quote.start_date = NaiveDate::from_ymd_opt(2024, 4, 10);
        quote.fx_rate = Some(Decimal::new(92, 2));

        let mut avignon = QuoteDay::new(NaiveDate::from_ymd_opt(2024, 4, 10), Some("Avignon"));
        avignon.decorative_images =
            vec!["https://cdn/a.jpg".to_string(), "https://cdn/b.jpg".to_string()];
        let mut hotel = QuoteLine::new("Hotel", "La Mirande");
        hotel.achat_eur = Some(Decimal::new(42000, 2));
        hotel.fx_rate = Some(Decimal::new(933333, 6));
        hotel.raw_json = LinePayload::new(json!({
            "room_type": "Junior Suite",
            "breakfast": true,
            "a": {"z": 1, "b": 2}
        }));
        let mut note = QuoteLine::new("Internal", "call the concierge");
        note.visibility = Visibility::Internal;
        avignon.lines = vec![hotel, note];

        let arles = QuoteDay::new(NaiveDate::from_ymd_opt(2024, 4, 11), Some("Arles"));
        quote.days = vec![avignon, arles];
        quote.renumber();
        quote
    }

    #[tokio::test]
    async fn create_and_find_round_trip_preserves_graph() {
        let repo = SqlQuoteRepository::new(setup().await);

        let stored = repo.create(sample_quote()).await.expect("create");
        assert!(stored.id.0 > 0);

        let found = repo.find_by_id(stored.id).await.expect("find").expect("exists");
        assert_eq!(found.title.as_deref(), Some("Provence in spring"));
        assert_eq!(found.fx_rate, Some(Decimal::new(92, 2)));
        assert_eq!(found.days.len(), 2);
        assert_eq!(found.days[0].destination.as_deref(), Some("Avignon"));
        assert_eq!(found.days[0].decorative_images.len(), 2);
        assert_eq!(found.days[0].lines.len(), 2);
        assert!(found.days[0].lines[0].id.is_some());
        assert_eq!(found.days[0].lines[1].visibility, Visibility::Internal);
        assert_eq!(
            serde_json::to_string(&found.days[0].lines[0].raw_json).expect("encode"),
            r#"{"room_type":"Junior Suite","breakfast":true,"a":{"z":1,"b":2}}"#
        );
    }

    #[tokio::test]
    async fn replace_swaps_days_and_assigns_fresh_ids() {
        let repo = SqlQuoteRepository::new(setup().await);
        let stored = repo.create(sample_quote()).await.expect("create");
        let old_line_id = stored.days[0].lines[0].id;

        let mut edited = stored.clone();
        edited.title = Some("Provence, revised".to_string());
        edited.days.truncate(1);
        edited.days[0].lines.truncate(1);
        for day in &mut edited.days {
            day.id = None;
            for line in &mut day.lines {
                line.id = None;
            }
        }

        let replaced = repo.replace(edited).await.expect("replace").expect("exists");

        assert_eq!(replaced.title.as_deref(), Some("Provence, revised"));
        assert_eq!(replaced.days.len(), 1);
        assert_eq!(replaced.days[0].lines.len(), 1);
        assert_ne!(replaced.days[0].lines[0].id, old_line_id);

        let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM quote_lines")
            .fetch_one(&repo.pool)
            .await
            .expect("count lines");
        assert_eq!(orphans, 1);
    }

    #[tokio::test]
    async fn replace_of_unknown_quote_returns_none() {
        let repo = SqlQuoteRepository::new(setup().await);
        let mut ghost = sample_quote();
        ghost.id = QuoteId(404);

        assert!(repo.replace(ghost).await.expect("replace").is_none());
    }

    #[tokio::test]
    async fn recent_lists_newest_first_with_limit() {
        let repo = SqlQuoteRepository::new(setup().await);
        for title in ["first", "second", "third"] {
            let mut quote = Quote::new(Some(title));
            quote.updated_at = quote.updated_at + chrono::Duration::seconds(title.len() as i64);
            repo.create(quote).await.expect("create");
        }

        let recent = repo.list_recent(2).await.expect("recent");

        assert_eq!(recent.len(), 2);
        assert!(recent[0].updated_at >= recent[1].updated_at);
    }

    #[tokio::test]
    async fn day_destinations_update_in_place() {
        let repo = SqlQuoteRepository::new(setup().await);
        let stored = repo.create(sample_quote()).await.expect("create");
        let day_id: DayId = stored.days[1].id.expect("day id");

        repo.set_day_destinations(stored.id, &[(day_id, "Les Baux".to_string())])
            .await
            .expect("patch");

        let found = repo.find_by_id(stored.id).await.expect("find").expect("exists");
        assert_eq!(found.days[1].destination.as_deref(), Some("Les Baux"));
        assert_eq!(found.days[0].lines.len(), 2);
    }
}
