//! Version rules that do not touch storage: label sequencing, the auto-version
//! throttle, and snapshot build/apply.

use std::sync::OnceLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::domain::quote::Quote;
use crate::domain::version::{ExportKind, NewQuoteVersion, VersionType};
use crate::domain::view::QuoteView;
use crate::errors::DomainError;

pub const FIRST_LABEL: &str = "v1";

fn label_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\s*[vV](\d+)").ok()).as_ref()
}

/// Numeric suffix of a `vN` label; anything else yields `None`.
pub fn label_number(label: &str) -> Option<u64> {
    label_pattern()?.captures(label).and_then(|captures| captures[1].parse().ok())
}

/// Next label for a quote.
///
/// `latest_active` is the label of the most recent non-archived version;
/// `all_labels` covers every version ever written for the quote, archived ones
/// included, so an archived number is never handed out again.
pub fn next_label<'a>(
    latest_active: Option<&str>,
    all_labels: impl IntoIterator<Item = &'a str>,
) -> String {
    let latest = latest_active.and_then(label_number);
    let highest = all_labels.into_iter().filter_map(label_number).max();

    match latest.max(highest) {
        Some(number) => format!("v{}", number + 1),
        None => FIRST_LABEL.to_string(),
    }
}

/// Start of the rolling window inside which a second export version is skipped.
pub fn throttle_window_start(now: DateTime<Utc>, window_minutes: i64) -> DateTime<Utc> {
    now - Duration::minutes(window_minutes.max(0))
}

/// `recent_exists` says whether a non-archived version of the same type was
/// written inside the throttle window.
pub fn should_auto_create(version_type: VersionType, recent_exists: bool) -> bool {
    !(version_type.is_throttled() && recent_exists)
}

pub fn restore_comment(target_label: &str) -> String {
    format!("Auto: state before restore from {target_label}")
}

pub fn build_snapshot(quote: &Quote) -> Result<Value, DomainError> {
    serde_json::to_value(QuoteView::from(quote))
        .map_err(|error| DomainError::InvariantViolation(format!("snapshot encoding: {error}")))
}

pub fn parse_snapshot(snapshot: &Value) -> Result<QuoteView, DomainError> {
    match snapshot {
        Value::Object(map) if !map.is_empty() => {}
        Value::Object(_) | Value::Null => {
            return Err(DomainError::InvalidSnapshot("snapshot is empty".to_string()))
        }
        _ => return Err(DomainError::InvalidSnapshot("snapshot is not an object".to_string())),
    }

    serde_json::from_value::<QuoteView>(snapshot.clone())
        .map_err(|error| DomainError::InvalidSnapshot(error.to_string()))
}

/// Overwrites the live quote with the snapshot contents. Identity and
/// creation time stay with the live quote; days and lines are replaced
/// wholesale and come back without ids.
pub fn apply_snapshot(quote: &mut Quote, snapshot: &Value) -> Result<(), DomainError> {
    let view = parse_snapshot(snapshot)?;
    let mut restored = view.to_quote(quote.id);
    restored.created_at = quote.created_at;
    restored.updated_at = Utc::now();
    restored.renumber();
    *quote = restored;
    Ok(())
}

/// Everything needed to insert a version except the label, which storage
/// decides at write time.
#[derive(Clone, Debug, PartialEq)]
pub struct VersionDraft {
    pub version_type: VersionType,
    pub comment: Option<String>,
    pub created_by: Option<String>,
    pub export_file_name: Option<String>,
}

impl VersionDraft {
    pub fn manual(comment: &str, created_by: Option<String>) -> Result<Self, DomainError> {
        let comment = comment.trim();
        if comment.is_empty() {
            return Err(DomainError::MissingComment);
        }
        Ok(Self {
            version_type: VersionType::Manual,
            comment: Some(comment.to_string()),
            created_by,
            export_file_name: None,
        })
    }

    pub fn automatic(version_type: VersionType, created_by: Option<String>) -> Self {
        Self { version_type, comment: None, created_by, export_file_name: None }
    }

    pub fn before_restore(target_label: &str, created_by: Option<String>) -> Self {
        Self {
            version_type: VersionType::AutoBeforeRestore,
            comment: Some(restore_comment(target_label)),
            created_by,
            export_file_name: None,
        }
    }

    pub fn with_export_file(mut self, file_name: impl Into<String>) -> Self {
        self.export_file_name = Some(file_name.into());
        self
    }

    pub fn export_kind(&self) -> Option<ExportKind> {
        self.version_type.export_kind()
    }

    pub fn into_new_version(
        self,
        quote: &Quote,
        label: String,
        total_price: Option<Decimal>,
    ) -> Result<NewQuoteVersion, DomainError> {
        let export_type = self.export_kind();
        Ok(NewQuoteVersion {
            quote_id: quote.id,
            label,
            comment: self.comment,
            created_at: Utc::now(),
            created_by: self.created_by,
            version_type: self.version_type,
            export_type,
            export_file_name: if export_type.is_some() { self.export_file_name } else { None },
            total_price,
            snapshot_json: build_snapshot(quote)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{
        apply_snapshot, build_snapshot, label_number, next_label, restore_comment,
        should_auto_create, throttle_window_start, VersionDraft,
    };
    use crate::domain::payload::LinePayload;
    use crate::domain::quote::{LineId, Quote, QuoteDay, QuoteId, QuoteLine, Visibility};
    use crate::domain::version::{ExportKind, VersionType};
    use crate::errors::DomainError;

    fn sample_quote() -> Quote {
        let mut quote = Quote::new(Some("Andalusia"));
        quote.id = QuoteId(12);
        quote.pax = Some(4);
        quote.client_name = Some("Ms Moreau".to_string());
        quote.onspot_manual = Some(Decimal::new(4500, 2));
        let mut seville = QuoteDay::new(NaiveDate::from_ymd_opt(2024, 9, 2), Some("Seville"));
        seville.decorative_images = vec!["https://img/a.jpg".to_string()];
        let mut hotel = QuoteLine::new("Hotel", "Alfonso XIII");
        hotel.id = Some(LineId(5));
        hotel.achat_eur = Some(Decimal::new(30000, 2));
        hotel.fx_rate = Some(Decimal::new(925926, 6));
        hotel.raw_json =
            LinePayload::new(json!({"room_type": "Deluxe", "z_last": [3, 2, 1], "buff_pct": 7}));
        let mut note = QuoteLine::new("Trip info", "Bring a hat");
        note.visibility = Visibility::Internal;
        seville.lines = vec![hotel, note];
        quote.days = vec![seville, QuoteDay::new(None, None)];
        quote.renumber();
        quote
    }

    #[test]
    fn label_numbers_parse_only_v_prefixed_suffixes() {
        assert_eq!(label_number("v12"), Some(12));
        assert_eq!(label_number("V3"), Some(3));
        assert_eq!(label_number("draft"), None);
        assert_eq!(label_number(""), None);
    }

    #[test]
    fn labels_start_at_v1_and_increment() {
        assert_eq!(next_label(None, []), "v1");

        let mut issued: Vec<String> = Vec::new();
        for _ in 0..4 {
            let latest = issued.last().cloned();
            let label = next_label(latest.as_deref(), issued.iter().map(String::as_str));
            issued.push(label);
        }
        assert_eq!(issued, vec!["v1", "v2", "v3", "v4"]);
    }

    #[test]
    fn archiving_never_lowers_the_sequence() {
        // v1..v3 issued, v3 archived: latest active is v2 but v4 comes next.
        let label = next_label(Some("v2"), ["v1", "v2", "v3"]);
        assert_eq!(label, "v4");

        // everything archived still continues the sequence
        assert_eq!(next_label(None, ["v1", "v2"]), "v3");
    }

    #[test]
    fn unparseable_labels_contribute_nothing() {
        assert_eq!(next_label(Some("before trip"), ["before trip", "custom"]), "v1");
        assert_eq!(next_label(Some("custom"), ["v7", "custom"]), "v8");
    }

    #[test]
    fn throttle_only_blocks_recent_export_versions() {
        assert!(!should_auto_create(VersionType::AutoExportWord, true));
        assert!(should_auto_create(VersionType::AutoExportWord, false));
        assert!(should_auto_create(VersionType::AutoInitial, true));
        assert!(should_auto_create(VersionType::AutoBeforeRestore, true));
        assert!(should_auto_create(VersionType::Manual, true));

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).single().expect("valid timestamp");
        let start = throttle_window_start(now, 60);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 1, 1, 11, 0, 0).single().expect("valid"));
    }

    #[test]
    fn snapshot_round_trip_reproduces_days_and_lines() {
        let original = sample_quote();
        let snapshot = build_snapshot(&original).expect("snapshot");

        let mut fresh = Quote::new(Some("something else"));
        fresh.id = QuoteId(99);
        apply_snapshot(&mut fresh, &snapshot).expect("apply");

        assert_eq!(fresh.id, QuoteId(99));
        assert_eq!(fresh.title, original.title);
        assert_eq!(fresh.client_name, original.client_name);
        assert_eq!(fresh.onspot_manual, original.onspot_manual);
        assert_eq!(fresh.days.len(), original.days.len());
        for (restored, source) in fresh.days.iter().zip(&original.days) {
            assert_eq!(restored.date, source.date);
            assert_eq!(restored.destination, source.destination);
            assert_eq!(restored.decorative_images, source.decorative_images);
            assert_eq!(restored.lines.len(), source.lines.len());
            for (line, expected) in restored.lines.iter().zip(&source.lines) {
                assert_eq!(line.id, None);
                assert_eq!(line.title, expected.title);
                assert_eq!(line.visibility, expected.visibility);
                assert_eq!(line.fx_rate, expected.fx_rate);
                assert_eq!(
                    serde_json::to_string(&line.raw_json).expect("encode"),
                    serde_json::to_string(&expected.raw_json).expect("encode")
                );
            }
        }
    }

    #[test]
    fn empty_quote_round_trips() {
        let original = Quote::new(None);
        let snapshot = build_snapshot(&original).expect("snapshot");
        let mut fresh = sample_quote();

        apply_snapshot(&mut fresh, &snapshot).expect("apply");

        assert!(fresh.days.is_empty());
        assert_eq!(fresh.title, None);
    }

    #[test]
    fn empty_or_missing_snapshot_is_rejected() {
        let mut quote = sample_quote();
        for snapshot in [json!(null), json!({}), json!([1, 2])] {
            let error = apply_snapshot(&mut quote, &snapshot).expect_err("must reject");
            assert!(matches!(error, DomainError::InvalidSnapshot(_)));
        }
        assert_eq!(quote.days.len(), 2);
    }

    #[test]
    fn manual_drafts_require_a_comment() {
        assert_eq!(VersionDraft::manual("   ", None), Err(DomainError::MissingComment));
        let draft = VersionDraft::manual("  sent to client ", Some("ana".to_string()))
            .expect("comment present");
        assert_eq!(draft.comment.as_deref(), Some("sent to client"));
    }

    #[test]
    fn export_drafts_carry_export_metadata() {
        let quote = sample_quote();
        let version = VersionDraft::automatic(VersionType::AutoExportExcel, None)
            .with_export_file("quote_12.xlsx")
            .into_new_version(&quote, "v3".to_string(), Some(Decimal::new(1000, 0)))
            .expect("draft");

        assert_eq!(version.export_type, Some(ExportKind::Excel));
        assert_eq!(version.export_file_name.as_deref(), Some("quote_12.xlsx"));
        assert_eq!(version.snapshot_json["id"], json!(12));

        let restore = VersionDraft::before_restore("v2", None)
            .with_export_file("ignored.docx")
            .into_new_version(&quote, "v4".to_string(), None)
            .expect("draft");
        assert_eq!(restore.comment.as_deref(), Some(restore_comment("v2").as_str()));
        assert_eq!(restore.export_type, None);
        assert_eq!(restore.export_file_name, None);
    }
}
