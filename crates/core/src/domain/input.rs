use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::domain::payload::LinePayload;
use crate::domain::quote::{LineId, Quote, QuoteDay, QuoteLine, Visibility};
use crate::errors::DomainError;
use crate::pricing::fx::reconcile_line_fx;

pub const MAX_DECORATIVE_IMAGES: usize = 2;

/// Create/update payload. Days and lines are positional: their order in the
/// arrays is the order they are stored in.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct QuoteInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub display_title: Option<String>,
    #[serde(default)]
    pub hero_photo_1: Option<String>,
    #[serde(default)]
    pub hero_photo_2: Option<String>,
    #[serde(default)]
    pub pax: Option<i64>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub travel_agency: Option<String>,
    #[serde(default)]
    pub travel_advisor: Option<String>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub fx_rate: Option<Decimal>,
    #[serde(default)]
    pub internal_note: Option<String>,
    #[serde(default)]
    pub margin_pct: Option<Decimal>,
    /// Outer `None`: field absent, stored override kept. `Some(None)`: cleared.
    #[serde(default, deserialize_with = "present")]
    pub onspot_manual: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "present")]
    pub hassle_manual: Option<Option<Decimal>>,
    #[serde(default)]
    pub days: Vec<DayInput>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct DayInput {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub decorative_images: Vec<String>,
    #[serde(default)]
    pub lines: Vec<LineInput>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct LineInput {
    /// Echo of a stored line id; only used to find the line being replaced.
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub service_id: Option<i64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub supplier_name: Option<String>,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub achat_eur: Option<Decimal>,
    #[serde(default)]
    pub achat_usd: Option<Decimal>,
    #[serde(default)]
    pub vente_usd: Option<Decimal>,
    #[serde(default)]
    pub fx_rate: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub base_net_amount: Option<Decimal>,
    #[serde(default)]
    pub raw_json: Value,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Accepts `YYYY-MM-DD` (a trailing time part is ignored). Blank means unset.
pub fn parse_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, DomainError> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let date_part = raw.split_once('T').map(|(date, _)| date).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| DomainError::InvalidDate { field: field.to_string(), value: raw.to_string() })
}

impl QuoteInput {
    /// Builds a brand-new quote; storage assigns the id.
    pub fn into_new_quote(self) -> Result<Quote, DomainError> {
        let mut quote = Quote::new(None);
        self.write_into(&mut quote, None)?;
        Ok(quote)
    }

    /// Builds the replacement for `existing`. Scalars are replaced wholesale except
    /// `margin_pct` and the manual onspot/hassle overrides, which keep the stored
    /// value when omitted. Days and lines are rebuilt from scratch.
    pub fn apply_to(self, existing: &Quote) -> Result<Quote, DomainError> {
        let mut quote = existing.clone();
        self.write_into(&mut quote, Some(existing))?;
        quote.updated_at = Utc::now();
        Ok(quote)
    }

    fn write_into(self, quote: &mut Quote, previous: Option<&Quote>) -> Result<(), DomainError> {
        quote.start_date = parse_date("start_date", self.start_date.as_deref())?;
        quote.end_date = parse_date("end_date", self.end_date.as_deref())?;
        quote.title = self.title;
        quote.display_title = self.display_title;
        quote.hero_photo_1 = self.hero_photo_1;
        quote.hero_photo_2 = self.hero_photo_2;
        quote.pax = self.pax;
        quote.travel_agency = self.travel_agency;
        quote.travel_advisor = self.travel_advisor;
        quote.client_name = self.client_name;
        quote.fx_rate = self.fx_rate;
        quote.internal_note = self.internal_note;
        if let Some(margin_pct) = self.margin_pct {
            quote.margin_pct = margin_pct;
        }
        if let Some(onspot_manual) = self.onspot_manual {
            quote.onspot_manual = onspot_manual;
        }
        if let Some(hassle_manual) = self.hassle_manual {
            quote.hassle_manual = hassle_manual;
        }

        let mut days = Vec::with_capacity(self.days.len());
        for (day_index, day_input) in self.days.into_iter().enumerate() {
            let date = parse_date(&format!("days[{day_index}].date"), day_input.date.as_deref())?;
            let mut day = QuoteDay::new(date, day_input.destination.as_deref());
            day.position = day_index as i64;
            day.decorative_images = day_input
                .decorative_images
                .into_iter()
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty())
                .take(MAX_DECORATIVE_IMAGES)
                .collect();

            for (line_index, line_input) in day_input.lines.into_iter().enumerate() {
                let previous_fx = previous
                    .and_then(|stored| {
                        stored.previous_line(line_input.id.map(LineId), day_index, line_index)
                    })
                    .and_then(|line| line.fx_rate);
                let mut line = line_input.into_line(previous_fx);
                line.position = line_index as i64;
                day.lines.push(line);
            }
            days.push(day);
        }
        quote.days = days;
        Ok(())
    }
}

impl LineInput {
    pub fn into_line(self, previous_fx: Option<Decimal>) -> QuoteLine {
        let raw_json = LinePayload::new(self.raw_json);
        let decision =
            reconcile_line_fx(&raw_json, self.achat_eur, self.achat_usd, self.fx_rate, previous_fx);

        QuoteLine {
            id: None,
            position: 0,
            service_id: self.service_id,
            category: self.category,
            title: self.title,
            supplier_name: self.supplier_name,
            visibility: Visibility::parse_lenient(self.visibility.as_deref()),
            achat_eur: self.achat_eur,
            achat_usd: self.achat_usd,
            vente_usd: self.vente_usd,
            fx_rate: decision.rate,
            currency: self.currency,
            base_net_amount: self.base_net_amount,
            raw_json,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{parse_date, QuoteInput};
    use crate::domain::quote::{LineId, Quote};
    use crate::errors::DomainError;

    fn dec(value: &str) -> Decimal {
        value.parse().expect("decimal literal")
    }

    fn input(value: serde_json::Value) -> QuoteInput {
        serde_json::from_value(value).expect("quote input")
    }

    #[test]
    fn parse_date_accepts_blank_and_iso_and_rejects_garbage() {
        assert_eq!(parse_date("start_date", None), Ok(None));
        assert_eq!(parse_date("start_date", Some("  ")), Ok(None));
        assert_eq!(
            parse_date("start_date", Some("2024-06-01T00:00:00")),
            Ok(NaiveDate::from_ymd_opt(2024, 6, 1))
        );
        assert!(matches!(
            parse_date("end_date", Some("01/06/2024")),
            Err(DomainError::InvalidDate { ref field, .. }) if field == "end_date"
        ));
    }

    #[test]
    fn string_pax_is_a_malformed_payload() {
        let parsed = serde_json::from_value::<QuoteInput>(json!({"pax": "four"}));
        assert!(parsed.is_err());
    }

    #[test]
    fn new_quote_assigns_positions_and_caps_images() {
        let quote = input(json!({
            "title": "Provence",
            "pax": 4,
            "days": [
                {
                    "date": "2024-05-01",
                    "destination": "Avignon",
                    "decorative_images": ["a", " ", "b", "c"],
                    "lines": [
                        {"category": "Hotel", "title": "Mas"},
                        {"category": "Activity", "title": "Wine"}
                    ]
                },
                {"date": "", "destination": "Arles"}
            ]
        }))
        .into_new_quote()
        .expect("valid payload");

        assert_eq!(quote.margin_pct, dec("0.1627"));
        assert_eq!(quote.days.len(), 2);
        assert_eq!(quote.days[0].decorative_images, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(quote.days[0].lines[1].position, 1);
        assert_eq!(quote.days[1].position, 1);
        assert_eq!(quote.days[1].date, None);
    }

    #[test]
    fn malformed_day_date_is_rejected_with_field_path() {
        let error = input(json!({"days": [{"date": "tomorrow"}]}))
            .into_new_quote()
            .expect_err("invalid date should fail");

        assert!(matches!(
            error,
            DomainError::InvalidDate { ref field, .. } if field == "days[0].date"
        ));
    }

    #[test]
    fn update_preserves_buffered_rate_from_previous_line() {
        let mut stored = input(json!({
            "days": [{"lines": [{
                "category": "Hotel", "title": "Ritz", "fx_rate": 0.91,
                "raw_json": {"buff_pct": 10}
            }]}]
        }))
        .into_new_quote()
        .expect("stored quote");
        stored.days[0].lines[0].id = Some(LineId(77));
        assert_eq!(stored.days[0].lines[0].fx_rate, Some(dec("0.91")));

        let updated = input(json!({
            "title": "renamed",
            "days": [{"lines": [{
                "category": "Hotel", "title": "Ritz", "achat_eur": 100, "achat_usd": 120,
                "raw_json": {"buff_pct": 10}
            }]}]
        }))
        .apply_to(&stored)
        .expect("update");

        assert_eq!(updated.title.as_deref(), Some("renamed"));
        assert_eq!(updated.days[0].lines[0].fx_rate, Some(dec("0.91")));
    }

    #[test]
    fn partial_update_keeps_margin_and_manual_overrides() {
        let mut stored = Quote::new(Some("t"));
        stored.margin_pct = dec("0.2");
        stored.onspot_manual = Some(dec("50"));
        stored.hassle_manual = Some(dec("75"));

        let updated = input(json!({"title": "t"})).apply_to(&stored).expect("update");

        assert_eq!(updated.margin_pct, dec("0.2"));
        assert_eq!(updated.onspot_manual, Some(dec("50")));
        assert_eq!(updated.hassle_manual, Some(dec("75")));
    }

    #[test]
    fn explicit_null_clears_a_manual_override() {
        let mut stored = Quote::new(Some("t"));
        stored.onspot_manual = Some(dec("50"));
        stored.hassle_manual = Some(dec("75"));

        let updated = input(json!({"onspot_manual": null, "hassle_manual": "12.5"}))
            .apply_to(&stored)
            .expect("update");

        assert_eq!(updated.onspot_manual, None);
        assert_eq!(updated.hassle_manual, Some(dec("12.5")));
    }

    #[test]
    fn raw_json_is_stored_verbatim() {
        let raw = json!({"z": [1, {"b": 2, "a": 1}], "buff_pct": null, "note": ""});
        let quote = input(json!({
            "days": [{"lines": [{"category": "Flight", "raw_json": raw.clone()}]}]
        }))
        .into_new_quote()
        .expect("quote");

        assert_eq!(quote.days[0].lines[0].raw_json.as_value(), &raw);
    }
}
