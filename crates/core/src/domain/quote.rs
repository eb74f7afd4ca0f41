use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::category::LineCategory;
use crate::domain::payload::LinePayload;

pub const DEFAULT_MARGIN_PCT: Decimal = Decimal::from_parts(1627, 0, 0, false, 4);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuoteId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(pub i64);

impl QuoteId {
    /// Placeholder carried by quotes that storage has not assigned an id to yet.
    pub const UNASSIGNED: QuoteId = QuoteId(0);
}

impl fmt::Display for QuoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for DayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Client,
    Internal,
    CostOnly,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Internal => "internal",
            Self::CostOnly => "cost_only",
        }
    }

    /// Unknown or missing tags fall back to `client`, matching how lines are created.
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("internal") => Self::Internal,
            Some("cost_only") | Some("cost-only") => Self::CostOnly,
            _ => Self::Client,
        }
    }

    pub fn is_client_facing(&self) -> bool {
        matches!(self, Self::Client)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteLine {
    pub id: Option<LineId>,
    pub position: i64,
    pub service_id: Option<i64>,
    pub category: Option<String>,
    pub title: Option<String>,
    pub supplier_name: Option<String>,
    pub visibility: Visibility,
    pub achat_eur: Option<Decimal>,
    pub achat_usd: Option<Decimal>,
    pub vente_usd: Option<Decimal>,
    pub fx_rate: Option<Decimal>,
    pub currency: Option<String>,
    pub base_net_amount: Option<Decimal>,
    pub raw_json: LinePayload,
}

impl QuoteLine {
    pub fn new(category: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: None,
            position: 0,
            service_id: None,
            category: Some(category.into()),
            title: Some(title.into()),
            supplier_name: None,
            visibility: Visibility::Client,
            achat_eur: None,
            achat_usd: None,
            vente_usd: None,
            fx_rate: None,
            currency: None,
            base_net_amount: None,
            raw_json: LinePayload::default(),
        }
    }

    pub fn category(&self) -> LineCategory {
        LineCategory::parse(self.category.as_deref())
    }

    pub fn is_paid(&self) -> bool {
        self.category().is_paid()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteDay {
    pub id: Option<DayId>,
    pub position: i64,
    pub date: Option<NaiveDate>,
    pub destination: Option<String>,
    pub decorative_images: Vec<String>,
    pub lines: Vec<QuoteLine>,
}

impl QuoteDay {
    pub fn new(date: Option<NaiveDate>, destination: Option<&str>) -> Self {
        Self {
            id: None,
            position: 0,
            date,
            destination: destination.map(str::to_owned),
            decorative_images: Vec::new(),
            lines: Vec::new(),
        }
    }

    pub fn destination_text(&self) -> &str {
        self.destination.as_deref().unwrap_or("")
    }
}

/// Cached totals written back onto the quote after each repricing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteTotals {
    pub onspot_total: Option<Decimal>,
    pub hassle_total: Option<Decimal>,
    pub commissionable_net: Option<Decimal>,
    pub commission_total: Option<Decimal>,
    pub sell_total: Option<Decimal>,
    pub grand_total: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub title: Option<String>,
    pub display_title: Option<String>,
    pub hero_photo_1: Option<String>,
    pub hero_photo_2: Option<String>,
    pub pax: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub travel_agency: Option<String>,
    pub travel_advisor: Option<String>,
    pub client_name: Option<String>,
    pub fx_rate: Option<Decimal>,
    pub internal_note: Option<String>,
    pub margin_pct: Decimal,
    pub onspot_manual: Option<Decimal>,
    pub hassle_manual: Option<Decimal>,
    pub totals: QuoteTotals,
    pub days: Vec<QuoteDay>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    pub fn new(title: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            id: QuoteId::UNASSIGNED,
            title: title.map(str::to_owned),
            display_title: None,
            hero_photo_1: None,
            hero_photo_2: None,
            pax: None,
            start_date: None,
            end_date: None,
            travel_agency: None,
            travel_advisor: None,
            client_name: None,
            fx_rate: None,
            internal_note: None,
            margin_pct: DEFAULT_MARGIN_PCT,
            onspot_manual: None,
            hassle_manual: None,
            totals: QuoteTotals::default(),
            days: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = &QuoteLine> {
        self.days.iter().flat_map(|day| day.lines.iter())
    }

    /// Title shown on client-facing documents.
    pub fn heading(&self) -> Option<&str> {
        [self.display_title.as_deref(), self.title.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|value| !value.is_empty())
    }

    /// Rewrites day and line positions to match their order in the collections.
    pub fn renumber(&mut self) {
        for (day_index, day) in self.days.iter_mut().enumerate() {
            day.position = day_index as i64;
            for (line_index, line) in day.lines.iter_mut().enumerate() {
                line.position = line_index as i64;
            }
        }
    }

    /// Locates the stored line an incoming line replaces: by id when the caller
    /// echoed one back, otherwise by its (day, line) slot.
    pub fn previous_line(
        &self,
        line_id: Option<LineId>,
        day_index: usize,
        line_index: usize,
    ) -> Option<&QuoteLine> {
        if let Some(id) = line_id {
            if let Some(found) = self.lines().find(|line| line.id == Some(id)) {
                return Some(found);
            }
        }
        self.days.get(day_index).and_then(|day| day.lines.get(line_index))
    }
}
