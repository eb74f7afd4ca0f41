//! Externally visible shape of a quote. Reads, snapshots and exports all use it,
//! so a snapshot can be applied back onto a live quote field for field.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::payload::LinePayload;
use crate::domain::quote::{
    DayId, LineId, Quote, QuoteDay, QuoteId, QuoteLine, QuoteTotals, Visibility,
    DEFAULT_MARGIN_PCT,
};

fn default_margin() -> Decimal {
    DEFAULT_MARGIN_PCT
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteView {
    pub id: QuoteId,
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
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
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
    #[serde(default = "default_margin")]
    pub margin_pct: Decimal,
    #[serde(default)]
    pub onspot_manual: Option<Decimal>,
    #[serde(default)]
    pub hassle_manual: Option<Decimal>,
    #[serde(default)]
    pub onspot_total: Option<Decimal>,
    #[serde(default)]
    pub hassle_total: Option<Decimal>,
    #[serde(default)]
    pub commissionable_net: Option<Decimal>,
    #[serde(default)]
    pub commission_total: Option<Decimal>,
    #[serde(default)]
    pub sell_total: Option<Decimal>,
    #[serde(default)]
    pub grand_total: Option<Decimal>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub days: Vec<DayView>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DayView {
    #[serde(default)]
    pub id: Option<DayId>,
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub decorative_images: Vec<String>,
    #[serde(default)]
    pub lines: Vec<LineView>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineView {
    #[serde(default)]
    pub id: Option<LineId>,
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub service_id: Option<i64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub supplier_name: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
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
    pub raw_json: LinePayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_image_url: Option<String>,
}

/// Row of the recently-updated quotes list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteSummary {
    pub id: QuoteId,
    pub title: Option<String>,
    pub client_name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub pax: Option<i64>,
    pub grand_total: Option<Decimal>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Quote> for QuoteSummary {
    fn from(quote: &Quote) -> Self {
        Self {
            id: quote.id,
            title: quote.title.clone(),
            client_name: quote.client_name.clone(),
            start_date: quote.start_date,
            end_date: quote.end_date,
            pax: quote.pax,
            grand_total: quote.totals.grand_total,
            updated_at: quote.updated_at,
        }
    }
}

impl From<&QuoteLine> for LineView {
    fn from(line: &QuoteLine) -> Self {
        Self {
            id: line.id,
            position: line.position,
            service_id: line.service_id,
            category: line.category.clone(),
            title: line.title.clone(),
            supplier_name: line.supplier_name.clone(),
            visibility: line.visibility,
            achat_eur: line.achat_eur,
            achat_usd: line.achat_usd,
            vente_usd: line.vente_usd,
            fx_rate: line.fx_rate,
            currency: line.currency.clone(),
            base_net_amount: line.base_net_amount,
            raw_json: line.raw_json.clone(),
            first_image_url: None,
        }
    }
}

impl From<&QuoteDay> for DayView {
    fn from(day: &QuoteDay) -> Self {
        Self {
            id: day.id,
            position: day.position,
            date: day.date,
            destination: day.destination.clone(),
            decorative_images: day.decorative_images.clone(),
            lines: day.lines.iter().map(LineView::from).collect(),
        }
    }
}

impl From<&Quote> for QuoteView {
    fn from(quote: &Quote) -> Self {
        let mut days: Vec<DayView> = quote.days.iter().map(DayView::from).collect();
        days.sort_by_key(|day| day.position);
        for day in &mut days {
            day.lines.sort_by_key(|line| line.position);
        }

        Self {
            id: quote.id,
            title: quote.title.clone(),
            display_title: quote.display_title.clone(),
            hero_photo_1: quote.hero_photo_1.clone(),
            hero_photo_2: quote.hero_photo_2.clone(),
            pax: quote.pax,
            start_date: quote.start_date,
            end_date: quote.end_date,
            travel_agency: quote.travel_agency.clone(),
            travel_advisor: quote.travel_advisor.clone(),
            client_name: quote.client_name.clone(),
            fx_rate: quote.fx_rate,
            internal_note: quote.internal_note.clone(),
            margin_pct: quote.margin_pct,
            onspot_manual: quote.onspot_manual,
            hassle_manual: quote.hassle_manual,
            onspot_total: quote.totals.onspot_total,
            hassle_total: quote.totals.hassle_total,
            commissionable_net: quote.totals.commissionable_net,
            commission_total: quote.totals.commission_total,
            sell_total: quote.totals.sell_total,
            grand_total: quote.totals.grand_total,
            created_at: Some(quote.created_at),
            updated_at: Some(quote.updated_at),
            days,
        }
    }
}

impl LineView {
    /// Rebuilds a storable line. Ids are dropped: restored rows get fresh ones.
    pub fn to_line(&self) -> QuoteLine {
        QuoteLine {
            id: None,
            position: self.position,
            service_id: self.service_id,
            category: self.category.clone(),
            title: self.title.clone(),
            supplier_name: self.supplier_name.clone(),
            visibility: self.visibility,
            achat_eur: self.achat_eur,
            achat_usd: self.achat_usd,
            vente_usd: self.vente_usd,
            fx_rate: self.fx_rate,
            currency: self.currency.clone(),
            base_net_amount: self.base_net_amount,
            raw_json: self.raw_json.clone(),
        }
    }
}

impl DayView {
    pub fn to_day(&self) -> QuoteDay {
        QuoteDay {
            id: None,
            position: self.position,
            date: self.date,
            destination: self.destination.clone(),
            decorative_images: self.decorative_images.clone(),
            lines: self.lines.iter().map(LineView::to_line).collect(),
        }
    }
}

impl QuoteView {
    pub fn totals(&self) -> QuoteTotals {
        QuoteTotals {
            onspot_total: self.onspot_total,
            hassle_total: self.hassle_total,
            commissionable_net: self.commissionable_net,
            commission_total: self.commission_total,
            sell_total: self.sell_total,
            grand_total: self.grand_total,
        }
    }

    pub fn lines_mut(&mut self) -> impl Iterator<Item = &mut LineView> {
        self.days.iter_mut().flat_map(|day| day.lines.iter_mut())
    }

    /// Rebuilds the quote graph the view describes, stamped with `id`.
    pub fn to_quote(&self, id: QuoteId) -> Quote {
        let mut quote = Quote::new(self.title.as_deref());
        quote.id = id;
        quote.display_title = self.display_title.clone();
        quote.hero_photo_1 = self.hero_photo_1.clone();
        quote.hero_photo_2 = self.hero_photo_2.clone();
        quote.pax = self.pax;
        quote.start_date = self.start_date;
        quote.end_date = self.end_date;
        quote.travel_agency = self.travel_agency.clone();
        quote.travel_advisor = self.travel_advisor.clone();
        quote.client_name = self.client_name.clone();
        quote.fx_rate = self.fx_rate;
        quote.internal_note = self.internal_note.clone();
        quote.margin_pct = self.margin_pct;
        quote.onspot_manual = self.onspot_manual;
        quote.hassle_manual = self.hassle_manual;
        quote.totals = self.totals();
        quote.days = self.days.iter().map(DayView::to_day).collect();
        if let Some(created_at) = self.created_at {
            quote.created_at = created_at;
        }
        if let Some(updated_at) = self.updated_at {
            quote.updated_at = updated_at;
        }
        quote
    }
}
