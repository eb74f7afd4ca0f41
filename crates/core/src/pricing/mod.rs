pub mod fx;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::quote::{Quote, QuoteId, QuoteTotals, DEFAULT_MARGIN_PCT};

pub use fx::{quantize_fx, reconcile_line_fx, FxDecision, FxRule, FX_SCALE};

pub const ONSPOT_RATE_PER_CARD_DAY: Decimal = Decimal::from_parts(9, 0, 0, false, 0);
pub const HASSLE_PER_PAX: Decimal = Decimal::from_parts(150, 0, 0, false, 0);
pub const PAX_PER_CARD: i64 = 6;
pub const MIN_BILLED_DAYS: i64 = 3;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTraceStep {
    pub stage: String,
    pub detail: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingResult {
    pub quote_id: QuoteId,
    pub pax: i64,
    pub trip_days: i64,
    pub effective_days: i64,
    pub onspot_cards: i64,
    pub margin_pct: Decimal,
    pub onspot_total: Decimal,
    pub hassle_total: Decimal,
    pub achats_total: Decimal,
    pub commission_total: Decimal,
    pub ventes_total: Decimal,
    pub grand_total: Decimal,
    pub trace: Vec<PricingTraceStep>,
}

impl PricingResult {
    pub fn totals(&self) -> QuoteTotals {
        QuoteTotals {
            onspot_total: Some(self.onspot_total),
            hassle_total: Some(self.hassle_total),
            commissionable_net: Some(self.achats_total),
            commission_total: Some(self.commission_total),
            sell_total: Some(self.ventes_total),
            grand_total: Some(self.grand_total),
        }
    }
}

pub trait PricingEngine: Send + Sync {
    fn reprice(&self, quote: &Quote) -> PricingResult;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicPricingEngine;

impl PricingEngine for DeterministicPricingEngine {
    fn reprice(&self, quote: &Quote) -> PricingResult {
        reprice(quote)
    }
}

/// Margin applied to purchases. A stored zero means "not set" and falls back to
/// the house default.
pub fn effective_margin(margin_pct: Decimal) -> Decimal {
    if margin_pct.is_zero() {
        DEFAULT_MARGIN_PCT
    } else {
        margin_pct
    }
}

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Day rows win; otherwise the inclusive span between start and end dates.
pub fn trip_days(quote: &Quote) -> i64 {
    if !quote.days.is_empty() {
        return quote.days.len() as i64;
    }

    match (quote.start_date, quote.end_date) {
        (Some(start), Some(end)) => ((end - start).num_days() + 1).max(0),
        _ => 0,
    }
}

pub fn onspot_cards(pax: Option<i64>) -> i64 {
    let pax = pax.filter(|value| *value > 0).unwrap_or(1);
    ((pax + PAX_PER_CARD - 1) / PAX_PER_CARD).max(1)
}

pub fn reprice(quote: &Quote) -> PricingResult {
    let pax = quote.pax.unwrap_or(0).max(0);
    let trip_days = trip_days(quote);
    let effective_days = trip_days.max(MIN_BILLED_DAYS);
    let cards = onspot_cards(quote.pax);
    let mut trace = Vec::new();

    let onspot_total = match quote.onspot_manual {
        Some(manual) => {
            trace.push(step("onspot", "manual override", manual));
            manual
        }
        None => {
            let auto =
                Decimal::from(cards) * ONSPOT_RATE_PER_CARD_DAY * Decimal::from(effective_days);
            trace.push(step(
                "onspot",
                format!("{cards} card(s) x 9 x {effective_days} day(s)"),
                auto,
            ));
            auto
        }
    };

    let hassle_total = match quote.hassle_manual {
        Some(manual) => {
            trace.push(step("hassle", "manual override", manual));
            manual
        }
        None => {
            let auto = Decimal::from(pax) * HASSLE_PER_PAX;
            trace.push(step("hassle", format!("{pax} pax x 150"), auto));
            auto
        }
    };

    let (achats_sum, ventes_sum) = quote
        .lines()
        .filter(|line| line.is_paid())
        .fold((Decimal::ZERO, Decimal::ZERO), |(achats, ventes), line| {
            (
                achats + line.achat_usd.unwrap_or(Decimal::ZERO),
                ventes + line.vente_usd.unwrap_or(Decimal::ZERO),
            )
        });
    trace.push(step("achats", "sum(achat_usd) over paid lines", achats_sum));
    trace.push(step("ventes", "sum(vente_usd) over paid lines", ventes_sum));

    let margin_pct = effective_margin(quote.margin_pct);
    let achats_total = round_money(onspot_total + achats_sum);
    let commission_total = round_money(achats_total * margin_pct);
    let ventes_total = round_money(ventes_sum + hassle_total);
    let grand_total = round_money(achats_total + commission_total + ventes_total);

    trace.push(step("achats_total", "onspot + achats", achats_total));
    trace.push(step("commission", format!("achats_total x {margin_pct}"), commission_total));
    trace.push(step("ventes_total", "ventes + hassle", ventes_total));
    trace.push(step("grand_total", "achats_total + commission + ventes_total", grand_total));

    PricingResult {
        quote_id: quote.id,
        pax,
        trip_days,
        effective_days,
        onspot_cards: cards,
        margin_pct,
        onspot_total: round_money(onspot_total),
        hassle_total: round_money(hassle_total),
        achats_total,
        commission_total,
        ventes_total,
        grand_total,
        trace,
    }
}

fn step(stage: &str, detail: impl Into<String>, amount: Decimal) -> PricingTraceStep {
    PricingTraceStep { stage: stage.to_string(), detail: detail.into(), amount }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::{
        effective_margin, onspot_cards, reprice, trip_days, DeterministicPricingEngine,
        PricingEngine,
    };
    use crate::domain::quote::{Quote, QuoteDay, QuoteLine, DEFAULT_MARGIN_PCT};

    fn dec(value: &str) -> Decimal {
        value.parse().expect("decimal literal")
    }

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    fn priced_line(category: &str, achat_usd: &str, vente_usd: &str) -> QuoteLine {
        let mut line = QuoteLine::new(category, category);
        line.achat_usd = Some(dec(achat_usd));
        line.vente_usd = Some(dec(vente_usd));
        line
    }

    #[test]
    fn dates_only_quote_matches_reference_scenario() {
        let mut quote = Quote::new(Some("Loire"));
        quote.pax = Some(7);
        quote.start_date = date(2024, 6, 1);
        quote.end_date = date(2024, 6, 5);

        let result = reprice(&quote);

        assert_eq!(result.trip_days, 5);
        assert_eq!(result.effective_days, 5);
        assert_eq!(result.onspot_cards, 2);
        assert_eq!(result.onspot_total, dec("90"));
        assert_eq!(result.hassle_total, dec("1050"));
    }

    #[test]
    fn cards_are_ceiling_of_pax_over_six_and_never_zero() {
        assert_eq!(onspot_cards(None), 1);
        assert_eq!(onspot_cards(Some(0)), 1);
        for pax in 1..=40_i64 {
            let expected = (pax + 5) / 6;
            assert_eq!(onspot_cards(Some(pax)), expected, "pax {pax}");
            assert!(onspot_cards(Some(pax)) >= 1);
        }
    }

    #[test]
    fn short_trips_are_billed_three_days_of_onspot() {
        let mut quote = Quote::new(None);
        quote.pax = Some(2);
        quote.days = vec![QuoteDay::new(None, Some("Rome"))];

        let result = reprice(&quote);

        assert_eq!(trip_days(&quote), 1);
        assert_eq!(result.effective_days, 3);
        assert_eq!(result.onspot_total, dec("27"));
    }

    #[test]
    fn day_rows_take_precedence_over_dates() {
        let mut quote = Quote::new(None);
        quote.start_date = date(2024, 1, 1);
        quote.end_date = date(2024, 1, 10);
        quote.days = (0..4).map(|_| QuoteDay::new(None, None)).collect();

        assert_eq!(trip_days(&quote), 4);
    }

    #[test]
    fn inverted_dates_count_as_zero_days() {
        let mut quote = Quote::new(None);
        quote.start_date = date(2024, 1, 10);
        quote.end_date = date(2024, 1, 1);

        assert_eq!(trip_days(&quote), 0);
        assert_eq!(reprice(&quote).effective_days, 3);
    }

    #[test]
    fn manual_overrides_bypass_floor_and_pax_rule() {
        let mut quote = Quote::new(None);
        quote.pax = Some(12);
        quote.onspot_manual = Some(dec("10.5"));
        quote.hassle_manual = Some(Decimal::ZERO);

        let result = reprice(&quote);

        assert_eq!(result.onspot_total, dec("10.5"));
        assert_eq!(result.hassle_total, Decimal::ZERO);
    }

    #[test]
    fn informational_lines_never_reach_totals() {
        let mut quote = Quote::new(None);
        quote.pax = Some(1);
        quote.onspot_manual = Some(Decimal::ZERO);
        quote.hassle_manual = Some(Decimal::ZERO);
        let mut day = QuoteDay::new(None, None);
        day.lines = vec![
            priced_line("Trip info", "999", "999"),
            priced_line("INTERNAL", "999", "999"),
            priced_line("Hotel", "100", "200"),
        ];
        let mut unpriced = QuoteLine::new("Activity", "free walk");
        unpriced.achat_usd = None;
        day.lines.push(unpriced);
        quote.days.push(day);

        let result = reprice(&quote);

        assert_eq!(result.achats_total, dec("100"));
        assert_eq!(result.ventes_total, dec("200"));
    }

    #[test]
    fn labelled_internal_info_lines_are_paid() {
        let mut quote = Quote::new(None);
        quote.onspot_manual = Some(Decimal::ZERO);
        quote.hassle_manual = Some(Decimal::ZERO);
        let mut day = QuoteDay::new(None, None);
        day.lines = vec![priced_line("Internal info", "40", "60")];
        quote.days.push(day);

        let result = reprice(&quote);

        assert_eq!(result.achats_total, dec("40"));
        assert_eq!(result.ventes_total, dec("60"));
    }

    #[test]
    fn zero_margin_falls_back_to_default() {
        let mut quote = Quote::new(None);
        quote.margin_pct = Decimal::ZERO;
        quote.onspot_manual = Some(dec("100"));
        quote.hassle_manual = Some(Decimal::ZERO);

        let result = reprice(&quote);

        assert_eq!(result.margin_pct, DEFAULT_MARGIN_PCT);
        assert_eq!(result.commission_total, dec("16.27"));
        assert_eq!(effective_margin(dec("0.2")), dec("0.2"));
    }

    #[test]
    fn totals_round_half_up_and_sum_to_grand_total() {
        let mut quote = Quote::new(None);
        quote.pax = Some(3);
        quote.onspot_manual = Some(dec("0.005"));
        quote.hassle_manual = Some(dec("1.115"));
        let mut day = QuoteDay::new(None, None);
        day.lines = vec![priced_line("Hotel", "100.10", "150.20")];
        quote.days.push(day);

        let result = reprice(&quote);

        assert_eq!(result.achats_total, dec("100.11"));
        assert_eq!(result.commission_total, dec("16.29"));
        assert_eq!(result.ventes_total, dec("151.32"));
        assert_eq!(
            result.grand_total,
            super::round_money(result.achats_total + result.commission_total + result.ventes_total)
        );
        assert_eq!(result.grand_total, dec("267.72"));
    }

    #[test]
    fn empty_quote_prices_to_floor_onspot_only() {
        let quote = Quote::new(None);
        let result = DeterministicPricingEngine.reprice(&quote);

        assert_eq!(result.onspot_total, dec("27"));
        assert_eq!(result.hassle_total, Decimal::ZERO);
        assert_eq!(result.totals().sell_total, Some(Decimal::ZERO));
        assert!(result.trace.iter().any(|step| step.stage == "grand_total"));
    }
}
