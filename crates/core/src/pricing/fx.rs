use rust_decimal::{Decimal, RoundingStrategy};

use crate::domain::payload::LinePayload;

pub const FX_SCALE: u32 = 6;

pub fn quantize_fx(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(FX_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Which rule produced a line's stored FX rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FxRule {
    /// `buff_pct` is set: the rate is user-owned and only changes when supplied.
    Buffered,
    /// Derived from the line's own EUR and USD purchase prices.
    Derived,
    /// Whatever the caller sent, possibly nothing.
    Supplied,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FxDecision {
    pub rate: Option<Decimal>,
    pub rule: FxRule,
}

/// Decides the FX rate stored for a line being written.
///
/// `previous` is the rate held by the stored line this write replaces, if any.
pub fn reconcile_line_fx(
    raw_json: &LinePayload,
    achat_eur: Option<Decimal>,
    achat_usd: Option<Decimal>,
    incoming: Option<Decimal>,
    previous: Option<Decimal>,
) -> FxDecision {
    if raw_json.has_buff() {
        let rate = incoming.map(quantize_fx).or(previous);
        return FxDecision { rate, rule: FxRule::Buffered };
    }

    if let (Some(eur), Some(usd)) = (achat_eur, achat_usd) {
        if !usd.is_zero() {
            return FxDecision { rate: Some(quantize_fx(eur / usd)), rule: FxRule::Derived };
        }
    }

    FxDecision { rate: incoming.map(quantize_fx), rule: FxRule::Supplied }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{quantize_fx, reconcile_line_fx, FxRule};
    use crate::domain::payload::LinePayload;

    fn dec(value: &str) -> Decimal {
        value.parse().expect("decimal literal")
    }

    #[test]
    fn buffered_line_keeps_previous_rate_when_none_supplied() {
        let raw = LinePayload::new(json!({"buff_pct": 10}));
        let decision =
            reconcile_line_fx(&raw, Some(dec("100")), Some(dec("110")), None, Some(dec("0.93")));

        assert_eq!(decision.rule, FxRule::Buffered);
        assert_eq!(decision.rate, Some(dec("0.93")));
    }

    #[test]
    fn buffered_line_takes_supplied_rate_quantized() {
        let raw = LinePayload::new(json!({"buff_pct": "5"}));
        let decision =
            reconcile_line_fx(&raw, None, None, Some(dec("0.12345678")), Some(dec("0.9")));

        assert_eq!(decision.rate, Some(dec("0.123457")));
    }

    #[test]
    fn rate_is_derived_from_purchase_prices_without_buffer() {
        let raw = LinePayload::new(json!({"buff_pct": null}));
        let decision =
            reconcile_line_fx(&raw, Some(dec("100")), Some(dec("108")), Some(dec("2")), None);

        assert_eq!(decision.rule, FxRule::Derived);
        assert_eq!(decision.rate, Some(dec("0.925926")));
    }

    #[test]
    fn zero_usd_falls_back_to_supplied_or_null() {
        let raw = LinePayload::default();
        let supplied =
            reconcile_line_fx(&raw, Some(dec("100")), Some(Decimal::ZERO), Some(dec("1.1")), None);
        assert_eq!(supplied.rule, FxRule::Supplied);
        assert_eq!(supplied.rate, Some(dec("1.100000")));

        let cleared = reconcile_line_fx(&raw, Some(dec("100")), None, None, Some(dec("0.9")));
        assert_eq!(cleared.rate, None);
    }

    #[test]
    fn quantization_rounds_half_away_from_zero() {
        assert_eq!(quantize_fx(dec("1.0000005")), dec("1.000001"));
        assert_eq!(quantize_fx(dec("1.0000004")), dec("1.000000"));
    }
}
