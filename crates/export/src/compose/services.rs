use magalia_core::domain::payload::{ActivityDetails, CarRentalDetails};
use magalia_core::domain::view::LineView;
use magalia_core::LineDetails;
use rust_decimal::{Decimal, RoundingStrategy};

use super::{category_of, line_title, LineFormatter, ServiceText, TitleStyle};
use crate::dates::{format_time, human_duration, pretty_duration, span_between, Span};

pub const DRIVER_LICENSE_NOTICE: &str = "An international driver's license is mandatory to pick up the car. A physical hard copy is required, as digital copies are not accepted locally. Please note that it may take up to 15 days to obtain the license.";
const UNSPECIFIED_TRANSMISSION: &str = "Do not precise";

fn activity(line: &LineView) -> ActivityDetails {
    match line.raw_json.details(&category_of(line)) {
        LineDetails::Activity(details) => details,
        _ => ActivityDetails::default(),
    }
}

fn with_start(title: String, details: &ActivityDetails) -> String {
    match details.start_time.as_deref().map(format_time).filter(|time| !time.is_empty()) {
        Some(time) => format!("{title} at {time}"),
        None => title,
    }
}

fn service_name(line: &LineView, details: &ActivityDetails) -> String {
    details.title.clone().or_else(|| line_title(line)).unwrap_or_else(|| "Service".to_string())
}

pub struct ActivityFormatter;

impl LineFormatter for ActivityFormatter {
    fn word(&self, line: &LineView) -> ServiceText {
        let details = activity(line);
        let title = line_title(line)
            .or_else(|| details.title.clone())
            .unwrap_or_else(|| "Activity".to_string());
        let mut text = ServiceText::titled(with_start(title, &details));
        text.push_body(details.body());
        text
    }

    fn excel_name(&self, line: &LineView) -> String {
        service_name(line, &activity(line))
    }
}

pub struct NewServiceFormatter;

impl NewServiceFormatter {
    fn duration_line(details: &ActivityDetails) -> Option<String> {
        let span = match (details.start_time.as_deref(), details.end_time.as_deref()) {
            (Some(start), Some(end)) => span_between(start, end),
            _ => None,
        };
        match span {
            Some(Span::Minutes(minutes)) if minutes > 0 => {
                Some(format!("Duration: {}", human_duration(minutes)))
            }
            Some(Span::EndBeforeStart) => None,
            _ => {
                details.duration.as_deref().map(|raw| format!("Duration: {}", pretty_duration(raw)))
            }
        }
    }
}

impl LineFormatter for NewServiceFormatter {
    fn word(&self, line: &LineView) -> ServiceText {
        let details = activity(line);
        let title = details.title.clone().unwrap_or_else(|| "Service".to_string());
        let mut text = ServiceText::titled(with_start(title, &details));
        text.push_body(Self::duration_line(&details).as_deref());
        text.push_body(details.body());
        text
    }

    fn excel_name(&self, line: &LineView) -> String {
        service_name(line, &activity(line))
    }
}

fn collapse_spaces(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub struct CarRentalFormatter;

impl CarRentalFormatter {
    fn title(details: &CarRentalDetails) -> String {
        let location = details.pickup_loc.as_deref().unwrap_or("?");
        let airport = details
            .pickup_airport
            .as_deref()
            .map(|airport| format!(" {airport}"))
            .unwrap_or_default();
        let transmission = details
            .transmission
            .as_deref()
            .filter(|value| *value != UNSPECIFIED_TRANSMISSION)
            .map(|value| format!("{}, ", value.to_lowercase()))
            .unwrap_or_default();
        collapse_spaces(&format!(
            "Pick up car in {location}{airport}, {} {transmission}{} {}",
            details.vehicle_type.as_deref().unwrap_or_default(),
            details.mileage.as_deref().unwrap_or_default(),
            details.insurance.as_deref().unwrap_or_default(),
        ))
    }

    fn fee_line(details: &CarRentalDetails) -> Option<String> {
        let fee = details.one_way_fee.filter(|fee| *fee > Decimal::ZERO)?;
        let whole = fee.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        Some(format!("Estimate One Way Fee: ${whole} – to be paid locally"))
    }
}

impl LineFormatter for CarRentalFormatter {
    fn word(&self, line: &LineView) -> ServiceText {
        let details = match line.raw_json.details(&category_of(line)) {
            LineDetails::CarRental(details) => details,
            _ => CarRentalDetails::default(),
        };
        let mut text = ServiceText::titled(Self::title(&details));
        text.style = TitleStyle::Markup;
        text.push_body(Self::fee_line(&details).as_deref());
        text.push_body(details.description.as_deref());
        if details.intl_driver_license == Some(true) {
            text.push_body(Some(DRIVER_LICENSE_NOTICE));
        }
        text
    }

    fn excel_name(&self, _line: &LineView) -> String {
        "Car Rental".to_string()
    }
}
