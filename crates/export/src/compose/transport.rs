use magalia_core::domain::payload::TransportDetails;
use magalia_core::domain::view::LineView;
use magalia_core::LineDetails;

use super::{category_of, line_title, LineFormatter, ServiceText};
use crate::dates::format_time;

const WITH_SEATS: &str = " with seat reservations";
const WITHOUT_SEATS: &str = " without seat reservations (open seating)";
const SCHEDULE_NOTICE: &str = "Schedule subject to change";

fn details(line: &LineView) -> TransportDetails {
    match line.raw_json.details(&category_of(line)) {
        LineDetails::Transport(details) => details,
        _ => TransportDetails::default(),
    }
}

fn endpoints(details: &TransportDetails) -> (&str, &str) {
    (details.from.as_deref().unwrap_or("?"), details.to.as_deref().unwrap_or("?"))
}

/// Shared layout of transport lines: times as a subtitle when known, otherwise
/// the line's own title stands in as the first body paragraph.
fn transport_text(
    line: &LineView,
    details: &TransportDetails,
    title: String,
    departure: &str,
    arrival: &str,
) -> ServiceText {
    let mut text = ServiceText::titled(title);
    if details.has_schedule() {
        text.subtitle = Some(format!(
            "{departure} {}; {arrival} {} – {SCHEDULE_NOTICE}",
            format_time(details.dep_time.as_deref().unwrap_or_default()),
            format_time(details.arr_time.as_deref().unwrap_or_default()),
        ));
    } else {
        text.push_body(line_title(line).as_deref());
    }
    text.push_body(details.body());
    text
}

fn route_name(kind: &str, line: &LineView) -> String {
    let details = details(line);
    let (from, to) = endpoints(&details);
    format!("{kind} {from}->{to}")
}

pub struct FlightFormatter;

impl LineFormatter for FlightFormatter {
    fn word(&self, line: &LineView) -> ServiceText {
        let details = details(line);
        let (from, to) = endpoints(&details);
        let seats = if details.seat_res == Some(true) { WITH_SEATS } else { "" };
        let title = format!(
            "{} flight from {from} to {to}{seats}",
            details.airline.as_deref().unwrap_or("Airline")
        );
        transport_text(line, &details, title, "Departure at", "arrival at")
    }

    fn excel_name(&self, line: &LineView) -> String {
        route_name("Flight", line)
    }
}

pub struct TrainFormatter;

impl LineFormatter for TrainFormatter {
    fn word(&self, line: &LineView) -> ServiceText {
        let details = details(line);
        let (from, to) = endpoints(&details);
        let seats = if details.seat_res == Some(false) { WITHOUT_SEATS } else { WITH_SEATS };
        let title = format!(
            "{} from {from} to {to}{seats}",
            details.class_type.as_deref().unwrap_or("First Class Train")
        );
        transport_text(line, &details, title, "Departure at", "arrival at")
    }

    fn excel_name(&self, line: &LineView) -> String {
        route_name("Train", line)
    }
}

pub struct FerryFormatter;

impl FerryFormatter {
    fn seats(details: &TransportDetails) -> &'static str {
        match details.seat_res_choice.as_deref() {
            Some("with") => WITH_SEATS,
            Some("without") => WITHOUT_SEATS,
            Some("none") => "",
            _ => match details.seat_res {
                Some(true) => WITH_SEATS,
                Some(false) => WITHOUT_SEATS,
                None => "",
            },
        }
    }
}

impl LineFormatter for FerryFormatter {
    fn word(&self, line: &LineView) -> ServiceText {
        let details = details(line);
        let (from, to) = endpoints(&details);
        let class =
            details.class_type.as_deref().map(|class| format!("{class} ")).unwrap_or_default();
        let title = format!("{class}Ferry from {from} to {to}{}", Self::seats(&details));
        transport_text(line, &details, title, "Departure", "Arrival")
    }

    fn excel_name(&self, line: &LineView) -> String {
        route_name("Ferry", line)
    }
}
