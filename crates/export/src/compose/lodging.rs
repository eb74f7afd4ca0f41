use magalia_core::domain::payload::HotelDetails;
use magalia_core::domain::view::LineView;
use magalia_core::LineDetails;

use super::{category_of, line_title, LineFormatter, ServiceText};

fn details(line: &LineView) -> HotelDetails {
    match line.raw_json.details(&category_of(line)) {
        LineDetails::Hotel(details) => details,
        _ => HotelDetails::default(),
    }
}

fn stars(details: &HotelDetails) -> String {
    details
        .star_count()
        .map(|count| format!(" {}", "★".repeat(usize::from(count))))
        .unwrap_or_default()
}

fn amenities(details: &HotelDetails) -> Vec<&'static str> {
    let mut options = Vec::new();
    if details.early_check_in() {
        options.push("early check-in guaranteed");
    }
    options.push(if details.breakfast() {
        "breakfast & VAT taxes included"
    } else {
        "VAT taxes included"
    });
    options
}

fn hotel_title(room: Option<String>, details: &HotelDetails, hotel_name: &str) -> String {
    let mut parts: Vec<String> = room.into_iter().collect();
    parts.extend(amenities(details).into_iter().map(str::to_string));
    parts.push(format!("at {hotel_name}{}", stars(details)));
    parts.join(", ")
}

fn hotel_name_or_title(line: &LineView, details: &HotelDetails) -> String {
    details.hotel_name.clone().or_else(|| line_title(line)).unwrap_or_else(|| "Hotel".to_string())
}

/// Host and path of a hotel website, the way it is printed under the title.
pub fn display_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_scheme = trimmed
        .split_once("://")
        .filter(|(scheme, _)| {
            scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")
        })
        .map_or(trimmed, |(_, rest)| rest);
    let end = without_scheme.find(['?', '#']).unwrap_or(without_scheme.len());
    without_scheme[..end].trim_end_matches('/').to_string()
}

fn hotel_link(details: &HotelDetails) -> Option<String> {
    let url = details.hotel_url.as_deref()?.trim();
    let lowered = url.to_ascii_lowercase();
    if lowered.starts_with("http://") || lowered.starts_with("https://") {
        Some(url.to_string())
    } else {
        Some(format!("https://{url}"))
    }
}

/// Catalog hotels.
pub struct HotelFormatter;

impl LineFormatter for HotelFormatter {
    fn word(&self, line: &LineView) -> ServiceText {
        let details = details(line);
        let name = details
            .hotel_name
            .clone()
            .or_else(|| line.supplier_name.clone().filter(|name| !name.trim().is_empty()))
            .or_else(|| line_title(line))
            .unwrap_or_else(|| "Hotel".to_string());
        let mut text = ServiceText::titled(hotel_title(details.room_type.clone(), &details, &name));
        text.push_body(details.body());
        text.hotel_url = hotel_link(&details);
        text
    }

    fn excel_name(&self, line: &LineView) -> String {
        hotel_name_or_title(line, &details(line))
    }
}

/// Hotels entered through the newer editor form.
pub struct NewHotelFormatter;

impl LineFormatter for NewHotelFormatter {
    fn word(&self, line: &LineView) -> ServiceText {
        let details = details(line);
        let room = details.room_type.as_deref().map(|room| format!("1 {room}"));
        let name = details.hotel_name.clone().unwrap_or_else(|| "Hotel".to_string());
        let mut text = ServiceText::titled(hotel_title(room, &details, &name));
        text.push_body(details.body());
        text.hotel_url = hotel_link(&details);
        text
    }

    fn excel_name(&self, line: &LineView) -> String {
        hotel_name_or_title(line, &details(line))
    }
}
