//! Per-category wording of a line for client documents.
//!
//! Each category has one [`LineFormatter`]; [`formatter_for`] is the dispatch
//! table. Word output is a [`ServiceText`], Excel output a short service name.

mod lodging;
mod notes;
mod services;
mod transport;

use magalia_core::domain::view::LineView;
use magalia_core::LineCategory;

pub use lodging::{display_url, HotelFormatter, NewHotelFormatter};
pub use notes::{CostFormatter, GenericFormatter, TripInfoFormatter};
pub use services::{
    ActivityFormatter, CarRentalFormatter, NewServiceFormatter, DRIVER_LICENSE_NOTICE,
};
pub use transport::{FerryFormatter, FlightFormatter, TrainFormatter};

pub const EXCEL_NAME_MAX_CHARS: usize = 50;

/// How the title line is styled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TitleStyle {
    /// Whole title bold.
    #[default]
    Bold,
    /// Title and body italic; used for informational lines.
    Italic,
    /// Title keeps its own inline markup and nothing else is added.
    Markup,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceText {
    /// Title text; may carry inline HTML emphasis.
    pub title: String,
    pub style: TitleStyle,
    pub subtitle: Option<String>,
    /// Body paragraphs in order, each plain text or sanitizable HTML.
    pub body: Vec<String>,
    pub hotel_url: Option<String>,
}

impl ServiceText {
    fn titled(title: impl Into<String>) -> Self {
        Self { title: title.into(), ..Self::default() }
    }

    fn push_body(&mut self, text: Option<&str>) {
        if let Some(text) = text.map(str::trim).filter(|text| !text.is_empty()) {
            self.body.push(text.to_string());
        }
    }
}

pub trait LineFormatter: Sync {
    fn word(&self, line: &LineView) -> ServiceText;
    fn excel_name(&self, line: &LineView) -> String;
}

pub fn category_of(line: &LineView) -> LineCategory {
    LineCategory::parse(line.category.as_deref())
}

pub fn formatter_for(category: &LineCategory) -> &'static dyn LineFormatter {
    match category {
        LineCategory::Flight => &FlightFormatter,
        LineCategory::Train => &TrainFormatter,
        LineCategory::Ferry => &FerryFormatter,
        LineCategory::Hotel => &HotelFormatter,
        LineCategory::NewHotel => &NewHotelFormatter,
        LineCategory::Activity => &ActivityFormatter,
        LineCategory::NewService => &NewServiceFormatter,
        LineCategory::CarRental => &CarRentalFormatter,
        LineCategory::TripInfo => &TripInfoFormatter,
        LineCategory::Cost => &CostFormatter,
        LineCategory::PrivateTransfer
        | LineCategory::Internal
        | LineCategory::Other(_)
        | LineCategory::Uncategorized => &GenericFormatter,
    }
}

pub fn word_text(line: &LineView) -> ServiceText {
    formatter_for(&category_of(line)).word(line)
}

/// Service name for the spreadsheet, cut to fit the column.
pub fn excel_name(line: &LineView) -> String {
    truncate_name(&formatter_for(&category_of(line)).excel_name(line))
}

pub fn truncate_name(name: &str) -> String {
    if name.chars().count() <= EXCEL_NAME_MAX_CHARS {
        return name.to_string();
    }
    let mut cut: String = name.chars().take(EXCEL_NAME_MAX_CHARS - 1).collect();
    cut.push('…');
    cut
}

fn line_title(line: &LineView) -> Option<String> {
    line.title.as_deref().map(str::trim).filter(|title| !title.is_empty()).map(str::to_string)
}

#[cfg(test)]
pub(crate) mod tests {
    use magalia_core::domain::view::LineView;
    use magalia_core::{LinePayload, QuoteLine};
    use serde_json::Value;

    use super::{excel_name, truncate_name};

    pub(crate) fn line(category: &str, title: &str, raw: Value) -> LineView {
        let mut line = QuoteLine::new(category, title);
        line.raw_json = LinePayload::new(raw);
        LineView::from(&line)
    }

    #[test]
    fn long_names_are_cut_with_ellipsis() {
        let long = "x".repeat(60);
        let cut = truncate_name(&long);
        assert_eq!(cut.chars().count(), 50);
        assert!(cut.ends_with('…'));
        assert_eq!(truncate_name("short"), "short");
        assert_eq!(truncate_name(&"y".repeat(50)), "y".repeat(50));
    }

    #[test]
    fn excel_names_follow_category() {
        use serde_json::json;

        let flight = line("Flight", "", json!({"from": "CDG", "to": "JFK"}));
        assert_eq!(excel_name(&flight), "Flight CDG->JFK");
        assert_eq!(excel_name(&line("Train", "", json!({"from": "Paris"}))), "Train Paris->?");
        assert_eq!(excel_name(&line("Hotel", "Fallback", json!({"hotel_name": "Ritz"}))), "Ritz");
        assert_eq!(excel_name(&line("New Hotel", "", json!({}))), "Hotel");
        let activity = line("Activity", "Line title", json!({"title": "Data title"}));
        assert_eq!(excel_name(&activity), "Data title");
        assert_eq!(excel_name(&line("New Service", "", json!({}))), "Service");
        assert_eq!(excel_name(&line("Car Rental", "Whatever", json!({}))), "Car Rental");
        assert_eq!(excel_name(&line("Cost", "", json!({}))), "Cost");
        assert_eq!(excel_name(&line("Private Transfer", "", json!({}))), "—");
        assert_eq!(excel_name(&line("Boat", "Sunset cruise", json!({}))), "Sunset cruise");
    }
}
