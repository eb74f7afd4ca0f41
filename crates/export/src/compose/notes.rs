use magalia_core::domain::payload::{GenericDetails, NoteDetails};
use magalia_core::domain::view::LineView;
use magalia_core::LineDetails;

use super::{category_of, line_title, LineFormatter, ServiceText, TitleStyle};

fn note(line: &LineView) -> NoteDetails {
    match line.raw_json.details(&category_of(line)) {
        LineDetails::Note(details) => details,
        _ => NoteDetails::default(),
    }
}

pub struct TripInfoFormatter;

impl LineFormatter for TripInfoFormatter {
    fn word(&self, line: &LineView) -> ServiceText {
        let details = note(line);
        let title = details
            .title
            .clone()
            .or_else(|| line_title(line))
            .unwrap_or_else(|| "Trip info".to_string());
        let mut text = ServiceText::titled(title);
        text.style = TitleStyle::Italic;
        text.push_body(details.text());
        text
    }

    fn excel_name(&self, line: &LineView) -> String {
        line_title(line).unwrap_or_else(|| "Trip info".to_string())
    }
}

/// Staff-only cost lines. Never printed in Word; named in the spreadsheet.
pub struct CostFormatter;

impl LineFormatter for CostFormatter {
    fn word(&self, line: &LineView) -> ServiceText {
        let details = note(line);
        let mut text = ServiceText::titled(self.excel_name(line));
        text.push_body(details.text());
        text
    }

    fn excel_name(&self, line: &LineView) -> String {
        note(line).title.or_else(|| line_title(line)).unwrap_or_else(|| "Cost".to_string())
    }
}

/// Private transfers, internal notes and categories without dedicated wording.
pub struct GenericFormatter;

impl LineFormatter for GenericFormatter {
    fn word(&self, line: &LineView) -> ServiceText {
        let category = category_of(line);
        let (title, body) = match line.raw_json.details(&category) {
            LineDetails::Generic(details) => (details.title.clone(), generic_body(&details)),
            LineDetails::Note(details) => {
                (details.title.clone(), details.text().map(str::to_string))
            }
            _ => (None, None),
        };
        let title = line_title(line)
            .or(title)
            .unwrap_or_else(|| category.as_tag().to_string());
        let mut text = ServiceText::titled(title);
        text.push_body(body.as_deref());
        text
    }

    fn excel_name(&self, line: &LineView) -> String {
        line_title(line).unwrap_or_else(|| "—".to_string())
    }
}

fn generic_body(details: &GenericDetails) -> Option<String> {
    details.body().map(str::to_string)
}
