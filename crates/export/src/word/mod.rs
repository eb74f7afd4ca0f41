mod builder;
mod docx;
mod model;

use magalia_core::domain::view::QuoteView;
use tracing::info;

pub use builder::{is_printed, BodyBuilder, DATE_STYLE, HYPERLINK_STYLE, TITLE_STYLE};
pub use docx::{terms_heading_offset, PageLayout, WordTemplate, TERMS_HEADING};
pub use model::{Alignment, Inline, Paragraph, Picture};

use crate::error::ExportError;
use crate::images::ImageFetcher;
use crate::settings::ExportSettings;

pub const WORD_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Renders the client itinerary document.
pub struct WordExporter {
    settings: ExportSettings,
}

impl WordExporter {
    pub fn new(settings: ExportSettings) -> Self {
        Self { settings }
    }

    /// `quote` must already carry its totals and `first_image_url` values.
    pub async fn render(
        &self,
        quote: &QuoteView,
        fetcher: &dyn ImageFetcher,
    ) -> Result<Vec<u8>, ExportError> {
        let template = WordTemplate::load(&self.settings.word_template_path).await?;
        let layout = template.page_layout();
        let body = BodyBuilder::new(fetcher, layout.usable_width_cm()).build(quote).await;
        let bytes = template.render(&body)?;

        info!(
            event_name = "export.word.rendered",
            quote_id = %quote.id,
            paragraphs = body.len(),
            bytes = bytes.len(),
            "word document rendered"
        );
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use magalia_core::domain::view::QuoteView;
    use magalia_core::{Quote, QuoteDay, QuoteLine};

    use super::docx::tests::{read_part, template_with_terms};
    use super::WordExporter;
    use crate::images::MemoryImageFetcher;
    use crate::settings::ExportSettings;

    fn settings(path: std::path::PathBuf) -> ExportSettings {
        ExportSettings { word_template_path: path, ..ExportSettings::default() }
    }

    #[tokio::test]
    async fn renders_days_into_template_before_terms() {
        let directory = tempfile::tempdir().expect("tempdir");
        let path = directory.path().join("template.docx");
        std::fs::write(&path, template_with_terms()).expect("write template");

        let mut quote = Quote::new(Some("Lisbon escape"));
        let mut day = QuoteDay::new(NaiveDate::from_ymd_opt(2024, 3, 22), Some("Lisbon"));
        day.lines.push(QuoteLine::new("Activity", "Tram 28 ride"));
        quote.days.push(day);

        let bytes = WordExporter::new(settings(path))
            .render(&QuoteView::from(&quote), &MemoryImageFetcher::new())
            .await
            .expect("render");

        let document = read_part(&bytes, "word/document.xml").expect("document");
        let heading = document.find("ESSENTIAL TRAVEL").expect("terms heading");
        let expected =
            ["Lisbon escape", "Friday, March 22nd 2024 : Lisbon for 1 night", "Tram 28 ride"];
        for text in expected {
            assert!(document.find(text).expect(text) < heading);
        }
    }

    #[tokio::test]
    async fn missing_template_still_produces_a_document() {
        let directory = tempfile::tempdir().expect("tempdir");
        let exporter = WordExporter::new(settings(directory.path().join("nope.docx")));

        let bytes = exporter
            .render(&QuoteView::from(&Quote::new(Some("Bare"))), &MemoryImageFetcher::new())
            .await
            .expect("render");

        let document = read_part(&bytes, "word/document.xml").expect("document");
        assert!(document.contains("Bare"));
    }
}
