//! Turns a quote view into document paragraphs: title, hero block, then one
//! block per day with its client-facing lines.

use magalia_core::domain::view::{DayView, LineView, QuoteView};
use magalia_core::{LineCategory, Visibility};

use super::model::{cm_to_emu, Alignment, Inline, Paragraph, Picture};
use crate::compose::{category_of, display_url, word_text, ServiceText, TitleStyle};
use crate::dates::day_heading;
use crate::html::{self, to_blocks, to_inline};
use crate::images::{EncodedImage, ImageFetcher, ImagePipeline};
use crate::settings::{cm_to_px, COLUMN_HEIGHT_CM, COLUMN_WIDTH_CM, IMAGE_DPI};

pub const TITLE_STYLE: &str = "Title";
pub const DATE_STYLE: &str = "Date";
pub const HYPERLINK_STYLE: &str = "Hyperlink";

const CM_PER_INCH: f64 = 2.54;

/// Lines that stay out of client documents.
pub fn is_printed(line: &LineView) -> bool {
    let internal_tag = line
        .category
        .as_deref()
        .is_some_and(|tag| tag.trim().to_ascii_lowercase().starts_with("internal"));
    if internal_tag || !matches!(line.visibility, Visibility::Client) {
        return false;
    }
    category_of(line) != LineCategory::Cost
}

fn convert(inlines: Vec<html::Inline>, bold: bool, italic: bool) -> Vec<Inline> {
    inlines
        .into_iter()
        .map(|inline| match inline {
            html::Inline::Break => Inline::Break,
            html::Inline::Run(run) => match run.link {
                Some(target) => Inline::Link {
                    text: run.text,
                    target,
                    bold: bold || run.bold,
                    italic: italic || run.italic,
                },
                None => Inline::Text {
                    text: run.text,
                    bold: bold || run.bold,
                    italic: italic || run.italic,
                },
            },
        })
        .collect()
}

fn picture(image: EncodedImage, width_cm: f64, height_cm: f64) -> Paragraph {
    Paragraph::centered_picture(Picture {
        bytes: image.bytes,
        width_emu: cm_to_emu(width_cm),
        height_emu: cm_to_emu(height_cm),
    })
}

pub struct BodyBuilder<'a> {
    images: ImagePipeline<'a>,
    usable_width_cm: f64,
}

impl<'a> BodyBuilder<'a> {
    pub fn new(fetcher: &'a dyn ImageFetcher, usable_width_cm: f64) -> Self {
        Self { images: ImagePipeline::new(fetcher), usable_width_cm }
    }

    pub async fn build(&self, quote: &QuoteView) -> Vec<Paragraph> {
        let mut body = Vec::new();

        let title = quote
            .display_title
            .as_deref()
            .or(quote.title.as_deref())
            .map(str::trim)
            .filter(|title| !title.is_empty());
        if let Some(title) = title {
            let mut paragraph = Paragraph::styled(TITLE_STYLE).with(Inline::plain(title));
            paragraph.alignment = Alignment::Center;
            body.push(paragraph);
        }

        let heroes: Vec<&str> = [quote.hero_photo_1.as_deref(), quote.hero_photo_2.as_deref()]
            .into_iter()
            .flatten()
            .filter(|url| !url.trim().is_empty())
            .collect();
        if let [left, right] = heroes.as_slice() {
            if let Some(image) = self.images.two_up(left, right).await {
                body.push(picture(image, COLUMN_WIDTH_CM * 2.0, COLUMN_HEIGHT_CM));
            }
        }

        for index in 0..quote.days.len() {
            self.day(&quote.days, index, &mut body).await;
        }
        body
    }

    async fn day(&self, days: &[DayView], index: usize, body: &mut Vec<Paragraph>) {
        let day = &days[index];

        // The trip's first day never shows decorative images.
        if index > 0 {
            let decorative: Vec<&str> = day
                .decorative_images
                .iter()
                .map(String::as_str)
                .filter(|url| !url.trim().is_empty())
                .take(2)
                .collect();
            let block = match decorative.as_slice() {
                [left, right] => self
                    .images
                    .two_up(left, right)
                    .await
                    .map(|image| picture(image, COLUMN_WIDTH_CM * 2.0, COLUMN_HEIGHT_CM)),
                [single] => self
                    .images
                    .column(single)
                    .await
                    .map(|image| picture(image, COLUMN_WIDTH_CM, COLUMN_HEIGHT_CM)),
                _ => None,
            };
            body.extend(block);
        }

        if let Some(heading) = day_heading(days, index) {
            body.push(Paragraph::styled(DATE_STYLE).with(Inline::plain(heading)));
        }

        for line in day.lines.iter().filter(|line| is_printed(line)) {
            self.line(line, body).await;
        }
    }

    async fn line(&self, line: &LineView, body: &mut Vec<Paragraph>) {
        let text = word_text(line);
        let transport = category_of(line).is_transport();
        let start = body.len();

        body.push(title_paragraph(&text));
        let header_end = body.len() + usize::from(text.subtitle.is_some());
        if let Some(subtitle) = &text.subtitle {
            body.push(Paragraph::default().with(Inline::plain(subtitle.clone())));
        }

        let italic = text.style == TitleStyle::Italic;
        for snippet in &text.body {
            for block in to_blocks(snippet) {
                let mut paragraph = Paragraph::default();
                if let Some(prefix) = block.prefix {
                    paragraph.inlines.push(Inline::Text { text: prefix, bold: false, italic });
                }
                paragraph.inlines.extend(convert(block.inlines, false, italic));
                body.push(paragraph);
            }
        }

        if let Some(url) = &text.hotel_url {
            body.push(Paragraph::default().with(Inline::Link {
                text: display_url(url),
                target: url.clone(),
                bold: false,
                italic: false,
            }));
        }

        if let Some(url) = line.first_image_url.as_deref().filter(|url| !url.trim().is_empty()) {
            let max_width_px = cm_to_px(self.usable_width_cm, IMAGE_DPI);
            if let Some(image) = self.images.contained(url, max_width_px).await {
                let natural_width_cm =
                    f64::from(image.width_px) / f64::from(IMAGE_DPI) * CM_PER_INCH;
                let width_cm = natural_width_cm.min(self.usable_width_cm);
                let height_cm =
                    width_cm * f64::from(image.height_px) / f64::from(image.width_px.max(1));
                body.push(picture(image, width_cm, height_cm));
            }
        }

        // Transport blocks never split; elsewhere only the heading sticks to
        // what follows and long descriptions may flow onto the next page.
        let end = body.len();
        let sticky_until =
            if transport { end.saturating_sub(1) } else { header_end.min(end.saturating_sub(1)) };
        for paragraph in &mut body[start..sticky_until] {
            paragraph.keep_next = true;
        }
    }
}

fn title_paragraph(text: &ServiceText) -> Paragraph {
    let inlines = to_inline(&text.title);
    let inlines = match text.style {
        TitleStyle::Bold => convert(inlines, true, false),
        TitleStyle::Italic => convert(inlines, false, true),
        TitleStyle::Markup => convert(inlines, false, false),
    };
    Paragraph { inlines, ..Paragraph::default() }
}
