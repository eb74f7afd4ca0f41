//! Minimal WordprocessingML writer.
//!
//! The template package is copied part for part; generated paragraphs are
//! spliced into `word/document.xml` right before the terms-and-conditions
//! heading, or at the end of the body when the template has none.

use std::collections::HashSet;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::builder::{DATE_STYLE, HYPERLINK_STYLE, TITLE_STYLE};
use super::model::{Alignment, Inline, Paragraph, Picture};
use crate::error::ExportError;

pub const TERMS_HEADING: &str = "essential travel terms and conditions";

const DOCUMENT_PART: &str = "word/document.xml";
const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";
const STYLES_PART: &str = "word/styles.xml";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

const IMAGE_REL_TYPE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
const HYPERLINK_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
const R_NAMESPACE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const WP_NAMESPACE: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";

const TWIPS_PER_CM: f64 = 1440.0 / 2.54;
const DEFAULT_PAGE_WIDTH_CM: f64 = 21.0;
const DEFAULT_MARGIN_CM: f64 = 2.0;
const DRAWING_ID_BASE: usize = 9000;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageLayout {
    pub page_width_cm: f64,
    pub left_margin_cm: f64,
    pub right_margin_cm: f64,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            page_width_cm: DEFAULT_PAGE_WIDTH_CM,
            left_margin_cm: DEFAULT_MARGIN_CM,
            right_margin_cm: DEFAULT_MARGIN_CM,
        }
    }
}

impl PageLayout {
    pub fn usable_width_cm(&self) -> f64 {
        (self.page_width_cm - self.left_margin_cm - self.right_margin_cm).max(0.0)
    }
}

/// A `.docx` package held in memory.
#[derive(Clone, Debug)]
pub struct WordTemplate {
    parts: Vec<(String, Vec<u8>)>,
}

impl WordTemplate {
    /// Reads the template at `path`. A missing file yields the built-in package.
    pub async fn load(path: &Path) -> Result<Self, ExportError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Self::from_bytes(&bytes),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    event_name = "export.word.template_missing",
                    path = %path.display(),
                    "word template not found; using built-in layout"
                );
                Ok(Self::builtin())
            }
            Err(error) => Err(error.into()),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ExportError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut parts = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            if entry.is_dir() {
                continue;
            }
            let mut content = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut content)?;
            parts.push((entry.name().to_string(), content));
        }

        let template = Self { parts };
        if template.part(DOCUMENT_PART).is_none() {
            return Err(ExportError::Template(format!("package has no {DOCUMENT_PART}")));
        }
        Ok(template)
    }

    pub fn builtin() -> Self {
        let parts = [
            (CONTENT_TYPES_PART, BUILTIN_CONTENT_TYPES),
            ("_rels/.rels", BUILTIN_PACKAGE_RELS),
            (DOCUMENT_PART, BUILTIN_DOCUMENT),
            (DOCUMENT_RELS_PART, BUILTIN_DOCUMENT_RELS),
            (STYLES_PART, BUILTIN_STYLES),
        ];
        Self {
            parts: parts
                .into_iter()
                .map(|(name, content)| (name.to_string(), content.as_bytes().to_vec()))
                .collect(),
        }
    }

    fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts.iter().find(|(part, _)| part == name).map(|(_, content)| content.as_slice())
    }

    fn text_part(&self, name: &str) -> Result<String, ExportError> {
        let bytes = self
            .part(name)
            .ok_or_else(|| ExportError::Template(format!("package has no {name}")))?;
        String::from_utf8(bytes.to_vec())
            .map_err(|error| ExportError::Template(format!("{name} is not utf-8: {error}")))
    }

    /// Page width and side margins of the body section; A4 with 2 cm margins
    /// when the template does not say.
    pub fn page_layout(&self) -> PageLayout {
        let Ok(document) = self.text_part(DOCUMENT_PART) else {
            return PageLayout::default();
        };
        let mut layout = PageLayout::default();
        if let Some(width) = last_twips(&document, "pgSz", "w") {
            layout.page_width_cm = width;
        }
        if let Some(left) = last_twips(&document, "pgMar", "left") {
            layout.left_margin_cm = left;
        }
        if let Some(right) = last_twips(&document, "pgMar", "right") {
            layout.right_margin_cm = right;
        }
        layout
    }

    fn style_ids(&self) -> HashSet<String> {
        let Ok(styles) = self.text_part(STYLES_PART) else {
            return HashSet::new();
        };
        pattern(r#"w:styleId="([^"]+)""#)
            .map(|pattern| {
                pattern.captures_iter(&styles).map(|capture| capture[1].to_string()).collect()
            })
            .unwrap_or_default()
    }

    /// Produces the finished package with `body` spliced in.
    pub fn render(&self, body: &[Paragraph]) -> Result<Vec<u8>, ExportError> {
        let mut relationships = Relationships::parse(&self.text_part(DOCUMENT_RELS_PART)?);
        let mut writer = BodyWriter {
            styles: self.style_ids(),
            relationships: &mut relationships,
            media: Vec::new(),
        };
        let generated = writer.paragraphs(body);
        let media = std::mem::take(&mut writer.media);

        let document = splice(&ensure_namespaces(&self.text_part(DOCUMENT_PART)?), &generated);
        let rels = relationships.render();
        let content_types = ensure_jpeg_type(&self.text_part(CONTENT_TYPES_PART)?);

        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in &self.parts {
            let replaced: Option<&[u8]> = match name.as_str() {
                DOCUMENT_PART => Some(document.as_bytes()),
                DOCUMENT_RELS_PART => Some(rels.as_bytes()),
                CONTENT_TYPES_PART => Some(content_types.as_bytes()),
                _ => None,
            };
            zip.start_file(name.as_str(), options)?;
            zip.write_all(replaced.unwrap_or(content))?;
        }
        for (name, bytes) in &media {
            zip.start_file(format!("word/{name}"), options)?;
            zip.write_all(bytes)?;
        }
        Ok(zip.finish()?.into_inner())
    }
}

fn pattern(source: &str) -> Option<Regex> {
    Regex::new(source).ok()
}

fn last_twips(document: &str, element: &str, attribute: &str) -> Option<f64> {
    let element_pattern = pattern(&format!(r"<w:{element}\b[^>]*>"))?;
    let attribute_pattern = pattern(&format!(r#"\bw:{attribute}="(\d+)""#))?;
    let tag = element_pattern.find_iter(document).last()?;
    let value: f64 = attribute_pattern.captures(tag.as_str())?[1].parse().ok()?;
    Some(value / TWIPS_PER_CM)
}

fn block_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>|<(/?)w:(p|tbl)(?:\s[^>]*?)?(/?)>").ok()
        })
        .as_ref()
}

fn unescape_xml(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let decoded = tail.find(';').and_then(|end| {
            let ch = match &tail[1..end] {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                reference => reference
                    .strip_prefix("#x")
                    .map(|hex| u32::from_str_radix(hex, 16).ok())
                    .unwrap_or_else(|| reference.strip_prefix('#').and_then(|n| n.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|ch| (ch, end))
        });
        match decoded {
            Some((ch, end)) => {
                out.push(ch);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// A paragraph that is a direct child of `w:body`, with the text of its own
/// runs. Paragraphs nested in tables or text boxes are not listed.
#[derive(Debug)]
struct BodyParagraph {
    start: usize,
    text: String,
}

fn body_paragraphs(document: &str) -> Vec<BodyParagraph> {
    let Some(pattern) = block_pattern() else {
        return Vec::new();
    };
    let body_start = document.find("<w:body").unwrap_or(0);

    let mut paragraphs = Vec::new();
    let mut current: Option<BodyParagraph> = None;
    let mut depth = 0usize;
    for capture in pattern.captures_iter(&document[body_start..]) {
        if let Some(text) = capture.get(1) {
            if let (1, Some(paragraph)) = (depth, current.as_mut()) {
                paragraph.text.push_str(&unescape_xml(text.as_str()));
            }
            continue;
        }
        let Some(whole) = capture.get(0) else {
            continue;
        };
        let flag = |group: usize| capture.get(group).is_some_and(|m| !m.as_str().is_empty());
        let paragraph = capture.get(3).is_some_and(|m| m.as_str() == "p");

        if flag(2) {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                paragraphs.extend(current.take());
            }
            continue;
        }
        if depth == 0 && paragraph {
            let opened = BodyParagraph { start: body_start + whole.start(), text: String::new() };
            if flag(4) {
                paragraphs.push(opened);
            } else {
                current = Some(opened);
            }
        }
        if !flag(4) {
            depth += 1;
        }
    }
    paragraphs
}

/// Byte offset of the terms-and-conditions heading paragraph.
pub fn terms_heading_offset(document: &str) -> Option<usize> {
    body_paragraphs(document)
        .into_iter()
        .find(|paragraph| paragraph.text.trim().to_lowercase() == TERMS_HEADING)
        .map(|paragraph| paragraph.start)
}

fn body_end_offset(document: &str) -> usize {
    let Some(body_end) = document.rfind("</w:body>") else {
        return document.len();
    };
    let last_block = [document[..body_end].rfind("</w:p>"), document[..body_end].rfind("</w:tbl>")]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(0);
    match document[last_block..body_end].find("<w:sectPr") {
        Some(offset) => last_block + offset,
        None => body_end,
    }
}

fn splice(document: &str, generated: &str) -> String {
    let offset = terms_heading_offset(document).unwrap_or_else(|| body_end_offset(document));
    let mut out = String::with_capacity(document.len() + generated.len());
    out.push_str(&document[..offset]);
    out.push_str(generated);
    out.push_str(&document[offset..]);
    out
}

fn ensure_namespaces(document: &str) -> String {
    let Some(start) = document.find("<w:document") else {
        return document.to_string();
    };
    let Some(end) = document[start..].find('>').map(|end| start + end) else {
        return document.to_string();
    };
    let root = &document[start..end];
    let mut missing = String::new();
    if !root.contains("xmlns:r=") {
        missing.push_str(&format!(r#" xmlns:r="{R_NAMESPACE}""#));
    }
    if !root.contains("xmlns:wp=") {
        missing.push_str(&format!(r#" xmlns:wp="{WP_NAMESPACE}""#));
    }
    if missing.is_empty() {
        return document.to_string();
    }
    let insert_at = if document[..end].ends_with('/') { end - 1 } else { end };
    format!("{}{missing}{}", &document[..insert_at], &document[insert_at..])
}

fn ensure_jpeg_type(content_types: &str) -> String {
    let lowered = content_types.to_ascii_lowercase();
    if lowered.contains(r#"extension="jpeg""#) {
        return content_types.to_string();
    }
    match content_types.rfind("</Types>") {
        Some(offset) => format!(
            r#"{}<Default Extension="jpeg" ContentType="image/jpeg"/>{}"#,
            &content_types[..offset],
            &content_types[offset..]
        ),
        None => content_types.to_string(),
    }
}

pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

struct Relationships {
    xml: String,
    next_id: u32,
    added: Vec<String>,
}

impl Relationships {
    fn parse(xml: &str) -> Self {
        let highest = pattern(r#"Id="rId(\d+)""#)
            .map(|pattern| {
                pattern
                    .captures_iter(xml)
                    .filter_map(|capture| capture[1].parse::<u32>().ok())
                    .max()
                    .unwrap_or(0)
            })
            .unwrap_or(0);
        Self { xml: xml.to_string(), next_id: highest + 1, added: Vec::new() }
    }

    fn add(&mut self, kind: &str, target: &str, external: bool) -> String {
        let id = format!("rId{}", self.next_id);
        self.next_id += 1;
        let mode = if external { r#" TargetMode="External""# } else { "" };
        self.added.push(format!(
            r#"<Relationship Id="{id}" Type="{kind}" Target="{}"{mode}/>"#,
            escape_xml(target)
        ));
        id
    }

    fn render(&self) -> String {
        let added = self.added.concat();
        match self.xml.rfind("</Relationships>") {
            Some(offset) => format!("{}{added}{}", &self.xml[..offset], &self.xml[offset..]),
            None => self.xml.clone(),
        }
    }
}

struct BodyWriter<'r> {
    styles: HashSet<String>,
    relationships: &'r mut Relationships,
    media: Vec<(String, Vec<u8>)>,
}

impl BodyWriter<'_> {
    fn paragraphs(&mut self, body: &[Paragraph]) -> String {
        body.iter().map(|paragraph| self.paragraph(paragraph)).collect()
    }

    fn paragraph(&mut self, paragraph: &Paragraph) -> String {
        let mut properties = String::new();
        if let Some(style) = paragraph.style.filter(|style| self.styles.contains(*style)) {
            properties.push_str(&format!(r#"<w:pStyle w:val="{style}"/>"#));
        }
        if paragraph.keep_next {
            properties.push_str("<w:keepNext/>");
        }
        if paragraph.alignment == Alignment::Center {
            properties.push_str(r#"<w:jc w:val="center"/>"#);
        }

        let mut xml = String::from("<w:p>");
        if !properties.is_empty() {
            xml.push_str(&format!("<w:pPr>{properties}</w:pPr>"));
        }
        for inline in &paragraph.inlines {
            xml.push_str(&self.inline(inline));
        }
        xml.push_str("</w:p>");
        xml
    }

    fn inline(&mut self, inline: &Inline) -> String {
        match inline {
            Inline::Text { text, bold, italic } => text_run(text, *bold, *italic, ""),
            Inline::Break => "<w:r><w:br/></w:r>".to_string(),
            Inline::Link { text, target, bold, italic } => {
                let id = self.relationships.add(HYPERLINK_REL_TYPE, target, true);
                let style = if self.styles.contains(HYPERLINK_STYLE) {
                    format!(r#"<w:rStyle w:val="{HYPERLINK_STYLE}"/>"#)
                } else {
                    r#"<w:color w:val="0563C1"/><w:u w:val="single"/>"#.to_string()
                };
                format!(
                    r#"<w:hyperlink r:id="{id}">{}</w:hyperlink>"#,
                    text_run(text, *bold, *italic, &style)
                )
            }
            Inline::Picture(picture) => self.picture(picture),
        }
    }

    fn picture(&mut self, picture: &Picture) -> String {
        let number = self.media.len() + 1;
        let name = format!("media/magalia_image{number}.jpeg");
        let id = self.relationships.add(IMAGE_REL_TYPE, &name, false);
        self.media.push((name, picture.bytes.clone()));

        let drawing_id = DRAWING_ID_BASE + number;
        let (cx, cy) = (picture.width_emu, picture.height_emu);
        format!(
            concat!(
                r#"<w:r><w:drawing><wp:inline distT="0" distB="0" distL="0" distR="0">"#,
                r#"<wp:extent cx="{cx}" cy="{cy}"/><wp:docPr id="{drawing_id}" name="Picture {drawing_id}"/>"#,
                r#"<a:graphic xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">"#,
                r#"<a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
                r#"<pic:pic xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
                r#"<pic:nvPicPr><pic:cNvPr id="{drawing_id}" name="magalia_image{number}.jpeg"/><pic:cNvPicPr/></pic:nvPicPr>"#,
                r#"<pic:blipFill><a:blip r:embed="{id}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
                r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
                r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr>"#,
                r#"</pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r>"#
            ),
            cx = cx,
            cy = cy,
            drawing_id = drawing_id,
            number = number,
            id = id,
        )
    }
}

fn text_run(text: &str, bold: bool, italic: bool, extra_properties: &str) -> String {
    let mut properties = extra_properties.to_string();
    if bold {
        properties.push_str("<w:b/>");
    }
    if italic {
        properties.push_str("<w:i/>");
    }
    let properties =
        if properties.is_empty() { String::new() } else { format!("<w:rPr>{properties}</w:rPr>") };
    format!(r#"<w:r>{properties}<w:t xml:space="preserve">{}</w:t></w:r>"#, escape_xml(text))
}

const BUILTIN_CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="jpeg" ContentType="image/jpeg"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/></Types>"#;

const BUILTIN_PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const BUILTIN_DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

const BUILTIN_DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing"><w:body><w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1134" w:right="1134" w:bottom="1134" w:left="1134" w:header="709" w:footer="709" w:gutter="0"/></w:sectPr></w:body></w:document>"#;

const BUILTIN_STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:pPr><w:spacing w:after="120"/></w:pPr><w:rPr><w:sz w:val="21"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Title"><w:name w:val="Title"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:pPr><w:spacing w:after="240"/></w:pPr><w:rPr><w:b/><w:sz w:val="40"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Date"><w:name w:val="Date"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:pPr><w:keepNext/><w:spacing w:before="240"/></w:pPr><w:rPr><w:b/><w:color w:val="1F3864"/><w:sz w:val="24"/></w:rPr></w:style><w:style w:type="character" w:styleId="Hyperlink"><w:name w:val="Hyperlink"/><w:rPr><w:color w:val="0563C1"/><w:u w:val="single"/></w:rPr></w:style></w:styles>"#;

/// Names of the styles the generated body refers to.
pub const REQUIRED_STYLES: [&str; 3] = [TITLE_STYLE, DATE_STYLE, HYPERLINK_STYLE];

#[cfg(test)]
pub(crate) mod tests {
    use std::io::{Cursor, Read, Write};

    use zip::write::SimpleFileOptions;
    use zip::{ZipArchive, ZipWriter};

    use super::{terms_heading_offset, unescape_xml, WordTemplate, REQUIRED_STYLES};
    use crate::word::model::{Inline, Paragraph, Picture};

    pub(crate) fn read_bytes(package: &[u8], name: &str) -> Option<Vec<u8>> {
        let mut archive = ZipArchive::new(Cursor::new(package)).ok()?;
        let mut entry = archive.by_name(name).ok()?;
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).ok()?;
        Some(bytes)
    }

    pub(crate) fn read_part(package: &[u8], name: &str) -> Option<String> {
        String::from_utf8(read_bytes(package, name)?).ok()
    }

    pub(crate) fn template_with_terms() -> Vec<u8> {
        let document = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>Welcome</w:t></w:r></w:p><w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t xml:space="preserve">ESSENTIAL TRAVEL </w:t></w:r><w:r><w:t>Terms and Conditions</w:t></w:r></w:p><w:p><w:r><w:t>Clause 1</w:t></w:r></w:p><w:sectPr><w:pgSz w:w="12240" w:h="15840"/><w:pgMar w:left="1440" w:right="1440"/></w:sectPr></w:body></w:document>"#;
        let rels = r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId7" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;
        let types = r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/></Types>"#;
        let styles = r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:style w:styleId="Title"/></w:styles>"#;

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in [
            ("[Content_Types].xml", types),
            ("word/document.xml", document),
            ("word/_rels/document.xml.rels", rels),
            ("word/styles.xml", styles),
        ] {
            zip.start_file(name, SimpleFileOptions::default()).expect("start part");
            zip.write_all(content.as_bytes()).expect("write part");
        }
        zip.finish().expect("finish zip").into_inner()
    }

    #[test]
    fn terms_heading_matches_across_runs_ignoring_case() {
        let document = r#"<w:body><w:p><w:r><w:t>Intro</w:t></w:r></w:p><w:p><w:r><w:t> Essential Travel Terms </w:t></w:r><w:r><w:t>and Conditions </w:t></w:r></w:p></w:body>"#;
        let offset = terms_heading_offset(document).expect("heading found");
        assert!(document[offset..].starts_with("<w:p><w:r><w:t> Essential"));

        let longer = "<w:p><w:r><w:t>Essential Travel Terms and Conditions apply</w:t></w:r></w:p>";
        assert_eq!(terms_heading_offset(longer), None);
    }

    #[test]
    fn terms_heading_is_found_among_top_level_paragraphs_only() {
        let document = concat!(
            "<w:body>",
            "<w:p><w:r><w:pict><w:txbxContent>",
            "<w:p><w:r><w:t>Boxed note</w:t></w:r></w:p>",
            "</w:txbxContent></w:pict></w:r><w:r><w:t>Cover</w:t></w:r></w:p>",
            "<w:tbl><w:tr><w:tc><w:p><w:r>",
            "<w:t>Essential travel terms &amp; conditions</w:t>",
            "</w:r></w:p></w:tc></w:tr></w:tbl>",
            "<w:p/>",
            r#"<w:p w:rsidR="00AB"><w:r>"#,
            "<w:t>Essential travel terms and conditions</w:t></w:r></w:p>",
            "</w:body>",
        );

        let offset = terms_heading_offset(document).expect("top-level heading");
        assert!(document[offset..].starts_with(r#"<w:p w:rsidR="00AB">"#));

        let only_in_table = concat!(
            "<w:body><w:tbl><w:tr><w:tc><w:p><w:r>",
            "<w:t>Essential travel terms and conditions</w:t>",
            "</w:r></w:p></w:tc></w:tr></w:tbl></w:body>",
        );
        assert_eq!(terms_heading_offset(only_in_table), None);
    }

    #[test]
    fn generated_content_lands_before_terms_heading() {
        let template = WordTemplate::from_bytes(&template_with_terms()).expect("template");
        let body = vec![
            Paragraph::styled("Title").with(Inline::plain("Trip & Co")),
            Paragraph::styled("Date").with(Inline::plain("Monday")),
            Paragraph::default().with(Inline::Link {
                text: "hotel.com".to_string(),
                target: "https://hotel.com/?a=1&b=2".to_string(),
                bold: false,
                italic: false,
            }),
            Paragraph::centered_picture(Picture {
                bytes: vec![0xFF, 0xD8, 0xFF],
                width_emu: 100,
                height_emu: 50,
            }),
        ];

        let package = template.render(&body).expect("render");

        let document = read_part(&package, "word/document.xml").expect("document part");
        let generated = document.find("Trip &amp; Co").expect("title present");
        let heading = document.find("ESSENTIAL TRAVEL").expect("heading kept");
        assert!(document.find("Welcome").expect("intro kept") < generated);
        assert!(generated < heading);
        assert!(document.contains(r#"<w:pStyle w:val="Title"/>"#));
        assert!(!document.contains(r#"<w:pStyle w:val="Date"/>"#));
        assert!(document.contains(r#"<w:color w:val="0563C1"/><w:u w:val="single"/>"#));
        assert!(document.contains(r#"xmlns:wp="#));

        let rels = read_part(&package, "word/_rels/document.xml.rels").expect("rels part");
        assert!(rels.contains(r#"Id="rId8""#) && rels.contains(r#"TargetMode="External""#));
        assert!(rels.contains(r#"Id="rId9" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/magalia_image1.jpeg""#));
        let types = read_part(&package, "[Content_Types].xml").expect("types");
        assert!(types.contains(r#"Extension="jpeg""#));
        assert_eq!(
            read_bytes(&package, "word/media/magalia_image1.jpeg").as_deref(),
            Some(&[0xFF, 0xD8, 0xFF][..])
        );
    }

    #[test]
    fn xml_text_references_unescape() {
        assert_eq!(
            unescape_xml("Terms &amp; Conditions &#233;&#x41; &bogus;"),
            "Terms & Conditions éA &bogus;"
        );
    }

    #[test]
    fn page_layout_reads_section_properties() {
        let template = WordTemplate::from_bytes(&template_with_terms()).expect("template");
        let layout = template.page_layout();
        assert!((layout.page_width_cm - 21.59).abs() < 0.01);
        assert!((layout.usable_width_cm() - 16.51).abs() < 0.01);
    }

    #[test]
    fn builtin_package_appends_before_section_properties() {
        let template = WordTemplate::builtin();
        assert!((template.page_layout().usable_width_cm() - 17.0).abs() < 0.01);

        let package = template
            .render(&[Paragraph::styled("Date").with(Inline::plain("Day one"))])
            .expect("render");
        let document = read_part(&package, "word/document.xml").expect("document");
        let generated = document.find("Day one").expect("generated text");
        assert!(generated < document.find("<w:sectPr>").expect("sectPr"));

        let styles = read_part(&package, "word/styles.xml").expect("styles");
        for style in REQUIRED_STYLES {
            assert!(styles.contains(&format!(r#"w:styleId="{style}""#)));
        }
    }

    #[tokio::test]
    async fn missing_template_file_falls_back_to_builtin() {
        let directory = tempfile::tempdir().expect("tempdir");
        let template =
            WordTemplate::load(&directory.path().join("absent.docx")).await.expect("fallback");
        assert!((template.page_layout().page_width_cm - 21.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn corrupt_template_is_an_error() {
        let directory = tempfile::tempdir().expect("tempdir");
        let path = directory.path().join("broken.docx");
        std::fs::write(&path, b"not a zip").expect("write file");
        assert!(WordTemplate::load(&path).await.is_err());
    }
}
