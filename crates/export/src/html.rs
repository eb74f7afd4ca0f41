//! Allow-list HTML handling for rich text typed in the quote editor.
//!
//! Descriptions are sanitized down to a small tag set and then flattened into
//! paragraphs of styled runs the document writer understands.

use scraper::{ElementRef, Html, Node};

pub const ALLOWED_TAGS: &[&str] = &["b", "strong", "i", "em", "ul", "ol", "li", "a", "p", "br"];
const ALLOWED_SCHEMES: &[&str] = &["http:", "https:", "mailto:"];
const ANCHOR_ATTRIBUTES: [&str; 2] = ["href", "title"];

fn safe_href(href: &str) -> bool {
    let lowered = href.trim().to_ascii_lowercase();
    match lowered.find(':') {
        Some(_) => ALLOWED_SCHEMES.iter().any(|scheme| lowered.starts_with(scheme)),
        None => true,
    }
}

fn is_allowed(element: &ElementRef<'_>) -> bool {
    ALLOWED_TAGS.contains(&element.value().name())
}

fn escape(text: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Drops every tag outside [`ALLOWED_TAGS`] while keeping its text. Anchors keep
/// `href` (http, https, mailto or relative) and `title`; other tags lose all
/// attributes.
pub fn sanitize(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::with_capacity(html.len());
    write_sanitized(&mut out, fragment.root_element());
    out
}

fn write_sanitized(out: &mut String, parent: ElementRef<'_>) {
    for child in parent.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&escape(text, false)),
            Node::Element(_) => {
                let Some(element) = ElementRef::wrap(child) else {
                    continue;
                };
                if !is_allowed(&element) {
                    write_sanitized(out, element);
                    continue;
                }
                let name = element.value().name();
                out.push('<');
                out.push_str(name);
                if name == "a" {
                    for attribute in ANCHOR_ATTRIBUTES {
                        let Some(value) = element.value().attr(attribute) else {
                            continue;
                        };
                        if attribute == "href" && !safe_href(value) {
                            continue;
                        }
                        out.push_str(&format!(" {attribute}=\"{}\"", escape(value, true)));
                    }
                }
                out.push('>');
                if name != "br" {
                    write_sanitized(out, element);
                    out.push_str(&format!("</{name}>"));
                }
            }
            _ => {}
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub link: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inline {
    Run(Run),
    Break,
}

/// One output paragraph. List items carry their bullet or number as `prefix`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HtmlBlock {
    pub prefix: Option<String>,
    pub inlines: Vec<Inline>,
}

impl HtmlBlock {
    pub fn plain_text(&self) -> String {
        let mut text = self.prefix.clone().unwrap_or_default();
        for inline in &self.inlines {
            match inline {
                Inline::Run(run) => text.push_str(&run.text),
                Inline::Break => text.push('\n'),
            }
        }
        text
    }

    fn is_blank(&self) -> bool {
        self.inlines.iter().all(|inline| match inline {
            Inline::Run(run) => run.text.trim().is_empty(),
            Inline::Break => true,
        })
    }
}

enum ListKind {
    Bullet,
    Numbered(u32),
}

#[derive(Default)]
struct Flattener {
    blocks: Vec<HtmlBlock>,
    current: HtmlBlock,
    bold: u32,
    italic: u32,
    link: Option<String>,
    lists: Vec<ListKind>,
    plain_newlines: bool,
}

impl Flattener {
    fn flush(&mut self) {
        let block = std::mem::take(&mut self.current);
        if !block.is_blank() {
            self.blocks.push(block);
        }
    }

    fn push_text(&mut self, text: &str) {
        if self.plain_newlines {
            let normalized = text.replace("\r\n", "\n");
            for (index, paragraph) in normalized.split("\n\n").enumerate() {
                if index > 0 {
                    self.flush();
                }
                for (line_index, line) in paragraph.split('\n').enumerate() {
                    if line_index > 0 {
                        self.current.inlines.push(Inline::Break);
                    }
                    self.push_run(line.to_string());
                }
            }
        } else {
            let collapsed = collapse_whitespace(text);
            if collapsed.trim().is_empty() && self.current.inlines.is_empty() {
                return;
            }
            self.push_run(collapsed);
        }
    }

    fn push_run(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        let run = Run {
            text,
            bold: self.bold > 0,
            italic: self.italic > 0,
            link: self.link.clone(),
        };
        if let Some(Inline::Run(last)) = self.current.inlines.last_mut() {
            if last.bold == run.bold && last.italic == run.italic && last.link == run.link {
                last.text.push_str(&run.text);
                return;
            }
        }
        self.current.inlines.push(Inline::Run(run));
    }

    fn walk(&mut self, parent: ElementRef<'_>) {
        for child in parent.children() {
            match child.value() {
                Node::Text(text) => self.push_text(text),
                Node::Element(_) => {
                    if let Some(element) = ElementRef::wrap(child) {
                        self.element(element);
                    }
                }
                _ => {}
            }
        }
    }

    fn element(&mut self, element: ElementRef<'_>) {
        if !is_allowed(&element) {
            self.walk(element);
            return;
        }
        let name = element.value().name();
        self.open(name, element);
        self.walk(element);
        self.close(name);
    }

    fn open(&mut self, name: &str, element: ElementRef<'_>) {
        match name {
            "b" | "strong" => self.bold += 1,
            "i" | "em" => self.italic += 1,
            "p" => self.flush(),
            "br" => self.current.inlines.push(Inline::Break),
            "ul" => {
                self.flush();
                self.lists.push(ListKind::Bullet);
            }
            "ol" => {
                self.flush();
                self.lists.push(ListKind::Numbered(0));
            }
            "li" => {
                self.flush();
                let prefix = match self.lists.last_mut() {
                    Some(ListKind::Numbered(counter)) => {
                        *counter += 1;
                        format!("{counter}. ")
                    }
                    _ => "• ".to_string(),
                };
                self.current.prefix = Some(prefix);
            }
            "a" => {
                self.link = element
                    .value()
                    .attr("href")
                    .filter(|href| !href.trim().is_empty() && safe_href(href))
                    .map(str::to_string);
            }
            _ => {}
        }
    }

    fn close(&mut self, name: &str) {
        match name {
            "b" | "strong" => self.bold = self.bold.saturating_sub(1),
            "i" | "em" => self.italic = self.italic.saturating_sub(1),
            "p" | "li" => self.flush(),
            "ul" | "ol" => {
                self.flush();
                self.lists.pop();
            }
            "a" => self.link = None,
            _ => {}
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !previous_space {
                out.push(' ');
            }
            previous_space = true;
        } else {
            out.push(ch);
            previous_space = false;
        }
    }
    out
}

/// Parses `html`, keeps the allow-listed structure and splits it into
/// paragraphs. Text without any block tag keeps its own line structure: a
/// blank line separates paragraphs and a single newline becomes a line break.
pub fn to_blocks(html: &str) -> Vec<HtmlBlock> {
    let fragment = Html::parse_fragment(html);
    let root = fragment.root_element();
    let has_blocks = root
        .descendants()
        .filter_map(ElementRef::wrap)
        .any(|element| matches!(element.value().name(), "p" | "br" | "li"));

    let mut flattener = Flattener { plain_newlines: !has_blocks, ..Flattener::default() };
    flattener.walk(root);
    flattener.flush();
    flattener.blocks
}

/// Flattens markup onto a single line; used for titles that may carry inline
/// emphasis.
pub fn to_inline(markup: &str) -> Vec<Inline> {
    let mut inlines = Vec::new();
    for (index, block) in to_blocks(markup).into_iter().enumerate() {
        if index > 0 {
            inlines.push(Inline::Run(Run {
                text: " ".to_string(),
                bold: false,
                italic: false,
                link: None,
            }));
        }
        inlines.extend(block.inlines.into_iter().filter(|inline| *inline != Inline::Break));
    }
    inlines
}
