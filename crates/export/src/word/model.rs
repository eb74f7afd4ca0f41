//! In-memory shape of the generated document body, independent of OOXML.

pub const EMU_PER_CM: f64 = 360_000.0;

pub fn cm_to_emu(cm: f64) -> i64 {
    (cm * EMU_PER_CM).round() as i64
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Picture {
    pub bytes: Vec<u8>,
    pub width_emu: i64,
    pub height_emu: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inline {
    Text { text: String, bold: bool, italic: bool },
    Link { text: String, target: String, bold: bool, italic: bool },
    Break,
    Picture(Picture),
}

impl Inline {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Text { text: text.into(), bold: false, italic: false }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Alignment {
    #[default]
    Start,
    Center,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Paragraph {
    pub style: Option<&'static str>,
    pub alignment: Alignment,
    /// Keep on the same page as the next paragraph.
    pub keep_next: bool,
    pub inlines: Vec<Inline>,
}

impl Paragraph {
    pub fn styled(style: &'static str) -> Self {
        Self { style: Some(style), ..Self::default() }
    }

    pub fn centered_picture(picture: Picture) -> Self {
        Self {
            alignment: Alignment::Center,
            inlines: vec![Inline::Picture(picture)],
            ..Self::default()
        }
    }

    pub fn with(mut self, inline: Inline) -> Self {
        self.inlines.push(inline);
        self
    }

    pub fn text(&self) -> String {
        self.inlines
            .iter()
            .map(|inline| match inline {
                Inline::Text { text, .. } | Inline::Link { text, .. } => text.as_str(),
                Inline::Break => "\n",
                Inline::Picture(_) => "",
            })
            .collect()
    }

    pub fn has_picture(&self) -> bool {
        self.inlines.iter().any(|inline| matches!(inline, Inline::Picture(_)))
    }
}
