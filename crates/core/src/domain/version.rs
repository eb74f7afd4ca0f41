use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::quote::QuoteId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(pub i64);

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionType {
    Manual,
    AutoInitial,
    AutoExportWord,
    AutoExportPdf,
    AutoExportExcel,
    AutoBeforeRestore,
}

impl VersionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::AutoInitial => "auto_initial",
            Self::AutoExportWord => "auto_export_word",
            Self::AutoExportPdf => "auto_export_pdf",
            Self::AutoExportExcel => "auto_export_excel",
            Self::AutoBeforeRestore => "auto_before_restore",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "manual" => Some(Self::Manual),
            "auto_initial" => Some(Self::AutoInitial),
            "auto_export_word" => Some(Self::AutoExportWord),
            "auto_export_pdf" => Some(Self::AutoExportPdf),
            "auto_export_excel" => Some(Self::AutoExportExcel),
            "auto_before_restore" => Some(Self::AutoBeforeRestore),
            _ => None,
        }
    }

    /// Export-triggered versions are capped per rolling window; every other type
    /// is written unconditionally.
    pub fn is_throttled(&self) -> bool {
        matches!(self, Self::AutoExportWord | Self::AutoExportPdf | Self::AutoExportExcel)
    }

    pub fn export_kind(&self) -> Option<ExportKind> {
        match self {
            Self::AutoExportWord => Some(ExportKind::Word),
            Self::AutoExportPdf => Some(ExportKind::Pdf),
            Self::AutoExportExcel => Some(ExportKind::Excel),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    Word,
    Pdf,
    Excel,
}

impl ExportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Word => "word",
            Self::Pdf => "pdf",
            Self::Excel => "excel",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "word" => Some(Self::Word),
            "pdf" => Some(Self::Pdf),
            "excel" => Some(Self::Excel),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteVersion {
    pub id: VersionId,
    pub quote_id: QuoteId,
    pub label: String,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    #[serde(rename = "type")]
    pub version_type: VersionType,
    pub export_type: Option<ExportKind>,
    pub export_file_name: Option<String>,
    pub total_price: Option<Decimal>,
    pub snapshot_json: Value,
    pub archived_at: Option<DateTime<Utc>>,
}

impl QuoteVersion {
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }
}

/// Row to insert; storage assigns the id.
#[derive(Clone, Debug, PartialEq)]
pub struct NewQuoteVersion {
    pub quote_id: QuoteId,
    pub label: String,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub version_type: VersionType,
    pub export_type: Option<ExportKind>,
    pub export_file_name: Option<String>,
    pub total_price: Option<Decimal>,
    pub snapshot_json: Value,
}

impl NewQuoteVersion {
    pub fn into_version(self, id: VersionId) -> QuoteVersion {
        QuoteVersion {
            id,
            quote_id: self.quote_id,
            label: self.label,
            comment: self.comment,
            created_at: self.created_at,
            created_by: self.created_by,
            version_type: self.version_type,
            export_type: self.export_type,
            export_file_name: self.export_file_name,
            total_price: self.total_price,
            snapshot_json: self.snapshot_json,
            archived_at: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VersionListFilter {
    pub include_archived: bool,
    pub limit: u32,
    pub offset: u32,
}

impl Default for VersionListFilter {
    fn default() -> Self {
        Self { include_archived: false, limit: 50, offset: 0 }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct VersionPage {
    pub items: Vec<QuoteVersion>,
    pub total: u64,
}

impl VersionPage {
    pub fn has_more(&self, filter: &VersionListFilter) -> bool {
        u64::from(filter.offset) + (self.items.len() as u64) < self.total
    }
}

#[cfg(test)]
mod tests {
    use super::{ExportKind, VersionListFilter, VersionPage, VersionType};

    #[test]
    fn version_type_tags_round_trip() {
        for version_type in [
            VersionType::Manual,
            VersionType::AutoInitial,
            VersionType::AutoExportWord,
            VersionType::AutoExportPdf,
            VersionType::AutoExportExcel,
            VersionType::AutoBeforeRestore,
        ] {
            assert_eq!(VersionType::parse(version_type.as_str()), Some(version_type));
        }
        assert_eq!(VersionType::parse("nightly"), None);
    }

    #[test]
    fn only_export_versions_are_throttled() {
        assert!(VersionType::AutoExportWord.is_throttled());
        assert!(VersionType::AutoExportExcel.is_throttled());
        assert!(!VersionType::AutoInitial.is_throttled());
        assert!(!VersionType::Manual.is_throttled());
        assert!(!VersionType::AutoBeforeRestore.is_throttled());
        assert_eq!(VersionType::AutoExportWord.export_kind(), Some(ExportKind::Word));
        assert_eq!(VersionType::Manual.export_kind(), None);
    }

    #[test]
    fn page_reports_more_items_beyond_window() {
        let filter = VersionListFilter { include_archived: false, limit: 2, offset: 2 };
        let page = VersionPage { items: Vec::new(), total: 5 };
        assert!(page.has_more(&filter));

        let last = VersionListFilter { include_archived: false, limit: 2, offset: 5 };
        assert!(!page.has_more(&last));
    }
}
