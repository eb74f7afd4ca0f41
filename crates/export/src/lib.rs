//! Client-facing documents for a quote: the Word itinerary and the Excel
//! pricing sheet.

pub mod compose;
pub mod dates;
pub mod error;
pub mod excel;
pub mod html;
pub mod images;
pub mod settings;
pub mod word;

pub use error::ExportError;
pub use excel::{ExcelExporter, XLSX_MIME};
pub use images::{HttpImageFetcher, ImageFetcher, MemoryImageFetcher};
pub use settings::ExportSettings;
pub use word::{WordExporter, WORD_MIME};
