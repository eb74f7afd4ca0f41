mod layout;
mod writer;

use magalia_core::domain::view::QuoteView;
use tracing::info;

pub use layout::{
    amount_format, effective_fx, provider_link, Cell, CellValue, SheetLayout, DECIMAL_FORMAT,
    INTEGER_FORMAT, SHEET_NAME, TOTAL_FORMAT,
};
pub use writer::write_workbook;

use crate::error::ExportError;

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Renders the internal pricing worksheet.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExcelExporter;

impl ExcelExporter {
    pub fn new() -> Self {
        Self
    }

    /// `quote` must already carry its computed onspot and hassle totals.
    pub fn render(&self, quote: &QuoteView) -> Result<Vec<u8>, ExportError> {
        let layout = SheetLayout::build(quote);
        let bytes = write_workbook(&layout)?;
        info!(
            event_name = "export.excel.rendered",
            quote_id = %quote.id,
            service_rows = layout.service_rows,
            bytes = bytes.len(),
            "excel workbook rendered"
        );
        Ok(bytes)
    }
}
