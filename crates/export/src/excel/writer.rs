use rust_xlsxwriter::{
    Color, Format, FormatAlign, FormatBorder, FormatUnderline, Formula, Url, Workbook, Worksheet,
};

use super::layout::{
    Cell, CellValue, SheetLayout, COLUMN_WIDTHS, FIRST_TABLE_COLUMN, HEADER_ROW, LAST_TABLE_COLUMN,
    LINK_COLOR, ROW_HEIGHT, SHEET_NAME,
};
use crate::error::ExportError;

fn cell_format(cell: Option<&Cell>, bordered: bool) -> Format {
    let mut format = Format::new();
    if let Some(cell) = cell {
        if cell.bold {
            format = format.set_bold();
        }
        if cell.centered {
            format = format.set_align(FormatAlign::Center);
        }
        if let Some(num_format) = cell.num_format {
            format = format.set_num_format(num_format);
        }
        if matches!(cell.value, CellValue::Url(_)) {
            format = format
                .set_font_color(Color::RGB(LINK_COLOR))
                .set_underline(FormatUnderline::Single);
        }
    }
    if bordered {
        format = format.set_border(FormatBorder::Thin);
    }
    format
}

fn write_cell(
    sheet: &mut Worksheet,
    row: u32,
    column: u16,
    cell: Option<&Cell>,
    bordered: bool,
) -> Result<(), ExportError> {
    let format = cell_format(cell, bordered);
    // Layout rows are one based.
    let row = row - 1;
    match cell.map(|cell| &cell.value) {
        Some(CellValue::Text(text)) => {
            sheet.write_string_with_format(row, column, text, &format)?;
        }
        Some(CellValue::Number(number)) => {
            sheet.write_number_with_format(row, column, *number, &format)?;
        }
        Some(CellValue::Formula(formula)) => {
            sheet.write_formula_with_format(row, column, Formula::new(formula), &format)?;
        }
        Some(CellValue::Url(url)) => {
            sheet.write_url_with_format(row, column, Url::new(url), &format)?;
        }
        Some(CellValue::Blank) | None => {
            sheet.write_blank(row, column, &format)?;
        }
    }
    Ok(())
}

/// Serializes a planned sheet into an `.xlsx` workbook.
pub fn write_workbook(layout: &SheetLayout) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (column, width) in COLUMN_WIDTHS.iter().enumerate() {
        sheet.set_column_width(column as u16, *width)?;
    }
    for row in HEADER_ROW..=layout.last_row {
        sheet.set_row_height(row - 1, ROW_HEIGHT)?;
    }

    for (&(row, column), cell) in layout.cells() {
        if !layout.is_bordered(row, column) {
            write_cell(sheet, row, column, Some(cell), false)?;
        }
    }
    for row in HEADER_ROW..=layout.grand_total_row {
        for column in FIRST_TABLE_COLUMN..=LAST_TABLE_COLUMN {
            write_cell(sheet, row, column, layout.get(row, column), true)?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}
