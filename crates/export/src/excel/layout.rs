//! Cell-by-cell plan of the quote worksheet. Kept free of any spreadsheet
//! library so formulas and placement can be asserted directly.

use std::collections::BTreeMap;

use magalia_core::domain::view::{LineView, QuoteView};
use magalia_core::pricing::effective_margin;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::compose::{category_of, excel_name};

pub const SHEET_NAME: &str = "Quote";
pub const INTEGER_FORMAT: &str = "0;;;";
pub const DECIMAL_FORMAT: &str = "0.00;;;";
pub const TOTAL_FORMAT: &str = "0.##;;;";
pub const LINK_COLOR: u32 = 0x0563C1;
pub const ROW_HEIGHT: f64 = 14.3;
pub const COLUMN_WIDTHS: [f64; 9] = [17.0, 12.0, 41.87, 20.8, 20.8, 11.3, 21.0, 10.0, 20.0];
pub const HEADERS: [&str; 8] = [
    "Destination",
    "Service",
    "Prix d'achat €",
    "Prix d'achat $",
    "Prix de vente",
    "Supplier",
    "Note",
    "Provider URL",
];

pub const HEADER_ROW: u32 = 2;
pub const HASSLE_ROW: u32 = 3;
pub const ONSPOT_ROW: u32 = 4;
pub const FIRST_SERVICE_ROW: u32 = 5;
/// Columns B..=I, zero based.
pub const FIRST_TABLE_COLUMN: u16 = 1;
pub const LAST_TABLE_COLUMN: u16 = 8;

const COL_DESTINATION: u16 = 1;
const COL_SERVICE: u16 = 2;
const COL_PURCHASE_EUR: u16 = 3;
const COL_PURCHASE_USD: u16 = 4;
const COL_SELL_USD: u16 = 5;
const COL_SUPPLIER: u16 = 6;
const COL_NOTE: u16 = 7;
const COL_URL: u16 = 8;

#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Formula(String),
    Url(String),
    Blank,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    pub value: CellValue,
    pub bold: bool,
    pub centered: bool,
    pub num_format: Option<&'static str>,
}

impl Cell {
    fn new(value: CellValue) -> Self {
        Self { value, bold: false, centered: false, num_format: None }
    }

    fn text(text: impl Into<String>) -> Self {
        Self::new(CellValue::Text(text.into()))
    }

    fn formula(formula: impl Into<String>, num_format: &'static str) -> Self {
        Self { num_format: Some(num_format), ..Self::new(CellValue::Formula(formula.into())) }
    }

    fn number(value: Decimal) -> Self {
        Self {
            num_format: Some(amount_format(value)),
            ..Self::new(CellValue::Number(value.to_f64().unwrap_or_default()))
        }
    }

    fn blank(num_format: &'static str) -> Self {
        Self { num_format: Some(num_format), ..Self::new(CellValue::Blank) }
    }

    fn bold(mut self) -> Self {
        self.bold = true;
        self
    }
}

/// Whole numbers print without decimals, anything else with two.
pub fn amount_format(value: Decimal) -> &'static str {
    if value.fract().is_zero() {
        INTEGER_FORMAT
    } else {
        DECIMAL_FORMAT
    }
}

/// Line rate, then quote rate, then 1. Non-positive rates are ignored.
pub fn effective_fx(line: Option<Decimal>, quote: Option<Decimal>) -> Decimal {
    line.filter(|rate| *rate > Decimal::ZERO)
        .or_else(|| quote.filter(|rate| *rate > Decimal::ZERO))
        .unwrap_or(Decimal::ONE)
}

pub fn provider_link(line: &LineView) -> Option<String> {
    let url = line.raw_json.provider_url()?;
    let lowered = url.to_ascii_lowercase();
    if lowered.starts_with("http://") || lowered.starts_with("https://") {
        Some(url)
    } else {
        Some(format!("https://{url}"))
    }
}

fn literal(value: Decimal) -> String {
    value.normalize().to_string()
}

#[derive(Clone, Debug, Default)]
pub struct SheetLayout {
    cells: BTreeMap<(u32, u16), Cell>,
    pub service_rows: u32,
    pub total_row: u32,
    pub grand_total_row: u32,
    pub recap_row: u32,
    pub last_row: u32,
}

impl SheetLayout {
    fn put(&mut self, row: u32, column: u16, cell: Cell) {
        self.cells.insert((row, column), cell);
    }

    /// Cells keyed by one-based row and zero-based column.
    pub fn cells(&self) -> impl Iterator<Item = (&(u32, u16), &Cell)> {
        self.cells.iter()
    }

    pub fn get(&self, row: u32, column: u16) -> Option<&Cell> {
        self.cells.get(&(row, column))
    }

    /// Lookup by A1 reference, e.g. `"E4"`.
    pub fn at(&self, reference: &str) -> Option<&Cell> {
        let mut chars = reference.chars();
        let letter = chars.next()?.to_ascii_uppercase();
        if !letter.is_ascii_uppercase() {
            return None;
        }
        let row: u32 = chars.as_str().parse().ok()?;
        self.get(row, u16::from(letter as u8 - b'A'))
    }

    pub fn is_bordered(&self, row: u32, column: u16) -> bool {
        (HEADER_ROW..=self.grand_total_row).contains(&row)
            && (FIRST_TABLE_COLUMN..=LAST_TABLE_COLUMN).contains(&column)
    }

    pub fn build(quote: &QuoteView) -> Self {
        let mut layout = Self::default();

        for (offset, header) in HEADERS.iter().enumerate() {
            let mut cell = Cell::text(*header).bold();
            cell.centered = true;
            layout.put(HEADER_ROW, FIRST_TABLE_COLUMN + offset as u16, cell);
        }

        let hassle = quote.hassle_total.unwrap_or_default();
        let onspot = quote.onspot_total.unwrap_or_default();
        layout.put(HASSLE_ROW, COL_SELL_USD, Cell::number(hassle));
        layout.put(ONSPOT_ROW, COL_PURCHASE_USD, Cell::number(onspot));

        let mut row = FIRST_SERVICE_ROW;
        let mut current_destination: Option<String> = None;
        for day in &quote.days {
            let destination = day.destination.clone().unwrap_or_default();
            for line in day.lines.iter().filter(|line| category_of(line).is_paid()) {
                if current_destination.as_deref() != Some(destination.as_str()) {
                    if !destination.trim().is_empty() {
                        layout.put(row, COL_DESTINATION, Cell::text(destination.clone()));
                    }
                    current_destination = Some(destination.clone());
                }
                layout.service_row(row, line, quote.fx_rate);
                row += 1;
            }
        }

        layout.service_rows = row - FIRST_SERVICE_ROW;
        let last_service_row = row - 1;
        layout.total_row = row + 1;
        layout.grand_total_row = layout.total_row + 1;
        layout.recap_row = layout.grand_total_row + 3;
        layout.last_row = layout.recap_row + 3;

        let total = layout.total_row;
        let (purchase_sum, sell_sum) = if layout.service_rows > 0 {
            (
                format!("=SUM(E{FIRST_SERVICE_ROW}:E{last_service_row})+E{ONSPOT_ROW}"),
                format!("=SUM(F{FIRST_SERVICE_ROW}:F{last_service_row})+F{HASSLE_ROW}"),
            )
        } else {
            (format!("=E{ONSPOT_ROW}"), format!("=F{HASSLE_ROW}"))
        };
        layout.put(total, COL_DESTINATION, Cell::text("Total").bold());
        layout.put(total, COL_PURCHASE_USD, Cell::formula(purchase_sum, TOTAL_FORMAT));
        layout.put(total, COL_SELL_USD, Cell::formula(sell_sum, TOTAL_FORMAT));

        let grand = layout.grand_total_row;
        layout.put(grand, COL_DESTINATION, Cell::text("Grand total").bold());
        layout.put(grand, COL_SELL_USD, Cell::formula(format!("=E{total}+F{total}"), TOTAL_FORMAT));

        let recap = layout.recap_row;
        let margin = literal(effective_margin(quote.margin_pct));
        let recap_rows = [
            ("Prix d'achat", format!("=E{total}")),
            ("Commission", format!("=E{total}*{margin}")),
            ("Prix de vente", format!("=F{total}")),
            ("Total", format!("=D{recap}+D{}+D{}", recap + 1, recap + 2)),
        ];
        for (offset, (label, formula)) in recap_rows.into_iter().enumerate() {
            let row = recap + offset as u32;
            let label_cell =
                if label == "Total" { Cell::text(label).bold() } else { Cell::text(label) };
            layout.put(row, COL_SERVICE, label_cell);
            layout.put(row, COL_PURCHASE_EUR, Cell::formula(formula, TOTAL_FORMAT));
        }

        layout
    }

    fn service_row(&mut self, row: u32, line: &LineView, quote_fx: Option<Decimal>) {
        self.put(row, COL_SERVICE, Cell::text(excel_name(line)));

        let purchase_eur = line.achat_eur.unwrap_or_default();
        let buff = line.raw_json.buff_pct().filter(|buff| *buff > Decimal::ZERO);
        if purchase_eur > Decimal::ZERO {
            let (cell, adjusted) = match buff {
                Some(buff) => {
                    let adjusted = purchase_eur * (Decimal::ONE + buff / Decimal::ONE_HUNDRED);
                    let formula = format!("={}*(1+{}/100)", literal(purchase_eur), literal(buff));
                    (Cell::formula(formula, amount_format(adjusted)), adjusted)
                }
                None => (Cell::number(purchase_eur), purchase_eur),
            };
            self.put(row, COL_PURCHASE_EUR, cell);

            let fx = effective_fx(line.fx_rate, quote_fx);
            let expected = adjusted.checked_div(fx).unwrap_or_default();
            self.put(
                row,
                COL_PURCHASE_USD,
                Cell::formula(format!("=D{row}/{}", literal(fx)), amount_format(expected)),
            );
        } else {
            self.put(row, COL_PURCHASE_EUR, Cell::blank(INTEGER_FORMAT));
            self.put(row, COL_PURCHASE_USD, Cell::blank(INTEGER_FORMAT));
        }

        let sell = line.vente_usd.unwrap_or_default();
        if sell.is_zero() {
            self.put(row, COL_SELL_USD, Cell::blank(INTEGER_FORMAT));
        } else {
            self.put(row, COL_SELL_USD, Cell::number(sell));
        }

        if let Some(supplier) =
            line.supplier_name.as_deref().map(str::trim).filter(|s| !s.is_empty())
        {
            self.put(row, COL_SUPPLIER, Cell::text(supplier));
        }
        if let Some(note) = line.raw_json.text("internal_note") {
            self.put(row, COL_NOTE, Cell::text(note));
        }
        if let Some(url) = provider_link(line) {
            self.put(row, COL_URL, Cell::new(CellValue::Url(url)));
        }
    }
}
