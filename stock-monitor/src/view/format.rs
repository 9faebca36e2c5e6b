//! Projects a quote record onto the fixed table columns

use serde_json::{Number, Value};
use tracing::warn;

use crate::error::FormatError;
use crate::quote::QuoteRecord;

/// Table columns in display order: (record field, localized header)
pub const COLUMNS: [(&str, &str); 15] = [
    ("symbol", "股票代码"),
    ("current", "当前价"),
    ("percent", "涨跌幅"),
    ("chg", "涨跌额"),
    ("volume", "成交量"),
    ("amount", "成交额"),
    ("market_capital", "总市值"),
    ("float_market_capital", "流通市值"),
    ("turnover_rate", "换手率"),
    ("amplitude", "振幅"),
    ("open", "今开"),
    ("last_close", "昨收"),
    ("high", "最高"),
    ("low", "最低"),
    ("avg_price", "均价"),
];

const GROUPED: [&str; 4] = ["volume", "amount", "market_capital", "float_market_capital"];
const PERCENT: [&str; 3] = ["percent", "turnover_rate", "amplitude"];
const PLACEHOLDER: &str = "-";

/// Physical colour of a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceColor {
    Red,
    Green,
}

/// Which physical colour marks a gain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorPolicy {
    pub up_is_red: bool,
}

impl Default for ColorPolicy {
    fn default() -> Self {
        Self { up_is_red: true }
    }
}

impl ColorPolicy {
    pub fn new(up_is_red: bool) -> Self {
        Self { up_is_red }
    }

    pub fn up_color(&self) -> PriceColor {
        if self.up_is_red {
            PriceColor::Red
        } else {
            PriceColor::Green
        }
    }

    pub fn down_color(&self) -> PriceColor {
        if self.up_is_red {
            PriceColor::Green
        } else {
            PriceColor::Red
        }
    }

    /// `chg > 0` is a gain; zero and losses share the down colour
    pub fn color_for(&self, chg: f64) -> PriceColor {
        if chg > 0.0 {
            self.up_color()
        } else {
            self.down_color()
        }
    }
}

/// One rendered table row plus the attributes the render buffer needs
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayRow {
    pub symbol: String,
    pub cells: Vec<String>,
    pub color: PriceColor,
}

impl DisplayRow {
    /// Unaligned table line, `| a | b | ... |`
    pub fn line(&self) -> String {
        format!("| {} |", self.cells.join(" | "))
    }

    pub fn matches_symbol(&self, symbol: &str) -> bool {
        self.symbol.eq_ignore_ascii_case(symbol)
    }
}

/// Validate `record` and render it as a [`DisplayRow`].
///
/// A record missing any required field is dropped with an
/// `Invalid data received` warning.
pub fn format_record(record: &QuoteRecord, policy: ColorPolicy) -> Result<DisplayRow, FormatError> {
    if let Some(field) = record.missing_field() {
        warn!(field, symbol = record.symbol().unwrap_or(""), "Invalid data received");
        return Err(FormatError::MissingField(field));
    }

    let symbol = record
        .symbol()
        .ok_or(FormatError::MissingField("symbol"))?
        .to_string();

    let cells = COLUMNS
        .iter()
        .map(|(field, _)| format_cell(record, field))
        .collect();

    let chg = record.f64("chg").unwrap_or(0.0);

    Ok(DisplayRow {
        symbol,
        cells,
        color: policy.color_for(chg),
    })
}

/// Localized header cells in column order
pub fn header_cells() -> Vec<String> {
    COLUMNS.iter().map(|(_, title)| title.to_string()).collect()
}

fn format_cell(record: &QuoteRecord, field: &str) -> String {
    let Some(value) = record.get(field) else {
        return PLACEHOLDER.to_string();
    };

    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) if GROUPED.contains(&field) => group_thousands(number),
        Value::Number(number) if PERCENT.contains(&field) => {
            format!("{:.2}%", number.as_f64().unwrap_or_default())
        }
        Value::Number(number) if field == "chg" => {
            format!("{:.2}", number.as_f64().unwrap_or_default())
        }
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}

/// Integer part of `number` with `,` between thousands groups
pub fn group_thousands(number: &Number) -> String {
    let (negative, magnitude) = if let Some(value) = number.as_u64() {
        (false, value)
    } else if let Some(value) = number.as_i64() {
        (value < 0, value.unsigned_abs())
    } else {
        let value = number.as_f64().unwrap_or_default().round();
        (value < 0.0, value.abs() as u64)
    };

    let digits = magnitude.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if negative {
        grouped.push('-');
    }
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}
