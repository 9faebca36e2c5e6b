//! The visible quote table
//!
//! `RenderBuffer` is the only owner of what the user sees. It keeps the rows
//! as data and produces aligned, coloured text lines on demand.

use chrono::{DateTime, Local};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

use super::format::{header_cells, DisplayRow, PriceColor};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const C_RED: Color = Color::Rgb(220, 100, 100);
const C_GREEN: Color = Color::Rgb(100, 220, 100);
const C_DIM: Color = Color::Rgb(120, 120, 120);
const C_BRIGHT: Color = Color::Rgb(220, 220, 220);

impl PriceColor {
    pub fn to_color(self) -> Color {
        match self {
            PriceColor::Red => C_RED,
            PriceColor::Green => C_GREEN,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RenderBuffer {
    rows: Vec<DisplayRow>,
    refreshed_at: Option<DateTime<Local>>,
    auto_refresh: bool,
    cursor: usize,
}

impl RenderBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole table
    pub fn repaint(&mut self, rows: Vec<DisplayRow>, refreshed_at: DateTime<Local>, auto_refresh: bool) {
        self.rows = rows;
        self.refreshed_at = Some(refreshed_at);
        self.auto_refresh = auto_refresh;
        self.clamp_cursor();
    }

    pub fn append_row(&mut self, row: DisplayRow) {
        self.rows.push(row);
    }

    /// Remove the first row whose symbol matches case-insensitively
    pub fn remove_row_by_symbol(&mut self, symbol: &str) -> bool {
        let Some(index) = self.rows.iter().position(|row| row.matches_symbol(symbol)) else {
            return false;
        };
        self.rows.remove(index);
        self.clamp_cursor();
        true
    }

    pub fn rows(&self) -> &[DisplayRow] {
        &self.rows
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.rows.iter().map(|row| row.symbol.as_str()).collect()
    }

    pub fn is_auto_refresh(&self) -> bool {
        self.auto_refresh
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Local>> {
        self.refreshed_at
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn cursor_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_down(&mut self) {
        if self.cursor + 1 < self.rows.len() {
            self.cursor += 1;
        }
    }

    pub fn set_cursor(&mut self, index: usize) {
        self.cursor = index;
        self.clamp_cursor();
    }

    /// Symbol of the row under the cursor, if any
    pub fn symbol_at_cursor(&self) -> Option<&str> {
        self.rows.get(self.cursor).map(|row| row.symbol.as_str())
    }

    fn clamp_cursor(&mut self) {
        self.cursor = self.cursor.min(self.rows.len().saturating_sub(1));
    }

    pub fn header_text(&self) -> (String, &'static str) {
        let timestamp = self
            .refreshed_at
            .map(|time| time.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_else(|| "--".to_string());
        let state = if self.auto_refresh { "ON" } else { "OFF" };
        (timestamp, state)
    }

    /// Plain text of every line, without colour
    pub fn text_lines(&self) -> Vec<String> {
        self.lines()
            .iter()
            .map(|line| line.spans.iter().map(|span| span.content.as_ref()).collect())
            .collect()
    }

    /// Index into [`lines`](Self::lines) of the data row under the cursor
    pub fn cursor_line(&self) -> Option<usize> {
        (self.cursor < self.rows.len()).then(|| TABLE_OFFSET + 2 + self.cursor * 2)
    }

    /// Header line, blank line, then the aligned table
    pub fn lines(&self) -> Vec<Line<'static>> {
        let (timestamp, state) = self.header_text();
        let state_color = if self.auto_refresh { C_GREEN } else { C_RED };

        let mut lines = vec![
            Line::from(vec![
                Span::raw("Stocks refreshed at: [ "),
                Span::styled(timestamp, Style::default().fg(C_GREEN)),
                Span::raw(" ] auto-refreshing is: [ "),
                Span::styled(
                    state,
                    Style::default().fg(state_color).add_modifier(Modifier::BOLD),
                ),
                Span::raw(" ]"),
            ]),
            Line::from(""),
        ];

        let header = header_cells();
        let widths = column_widths(&header, &self.rows);
        let rule = separator(&widths);

        lines.push(table_line(&header, &widths, Style::default().fg(C_BRIGHT).add_modifier(Modifier::BOLD)));
        for row in &self.rows {
            lines.push(Line::from(Span::styled(rule.clone(), Style::default().fg(C_DIM))));
            lines.push(table_line(&row.cells, &widths, Style::default().fg(row.color.to_color())));
        }
        lines
    }
}

/// Lines before the table header
const TABLE_OFFSET: usize = 2;

fn display_width(text: &str) -> usize {
    Span::raw(text).width()
}

fn column_widths(header: &[String], rows: &[DisplayRow]) -> Vec<usize> {
    let mut widths: Vec<usize> = header.iter().map(|cell| display_width(cell)).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(&row.cells) {
            *width = (*width).max(display_width(cell));
        }
    }
    widths
}

/// `|------+-----|`
fn separator(widths: &[usize]) -> String {
    let inner: Vec<String> = widths.iter().map(|width| "-".repeat(width + 2)).collect();
    format!("|{}|", inner.join("+"))
}

/// First column left-aligned, numeric columns right-aligned
fn table_line(cells: &[String], widths: &[usize], style: Style) -> Line<'static> {
    let mut spans = vec![Span::styled("|", Style::default().fg(C_DIM))];
    for (index, (cell, width)) in cells.iter().zip(widths).enumerate() {
        let padding = " ".repeat(width.saturating_sub(display_width(cell)));
        let text = if index == 0 {
            format!(" {cell}{padding} ")
        } else {
            format!(" {padding}{cell} ")
        };
        spans.push(Span::styled(text, style));
        spans.push(Span::styled("|", Style::default().fg(C_DIM)));
    }
    Line::from(spans)
}
