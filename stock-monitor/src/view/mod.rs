//! Quote table presentation
//!
//! Provides:
//! - Record formatter (`format_record`) turning a quote into a coloured row
//! - `RenderBuffer` owning the visible table
//! - Ratatui drawing for the buffer and footer

mod buffer;
mod format;
mod widget;

pub use buffer::{RenderBuffer, TIMESTAMP_FORMAT};
pub use format::{
    format_record, group_thousands, header_cells, ColorPolicy, DisplayRow, PriceColor, COLUMNS,
};
pub use widget::{draw, Footer, KEY_HELP};
