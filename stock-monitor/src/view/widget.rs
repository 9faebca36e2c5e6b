//! Ratatui drawing of the render buffer, status line and add-symbol prompt

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use super::buffer::RenderBuffer;

const C_DIM: Color = Color::Rgb(120, 120, 120);
const C_ACCENT: Color = Color::Rgb(100, 180, 220);
const C_HEADER: Color = Color::Rgb(180, 130, 220);

pub const KEY_HELP: &str = "g start  s stop  a add  d delete  p/n move  q quit";

/// What the bottom line should show this frame
#[derive(Debug, Clone, Copy)]
pub enum Footer<'a> {
    Help,
    Status(&'a str),
    Prompt(&'a str),
}

pub fn draw(f: &mut Frame, buffer: &RenderBuffer, footer: Footer<'_>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(f.area());

    render_table(f, buffer, chunks[0]);
    render_footer(f, footer, chunks[1]);
}

fn render_table(f: &mut Frame, buffer: &RenderBuffer, area: Rect) {
    let block = Block::default()
        .title(" STOCKS ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(C_HEADER));
    let inner_height = block.inner(area).height as usize;

    let mut lines = buffer.lines();
    let cursor_line = buffer.cursor_line();
    if let Some(index) = cursor_line {
        if let Some(line) = lines.get_mut(index) {
            *line = std::mem::take(line).patch_style(Style::default().add_modifier(Modifier::REVERSED));
        }
    }

    // Keep the cursor row on screen
    let scroll = cursor_line
        .map(|index| (index + 1).saturating_sub(inner_height))
        .unwrap_or(0);

    let paragraph = Paragraph::new(lines)
        .block(block)
        .scroll((scroll.min(u16::MAX as usize) as u16, 0));
    f.render_widget(paragraph, area);
}

fn render_footer(f: &mut Frame, footer: Footer<'_>, area: Rect) {
    let line = match footer {
        Footer::Help => Line::from(Span::styled(KEY_HELP, Style::default().fg(C_DIM))),
        Footer::Status(message) => Line::from(Span::styled(message.to_string(), Style::default().fg(C_ACCENT))),
        Footer::Prompt(input) => Line::from(vec![
            Span::styled("Add stock: ", Style::default().fg(C_ACCENT).add_modifier(Modifier::BOLD)),
            Span::raw(input.to_string()),
            Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
        ]),
    };
    f.render_widget(Paragraph::new(line), area);
}
