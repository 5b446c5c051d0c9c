//! Key and command reference overlay

use ratatui::{
    Frame,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

use super::layout::centered_rect;
use crate::theme::Theme;

const KEYS: &[(&str, &str)] = &[
    ("Tab / Shift-Tab", "select next / previous blank"),
    ("Enter", "open the hint popover for the selected blank"),
    ("?", "reveal the selected blank's hint"),
    ("a", "reveal the selected blank's answer"),
    ("S", "reveal the full solution"),
    ("w", "toggle the preview with revealed answers"),
    ("t", "cycle tier (only before any reveal)"),
    ("b", "switch code block"),
    ("v", "verify the current step"),
    ("n / p", "next / previous step"),
    ("j / k", "scroll"),
    (":reset [n]", "reset a step and clean up its resources"),
    (":reset-lab", "forget all progress for this lab"),
    (":tier <t>", "set tier: guided, challenge, expert"),
    (":goto <n>", "jump to a step"),
    (":q", "quit"),
];

pub fn draw(frame: &mut Frame, area: Rect, theme: &Theme) {
    let overlay = centered_rect(70, 80, area);
    frame.render_widget(Clear, overlay);

    let block = Block::default()
        .title(" Help (Esc to close) ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border_focused))
        .style(Style::default().bg(theme.bg_secondary));
    let inner = block.inner(overlay);
    frame.render_widget(block, overlay);

    let lines: Vec<Line> = KEYS
        .iter()
        .map(|(key, what)| {
            Line::from(vec![
                Span::styled(format!("{key:>16}  "), Style::default().fg(theme.accent_primary)),
                Span::styled(*what, Style::default().fg(theme.fg_secondary)),
            ])
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), inner);
}
