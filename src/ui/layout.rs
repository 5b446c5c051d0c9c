//! Layout helpers shared by screens and overlays

use ratatui::layout::{Constraint, Layout, Rect};

/// Rectangle centered in `r`, sized as a percentage of it
pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let rows = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .split(r);

    Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .split(rows[1])[1]
}

/// Regions of the lab screen, top to bottom
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabLayout {
    pub header: Rect,
    pub description: Rect,
    pub code: Rect,
    pub footer: Rect,
    pub command: Rect,
}

/// Split the screen; the description gets at most a third of the height
pub fn lab_layout(area: Rect, description_lines: u16, footer_height: u16) -> LabLayout {
    let description = description_lines.min(area.height / 3);
    let chunks = Layout::vertical([
        Constraint::Length(2),
        Constraint::Length(description),
        Constraint::Min(3),
        Constraint::Length(footer_height),
        Constraint::Length(1),
    ])
    .split(area);

    LabLayout { header: chunks[0], description: chunks[1], code: chunks[2], footer: chunks[3], command: chunks[4] }
}
