//! Step footer with the Verify and Next buttons and the last result

use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
};

use crate::app::session::LabSession;
use crate::theme::Theme;

/// Height of the step footer in lines
pub const FOOTER_HEIGHT: u16 = 3;

/// Draw the footer below the code view
pub fn draw(frame: &mut Frame, area: Rect, session: &LabSession, theme: &Theme) {
    if area.height < FOOTER_HEIGHT {
        return;
    }

    let separator = Line::from(Span::styled("\u{2500}".repeat(area.width as usize), Style::default().fg(theme.border)));
    frame.render_widget(Paragraph::new(separator), Rect::new(area.x, area.y, area.width, 1));

    let verifying = session.is_verifying();
    let can_continue = session.can_continue();
    let is_last = session.current_index() + 1 >= session.lab().steps.len();

    let verify_label = if verifying { " Verifying\u{2026} " } else { " Verify [v] " };
    let next_label = if is_last { " Finish " } else { " Next \u{2192} [n] " };

    let buttons = Line::from(vec![
        button(verify_label, !verifying, theme),
        Span::raw("    "),
        button(next_label, can_continue && !is_last, theme),
    ]);
    frame.render_widget(
        Paragraph::new(buttons).alignment(ratatui::layout::Alignment::Center),
        Rect::new(area.x, area.y + 1, area.width, 1),
    );

    frame.render_widget(Paragraph::new(status_line(session, theme)), Rect::new(area.x, area.y + 2, area.width, 1));
}

/// Last verification result for the current step, or a prompt
fn status_line(session: &LabSession, theme: &Theme) -> Line<'static> {
    if session.is_verifying() {
        return Line::from(Span::styled("Checking your work\u{2026}", Style::default().fg(theme.info)));
    }
    match session.record().outputs.get(&session.current_index()) {
        Some(result) if result.success => Line::from(vec![
            Span::styled("\u{2713} ", Style::default().fg(theme.success)),
            Span::styled(result.message.clone(), Style::default().fg(theme.fg_secondary)),
        ]),
        Some(result) => Line::from(vec![
            Span::styled("\u{2717} ", Style::default().fg(theme.error)),
            Span::styled(result.message.clone(), Style::default().fg(theme.fg_secondary)),
        ]),
        None if session.current_step().has_code() => Line::from(Span::styled(
            "Fill in the blanks, run the commands, then press v to verify",
            Style::default().fg(theme.fg_muted),
        )),
        None => Line::from(Span::styled("Press n to continue", Style::default().fg(theme.fg_muted))),
    }
}

/// Create a styled button
fn button(text: &'static str, enabled: bool, theme: &Theme) -> Span<'static> {
    let style = if enabled {
        Style::default().fg(theme.bg_primary).bg(theme.accent_primary).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(theme.fg_muted).bg(theme.bg_tertiary)
    };
    Span::styled(text, style)
}
