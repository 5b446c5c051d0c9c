//! Syntax highlighting using syntect
//!
//! Lab code is highlighted as a whole block so multi-line constructs (heredocs,
//! template literals) keep their state from one line to the next.

use once_cell::sync::Lazy;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use syntect::highlighting::{FontStyle, HighlightState, Highlighter, RangedHighlightIterator, ThemeSet};
use syntect::parsing::{ParseState, ScopeStack, SyntaxReference, SyntaxSet};

use crate::theme::Theme;

/// Global syntax set with all default syntaxes
static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);

/// Global theme set; only the token colors are used
static THEME_SET: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

const SYNTECT_THEME: &str = "base16-ocean.dark";

/// Map the language names labs use to syntect syntax names
fn normalize_language(lang: &str) -> &str {
    match lang.trim().to_lowercase().as_str() {
        "sh" | "bash" | "shell" | "zsh" | "console" | "terminal" => "Bourne Again Shell (bash)",
        "js" | "javascript" | "node" | "mjs" => "JavaScript",
        "ts" | "typescript" => "TypeScript",
        "py" | "python" => "Python",
        "json" => "JSON",
        "yaml" | "yml" => "YAML",
        "java" => "Java",
        "cs" | "csharp" | "c#" => "C#",
        "go" | "golang" => "Go",
        "rs" | "rust" => "Rust",
        _ => lang,
    }
}

/// Find the syntax definition for a given language
fn find_syntax(language: &str) -> Option<&'static SyntaxReference> {
    let normalized = normalize_language(language);
    SYNTAX_SET
        .find_syntax_by_name(normalized)
        .or_else(|| SYNTAX_SET.find_syntax_by_extension(&normalized.to_lowercase()))
        .or_else(|| SYNTAX_SET.find_syntax_by_extension(language))
}

fn to_ratatui(style: syntect::highlighting::Style, bg: Color) -> Style {
    let fg = style.foreground;
    let mut out = Style::default().fg(Color::Rgb(fg.r, fg.g, fg.b)).bg(bg);
    if style.font_style.contains(FontStyle::BOLD) {
        out = out.add_modifier(Modifier::BOLD);
    }
    if style.font_style.contains(FontStyle::ITALIC) {
        out = out.add_modifier(Modifier::ITALIC);
    }
    out
}

/// Highlight a block of code, one `Line` per source line
pub fn highlight_code(code: &str, language: &str, theme: &Theme) -> Vec<Line<'static>> {
    let syntax = find_syntax(language);
    let syntect_theme = THEME_SET.themes.get(SYNTECT_THEME);

    let (Some(syntax), Some(syntect_theme)) = (syntax, syntect_theme) else {
        return code.split('\n').map(|line| plain_line(line, language, theme)).collect();
    };

    let highlighter = Highlighter::new(syntect_theme);
    let mut parse_state = ParseState::new(syntax);
    let mut highlight_state = HighlightState::new(&highlighter, ScopeStack::new());

    code.split('\n')
        .map(|line| {
            let with_newline = format!("{line}\n");
            let ops = match parse_state.parse_line(&with_newline, &SYNTAX_SET) {
                Ok(ops) => ops,
                Err(e) => {
                    tracing::debug!("syntax parse failed, falling back to plain text: {}", e);
                    return plain_line(line, language, theme);
                }
            };
            let spans: Vec<Span<'static>> =
                RangedHighlightIterator::new(&mut highlight_state, &ops, &with_newline, &highlighter)
                    .filter_map(|(style, text, _)| {
                        let text = text.trim_end_matches('\n');
                        (!text.is_empty())
                            .then(|| Span::styled(text.to_string(), to_ratatui(style, theme.bg_secondary)))
                    })
                    .collect();
            Line::from(spans)
        })
        .collect()
}

/// Unhighlighted line, with shell-style comments dimmed
fn plain_line(line: &str, language: &str, theme: &Theme) -> Line<'static> {
    let base = Style::default().fg(theme.fg_primary).bg(theme.bg_secondary);
    let hash_comments = matches!(normalize_language(language), "Bourne Again Shell (bash)" | "Python" | "YAML");

    if hash_comments && line.trim_start().starts_with('#') {
        return Line::from(Span::styled(line.to_string(), base.fg(theme.syntax_comment)));
    }
    Line::from(Span::styled(line.to_string(), base))
}

/// Check if a language is supported
pub fn is_language_supported(language: &str) -> bool {
    find_syntax(language).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn normalize_shell() {
        assert_eq!(normalize_language("bash"), "Bourne Again Shell (bash)");
        assert_eq!(normalize_language("Terminal"), "Bourne Again Shell (bash)");
    }

    #[test]
    fn lab_languages_are_supported() {
        assert!(is_language_supported("bash"));
        assert!(is_language_supported("javascript"));
        assert!(is_language_supported("json"));
    }

    #[test]
    fn highlighting_preserves_text() {
        let theme = Theme::default();
        let code = "aws kms create-key \\\n  --description \"lab\"\n";
        let lines = highlight_code(code, "bash", &theme);
        assert_eq!(lines.len(), 3);
        assert_eq!(text(&lines[0]), "aws kms create-key \\");
        assert_eq!(text(&lines[1]), "  --description \"lab\"");
        assert_eq!(text(&lines[2]), "");
    }

    #[test]
    fn unknown_language_falls_back_to_plain() {
        let theme = Theme::default();
        let lines = highlight_code("# note\nvalue", "nonexistent_lang", &theme);
        assert_eq!(lines.len(), 2);
        assert_eq!(text(&lines[1]), "value");
    }
}
