//! Syntax highlighting for code snippets and fix previews.
//!
//! Snippets are highlighted with syntect; fix previews are `similar` unified
//! hunks with word-level emphasis on paired removed/added lines.

use std::sync::LazyLock;

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use similar::{ChangeTag, TextDiff};
use syntect::easy::HighlightLines;
use syntect::highlighting::ThemeSet;
use syntect::parsing::SyntaxSet;

use crate::theme::Theme;

static PS: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static TS: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

/// Context lines kept around each change in fix previews.
const DIFF_CONTEXT: usize = 3;

/// Converts a syntect (Style, &str) pair to an owned ratatui Span.
fn syntect_to_span(style: syntect::highlighting::Style, content: &str) -> Span<'static> {
    use syntect::highlighting::Color as SC;
    let to_color = |c: SC| -> Option<Color> {
        if c.a > 0 { Some(Color::Rgb(c.r, c.g, c.b)) } else { None }
    };
    let mut ratatui_style = Style::default();
    if let Some(fg) = to_color(style.foreground) {
        ratatui_style = ratatui_style.fg(fg);
    }
    if style.font_style.contains(syntect::highlighting::FontStyle::BOLD) {
        ratatui_style = ratatui_style.add_modifier(Modifier::BOLD);
    }
    if style.font_style.contains(syntect::highlighting::FontStyle::ITALIC) {
        ratatui_style = ratatui_style.add_modifier(Modifier::ITALIC);
    }
    Span::styled(content.trim_end_matches(['\n', '\r']).to_owned(), ratatui_style)
}

fn highlighter(path: &str, theme: &Theme) -> Option<HighlightLines<'static>> {
    let syntax_theme = TS
        .themes
        .get(theme.syntax_theme)
        .or_else(|| TS.themes.values().next())?;
    let syntax = PS
        .find_syntax_by_extension(file_ext(path))
        .unwrap_or_else(|| PS.find_syntax_plain_text());
    Some(HighlightLines::new(syntax, syntax_theme))
}

/// Highlights one line, falling back to a plain span.
fn code_spans(code: &str, h: Option<&mut HighlightLines<'static>>) -> Vec<Span<'static>> {
    let line = format!("{code}\n");
    let spans: Vec<Span<'static>> = match h {
        Some(h) => h
            .highlight_line(&line, &PS)
            .unwrap_or_default()
            .into_iter()
            .map(|(style, text)| syntect_to_span(style, text))
            .filter(|s| !s.content.is_empty())
            .collect(),
        None => Vec::new(),
    };
    if spans.is_empty() {
        vec![Span::raw(code.to_owned())]
    } else {
        spans
    }
}

/// Highlighted snippet with a line-number gutter starting at `first_line`.
pub fn snippet_lines(path: &str, code: &str, first_line: u32, theme: &Theme) -> Vec<Line<'static>> {
    let mut h = highlighter(path, theme);
    let last = first_line as usize + code.lines().count().saturating_sub(1);
    let width = last.to_string().len();
    code.lines()
        .enumerate()
        .map(|(i, text)| {
            let number = format!("{:>width$} │ ", first_line as usize + i);
            let mut spans = vec![Span::styled(number, Style::default().fg(theme.muted))];
            spans.extend(code_spans(text, h.as_mut()));
            Line::from(spans)
        })
        .collect()
}

/// Computes word-level diff spans for a removed/added line pair.
///
/// Returns two parallel Vecs of spans: old_line spans and new_line spans.
/// Changed words are rendered bold; unchanged words use the muted color.
fn word_diff_spans(
    old_line: &str,
    new_line: &str,
    theme: &Theme,
) -> (Vec<Span<'static>>, Vec<Span<'static>>) {
    let diff = TextDiff::from_words(old_line, new_line);
    let mut old_spans: Vec<Span<'static>> = Vec::new();
    let mut new_spans: Vec<Span<'static>> = Vec::new();

    for op in diff.ops() {
        for change in diff.iter_inline_changes(op) {
            for (emphasized, value) in change.iter_strings_lossy() {
                let text = value.into_owned();
                match change.tag() {
                    ChangeTag::Delete => {
                        let mut style = Style::default().fg(theme.diff_removed);
                        if emphasized {
                            style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
                        }
                        old_spans.push(Span::styled(text, style));
                    }
                    ChangeTag::Insert => {
                        let mut style = Style::default().fg(theme.diff_added);
                        if emphasized {
                            style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
                        }
                        new_spans.push(Span::styled(text, style));
                    }
                    ChangeTag::Equal => {
                        let span = Span::styled(text, Style::default().fg(theme.muted));
                        old_spans.push(span.clone());
                        new_spans.push(span);
                    }
                }
            }
        }
    }
    (old_spans, new_spans)
}

/// Unified diff of `before` → `after` as styled lines.
///
/// Consecutive removed/added line pairs get word-level emphasis; other
/// lines are syntax highlighted. Returns an empty Vec when nothing changed.
pub fn diff_lines(path: &str, before: &str, after: &str, theme: &Theme) -> Vec<Line<'static>> {
    let diff = TextDiff::from_lines(before, after);
    let mut out: Vec<Line<'static>> = Vec::new();
    let mut h = highlighter(path, theme);

    for group in diff.grouped_ops(DIFF_CONTEXT) {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };
        let old_range = first.old_range().start..last.old_range().end;
        let new_range = first.new_range().start..last.new_range().end;
        out.push(Line::from(Span::styled(
            format!(
                "@@ -{},{} +{},{} @@",
                old_range.start + 1,
                old_range.len(),
                new_range.start + 1,
                new_range.len()
            ),
            Style::default().fg(theme.diff_hunk_header),
        )));

        let mut pending_removed: Option<String> = None;
        for op in &group {
            for change in diff.iter_changes(op) {
                let code = change.value().trim_end_matches(['\n', '\r']).to_owned();
                match change.tag() {
                    ChangeTag::Delete => {
                        if let Some(prev) = pending_removed.take() {
                            out.push(removed_line(&prev, theme));
                        }
                        pending_removed = Some(code);
                    }
                    ChangeTag::Insert => match pending_removed.take() {
                        Some(old_code) => {
                            let (old_word, new_word) = word_diff_spans(&old_code, &code, theme);
                            let mut old_s =
                                vec![Span::styled("- ", Style::default().fg(theme.diff_removed))];
                            old_s.extend(old_word);
                            out.push(Line::from(old_s));
                            let mut new_s =
                                vec![Span::styled("+ ", Style::default().fg(theme.diff_added))];
                            new_s.extend(new_word);
                            out.push(Line::from(new_s));
                        }
                        None => {
                            let marker = Style::default().fg(theme.diff_added);
                            let mut s = vec![Span::styled("+ ", marker)];
                            s.extend(code_spans(&code, h.as_mut()));
                            out.push(Line::from(s));
                        }
                    },
                    ChangeTag::Equal => {
                        if let Some(prev) = pending_removed.take() {
                            out.push(removed_line(&prev, theme));
                        }
                        let mut s = vec![Span::styled("  ", Style::default().fg(theme.muted))];
                        s.extend(code_spans(&code, h.as_mut()));
                        out.push(Line::from(s));
                    }
                }
            }
        }
        if let Some(prev) = pending_removed.take() {
            out.push(removed_line(&prev, theme));
        }
    }
    out
}

fn removed_line(code: &str, theme: &Theme) -> Line<'static> {
    Line::from(vec![
        Span::styled("- ", Style::default().fg(theme.diff_removed)),
        Span::styled(code.to_owned(), Style::default().fg(theme.diff_removed)),
    ])
}

/// Extracts the file extension from a repository-relative path.
///
/// Returns "txt" if the path has no extension.
fn file_ext(path: &str) -> &str {
    match path.rsplit_once('.') {
        Some((_, ext)) if !ext.contains('/') => ext,
        _ => "txt",
    }
}
