//! Prompt widgets: key handling state machines and their rendered lines.
//!
//! Each prompt consumes [`PromptKey`]s and reports a [`Step`]. Rendering is a
//! pure function of the prompt state, so the terminal layer only has to draw
//! the lines and feed keys.

use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};

use super::Choice;
use crate::event::PromptKey;
use crate::theme::Theme;

/// Result of feeding one key to a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<T> {
    Continue,
    Submit(T),
    Cancel,
}

/// Single-choice list navigated with ↑/↓ or j/k.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectPrompt {
    pub cursor: usize,
    len: usize,
}

impl SelectPrompt {
    /// Starts on the first recommended choice, else the first choice.
    pub fn new(choices: &[Choice]) -> Self {
        Self {
            cursor: choices.iter().position(|c| c.recommended).unwrap_or(0),
            len: choices.len(),
        }
    }

    pub fn on_key(&mut self, key: PromptKey) -> Step<usize> {
        if self.len == 0 {
            return Step::Cancel;
        }
        match key {
            PromptKey::Up | PromptKey::Char('k') => {
                self.cursor = if self.cursor == 0 { self.len - 1 } else { self.cursor - 1 };
                Step::Continue
            }
            PromptKey::Down | PromptKey::Char('j') => {
                self.cursor = (self.cursor + 1) % self.len;
                Step::Continue
            }
            PromptKey::Home => {
                self.cursor = 0;
                Step::Continue
            }
            PromptKey::End => {
                self.cursor = self.len - 1;
                Step::Continue
            }
            PromptKey::Char(c @ '1'..='9') => {
                let index = c as usize - '1' as usize;
                if index < self.len {
                    Step::Submit(index)
                } else {
                    Step::Continue
                }
            }
            PromptKey::Enter => Step::Submit(self.cursor),
            PromptKey::Cancel => Step::Cancel,
            _ => Step::Continue,
        }
    }
}

/// Yes/no prompt; y/n answer directly, arrows toggle, Enter takes the highlighted answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmPrompt {
    pub value: bool,
}

impl ConfirmPrompt {
    pub fn new(default: bool) -> Self {
        Self { value: default }
    }

    pub fn on_key(&mut self, key: PromptKey) -> Step<bool> {
        match key {
            PromptKey::Char('y' | 'Y') => Step::Submit(true),
            PromptKey::Char('n' | 'N') => Step::Submit(false),
            PromptKey::Left | PromptKey::Right | PromptKey::Up | PromptKey::Down => {
                self.value = !self.value;
                Step::Continue
            }
            PromptKey::Enter => Step::Submit(self.value),
            PromptKey::Cancel => Step::Cancel,
            _ => Step::Continue,
        }
    }
}

/// Single-line text input with a movable cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextPrompt {
    pub buffer: String,
    /// Cursor position in chars, `0..=buffer.chars().count()`.
    pub cursor: usize,
}

impl TextPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.buffer
            .char_indices()
            .nth(char_index)
            .map(|(i, _)| i)
            .unwrap_or(self.buffer.len())
    }

    pub fn on_key(&mut self, key: PromptKey) -> Step<String> {
        let len = self.buffer.chars().count();
        match key {
            PromptKey::Char(c) => {
                let at = self.byte_index(self.cursor);
                self.buffer.insert(at, c);
                self.cursor += 1;
            }
            PromptKey::Backspace if self.cursor > 0 => {
                let at = self.byte_index(self.cursor - 1);
                self.buffer.remove(at);
                self.cursor -= 1;
            }
            PromptKey::Left => self.cursor = self.cursor.saturating_sub(1),
            PromptKey::Right => self.cursor = (self.cursor + 1).min(len),
            PromptKey::Home => self.cursor = 0,
            PromptKey::End => self.cursor = len,
            PromptKey::Enter => return Step::Submit(self.buffer.trim().to_owned()),
            PromptKey::Cancel => return Step::Cancel,
            _ => {}
        }
        Step::Continue
    }
}

fn question(message: &str, theme: &Theme) -> Vec<Span<'static>> {
    vec![
        Span::styled("? ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
        Span::styled(message.to_owned(), Style::default().add_modifier(Modifier::BOLD)),
    ]
}

/// Lines for a select prompt, windowed to at most `max_rows` rows.
pub fn select_lines(
    message: &str,
    choices: &[Choice],
    state: &SelectPrompt,
    max_rows: usize,
    theme: &Theme,
) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(question(message, theme))];
    let visible = max_rows.saturating_sub(2).max(1);
    let first = state.cursor.saturating_sub(visible - 1);

    for (i, choice) in choices.iter().enumerate().skip(first).take(visible) {
        let selected = i == state.cursor;
        let mut spans = Vec::new();
        if selected {
            spans.push(Span::styled("❯ ", Style::default().fg(theme.accent)));
        } else {
            spans.push(Span::raw("  "));
        }
        if choice.warning {
            spans.push(Span::styled("⚠ ", Style::default().fg(theme.warning)));
        }
        let label_style = if selected {
            Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        spans.push(Span::styled(choice.label.clone(), label_style));
        if choice.recommended {
            spans.push(Span::styled(" (recommended)", Style::default().fg(theme.recommended)));
        }
        if let Some(hint) = &choice.hint {
            let color = if choice.warning { theme.warning } else { theme.muted };
            spans.push(Span::styled(format!("  {hint}"), Style::default().fg(color)));
        }
        lines.push(Line::from(spans));
    }

    lines.push(Line::from(Span::styled(
        "↑/↓ move · enter select · esc cancel",
        Style::default().fg(theme.muted),
    )));
    lines
}

pub fn confirm_lines(message: &str, state: &ConfirmPrompt, theme: &Theme) -> Vec<Line<'static>> {
    let active = Style::default()
        .fg(theme.accent)
        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
    let inactive = Style::default().fg(theme.muted);
    let mut spans = question(message, theme);
    spans.push(Span::raw(" "));
    spans.push(Span::styled("Yes", if state.value { active } else { inactive }));
    spans.push(Span::styled(" / ", inactive));
    spans.push(Span::styled("No", if state.value { inactive } else { active }));
    vec![Line::from(spans)]
}

pub fn text_lines(
    message: &str,
    placeholder: &str,
    state: &TextPrompt,
    theme: &Theme,
) -> Vec<Line<'static>> {
    let mut spans = question(message, theme);
    spans.push(Span::raw(" "));
    if state.buffer.is_empty() {
        spans.push(Span::styled("█", Style::default().fg(theme.accent)));
        spans.push(Span::styled(placeholder.to_owned(), Style::default().fg(theme.muted)));
    } else {
        let at = state.byte_index(state.cursor);
        let (before, after) = state.buffer.split_at(at);
        spans.push(Span::raw(before.to_owned()));
        spans.push(Span::styled("█", Style::default().fg(theme.accent)));
        spans.push(Span::raw(after.to_owned()));
    }
    vec![Line::from(spans)]
}

/// The line left in the transcript once a prompt is answered.
pub fn answered_line(message: &str, answer: &str, theme: &Theme) -> Line<'static> {
    let mut spans = vec![
        Span::styled("✔ ", Style::default().fg(theme.success)),
        Span::styled(message.to_owned(), Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" "),
    ];
    spans.push(Span::styled(answer.to_owned(), Style::default().fg(theme.accent)));
    Line::from(spans)
}

pub fn cancelled_line(message: &str, theme: &Theme) -> Line<'static> {
    Line::from(vec![
        Span::styled("✖ ", Style::default().fg(theme.muted)),
        Span::styled(message.to_owned(), Style::default().fg(theme.muted)),
        Span::styled(" (cancelled)", Style::default().fg(theme.muted)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choices() -> Vec<Choice> {
        let mut list = vec![
            Choice::new("a", "Alpha"),
            Choice::new("b", "Beta"),
            Choice::new("c", "Gamma"),
        ];
        list[1].recommended = true;
        list
    }

    #[test]
    fn select_starts_on_recommended_and_wraps() {
        let list = choices();
        let mut prompt = SelectPrompt::new(&list);
        assert_eq!(prompt.cursor, 1);
        assert_eq!(prompt.on_key(PromptKey::Down), Step::Continue);
        assert_eq!(prompt.on_key(PromptKey::Char('j')), Step::Continue);
        assert_eq!(prompt.cursor, 0);
        assert_eq!(prompt.on_key(PromptKey::Char('k')), Step::Continue);
        assert_eq!(prompt.on_key(PromptKey::Enter), Step::Submit(2));
        assert_eq!(prompt.on_key(PromptKey::Char('1')), Step::Submit(0));
        assert_eq!(prompt.on_key(PromptKey::Char('9')), Step::Continue);
        assert_eq!(prompt.on_key(PromptKey::Cancel), Step::Cancel);
    }

    #[test]
    fn confirm_answers_directly_or_by_toggle() {
        let mut prompt = ConfirmPrompt::new(true);
        assert_eq!(prompt.on_key(PromptKey::Char('n')), Step::Submit(false));
        assert_eq!(prompt.on_key(PromptKey::Left), Step::Continue);
        assert_eq!(prompt.on_key(PromptKey::Enter), Step::Submit(false));
        assert_eq!(prompt.on_key(PromptKey::Cancel), Step::Cancel);
    }

    #[test]
    fn text_edits_at_cursor() {
        let mut prompt = TextPrompt::new();
        for c in "hllo".chars() {
            prompt.on_key(PromptKey::Char(c));
        }
        prompt.on_key(PromptKey::Home);
        prompt.on_key(PromptKey::Right);
        prompt.on_key(PromptKey::Char('e'));
        assert_eq!(prompt.buffer, "hello");
        prompt.on_key(PromptKey::End);
        prompt.on_key(PromptKey::Backspace);
        assert_eq!(prompt.on_key(PromptKey::Enter), Step::Submit("hell".to_owned()));
    }

    #[test]
    fn select_lines_mark_cursor_recommendation_and_warning() {
        let mut list = choices();
        list[2].warning = true;
        list[2].hint = Some("no context".into());
        let prompt = SelectPrompt::new(&list);
        let lines = select_lines("Next?", &list, &prompt, 10, &Theme::dark());
        let text: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
        assert_eq!(text.len(), 5);
        assert!(text[2].starts_with("❯ Beta (recommended)"));
        assert!(text[3].contains("⚠ Gamma  no context"));
    }

    #[test]
    fn select_lines_window_follows_cursor() {
        let list: Vec<Choice> =
            (0..8).map(|i| Choice::new(i.to_string(), format!("opt{i}"))).collect();
        let mut prompt = SelectPrompt::new(&list);
        for _ in 0..6 {
            prompt.on_key(PromptKey::Down);
        }
        let lines = select_lines("Pick", &list, &prompt, 5, &Theme::dark());
        let text: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
        assert_eq!(text.len(), 5);
        assert!(text[3].contains("opt6"));
    }
}
