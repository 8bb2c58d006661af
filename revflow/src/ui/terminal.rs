//! Interactive [`Ui`] on an inline ratatui viewport.
//!
//! Prompts are drawn inside the viewport. Messages are inserted above it, so
//! they scroll into the normal terminal history like ordinary output.

use std::sync::Mutex;

use async_trait::async_trait;
use ratatui::text::Line;
use ratatui::widgets::{Paragraph, Widget, Wrap};
use revflow_core::types::StoredReviewComment;

use super::prompt::{self, ConfirmPrompt, SelectPrompt, Step, TextPrompt};
use super::present::{self, Tone};
use super::{highlight, Choice, Ui};
use crate::agent::AgentActivity;
use crate::event::KeyReader;
use crate::provider::PullRequest;
use crate::theme::Theme;
use crate::tui::{self, RawMode, Tui};
use crate::workflow::WorkflowState;

/// Rows reserved for prompts at the bottom of the screen.
const VIEWPORT_HEIGHT: u16 = 10;

pub struct TerminalUi {
    terminal: Mutex<Tui>,
    keys: tokio::sync::Mutex<KeyReader>,
    theme: Theme,
}

impl TerminalUi {
    /// # Errors
    ///
    /// Returns `Err` if the terminal cannot be queried.
    pub fn new(theme: Theme) -> std::io::Result<Self> {
        Ok(Self {
            terminal: Mutex::new(tui::init_inline(VIEWPORT_HEIGHT)?),
            keys: tokio::sync::Mutex::new(KeyReader::new()),
            theme,
        })
    }

    /// Replaces the viewport contents with `lines`.
    fn draw(&self, lines: Vec<Line<'static>>) {
        let Ok(mut terminal) = self.terminal.lock() else {
            return;
        };
        let _ = terminal.draw(|frame| {
            frame.render_widget(Paragraph::new(lines), frame.area());
        });
    }

    /// Appends `lines` to the transcript above the viewport.
    fn print(&self, lines: Vec<Line<'static>>) {
        if lines.is_empty() {
            return;
        }
        let Ok(mut terminal) = self.terminal.lock() else {
            return;
        };
        let width = terminal.size().map(|s| s.width).unwrap_or(80).max(1);
        let height = wrapped_height(&lines, width);
        let _ = terminal.insert_before(height, |buf| {
            Paragraph::new(lines).wrap(Wrap { trim: false }).render(buf.area, buf);
        });
    }

    fn finish_prompt(&self, line: Line<'static>) {
        self.draw(Vec::new());
        self.print(vec![line]);
    }

    fn max_rows(&self) -> usize {
        VIEWPORT_HEIGHT as usize
    }
}

impl Drop for TerminalUi {
    fn drop(&mut self) {
        if let Ok(mut terminal) = self.terminal.lock() {
            let _ = terminal.clear();
        }
        let _ = tui::restore_tui();
    }
}

/// Rows `lines` occupy once wrapped to `width` columns.
fn wrapped_height(lines: &[Line<'_>], width: u16) -> u16 {
    let width = width as usize;
    let rows: usize = lines
        .iter()
        .map(|line| line.width().max(1).div_ceil(width))
        .sum();
    rows.min(u16::MAX as usize) as u16
}

#[async_trait]
impl Ui for TerminalUi {
    async fn select(&self, message: &str, choices: &[Choice]) -> Option<String> {
        if choices.is_empty() {
            return None;
        }
        let mut keys = self.keys.lock().await;
        let _raw = RawMode::enable().ok()?;
        let mut state = SelectPrompt::new(choices);
        loop {
            self.draw(prompt::select_lines(message, choices, &state, self.max_rows(), &self.theme));
            let Some(key) = keys.next_key().await else {
                self.finish_prompt(prompt::cancelled_line(message, &self.theme));
                return None;
            };
            match state.on_key(key) {
                Step::Continue => {}
                Step::Submit(i) => {
                    let choice = &choices[i];
                    self.finish_prompt(prompt::answered_line(message, &choice.label, &self.theme));
                    return Some(choice.value.clone());
                }
                Step::Cancel => {
                    self.finish_prompt(prompt::cancelled_line(message, &self.theme));
                    return None;
                }
            }
        }
    }

    async fn confirm(&self, message: &str, default: bool) -> Option<bool> {
        let mut keys = self.keys.lock().await;
        let _raw = RawMode::enable().ok()?;
        let mut state = ConfirmPrompt::new(default);
        loop {
            self.draw(prompt::confirm_lines(message, &state, &self.theme));
            let Some(key) = keys.next_key().await else {
                self.finish_prompt(prompt::cancelled_line(message, &self.theme));
                return None;
            };
            match state.on_key(key) {
                Step::Continue => {}
                Step::Submit(answer) => {
                    let label = if answer { "Yes" } else { "No" };
                    self.finish_prompt(prompt::answered_line(message, label, &self.theme));
                    return Some(answer);
                }
                Step::Cancel => {
                    self.finish_prompt(prompt::cancelled_line(message, &self.theme));
                    return None;
                }
            }
        }
    }

    async fn text(&self, message: &str, placeholder: &str) -> Option<String> {
        let mut keys = self.keys.lock().await;
        let _raw = RawMode::enable().ok()?;
        let mut state = TextPrompt::new();
        loop {
            self.draw(prompt::text_lines(message, placeholder, &state, &self.theme));
            let Some(key) = keys.next_key().await else {
                self.finish_prompt(prompt::cancelled_line(message, &self.theme));
                return None;
            };
            match state.on_key(key) {
                Step::Continue => {}
                Step::Submit(answer) => {
                    self.finish_prompt(prompt::answered_line(message, &answer, &self.theme));
                    return Some(answer);
                }
                Step::Cancel => {
                    self.finish_prompt(prompt::cancelled_line(message, &self.theme));
                    return None;
                }
            }
        }
    }

    fn info(&self, message: &str) {
        self.print(vec![present::message_line(Tone::Info, message, &self.theme)]);
    }

    fn success(&self, message: &str) {
        self.print(vec![present::message_line(Tone::Success, message, &self.theme)]);
    }

    fn warn(&self, message: &str) {
        self.print(vec![present::message_line(Tone::Warn, message, &self.theme)]);
    }

    fn error(&self, message: &str) {
        self.print(vec![present::message_line(Tone::Error, message, &self.theme)]);
    }

    fn agent_activity(&self, activity: &AgentActivity) {
        self.print(vec![present::activity_line(activity, &self.theme)]);
    }

    fn show_state(&self, pr: &PullRequest, state: &WorkflowState) {
        self.print(present::state_lines(pr, state, &self.theme));
    }

    fn show_comment(&self, comment: &StoredReviewComment, index: usize, total: usize) {
        self.print(present::comment_lines(comment, index, total, &self.theme));
    }

    fn show_diff(&self, path: &str, before: &str, after: &str) {
        let mut lines = vec![Line::from(format!("{path}:"))];
        lines.extend(highlight::diff_lines(path, before, after, &self.theme));
        self.print(lines);
    }

    fn show_summary(&self, title: &str, rows: &[(&str, usize)]) {
        self.print(present::summary_lines(title, rows, &self.theme));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_height_counts_wrapped_rows() {
        let lines = vec![Line::from("x".repeat(25)), Line::default(), Line::from("short")];
        assert_eq!(wrapped_height(&lines, 10), 3 + 1 + 1);
        assert_eq!(wrapped_height(&lines, 80), 3);
    }
}
