//! Keyboard input for prompts.
//!
//! Crossterm key events are normalised into [`PromptKey`] so the prompt state
//! machines in `ui::prompt` never see terminal details and can be tested with
//! plain values.

use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;

/// A key as understood by the prompt widgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKey {
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    Enter,
    Backspace,
    /// Esc or Ctrl-C.
    Cancel,
    Char(char),
    Other,
}

/// Maps a crossterm key event onto a [`PromptKey`].
pub fn classify(key: KeyEvent) -> PromptKey {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') | KeyCode::Char('d') => PromptKey::Cancel,
            KeyCode::Char('a') => PromptKey::Home,
            KeyCode::Char('e') => PromptKey::End,
            _ => PromptKey::Other,
        };
    }
    match key.code {
        KeyCode::Up => PromptKey::Up,
        KeyCode::Down => PromptKey::Down,
        KeyCode::Left => PromptKey::Left,
        KeyCode::Right => PromptKey::Right,
        KeyCode::Home => PromptKey::Home,
        KeyCode::End => PromptKey::End,
        KeyCode::Enter => PromptKey::Enter,
        KeyCode::Backspace => PromptKey::Backspace,
        KeyCode::Esc => PromptKey::Cancel,
        KeyCode::Char(c) => PromptKey::Char(c),
        _ => PromptKey::Other,
    }
}

/// Async source of prompt keys backed by crossterm's `EventStream`.
pub struct KeyReader {
    stream: EventStream,
}

impl KeyReader {
    pub fn new() -> Self {
        Self { stream: EventStream::new() }
    }

    /// Waits for the next key press. `None` when the input stream has ended or failed.
    ///
    /// Release and repeat events are skipped; Windows reports both press and
    /// release for every keystroke.
    pub async fn next_key(&mut self) -> Option<PromptKey> {
        loop {
            match self.stream.next().await? {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    return Some(classify(key));
                }
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "terminal input failed");
                    return None;
                }
            }
        }
    }
}

impl Default for KeyReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ctrl_c_and_esc_cancel() {
        assert_eq!(
            classify(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            PromptKey::Cancel
        );
        assert_eq!(classify(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)), PromptKey::Cancel);
    }

    #[test]
    fn plain_chars_pass_through() {
        assert_eq!(
            classify(KeyEvent::new(KeyCode::Char('j'), KeyModifiers::NONE)),
            PromptKey::Char('j')
        );
        assert_eq!(
            classify(KeyEvent::new(KeyCode::Char('J'), KeyModifiers::SHIFT)),
            PromptKey::Char('J')
        );
    }
}
