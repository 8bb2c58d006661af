//! Operator interaction.
//!
//! The workflow asks questions and reports progress through the [`Ui`] trait.
//! [`terminal::TerminalUi`] is the interactive implementation; tests use a
//! scripted double.

pub mod highlight;
pub mod present;
pub mod prompt;
pub mod terminal;

use async_trait::async_trait;
use revflow_core::types::StoredReviewComment;

use crate::agent::AgentActivity;
use crate::provider::PullRequest;
use crate::workflow::{MenuOption, WorkflowState};

pub use terminal::TerminalUi;

/// One entry of a single-choice prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    /// Returned by [`Ui::select`] when this entry is picked.
    pub value: String,
    pub label: String,
    pub hint: Option<String>,
    pub recommended: bool,
    pub warning: bool,
}

impl Choice {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            hint: None,
            recommended: false,
            warning: false,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<&MenuOption> for Choice {
    fn from(option: &MenuOption) -> Self {
        Self {
            value: option.value.as_str().to_owned(),
            label: option.label.clone(),
            hint: option.hint.clone(),
            recommended: option.recommended,
            warning: option.warning_hint.is_some(),
        }
    }
}

/// Ask-user and tell-user capability.
///
/// Every prompt returns `None` when the operator cancels it. Cancellation is
/// never an error; callers treat it as the safest non-destructive answer.
#[async_trait]
pub trait Ui: Send + Sync {
    /// Single-choice menu. Returns the picked [`Choice::value`].
    async fn select(&self, message: &str, choices: &[Choice]) -> Option<String>;

    /// Yes/no question with a default for a bare Enter.
    async fn confirm(&self, message: &str, default: bool) -> Option<bool>;

    /// Free-text answer. An empty answer is `Some("")`, not a cancellation.
    async fn text(&self, message: &str, placeholder: &str) -> Option<String>;

    fn info(&self, message: &str);
    fn success(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);

    fn agent_activity(&self, activity: &AgentActivity);

    fn show_state(&self, pr: &PullRequest, state: &WorkflowState);

    /// Renders comment `index` (1-based) of `total` with its code context.
    fn show_comment(&self, comment: &StoredReviewComment, index: usize, total: usize);

    /// Renders the change a fix made to `path`.
    fn show_diff(&self, path: &str, before: &str, after: &str);

    fn show_summary(&self, title: &str, rows: &[(&str, usize)]);
}
