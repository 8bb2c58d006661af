//! Interactive triage of pending comments, one at a time.
//!
//! Each comment moves Presenting → Deciding → a terminal decision. Decisions
//! are written to the store the moment they are made; quitting (or cancelling
//! the decision prompt) stops the whole session and leaves every undecided
//! comment pending.

use revflow_core::comments;
use revflow_core::patterns;
use revflow_core::types::{CommentStatus, CommentUpdate, StoredReviewComment};
use revflow_core::StoreError;
use tokio_rusqlite::Connection;

use super::HandleCommentsResult;
use crate::error::RevflowError;
use crate::fix::FixSession;
use crate::ui::{Choice, Ui};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Fix,
    Accept,
    Reject,
    Skip,
    CreateMemory,
    Quit,
}

impl Decision {
    fn as_str(self) -> &'static str {
        match self {
            Decision::Fix => "fix",
            Decision::Accept => "accept",
            Decision::Reject => "reject",
            Decision::Skip => "skip",
            Decision::CreateMemory => "create_memory",
            Decision::Quit => "quit",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        [
            Decision::Fix,
            Decision::Accept,
            Decision::Reject,
            Decision::Skip,
            Decision::CreateMemory,
            Decision::Quit,
        ]
        .into_iter()
        .find(|d| d.as_str() == value)
    }
}

fn decision_choices(memory_used: bool) -> Vec<Choice> {
    let mut choices = vec![
        Choice::new(Decision::Fix.as_str(), "Fix").with_hint("Let the agent change the code"),
        Choice::new(Decision::Accept.as_str(), "Accept").with_hint("Keep it for the pull request"),
        Choice::new(Decision::Reject.as_str(), "Reject").with_hint("Not a real problem"),
        Choice::new(Decision::Skip.as_str(), "Skip").with_hint("Decide later"),
    ];
    if !memory_used {
        choices.push(
            Choice::new(Decision::CreateMemory.as_str(), "Remember as a pattern")
                .with_hint("Feed this convention into future reviews"),
        );
    }
    choices.push(
        Choice::new(Decision::Quit.as_str(), "Quit").with_hint("Stop, leave the rest pending"),
    );
    choices
}

/// Whether the session goes on to the next comment.
enum Flow {
    Next,
    Quit,
}

/// Collaborators a triage session talks to.
pub struct Triage<'a> {
    pub conn: &'a Connection,
    pub ui: &'a dyn Ui,
    pub fixer: &'a dyn FixSession,
    pub pr_key: &'a str,
}

impl Triage<'_> {
    /// Walks every pending comment in list order, tallying into `summary`.
    ///
    /// `summary` holds the partial tally when this returns early, whether by
    /// quitting or by error.
    ///
    /// # Errors
    ///
    /// Store failures, including `NotFound` for a comment that vanished
    /// mid-session, end the session and are returned as is.
    pub async fn run(&self, summary: &mut HandleCommentsResult) -> Result<(), RevflowError> {
        let pending: Vec<StoredReviewComment> = comments::get_comments(self.conn, self.pr_key)
            .await?
            .into_iter()
            .filter(|c| c.status == CommentStatus::Pending)
            .collect();
        let total = pending.len();
        tracing::info!(pr = %self.pr_key, total, "triage started");

        for (i, comment) in pending.iter().enumerate() {
            match self.triage_comment(comment, i + 1, total, summary).await? {
                Flow::Next => {}
                Flow::Quit => {
                    tracing::info!(pr = %self.pr_key, decided = i, total, "triage stopped early");
                    break;
                }
            }
        }
        Ok(())
    }

    async fn triage_comment(
        &self,
        comment: &StoredReviewComment,
        index: usize,
        total: usize,
        summary: &mut HandleCommentsResult,
    ) -> Result<Flow, RevflowError> {
        self.ui.show_comment(comment, index, total);
        let mut memory_used = comment.memory_created;

        loop {
            let choices = decision_choices(memory_used);
            let picked = self.ui.select("What should happen with this comment?", &choices).await;
            let decision = picked.as_deref().and_then(Decision::parse).unwrap_or(Decision::Quit);
            tracing::debug!(comment = %comment.id, ?decision, "triage decision");

            match decision {
                Decision::Accept => {
                    self.set_status(comment, CommentStatus::Accepted).await?;
                    summary.accepted += 1;
                }
                Decision::Reject => {
                    self.set_status(comment, CommentStatus::Rejected).await?;
                    summary.rejected += 1;
                }
                Decision::Skip => summary.skipped += 1,
                Decision::Fix => {
                    let Some(notes) = self
                        .ui
                        .text("Notes for the fix (optional)", "press Enter to skip")
                        .await
                    else {
                        continue;
                    };
                    let notes = Some(notes.trim()).filter(|n| !n.is_empty());
                    self.fixer.run_fix_session(comment, self.pr_key, notes, summary).await?;
                    if self.current_status(comment).await? == CommentStatus::Pending {
                        summary.skipped += 1;
                    }
                }
                Decision::CreateMemory => {
                    if self.create_memory(comment).await? {
                        memory_used = true;
                    }
                    continue;
                }
                Decision::Quit => return Ok(Flow::Quit),
            }
            summary.processed += 1;
            return Ok(Flow::Next);
        }
    }

    /// Saves a review pattern. Returns false when the operator cancelled.
    async fn create_memory(&self, comment: &StoredReviewComment) -> Result<bool, RevflowError> {
        let Some(text) = self.ui.text("Pattern to remember", &comment.message).await else {
            return Ok(false);
        };
        let pattern = if text.trim().is_empty() { comment.message.as_str() } else { text.trim() };
        patterns::save_pattern(self.conn, self.pr_key, comment, pattern).await?;
        let update = CommentUpdate::memory_created();
        comments::update_comment(self.conn, self.pr_key, &comment.id, update).await?;
        self.ui.success("Pattern saved for future reviews");
        Ok(true)
    }

    async fn set_status(
        &self,
        comment: &StoredReviewComment,
        status: CommentStatus,
    ) -> Result<(), RevflowError> {
        let update = CommentUpdate::status(status);
        comments::update_comment(self.conn, self.pr_key, &comment.id, update).await?;
        Ok(())
    }

    async fn current_status(
        &self,
        comment: &StoredReviewComment,
    ) -> Result<CommentStatus, RevflowError> {
        let stored = comments::get_comment(self.conn, self.pr_key, &comment.id).await?;
        let missing = || StoreError::NotFound {
            pr_key: self.pr_key.to_owned(),
            id: comment.id.clone(),
        };
        Ok(stored.ok_or_else(missing)?.status)
    }
}
