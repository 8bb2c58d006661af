//! The review workflow: state detection, the action menu, action execution,
//! follow-up advice and the loop that ties them together.
//!
//! Nothing here caches workflow state. Every iteration re-derives it from the
//! database and the live pull request, so an interrupted session resumes where
//! the persisted data says it is.

pub mod advisor;
pub mod catalog;
pub mod executor;
pub mod orchestrator;
pub mod state;
pub mod triage;

use std::fmt;
use std::str::FromStr;

use revflow_core::types::ContextMeta;

pub use advisor::Advice;
pub(crate) use catalog::count_noun;
pub use executor::ActionExecutor;
pub use orchestrator::Orchestrator;
pub use state::detect_state;

/// The closed set of things the operator can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowAction {
    GatherContext,
    RefreshContext,
    RunReview,
    HandlePending,
    SendAccepted,
    HandleRemote,
    Exit,
}

impl WorkflowAction {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowAction::GatherContext => "gather_context",
            WorkflowAction::RefreshContext => "refresh_context",
            WorkflowAction::RunReview => "run_review",
            WorkflowAction::HandlePending => "handle_pending",
            WorkflowAction::SendAccepted => "send_accepted",
            WorkflowAction::HandleRemote => "handle_remote",
            WorkflowAction::Exit => "exit",
        }
    }
}

impl fmt::Display for WorkflowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gather_context" => Ok(WorkflowAction::GatherContext),
            "refresh_context" => Ok(WorkflowAction::RefreshContext),
            "run_review" => Ok(WorkflowAction::RunReview),
            "handle_pending" => Ok(WorkflowAction::HandlePending),
            "send_accepted" => Ok(WorkflowAction::SendAccepted),
            "handle_remote" => Ok(WorkflowAction::HandleRemote),
            "exit" => Ok(WorkflowAction::Exit),
            other => Err(format!("unknown workflow action '{other}'")),
        }
    }
}

/// Snapshot of where a pull request's review stands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowState {
    pub has_context: bool,
    /// Context exists and was gathered at the PR's current source commit.
    pub context_up_to_date: bool,
    pub context_meta: Option<ContextMeta>,
    pub has_comments: bool,
    pub pending_count: usize,
    pub accepted_count: usize,
    pub fixed_count: usize,
    pub rejected_count: usize,
    /// Reserved for syncing comments already on the server. Always false.
    pub has_remote_comments: bool,
    pub remote_comments_count: usize,
    pub current_commit: String,
    /// Context metadata exists and names a different commit.
    pub has_new_commits: bool,
}

impl WorkflowState {
    pub fn total_comments(&self) -> usize {
        self.pending_count + self.accepted_count + self.fixed_count + self.rejected_count
    }
}

/// One rendered entry of the main menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuOption {
    pub value: WorkflowAction,
    pub label: String,
    pub hint: Option<String>,
    pub recommended: bool,
    pub warning_hint: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReviewResult {
    /// Pending comments for the PR after the merge.
    pub comments_created: usize,
    pub has_errors: bool,
}

/// Tally of one triage session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandleCommentsResult {
    pub processed: usize,
    pub fixed: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub skipped: usize,
}

/// What an executed action produced, handed to the advisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    ContextGathered,
    ReviewCompleted(ReviewResult),
    PendingHandled(HandleCommentsResult),
    AcceptedSent(usize),
    Nothing,
}
