//! Post-action advice: chain straight into the next logical action, or go
//! back to the menu.
//!
//! Every question here is a plain yes/no (or a short choice). A cancelled
//! prompt counts as "no".

use super::catalog::count_noun;
use super::{ActionOutcome, HandleCommentsResult, ReviewResult, WorkflowAction, WorkflowState};
use crate::ui::{Choice, Ui};

const MENU: &str = "menu";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advice {
    /// Run this action next without showing the menu.
    Chain(WorkflowAction),
    ShowMenu,
}

/// Dispatches on what the executed action produced.
pub async fn advise(ui: &dyn Ui, outcome: &ActionOutcome, state: &WorkflowState) -> Advice {
    match outcome {
        ActionOutcome::ContextGathered => after_context_gathered(ui, state).await,
        ActionOutcome::ReviewCompleted(result) => after_review_completed(ui, result, state).await,
        ActionOutcome::PendingHandled(result) => after_pending_handled(ui, result, state).await,
        ActionOutcome::AcceptedSent(_) => after_accepted_sent(),
        ActionOutcome::Nothing => Advice::ShowMenu,
    }
}

pub async fn after_context_gathered(ui: &dyn Ui, state: &WorkflowState) -> Advice {
    if state.pending_count == 0 {
        return match ui.confirm("Run the review now?", true).await {
            Some(true) => Advice::Chain(WorkflowAction::RunReview),
            _ => Advice::ShowMenu,
        };
    }

    let choices = [
        Choice::new(
            WorkflowAction::HandlePending.as_str(),
            format!(
                "Handle {}",
                count_noun(state.pending_count, "pending comment", "pending comments")
            ),
        ),
        Choice::new(
            WorkflowAction::RunReview.as_str(),
            "Run the review again with the new context",
        ),
        Choice::new(MENU, "Back to the menu"),
    ];
    match ui.select("Context saved. What next?", &choices).await.as_deref() {
        Some("handle_pending") => Advice::Chain(WorkflowAction::HandlePending),
        Some("run_review") => Advice::Chain(WorkflowAction::RunReview),
        _ => Advice::ShowMenu,
    }
}

pub async fn after_review_completed(
    ui: &dyn Ui,
    result: &ReviewResult,
    state: &WorkflowState,
) -> Advice {
    if result.has_errors || result.comments_created == 0 {
        return Advice::ShowMenu;
    }
    if state.pending_count == 0 {
        return Advice::ShowMenu;
    }
    let question = format!(
        "Handle {} now?",
        count_noun(state.pending_count, "pending comment", "pending comments")
    );
    match ui.confirm(&question, true).await {
        Some(true) => Advice::Chain(WorkflowAction::HandlePending),
        _ => Advice::ShowMenu,
    }
}

pub async fn after_pending_handled(
    ui: &dyn Ui,
    _result: &HandleCommentsResult,
    state: &WorkflowState,
) -> Advice {
    if state.accepted_count == 0 {
        return Advice::ShowMenu;
    }
    let question = format!(
        "Send {} now?",
        count_noun(state.accepted_count, "accepted comment", "accepted comments")
    );
    match ui.confirm(&question, false).await {
        Some(true) => Advice::Chain(WorkflowAction::SendAccepted),
        _ => Advice::ShowMenu,
    }
}

/// Sending closes a cycle; there is nothing to chain into.
pub fn after_accepted_sent() -> Advice {
    Advice::ShowMenu
}
