//! Which actions are legal in a state, and how the menu presents them.
//!
//! Both functions are pure: same state in, same menu out.

use super::{MenuOption, WorkflowAction, WorkflowState};

const WARNING_GLYPH: &str = "⚠";

/// Legal actions for `state`, in menu order. `exit` is always last.
pub fn available_actions(state: &WorkflowState) -> Vec<WorkflowAction> {
    let mut actions = Vec::with_capacity(7);
    if !state.has_context {
        actions.push(WorkflowAction::GatherContext);
    }
    if state.has_context && !state.context_up_to_date {
        actions.push(WorkflowAction::RefreshContext);
    }
    actions.push(WorkflowAction::RunReview);
    if state.pending_count > 0 {
        actions.push(WorkflowAction::HandlePending);
    }
    if state.accepted_count > 0 {
        actions.push(WorkflowAction::SendAccepted);
    }
    if state.has_remote_comments {
        actions.push(WorkflowAction::HandleRemote);
    }
    actions.push(WorkflowAction::Exit);
    actions
}

/// `1 file`, `3 files`.
pub(crate) fn count_noun(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{count} {singular}")
    } else {
        format!("{count} {plural}")
    }
}

fn short_commit(commit: &str) -> &str {
    &commit[..8.min(commit.len())]
}

/// Renders `actions` as annotated menu options.
pub fn menu_options(state: &WorkflowState, actions: &[WorkflowAction]) -> Vec<MenuOption> {
    actions.iter().map(|&action| menu_option(state, action)).collect()
}

fn menu_option(state: &WorkflowState, action: WorkflowAction) -> MenuOption {
    let plain = |label: String, hint: Option<String>| MenuOption {
        value: action,
        label,
        hint,
        recommended: false,
        warning_hint: None,
    };

    match action {
        WorkflowAction::GatherContext => MenuOption {
            recommended: true,
            ..plain(
                "Gather context".to_owned(),
                Some("Collect tickets and design notes behind this change".to_owned()),
            )
        },
        WorkflowAction::RefreshContext => {
            let hint = match &state.context_meta {
                Some(meta) => format!(
                    "Context is from {}, the branch is now at {}",
                    short_commit(&meta.gathered_from_commit),
                    short_commit(&state.current_commit)
                ),
                None => "Stored context has no commit record".to_owned(),
            };
            plain("Refresh context".to_owned(), Some(hint))
        }
        WorkflowAction::RunReview => {
            let label = if state.has_comments {
                "Run review (merge with existing)".to_owned()
            } else {
                "Run review".to_owned()
            };
            let recommended = state.has_context && state.context_up_to_date && !state.has_comments;
            if state.has_context {
                MenuOption {
                    recommended,
                    ..plain(label, Some("Static review of the diff by the agent".to_owned()))
                }
            } else {
                let warning = "No context gathered, review will rely on the diff alone".to_owned();
                MenuOption {
                    recommended,
                    warning_hint: Some(warning.clone()),
                    ..plain(label, Some(format!("{WARNING_GLYPH} {warning}")))
                }
            }
        }
        WorkflowAction::HandlePending => MenuOption {
            recommended: state.pending_count > 0,
            ..plain(
                format!(
                    "Handle {}",
                    count_noun(state.pending_count, "pending comment", "pending comments")
                ),
                Some("Fix, accept, reject or skip each one".to_owned()),
            )
        },
        WorkflowAction::SendAccepted => MenuOption {
            recommended: state.accepted_count > 0 && state.pending_count == 0,
            ..plain(
                format!(
                    "Send {}",
                    count_noun(state.accepted_count, "accepted comment", "accepted comments")
                ),
                Some("Post them to the pull request as one review".to_owned()),
            )
        },
        WorkflowAction::HandleRemote => plain(
            format!(
                "Handle {}",
                count_noun(state.remote_comments_count, "remote comment", "remote comments")
            ),
            None,
        ),
        WorkflowAction::Exit => plain("Exit".to_owned(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revflow_core::types::ContextMeta;

    fn option(options: &[MenuOption], action: WorkflowAction) -> &MenuOption {
        options.iter().find(|o| o.value == action).unwrap()
    }

    fn with_context(commit: &str, current: &str) -> WorkflowState {
        WorkflowState {
            has_context: true,
            context_up_to_date: commit == current,
            context_meta: Some(ContextMeta { gathered_at: 1, gathered_from_commit: commit.into() }),
            current_commit: current.into(),
            has_new_commits: commit != current,
            ..WorkflowState::default()
        }
    }

    #[test]
    fn availability_tracks_counts() {
        for pending in 0..3 {
            for accepted in 0..3 {
                let state = WorkflowState {
                    pending_count: pending,
                    accepted_count: accepted,
                    has_comments: pending + accepted > 0,
                    ..with_context("abc", "abc")
                };
                let actions = available_actions(&state);
                assert_eq!(actions.contains(&WorkflowAction::HandlePending), pending > 0);
                assert_eq!(actions.contains(&WorkflowAction::SendAccepted), accepted > 0);
                assert_eq!(actions.first(), Some(&WorkflowAction::RunReview));
                assert_eq!(actions.last(), Some(&WorkflowAction::Exit));
            }
        }
    }

    #[test]
    fn gather_and_refresh_are_exclusive() {
        let states = [
            WorkflowState::default(),
            with_context("abc", "abc"),
            with_context("old1", "new2"),
            WorkflowState { has_context: true, ..WorkflowState::default() },
        ];
        for state in &states {
            let actions = available_actions(state);
            assert!(
                !(actions.contains(&WorkflowAction::GatherContext)
                    && actions.contains(&WorkflowAction::RefreshContext)),
                "{state:?}"
            );
        }
    }

    #[test]
    fn full_order_is_fixed() {
        let state = WorkflowState {
            pending_count: 1,
            accepted_count: 1,
            has_comments: true,
            has_remote_comments: true,
            remote_comments_count: 2,
            ..with_context("old1", "new2")
        };
        assert_eq!(
            available_actions(&state),
            vec![
                WorkflowAction::RefreshContext,
                WorkflowAction::RunReview,
                WorkflowAction::HandlePending,
                WorkflowAction::SendAccepted,
                WorkflowAction::HandleRemote,
                WorkflowAction::Exit,
            ]
        );
    }

    #[test]
    fn clean_start_recommends_gathering_and_warns_on_review() {
        let state = WorkflowState::default();
        let options = menu_options(&state, &available_actions(&state));

        let gather = option(&options, WorkflowAction::GatherContext);
        assert!(gather.recommended);

        let review = option(&options, WorkflowAction::RunReview);
        assert!(!review.recommended);
        assert!(review.warning_hint.is_some());
        assert!(review.hint.as_deref().unwrap().starts_with('⚠'));
        assert_eq!(review.label, "Run review");

        let exit = option(&options, WorkflowAction::Exit);
        assert!(!exit.recommended && exit.warning_hint.is_none() && exit.hint.is_none());
    }

    #[test]
    fn refresh_hint_names_stale_commit() {
        let state = with_context("0123456789abcdef", "fedcba9876543210");
        let options = menu_options(&state, &available_actions(&state));
        let refresh = option(&options, WorkflowAction::RefreshContext);
        assert!(!refresh.recommended);
        assert!(refresh.hint.as_deref().unwrap().contains("01234567"));
        assert!(!refresh.hint.as_deref().unwrap().contains("012345678"));
    }

    #[test]
    fn review_recommended_only_on_clean_ready_pr() {
        let ready = with_context("abc", "abc");
        let options = menu_options(&ready, &available_actions(&ready));
        assert!(option(&options, WorkflowAction::RunReview).recommended);

        let reviewed = WorkflowState { has_comments: true, fixed_count: 1, ..ready.clone() };
        let options = menu_options(&reviewed, &available_actions(&reviewed));
        let review = option(&options, WorkflowAction::RunReview);
        assert!(!review.recommended);
        assert_eq!(review.label, "Run review (merge with existing)");

        let stale = with_context("old1", "new2");
        let options = menu_options(&stale, &available_actions(&stale));
        assert!(!option(&options, WorkflowAction::RunReview).recommended);
    }

    #[test]
    fn counts_use_singular_and_plural() {
        let state = WorkflowState {
            pending_count: 1,
            accepted_count: 3,
            has_comments: true,
            ..with_context("abc", "abc")
        };
        let options = menu_options(&state, &available_actions(&state));
        let pending = option(&options, WorkflowAction::HandlePending);
        assert_eq!(pending.label, "Handle 1 pending comment");
        assert!(pending.recommended);
        let send = option(&options, WorkflowAction::SendAccepted);
        assert_eq!(send.label, "Send 3 accepted comments");
        assert!(!send.recommended);

        let drained = WorkflowState { pending_count: 0, ..state };
        let options = menu_options(&drained, &available_actions(&drained));
        assert!(option(&options, WorkflowAction::SendAccepted).recommended);
    }
}
