//! Derives [`WorkflowState`] from the database and the live pull request.

use revflow_core::types::CommentStatus;
use revflow_core::{comments, context, StoreError};
use tokio_rusqlite::Connection;

use super::WorkflowState;
use crate::provider::PullRequest;

/// Computes the workflow state for `pr`.
///
/// Absent context or comments are valid states, not errors. Reads only; safe
/// to call as often as needed.
///
/// # Errors
///
/// Returns `StoreError::Db` when the database cannot be read.
pub async fn detect_state(
    conn: &Connection,
    pr: &PullRequest,
) -> Result<WorkflowState, StoreError> {
    let key = pr.key();
    let current_commit = pr.source.commit_hash.clone();

    let has_context = context::has_context(conn, &key).await?;
    let context_meta = if has_context {
        context::get_context_metadata(conn, &key).await?
    } else {
        None
    };
    let context_up_to_date = context_meta
        .as_ref()
        .is_some_and(|meta| meta.gathered_from_commit == current_commit);
    let has_new_commits = context_meta
        .as_ref()
        .is_some_and(|meta| meta.gathered_from_commit != current_commit);

    let mut state = WorkflowState {
        has_context,
        context_up_to_date,
        context_meta,
        current_commit,
        has_new_commits,
        ..WorkflowState::default()
    };

    for comment in comments::get_comments(conn, &key).await? {
        match comment.status {
            CommentStatus::Pending => state.pending_count += 1,
            CommentStatus::Accepted => state.accepted_count += 1,
            CommentStatus::Fixed => state.fixed_count += 1,
            CommentStatus::Rejected => state.rejected_count += 1,
        }
    }
    state.has_comments = state.total_comments() > 0;

    tracing::debug!(pr = %key, ?state, "detected workflow state");
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{open_test_db, pr_at};
    use crate::workflow::catalog::available_actions;
    use crate::workflow::WorkflowAction;
    use revflow_core::types::{CommentUpdate, NewContext, ReviewComment, Severity};

    fn new_context(commit: &str) -> NewContext {
        NewContext {
            source_branch: "feature".into(),
            target_branch: "main".into(),
            source_commit: commit.into(),
            context: "ticket".into(),
        }
    }

    #[tokio::test]
    async fn clean_start_has_nothing() {
        let (_dir, conn) = open_test_db().await;
        let state = detect_state(&conn, &pr_at("abc")).await.unwrap();

        assert!(!state.has_context);
        assert!(!state.has_comments);
        assert_eq!(state.pending_count, 0);
        assert!(!state.has_new_commits);
        assert_eq!(
            available_actions(&state),
            vec![WorkflowAction::GatherContext, WorkflowAction::RunReview, WorkflowAction::Exit]
        );
    }

    #[tokio::test]
    async fn stale_context_offers_refresh() {
        let (_dir, conn) = open_test_db().await;
        let pr = pr_at("new2");
        context::set_context(&conn, &pr.key(), new_context("old1")).await.unwrap();

        let state = detect_state(&conn, &pr).await.unwrap();
        assert!(state.has_context);
        assert!(!state.context_up_to_date);
        assert!(state.has_new_commits);

        let actions = available_actions(&state);
        assert!(actions.contains(&WorkflowAction::RefreshContext));
        assert!(!actions.contains(&WorkflowAction::GatherContext));
    }

    #[tokio::test]
    async fn current_context_is_up_to_date() {
        let (_dir, conn) = open_test_db().await;
        let pr = pr_at("abc");
        context::set_context(&conn, &pr.key(), new_context("abc")).await.unwrap();

        let state = detect_state(&conn, &pr).await.unwrap();
        assert!(state.context_up_to_date);
        assert!(!state.has_new_commits);
        assert_eq!(state.context_meta.map(|m| m.gathered_from_commit).as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn unreadable_metadata_offers_refresh_only() {
        let (_dir, conn) = open_test_db().await;
        let pr = pr_at("abc");
        let key = pr.key();
        conn.call(move |db| {
            db.execute(
                "INSERT INTO context_cache (pr_key, context, source_branch, target_branch)
                 VALUES (?1, 'legacy', 'feature', 'main')",
                [&key],
            )?;
            Ok::<_, rusqlite::Error>(())
        })
        .await
        .unwrap();

        let state = detect_state(&conn, &pr).await.unwrap();
        assert!(state.has_context);
        assert!(state.context_meta.is_none());
        assert!(!state.context_up_to_date);
        assert!(!state.has_new_commits);

        let actions = available_actions(&state);
        assert!(actions.contains(&WorkflowAction::RefreshContext));
        assert!(!actions.contains(&WorkflowAction::GatherContext));
    }

    #[tokio::test]
    async fn counts_partition_every_comment() {
        let (_dir, conn) = open_test_db().await;
        let pr = pr_at("abc");
        let key = pr.key();
        let findings = (0..5)
            .map(|i| {
                ReviewComment::new("src/a.rs", Some(i), Severity::Issue, &format!("finding {i}"))
            })
            .collect();
        let saved = comments::save_comments(&conn, &key, findings).await.unwrap();
        let decided = [CommentStatus::Accepted, CommentStatus::Fixed, CommentStatus::Rejected];
        for (comment, status) in saved.iter().zip(decided) {
            let update = CommentUpdate::status(status);
            comments::update_comment(&conn, &key, &comment.id, update).await.unwrap();
        }

        let state = detect_state(&conn, &pr).await.unwrap();
        assert_eq!(state.pending_count, 2);
        assert_eq!(state.accepted_count, 1);
        assert_eq!(state.fixed_count, 1);
        assert_eq!(state.rejected_count, 1);
        assert_eq!(state.total_comments(), saved.len());
        assert!(state.has_comments);
    }
}
