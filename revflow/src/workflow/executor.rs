//! Performs workflow actions against the collaborators.
//!
//! Every public method here absorbs its own failures: errors are logged,
//! announced through the [`Ui`], and turned into an empty or flagged result.
//! The orchestrator loop therefore never stops because an action failed.

use std::sync::Arc;

use revflow_core::types::{CommentStatus, NewContext, ReviewComment};
use revflow_core::{comments, context, patterns};
use tokio_rusqlite::Connection;

use super::catalog::count_noun;
use super::triage::Triage;
use super::{ActionOutcome, HandleCommentsResult, ReviewResult, WorkflowAction};
use crate::agent::{
    AgentActivity, CodeReviewer, ContextEvent, ContextGatherer, ContextRequest, ReviewEvent,
    ReviewRequest,
};
use crate::error::RevflowError;
use crate::fix::FixSession;
use crate::provider::{GitProvider, PullRequest};
use crate::ui::Ui;

const DEFAULT_MAX_PATTERNS: usize = 20;

/// The services an [`ActionExecutor`] drives.
pub struct Collaborators {
    pub provider: Arc<dyn GitProvider>,
    pub gatherer: Arc<dyn ContextGatherer>,
    pub reviewer: Arc<dyn CodeReviewer>,
    pub fixer: Arc<dyn FixSession>,
}

pub struct ActionExecutor {
    conn: Connection,
    ui: Arc<dyn Ui>,
    provider: Arc<dyn GitProvider>,
    gatherer: Arc<dyn ContextGatherer>,
    reviewer: Arc<dyn CodeReviewer>,
    fixer: Arc<dyn FixSession>,
    max_patterns: usize,
}

impl ActionExecutor {
    pub fn new(conn: Connection, ui: Arc<dyn Ui>, collaborators: Collaborators) -> Self {
        Self {
            conn,
            ui,
            provider: collaborators.provider,
            gatherer: collaborators.gatherer,
            reviewer: collaborators.reviewer,
            fixer: collaborators.fixer,
            max_patterns: DEFAULT_MAX_PATTERNS,
        }
    }

    /// Caps how many saved patterns are handed to each review.
    pub fn with_max_patterns(mut self, max_patterns: usize) -> Self {
        self.max_patterns = max_patterns;
        self
    }

    /// Runs `action` for `pr` and reports what it produced.
    pub async fn execute(&self, action: WorkflowAction, pr: &PullRequest) -> ActionOutcome {
        tracing::info!(%action, pr = %pr.key(), "action started");
        let outcome = match action {
            WorkflowAction::GatherContext | WorkflowAction::RefreshContext => {
                if self.execute_gather_context(pr).await {
                    ActionOutcome::ContextGathered
                } else {
                    ActionOutcome::Nothing
                }
            }
            WorkflowAction::RunReview => {
                ActionOutcome::ReviewCompleted(self.execute_review(pr).await)
            }
            WorkflowAction::HandlePending => {
                ActionOutcome::PendingHandled(self.execute_handle_pending(pr).await)
            }
            WorkflowAction::SendAccepted => {
                ActionOutcome::AcceptedSent(self.execute_send_accepted(pr).await)
            }
            WorkflowAction::HandleRemote => {
                self.ui.info("Handling comments already on the pull request is not available yet");
                ActionOutcome::Nothing
            }
            WorkflowAction::Exit => ActionOutcome::Nothing,
        };
        tracing::info!(%action, ?outcome, "action finished");
        outcome
    }

    /// Gathers context for `pr` and caches it. Returns true once it is stored.
    pub async fn execute_gather_context(&self, pr: &PullRequest) -> bool {
        match self.gather_context(pr).await {
            Ok(true) => {
                self.ui.success("Context saved");
                true
            }
            Ok(false) => {
                self.ui.warn("Context gathering ended without a result, nothing was saved");
                false
            }
            Err(e) => {
                tracing::error!(error = %e, pr = %pr.key(), "context gathering failed");
                self.ui.error(&format!("Context gathering failed: {e}"));
                false
            }
        }
    }

    async fn gather_context(&self, pr: &PullRequest) -> Result<bool, RevflowError> {
        let commit_history = self.provider.fetch_commit_history(pr).await?;
        let changes = self.provider.analyze_changes(pr).await?;
        let mut events = self
            .gatherer
            .gather(ContextRequest {
                pr: pr.clone(),
                commit_history,
                edited_files: changes.edited_files,
            })
            .await?;

        let key = pr.key();
        let mut saved = false;
        while let Some(event) = events.recv().await {
            tracing::debug!(?event, "context event");
            match event {
                ContextEvent::Start => self.ui.info("Gathering context for this change"),
                ContextEvent::ToolCall { name, input } => {
                    self.ui.agent_activity(&AgentActivity::ToolCall { name, input })
                }
                ContextEvent::ToolResult { output, is_error } => {
                    self.ui.agent_activity(&AgentActivity::ToolResult { output, is_error })
                }
                ContextEvent::Success => {}
                ContextEvent::Error(message) => {
                    tracing::warn!(%message, "context agent reported an error");
                    self.ui.error(&message);
                }
                ContextEvent::Data(data) if saved => {
                    tracing::warn!(commit = %data.source_commit, "ignoring extra context result");
                }
                ContextEvent::Data(data) => {
                    context::set_context(
                        &self.conn,
                        &key,
                        NewContext {
                            source_branch: data.source_branch,
                            target_branch: data.target_branch,
                            source_commit: data.source_commit,
                            context: data.context,
                        },
                    )
                    .await?;
                    saved = true;
                }
            }
        }
        Ok(saved)
    }

    /// Reviews the diff and merges the findings into the store.
    ///
    /// Re-running merges by fingerprint, so earlier triage decisions survive.
    pub async fn execute_review(&self, pr: &PullRequest) -> ReviewResult {
        match self.review(pr).await {
            Ok(result) => {
                if !result.has_errors {
                    self.ui.success(&format!(
                        "Review finished, {}",
                        count_noun(result.comments_created, "pending comment", "pending comments")
                    ));
                }
                result
            }
            Err(e) => {
                tracing::error!(error = %e, pr = %pr.key(), "review failed");
                self.ui.error(&format!("Review failed: {e}"));
                ReviewResult { comments_created: 0, has_errors: true }
            }
        }
    }

    async fn review(&self, pr: &PullRequest) -> Result<ReviewResult, RevflowError> {
        let key = pr.key();
        let commit_history = self.provider.fetch_commit_history(pr).await?;
        let changes = self.provider.analyze_changes(pr).await?;
        let cached = context::get_context(&self.conn, &key).await?;
        let patterns = patterns::list_patterns(&self.conn, self.max_patterns)
            .await?
            .into_iter()
            .map(|p| p.pattern)
            .collect();

        let mut events = self
            .reviewer
            .review(ReviewRequest {
                pr: pr.clone(),
                commit_history,
                diff: changes.diff,
                edited_files: changes.edited_files,
                context: cached,
                patterns,
            })
            .await?;

        let mut has_errors = false;
        let mut pending: Option<usize> = None;
        while let Some(event) = events.recv().await {
            tracing::debug!(?event, "review event");
            match event {
                ReviewEvent::Start => self.ui.info("Reviewing the changes"),
                ReviewEvent::Thinking(text) => {
                    self.ui.agent_activity(&AgentActivity::Thinking(text))
                }
                ReviewEvent::ToolCall { name, input } => {
                    self.ui.agent_activity(&AgentActivity::ToolCall { name, input })
                }
                ReviewEvent::ToolResult { output, is_error } => {
                    self.ui.agent_activity(&AgentActivity::ToolResult { output, is_error })
                }
                ReviewEvent::Success => {}
                ReviewEvent::Error(message) => {
                    tracing::warn!(%message, "review agent reported an error");
                    self.ui.error(&message);
                    has_errors = true;
                }
                ReviewEvent::Data(data) if pending.is_some() => {
                    tracing::warn!(comments = data.comments.len(), "ignoring extra review result");
                }
                ReviewEvent::Data(data) => {
                    let fresh = self.attach_snippets(pr, data.comments).await;
                    let merged = comments::save_comments(&self.conn, &key, fresh).await?;
                    pending = Some(
                        merged
                            .iter()
                            .filter(|c| c.status == CommentStatus::Pending)
                            .count(),
                    );
                }
            }
        }

        if pending.is_none() {
            self.ui.warn("The review ended without producing comments");
            has_errors = true;
        }
        Ok(ReviewResult { comments_created: pending.unwrap_or(0), has_errors })
    }

    /// Fills in the code each comment points at, as of the reviewed commit.
    async fn attach_snippets(
        &self,
        pr: &PullRequest,
        mut fresh: Vec<ReviewComment>,
    ) -> Vec<ReviewComment> {
        for comment in fresh.iter_mut().filter(|c| c.code_snippet.is_none()) {
            let span = match (comment.line, comment.start_line, comment.end_line) {
                (Some(line), _, _) => (line, line),
                (None, Some(start), end) => (start, end.unwrap_or(start).max(start)),
                _ => continue,
            };
            match self.provider.read_lines(pr, &comment.file, span.0, span.1).await {
                Ok(snippet) => comment.code_snippet = snippet,
                Err(e) => {
                    tracing::warn!(file = %comment.file, error = %e, "could not read snippet")
                }
            }
        }
        fresh
    }

    /// Triages every pending comment. Returns the tally, partial if the
    /// operator quit or a store error cut the session short.
    pub async fn execute_handle_pending(&self, pr: &PullRequest) -> HandleCommentsResult {
        let key = pr.key();
        let triage = Triage {
            conn: &self.conn,
            ui: self.ui.as_ref(),
            fixer: self.fixer.as_ref(),
            pr_key: &key,
        };
        let mut summary = HandleCommentsResult::default();
        if let Err(e) = triage.run(&mut summary).await {
            tracing::error!(error = %e, pr = %key, "triage stopped on error");
            self.ui.error(&format!("Triage stopped: {e}"));
        }

        if summary == HandleCommentsResult::default() {
            self.ui.info("No comments were decided");
        } else {
            self.ui.show_summary(
                "Triage summary",
                &[
                    ("processed", summary.processed),
                    ("fixed", summary.fixed),
                    ("accepted", summary.accepted),
                    ("rejected", summary.rejected),
                    ("skipped", summary.skipped),
                ],
            );
        }
        summary
    }

    /// Posts every accepted comment as one review. Returns how many were sent.
    ///
    /// Comments keep their `accepted` status afterwards, so sending again
    /// posts them again.
    pub async fn execute_send_accepted(&self, pr: &PullRequest) -> usize {
        let accepted: Vec<_> = match comments::get_comments(&self.conn, &pr.key()).await {
            Ok(all) => all.into_iter().filter(|c| c.status == CommentStatus::Accepted).collect(),
            Err(e) => {
                tracing::error!(error = %e, "could not load accepted comments");
                self.ui.error(&format!("Could not load comments: {e}"));
                return 0;
            }
        };
        if accepted.is_empty() {
            self.ui.info("There are no accepted comments to send");
            return 0;
        }

        match self.provider.post_comments_to_remote(pr, &accepted).await {
            Ok(()) => {
                tracing::info!(count = accepted.len(), pr = %pr.key(), "comments sent");
                self.ui.success(&format!(
                    "Sent {} to {}",
                    count_noun(accepted.len(), "comment", "comments"),
                    pr.display_name()
                ));
                accepted.len()
            }
            Err(e) => {
                tracing::error!(error = %e, "posting comments failed");
                self.ui.error(&format!("Sending comments failed: {e}"));
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{ContextData, ReviewData};
    use crate::testing::{
        open_test_db, pr_at, Answer, ScriptedUi, StubFixSession, StubGatherer, StubProvider,
        StubReviewer,
    };
    use revflow_core::types::{CommentUpdate, Severity};

    struct Harness {
        _dir: tempfile::TempDir,
        conn: Connection,
        ui: Arc<ScriptedUi>,
        provider: Arc<StubProvider>,
        executor: ActionExecutor,
    }

    async fn harness(
        answers: Vec<Answer>,
        gather: Vec<ContextEvent>,
        review: Vec<ReviewEvent>,
    ) -> Harness {
        let (dir, conn) = open_test_db().await;
        let ui = Arc::new(ScriptedUi::new(answers));
        let provider = Arc::new(StubProvider::new());
        let executor = ActionExecutor::new(
            conn.clone(),
            ui.clone(),
            Collaborators {
                provider: provider.clone(),
                gatherer: Arc::new(StubGatherer::new(gather)),
                reviewer: Arc::new(StubReviewer::new(review)),
                fixer: Arc::new(StubFixSession::new(conn.clone(), vec![])),
            },
        );
        Harness { _dir: dir, conn, ui, provider, executor }
    }

    fn review_data(comments: Vec<ReviewComment>) -> ReviewEvent {
        ReviewEvent::Data(ReviewData {
            source_branch: "feature".into(),
            target_branch: "main".into(),
            source_commit: "abc".into(),
            comments,
        })
    }

    fn findings() -> Vec<ReviewComment> {
        vec![
            ReviewComment::new("src/login.rs", Some(1), Severity::Issue, "Missing error handling"),
            ReviewComment::new("src/login.rs", Some(2), Severity::Nit, "Rename variable"),
            ReviewComment::new("src/lib.rs", None, Severity::Suggestion, "Split module"),
        ]
    }

    #[tokio::test]
    async fn gather_caches_context_at_source_commit() {
        let data = ContextEvent::Data(ContextData {
            source_branch: "feature".into(),
            target_branch: "main".into(),
            source_commit: "abc".into(),
            context: "AUTH-1: users can log in".into(),
        });
        let h = harness(
            vec![],
            vec![
                ContextEvent::Start,
                ContextEvent::ToolCall { name: "WebFetch".into(), input: "AUTH-1".into() },
                ContextEvent::Success,
                data,
            ],
            vec![],
        )
        .await;
        let pr = pr_at("abc");

        let outcome = h.executor.execute(WorkflowAction::GatherContext, &pr).await;
        assert_eq!(outcome, ActionOutcome::ContextGathered);
        let stored = context::get_context(&h.conn, &pr.key()).await.unwrap();
        assert_eq!(stored.as_deref(), Some("AUTH-1: users can log in"));
        let meta = context::get_context_metadata(&h.conn, &pr.key()).await.unwrap().unwrap();
        assert_eq!(meta.gathered_from_commit, "abc");
        assert_eq!(h.ui.activities().len(), 1);
    }

    #[tokio::test]
    async fn failed_gather_writes_nothing() {
        let gather = vec![ContextEvent::Start, ContextEvent::Error("rate limited".into())];
        let h = harness(vec![], gather, vec![]).await;
        let pr = pr_at("abc");

        assert!(!h.executor.execute_gather_context(&pr).await);
        assert!(!context::has_context(&h.conn, &pr.key()).await.unwrap());
        assert!(h.ui.errors().iter().any(|e| e.contains("rate limited")));
    }

    #[tokio::test]
    async fn review_counts_pending_and_attaches_snippets() {
        let review = vec![ReviewEvent::Start, ReviewEvent::Success, review_data(findings())];
        let h = harness(vec![], vec![], review).await;
        h.provider.set_file("src/login.rs", "fn login() {\n    todo!()\n}\n");
        let pr = pr_at("abc");

        let result = h.executor.execute_review(&pr).await;
        assert_eq!(result, ReviewResult { comments_created: 3, has_errors: false });

        let stored = comments::get_comments(&h.conn, &pr.key()).await.unwrap();
        let first = stored.iter().find(|c| c.line == Some(1)).unwrap();
        assert_eq!(first.code_snippet.as_deref(), Some("fn login() {"));
        let file_level = stored.iter().find(|c| c.line.is_none()).unwrap();
        assert!(file_level.code_snippet.is_none());
    }

    #[tokio::test]
    async fn review_twice_keeps_ids_and_statuses() {
        let events = vec![ReviewEvent::Start, review_data(findings())];
        let h = harness(vec![], vec![], events).await;
        let pr = pr_at("abc");

        h.executor.execute_review(&pr).await;
        let first = comments::get_comments(&h.conn, &pr.key()).await.unwrap();
        comments::update_comment(
            &h.conn,
            &pr.key(),
            &first[0].id,
            CommentUpdate::status(CommentStatus::Accepted),
        )
        .await
        .unwrap();

        let again = h.executor.execute_review(&pr).await;
        assert_eq!(again.comments_created, 2);

        let second = comments::get_comments(&h.conn, &pr.key()).await.unwrap();
        assert_eq!(second.len(), first.len());
        for before in &first {
            let after = second.iter().find(|c| c.id == before.id).unwrap();
            let expected =
                if before.id == first[0].id { CommentStatus::Accepted } else { before.status };
            assert_eq!(after.status, expected);
        }
    }

    #[tokio::test]
    async fn review_without_data_is_flagged() {
        let review = vec![ReviewEvent::Start, ReviewEvent::Error("agent crashed".into())];
        let h = harness(vec![], vec![], review).await;
        let result = h.executor.execute_review(&pr_at("abc")).await;
        assert_eq!(result, ReviewResult { comments_created: 0, has_errors: true });
    }

    #[tokio::test]
    async fn only_the_first_review_result_is_stored() {
        let extra =
            vec![ReviewComment::new("src/other.rs", Some(9), Severity::Risk, "Second payload")];
        let h = harness(vec![], vec![], vec![review_data(findings()), review_data(extra)]).await;
        let pr = pr_at("abc");

        let result = h.executor.execute_review(&pr).await;
        assert_eq!(result.comments_created, 3);
        assert_eq!(comments::get_comments(&h.conn, &pr.key()).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn review_setup_failure_is_absorbed() {
        let h = harness(vec![], vec![], vec![review_data(findings())]).await;
        h.provider.fail_history();
        let result = h.executor.execute_review(&pr_at("abc")).await;
        assert_eq!(result, ReviewResult { comments_created: 0, has_errors: true });
        assert!(h.ui.errors().iter().any(|e| e.starts_with("Review failed")));
    }

    #[tokio::test]
    async fn send_accepted_posts_once_and_skips_when_empty() {
        let h = harness(vec![], vec![], vec![review_data(findings())]).await;
        let pr = pr_at("abc");

        assert_eq!(h.executor.execute_send_accepted(&pr).await, 0);
        assert!(h.provider.posted().is_empty());

        h.executor.execute_review(&pr).await;
        let stored = comments::get_comments(&h.conn, &pr.key()).await.unwrap();
        for c in stored.iter().take(2) {
            comments::update_comment(
                &h.conn,
                &pr.key(),
                &c.id,
                CommentUpdate::status(CommentStatus::Accepted),
            )
            .await
            .unwrap();
        }

        assert_eq!(h.executor.execute_send_accepted(&pr).await, 2);
        assert_eq!(h.provider.posted(), vec![2]);
    }

    #[tokio::test]
    async fn single_sent_comment_reads_naturally() {
        let h = harness(vec![], vec![], vec![review_data(findings())]).await;
        let pr = pr_at("abc");
        h.executor.execute_review(&pr).await;
        let stored = comments::get_comments(&h.conn, &pr.key()).await.unwrap();
        let accept = CommentUpdate::status(CommentStatus::Accepted);
        comments::update_comment(&h.conn, &pr.key(), &stored[0].id, accept).await.unwrap();

        assert_eq!(h.executor.execute_send_accepted(&pr).await, 1);
        assert!(h.ui.infos().iter().any(|m| m == "Sent 1 comment to feature → main"));
    }

    #[tokio::test]
    async fn failed_send_reports_zero() {
        let h = harness(vec![], vec![], vec![review_data(findings())]).await;
        let pr = pr_at("abc");
        h.executor.execute_review(&pr).await;
        let stored = comments::get_comments(&h.conn, &pr.key()).await.unwrap();
        comments::update_comment(
            &h.conn,
            &pr.key(),
            &stored[0].id,
            CommentUpdate::status(CommentStatus::Accepted),
        )
        .await
        .unwrap();
        h.provider.fail_posting();

        assert_eq!(h.executor.execute_send_accepted(&pr).await, 0);
        assert!(h.ui.errors().iter().any(|e| e.starts_with("Sending comments failed")));
    }

    #[tokio::test]
    async fn handle_pending_reports_partial_tally() {
        let h = harness(
            vec![Answer::Select(Some("accept".into())), Answer::Select(Some("quit".into()))],
            vec![],
            vec![review_data(findings())],
        )
        .await;
        let pr = pr_at("abc");
        h.executor.execute_review(&pr).await;

        let summary = h.executor.execute_handle_pending(&pr).await;
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.accepted, 1);
        assert_eq!(h.ui.summaries(), vec!["Triage summary".to_owned()]);
    }

    #[tokio::test]
    async fn remote_comments_are_a_no_op() {
        let h = harness(vec![], vec![], vec![]).await;
        let outcome = h.executor.execute(WorkflowAction::HandleRemote, &pr_at("abc")).await;
        assert_eq!(outcome, ActionOutcome::Nothing);
        assert!(h.ui.infos().iter().any(|m| m.contains("not available")));
    }
}
