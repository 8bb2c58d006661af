//! Fix sessions: let the agent apply a fix for one comment, then let the
//! operator keep or discard the result.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use revflow_core::comments;
use revflow_core::types::{CommentStatus, CommentUpdate, StoredReviewComment};
use tokio_rusqlite::Connection;

use crate::agent::output::StreamRecord;
use crate::agent::{prompt, AgentActivity, AgentCli};
use crate::error::RevflowError;
use crate::git::GitHandle;
use crate::ui::Ui;
use crate::workflow::{count_noun, HandleCommentsResult};

/// Applies a fix for a single comment.
///
/// Implementations persist the comment's final status themselves: `fixed` when
/// the operator keeps the change, `rejected` when it is discarded, and bump the
/// matching counter in `summary`. Leaving the comment `pending` is allowed when
/// nothing was decided.
#[async_trait]
pub trait FixSession: Send + Sync {
    async fn run_fix_session(
        &self,
        comment: &StoredReviewComment,
        pr_key: &str,
        notes: Option<&str>,
        summary: &mut HandleCommentsResult,
    ) -> Result<(), RevflowError>;
}

/// Runs the agent CLI in the working copy and previews every file it touched.
pub struct AgentFixSession {
    agent: AgentCli,
    git: GitHandle,
    conn: Connection,
    ui: Arc<dyn Ui>,
}

/// What the agent run left behind.
enum RunEnd {
    Finished(Option<String>),
    Failed(String),
}

/// Working-copy contents of every path that differed from `HEAD` before the
/// agent ran. Paths missing here were clean.
type Baseline = BTreeMap<String, Option<Vec<u8>>>;

/// One file the agent created, edited or removed.
struct FileChange {
    path: String,
    before: Option<Vec<u8>>,
    after: Option<Vec<u8>>,
}

impl AgentFixSession {
    pub fn new(agent: AgentCli, git: GitHandle, conn: Connection, ui: Arc<dyn Ui>) -> Self {
        Self { agent, git, conn, ui }
    }

    async fn drive_agent(&self, prompt: String) -> Result<RunEnd, RevflowError> {
        let mut records = self.agent.run(prompt).await?;
        let mut end = RunEnd::Finished(None);
        while let Some(record) = records.recv().await {
            match record {
                StreamRecord::Thinking(text) => {
                    self.ui.agent_activity(&AgentActivity::Thinking(text))
                }
                StreamRecord::ToolUse { name, input } => {
                    self.ui.agent_activity(&AgentActivity::ToolCall { name, input })
                }
                StreamRecord::ToolResult { output, is_error } => {
                    self.ui.agent_activity(&AgentActivity::ToolResult { output, is_error })
                }
                StreamRecord::Text(_) => {}
                StreamRecord::Result { text, is_error: false } => {
                    end = RunEnd::Finished(Some(text))
                }
                StreamRecord::Result { text, is_error: true } | StreamRecord::Failed(text) => {
                    end = RunEnd::Failed(text)
                }
            }
        }
        Ok(end)
    }

    /// Records the operator's own uncommitted work, plus the commented file.
    async fn capture(&self, focus: &str) -> Result<Baseline, RevflowError> {
        let mut paths = self.git.changed_paths().await?;
        paths.push(focus.to_owned());
        let mut baseline = Baseline::new();
        for path in paths {
            if !baseline.contains_key(&path) {
                let contents = self.git.read_bytes(&path).await?;
                baseline.insert(path, contents);
            }
        }
        Ok(baseline)
    }

    /// Files whose contents differ from `baseline`, the commented file first.
    async fn changes_since(
        &self,
        baseline: &Baseline,
        focus: &str,
    ) -> Result<Vec<FileChange>, RevflowError> {
        let mut paths: BTreeSet<String> = baseline.keys().cloned().collect();
        paths.extend(self.git.changed_paths().await?);

        let mut changes = Vec::new();
        for path in paths {
            let before = match baseline.get(&path) {
                Some(contents) => contents.clone(),
                None => self.git.head_file(&path).await?,
            };
            let after = self.git.read_bytes(&path).await?;
            if before != after {
                changes.push(FileChange { path, before, after });
            }
        }
        changes.sort_by_key(|change| change.path != focus);
        Ok(changes)
    }

    async fn restore(&self, changes: &[FileChange]) -> Result<(), RevflowError> {
        for change in changes {
            tracing::debug!(path = %change.path, "restoring");
            self.git.write_file(&change.path, change.before.as_deref()).await?;
        }
        Ok(())
    }

    async fn set_status(
        &self,
        pr_key: &str,
        comment: &StoredReviewComment,
        status: CommentStatus,
    ) -> Result<(), RevflowError> {
        let update = CommentUpdate::status(status);
        comments::update_comment(&self.conn, pr_key, &comment.id, update).await?;
        Ok(())
    }
}

#[async_trait]
impl FixSession for AgentFixSession {
    async fn run_fix_session(
        &self,
        comment: &StoredReviewComment,
        pr_key: &str,
        notes: Option<&str>,
        summary: &mut HandleCommentsResult,
    ) -> Result<(), RevflowError> {
        tracing::info!(comment = %comment.id, file = %comment.file, "starting fix session");
        let baseline = self.capture(&comment.file).await?;
        self.ui.info(&format!("Asking the agent to fix {}", comment.location()));

        let end = self.drive_agent(prompt::fix_prompt(comment, notes)).await?;
        let changes = self.changes_since(&baseline, &comment.file).await?;
        let touched = count_noun(changes.len(), "file", "files");

        if let RunEnd::Failed(reason) = &end {
            tracing::warn!(comment = %comment.id, %reason, "fix session failed");
            self.ui.error(&format!("The fix did not complete: {reason}"));
            if !changes.is_empty() {
                self.restore(&changes).await?;
                self.ui.warn(&format!("Restored {touched}"));
            }
            return Ok(());
        }

        if changes.is_empty() {
            self.ui.warn("The agent did not change any files");
            if self.ui.confirm("Mark the comment as fixed anyway?", false).await == Some(true) {
                self.set_status(pr_key, comment, CommentStatus::Fixed).await?;
                summary.fixed += 1;
            }
            return Ok(());
        }

        for change in &changes {
            self.ui.show_diff(
                &change.path,
                &String::from_utf8_lossy(change.before.as_deref().unwrap_or_default()),
                &String::from_utf8_lossy(change.after.as_deref().unwrap_or_default()),
            );
        }
        if let RunEnd::Finished(Some(text)) = &end {
            if let Some(first) = text.lines().map(str::trim).find(|l| !l.is_empty()) {
                self.ui.info(first);
            }
        }

        if self.ui.confirm("Keep this change?", true).await == Some(true) {
            self.set_status(pr_key, comment, CommentStatus::Fixed).await?;
            summary.fixed += 1;
            self.ui.success(&format!("Fix kept, {touched} changed"));
        } else {
            self.restore(&changes).await?;
            self.set_status(pr_key, comment, CommentStatus::Rejected).await?;
            summary.rejected += 1;
            self.ui.warn(&format!("Change discarded, {touched} restored"));
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::git::spawn_git_worker;
    use crate::testing::{emit_records, open_test_db, Answer, FixtureRepo, ScriptedUi};
    use revflow_core::types::{ReviewComment, Severity};
    use serde_json::json;

    /// Script tail that reports a successful run.
    fn result_line() -> String {
        emit_records(&[json!({
            "type": "result",
            "is_error": false,
            "result": "Replaced todo with a real body.",
        })])
    }

    async fn setup(
        script: &str,
        answers: Vec<Answer>,
    ) -> (FixtureRepo, tempfile::TempDir, Arc<ScriptedUi>, AgentFixSession, StoredReviewComment) {
        let fixture = FixtureRepo::with_feature_branch();
        let git = spawn_git_worker(fixture.path()).unwrap();
        let (dir, conn) = open_test_db().await;
        let finding =
            ReviewComment::new("src/login.rs", Some(2), Severity::Issue, "Unimplemented login");
        let saved = comments::save_comments(&conn, "feature__main", vec![finding])
            .await
            .unwrap();
        let ui = Arc::new(ScriptedUi::new(answers));
        let agent = AgentCli::new(
            "sh",
            vec!["-c".to_owned(), script.to_owned(), "agent".to_owned()],
            fixture.path(),
        );
        let session = AgentFixSession::new(agent, git, conn, ui.clone());
        let comment = saved.into_iter().next().unwrap();
        (fixture, dir, ui, session, comment)
    }

    async fn status_of(session: &AgentFixSession, id: &str) -> CommentStatus {
        comments::get_comment(&session.conn, "feature__main", id)
            .await
            .unwrap()
            .unwrap()
            .status
    }

    #[tokio::test]
    async fn kept_change_marks_comment_fixed() {
        let script = format!(
            "printf 'fn login() {{\\n    true\\n}}\\n' > src/login.rs\n{}",
            result_line()
        );
        let (fixture, _db, ui, session, comment) =
            setup(&script, vec![Answer::Confirm(Some(true))]).await;

        let mut summary = HandleCommentsResult::default();
        session
            .run_fix_session(&comment, "feature__main", Some("keep it small"), &mut summary)
            .await
            .unwrap();

        assert_eq!(summary.fixed, 1);
        assert_eq!(status_of(&session, &comment.id).await, CommentStatus::Fixed);
        assert_eq!(ui.diffs(), vec!["src/login.rs".to_owned()]);
        let on_disk = std::fs::read_to_string(fixture.path().join("src/login.rs")).unwrap();
        assert!(on_disk.contains("true"));
    }

    #[tokio::test]
    async fn discarded_change_is_reverted_and_rejected() {
        let script = format!("printf 'broken\\n' > src/login.rs\n{}", result_line());
        let (fixture, _db, _ui, session, comment) =
            setup(&script, vec![Answer::Confirm(Some(false))]).await;
        let original = std::fs::read_to_string(fixture.path().join("src/login.rs")).unwrap();

        let mut summary = HandleCommentsResult::default();
        session.run_fix_session(&comment, "feature__main", None, &mut summary).await.unwrap();

        assert_eq!(summary.rejected, 1);
        assert_eq!(status_of(&session, &comment.id).await, CommentStatus::Rejected);
        let restored = std::fs::read_to_string(fixture.path().join("src/login.rs")).unwrap();
        assert_eq!(restored, original);
    }

    #[tokio::test]
    async fn discarding_reverts_every_file_the_agent_touched() {
        let script = format!(
            "printf 'fn login() {{}}\\n' > src/login.rs\n\
             mkdir -p src/auth && printf 'pub fn check() {{}}\\n' > src/auth/helper.rs\n\
             printf '# rewritten\\n' > README.md\n{}",
            result_line()
        );
        let (fixture, _db, ui, session, comment) =
            setup(&script, vec![Answer::Confirm(Some(false))]).await;
        let root = fixture.path();
        let original = std::fs::read_to_string(root.join("src/login.rs")).unwrap();
        std::fs::write(root.join("NOTES.md"), "operator scratch\n").unwrap();

        let mut summary = HandleCommentsResult::default();
        session.run_fix_session(&comment, "feature__main", None, &mut summary).await.unwrap();

        assert_eq!(summary.rejected, 1);
        assert_eq!(
            ui.diffs(),
            vec!["src/login.rs".to_owned(), "README.md".to_owned(), "src/auth/helper.rs".to_owned()]
        );
        assert_eq!(std::fs::read_to_string(root.join("src/login.rs")).unwrap(), original);
        assert_eq!(std::fs::read_to_string(root.join("README.md")).unwrap(), "# demo\n");
        assert!(!root.join("src/auth/helper.rs").exists());
        assert_eq!(std::fs::read_to_string(root.join("NOTES.md")).unwrap(), "operator scratch\n");
    }

    #[tokio::test]
    async fn untouched_file_stays_pending_unless_confirmed() {
        let (_fixture, _db, ui, session, comment) =
            setup(&result_line(), vec![Answer::Confirm(None)]).await;

        let mut summary = HandleCommentsResult::default();
        session.run_fix_session(&comment, "feature__main", None, &mut summary).await.unwrap();

        assert_eq!(summary, HandleCommentsResult::default());
        assert_eq!(status_of(&session, &comment.id).await, CommentStatus::Pending);
        assert!(ui.diffs().is_empty());
    }

    #[tokio::test]
    async fn failed_agent_restores_the_file() {
        let script = "printf 'half done\\n' > src/login.rs\n\
                      printf 'tmp\\n' > src/scratch.rs\n\
                      exit 3";
        let (fixture, _db, ui, session, comment) = setup(script, vec![]).await;
        let root = fixture.path();
        let original = std::fs::read_to_string(root.join("src/login.rs")).unwrap();

        let mut summary = HandleCommentsResult::default();
        session.run_fix_session(&comment, "feature__main", None, &mut summary).await.unwrap();

        assert_eq!(status_of(&session, &comment.id).await, CommentStatus::Pending);
        assert_eq!(std::fs::read_to_string(root.join("src/login.rs")).unwrap(), original);
        assert!(!root.join("src/scratch.rs").exists());
        assert!(ui.errors().iter().any(|e| e.contains("did not complete")));
    }
}
