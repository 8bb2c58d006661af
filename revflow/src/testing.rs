//! Test doubles and fixtures shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use git2::{Repository, RepositoryInitOptions, Signature};
use revflow_core::comments;
use revflow_core::types::{CommentStatus, CommentUpdate, StoredReviewComment};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_rusqlite::Connection;

use crate::agent::{
    AgentActivity, CodeReviewer, ContextEvent, ContextGatherer, ContextRequest, ReviewEvent,
    ReviewRequest,
};
use crate::error::RevflowError;
use crate::fix::FixSession;
use crate::provider::{BranchRef, ChangeSet, GitProvider, PullRequest};
use crate::ui::{Choice, Ui};
use crate::workflow::{HandleCommentsResult, WorkflowState};

// ----- fixtures -----

/// A throwaway repository: `main` with a README, and `feature` (checked out)
/// adding `src/login.rs` in a single commit.
pub struct FixtureRepo {
    dir: TempDir,
    pub feature_head: git2::Oid,
}

impl FixtureRepo {
    pub fn with_feature_branch() -> Self {
        let dir = TempDir::new().unwrap();
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(dir.path(), &opts).unwrap();
        let sig = Signature::now("Test", "test@example.com").unwrap();

        std::fs::write(dir.path().join("README.md"), "# demo\n").unwrap();
        let base = commit_all(&repo, &sig, "Initial commit", &[]);

        let base_commit = repo.find_commit(base).unwrap();
        repo.branch("feature", &base_commit, false).unwrap();
        repo.set_head("refs/heads/feature").unwrap();

        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/login.rs"), "fn login() {\n    todo!()\n}\n").unwrap();
        let feature_head = commit_all(&repo, &sig, "Add login handler", &[&base_commit]);

        Self { dir, feature_head }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

fn commit_all(
    repo: &Repository,
    sig: &Signature<'_>,
    message: &str,
    parents: &[&git2::Commit<'_>],
) -> git2::Oid {
    let mut index = repo.index().unwrap();
    index.add_all(["*"], git2::IndexAddOption::DEFAULT, None).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    repo.commit(Some("HEAD"), sig, sig, message, &tree, parents).unwrap()
}

/// Shell lines that print each record as one line of agent stream output.
pub fn emit_records(records: &[serde_json::Value]) -> String {
    records.iter().map(|record| format!("printf '%s\\n' '{record}'\n")).collect()
}

pub async fn open_test_db() -> (TempDir, Connection) {
    let dir = TempDir::new().unwrap();
    let conn = revflow_core::db::open_db(dir.path().join("revflow.db")).await.unwrap();
    (dir, conn)
}

/// A local `feature → main` pull request whose source is at `commit`.
pub fn pr_at(commit: &str) -> PullRequest {
    PullRequest {
        number: None,
        title: String::new(),
        source: BranchRef { name: "feature".into(), commit_hash: commit.into() },
        target: BranchRef { name: "main".into(), commit_hash: "base".into() },
    }
}

// ----- scripted UI -----

/// The next answer a [`ScriptedUi`] gives. The variant must match the prompt kind.
#[derive(Debug, Clone)]
pub enum Answer {
    Select(Option<String>),
    Confirm(Option<bool>),
    Text(Option<String>),
}

#[derive(Default)]
struct Log {
    questions: Vec<String>,
    last_choices: Vec<Choice>,
    infos: Vec<String>,
    warnings: Vec<String>,
    errors: Vec<String>,
    activities: Vec<AgentActivity>,
    diffs: Vec<String>,
    summaries: Vec<String>,
    states_shown: usize,
}

/// Answers prompts from a fixed script and records everything shown.
pub struct ScriptedUi {
    answers: Mutex<VecDeque<Answer>>,
    log: Mutex<Log>,
}

impl ScriptedUi {
    pub fn new(answers: Vec<Answer>) -> Self {
        Self { answers: Mutex::new(answers.into()), log: Mutex::new(Log::default()) }
    }

    fn next(&self, prompt: &str) -> Answer {
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted answer left for prompt '{prompt}'"))
    }

    /// Messages of every confirm prompt, in order.
    pub fn questions(&self) -> Vec<String> {
        self.log.lock().unwrap().questions.clone()
    }

    pub fn last_choices(&self) -> Vec<Choice> {
        self.log.lock().unwrap().last_choices.clone()
    }

    pub fn infos(&self) -> Vec<String> {
        self.log.lock().unwrap().infos.clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.log.lock().unwrap().warnings.clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.log.lock().unwrap().errors.clone()
    }

    pub fn activities(&self) -> Vec<AgentActivity> {
        self.log.lock().unwrap().activities.clone()
    }

    /// Paths passed to `show_diff`.
    pub fn diffs(&self) -> Vec<String> {
        self.log.lock().unwrap().diffs.clone()
    }

    /// Titles passed to `show_summary`.
    pub fn summaries(&self) -> Vec<String> {
        self.log.lock().unwrap().summaries.clone()
    }

    /// How many times the main menu heading was rendered.
    pub fn states_shown(&self) -> usize {
        self.log.lock().unwrap().states_shown
    }
}

#[async_trait]
impl Ui for ScriptedUi {
    async fn select(&self, message: &str, choices: &[Choice]) -> Option<String> {
        self.log.lock().unwrap().last_choices = choices.to_vec();
        match self.next(message) {
            Answer::Select(value) => {
                if let Some(v) = &value {
                    assert!(
                        choices.iter().any(|c| &c.value == v),
                        "'{v}' is not offered by '{message}'"
                    );
                }
                value
            }
            other => panic!("expected a select answer for '{message}', got {other:?}"),
        }
    }

    async fn confirm(&self, message: &str, _default: bool) -> Option<bool> {
        self.log.lock().unwrap().questions.push(message.to_owned());
        match self.next(message) {
            Answer::Confirm(value) => value,
            other => panic!("expected a confirm answer for '{message}', got {other:?}"),
        }
    }

    async fn text(&self, message: &str, _placeholder: &str) -> Option<String> {
        match self.next(message) {
            Answer::Text(value) => value,
            other => panic!("expected a text answer for '{message}', got {other:?}"),
        }
    }

    fn info(&self, message: &str) {
        self.log.lock().unwrap().infos.push(message.to_owned());
    }

    fn success(&self, message: &str) {
        self.log.lock().unwrap().infos.push(message.to_owned());
    }

    fn warn(&self, message: &str) {
        self.log.lock().unwrap().warnings.push(message.to_owned());
    }

    fn error(&self, message: &str) {
        self.log.lock().unwrap().errors.push(message.to_owned());
    }

    fn agent_activity(&self, activity: &AgentActivity) {
        self.log.lock().unwrap().activities.push(activity.clone());
    }

    fn show_state(&self, _pr: &PullRequest, _state: &WorkflowState) {
        self.log.lock().unwrap().states_shown += 1;
    }

    fn show_comment(&self, _comment: &StoredReviewComment, _index: usize, _total: usize) {}

    fn show_diff(&self, path: &str, _before: &str, _after: &str) {
        self.log.lock().unwrap().diffs.push(path.to_owned());
    }

    fn show_summary(&self, title: &str, _rows: &[(&str, usize)]) {
        self.log.lock().unwrap().summaries.push(title.to_owned());
    }
}

// ----- agents -----

fn replay<T: Send + 'static>(events: Vec<T>) -> mpsc::Receiver<T> {
    let (tx, rx) = mpsc::channel(events.len().max(1));
    for event in events {
        // Capacity covers every event, so this never waits.
        let _ = tx.try_send(event);
    }
    rx
}

/// Replays the same context events on every run.
pub struct StubGatherer {
    events: Vec<ContextEvent>,
}

impl StubGatherer {
    pub fn new(events: Vec<ContextEvent>) -> Self {
        Self { events }
    }
}

#[async_trait]
impl ContextGatherer for StubGatherer {
    async fn gather(
        &self,
        _request: ContextRequest,
    ) -> Result<mpsc::Receiver<ContextEvent>, RevflowError> {
        Ok(replay(self.events.clone()))
    }
}

/// Replays the same review events on every run.
pub struct StubReviewer {
    events: Vec<ReviewEvent>,
}

impl StubReviewer {
    pub fn new(events: Vec<ReviewEvent>) -> Self {
        Self { events }
    }
}

#[async_trait]
impl CodeReviewer for StubReviewer {
    async fn review(
        &self,
        _request: ReviewRequest,
    ) -> Result<mpsc::Receiver<ReviewEvent>, RevflowError> {
        Ok(replay(self.events.clone()))
    }
}

// ----- provider -----

/// In-memory provider with switchable failures.
#[derive(Default)]
pub struct StubProvider {
    files: Mutex<HashMap<String, String>>,
    posted: Mutex<Vec<usize>>,
    fail_history: AtomicBool,
    fail_posting: AtomicBool,
    fail_refresh: AtomicBool,
    refreshes: AtomicUsize,
    head_switch: Mutex<Option<(usize, String)>>,
}

impl StubProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_file(&self, path: &str, contents: &str) {
        self.files.lock().unwrap().insert(path.to_owned(), contents.to_owned());
    }

    pub fn fail_history(&self) {
        self.fail_history.store(true, Ordering::SeqCst);
    }

    pub fn fail_posting(&self) {
        self.fail_posting.store(true, Ordering::SeqCst);
    }

    pub fn fail_refresh(&self) {
        self.fail_refresh.store(true, Ordering::SeqCst);
    }

    /// From the `nth` refresh on (1-based), the source branch points at `commit`.
    pub fn set_head_after_refreshes(&self, nth: usize, commit: &str) {
        *self.head_switch.lock().unwrap() = Some((nth, commit.to_owned()));
    }

    /// Batch sizes of every successful post.
    pub fn posted(&self) -> Vec<usize> {
        self.posted.lock().unwrap().clone()
    }
}

#[async_trait]
impl GitProvider for StubProvider {
    async fn refresh(&self, pr: &PullRequest) -> Result<PullRequest, RevflowError> {
        let count = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(RevflowError::Agent("server unreachable".into()));
        }
        let mut fresh = pr.clone();
        if let Some((nth, commit)) = self.head_switch.lock().unwrap().as_ref() {
            if count >= *nth {
                fresh.source.commit_hash = commit.clone();
            }
        }
        Ok(fresh)
    }

    async fn fetch_commit_history(&self, _pr: &PullRequest) -> Result<Vec<String>, RevflowError> {
        if self.fail_history.load(Ordering::SeqCst) {
            return Err(RevflowError::GitWorkerGone);
        }
        Ok(vec!["abc1234 Add login handler".to_owned()])
    }

    async fn analyze_changes(&self, _pr: &PullRequest) -> Result<ChangeSet, RevflowError> {
        Ok(ChangeSet {
            diff: "+fn login() {}\n".to_owned(),
            edited_files: vec!["src/login.rs".to_owned()],
        })
    }

    async fn read_lines(
        &self,
        _pr: &PullRequest,
        path: &str,
        start: u32,
        end: u32,
    ) -> Result<Option<String>, RevflowError> {
        let files = self.files.lock().unwrap();
        let Some(content) = files.get(path) else {
            return Ok(None);
        };
        if start == 0 {
            return Ok(None);
        }
        let lines: Vec<&str> = content
            .lines()
            .skip(start as usize - 1)
            .take((end - start + 1) as usize)
            .collect();
        Ok((!lines.is_empty()).then(|| lines.join("\n")))
    }

    async fn post_comments_to_remote(
        &self,
        _pr: &PullRequest,
        comments: &[StoredReviewComment],
    ) -> Result<(), RevflowError> {
        if self.fail_posting.load(Ordering::SeqCst) {
            return Err(RevflowError::Remote {
                context: "create review",
                status: 502,
                body: "bad gateway".into(),
            });
        }
        self.posted.lock().unwrap().push(comments.len());
        Ok(())
    }
}

// ----- fix sessions -----

/// Resolves fixes from a queue of outcomes; an empty queue leaves comments pending.
pub struct StubFixSession {
    conn: Connection,
    outcomes: Mutex<VecDeque<CommentStatus>>,
    notes: Mutex<Vec<Option<String>>>,
}

impl StubFixSession {
    pub fn new(conn: Connection, outcomes: Vec<CommentStatus>) -> Self {
        Self { conn, outcomes: Mutex::new(outcomes.into()), notes: Mutex::new(Vec::new()) }
    }

    /// Notes received by each session, in order.
    pub fn notes(&self) -> Vec<Option<String>> {
        self.notes.lock().unwrap().clone()
    }
}

#[async_trait]
impl FixSession for StubFixSession {
    async fn run_fix_session(
        &self,
        comment: &StoredReviewComment,
        pr_key: &str,
        notes: Option<&str>,
        summary: &mut HandleCommentsResult,
    ) -> Result<(), RevflowError> {
        self.notes.lock().unwrap().push(notes.map(str::to_owned));
        let outcome = self.outcomes.lock().unwrap().pop_front().unwrap_or(CommentStatus::Pending);
        match outcome {
            CommentStatus::Fixed => summary.fixed += 1,
            CommentStatus::Rejected => summary.rejected += 1,
            _ => return Ok(()),
        }
        let update = CommentUpdate::status(outcome);
        comments::update_comment(&self.conn, pr_key, &comment.id, update).await?;
        Ok(())
    }
}
