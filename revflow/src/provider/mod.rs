//! Pull request identity and the git provider seam.
//!
//! The workflow only ever talks to [`GitProvider`]. The production
//! implementation, [`WorkingCopyProvider`], answers history and diff questions
//! from the local working copy and, when a pull request number and API token
//! are available, refreshes and posts through the GitHub REST API.

pub mod github;

use async_trait::async_trait;
use revflow_core::types::{pr_key, StoredReviewComment};

use crate::error::RevflowError;
use crate::git::GitHandle;
use github::GithubClient;

/// A branch and the commit it currently points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRef {
    pub name: String,
    pub commit_hash: String,
}

/// The pull request under review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    /// Provider-assigned number; `None` when reviewing a local branch pair.
    pub number: Option<u64>,
    pub title: String,
    pub source: BranchRef,
    pub target: BranchRef,
}

impl PullRequest {
    /// Stable storage key, see [`revflow_core::types::pr_key`].
    pub fn key(&self) -> String {
        pr_key(self.number, &self.source.name, &self.target.name)
    }

    /// `#42 Title` or `feature → main` for headings.
    pub fn display_name(&self) -> String {
        match self.number {
            Some(n) if !self.title.is_empty() => format!("#{n} {}", self.title),
            Some(n) => format!("#{n}"),
            None => format!("{} → {}", self.source.name, self.target.name),
        }
    }
}

/// What changed in a pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Unified diff of the source branch against its merge base with the target.
    pub diff: String,
    pub edited_files: Vec<String>,
}

/// Capability interface over the hosting server and the local working copy.
#[async_trait]
pub trait GitProvider: Send + Sync {
    /// Returns `pr` with live branch heads (and title, when hosted).
    async fn refresh(&self, pr: &PullRequest) -> Result<PullRequest, RevflowError>;

    /// One line per commit on the source branch, oldest first.
    async fn fetch_commit_history(&self, pr: &PullRequest) -> Result<Vec<String>, RevflowError>;

    async fn analyze_changes(&self, pr: &PullRequest) -> Result<ChangeSet, RevflowError>;

    /// Lines `start..=end` (1-based) of `path` at the pull request's source
    /// commit, `None` if unavailable.
    async fn read_lines(
        &self,
        pr: &PullRequest,
        path: &str,
        start: u32,
        end: u32,
    ) -> Result<Option<String>, RevflowError>;

    /// Publishes `comments` on the hosted pull request in a single review.
    async fn post_comments_to_remote(
        &self,
        pr: &PullRequest,
        comments: &[StoredReviewComment],
    ) -> Result<(), RevflowError>;
}

/// Local working copy plus an optional GitHub client.
pub struct WorkingCopyProvider {
    git: GitHandle,
    github: Option<GithubClient>,
}

impl WorkingCopyProvider {
    pub fn new(git: GitHandle, github: Option<GithubClient>) -> Self {
        Self { git, github }
    }

    /// True when pull requests can be refreshed and commented on remotely.
    pub fn is_hosted(&self) -> bool {
        self.github.is_some()
    }

    /// Builds the initial pull request, from GitHub when `number` is given and
    /// a client is configured, otherwise from the local `source`/`target` pair.
    pub async fn open_pull_request(
        &self,
        number: Option<u64>,
        source: &str,
        target: &str,
    ) -> Result<PullRequest, RevflowError> {
        let seed = PullRequest {
            number,
            title: String::new(),
            source: BranchRef { name: source.to_owned(), commit_hash: String::new() },
            target: BranchRef { name: target.to_owned(), commit_hash: String::new() },
        };
        self.refresh(&seed).await
    }
}

#[async_trait]
impl GitProvider for WorkingCopyProvider {
    async fn refresh(&self, pr: &PullRequest) -> Result<PullRequest, RevflowError> {
        if let (Some(client), Some(number)) = (&self.github, pr.number) {
            let remote = client.get_pull(number).await?;
            return Ok(PullRequest {
                number: Some(remote.number),
                title: remote.title,
                source: BranchRef { name: remote.head.ref_name, commit_hash: remote.head.sha },
                target: BranchRef { name: remote.base.ref_name, commit_hash: remote.base.sha },
            });
        }

        let source = self.git.resolve_commit(&pr.source.name).await?;
        let target = self.git.resolve_commit(&pr.target.name).await?;
        Ok(PullRequest {
            number: pr.number,
            title: pr.title.clone(),
            source: BranchRef { name: pr.source.name.clone(), commit_hash: source },
            target: BranchRef { name: pr.target.name.clone(), commit_hash: target },
        })
    }

    async fn fetch_commit_history(&self, pr: &PullRequest) -> Result<Vec<String>, RevflowError> {
        let commits = self.git.commit_history(&pr.target.name, &pr.source.name).await?;
        Ok(commits.iter().map(|c| c.one_line()).collect())
    }

    async fn analyze_changes(&self, pr: &PullRequest) -> Result<ChangeSet, RevflowError> {
        let snapshot = self.git.diff(&pr.target.name, &pr.source.name).await?;
        Ok(ChangeSet {
            edited_files: snapshot.files.into_iter().map(|f| f.path).collect(),
            diff: snapshot.patch,
        })
    }

    async fn read_lines(
        &self,
        pr: &PullRequest,
        path: &str,
        start: u32,
        end: u32,
    ) -> Result<Option<String>, RevflowError> {
        self.git.read_lines_at(&pr.source.commit_hash, path, start, end).await
    }

    async fn post_comments_to_remote(
        &self,
        pr: &PullRequest,
        comments: &[StoredReviewComment],
    ) -> Result<(), RevflowError> {
        let client = self
            .github
            .as_ref()
            .ok_or(RevflowError::LocalMode("set a GitHub token to post comments"))?;
        let number = pr
            .number
            .ok_or(RevflowError::LocalMode("pass --pr <number> to post comments"))?;
        client.create_review(number, &pr.source.commit_hash, comments).await
    }
}
