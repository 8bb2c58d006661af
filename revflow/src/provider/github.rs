//! Minimal GitHub REST client: read a pull request, post a review.

use std::time::Duration;

use revflow_core::types::StoredReviewComment;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::RevflowError;

const RETRY_MAX_ATTEMPTS: usize = 3;
const RETRY_BASE_DELAY_MS: u64 = 500;

/// `owner/name` of a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    /// Parses an `owner/repo` slug.
    pub fn parse(slug: &str) -> Option<Self> {
        let (owner, name) = slug.trim().split_once('/')?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self { owner: owner.to_owned(), name: name.to_owned() })
    }

    /// Extracts owner and repo from a GitHub remote URL (https, ssh or scp-like).
    pub fn from_remote_url(url: &str) -> Option<Self> {
        let normalized = url.trim().trim_end_matches('/').trim_end_matches(".git");
        let path = normalized
            .strip_prefix("https://github.com/")
            .or_else(|| normalized.strip_prefix("http://github.com/"))
            .or_else(|| normalized.strip_prefix("ssh://git@github.com/"))
            .or_else(|| normalized.strip_prefix("git@github.com:"))?;

        let mut parts = path.split('/');
        let owner = parts.next()?.trim();
        let name = parts.next()?.trim();
        if owner.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self { owner: owner.to_owned(), name: name.to_owned() })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteBranch {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemotePull {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    pub head: RemoteBranch,
    pub base: RemoteBranch,
}

#[derive(Debug, Deserialize)]
struct ReviewCreated {
    id: u64,
}

#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    api_base: String,
    repo: RepoRef,
}

impl GithubClient {
    /// Builds a client with the GitHub API headers and a bearer token.
    ///
    /// # Errors
    ///
    /// `RevflowError::Config` for a token that is not a valid header value,
    /// `RevflowError::Http` if the underlying client cannot be built.
    pub fn new(
        api_base: &str,
        token: &str,
        repo: RepoRef,
        request_timeout_ms: u64,
    ) -> Result<Self, RevflowError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("revflow"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            reqwest::header::HeaderValue::from_static("2022-11-28"),
        );
        let auth_header = format!("Bearer {}", token.trim());
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&auth_header)
                .map_err(|_| RevflowError::Config("invalid github token".to_owned()))?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_owned(),
            repo,
        })
    }

    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }

    /// `GET /repos/{owner}/{repo}/pulls/{number}`.
    pub async fn get_pull(&self, number: u64) -> Result<RemotePull, RevflowError> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{number}",
            self.api_base, self.repo.owner, self.repo.name
        );
        self.request_json("get pull request", || self.http.get(&url)).await
    }

    /// Posts one `COMMENT` review holding every comment.
    ///
    /// Comments with a line or range become inline comments on the right-hand
    /// side of the diff; the rest are listed in the review body.
    pub async fn create_review(
        &self,
        number: u64,
        commit_id: &str,
        comments: &[StoredReviewComment],
    ) -> Result<(), RevflowError> {
        let payload = review_payload(commit_id, comments);
        let url = format!(
            "{}/repos/{}/{}/pulls/{number}/reviews",
            self.api_base, self.repo.owner, self.repo.name
        );
        let created: ReviewCreated = self
            .request_json("create review", || self.http.post(&url).json(&payload))
            .await?;
        tracing::info!(review_id = created.id, count = comments.len(), "posted review");
        Ok(())
    }

    async fn request_json<T, F>(
        &self,
        operation: &'static str,
        mut build: F,
    ) -> Result<T, RevflowError>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt += 1;
            let response = build().send().await?;
            let status = response.status();
            if status.is_success() {
                return Ok(response.json::<T>().await?);
            }

            let body = response.text().await.unwrap_or_default();
            if attempt < RETRY_MAX_ATTEMPTS && is_retryable_status(status.as_u16()) {
                tracing::warn!(
                    operation,
                    status = status.as_u16(),
                    attempt,
                    "retrying github request"
                );
                let delay = RETRY_BASE_DELAY_MS * attempt as u64;
                tokio::time::sleep(Duration::from_millis(delay)).await;
                continue;
            }
            return Err(RevflowError::Remote {
                context: operation,
                status: status.as_u16(),
                body: truncate_for_error(&body, 800),
            });
        }
    }
}

fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

fn truncate_for_error(body: &str, max_chars: usize) -> String {
    if body.chars().count() <= max_chars {
        return body.to_owned();
    }
    let cut: String = body.chars().take(max_chars).collect();
    format!("{cut}...")
}

fn comment_body(comment: &StoredReviewComment) -> String {
    let mut body = format!("**{}**: {}", comment.severity, comment.message);
    if let Some(rationale) = comment.rationale.as_deref().filter(|r| !r.trim().is_empty()) {
        body.push_str("\n\n");
        body.push_str(rationale);
    }
    body
}

fn inline_comment(comment: &StoredReviewComment) -> Option<Value> {
    let body = comment_body(comment);
    match (comment.line, comment.start_line, comment.end_line) {
        (Some(line), _, _) => Some(json!({
            "path": comment.file,
            "body": body,
            "line": line,
            "side": "RIGHT",
        })),
        (None, Some(start), Some(end)) if end > start => Some(json!({
            "path": comment.file,
            "body": body,
            "start_line": start,
            "start_side": "RIGHT",
            "line": end,
            "side": "RIGHT",
        })),
        (None, Some(start), _) => Some(json!({
            "path": comment.file,
            "body": body,
            "line": start,
            "side": "RIGHT",
        })),
        _ => None,
    }
}

fn review_payload(commit_id: &str, comments: &[StoredReviewComment]) -> Value {
    let mut inline = Vec::new();
    let mut file_level = Vec::new();
    for comment in comments {
        match inline_comment(comment) {
            Some(c) => inline.push(c),
            None => file_level.push(format!("- `{}` {}", comment.file, comment_body(comment))),
        }
    }

    let mut body = format!("revflow review: {} comment(s).", comments.len());
    if !file_level.is_empty() {
        body.push_str("\n\n");
        body.push_str(&file_level.join("\n"));
    }

    let mut payload = json!({
        "body": body,
        "event": "COMMENT",
        "comments": inline,
    });
    if !commit_id.is_empty() {
        payload["commit_id"] = Value::String(commit_id.to_owned());
    }
    payload
}
