//! LLM agent collaborators.
//!
//! The workflow consumes agents through two traits that hand back a typed
//! event channel. Events are consumed in emission order by a single reader.

pub mod cli;
pub mod output;
pub mod prompt;

use async_trait::async_trait;
use revflow_core::types::ReviewComment;
use tokio::sync::mpsc;

use crate::error::RevflowError;
use crate::provider::PullRequest;

pub use cli::AgentCli;

/// Progress shown to the operator while an agent works.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentActivity {
    Thinking(String),
    ToolCall { name: String, input: String },
    ToolResult { output: String, is_error: bool },
}

/// Terminal payload of a context run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextData {
    pub source_branch: String,
    pub target_branch: String,
    pub source_commit: String,
    pub context: String,
}

/// Terminal payload of a review run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewData {
    pub source_branch: String,
    pub target_branch: String,
    pub source_commit: String,
    pub comments: Vec<ReviewComment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextEvent {
    Start,
    ToolCall { name: String, input: String },
    ToolResult { output: String, is_error: bool },
    Success,
    Error(String),
    Data(ContextData),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewEvent {
    Start,
    Thinking(String),
    ToolCall { name: String, input: String },
    ToolResult { output: String, is_error: bool },
    Success,
    Error(String),
    Data(ReviewData),
}

/// Inputs for a context-gathering run.
#[derive(Debug, Clone)]
pub struct ContextRequest {
    pub pr: PullRequest,
    pub commit_history: Vec<String>,
    pub edited_files: Vec<String>,
}

/// Inputs for a review run.
#[derive(Debug, Clone)]
pub struct ReviewRequest {
    pub pr: PullRequest,
    pub commit_history: Vec<String>,
    pub diff: String,
    pub edited_files: Vec<String>,
    /// Previously gathered context, if any. A review never forces a gather.
    pub context: Option<String>,
    /// Conventions saved from earlier triage, newest first.
    pub patterns: Vec<String>,
}

/// Gathers external background (tickets, requirements, design notes) for a PR.
#[async_trait]
pub trait ContextGatherer: Send + Sync {
    /// Starts a run. Errors here are setup failures; failures during the run
    /// arrive as [`ContextEvent::Error`].
    async fn gather(
        &self,
        request: ContextRequest,
    ) -> Result<mpsc::Receiver<ContextEvent>, RevflowError>;
}

/// Produces review comments for a PR diff.
#[async_trait]
pub trait CodeReviewer: Send + Sync {
    async fn review(
        &self,
        request: ReviewRequest,
    ) -> Result<mpsc::Receiver<ReviewEvent>, RevflowError>;
}
