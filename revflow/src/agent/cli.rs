//! Agent collaborators backed by a streaming agent CLI subprocess.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use super::output::{self, StreamRecord};
use super::prompt;
use super::{
    CodeReviewer, ContextData, ContextEvent, ContextGatherer, ContextRequest, ReviewData,
    ReviewEvent, ReviewRequest,
};
use crate::config::AgentConfig;
use crate::error::RevflowError;

const CHANNEL_CAPACITY: usize = 64;

/// Launches the configured agent command with the prompt as its last argument.
#[derive(Debug, Clone)]
pub struct AgentCli {
    command: String,
    args: Vec<String>,
    timeout: Option<Duration>,
    workdir: PathBuf,
}

impl AgentCli {
    pub fn new(command: impl Into<String>, args: Vec<String>, workdir: impl AsRef<Path>) -> Self {
        Self {
            command: command.into(),
            args,
            timeout: None,
            workdir: workdir.as_ref().to_path_buf(),
        }
    }

    pub fn from_config(config: &AgentConfig, workdir: impl AsRef<Path>) -> Self {
        let mut cli = Self::new(config.command.clone(), config.args.clone(), workdir);
        cli.timeout = config.timeout_secs.map(Duration::from_secs);
        cli
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Spawns one agent session and streams its decoded records.
    ///
    /// The child is killed when the receiver is dropped or the timeout elapses.
    /// Process-level failures arrive as a final [`StreamRecord::Failed`].
    pub async fn run(&self, prompt: String) -> Result<mpsc::Receiver<StreamRecord>, RevflowError> {
        tracing::info!(command = %self.command, prompt_chars = prompt.len(), "starting agent");
        let child = Command::new(&self.command)
            .args(&self.args)
            .arg(prompt)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RevflowError::Agent(format!("failed to start '{}': {e}", self.command)))?;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let timeout = self.timeout;
        tokio::spawn(async move {
            let run = pump(child, tx.clone());
            let outcome = match timeout {
                Some(limit) => tokio::time::timeout(limit, run).await.unwrap_or_else(|_| {
                    Err(RevflowError::Agent(format!("agent timed out after {}s", limit.as_secs())))
                }),
                None => run.await,
            };
            if let Err(e) = outcome {
                tracing::warn!(error = %e, "agent session failed");
                let _ = tx.send(StreamRecord::Failed(e.to_string())).await;
            }
        });
        Ok(rx)
    }
}

/// Forwards stdout records until EOF, then checks the exit status.
async fn pump(mut child: Child, tx: mpsc::Sender<StreamRecord>) -> Result<(), RevflowError> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| RevflowError::Agent("agent stdout unavailable".to_owned()))?;
    let stderr = child.stderr.take();
    let stderr_task = tokio::spawn(async move {
        let mut buf = String::new();
        if let Some(mut err) = stderr {
            let _ = err.read_to_string(&mut buf).await;
        }
        buf
    });

    let mut lines = BufReader::new(stdout).lines();
    let mut saw_result = false;
    while let Some(line) = lines.next_line().await? {
        for record in output::parse_line(&line) {
            tracing::debug!(?record, "agent record");
            saw_result |= matches!(record, StreamRecord::Result { .. });
            if tx.send(record).await.is_err() {
                return Ok(());
            }
        }
    }

    let status = child.wait().await?;
    let stderr = stderr_task.await.unwrap_or_default();
    if !status.success() && !saw_result {
        return Err(RevflowError::Agent(format!("agent exited with {status}: {}", stderr.trim())));
    }
    if !saw_result {
        return Err(RevflowError::Agent("agent finished without a result".to_owned()));
    }
    Ok(())
}

#[async_trait]
impl ContextGatherer for AgentCli {
    async fn gather(
        &self,
        request: ContextRequest,
    ) -> Result<mpsc::Receiver<ContextEvent>, RevflowError> {
        let mut records = self.run(prompt::context_prompt(&request)).await?;
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let pr = request.pr;

        tokio::spawn(async move {
            if tx.send(ContextEvent::Start).await.is_err() {
                return;
            }
            while let Some(record) = records.recv().await {
                let events = match record {
                    StreamRecord::ToolUse { name, input } => {
                        vec![ContextEvent::ToolCall { name, input }]
                    }
                    StreamRecord::ToolResult { output, is_error } => {
                        vec![ContextEvent::ToolResult { output, is_error }]
                    }
                    StreamRecord::Result { text, is_error: false } => {
                        match output::parse_context(&text) {
                            Ok(context) => vec![
                                ContextEvent::Success,
                                ContextEvent::Data(ContextData {
                                    source_branch: pr.source.name.clone(),
                                    target_branch: pr.target.name.clone(),
                                    source_commit: pr.source.commit_hash.clone(),
                                    context,
                                }),
                            ],
                            Err(e) => vec![ContextEvent::Error(e)],
                        }
                    }
                    StreamRecord::Result { text, is_error: true } | StreamRecord::Failed(text) => {
                        vec![ContextEvent::Error(text)]
                    }
                    StreamRecord::Text(_) | StreamRecord::Thinking(_) => continue,
                };
                for event in events {
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
        });
        Ok(rx)
    }
}

#[async_trait]
impl CodeReviewer for AgentCli {
    async fn review(
        &self,
        request: ReviewRequest,
    ) -> Result<mpsc::Receiver<ReviewEvent>, RevflowError> {
        let mut records = self.run(prompt::review_prompt(&request)).await?;
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let pr = request.pr;

        tokio::spawn(async move {
            if tx.send(ReviewEvent::Start).await.is_err() {
                return;
            }
            while let Some(record) = records.recv().await {
                let events = match record {
                    StreamRecord::Thinking(text) => vec![ReviewEvent::Thinking(text)],
                    StreamRecord::ToolUse { name, input } => {
                        vec![ReviewEvent::ToolCall { name, input }]
                    }
                    StreamRecord::ToolResult { output, is_error } => {
                        vec![ReviewEvent::ToolResult { output, is_error }]
                    }
                    StreamRecord::Result { text, is_error: false } => {
                        match output::parse_review(&text) {
                            Ok(comments) => vec![
                                ReviewEvent::Success,
                                ReviewEvent::Data(ReviewData {
                                    source_branch: pr.source.name.clone(),
                                    target_branch: pr.target.name.clone(),
                                    source_commit: pr.source.commit_hash.clone(),
                                    comments,
                                }),
                            ],
                            Err(e) => vec![ReviewEvent::Error(e)],
                        }
                    }
                    StreamRecord::Result { text, is_error: true } | StreamRecord::Failed(text) => {
                        vec![ReviewEvent::Error(text)]
                    }
                    StreamRecord::Text(_) => continue,
                };
                for event in events {
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
        });
        Ok(rx)
    }
}
