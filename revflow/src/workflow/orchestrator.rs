//! The interactive loop: detect state, ask, execute, advise, repeat.

use std::sync::Arc;

use tokio_rusqlite::Connection;

use super::advisor::{self, Advice};
use super::catalog::{available_actions, menu_options};
use super::executor::ActionExecutor;
use super::state::detect_state;
use super::WorkflowAction;
use crate::error::RevflowError;
use crate::provider::{GitProvider, PullRequest};
use crate::ui::{Choice, Ui};

pub struct Orchestrator {
    conn: Connection,
    ui: Arc<dyn Ui>,
    provider: Arc<dyn GitProvider>,
    executor: ActionExecutor,
}

impl Orchestrator {
    pub fn new(
        conn: Connection,
        ui: Arc<dyn Ui>,
        provider: Arc<dyn GitProvider>,
        executor: ActionExecutor,
    ) -> Self {
        Self { conn, ui, provider, executor }
    }

    /// Runs until the operator exits or cancels the menu.
    ///
    /// # Errors
    ///
    /// Only a store failure while detecting state ends the loop with an
    /// error. Action failures are reported by the executor and the menu is
    /// shown again.
    pub async fn run(&self, pr: PullRequest) -> Result<(), RevflowError> {
        let mut pr = pr;
        let mut chained: Option<WorkflowAction> = None;

        loop {
            pr = self.refresh(pr).await;
            let state = detect_state(&self.conn, &pr).await?;

            let action = match chained.take() {
                Some(action) => {
                    tracing::debug!(%action, "running chained action");
                    action
                }
                None => {
                    self.ui.show_state(&pr, &state);
                    let options = menu_options(&state, &available_actions(&state));
                    let choices: Vec<Choice> = options.iter().map(Choice::from).collect();
                    self.ui
                        .select("What next?", &choices)
                        .await
                        .and_then(|value| value.parse().ok())
                        .unwrap_or(WorkflowAction::Exit)
                }
            };
            if action == WorkflowAction::Exit {
                tracing::info!(pr = %pr.key(), "leaving the workflow");
                return Ok(());
            }

            let outcome = self.executor.execute(action, &pr).await;
            let after = detect_state(&self.conn, &pr).await?;
            match advisor::advise(self.ui.as_ref(), &outcome, &after).await {
                Advice::Chain(next) => chained = Some(next),
                Advice::ShowMenu => {}
            }
        }
    }

    /// Picks up new commits. Keeps the last known PR when the lookup fails.
    async fn refresh(&self, pr: PullRequest) -> PullRequest {
        match self.provider.refresh(&pr).await {
            Ok(fresh) => {
                if fresh.source.commit_hash != pr.source.commit_hash {
                    tracing::info!(
                        from = %pr.source.commit_hash,
                        to = %fresh.source.commit_hash,
                        "source branch moved"
                    );
                }
                fresh
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not refresh the pull request");
                self.ui.warn(&format!(
                    "Could not refresh the pull request, using last known state: {e}"
                ));
                pr
            }
        }
    }
}
