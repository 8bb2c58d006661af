//! revflow: interactive AI-assisted review of a pull request.
//!
//! Startup order:
//!
//! 1. Parse flags and load the config file (soft failures fall back to defaults).
//! 2. Open the repository on its worker thread, then start file logging under
//!    the working copy so log lines never interleave with prompts.
//! 3. Open the WAL-mode database and resolve the pull request.
//! 4. Check out the source branch unless told not to or the tree is dirty.
//! 5. Install the panic hook and the SIGTERM/SIGINT flag, then run the loop.
//!
//! Whatever ends the loop (exit, signal, error), the operator's original
//! branch is restored best-effort before returning.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use revflow::agent::AgentCli;
use revflow::config::{self, Config};
use revflow::fix::AgentFixSession;
use revflow::git::{spawn_git_worker, GitHandle};
use revflow::provider::github::{GithubClient, RepoRef};
use revflow::provider::WorkingCopyProvider;
use revflow::theme::Theme;
use revflow::tui;
use revflow::ui::{TerminalUi, Ui};
use revflow::workflow::executor::Collaborators;
use revflow::workflow::{ActionExecutor, Orchestrator};

#[derive(Parser, Debug)]
#[command(name = "revflow", version, about = "Interactive AI-assisted review of a pull request")]
struct Cli {
    /// GitHub pull request number. Without it the local branches are reviewed.
    #[arg(long)]
    pr: Option<u64>,

    /// Branch under review. Defaults to the checked-out branch.
    #[arg(long)]
    source: Option<String>,

    /// Branch the change merges into. Defaults to `target_branch` from the config.
    #[arg(long)]
    target: Option<String>,

    /// Path inside the repository to review.
    #[arg(long, default_value = ".")]
    repo: std::path::PathBuf,

    /// Config file to use instead of the default location.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Log at debug level.
    #[arg(long, short)]
    verbose: bool,

    /// Stay on the current branch instead of checking out the source branch.
    #[arg(long)]
    no_checkout: bool,
}

fn init_tracing(log_path: &Path, verbose: bool) -> anyhow::Result<()> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("opening log file {}", log_path.display()))?;

    let default = if verbose { LevelFilter::DEBUG } else { LevelFilter::WARN };
    let env_var = if std::env::var_os("REVFLOW_LOG").is_some() {
        "REVFLOW_LOG"
    } else {
        "RUST_LOG"
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(default.into())
        .with_env_var(env_var)
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .compact()
        .init();
    Ok(())
}

/// Builds the GitHub client when a token is available. Owner and repo come
/// from the config or, failing that, from the `origin` remote.
async fn github_client(config: &Config, git: &GitHandle) -> Option<GithubClient> {
    let token = config.github.token()?;
    let repo = match (&config.github.owner, &config.github.repo) {
        (Some(owner), Some(name)) => RepoRef { owner: owner.clone(), name: name.clone() },
        _ => {
            let url = git.remote_url("origin").await.ok().flatten()?;
            let Some(repo) = RepoRef::from_remote_url(&url) else {
                tracing::warn!(%url, "origin is not a GitHub remote");
                return None;
            };
            repo
        }
    };
    let timeout_ms = config.github.request_timeout_ms;
    match GithubClient::new(&config.github.api_base, &token, repo, timeout_ms) {
        Ok(client) => Some(client),
        Err(e) => {
            tracing::warn!(error = %e, "GitHub client unavailable");
            None
        }
    }
}

/// Resolves once SIGTERM or SIGINT has set `flag`.
async fn shutdown_requested(flag: Arc<AtomicBool>) {
    while !flag.load(Ordering::Relaxed) {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref());

    let git = spawn_git_worker(&cli.repo).context("opening the git repository")?;
    let root = git.workdir().to_path_buf();
    init_tracing(&root.join(&config.log_path), cli.verbose)?;

    let db_path = root.join(&config.db_path);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = revflow_core::db::open_db(&db_path)
        .await
        .with_context(|| format!("opening database {}", db_path.display()))?;

    let github = github_client(&config, &git).await;
    if cli.pr.is_some() && github.is_none() {
        eprintln!(
            "revflow: no GitHub access (set {} and a GitHub origin), reviewing local branches",
            config.github.token_env
        );
    }
    let provider = Arc::new(WorkingCopyProvider::new(git.clone(), github));

    let original_branch = git.current_branch().await?;
    let source = match cli.source.clone().or_else(|| original_branch.clone()) {
        Some(source) => source,
        None if cli.pr.is_some() && provider.is_hosted() => "HEAD".to_owned(),
        None => bail!("HEAD is detached, pass --source <branch>"),
    };
    let target = cli.target.clone().unwrap_or_else(|| config.target_branch.clone());
    let pr = provider
        .open_pull_request(cli.pr, &source, &target)
        .await
        .context("resolving the pull request")?;
    tracing::info!(pr = %pr.key(), source = %pr.source.commit_hash, "reviewing");

    let mut switched = false;
    if !cli.no_checkout && original_branch.as_deref() != Some(pr.source.name.as_str()) {
        if git.is_dirty().await? {
            eprintln!("revflow: the working copy has local changes, staying on the current branch");
        } else {
            git.checkout(&pr.source.name)
                .await
                .with_context(|| format!("checking out {}", pr.source.name))?;
            switched = true;
        }
    }

    tui::install_panic_hook();
    let shutdown = tui::register_shutdown_signals();

    let ui: Arc<dyn Ui> = Arc::new(TerminalUi::new(Theme::from_name(&config.theme))?);
    let agent = AgentCli::from_config(&config.agent, &root);
    let executor = ActionExecutor::new(
        conn.clone(),
        ui.clone(),
        Collaborators {
            provider: provider.clone(),
            gatherer: Arc::new(agent.clone()),
            reviewer: Arc::new(agent.clone()),
            fixer: Arc::new(AgentFixSession::new(agent, git.clone(), conn.clone(), ui.clone())),
        },
    )
    .with_max_patterns(config.agent.max_patterns);
    let orchestrator = Orchestrator::new(conn, ui.clone(), provider, executor);

    let outcome = tokio::select! {
        result = orchestrator.run(pr) => result.map_err(anyhow::Error::from),
        () = shutdown_requested(shutdown) => {
            tracing::info!("shutdown signal received");
            Ok(())
        }
    };

    // Dropping the last UI handle clears the prompt area and restores the terminal.
    drop(orchestrator);
    drop(ui);

    if switched {
        if let Some(branch) = original_branch {
            if let Err(e) = git.checkout(&branch).await {
                tracing::warn!(error = %e, %branch, "could not restore the original branch");
                eprintln!("revflow: could not switch back to {branch}: {e}");
            }
        }
    }
    outcome
}
