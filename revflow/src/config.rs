//! User configuration for revflow.
//!
//! Read from `$XDG_CONFIG_HOME/revflow/config.toml` (or `~/.config/revflow/config.toml`).
//! Every key is optional. A missing file means defaults; an unparsable file is
//! reported on stderr and also means defaults, so a typo never blocks a review.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Fully resolved configuration with defaults applied.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Theme name, see [`crate::theme::Theme::from_name`].
    pub theme: String,
    /// Branch the pull request merges into when it cannot be looked up remotely.
    pub target_branch: String,
    /// SQLite database holding context, comments and patterns.
    pub db_path: PathBuf,
    /// Log file written by the tracing subscriber.
    pub log_path: PathBuf,
    pub agent: AgentConfig,
    pub github: GithubConfig,
}

/// How to launch the LLM agent CLI used for context, review and fixes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub command: String,
    /// Arguments placed before the prompt. The prompt is always passed last.
    pub args: Vec<String>,
    /// Hard limit for a single agent run; `None` waits indefinitely.
    pub timeout_secs: Option<u64>,
    /// How many saved review patterns are fed into each review prompt.
    pub max_patterns: usize,
}

/// GitHub REST settings. Owner and repo default to the `origin` remote.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub api_base: String,
    /// Name of the environment variable holding the API token.
    pub token_env: String,
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub request_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: "catppuccin-mocha".to_owned(),
            target_branch: "main".to_owned(),
            db_path: PathBuf::from(".revflow/revflow.db"),
            log_path: PathBuf::from(".revflow/revflow.log"),
            agent: AgentConfig::default(),
            github: GithubConfig::default(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: "claude".to_owned(),
            args: vec![
                "-p".to_owned(),
                "--output-format".to_owned(),
                "stream-json".to_owned(),
                "--verbose".to_owned(),
            ],
            timeout_secs: None,
            max_patterns: 20,
        }
    }
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_owned(),
            token_env: "GITHUB_TOKEN".to_owned(),
            owner: None,
            repo: None,
            request_timeout_ms: 30_000,
        }
    }
}

impl GithubConfig {
    /// Reads the token from the configured environment variable, if set and non-empty.
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty())
    }
}

/// Returns the path to the revflow config file.
///
/// Prefers `$XDG_CONFIG_HOME/revflow/config.toml`; falls back to
/// `~/.config/revflow/config.toml` when the env var is absent.
pub fn config_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        })
        .unwrap_or_else(|| PathBuf::from(".config"));
    base.join("revflow").join("config.toml")
}

/// Loads the configuration from `path`, or from [`config_path`] when `None`.
///
/// Never fails: read and parse errors are printed to stderr and defaults are used.
pub fn load(path: Option<&Path>) -> Config {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_path);
    let raw = match std::fs::read_to_string(&path) {
        Ok(s) => s,
        Err(_) => return Config::default(),
    };
    match parse(&raw) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("revflow: config parse error in {:?}: {}", path, e);
            Config::default()
        }
    }
}

/// Parses a TOML document into a [`Config`], filling absent keys with defaults.
pub fn parse(raw: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.target_branch, "main");
        assert_eq!(config.agent.command, "claude");
        assert_eq!(config.github.token_env, "GITHUB_TOKEN");
    }

    #[test]
    fn partial_tables_keep_remaining_defaults() {
        let config = parse(
            r#"
            target_branch = "develop"

            [agent]
            command = "my-agent"
            timeout_secs = 600

            [github]
            owner = "acme"
            "#,
        )
        .unwrap();
        assert_eq!(config.target_branch, "develop");
        assert_eq!(config.agent.command, "my-agent");
        assert_eq!(config.agent.timeout_secs, Some(600));
        assert_eq!(config.agent.args[0], "-p");
        assert_eq!(config.github.owner.as_deref(), Some("acme"));
        assert_eq!(config.github.api_base, "https://api.github.com");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = load(Some(&dir.path().join("absent.toml")));
        assert_eq!(config.db_path, PathBuf::from(".revflow/revflow.db"));
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "theme = [unterminated").unwrap();
        let config = load(Some(&path));
        assert_eq!(config.theme, "catppuccin-mocha");
    }
}
