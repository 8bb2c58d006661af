use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How serious a review finding is, from cosmetic to dangerous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Nit,
    Suggestion,
    Issue,
    Risk,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Nit => "nit",
            Severity::Suggestion => "suggestion",
            Severity::Issue => "issue",
            Severity::Risk => "risk",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nit" => Ok(Severity::Nit),
            "suggestion" => Ok(Severity::Suggestion),
            "issue" => Ok(Severity::Issue),
            "risk" => Ok(Severity::Risk),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

/// The reviewer's own confidence in a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Confidence::High),
            "medium" => Ok(Confidence::Medium),
            "low" => Ok(Confidence::Low),
            other => Err(format!("unknown confidence '{other}'")),
        }
    }
}

/// Triage status of a stored comment.
///
/// Every stored comment has exactly one status. A missing or unrecognised
/// status column is read back as `Pending` (see [`CommentStatus::from_db`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
    Fixed,
}

impl CommentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CommentStatus::Pending => "pending",
            CommentStatus::Accepted => "accepted",
            CommentStatus::Rejected => "rejected",
            CommentStatus::Fixed => "fixed",
        }
    }

    /// Lenient decoding of the `status` column: NULL and unknown values are pending.
    pub fn from_db(raw: Option<&str>) -> Self {
        match raw {
            Some("accepted") => CommentStatus::Accepted,
            Some("rejected") => CommentStatus::Rejected,
            Some("fixed") => CommentStatus::Fixed,
            _ => CommentStatus::Pending,
        }
    }
}

impl fmt::Display for CommentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A review comment as produced by the reviewer agent, before it is stored.
///
/// Addressing is either single-line (`line`) or a range (`start_line`..=`end_line`).
/// Field names accept both snake_case and the camelCase the agent tends to emit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewComment {
    pub file: String,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default, alias = "startLine")]
    pub start_line: Option<u32>,
    #[serde(default, alias = "endLine")]
    pub end_line: Option<u32>,
    pub severity: Severity,
    #[serde(default)]
    pub confidence: Option<Confidence>,
    #[serde(default, alias = "verifiedBy")]
    pub verified_by: Option<String>,
    pub message: String,
    #[serde(default)]
    pub rationale: Option<String>,
    #[serde(default, alias = "codeSnippet")]
    pub code_snippet: Option<String>,
}

impl ReviewComment {
    /// Convenience constructor for a single-line comment with no optional fields.
    pub fn new(file: &str, line: Option<u32>, severity: Severity, message: &str) -> Self {
        Self {
            file: file.to_owned(),
            line,
            start_line: None,
            end_line: None,
            severity,
            confidence: None,
            verified_by: None,
            message: message.to_owned(),
            rationale: None,
            code_snippet: None,
        }
    }
}

/// A review comment persisted for one pull request, with its triage state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredReviewComment {
    pub id: String,           // UUID v4 text
    pub file: String,
    pub line: Option<u32>,
    pub start_line: Option<u32>,
    pub end_line: Option<u32>,
    pub severity: Severity,
    pub confidence: Option<Confidence>,
    pub verified_by: Option<String>,
    pub message: String,
    pub rationale: Option<String>,
    pub code_snippet: Option<String>,
    pub status: CommentStatus,
    pub memory_created: bool,
}

impl StoredReviewComment {
    /// Human-readable location, e.g. `src/lib.rs:42` or `src/lib.rs:10-14`.
    pub fn location(&self) -> String {
        match (self.line, self.start_line, self.end_line) {
            (Some(line), _, _) => format!("{}:{line}", self.file),
            (None, Some(start), Some(end)) => format!("{}:{start}-{end}", self.file),
            (None, Some(start), None) => format!("{}:{start}", self.file),
            _ => self.file.clone(),
        }
    }

    /// The first and last line this comment addresses, if it addresses any.
    pub fn line_span(&self) -> Option<(u32, u32)> {
        match (self.line, self.start_line, self.end_line) {
            (Some(line), _, _) => Some((line, line)),
            (None, Some(start), end) => Some((start, end.unwrap_or(start).max(start))),
            _ => None,
        }
    }
}

/// Partial update applied by the triage flow. `None` fields are left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommentUpdate {
    pub status: Option<CommentStatus>,
    pub memory_created: Option<bool>,
}

impl CommentUpdate {
    pub fn status(status: CommentStatus) -> Self {
        Self { status: Some(status), memory_created: None }
    }

    pub fn memory_created() -> Self {
        Self { status: None, memory_created: Some(true) }
    }
}

/// When and from which source commit the cached context was gathered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextMeta {
    pub gathered_at: i64,     // Unix timestamp seconds
    pub gathered_from_commit: String,
}

/// The values written into the context cache after a successful gather.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContext {
    pub source_branch: String,
    pub target_branch: String,
    pub source_commit: String,
    pub context: String,
}

/// A reusable review convention saved from a triaged comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewPattern {
    pub id: String,           // UUID v4 text
    pub pr_key: String,
    pub comment_id: String,
    pub file: String,
    pub pattern: String,
    pub created_at: i64,
}

/// Derives the storage key for a pull request.
///
/// Uses the provider-assigned number when known (`pr-42`); otherwise the
/// `source__target` branch pair with every character outside `[A-Za-z0-9._-]`
/// replaced by `_`, so the key is safe to use as a file name as well.
pub fn pr_key(number: Option<u64>, source_branch: &str, target_branch: &str) -> String {
    match number {
        Some(n) => format!("pr-{n}"),
        None => format!("{}__{}", sanitize(source_branch), sanitize(target_branch)),
    }
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect()
}
