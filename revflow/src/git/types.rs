//! Owned data types returned by the git background thread.
//!
//! All types are fully owned and `Send` so they can leave the thread that
//! owns the `git2::Repository`.

/// Per-file statistics for a diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSummary {
    /// Repository-relative path to the file.
    pub path: String,
    /// Status character: `'M'` modified, `'A'` added, `'D'` deleted, `'R'` renamed.
    pub status: char,
    /// Number of lines added in this file.
    pub added: usize,
    /// Number of lines removed from this file.
    pub removed: usize,
}

/// A unified patch between two revisions plus its per-file summary.
#[derive(Debug, Clone, Default)]
pub struct DiffSnapshot {
    /// The full unified diff text, `git diff base...head` style.
    pub patch: String,
    /// One entry per changed file, in diff order.
    pub files: Vec<FileSummary>,
}

/// One commit on the pull request branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    pub id: String,
    pub summary: String,
}

impl CommitSummary {
    /// `abcdef12 Subject line`, the form handed to the agents.
    pub fn one_line(&self) -> String {
        let short = &self.id[..8.min(self.id.len())];
        format!("{short} {}", self.summary)
    }
}
