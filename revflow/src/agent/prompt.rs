//! Prompt text handed to the agent CLI.

use std::fmt::Write as _;

use revflow_core::types::StoredReviewComment;

use super::{ContextRequest, ReviewRequest};

fn push_list(out: &mut String, heading: &str, items: &[String]) {
    let _ = writeln!(out, "## {heading}");
    if items.is_empty() {
        out.push_str("(none)\n");
    }
    for item in items {
        let _ = writeln!(out, "- {item}");
    }
    out.push('\n');
}

pub fn context_prompt(req: &ContextRequest) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "You are preparing background for a code review of {} (`{}` into `{}`).\n",
        req.pr.display_name(),
        req.pr.source.name,
        req.pr.target.name
    );
    out.push_str(
        "Find the external context this change implements: issue tracker tickets, \
         requirements and design documents referenced by the branch name or commit \
         messages. Use the tools available to you to read them. Do not review the code.\n\n",
    );
    push_list(&mut out, "Commits", &req.commit_history);
    push_list(&mut out, "Changed files", &req.edited_files);
    out.push_str(
        "Finish with a single JSON object and nothing after it:\n\
         {\"context\": \"<concise summary of requirements, \
         acceptance criteria and constraints>\"}\n\
         If nothing relevant exists, say so in the context string.\n",
    );
    out
}

pub fn review_prompt(req: &ReviewRequest) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "You are reviewing {} (`{}` into `{}`) at commit {}.\n",
        req.pr.display_name(),
        req.pr.source.name,
        req.pr.target.name,
        req.pr.source.commit_hash
    );
    out.push_str(
        "Read the diff and, where needed, the surrounding code in the working copy. \
         Report only findings you can verify. Do not modify any files.\n\n",
    );

    match req.context.as_deref() {
        Some(context) => {
            out.push_str("## Context\n");
            out.push_str(context.trim());
            out.push_str("\n\n");
        }
        None => out.push_str("## Context\nNo external context was gathered.\n\n"),
    }
    if !req.patterns.is_empty() {
        push_list(&mut out, "Team review patterns to apply", &req.patterns);
    }
    push_list(&mut out, "Commits", &req.commit_history);
    push_list(&mut out, "Changed files", &req.edited_files);

    out.push_str("## Diff\n```diff\n");
    out.push_str(&req.diff);
    if !req.diff.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("```\n\n");

    out.push_str(
        "Finish with a single JSON object and nothing after it:\n\
         {\"comments\": [{\"file\": \"path\", \"line\": 12, \
         \"severity\": \"nit|suggestion|issue|risk\", \
         \"confidence\": \"high|medium|low\", \"verifiedBy\": \"how you checked\", \
         \"message\": \"one sentence\", \"rationale\": \"why it matters\"}]}\n\
         Use \"startLine\"/\"endLine\" instead of \"line\" for multi-line findings. \
         Line numbers refer to the new version of the file.\n",
    );
    out
}

pub fn fix_prompt(comment: &StoredReviewComment, notes: Option<&str>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Apply a fix for this review comment on {}.\n", comment.location());
    let _ = writeln!(out, "Severity: {}", comment.severity);
    let _ = writeln!(out, "Comment: {}", comment.message);
    if let Some(rationale) = comment.rationale.as_deref() {
        let _ = writeln!(out, "Rationale: {rationale}");
    }
    if let Some(snippet) = comment.code_snippet.as_deref() {
        let _ = writeln!(out, "\nCode at that location:\n```\n{snippet}\n```");
    }
    if let Some(notes) = notes.map(str::trim).filter(|n| !n.is_empty()) {
        let _ = writeln!(out, "\nReviewer notes: {notes}");
    }
    out.push_str(
        "\nEdit only what the fix requires, keep the existing style, and do not commit. \
         End with a one-paragraph summary of the change.\n",
    );
    out
}
