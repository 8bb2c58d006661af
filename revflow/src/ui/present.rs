//! Styled transcript lines for everything revflow reports.

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use revflow_core::types::StoredReviewComment;

use super::highlight;
use crate::agent::AgentActivity;
use crate::provider::PullRequest;
use crate::theme::Theme;
use crate::workflow::WorkflowState;

/// Message severities for [`message_line`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Info,
    Success,
    Warn,
    Error,
}

pub fn message_line(tone: Tone, message: &str, theme: &Theme) -> Line<'static> {
    let (glyph, color) = match tone {
        Tone::Info => ("ℹ", theme.info),
        Tone::Success => ("✔", theme.success),
        Tone::Warn => ("⚠", theme.warning),
        Tone::Error => ("✖", theme.error),
    };
    Line::from(vec![
        Span::styled(format!("{glyph} "), Style::default().fg(color)),
        Span::raw(message.to_owned()),
    ])
}

pub fn activity_line(activity: &AgentActivity, theme: &Theme) -> Line<'static> {
    let muted = Style::default().fg(theme.muted);
    match activity {
        AgentActivity::Thinking(text) => Line::from(vec![
            Span::styled("  … ", muted),
            Span::styled(first_line(text), muted.add_modifier(Modifier::ITALIC)),
        ]),
        AgentActivity::ToolCall { name, input } => Line::from(vec![
            Span::styled("  → ", Style::default().fg(theme.accent)),
            Span::styled(name.clone(), Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(format!(" {input}"), muted),
        ]),
        AgentActivity::ToolResult { output, is_error } => {
            let color = if *is_error { theme.error } else { theme.muted };
            Line::from(vec![
                Span::styled("  ← ", Style::default().fg(color)),
                Span::styled(first_line(output), Style::default().fg(color)),
            ])
        }
    }
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or_default().trim().to_owned()
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

pub fn state_lines(pr: &PullRequest, state: &WorkflowState, theme: &Theme) -> Vec<Line<'static>> {
    let heading = Style::default().fg(theme.accent).add_modifier(Modifier::BOLD);
    let muted = Style::default().fg(theme.muted);
    let short = &state.current_commit[..8.min(state.current_commit.len())];

    let context = match (&state.context_meta, state.context_up_to_date) {
        (Some(_), true) => Span::styled("up to date", Style::default().fg(theme.success)),
        (Some(meta), false) => {
            let stale = &meta.gathered_from_commit[..8.min(meta.gathered_from_commit.len())];
            Span::styled(format!("stale (gathered at {stale})"), Style::default().fg(theme.warning))
        }
        (None, _) if state.has_context => {
            Span::styled("present, metadata unreadable", Style::default().fg(theme.warning))
        }
        (None, _) => Span::styled("not gathered", muted),
    };

    let comments = if state.has_comments {
        format!(
            "{} · {} pending · {} accepted · {} fixed · {} rejected",
            plural(state.total_comments(), "comment"),
            state.pending_count,
            state.accepted_count,
            state.fixed_count,
            state.rejected_count
        )
    } else {
        "none yet".to_owned()
    };

    vec![
        Line::default(),
        Line::from(vec![
            Span::styled(pr.display_name(), heading),
            Span::styled(format!("  @ {short}"), muted),
        ]),
        Line::from(vec![Span::styled("  context   ", muted), context]),
        Line::from(vec![Span::styled("  comments  ", muted), Span::raw(comments)]),
    ]
}

pub fn comment_lines(
    comment: &StoredReviewComment,
    index: usize,
    total: usize,
    theme: &Theme,
) -> Vec<Line<'static>> {
    let badge = Style::default()
        .fg(Color::Black)
        .bg(theme.severity(comment.severity))
        .add_modifier(Modifier::BOLD);
    let muted = Style::default().fg(theme.muted);

    let mut header = vec![
        Span::styled(format!("[{index}/{total}] "), muted),
        Span::styled(format!(" {} ", comment.severity.as_str().to_uppercase()), badge),
        Span::raw(" "),
        Span::styled(comment.location(), Style::default().fg(theme.accent)),
    ];
    if let Some(confidence) = comment.confidence {
        header.push(Span::styled(format!("  confidence: {confidence}"), muted));
    }

    let mut lines = vec![Line::default(), Line::from(header)];
    lines.push(Line::from(Span::styled(
        comment.message.clone(),
        Style::default().add_modifier(Modifier::BOLD),
    )));
    if let Some(rationale) = comment.rationale.as_deref() {
        for text in rationale.lines() {
            lines.push(Line::from(Span::raw(text.to_owned())));
        }
    }
    if let Some(verified) = comment.verified_by.as_deref() {
        lines.push(Line::from(Span::styled(format!("verified by: {verified}"), muted)));
    }
    if let Some(snippet) = comment.code_snippet.as_deref() {
        let first = comment.line_span().map(|(start, _)| start).unwrap_or(1);
        lines.extend(highlight::snippet_lines(&comment.file, snippet, first, theme));
    }
    lines
}

pub fn summary_lines(title: &str, rows: &[(&str, usize)], theme: &Theme) -> Vec<Line<'static>> {
    let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    let mut lines = vec![Line::from(Span::styled(
        title.to_owned(),
        Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
    ))];
    for (label, count) in rows {
        lines.push(Line::from(vec![
            Span::styled(format!("  {label:<width$}  "), Style::default().fg(theme.muted)),
            Span::raw(count.to_string()),
        ]));
    }
    lines
}
