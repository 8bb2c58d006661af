//! Durable per-PR store of review comments and their triage status.
//!
//! Comment identity across review runs is the content fingerprint
//! (see [`fingerprint`]), never the stored `id`. Saving a fresh batch therefore
//! keeps the id, status and memory flag of every comment the reviewer reports
//! again, and only assigns new ids to findings that were not seen before.
//! Comments missing from a fresh batch stay untouched: review runs are additive.

use std::collections::HashSet;

use rusqlite::OptionalExtension;
use sha2::{Digest, Sha256};
use tokio_rusqlite::Connection;

use crate::db::now_secs;
use crate::error::StoreError;
use crate::types::{CommentStatus, CommentUpdate, ReviewComment, StoredReviewComment};

const SELECT_COLUMNS: &str = "id, file_path, line_number, start_line, end_line, severity,
     confidence, verified_by, message, rationale, code_snippet, status, memory_created";

/// Content fingerprint of a comment: `sha256(file, line-or-0, normalized message)`.
///
/// The message is lower-cased with whitespace runs collapsed, so rewording that
/// only changes case or spacing still maps to the same logical comment.
pub fn fingerprint(file: &str, line: Option<u32>, message: &str) -> String {
    let normalized = message
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(file.as_bytes());
    hasher.update([0u8]);
    hasher.update(line.unwrap_or(0).to_string().as_bytes());
    hasher.update([0u8]);
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn row_to_comment(r: &rusqlite::Row<'_>) -> rusqlite::Result<StoredReviewComment> {
    let severity_raw: String = r.get(5)?;
    let severity = severity_raw.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, e.into())
    })?;
    let confidence: Option<String> = r.get(6)?;
    let status: Option<String> = r.get(11)?;
    Ok(StoredReviewComment {
        id: r.get(0)?,
        file: r.get(1)?,
        line: r.get(2)?,
        start_line: r.get(3)?,
        end_line: r.get(4)?,
        severity,
        confidence: confidence.and_then(|c| c.parse().ok()),
        verified_by: r.get(7)?,
        message: r.get(8)?,
        rationale: r.get(9)?,
        code_snippet: r.get(10)?,
        status: CommentStatus::from_db(status.as_deref()),
        memory_created: r.get(12)?,
    })
}

fn select_comments(
    db: &rusqlite::Connection,
    pr_key: &str,
) -> rusqlite::Result<Vec<StoredReviewComment>> {
    let mut stmt = db.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM review_comments WHERE pr_key = ?1 ORDER BY rowid"
    ))?;
    let rows = stmt
        .query_map(rusqlite::params![pr_key], row_to_comment)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Loads every stored comment for `pr_key` in insertion order.
///
/// Returns an empty `Vec` when the PR has never been reviewed.
///
/// # Errors
///
/// Returns `StoreError::Db` if the query fails.
pub async fn get_comments(
    conn: &Connection,
    pr_key: &str,
) -> Result<Vec<StoredReviewComment>, StoreError> {
    let pr_key = pr_key.to_owned();
    let rows = conn
        .call(move |db| Ok::<_, rusqlite::Error>(select_comments(db, &pr_key)?))
        .await?;
    Ok(rows)
}

/// Loads a single comment by id, or `None` if it does not exist for `pr_key`.
pub async fn get_comment(
    conn: &Connection,
    pr_key: &str,
    id: &str,
) -> Result<Option<StoredReviewComment>, StoreError> {
    let pr_key = pr_key.to_owned();
    let id = id.to_owned();
    let row = conn
        .call(move |db| {
            let row = db
                .query_row(
                    &format!(
                        "SELECT {SELECT_COLUMNS} FROM review_comments WHERE pr_key = ?1 AND id = ?2"
                    ),
                    rusqlite::params![&pr_key, &id],
                    row_to_comment,
                )
                .optional()?;
            Ok::<_, rusqlite::Error>(row)
        })
        .await?;
    Ok(row)
}

/// Merges `fresh` comments into the store for `pr_key` and returns the merged set.
///
/// For each fresh comment, in order:
/// - if its fingerprint already exists, only content fields are refreshed
///   (message wording, addressing, severity, and any optional field the fresh
///   comment carries); `id`, `status` and `memory_created` are preserved;
/// - otherwise it is inserted with a new UUID v4 and `status = pending`.
///
/// Duplicate fingerprints within `fresh` collapse to the first occurrence.
/// Existing comments not present in `fresh` are retained unchanged. The whole
/// merge runs in a single `BEGIN IMMEDIATE` transaction, so saving the same
/// batch twice yields the same rows as saving it once.
///
/// # Errors
///
/// Returns `StoreError::Db` if the transaction fails; nothing is written in that case.
pub async fn save_comments(
    conn: &Connection,
    pr_key: &str,
    fresh: Vec<ReviewComment>,
) -> Result<Vec<StoredReviewComment>, StoreError> {
    let pr_key = pr_key.to_owned();

    let merged = conn
        .call(move |db| {
            let now = now_secs();
            let tx = db.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
            let mut seen: HashSet<String> = HashSet::new();

            for comment in &fresh {
                let fp = fingerprint(&comment.file, comment.line, &comment.message);
                if !seen.insert(fp.clone()) {
                    continue;
                }

                let existing: Option<String> = tx
                    .query_row(
                        "SELECT id FROM review_comments WHERE pr_key = ?1 AND fingerprint = ?2",
                        rusqlite::params![&pr_key, &fp],
                        |r| r.get(0),
                    )
                    .optional()?;

                let confidence = comment.confidence.map(|c| c.as_str());
                match existing {
                    Some(id) => {
                        tx.execute(
                            "UPDATE review_comments
                             SET file_path    = ?1,
                                 line_number  = ?2,
                                 start_line   = ?3,
                                 end_line     = ?4,
                                 severity     = ?5,
                                 confidence   = COALESCE(?6, confidence),
                                 verified_by  = COALESCE(?7, verified_by),
                                 message      = ?8,
                                 rationale    = COALESCE(?9, rationale),
                                 code_snippet = COALESCE(?10, code_snippet),
                                 updated_at   = ?11
                             WHERE id = ?12",
                            rusqlite::params![
                                &comment.file,
                                comment.line,
                                comment.start_line,
                                comment.end_line,
                                comment.severity.as_str(),
                                confidence,
                                &comment.verified_by,
                                &comment.message,
                                &comment.rationale,
                                &comment.code_snippet,
                                now,
                                &id,
                            ],
                        )?;
                    }
                    None => {
                        let id = uuid::Uuid::new_v4().to_string();
                        tx.execute(
                            "INSERT INTO review_comments
                                 (id, pr_key, fingerprint, file_path, line_number, start_line,
                                  end_line, severity, confidence, verified_by, message, rationale,
                                  code_snippet, status, memory_created, created_at, updated_at)
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                                     'pending', 0, ?14, ?14)",
                            rusqlite::params![
                                &id,
                                &pr_key,
                                &fp,
                                &comment.file,
                                comment.line,
                                comment.start_line,
                                comment.end_line,
                                comment.severity.as_str(),
                                confidence,
                                &comment.verified_by,
                                &comment.message,
                                &comment.rationale,
                                &comment.code_snippet,
                                now,
                            ],
                        )?;
                    }
                }
            }

            tx.commit()?;
            Ok::<_, rusqlite::Error>(select_comments(db, &pr_key)?)
        })
        .await?;

    Ok(merged)
}

/// Applies a partial update to comment `id` of `pr_key`.
///
/// Each decision of the triage flow is written through this function as soon
/// as it is made, so an interrupted session keeps every decision taken so far.
///
/// # Errors
///
/// Returns `StoreError::NotFound` if no comment with that id exists for the PR,
/// or `StoreError::Db` if the write fails.
pub async fn update_comment(
    conn: &Connection,
    pr_key: &str,
    id: &str,
    update: CommentUpdate,
) -> Result<(), StoreError> {
    let key = pr_key.to_owned();
    let comment_id = id.to_owned();

    let changed = conn
        .call(move |db| {
            let now = now_secs();
            let status = update.status.map(|s| s.as_str());
            let tx = db.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
            let changed = tx.execute(
                "UPDATE review_comments
                 SET status         = COALESCE(?1, status),
                     memory_created = COALESCE(?2, memory_created),
                     updated_at     = ?3
                 WHERE pr_key = ?4 AND id = ?5",
                rusqlite::params![status, update.memory_created, now, &key, &comment_id],
            )?;
            tx.commit()?;
            Ok::<_, rusqlite::Error>(changed)
        })
        .await?;

    if changed == 0 {
        return Err(StoreError::NotFound {
            pr_key: pr_key.to_owned(),
            id: id.to_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_ignores_case_and_spacing() {
        let a = fingerprint("src/a.rs", Some(3), "Missing  null check");
        let b = fingerprint("src/a.rs", Some(3), "missing null check ");
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_distinguishes_file_and_line() {
        let base = fingerprint("src/a.rs", Some(3), "m");
        assert_ne!(base, fingerprint("src/b.rs", Some(3), "m"));
        assert_ne!(base, fingerprint("src/a.rs", Some(4), "m"));
        assert_eq!(fingerprint("src/a.rs", None, "m"), fingerprint("src/a.rs", Some(0), "m"));
    }
}
