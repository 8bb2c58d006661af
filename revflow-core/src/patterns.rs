//! Reusable review conventions saved from triaged comments.

use tokio_rusqlite::Connection;

use crate::db::now_secs;
use crate::error::StoreError;
use crate::types::{ReviewPattern, StoredReviewComment};

/// Saves `pattern` as a reusable convention derived from `comment`.
pub async fn save_pattern(
    conn: &Connection,
    pr_key: &str,
    comment: &StoredReviewComment,
    pattern: &str,
) -> Result<ReviewPattern, StoreError> {
    let saved = ReviewPattern {
        id: uuid::Uuid::new_v4().to_string(),
        pr_key: pr_key.to_owned(),
        comment_id: comment.id.clone(),
        file: comment.file.clone(),
        pattern: pattern.trim().to_owned(),
        created_at: now_secs(),
    };
    let row = saved.clone();

    conn.call(move |db| {
        let tx = db.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO review_patterns (id, pr_key, comment_id, file_path, pattern, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                &row.id,
                &row.pr_key,
                &row.comment_id,
                &row.file,
                &row.pattern,
                row.created_at,
            ],
        )?;
        tx.commit()?;
        Ok::<_, rusqlite::Error>(())
    })
    .await?;

    Ok(saved)
}

/// Lists the `limit` most recent patterns across all pull requests, newest first.
pub async fn list_patterns(
    conn: &Connection,
    limit: usize,
) -> Result<Vec<ReviewPattern>, StoreError> {
    let limit = limit as i64;
    let rows = conn
        .call(move |db| {
            let mut stmt = db.prepare(
                "SELECT id, pr_key, comment_id, file_path, pattern, created_at
                 FROM review_patterns
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?1",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![limit], |r| {
                    Ok(ReviewPattern {
                        id: r.get(0)?,
                        pr_key: r.get(1)?,
                        comment_id: r.get(2)?,
                        file: r.get(3)?,
                        pattern: r.get(4)?,
                        created_at: r.get(5)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok::<_, rusqlite::Error>(rows)
        })
        .await?;
    Ok(rows)
}
