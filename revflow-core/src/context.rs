//! Context cache: the externally gathered background text for one pull request.
//!
//! One row per PR key. The recorded source commit is metadata used to detect
//! staleness; it is not part of the key, since context rarely depends on code
//! changes. Rows are overwritten by a refresh and never expire on their own.

use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use crate::db::now_secs;
use crate::error::StoreError;
use crate::types::{ContextMeta, NewContext};

/// Returns `true` if a context row exists for `pr_key`.
pub async fn has_context(conn: &Connection, pr_key: &str) -> Result<bool, StoreError> {
    let pr_key = pr_key.to_owned();
    let exists = conn
        .call(move |db| {
            let count: i64 = db.query_row(
                "SELECT COUNT(*) FROM context_cache WHERE pr_key = ?1",
                rusqlite::params![&pr_key],
                |r| r.get(0),
            )?;
            Ok::<_, rusqlite::Error>(count > 0)
        })
        .await?;
    Ok(exists)
}

/// Returns the cached context text for `pr_key`, or `None` when nothing was gathered.
pub async fn get_context(conn: &Connection, pr_key: &str) -> Result<Option<String>, StoreError> {
    let pr_key = pr_key.to_owned();
    let context = conn
        .call(move |db| {
            let context = db
                .query_row(
                    "SELECT context FROM context_cache WHERE pr_key = ?1",
                    rusqlite::params![&pr_key],
                    |r| r.get::<_, String>(0),
                )
                .optional()?;
            Ok::<_, rusqlite::Error>(context)
        })
        .await?;
    Ok(context)
}

/// Returns the gather metadata for `pr_key`.
///
/// `None` when there is no row, and also when the row exists but carries no
/// commit or timestamp (rows written without commit tracking). Callers must
/// not assume that `has_context == true` implies metadata is present.
pub async fn get_context_metadata(
    conn: &Connection,
    pr_key: &str,
) -> Result<Option<ContextMeta>, StoreError> {
    let pr_key = pr_key.to_owned();
    let meta = conn
        .call(move |db| {
            let row: Option<(Option<i64>, Option<String>)> = db
                .query_row(
                    "SELECT gathered_at, gathered_from_commit FROM context_cache WHERE pr_key = ?1",
                    rusqlite::params![&pr_key],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )
                .optional()?;
            let meta = match row {
                Some((Some(gathered_at), Some(commit))) if !commit.is_empty() => Some(ContextMeta {
                    gathered_at,
                    gathered_from_commit: commit,
                }),
                _ => None,
            };
            Ok::<_, rusqlite::Error>(meta)
        })
        .await?;
    Ok(meta)
}

/// Writes (or overwrites) the context row for `pr_key`, stamping it with the
/// current time and `entry.source_commit`.
///
/// Only the `context_cache` table is touched; stored comments are unaffected.
pub async fn set_context(
    conn: &Connection,
    pr_key: &str,
    entry: NewContext,
) -> Result<ContextMeta, StoreError> {
    let pr_key = pr_key.to_owned();
    let meta = conn
        .call(move |db| {
            let now = now_secs();
            let tx = db.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
            tx.execute(
                "INSERT INTO context_cache
                     (pr_key, context, source_branch, target_branch,
                      gathered_at, gathered_from_commit)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(pr_key)
                 DO UPDATE SET context              = excluded.context,
                               source_branch        = excluded.source_branch,
                               target_branch        = excluded.target_branch,
                               gathered_at          = excluded.gathered_at,
                               gathered_from_commit = excluded.gathered_from_commit",
                rusqlite::params![
                    &pr_key,
                    &entry.context,
                    &entry.source_branch,
                    &entry.target_branch,
                    now,
                    &entry.source_commit,
                ],
            )?;
            tx.commit()?;
            Ok::<_, rusqlite::Error>(ContextMeta {
                gathered_at: now,
                gathered_from_commit: entry.source_commit,
            })
        })
        .await?;
    Ok(meta)
}
