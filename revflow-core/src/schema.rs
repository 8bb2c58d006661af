/// DDL to create the schema_version tracking table.
///
/// Applied unconditionally on every DB open (before checking the version),
/// using `IF NOT EXISTS` so it is safe to run multiple times.
pub const SCHEMA_VERSION_DDL: &str = "
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER NOT NULL
    ) STRICT;
";

/// DDL for the full v1 schema.
///
/// Contains three tables:
/// - `context_cache`: one row per pull request key holding the gathered context.
///   The commit/timestamp columns are nullable so rows written without commit
///   tracking can still be read (they report no metadata).
/// - `review_comments`: stored review comments, unique per `(pr_key, fingerprint)`.
///   `status` is nullable and unchecked; readers treat NULL or unknown values as pending.
/// - `review_patterns`: reusable conventions saved from triaged comments.
///
/// Comments and context share the database but not a table, so rewriting a
/// context row can never drop triage work.
pub const SCHEMA_V1_SQL: &str = "
    CREATE TABLE IF NOT EXISTS context_cache (
        pr_key               TEXT    PRIMARY KEY,
        context              TEXT    NOT NULL,
        source_branch        TEXT    NOT NULL,
        target_branch        TEXT    NOT NULL,
        gathered_at          INTEGER,
        gathered_from_commit TEXT
    ) STRICT;

    CREATE TABLE IF NOT EXISTS review_comments (
        id             TEXT    PRIMARY KEY,
        pr_key         TEXT    NOT NULL,
        fingerprint    TEXT    NOT NULL,
        file_path      TEXT    NOT NULL,
        line_number    INTEGER,
        start_line     INTEGER,
        end_line       INTEGER,
        severity       TEXT    NOT NULL
                               CHECK(severity IN ('nit','suggestion','issue','risk')),
        confidence     TEXT    CHECK(confidence IS NULL OR confidence IN ('high','medium','low')),
        verified_by    TEXT,
        message        TEXT    NOT NULL,
        rationale      TEXT,
        code_snippet   TEXT,
        status         TEXT,
        memory_created INTEGER NOT NULL DEFAULT 0,
        created_at     INTEGER NOT NULL,
        updated_at     INTEGER NOT NULL,
        UNIQUE (pr_key, fingerprint)
    ) STRICT;

    CREATE INDEX IF NOT EXISTS review_comments_pr_key ON review_comments(pr_key);

    CREATE TABLE IF NOT EXISTS review_patterns (
        id          TEXT    PRIMARY KEY,
        pr_key      TEXT    NOT NULL,
        comment_id  TEXT    NOT NULL,
        file_path   TEXT    NOT NULL,
        pattern     TEXT    NOT NULL,
        created_at  INTEGER NOT NULL
    ) STRICT;
";

/// Runs forward-only schema migration to migrate the DB to the latest version.
///
/// This function is idempotent: safe to call on every startup regardless of
/// whether the schema has already been applied.
///
/// # Errors
///
/// Returns `rusqlite::Error` if the DDL fails or the version row cannot be read.
pub fn migrate(db: &mut rusqlite::Connection) -> rusqlite::Result<()> {
    db.execute_batch(SCHEMA_VERSION_DDL)?;

    let version: i64 = db
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);

    if version < 1 {
        let tx = db.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        tx.execute_batch(SCHEMA_V1_SQL)?;
        tx.execute("INSERT INTO schema_version (version) VALUES (1)", [])?;
        tx.commit()?;
    }

    Ok(())
}
