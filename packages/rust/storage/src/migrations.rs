//! SQL migration definitions for the paperfeed record store.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: papers, crawl_runs",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Paper records, keyed by canonical URL
CREATE TABLE IF NOT EXISTS papers (
    url            TEXT PRIMARY KEY,
    title          TEXT NOT NULL,
    abstract       TEXT NOT NULL,
    authors        TEXT NOT NULL,
    date_published TEXT NOT NULL,
    source         TEXT NOT NULL,
    keywords       TEXT NOT NULL DEFAULT '',
    category       TEXT NOT NULL DEFAULT '',
    added_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_papers_date ON papers(date_published);
CREATE INDEX IF NOT EXISTS idx_papers_source ON papers(source);

-- Crawl/fetch run history
CREATE TABLE IF NOT EXISTS crawl_runs (
    id          TEXT PRIMARY KEY,
    kind        TEXT NOT NULL,
    target      TEXT NOT NULL,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    stats_json  TEXT
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
