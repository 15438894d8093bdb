//! Turso Embedded / libSQL record store for harvested papers.
//!
//! [`PaperStore`] keeps two things apart:
//! - a **staging buffer** of appended papers that are not yet durable, and
//! - a **URL index** (loaded at open, extended on append) used for dedup.
//!
//! [`PaperStore::commit`] flushes the staging buffer in one transaction.
//!
//! **Access rules:** the store assumes a single writer. Check-then-append is
//! not locked; callers hold the store by `&mut` for the duration of a run.

mod migrations;

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use libsql::{Connection, Database, params};
use paperfeed_shared::{Paper, PaperfeedError, Result};
use uuid::Uuid;

/// Primary record store handle wrapping a libSQL database.
pub struct PaperStore {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
    /// Every URL committed or staged.
    known_urls: HashSet<String>,
    /// Appended but not yet committed, in append order.
    staged: Vec<Paper>,
}

impl PaperStore {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PaperfeedError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| PaperfeedError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| PaperfeedError::Storage(e.to_string()))?;

        let mut store = Self {
            db,
            conn,
            readonly: false,
            known_urls: HashSet::new(),
            staged: Vec::new(),
        };
        store.run_migrations().await?;
        store.load_url_index().await?;
        Ok(store)
    }

    /// Open an existing database at `path` for queries only.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PaperfeedError::Storage(format!(
                "no record store at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| PaperfeedError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| PaperfeedError::Storage(e.to_string()))?;

        let mut store = Self {
            db,
            conn,
            readonly: true,
            known_urls: HashSet::new(),
            staged: Vec::new(),
        };
        store.load_url_index().await?;
        Ok(store)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        PaperfeedError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Populate the URL index from committed rows.
    async fn load_url_index(&mut self) -> Result<()> {
        let mut rows = self
            .conn
            .query("SELECT url FROM papers", params![])
            .await
            .map_err(|e| PaperfeedError::Storage(e.to_string()))?;

        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| PaperfeedError::Storage(e.to_string()))?
        {
            let url: String = row
                .get(0)
                .map_err(|e| PaperfeedError::Storage(e.to_string()))?;
            self.known_urls.insert(url);
        }

        tracing::debug!(urls = self.known_urls.len(), "loaded URL index");
        Ok(())
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(PaperfeedError::Storage(
                "record store is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Dedup + staging
    // -----------------------------------------------------------------------

    /// Whether `url` is already committed or staged.
    pub fn contains_url(&self, url: &str) -> bool {
        self.known_urls.contains(url)
    }

    /// Stage `paper` for the next commit.
    ///
    /// Returns `false` and does nothing when its URL is already known.
    pub fn append(&mut self, paper: Paper) -> bool {
        if !self.known_urls.insert(paper.url.clone()) {
            tracing::debug!(url = %paper.url, "duplicate append ignored");
            return false;
        }
        self.staged.push(paper);
        true
    }

    /// Number of staged, uncommitted papers.
    pub fn pending(&self) -> usize {
        self.staged.len()
    }

    /// Flush staged papers to disk in one transaction.
    ///
    /// Returns the number of papers written. On failure nothing is written
    /// and the staged papers are kept.
    pub async fn commit(&mut self) -> Result<usize> {
        self.check_writable()?;
        if self.staged.is_empty() {
            return Ok(0);
        }

        let now = Utc::now().to_rfc3339();
        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| PaperfeedError::Storage(e.to_string()))?;

        for paper in &self.staged {
            tx.execute(
                "INSERT OR IGNORE INTO papers
                   (url, title, abstract, authors, date_published, source, keywords, category, added_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    paper.url.as_str(),
                    paper.title.as_str(),
                    paper.abstract_text.as_str(),
                    paper.authors.as_str(),
                    paper.date_published.to_string(),
                    paper.source.as_str(),
                    paper.keywords.as_str(),
                    paper.category.as_str(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(|e| PaperfeedError::Storage(format!("insert {}: {e}", paper.url)))?;
        }

        tx.commit()
            .await
            .map_err(|e| PaperfeedError::Storage(e.to_string()))?;

        let written = self.staged.len();
        self.staged.clear();
        tracing::debug!(written, "committed staged papers");
        Ok(written)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// All papers published on `date`, committed or staged, ordered by URL.
    pub async fn papers_for_date(&self, date: NaiveDate) -> Result<Vec<Paper>> {
        let mut rows = self
            .conn
            .query(
                "SELECT url, title, abstract, authors, date_published, source, keywords, category
                 FROM papers WHERE date_published = ?1 ORDER BY url",
                params![date.to_string()],
            )
            .await
            .map_err(|e| PaperfeedError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| PaperfeedError::Storage(e.to_string()))?
        {
            results.push(row_to_paper(&row)?);
        }

        results.extend(
            self.staged
                .iter()
                .filter(|p| p.date_published == date)
                .cloned(),
        );
        results.sort_by(|a, b| a.url.cmp(&b.url));
        Ok(results)
    }

    /// Number of committed papers.
    pub async fn count(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM papers", params![])
            .await
            .map_err(|e| PaperfeedError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).unwrap_or(0) as usize),
            Ok(None) => Ok(0),
            Err(e) => Err(PaperfeedError::Storage(e.to_string())),
        }
    }

    // -----------------------------------------------------------------------
    // Run bookkeeping
    // -----------------------------------------------------------------------

    /// Record the start of a run. Returns the generated run ID.
    pub async fn start_run(&self, kind: &str, target: &str) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO crawl_runs (id, kind, target, started_at) VALUES (?1, ?2, ?3, ?4)",
                params![id.as_str(), kind, target, now.as_str()],
            )
            .await
            .map_err(|e| PaperfeedError::Storage(e.to_string()))?;
        Ok(id)
    }

    /// Mark a run finished with its stats.
    pub async fn finish_run(&self, run_id: &str, stats_json: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE crawl_runs SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![now.as_str(), stats_json, run_id],
            )
            .await
            .map_err(|e| PaperfeedError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Record a finished run in one write. Returns the generated run ID.
    pub async fn record_run(
        &self,
        kind: &str,
        target: &str,
        started_at: DateTime<Utc>,
        stats_json: &str,
    ) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let started = started_at.to_rfc3339();
        let finished = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO crawl_runs (id, kind, target, started_at, finished_at, stats_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id.as_str(), kind, target, started.as_str(), finished.as_str(), stats_json],
            )
            .await
            .map_err(|e| PaperfeedError::Storage(e.to_string()))?;
        Ok(id)
    }

    /// Most recent runs, newest first.
    pub async fn recent_runs(&self, limit: u32) -> Result<Vec<RunRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, kind, target, started_at, finished_at, stats_json
                 FROM crawl_runs ORDER BY started_at DESC, id DESC LIMIT ?1",
                params![limit],
            )
            .await
            .map_err(|e| PaperfeedError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| PaperfeedError::Storage(e.to_string()))?
        {
            results.push(RunRecord {
                id: row
                    .get::<String>(0)
                    .map_err(|e| PaperfeedError::Storage(e.to_string()))?,
                kind: row
                    .get::<String>(1)
                    .map_err(|e| PaperfeedError::Storage(e.to_string()))?,
                target: row
                    .get::<String>(2)
                    .map_err(|e| PaperfeedError::Storage(e.to_string()))?,
                started_at: row
                    .get::<String>(3)
                    .map_err(|e| PaperfeedError::Storage(e.to_string()))?,
                finished_at: row.get::<String>(4).ok(),
                stats_json: row.get::<String>(5).ok(),
            });
        }
        Ok(results)
    }
}

/// A row from `crawl_runs`.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: String,
    /// `crawl` or `fetch`.
    pub kind: String,
    /// Target date or collection id.
    pub target: String,
    pub started_at: String,
    /// `None` while running or after an aborted run.
    pub finished_at: Option<String>,
    pub stats_json: Option<String>,
}

/// Convert a database row to a [`Paper`].
fn row_to_paper(row: &libsql::Row) -> Result<Paper> {
    let date: String = row
        .get(4)
        .map_err(|e| PaperfeedError::Storage(e.to_string()))?;

    Ok(Paper {
        url: row
            .get::<String>(0)
            .map_err(|e| PaperfeedError::Storage(e.to_string()))?,
        title: row
            .get::<String>(1)
            .map_err(|e| PaperfeedError::Storage(e.to_string()))?,
        abstract_text: row
            .get::<String>(2)
            .map_err(|e| PaperfeedError::Storage(e.to_string()))?,
        authors: row
            .get::<String>(3)
            .map_err(|e| PaperfeedError::Storage(e.to_string()))?,
        date_published: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .map_err(|e| PaperfeedError::Storage(format!("invalid date {date:?}: {e}")))?,
        source: row
            .get::<String>(5)
            .map_err(|e| PaperfeedError::Storage(e.to_string()))?,
        keywords: row.get::<String>(6).unwrap_or_default(),
        category: row.get::<String>(7).unwrap_or_default(),
    })
}
