//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use paperfeed_core::{ProgressReporter, crawl_window, export_date, fetch_collection};
use paperfeed_shared::{
    AppConfig, CrawlPolicy, OpenReviewConfig, expand_home, init_config, init_config_at,
    load_config, load_config_from,
};
use paperfeed_sources::{ArxivSource, OpenReviewSource, PaperSource, SourceRegistry};
use paperfeed_storage::PaperStore;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// paperfeed: a daily research paper harvester.
#[derive(Parser)]
#[command(
    name = "paperfeed",
    version,
    about = "Harvest research papers from arXiv, Nature and OpenReview into a local record store.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Record store path (overrides `defaults.db_path`).
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Config file path (defaults to ~/.paperfeed/paperfeed.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Store one day's arXiv submissions in the configured categories.
    Crawl {
        /// Target publication date (defaults to yesterday, local time).
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Entries per listing page.
        #[arg(long)]
        page_size: Option<u32>,

        /// Category of interest; repeat to replace the configured set.
        #[arg(long = "category")]
        categories: Vec<String>,
    },

    /// Migrate every submission of an OpenReview venue into the store.
    Fetch {
        /// Ledger of already exported papers to skip.
        #[arg(long)]
        out: PathBuf,

        /// Venue id, e.g. `ICLR.cc/2024/Conference`.
        #[arg(long)]
        venue: String,
    },

    /// Print the abstract for a paper URL.
    Abstract {
        /// arXiv, Nature or OpenReview URL.
        url: String,
    },

    /// List stored papers for a date.
    List {
        /// Publication date (defaults to yesterday, local time).
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Print papers as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Append a date's papers to a ledger file.
    Export {
        /// Publication date to export.
        #[arg(long)]
        date: NaiveDate,

        /// Ledger file to append to.
        #[arg(long)]
        out: PathBuf,
    },

    /// Show recent crawl and fetch runs.
    Runs {
        /// Number of runs to show.
        #[arg(long, default_value = "10")]
        limit: u32,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "paperfeed=info",
        1 => "paperfeed=debug",
        _ => "paperfeed=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    if let Command::Config { action } = &cli.command {
        return match action {
            ConfigAction::Init => cmd_config_init(cli.config.as_deref()),
            ConfigAction::Show => cmd_config_show(cli.config.as_deref()),
        };
    }

    let config = resolve_config(cli.config.as_deref())?;
    let db_path = match cli.db {
        Some(path) => path,
        None => expand_home(&config.defaults.db_path)?,
    };

    match cli.command {
        Command::Crawl {
            date,
            page_size,
            categories,
        } => cmd_crawl(&config, &db_path, date, page_size, categories).await,
        Command::Fetch { out, venue } => cmd_fetch(&config, &db_path, &out, &venue).await,
        Command::Abstract { url } => cmd_abstract(&config, &url).await,
        Command::List { date, json } => cmd_list(&db_path, date, json).await,
        Command::Export { date, out } => cmd_export(&db_path, date, &out).await,
        Command::Runs { limit } => cmd_runs(&db_path, limit).await,
        Command::Config { .. } => unreachable!("handled above"),
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

fn yesterday() -> Result<NaiveDate> {
    Local::now()
        .date_naive()
        .pred_opt()
        .ok_or_else(|| eyre!("cannot compute yesterday's date"))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_crawl(
    config: &AppConfig,
    db_path: &Path,
    date: Option<NaiveDate>,
    page_size: Option<u32>,
    categories: Vec<String>,
) -> Result<()> {
    let target = match date {
        Some(date) => date,
        None => yesterday()?,
    };

    let policy = crawl_policy(config, page_size, categories);

    let source = ArxivSource::new(&config.arxiv.endpoint, policy.categories.iter().cloned())?;
    let mut store = PaperStore::open(db_path).await?;

    info!(
        %target,
        categories = policy.categories.len(),
        page_size = policy.page_size,
        db = %db_path.display(),
        "starting windowed crawl"
    );

    let reporter = CliProgress::new();
    let result = crawl_window(&source, &mut store, &policy, target, &reporter).await;
    reporter.finish();
    let report = result?;

    println!();
    println!("  Crawl of {target} complete");
    println!("  Pages:       {}", report.pages_requested);
    println!("  Seen:        {}", report.entries_seen);
    println!("  Stored:      {}", report.committed);
    println!("  Duplicates:  {}", report.skipped_duplicate);
    println!("  Off-topic:   {}", report.skipped_category);
    println!("  Excluded:    {}", report.skipped_keyword);
    println!("  Bad dates:   {}", report.skipped_malformed);
    println!("  Time:        {:.1}s", report.elapsed_ms as f64 / 1000.0);
    println!();

    Ok(())
}

async fn cmd_fetch(config: &AppConfig, db_path: &Path, out: &Path, venue: &str) -> Result<()> {
    let source = openreview_source(config).await?;
    let mut store = PaperStore::open(db_path).await?;

    info!(venue, ledger = %out.display(), "starting on-demand fetch");

    let reporter = CliProgress::new();
    let result = fetch_collection(&source, &mut store, venue, out, &reporter).await;
    reporter.finish();
    let report = result?;

    println!();
    println!("  Fetch of {venue} complete");
    println!("  Submissions: {}", report.submissions);
    println!("  Stored:      {}", report.stored);
    println!("  In ledger:   {}", report.skipped_ledger);
    println!("  Duplicates:  {}", report.skipped_duplicate);
    println!("  Bad dates:   {}", report.skipped_malformed);
    println!("  Time:        {:.1}s", report.elapsed_ms as f64 / 1000.0);
    println!();

    Ok(())
}

/// Configured policy with the `--page-size` and `--category` overrides.
/// Any `--category` replaces the configured set.
fn crawl_policy(config: &AppConfig, page_size: Option<u32>, categories: Vec<String>) -> CrawlPolicy {
    let mut policy = CrawlPolicy::from(config);
    if let Some(size) = page_size {
        policy.page_size = size;
    }
    if !categories.is_empty() {
        policy.categories = categories.into_iter().collect();
    }
    policy
}

/// How the OpenReview adapter authenticates.
#[derive(Debug, PartialEq, Eq)]
enum OpenReviewAuth {
    Token(String),
    Login { username: String, password: String },
    Anonymous,
}

/// Token first, then a login when both credentials are set, else anonymous.
/// Blank values count as unset.
fn resolve_openreview_auth(
    settings: &OpenReviewConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> OpenReviewAuth {
    let value = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(token) = value(&settings.token_env) {
        return OpenReviewAuth::Token(token);
    }
    match (value(&settings.username_env), value(&settings.password_env)) {
        (Some(username), Some(password)) => OpenReviewAuth::Login { username, password },
        _ => OpenReviewAuth::Anonymous,
    }
}

async fn openreview_source(config: &AppConfig) -> Result<OpenReviewSource> {
    let settings = &config.openreview;

    match resolve_openreview_auth(settings, |name| std::env::var(name).ok()) {
        OpenReviewAuth::Token(token) => {
            info!(env = %settings.token_env, "using OpenReview token");
            Ok(OpenReviewSource::new(
                &settings.api_url,
                &settings.forum_url,
                Some(token),
            )?)
        }
        OpenReviewAuth::Login { username, password } => Ok(OpenReviewSource::login(
            &settings.api_url,
            &settings.forum_url,
            &username,
            &password,
        )
        .await?),
        OpenReviewAuth::Anonymous => {
            warn!(
                token_env = %settings.token_env,
                "no OpenReview credentials set; only public notes are visible"
            );
            Ok(OpenReviewSource::new(
                &settings.api_url,
                &settings.forum_url,
                None,
            )?)
        }
    }
}

async fn cmd_abstract(config: &AppConfig, url: &str) -> Result<()> {
    let registry = SourceRegistry::from_config(config)?;
    let source = registry.detect(url)?;
    info!(url, source = source.name(), "fetching abstract");

    let text = source.fetch_abstract(url).await?;
    println!("{text}");
    Ok(())
}

async fn cmd_list(db_path: &Path, date: Option<NaiveDate>, json: bool) -> Result<()> {
    let date = match date {
        Some(date) => date,
        None => yesterday()?,
    };
    let store = PaperStore::open_readonly(db_path).await?;
    let papers = store.papers_for_date(date).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&papers)?);
        return Ok(());
    }

    if papers.is_empty() {
        println!("No papers stored for {date}.");
        return Ok(());
    }

    println!("{} paper(s) for {date}:", papers.len());
    for paper in &papers {
        let tag = if paper.category.is_empty() {
            paper.source.as_str()
        } else {
            paper.category.as_str()
        };
        println!();
        println!("  [{tag}] {}", paper.title);
        println!("  {}", paper.authors);
        println!("  {}", paper.url);
    }
    Ok(())
}

async fn cmd_export(db_path: &Path, date: NaiveDate, out: &Path) -> Result<()> {
    let store = PaperStore::open_readonly(db_path).await?;
    let written = export_date(&store, date, out).await?;
    println!("Exported {written} paper(s) for {date} to {}", out.display());
    Ok(())
}

async fn cmd_runs(db_path: &Path, limit: u32) -> Result<()> {
    let store = PaperStore::open_readonly(db_path).await?;
    let runs = store.recent_runs(limit).await?;

    if runs.is_empty() {
        println!("No runs recorded.");
        return Ok(());
    }

    for run in &runs {
        let status = run.finished_at.as_deref().unwrap_or("unfinished");
        println!("{}  {:<5}  {}  ({status})", run.started_at, run.kind, run.target);
        if let Some(stats) = &run.stats_json {
            println!("    {stats}");
        }
    }
    Ok(())
}

fn cmd_config_init(path: Option<&Path>) -> Result<()> {
    let path = match path {
        Some(path) => init_config_at(path)?,
        None => init_config()?,
    };
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn page_fetched(&self, offset: u32, entries: usize) {
        self.spinner
            .set_message(format!("Listing page at offset {offset}: {entries} entries"));
    }

    fn item_processed(&self, url: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Storing [{current}/{total}] {url}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn token_wins_over_login() {
        let auth = resolve_openreview_auth(
            &OpenReviewConfig::default(),
            env(&[
                ("OPENREVIEW_TOKEN", "tok-123"),
                ("OPENREVIEW_USERNAME", "maria@example.org"),
                ("OPENREVIEW_PASSWORD", "hunter2"),
            ]),
        );
        assert_eq!(auth, OpenReviewAuth::Token("tok-123".into()));
    }

    #[test]
    fn login_needs_both_credentials() {
        let settings = OpenReviewConfig::default();

        let auth = resolve_openreview_auth(
            &settings,
            env(&[("OPENREVIEW_USERNAME", "maria@example.org"), ("OPENREVIEW_PASSWORD", "hunter2")]),
        );
        assert_eq!(
            auth,
            OpenReviewAuth::Login {
                username: "maria@example.org".into(),
                password: "hunter2".into(),
            }
        );

        let auth = resolve_openreview_auth(&settings, env(&[("OPENREVIEW_USERNAME", "maria@example.org")]));
        assert_eq!(auth, OpenReviewAuth::Anonymous);
    }

    #[test]
    fn blank_or_missing_values_are_anonymous() {
        let settings = OpenReviewConfig::default();
        assert_eq!(resolve_openreview_auth(&settings, env(&[])), OpenReviewAuth::Anonymous);

        let auth = resolve_openreview_auth(
            &settings,
            env(&[
                ("OPENREVIEW_TOKEN", "  "),
                ("OPENREVIEW_USERNAME", "maria@example.org"),
                ("OPENREVIEW_PASSWORD", ""),
            ]),
        );
        assert_eq!(auth, OpenReviewAuth::Anonymous);
    }

    #[test]
    fn configured_env_names_are_used() {
        let settings = OpenReviewConfig {
            token_env: "MY_OR_TOKEN".into(),
            ..OpenReviewConfig::default()
        };
        let auth = resolve_openreview_auth(
            &settings,
            env(&[("OPENREVIEW_TOKEN", "ignored"), ("MY_OR_TOKEN", "tok-456")]),
        );
        assert_eq!(auth, OpenReviewAuth::Token("tok-456".into()));
    }

    #[test]
    fn category_flags_replace_configured_set() {
        let config = AppConfig::default();
        let policy = crawl_policy(&config, Some(25), vec!["stat.ML".into(), "cs.LG".into()]);

        assert_eq!(policy.page_size, 25);
        assert_eq!(
            policy.categories.iter().map(String::as_str).collect::<Vec<_>>(),
            ["cs.LG", "stat.ML"]
        );
        assert_eq!(policy.exclude_keywords, config.filters.exclude_keywords);
    }

    #[test]
    fn no_flags_keep_configured_policy() {
        let config = AppConfig::default();
        let policy = crawl_policy(&config, None, Vec::new());

        assert_eq!(policy.page_size, config.defaults.page_size);
        assert_eq!(policy.categories.len(), config.arxiv.categories.len());
        assert!(policy.categories.contains("cs.CV"));
    }
}
