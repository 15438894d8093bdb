//! Application configuration for paperfeed.
//!
//! User config lives at `~/.paperfeed/paperfeed.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PaperfeedError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "paperfeed.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".paperfeed";

// ---------------------------------------------------------------------------
// Config structs (matching paperfeed.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// arXiv listing source.
    #[serde(default)]
    pub arxiv: ArxivConfig,

    /// Keyword exclusion.
    #[serde(default)]
    pub filters: FiltersConfig,

    /// Nature article scraping.
    #[serde(default)]
    pub nature: NatureConfig,

    /// OpenReview submissions.
    #[serde(default)]
    pub openreview: OpenReviewConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Record store location. `~` expands to the home directory.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Listing page size.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            page_size: default_page_size(),
        }
    }
}

fn default_db_path() -> String {
    "~/.paperfeed/papers.db".into()
}
fn default_page_size() -> u32 {
    100
}

/// `[arxiv]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArxivConfig {
    /// Atom query endpoint.
    #[serde(default = "default_arxiv_endpoint")]
    pub endpoint: String,

    /// Primary categories of interest.
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
}

impl Default for ArxivConfig {
    fn default() -> Self {
        Self {
            endpoint: default_arxiv_endpoint(),
            categories: default_categories(),
        }
    }
}

fn default_arxiv_endpoint() -> String {
    "http://export.arxiv.org/api/query".into()
}
fn default_categories() -> Vec<String> {
    ["cs.LG", "cs.AI", "cs.CV", "cs.CL"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// `[filters]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiltersConfig {
    /// Abstracts containing any of these (case-insensitive) are skipped.
    #[serde(default = "default_exclude_keywords")]
    pub exclude_keywords: Vec<String>,
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            exclude_keywords: default_exclude_keywords(),
        }
    }
}

fn default_exclude_keywords() -> Vec<String> {
    [
        "adversarial attacks",
        "blockchain",
        "emotion recognition",
        "occupancy prediction",
        "federated",
        "motion capture",
        "shape reconstruction",
        "surveillance",
        "structure prediction",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// `[nature]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NatureConfig {
    #[serde(default = "default_nature_base")]
    pub base_url: String,
}

impl Default for NatureConfig {
    fn default() -> Self {
        Self {
            base_url: default_nature_base(),
        }
    }
}

fn default_nature_base() -> String {
    "https://www.nature.com".into()
}

/// `[openreview]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenReviewConfig {
    /// JSON API base.
    #[serde(default = "default_openreview_api")]
    pub api_url: String,

    /// Public site base used to build forum URLs.
    #[serde(default = "default_openreview_forum")]
    pub forum_url: String,

    /// Name of the env var holding a ready access token (never store the token itself).
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Env var holding the login email, used when no token is set.
    #[serde(default = "default_username_env")]
    pub username_env: String,

    /// Env var holding the login password, used when no token is set.
    #[serde(default = "default_password_env")]
    pub password_env: String,
}

impl Default for OpenReviewConfig {
    fn default() -> Self {
        Self {
            api_url: default_openreview_api(),
            forum_url: default_openreview_forum(),
            token_env: default_token_env(),
            username_env: default_username_env(),
            password_env: default_password_env(),
        }
    }
}

fn default_openreview_api() -> String {
    "https://api2.openreview.net".into()
}
fn default_openreview_forum() -> String {
    "https://openreview.net".into()
}
fn default_token_env() -> String {
    "OPENREVIEW_TOKEN".into()
}
fn default_username_env() -> String {
    "OPENREVIEW_USERNAME".into()
}
fn default_password_env() -> String {
    "OPENREVIEW_PASSWORD".into()
}

// ---------------------------------------------------------------------------
// Crawl policy (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime filtering policy for a windowed crawl.
#[derive(Debug, Clone)]
pub struct CrawlPolicy {
    /// Primary categories an entry must belong to. Empty admits nothing.
    pub categories: BTreeSet<String>,
    /// Case-insensitive substrings that exclude an abstract.
    pub exclude_keywords: Vec<String>,
    /// Entries requested per listing page.
    pub page_size: u32,
}

impl From<&AppConfig> for CrawlPolicy {
    fn from(config: &AppConfig) -> Self {
        Self {
            categories: config.arxiv.categories.iter().cloned().collect(),
            exclude_keywords: config.filters.exclude_keywords.clone(),
            page_size: config.defaults.page_size,
        }
    }
}

impl Default for CrawlPolicy {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.paperfeed/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PaperfeedError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.paperfeed/paperfeed.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| PaperfeedError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PaperfeedError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        PaperfeedError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    init_config_at(&config_file_path()?)
}

/// Write a default config file at `path`, creating parent directories.
pub fn init_config_at(path: &Path) -> Result<PathBuf> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| PaperfeedError::io(dir, e))?;
    }

    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PaperfeedError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| PaperfeedError::io(path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path.to_path_buf())
}
