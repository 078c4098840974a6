// Configuration loading and parsing (concierge.toml, credentials.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub data: DataPaths,
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub site: SiteConfig,
    pub credentials: CredentialsConfig,
}

// ---------------------------------------------------------------------------
// concierge.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire concierge.toml file.
#[derive(Debug, Clone, Deserialize)]
struct ConciergeFile {
    server: ServerConfig,
    data: DataPaths,
    llm: LlmConfig,
    search: SearchConfig,
    site: SiteConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    pub listings_path: String,
    pub site_content_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    pub max_tokens: u32,
    /// Upper bound on model turns per chat request (each tool round trip is a turn).
    pub max_steps: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub scrape_timeout_secs: u64,
    pub search_limit: usize,
    pub max_scrape_urls: usize,
    pub default_location: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Human name of the market area, used in prompts and research queries.
    pub area_name: String,
    /// Broker/owner listed first on the agents page.
    #[serde(default)]
    pub lead_agent: Option<String>,
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub anthropic_api_key: Option<String>,
    pub firecrawl_api_key: Option<String>,
}

impl CredentialsConfig {
    /// Fill unset keys from `ANTHROPIC_API_KEY` / `FIRECRAWL_API_KEY`.
    fn with_env_fallback(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if self.anthropic_api_key.as_deref().map_or(true, str::is_empty) {
            self.anthropic_api_key = lookup("ANTHROPIC_API_KEY");
        }
        if self.firecrawl_api_key.as_deref().map_or(true, str::is_empty) {
            self.firecrawl_api_key = lookup("FIRECRAWL_API_KEY");
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/concierge.toml` and
/// (optionally) `config/credentials.toml`, relative to `base_dir`.
///
/// Does not copy defaults; prefer `load_config()`.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    load_config_with_env(base_dir, |key| std::env::var(key).ok())
}

fn load_config_with_env(
    base_dir: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- concierge.toml (required) ---
    let main_path = config_dir.join("concierge.toml");
    let main_text = read_file(&main_path)?;
    let file: ConciergeFile = toml::from_str(&main_text).map_err(|e| ConfigError::ParseError {
        path: main_path.clone(),
        source: e,
    })?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let credentials: CredentialsConfig = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    let config = Config {
        server: file.server,
        data: file.data,
        llm: file.llm,
        search: file.search,
        site: file.site,
        credentials: credentials.with_env_fallback(env),
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    let mut copied = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Load config relative to the current working directory, copying defaults first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let invalid = |field: &str, message: String| ConfigError::ValidationError {
        field: field.to_string(),
        message,
    };

    if config.server.port == 0 {
        return Err(invalid("server.port", "must be greater than 0".into()));
    }
    if config.llm.model.trim().is_empty() {
        return Err(invalid("llm.model", "must not be empty".into()));
    }
    if config.llm.max_tokens == 0 {
        return Err(invalid("llm.max_tokens", "must be greater than 0".into()));
    }
    if !(1..=10).contains(&config.llm.max_steps) {
        return Err(invalid(
            "llm.max_steps",
            format!("must be between 1 and 10, got {}", config.llm.max_steps),
        ));
    }
    if config.search.scrape_timeout_secs == 0 {
        return Err(invalid(
            "search.scrape_timeout_secs",
            "must be greater than 0".into(),
        ));
    }
    if config.search.search_limit == 0 {
        return Err(invalid("search.search_limit", "must be greater than 0".into()));
    }
    if config.search.max_scrape_urls > config.search.search_limit {
        return Err(invalid(
            "search.max_scrape_urls",
            format!(
                "must not exceed search.search_limit ({}), got {}",
                config.search.search_limit, config.search.max_scrape_urls
            ),
        ));
    }
    for (field, value) in [
        ("data.listings_path", &config.data.listings_path),
        ("data.site_content_path", &config.data.site_content_path),
        ("site.area_name", &config.site.area_name),
    ] {
        if value.trim().is_empty() {
            return Err(invalid(field, "must not be empty".into()));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
