use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::{self, Write};
use std::path::Path;

const ENV_FILE: &str = ".env";

/// Maximum number of numbered fallback keys scanned from the environment
/// (GEMINI_API_KEY_1 .. GEMINI_API_KEY_9).
const MAX_EXTRA_GEMINI_KEYS: usize = 9;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub wordpress: WordPressConfig,
    pub optimizer: OptimizerConfig,
    pub rewrite: RewriteConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WordPressConfig {
    pub base_url: String,
    /// Public domain used for internal tag links in rewritten content.
    #[serde(default)]
    pub domain: Option<String>,
}

impl WordPressConfig {
    pub fn domain(&self) -> &str {
        self.domain
            .as_deref()
            .unwrap_or(&self.base_url)
            .trim_end_matches('/')
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OptimizerConfig {
    pub target_author_id: u64,
    pub movie_category_id: u64,
    pub series_category_id: u64,
    #[serde(default = "default_max_posts_per_cycle")]
    pub max_posts_per_cycle: usize,
    #[serde(default = "default_check_interval_minutes")]
    pub check_interval_minutes: u64,
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: u32,
}

fn default_max_posts_per_cycle() -> usize { 2 }
fn default_check_interval_minutes() -> u64 { 20 }
fn default_fetch_limit() -> u32 { 50 }

#[derive(Debug, Deserialize, Clone)]
pub struct RewriteConfig {
    pub model: String,
    pub base_url: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 { 3 }

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String { "seo_optimizer.db".to_string() }

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| "Failed to parse config TOML")?;
        Ok(config)
    }

    /// Load .env file into process environment. Real env vars take precedence.
    pub fn load_env_file() {
        let path = Path::new(ENV_FILE);
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return,
        };
        // Strip BOM if present (common on Windows-created files)
        let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
        for line in content.lines() {
            let line = line.trim().trim_matches('\r');
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim().trim_matches('"').trim_matches('\'');
                if std::env::var(key).is_err() {
                    std::env::set_var(key, value);
                }
            }
        }
    }

    /// WordPress credentials come from environment variables, or prompted at
    /// startup. Prompted values are saved to .env for future runs.
    pub fn wordpress_username() -> Result<String> {
        match std::env::var("WORDPRESS_USERNAME") {
            Ok(v) if !v.is_empty() => Ok(sanitize_key(&v)),
            _ => {
                let v = prompt("WordPress username")?;
                save_env_var("WORDPRESS_USERNAME", &v);
                Ok(v)
            }
        }
    }

    pub fn wordpress_password() -> Result<String> {
        match std::env::var("WORDPRESS_PASSWORD") {
            Ok(v) if !v.is_empty() => Ok(sanitize_key(&v)),
            _ => {
                let v = prompt("WordPress application password")?;
                save_env_var("WORDPRESS_PASSWORD", &v);
                Ok(v)
            }
        }
    }

    /// Collect the Gemini credential pool: GEMINI_API_KEY plus any
    /// GEMINI_API_KEY_1..9. At least one key is required.
    pub fn gemini_api_keys() -> Result<Vec<String>> {
        let mut keys = Vec::new();
        if let Ok(main) = std::env::var("GEMINI_API_KEY") {
            if !main.is_empty() {
                keys.push(sanitize_key(&main));
            }
        }
        for i in 1..=MAX_EXTRA_GEMINI_KEYS {
            if let Ok(extra) = std::env::var(format!("GEMINI_API_KEY_{}", i)) {
                if !extra.is_empty() {
                    keys.push(sanitize_key(&extra));
                }
            }
        }
        if keys.is_empty() {
            let key = prompt("Gemini API Key")?;
            save_env_var("GEMINI_API_KEY", &key);
            keys.push(key);
        }
        Ok(keys)
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("  {} > ", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let value = input.trim().to_string();
    if value.is_empty() {
        anyhow::bail!("{} cannot be empty", label);
    }
    Ok(value)
}

/// Strip carriage returns, BOM, and other invisible chars from a key value.
fn sanitize_key(raw: &str) -> String {
    raw.replace(['\r', '\u{feff}', '\u{200b}'], "")
        .trim()
        .to_string()
}

/// Append a KEY=VALUE line to .env and set it in the current process.
fn save_env_var(key: &str, value: &str) {
    std::env::set_var(key, value);
    let path = Path::new(ENV_FILE);
    let mut contents = std::fs::read_to_string(path).unwrap_or_default();
    if !contents.is_empty() && !contents.ends_with('\n') {
        contents.push('\n');
    }
    contents.push_str(&format!("{}={}\n", key, value));
    let _ = std::fs::write(path, contents);
}
