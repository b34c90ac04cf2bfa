//! TOML configuration.
//!
//! ```toml
//! [notion]
//! database_id = "0123456789abcdef0123456789abcdef"
//!
//! [vault]
//! root = "~/Notes"
//! attachments_folder = "attachments"
//!
//! [upload]
//! max_workers = 3
//! ```
//!
//! The API token may be omitted from the file; it is then read from the
//! `NOTION_TOKEN` environment variable.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub notion: NotionConfig,
    pub vault: VaultConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotionConfig {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub database_id: String,
    #[serde(default = "default_title_property")]
    pub title_property: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            token: None,
            database_id: String::new(),
            title_property: default_title_property(),
            api_base: default_api_base(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_title_property() -> String {
    "Name".to_string()
}
fn default_api_base() -> String {
    "https://api.notion.com".to_string()
}
fn default_max_retries() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct VaultConfig {
    pub root: PathBuf,
    #[serde(default = "default_attachments_folder")]
    pub attachments_folder: String,
    #[serde(default)]
    pub target_subfolder: Option<PathBuf>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default = "default_true")]
    pub extract_frontmatter: bool,
}

fn default_attachments_folder() -> String {
    "attachments".to_string()
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    #[serde(default = "default_rate_limit_delay_ms")]
    pub rate_limit_delay_ms: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            max_file_size: default_max_file_size(),
            allowed_extensions: default_allowed_extensions(),
            rate_limit_delay_ms: default_rate_limit_delay_ms(),
        }
    }
}

fn default_max_workers() -> usize {
    3
}
fn default_max_file_size() -> u64 {
    100 * 1024 * 1024
}
fn default_allowed_extensions() -> Vec<String> {
    [
        ".png", ".jpg", ".jpeg", ".gif", ".pdf", ".mp4", ".mov", ".mp3", ".wav", ".doc", ".docx",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_rate_limit_delay_ms() -> u64 {
    340
}

impl UploadConfig {
    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }

    /// Whether `ext` (with or without a leading dot) is on the allow-list.
    pub fn allows_extension(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.');
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

impl Config {
    /// Configuration rooted at `vault` with every other setting defaulted.
    pub fn for_vault(vault: impl Into<PathBuf>) -> Self {
        Self {
            notion: NotionConfig::default(),
            vault: VaultConfig {
                root: vault.into(),
                attachments_folder: default_attachments_folder(),
                target_subfolder: None,
                exclude_globs: Vec::new(),
                extract_frontmatter: true,
            },
            upload: UploadConfig::default(),
        }
    }

    /// The API token from the config file or the `NOTION_TOKEN` environment variable.
    pub fn token(&self) -> Option<String> {
        self.notion
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| std::env::var("NOTION_TOKEN").ok().filter(|t| !t.is_empty()))
    }

    /// Directory that gets scanned for documents.
    pub fn scan_root(&self) -> PathBuf {
        match &self.vault.target_subfolder {
            Some(sub) => self.vault.root.join(sub),
            None => self.vault.root.clone(),
        }
    }

    /// Check everything a run needs before any work starts.
    ///
    /// Dry runs do not talk to the remote store, so they only need a vault.
    pub fn validate(&self, dry_run: bool) -> Result<()> {
        if !dry_run {
            if self.token().is_none() {
                bail!("Notion API token is required (set notion.token or NOTION_TOKEN)");
            }
            if self.notion.database_id.trim().is_empty() {
                bail!("notion.database_id is required");
            }
        }

        let root = &self.vault.root;
        if !root.exists() {
            bail!("Vault path does not exist: {}", root.display());
        }
        if !root.is_dir() {
            bail!("Vault path is not a directory: {}", root.display());
        }

        let scan_root = self.scan_root();
        if !scan_root.is_dir() {
            bail!("Scan path does not exist: {}", scan_root.display());
        }

        if self.upload.max_workers == 0 {
            bail!("upload.max_workers must be >= 1");
        }
        if self.upload.max_file_size == 0 {
            bail!("upload.max_file_size must be > 0");
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    config.vault.root = expand_home(&config.vault.root);
    if let Ok(canonical) = config.vault.root.canonicalize() {
        config.vault.root = canonical;
    }

    Ok(config)
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    path.to_path_buf()
}

pub const SAMPLE_CONFIG: &str = r#"# vmig configuration

[notion]
# Integration token. Leave unset to read NOTION_TOKEN from the environment.
# token = "secret_..."
database_id = "your-database-id"
# Name of the database's title property.
title_property = "Name"

[vault]
root = "/path/to/your/vault"
attachments_folder = "attachments"
# Only migrate documents under this folder (relative to root).
# target_subfolder = "Projects"
exclude_globs = []
extract_frontmatter = true

[upload]
max_workers = 3
max_file_size = 104857600  # 100 MiB
allowed_extensions = [".png", ".jpg", ".jpeg", ".gif", ".pdf", ".mp4", ".mov", ".mp3", ".wav", ".doc", ".docx"]
# Spacing between API calls; Notion allows about 3 requests per second.
rate_limit_delay_ms = 340
"#;

/// Write the sample configuration, refusing to overwrite an existing file.
pub fn write_sample_config(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("Refusing to overwrite existing file: {}", path.display());
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, SAMPLE_CONFIG)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
