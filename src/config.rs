use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::github::normalize_identifier;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub github: Option<GithubConfig>,
    #[serde(default)]
    pub posts: PostsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GithubConfig {
    pub owner: String,
    pub repo: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub cache_branch: bool,
    #[serde(default = "default_placeholder_name")]
    pub placeholder_name: String,
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}
fn default_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_placeholder_name() -> String {
    "README.md".to_string()
}

impl GithubConfig {
    /// Read the credential from the configured environment variable.
    pub fn token(&self) -> Result<String> {
        let token = std::env::var(&self.token_env)
            .with_context(|| format!("{} environment variable not set", self.token_env))?;
        if token.trim().is_empty() {
            bail!("{} environment variable is empty", self.token_env);
        }
        Ok(token)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PostsConfig {
    #[serde(default = "default_posts_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_remote_dir")]
    pub remote_dir: String,
}

impl Default for PostsConfig {
    fn default() -> Self {
        Self {
            dir: default_posts_dir(),
            remote_dir: default_remote_dir(),
        }
    }
}

fn default_posts_dir() -> PathBuf {
    PathBuf::from("./posts")
}
fn default_remote_dir() -> String {
    "posts".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            static_dir: None,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

impl Config {
    /// The `[github]` section, or an error naming what is missing.
    pub fn github(&self) -> Result<&GithubConfig> {
        self.github
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("[github] section not configured"))
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;

    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if let Some(gh) = &config.github {
        if normalize_identifier(&gh.owner).is_empty() {
            bail!("github.owner must not be empty");
        }
        if normalize_identifier(&gh.repo).is_empty() {
            bail!("github.repo must not be empty");
        }
        if gh.timeout_secs == 0 {
            bail!("github.timeout_secs must be > 0");
        }
        if gh.placeholder_name.is_empty() || gh.placeholder_name.contains('/') {
            bail!("github.placeholder_name must be a bare file name");
        }
        if matches!(&gh.branch, Some(b) if b.trim().is_empty()) {
            bail!("github.branch must not be empty when set");
        }
    }

    if config.posts.remote_dir.trim_matches('/').is_empty() {
        bail!("posts.remote_dir must not be empty");
    }

    Ok(())
}
