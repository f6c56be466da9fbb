use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::git::{Author, CredentialTransport, RepoSettings};
use crate::paths::{expand_tilde, paths};

/// Top-level configuration structure loaded from `config.toml`.
///
/// Example TOML:
/// ```toml
/// [author]
/// name  = "orgsync"
/// email = "orgsync@localhost"
///
/// [transport]
/// ssh_key   = "~/.ssh/id_ed25519"
/// token_env = "ORGSYNC_GIT_TOKEN"
///
/// [[repos]]
/// name   = "notes"
/// path   = "~/notes"
/// remote = "origin"
/// branch = "main"
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub author: AuthorConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub repos: Vec<RepoEntry>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct AuthorConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Credentials used for every fetch and push.
///
/// Secrets are never stored in the file itself; the `*_env` keys name
/// environment variables to read them from.
#[derive(Debug, Default, Deserialize, Clone)]
pub struct TransportConfig {
    #[serde(default)]
    pub ssh_key: Option<PathBuf>,
    #[serde(default)]
    pub ssh_passphrase_env: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub token_env: Option<String>,
}

/// A single synchronized repository under `[[repos]]`.
#[derive(Debug, Deserialize, Clone)]
pub struct RepoEntry {
    #[serde(default)]
    pub name: Option<String>,
    pub path: PathBuf,
    #[serde(default = "default_remote")]
    pub remote: String,
    #[serde(default = "default_branch")]
    pub branch: String,
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

impl RepoEntry {
    pub fn display(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn worktree(&self) -> PathBuf {
        expand_tilde(&self.path)
    }

    pub fn settings(&self, author: &AuthorConfig) -> RepoSettings {
        let author = match (&author.name, &author.email) {
            (Some(name), Some(email)) => Some(Author {
                name: name.clone(),
                email: email.clone(),
            }),
            _ => None,
        };
        RepoSettings {
            remote: self.remote.clone(),
            branch: self.branch.clone(),
            author,
        }
    }
}

impl TransportConfig {
    pub fn transport(&self) -> CredentialTransport {
        CredentialTransport {
            ssh_key: self.ssh_key.as_deref().map(expand_tilde),
            ssh_passphrase_env: self.ssh_passphrase_env.clone(),
            username: self.username.clone(),
            token_env: self.token_env.clone(),
        }
    }
}

impl Config {
    pub fn from_toml(txt: &str) -> Result<Config> {
        toml::from_str(txt).context("failed to parse config.toml")
    }

    /// Look up a repository by its configured name, or by its path.
    pub fn find_repo(&self, key: &str) -> Result<&RepoEntry> {
        let as_path = expand_tilde(Path::new(key));
        self.repos
            .iter()
            .find(|r| r.name.as_deref() == Some(key))
            .or_else(|| {
                self.repos
                    .iter()
                    .find(|r| r.path == Path::new(key) || r.worktree() == as_path)
            })
            .ok_or_else(|| anyhow!("no repository named {} in config", key))
    }
}

/// Load and parse `config.toml` into a [`Config`] structure.
///
/// # Errors
/// - Returns an error if `config.toml` cannot be read.
/// - Returns an error if parsing the TOML fails.
pub fn load_config() -> Result<Config> {
    let p = paths()?;
    let txt = fs::read_to_string(&p.config)
        .with_context(|| format!("config not found: {}", p.config.display()))?;
    Config::from_toml(&txt)
}
