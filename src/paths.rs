use anyhow::Result;
use std::{
    env,
    path::{Path, PathBuf},
};

#[derive(Clone)]
pub struct Paths {
    pub config: PathBuf,
}

pub fn orgsync_home() -> Result<PathBuf> {
    let xdg = env::var_os("XDG_CONFIG_HOME");
    let base = xdg
        .map(PathBuf::from)
        .unwrap_or_else(|| user_home().join(".config"));
    Ok(base.join(".orgsync"))
}

pub fn paths() -> Result<Paths> {
    let home = orgsync_home()?;
    Ok(Paths {
        config: home.join("config.toml"),
    })
}

/// Expand a leading `~` to `$HOME`. Other paths are returned unchanged.
pub fn expand_tilde(p: &Path) -> PathBuf {
    match p.strip_prefix("~") {
        Ok(rest) => user_home().join(rest),
        Err(_) => p.to_path_buf(),
    }
}

fn user_home() -> PathBuf {
    PathBuf::from(env::var_os("HOME").unwrap_or_default())
}
