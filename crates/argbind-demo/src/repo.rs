use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const STATE_FILE: &str = ".gitlike.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoState {
    #[serde(default)]
    pub schema_version: u32,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remotes: Vec<Remote>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pushes: Vec<PushRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Remote {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRecord {
    pub remote: String,
    pub branch: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub force: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl RepoState {
    pub fn remote(&self, name: &str) -> Option<&Remote> {
        self.remotes.iter().find(|r| r.name == name)
    }

    pub fn add_remote(&mut self, name: &str, url: &str) -> Result<()> {
        if self.remote(name).is_some() {
            bail!("remote '{name}' already exists");
        }
        self.remotes.push(Remote {
            name: name.to_string(),
            url: url.to_string(),
        });
        Ok(())
    }
}

pub fn state_path(dir: &Path) -> PathBuf {
    dir.join(STATE_FILE)
}

/// Create an empty state file. Fails if one already exists.
pub fn init(dir: &Path) -> Result<PathBuf> {
    let dest = state_path(dir);
    if dest.exists() {
        bail!("{} already exists in {}", STATE_FILE, dir.display());
    }
    save(
        dir,
        &RepoState {
            schema_version: 1,
            ..Default::default()
        },
    )?;
    Ok(dest)
}

pub fn load(dir: &Path) -> Result<RepoState> {
    let path = state_path(dir);
    if !path.exists() {
        bail!(
            "not a gitlike repository: {} (run `gitlike init` first)",
            dir.display()
        );
    }
    let contents =
        fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse state JSON: {}", path.display()))
}

pub fn save(dir: &Path, state: &RepoState) -> Result<()> {
    let dest = state_path(dir);
    let mut out = serde_json::to_string_pretty(state).context("failed to serialize state")?;
    out.push('\n');

    let tmp = dest.with_extension("tmp");
    fs::write(&tmp, out.as_bytes())
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, &dest)
        .with_context(|| format!("failed to move {} into place", dest.display()))?;
    Ok(())
}
