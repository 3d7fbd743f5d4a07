use anyhow::Result;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ArchiverPaths {
    pub state_home: PathBuf,
    pub logs_dir: PathBuf,
    pub audit_log: PathBuf,
    pub default_projects_dir: PathBuf,
}

pub(crate) fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

pub(crate) fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<ArchiverPaths> {
    let home = required_home_dir()?;
    let state_home = env_or_default_path("CCARCHIVE_HOME", home.join(".ccarchive"));
    let logs_dir = state_home.join("logs");
    let audit_log = logs_dir.join("audit.log");
    let default_projects_dir = home.join(".claude").join("projects");

    Ok(ArchiverPaths {
        state_home,
        logs_dir,
        audit_log,
        default_projects_dir,
    })
}

/// Replace a leading home directory with `~` for display.
pub fn shorten_home(path: &str) -> String {
    match dirs::home_dir() {
        Some(home) => shorten_with_home(path, &home),
        None => path.to_string(),
    }
}

fn shorten_with_home(path: &str, home: &Path) -> String {
    let home = home.to_string_lossy();
    let home = home.trim_end_matches('/');
    if home.is_empty() {
        return path.to_string();
    }
    match path.strip_prefix(home) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => format!("~{rest}"),
        _ => path.to_string(),
    }
}
