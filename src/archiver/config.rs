use crate::archiver::codec::ENCODED_MARKER;
use crate::archiver::paths::{ArchiverPaths, env_or_default_path, resolve_paths};
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_ARCHIVE_FOLDER: &str = ".archived";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    #[default]
    Normal,
    DryRun,
    Dev,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::DryRun => "dry-run",
            Self::Dev => "dev",
        }
    }

    /// Only `normal` mutates the filesystem.
    pub fn is_read_only(self) -> bool {
        self != Self::Normal
    }

    /// Prefix placed in front of simulated destination paths.
    pub fn tag(self) -> Option<&'static str> {
        match self {
            Self::Normal => None,
            Self::DryRun => Some("[DRY-RUN]"),
            Self::Dev => Some("[DEV]"),
        }
    }

    pub fn banner(self) -> Option<&'static str> {
        match self {
            Self::Normal => None,
            Self::DryRun => Some("Read-only mode — no files will be moved"),
            Self::Dev => Some("DEV MODE — Destructive operations disabled"),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim() {
            "normal" => Ok(Self::Normal),
            "dry-run" | "dry_run" | "dryrun" => Ok(Self::DryRun),
            "dev" => Ok(Self::Dev),
            other => Err(anyhow!(
                "invalid run mode `{other}`: use `normal`, `dry-run` or `dev`"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    pub projects_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveSettings {
    pub folder: String,
    pub mode: RunMode,
    #[serde(default = "default_audit_log")]
    pub audit_log: bool,
}

fn default_audit_log() -> bool {
    true
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            folder: DEFAULT_ARCHIVE_FOLDER.to_string(),
            mode: RunMode::Normal,
            audit_log: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiverConfig {
    pub discovery: DiscoveryConfig,
    pub archive: ArchiveSettings,
    #[serde(skip)]
    pub paths: ArchiverPaths,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialDiscoveryConfig {
    projects_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialArchiveSettings {
    folder: Option<String>,
    mode: Option<RunMode>,
    audit_log: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialArchiverConfig {
    discovery: Option<PartialDiscoveryConfig>,
    archive: Option<PartialArchiveSettings>,
}

impl ArchiverConfig {
    pub fn with_defaults(paths: ArchiverPaths) -> Self {
        Self {
            discovery: DiscoveryConfig {
                projects_dir: paths.default_projects_dir.clone(),
            },
            archive: ArchiveSettings::default(),
            paths,
        }
    }

    pub fn projects_dir(&self) -> &PathBuf {
        &self.discovery.projects_dir
    }
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => match v.trim() {
            "1" | "true" | "TRUE" | "yes" | "on" => true,
            "0" | "false" | "FALSE" | "no" | "off" => false,
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn env_run_mode(var: &str, fallback: RunMode) -> Result<RunMode> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.parse(),
        _ => Ok(fallback),
    }
}

fn validate(cfg: &ArchiverConfig) -> Result<()> {
    let folder = cfg.archive.folder.as_str();
    if folder.trim().is_empty() {
        return Err(anyhow!("invalid archive folder: cannot be empty"));
    }
    if folder.contains('/') || folder.contains('\\') || folder == "." || folder == ".." {
        return Err(anyhow!(
            "invalid archive folder `{folder}`: must be a single directory name"
        ));
    }
    if folder.starts_with(ENCODED_MARKER) {
        return Err(anyhow!(
            "invalid archive folder `{folder}`: cannot start with `{ENCODED_MARKER}`"
        ));
    }
    if cfg.discovery.projects_dir.as_os_str().is_empty() {
        return Err(anyhow!("invalid projects dir: cannot be empty"));
    }
    Ok(())
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var("CCARCHIVE_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let config_dir = dirs::config_dir()?;
    Some(config_dir.join("ccarchive").join("config.toml"))
}

fn merge_file_config(base: &mut ArchiverConfig) -> Result<()> {
    match resolve_config_path() {
        Some(path) => merge_config_at(base, &path),
        None => Ok(()),
    }
}

fn merge_config_at(base: &mut ArchiverConfig, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read ccarchive config {}", path.display()))?;
    merge_toml(base, &raw)
        .map_err(|err| anyhow!("failed to parse ccarchive config {}: {err}", path.display()))
}

fn merge_toml(base: &mut ArchiverConfig, raw: &str) -> Result<(), toml::de::Error> {
    let parsed: PartialArchiverConfig = toml::from_str(raw)?;
    if let Some(discovery) = parsed.discovery
        && let Some(dir) = discovery.projects_dir
    {
        base.discovery.projects_dir = dir;
    }
    if let Some(archive) = parsed.archive {
        if let Some(folder) = archive.folder {
            base.archive.folder = folder;
        }
        if let Some(mode) = archive.mode {
            base.archive.mode = mode;
        }
        if let Some(audit_log) = archive.audit_log {
            base.archive.audit_log = audit_log;
        }
    }
    Ok(())
}

pub fn load_config() -> Result<ArchiverConfig> {
    let paths = resolve_paths()?;
    let mut cfg = ArchiverConfig::with_defaults(paths);
    merge_file_config(&mut cfg)?;

    cfg.discovery.projects_dir =
        env_or_default_path("CCARCHIVE_PROJECTS_DIR", cfg.discovery.projects_dir);
    cfg.archive.folder = env_or_string("CCARCHIVE_ARCHIVE_FOLDER", &cfg.archive.folder);
    cfg.archive.mode = env_run_mode("CCARCHIVE_MODE", cfg.archive.mode)?;
    cfg.archive.audit_log = env_or_bool("CCARCHIVE_AUDIT_LOG", cfg.archive.audit_log);

    validate(&cfg)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_paths() -> ArchiverPaths {
        ArchiverPaths {
            state_home: PathBuf::from("/tmp/ccarchive-state"),
            logs_dir: PathBuf::from("/tmp/ccarchive-state/logs"),
            audit_log: PathBuf::from("/tmp/ccarchive-state/logs/audit.log"),
            default_projects_dir: PathBuf::from("/home/alice/.claude/projects"),
        }
    }

    #[test]
    fn run_mode_parses_and_tags() {
        assert_eq!("dry-run".parse::<RunMode>().unwrap(), RunMode::DryRun);
        assert_eq!("dev".parse::<RunMode>().unwrap(), RunMode::Dev);
        assert!("loud".parse::<RunMode>().is_err());
        assert!(!RunMode::Normal.is_read_only());
        assert!(RunMode::Dev.is_read_only());
        assert_eq!(RunMode::Normal.tag(), None);
        assert!(RunMode::DryRun.banner().is_some());
    }

    #[test]
    fn toml_sections_override_defaults() {
        let mut cfg = ArchiverConfig::with_defaults(test_paths());
        merge_toml(
            &mut cfg,
            "[discovery]\nprojects_dir = \"/data/projects\"\n\n[archive]\nmode = \"dry-run\"\n",
        )
        .unwrap();
        assert_eq!(cfg.discovery.projects_dir, PathBuf::from("/data/projects"));
        assert_eq!(cfg.archive.mode, RunMode::DryRun);
        assert_eq!(cfg.archive.folder, DEFAULT_ARCHIVE_FOLDER);
        assert!(cfg.archive.audit_log);
    }

    #[test]
    fn config_file_errors_name_the_path() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let mut cfg = ArchiverConfig::with_defaults(test_paths());

        merge_config_at(&mut cfg, &tmp.path().join("absent.toml")).expect("missing is fine");

        let err = merge_config_at(&mut cfg, tmp.path()).unwrap_err();
        assert!(
            format!("{err:#}").contains(&format!("failed to read ccarchive config {}", tmp.path().display()))
        );

        let bad = tmp.path().join("config.toml");
        fs::write(&bad, "[archive\n").expect("write");
        let err = merge_config_at(&mut cfg, &bad).unwrap_err();
        assert!(err.to_string().contains("failed to parse ccarchive config"));
    }

    #[test]
    fn malformed_toml_is_rejected() {
        let mut cfg = ArchiverConfig::with_defaults(test_paths());
        assert!(merge_toml(&mut cfg, "[archive]\nmode = \"sideways\"\n").is_err());
    }

    #[test]
    fn archive_folder_must_be_single_component() {
        let mut cfg = ArchiverConfig::with_defaults(test_paths());
        cfg.archive.folder = "a/b".to_string();
        assert!(validate(&cfg).is_err());
        cfg.archive.folder = "-archived".to_string();
        assert!(validate(&cfg).is_err());
        cfg.archive.folder = ".old".to_string();
        assert!(validate(&cfg).is_ok());
    }
}
