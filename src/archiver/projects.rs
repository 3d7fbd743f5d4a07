use crate::archiver::agents::{read_first_line, transcript_names};
use crate::archiver::classify::classify_discovery;
use crate::archiver::codec::{decode_project_name, encode_project_path, is_encoded_project_name};
use crate::archiver::paths::shorten_home;
use crate::archiver::recovery::{RecoveryKind, RecoveryStats};
use crate::archiver::warn;
use crate::error::DiscoveryError;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    pub folder_name: String,
    pub path: PathBuf,
    pub readable_path: String,
    pub session_count: usize,
}

impl Project {
    /// Accepts the encoded folder name, the display path, the absolute folder
    /// path, or the original working directory the folder name encodes.
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.trim_end_matches('/');
        self.folder_name == needle
            || self.readable_path == needle
            || self.path == Path::new(needle)
            || (needle.starts_with('/') && encode_project_path(needle) == self.folder_name)
    }
}

pub fn projects_dir_exists(base: &Path) -> bool {
    base.is_dir()
}

/// Case-folded ordering with a byte-order tie break, close to a locale collation.
pub fn locale_compare(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn readable_path(project_dir: &Path, folder_name: &str, transcripts: &[String]) -> String {
    let cwd = transcripts.first().and_then(|name| {
        let line = read_first_line(&project_dir.join(name)).ok()?;
        let record: Value = serde_json::from_str(line.trim()).ok()?;
        record.get("cwd").and_then(Value::as_str).map(ToOwned::to_owned)
    });

    match cwd {
        Some(cwd) => shorten_home(&cwd),
        None => decode_project_name(folder_name),
    }
}

/// List every project under `base` that holds at least one session transcript.
///
/// A failure to read `base` itself aborts the scan; problems inside a single
/// project only drop or degrade that project.
pub fn scan_projects(base: &Path, stats: &mut RecoveryStats) -> Result<Vec<Project>, DiscoveryError> {
    let entries = fs::read_dir(base).map_err(|err| classify_discovery(base, &err))?;

    let mut projects = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| classify_discovery(base, &err))?;
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_dir() {
            continue;
        }
        let Some(folder_name) = entry.file_name().to_str().map(ToOwned::to_owned) else {
            continue;
        };
        if !is_encoded_project_name(&folder_name) {
            continue;
        }

        let path = base.join(&folder_name);
        let transcripts = match transcript_names(&path) {
            Ok(names) => names,
            Err(err) => {
                stats.record(RecoveryKind::UnreadableFolder, 1);
                warn::emit_recovery(
                    RecoveryKind::UnreadableFolder,
                    "discovery",
                    "na",
                    &path.display().to_string(),
                    &err.to_string(),
                );
                continue;
            }
        };
        if transcripts.is_empty() {
            continue;
        }

        let readable_path = readable_path(&path, &folder_name, &transcripts);
        projects.push(Project {
            folder_name,
            path,
            readable_path,
            session_count: transcripts.len(),
        });
    }

    projects.sort_by(|a, b| locale_compare(&a.readable_path, &b.readable_path));
    Ok(projects)
}

pub fn find_project<'a>(projects: &'a [Project], needle: &str) -> Option<&'a Project> {
    projects.iter().find(|p| p.matches(needle))
}
