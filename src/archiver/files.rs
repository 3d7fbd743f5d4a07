use crate::archiver::agents::{TRANSCRIPT_EXTENSION, owned_agent_transcripts};
use crate::archiver::recovery::{RecoveryKind, RecoveryStats};
use crate::archiver::sessions::Session;
use crate::archiver::warn;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchiveFileKind {
    Transcript,
    CompanionFolder,
    AgentTranscript,
    AgentCompanionFolder,
}

impl ArchiveFileKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transcript => "transcript",
            Self::CompanionFolder => "companion-folder",
            Self::AgentTranscript => "agent-transcript",
            Self::AgentCompanionFolder => "agent-companion-folder",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveFile {
    /// Display name; folders carry a trailing `/`.
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub kind: ArchiveFileKind,
}

impl ArchiveFile {
    /// Entry name inside the archive folder.
    pub fn entry_name(&self) -> &str {
        self.name.trim_end_matches('/')
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveFileSet {
    pub session_id: String,
    pub files: Vec<ArchiveFile>,
    pub total_size: u64,
}

/// Recursive byte total of the files under `dir`; 0 when it is not a directory.
///
/// Walked depth-first on every call. Entries that cannot be read are skipped
/// and counted.
pub fn folder_size(dir: &Path, stats: &mut RecoveryStats) -> u64 {
    if !dir.is_dir() {
        return 0;
    }

    let mut total = 0u64;
    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                record_unreadable(dir, &err.to_string(), stats);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        match entry.metadata() {
            Ok(meta) => total += meta.len(),
            Err(err) => record_unreadable(entry.path(), &err.to_string(), stats),
        }
    }
    total
}

fn record_unreadable(path: &Path, err: &str, stats: &mut RecoveryStats) {
    stats.record(RecoveryKind::UnreadableFolder, 1);
    warn::emit_recovery(
        RecoveryKind::UnreadableFolder,
        "resolve",
        "na",
        &path.display().to_string(),
        err,
    );
}

fn companion_folder(
    project_dir: &Path,
    stem: &str,
    kind: ArchiveFileKind,
    stats: &mut RecoveryStats,
) -> Option<ArchiveFile> {
    let path = project_dir.join(stem);
    let size = folder_size(&path, stats);
    if size == 0 {
        return None;
    }
    Some(ArchiveFile {
        name: format!("{stem}/"),
        path,
        size,
        kind,
    })
}

/// Every artifact that moves with `session`, in canonical order: transcript,
/// companion folder, then each owned agent transcript followed by its folder.
pub fn resolve_file_set(session: &Session, stats: &mut RecoveryStats) -> ArchiveFileSet {
    let project_dir = session.project_path.as_path();
    let mut files = vec![ArchiveFile {
        name: session.file_name(),
        path: session.path.clone(),
        size: session.size,
        kind: ArchiveFileKind::Transcript,
    }];

    if let Some(folder) = companion_folder(
        project_dir,
        &session.id,
        ArchiveFileKind::CompanionFolder,
        stats,
    ) {
        files.push(folder);
    }

    for agent_path in owned_agent_transcripts(project_dir, &session.id, stats) {
        let Some(name) = agent_path
            .file_name()
            .and_then(|s| s.to_str())
            .map(ToOwned::to_owned)
        else {
            continue;
        };
        let size = match fs::metadata(&agent_path) {
            Ok(meta) => meta.len(),
            Err(err) => {
                stats.record(RecoveryKind::UnreadableAgent, 1);
                warn::emit_recovery(
                    RecoveryKind::UnreadableAgent,
                    "resolve",
                    &session.id,
                    &agent_path.display().to_string(),
                    &err.to_string(),
                );
                continue;
            }
        };
        let stem = name
            .strip_suffix(TRANSCRIPT_EXTENSION)
            .unwrap_or(&name)
            .to_string();
        files.push(ArchiveFile {
            name,
            path: agent_path,
            size,
            kind: ArchiveFileKind::AgentTranscript,
        });
        if let Some(folder) = companion_folder(
            project_dir,
            &stem,
            ArchiveFileKind::AgentCompanionFolder,
            stats,
        ) {
            files.push(folder);
        }
    }

    let total_size = files.iter().map(|f| f.size).sum();
    ArchiveFileSet {
        session_id: session.id.clone(),
        files,
        total_size,
    }
}

pub fn files_to_archive(sessions: &[Session], stats: &mut RecoveryStats) -> Vec<ArchiveFileSet> {
    sessions
        .iter()
        .map(|session| resolve_file_set(session, stats))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archiver::sessions::parse_session;
    use tempfile::tempdir;

    #[test]
    fn folder_size_sums_nested_files() {
        let tmp = tempdir().expect("tempdir");
        let dir = tmp.path().join("S");
        fs::create_dir_all(dir.join("nested/deeper")).expect("mkdir");
        fs::write(dir.join("a.bin"), vec![0u8; 10]).expect("a");
        fs::write(dir.join("nested/b.bin"), vec![0u8; 5]).expect("b");
        fs::write(dir.join("nested/deeper/c.bin"), vec![0u8; 7]).expect("c");

        let mut stats = RecoveryStats::default();
        assert_eq!(folder_size(&dir, &mut stats), 22);
        assert_eq!(folder_size(&tmp.path().join("missing"), &mut stats), 0);
        assert!(stats.is_clean());
    }

    #[test]
    fn file_set_is_in_canonical_order() {
        let tmp = tempdir().expect("tempdir");
        let project = tmp.path();
        fs::write(project.join("S.jsonl"), "{\"type\":\"user\"}\n").expect("main");
        fs::create_dir_all(project.join("S")).expect("companion");
        fs::write(project.join("S/tool.txt"), "abc").expect("companion file");
        fs::write(project.join("agent-b.jsonl"), "{\"sessionId\":\"S\"}\n").expect("agent b");
        fs::write(project.join("agent-a.jsonl"), "{\"sessionId\":\"S\"}\n").expect("agent a");
        fs::create_dir_all(project.join("agent-a")).expect("agent folder");
        fs::write(project.join("agent-a/out.txt"), "hello").expect("agent folder file");
        fs::write(project.join("agent-z.jsonl"), "{\"sessionId\":\"OTHER\"}\n").expect("other");
        fs::create_dir_all(project.join("agent-b")).expect("empty agent folder");

        let mut stats = RecoveryStats::default();
        let session =
            parse_session(&project.join("S.jsonl"), project, 2, &mut stats).expect("session");
        let set = resolve_file_set(&session, &mut stats);

        let names: Vec<_> = set.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["S.jsonl", "S/", "agent-a.jsonl", "agent-a/", "agent-b.jsonl"]
        );
        let kinds: Vec<_> = set.files.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ArchiveFileKind::Transcript,
                ArchiveFileKind::CompanionFolder,
                ArchiveFileKind::AgentTranscript,
                ArchiveFileKind::AgentCompanionFolder,
                ArchiveFileKind::AgentTranscript,
            ]
        );
        assert_eq!(set.total_size, set.files.iter().map(|f| f.size).sum::<u64>());
        assert_eq!(set.files[1].size, 3);
        assert_eq!(set.files[3].size, 5);
        assert_eq!(set.session_id, "S");
    }

    #[test]
    fn empty_companion_folder_is_left_out() {
        let tmp = tempdir().expect("tempdir");
        let project = tmp.path();
        fs::write(project.join("S.jsonl"), "{}\n").expect("main");
        fs::create_dir_all(project.join("S/empty")).expect("empty companion");

        let mut stats = RecoveryStats::default();
        let session =
            parse_session(&project.join("S.jsonl"), project, 0, &mut stats).expect("session");
        let sets = files_to_archive(&[session], &mut stats);
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].files.len(), 1);
        assert_eq!(sets[0].total_size, 3);
    }
}
