use crate::archiver::recovery::{RecoveryKind, RecoveryStats};
use crate::archiver::warn;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

pub const TRANSCRIPT_EXTENSION: &str = ".jsonl";
pub const AGENT_PREFIX: &str = "agent-";

pub fn is_transcript_name(name: &str) -> bool {
    name.ends_with(TRANSCRIPT_EXTENSION)
}

pub fn is_agent_transcript_name(name: &str) -> bool {
    name.starts_with(AGENT_PREFIX) && is_transcript_name(name)
}

/// Main session transcripts in `dir`, sorted by file name.
pub fn session_transcript_names(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = transcript_names(dir)?;
    names.retain(|name| !name.starts_with(AGENT_PREFIX));
    Ok(names)
}

pub fn agent_transcript_names(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = transcript_names(dir)?;
    names.retain(|name| is_agent_transcript_name(name));
    Ok(names)
}

/// Every `*.jsonl` in `dir`, agent transcripts included, sorted by file name.
pub fn transcript_names(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(ToOwned::to_owned) else {
            continue;
        };
        if is_transcript_name(&name) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// First line of a file with its line terminator stripped.
pub fn read_first_line(path: &Path) -> std::io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut buf = Vec::new();
    reader.read_until(b'\n', &mut buf)?;
    let line = String::from_utf8_lossy(&buf);
    Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

/// `sessionId` named by the agent transcript's first record, if any.
///
/// Read and parse failures count as a recovery and mean "owned by nobody".
pub fn agent_session_id(agent_path: &Path, stats: &mut RecoveryStats) -> Option<String> {
    let first = match read_first_line(agent_path) {
        Ok(line) => line,
        Err(err) => {
            stats.record(RecoveryKind::UnreadableAgent, 1);
            warn::emit_recovery(
                RecoveryKind::UnreadableAgent,
                "ownership",
                "na",
                &agent_path.display().to_string(),
                &err.to_string(),
            );
            return None;
        }
    };
    if first.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(&first) {
        Ok(record) => record
            .get("sessionId")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
        Err(err) => {
            stats.record(RecoveryKind::UnreadableAgent, 1);
            warn::emit_recovery(
                RecoveryKind::UnreadableAgent,
                "ownership",
                "na",
                &agent_path.display().to_string(),
                &err.to_string(),
            );
            None
        }
    }
}

/// Agent transcripts in `project_dir` whose first record points at `session_id`.
pub fn owned_agent_transcripts(
    project_dir: &Path,
    session_id: &str,
    stats: &mut RecoveryStats,
) -> Vec<PathBuf> {
    let names = match agent_transcript_names(project_dir) {
        Ok(names) => names,
        Err(err) => {
            record_unreadable_project(project_dir, &err, stats);
            return Vec::new();
        }
    };

    names
        .into_iter()
        .map(|name| project_dir.join(name))
        .filter(|path| agent_session_id(path, stats).as_deref() == Some(session_id))
        .collect()
}

/// One pass over the agent transcripts of a project: session id -> owned count.
pub fn agent_counts_by_session(
    project_dir: &Path,
    stats: &mut RecoveryStats,
) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    let names = match agent_transcript_names(project_dir) {
        Ok(names) => names,
        Err(err) => {
            record_unreadable_project(project_dir, &err, stats);
            return counts;
        }
    };
    for name in names {
        if let Some(session_id) = agent_session_id(&project_dir.join(name), stats) {
            *counts.entry(session_id).or_insert(0) += 1;
        }
    }
    counts
}

fn record_unreadable_project(project_dir: &Path, err: &std::io::Error, stats: &mut RecoveryStats) {
    stats.record(RecoveryKind::UnreadableFolder, 1);
    warn::emit_recovery(
        RecoveryKind::UnreadableFolder,
        "agents",
        "na",
        &project_dir.display().to_string(),
        &err.to_string(),
    );
}
