use crate::archiver::agents::{TRANSCRIPT_EXTENSION, agent_counts_by_session, session_transcript_names};
use crate::archiver::projects::Project;
use crate::archiver::recovery::{RecoveryKind, RecoveryStats};
use crate::archiver::warn;
use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    /// Transcript file stem.
    pub id: String,
    pub path: PathBuf,
    pub project_path: PathBuf,
    pub size: u64,
    pub summary: Option<String>,
    pub has_custom_title: bool,
    pub custom_title: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub agent_count: usize,
}

impl Session {
    pub fn file_name(&self) -> String {
        format!("{}{TRANSCRIPT_EXTENSION}", self.id)
    }

    /// Custom title when present, otherwise the first summary.
    pub fn label(&self) -> Option<&str> {
        self.custom_title.as_deref().or(self.summary.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterCriterion {
    Unnamed,
    ByTitle,
    OlderThan,
    BySize,
}

impl FromStr for FilterCriterion {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim() {
            "unnamed" => Ok(Self::Unnamed),
            "by-title" => Ok(Self::ByTitle),
            "older-than" => Ok(Self::OlderThan),
            "by-size" => Ok(Self::BySize),
            other => Err(anyhow!(
                "unknown filter `{other}`: use unnamed, by-title, older-than or by-size"
            )),
        }
    }
}

#[derive(Debug, Default)]
struct TranscriptFields {
    summary: Option<String>,
    has_custom_title: bool,
    custom_title: Option<String>,
    timestamp_seen: bool,
    timestamp: Option<DateTime<Utc>>,
    malformed_lines: usize,
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn extract_fields(content: &str) -> TranscriptFields {
    let mut out = TranscriptFields::default();

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record: Value = match serde_json::from_str(trimmed) {
            Ok(record) => record,
            Err(_) => {
                out.malformed_lines += 1;
                continue;
            }
        };

        let kind = record.get("type").and_then(Value::as_str);

        // Renames append a new record, so the latest one is the current title.
        if kind == Some("custom-title") {
            out.has_custom_title = true;
            out.custom_title = record
                .get("customTitle")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned);
        }

        if out.summary.is_none() && kind == Some("summary") {
            out.summary = record
                .get("summary")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned);
        }

        if !out.timestamp_seen
            && let Some(raw) = record.get("timestamp").and_then(Value::as_str)
        {
            out.timestamp_seen = true;
            out.timestamp = parse_timestamp(raw);
        }
    }

    out
}

/// Parse one transcript. `None` when the file cannot be read or stat'd.
pub fn parse_session(
    transcript: &Path,
    project_path: &Path,
    agent_count: usize,
    stats: &mut RecoveryStats,
) -> Option<Session> {
    let id = transcript
        .file_name()
        .and_then(|s| s.to_str())
        .and_then(|name| name.strip_suffix(TRANSCRIPT_EXTENSION))?
        .to_string();

    let loaded = fs::read(transcript).and_then(|raw| Ok((raw, fs::metadata(transcript)?)));
    let (raw, meta) = match loaded {
        Ok(loaded) => loaded,
        Err(err) => {
            stats.record(RecoveryKind::UnreadableTranscript, 1);
            warn::emit_recovery(
                RecoveryKind::UnreadableTranscript,
                "parse",
                &id,
                &transcript.display().to_string(),
                &err.to_string(),
            );
            return None;
        }
    };

    let fields = extract_fields(&String::from_utf8_lossy(&raw));
    if fields.malformed_lines > 0 {
        stats.record(RecoveryKind::MalformedLine, fields.malformed_lines);
        warn::emit_recovery(
            RecoveryKind::MalformedLine,
            "parse",
            &id,
            &transcript.display().to_string(),
            &format!("{} lines skipped", fields.malformed_lines),
        );
    }

    Some(Session {
        id,
        path: transcript.to_path_buf(),
        project_path: project_path.to_path_buf(),
        size: meta.len(),
        summary: fields.summary,
        has_custom_title: fields.has_custom_title,
        custom_title: fields.custom_title,
        timestamp: fields.timestamp,
        agent_count,
    })
}

/// Newest first; sessions without a timestamp sink to the end.
pub fn compare_newest_first(a: &Session, b: &Session) -> Ordering {
    match (a.timestamp, b.timestamp) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn sort_sessions(sessions: &mut [Session]) {
    sessions.sort_by(compare_newest_first);
}

pub fn sessions_in_dir(project_dir: &Path, stats: &mut RecoveryStats) -> Vec<Session> {
    let names = match session_transcript_names(project_dir) {
        Ok(names) => names,
        Err(err) => {
            stats.record(RecoveryKind::UnreadableFolder, 1);
            warn::emit_recovery(
                RecoveryKind::UnreadableFolder,
                "sessions",
                "na",
                &project_dir.display().to_string(),
                &err.to_string(),
            );
            return Vec::new();
        }
    };
    let agent_counts = agent_counts_by_session(project_dir, stats);

    let mut sessions = Vec::with_capacity(names.len());
    for name in names {
        let path = project_dir.join(&name);
        let id = name.strip_suffix(TRANSCRIPT_EXTENSION).unwrap_or(&name);
        let agent_count = agent_counts.get(id).copied().unwrap_or(0);
        if let Some(session) = parse_session(&path, project_dir, agent_count, stats) {
            sessions.push(session);
        }
    }

    sort_sessions(&mut sessions);
    sessions
}

pub fn get_sessions(project: &Project, stats: &mut RecoveryStats) -> Vec<Session> {
    sessions_in_dir(&project.path, stats)
}

/// Sessions of every project, concatenated in project order.
pub fn sessions_from_projects(projects: &[Project], stats: &mut RecoveryStats) -> Vec<Session> {
    projects
        .iter()
        .flat_map(|project| get_sessions(project, stats))
        .collect()
}

pub fn filter_sessions(
    sessions: &[Session],
    criterion: FilterCriterion,
    title_pattern: Option<&str>,
) -> Vec<Session> {
    match criterion {
        FilterCriterion::Unnamed => sessions
            .iter()
            .filter(|s| !s.has_custom_title)
            .cloned()
            .collect(),
        FilterCriterion::ByTitle => {
            let Some(pattern) = title_pattern.filter(|p| !p.is_empty()) else {
                return Vec::new();
            };
            let pattern = pattern.to_lowercase();
            sessions
                .iter()
                .filter(|s| {
                    s.has_custom_title
                        && s.custom_title
                            .as_deref()
                            .is_some_and(|title| title.to_lowercase().contains(&pattern))
                })
                .cloned()
                .collect()
        }
        // Selectable but not implemented yet.
        FilterCriterion::OlderThan | FilterCriterion::BySize => Vec::new(),
    }
}

pub fn total_size(sessions: &[Session]) -> u64 {
    sessions.iter().map(|s| s.size).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn session(id: &str, timestamp: Option<DateTime<Utc>>) -> Session {
        Session {
            id: id.to_string(),
            path: PathBuf::from(format!("/p/{id}.jsonl")),
            project_path: PathBuf::from("/p"),
            size: 10,
            summary: None,
            has_custom_title: false,
            custom_title: None,
            timestamp,
            agent_count: 0,
        }
    }

    #[test]
    fn last_custom_title_wins() {
        let fields = extract_fields(concat!(
            "{\"type\":\"custom-title\",\"customTitle\":\"first\"}\n",
            "{\"type\":\"user\"}\n",
            "{\"type\":\"custom-title\",\"customTitle\":\"renamed\"}\n",
        ));
        assert!(fields.has_custom_title);
        assert_eq!(fields.custom_title.as_deref(), Some("renamed"));
    }

    #[test]
    fn no_custom_title_record_leaves_title_unset() {
        let fields = extract_fields("{\"type\":\"summary\",\"summary\":\"x\"}\n");
        assert!(!fields.has_custom_title);
        assert_eq!(fields.custom_title, None);
    }

    #[test]
    fn first_summary_wins() {
        let fields = extract_fields(concat!(
            "{\"type\":\"summary\",\"summary\":\"Fix bug\"}\n",
            "{\"type\":\"summary\",\"summary\":\"Later\"}\n",
        ));
        assert_eq!(fields.summary.as_deref(), Some("Fix bug"));
    }

    #[test]
    fn first_timestamp_wins_and_bad_lines_are_counted() {
        let fields = extract_fields(concat!(
            "{\"type\":\"summary\",\"summary\":\"s\"}\n",
            "{oops\n",
            "\n",
            "   \n",
            "{\"timestamp\":\"2025-03-01T10:00:00.000Z\"}\n",
            "{\"timestamp\":\"2026-01-01T00:00:00Z\"}\n",
        ));
        assert_eq!(
            fields.timestamp,
            Some(Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(fields.malformed_lines, 1);
    }

    #[test]
    fn non_string_timestamp_is_not_a_timestamp() {
        let fields = extract_fields(concat!(
            "{\"timestamp\":12345}\n",
            "{\"timestamp\":\"2025-03-01T10:00:00Z\"}\n",
        ));
        assert!(fields.timestamp.is_some());
    }

    #[test]
    fn missing_timestamps_sort_last() {
        let older = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mut sessions = vec![
            session("none-a", None),
            session("old", Some(older)),
            session("none-b", None),
            session("new", Some(newer)),
        ];
        sort_sessions(&mut sessions);
        let ids: Vec<_> = sessions.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old", "none-a", "none-b"]);
    }

    #[test]
    fn by_title_filter_is_case_insensitive() {
        let mut named = session("named", None);
        named.has_custom_title = true;
        named.custom_title = Some("Refactor PARSER".to_string());
        let sessions = vec![session("plain", None), named];

        let hits = filter_sessions(&sessions, FilterCriterion::ByTitle, Some("parser"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "named");

        assert!(filter_sessions(&sessions, FilterCriterion::ByTitle, None).is_empty());
        assert!(filter_sessions(&sessions, FilterCriterion::OlderThan, None).is_empty());
        assert!(filter_sessions(&sessions, FilterCriterion::BySize, None).is_empty());
    }

    #[test]
    fn unnamed_filter_scenario() {
        let tmp = tempdir().expect("tempdir");
        let project = tmp.path().join("-home-alice-app");
        fs::create_dir_all(&project).expect("mkdir");
        fs::write(
            project.join("abc123.jsonl"),
            "{\"type\":\"summary\",\"summary\":\"Fix bug\"}\n",
        )
        .expect("write abc");
        fs::write(
            project.join("def456.jsonl"),
            "{\"type\":\"custom-title\",\"customTitle\":\"renamed\"}\n",
        )
        .expect("write def");

        let mut stats = RecoveryStats::default();
        let sessions = sessions_in_dir(&project, &mut stats);
        assert_eq!(sessions.len(), 2);

        let unnamed = filter_sessions(&sessions, FilterCriterion::Unnamed, None);
        let ids: Vec<_> = unnamed.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["abc123"]);
        assert_eq!(unnamed[0].summary.as_deref(), Some("Fix bug"));
        assert!(stats.is_clean());
    }

    #[test]
    fn sessions_carry_agent_counts_and_skip_agent_files() {
        let tmp = tempdir().expect("tempdir");
        let project = tmp.path();
        fs::write(project.join("S.jsonl"), "{\"timestamp\":\"2025-01-01T00:00:00Z\"}\n")
            .expect("write S");
        fs::write(project.join("agent-x.jsonl"), "{\"sessionId\":\"S\"}\n").expect("agent x");
        fs::write(project.join("agent-y.jsonl"), "{\"sessionId\":\"S\"}\n").expect("agent y");

        let mut stats = RecoveryStats::default();
        let sessions = sessions_in_dir(project, &mut stats);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, "S");
        assert_eq!(sessions[0].agent_count, 2);
        assert_eq!(sessions[0].size, fs::metadata(project.join("S.jsonl")).unwrap().len());
    }

    #[test]
    fn unreadable_transcript_is_excluded_and_counted() {
        let tmp = tempdir().expect("tempdir");
        let mut stats = RecoveryStats::default();
        let parsed = parse_session(&tmp.path().join("gone.jsonl"), tmp.path(), 0, &mut stats);
        assert!(parsed.is_none());
        assert_eq!(stats.unreadable_transcripts, 1);
    }

    #[test]
    fn total_size_sums_sessions() {
        let sessions = vec![session("a", None), session("b", None)];
        assert_eq!(total_size(&sessions), 20);
    }
}
