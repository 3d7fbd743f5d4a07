pub mod archive;
pub mod preview;
pub mod projects;
pub mod sessions;
pub mod status;

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

use crate::archiver::config::ArchiverConfig;
use crate::archiver::projects::{Project, find_project, scan_projects};
use crate::archiver::recovery::RecoveryStats;
use crate::archiver::sessions::{
    FilterCriterion, Session, filter_sessions, get_sessions, sessions_from_projects,
};

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
            data: None,
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    pub fn attach(&mut self, data: &impl Serialize) -> Result<()> {
        self.data = Some(serde_json::to_value(data)?);
        Ok(())
    }

    pub fn recovery(&mut self, stats: &RecoveryStats) {
        if stats.is_clean() {
            return;
        }
        self.detail(format!(
            "recovered.malformed_lines={} recovered.unreadable_transcripts={} recovered.unreadable_agents={} recovered.unreadable_folders={}",
            stats.malformed_lines,
            stats.unreadable_transcripts,
            stats.unreadable_agents,
            stats.unreadable_folders
        ));
    }
}

/// Project plus session selection shared by `sessions`, `preview` and `archive`.
#[derive(Debug, Clone, Default)]
pub struct SessionQuery {
    /// `None` selects every project.
    pub project: Option<String>,
    pub filter: Option<String>,
    pub title: Option<String>,
    pub session_ids: Vec<String>,
}

pub fn discover_projects(
    cfg: &ArchiverConfig,
    report: &mut CommandReport,
    stats: &mut RecoveryStats,
) -> Option<Vec<Project>> {
    match scan_projects(cfg.projects_dir(), stats) {
        Ok(projects) => Some(projects),
        Err(err) => {
            report.issue(format!("discovery.{}: {err}", err.code()));
            None
        }
    }
}

/// Resolve the query to a session list, or record why it could not be.
pub fn select_sessions(
    cfg: &ArchiverConfig,
    query: &SessionQuery,
    report: &mut CommandReport,
    stats: &mut RecoveryStats,
) -> Result<Option<Vec<Session>>> {
    let criterion = match query.filter.as_deref() {
        Some(raw) => Some(raw.parse::<FilterCriterion>()?),
        None => None,
    };
    let Some(projects) = discover_projects(cfg, report, stats) else {
        return Ok(None);
    };

    let mut sessions = match query.project.as_deref() {
        Some(needle) => {
            let Some(project) = find_project(&projects, needle) else {
                report.issue(format!("project not found: {needle}"));
                return Ok(None);
            };
            report.detail(format!("project={}", project.readable_path));
            report.detail(format!("project.folder={}", project.folder_name));
            get_sessions(project, stats)
        }
        None => {
            report.detail(format!("project=all ({} projects)", projects.len()));
            sessions_from_projects(&projects, stats)
        }
    };

    if let Some(criterion) = criterion {
        sessions = filter_sessions(&sessions, criterion, query.title.as_deref());
    }
    if let Some(filter) = query.filter.as_deref() {
        report.detail(format!("filter={filter}"));
    }
    if !query.session_ids.is_empty() {
        sessions.retain(|s| query.session_ids.iter().any(|id| id == &s.id));
        for id in &query.session_ids {
            if !sessions.iter().any(|s| &s.id == id) {
                report.issue(format!("session not selected: {id}"));
            }
        }
    }
    Ok(Some(sessions))
}
