//! Moves a session's archive footprint into `<project>/<archive folder>/`.
//!
//! Moving the main transcript is the commit point. The companion folder and
//! agent artifacts follow on a best-effort basis: a failure there leaves the
//! artifact in place, is reported as stranded, and never fails the session.

use crate::archiver::audit;
use crate::archiver::classify::classify_io;
use crate::archiver::config::{ArchiverConfig, RunMode};
use crate::archiver::files::{ArchiveFile, ArchiveFileKind, resolve_file_set};
use crate::archiver::recovery::RecoveryStats;
use crate::archiver::sessions::Session;
use crate::archiver::warn::{self, WarnEvent};
use crate::error::ArchiveErrorKind;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Everything an archive call needs; passed explicitly instead of global state.
#[derive(Debug, Clone)]
pub struct ArchiveContext {
    pub mode: RunMode,
    pub archive_folder: String,
    pub audit_log: Option<PathBuf>,
}

impl ArchiveContext {
    pub fn new(mode: RunMode, archive_folder: impl Into<String>) -> Self {
        Self {
            mode,
            archive_folder: archive_folder.into(),
            audit_log: None,
        }
    }

    pub fn from_config(cfg: &ArchiverConfig, mode: RunMode) -> Self {
        Self {
            audit_log: cfg
                .archive
                .audit_log
                .then(|| cfg.paths.audit_log.clone()),
            ..Self::new(mode, cfg.archive.folder.clone())
        }
    }

    pub fn archive_dir(&self, session: &Session) -> PathBuf {
        session.project_path.join(&self.archive_folder)
    }

    fn display_path(&self, path: &Path) -> String {
        match self.mode.tag() {
            Some(tag) => format!("{tag} {}", path.display()),
            None => path.display().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactStatus {
    Moved,
    Simulated,
    /// The commit step itself failed.
    Failed,
    /// Left at its original location after the commit succeeded.
    Stranded,
    /// Not attempted because the commit step did not happen.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactOutcome {
    pub file: ArchiveFile,
    pub status: ArtifactStatus,
    pub destination: String,
    pub error_kind: Option<ArchiveErrorKind>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveResult {
    pub session: Session,
    pub success: bool,
    pub archive_path: Option<String>,
    pub error: Option<String>,
    pub error_kind: Option<ArchiveErrorKind>,
    pub artifacts: Vec<ArtifactOutcome>,
}

impl ArchiveResult {
    pub fn stranded(&self) -> impl Iterator<Item = &ArtifactOutcome> {
        self.artifacts
            .iter()
            .filter(|a| a.status == ArtifactStatus::Stranded)
    }

    /// Bytes that reached (or would reach) the archive folder.
    pub fn archived_bytes(&self) -> u64 {
        self.artifacts
            .iter()
            .filter(|a| matches!(a.status, ArtifactStatus::Moved | ArtifactStatus::Simulated))
            .map(|a| a.file.size)
            .sum()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_size: u64,
}

pub fn summarize(results: &[ArchiveResult]) -> ArchiveSummary {
    let successful = results.iter().filter(|r| r.success).count();
    let total_size = results
        .iter()
        .filter(|r| r.success)
        .map(ArchiveResult::archived_bytes)
        .sum();
    ArchiveSummary {
        total: results.len(),
        successful,
        failed: results.len() - successful,
        total_size,
    }
}

fn outcome(
    file: ArchiveFile,
    status: ArtifactStatus,
    destination: String,
    failure: Option<(ArchiveErrorKind, String)>,
) -> ArtifactOutcome {
    let (error_kind, error) = match failure {
        Some((kind, message)) => (Some(kind), Some(message)),
        None => (None, None),
    };
    ArtifactOutcome {
        file,
        status,
        destination,
        error_kind,
        error,
    }
}

fn failed_result(
    session: &Session,
    mut files: Vec<ArchiveFile>,
    destination: String,
    kind: ArchiveErrorKind,
    message: String,
) -> ArchiveResult {
    let mut artifacts = Vec::with_capacity(files.len());
    if !files.is_empty() {
        let transcript = files.remove(0);
        artifacts.push(outcome(
            transcript,
            ArtifactStatus::Failed,
            destination,
            Some((kind, message.clone())),
        ));
    }
    artifacts.extend(
        files
            .into_iter()
            .map(|file| outcome(file, ArtifactStatus::Skipped, String::new(), None)),
    );
    ArchiveResult {
        session: session.clone(),
        success: false,
        archive_path: None,
        error: Some(message),
        error_kind: Some(kind),
        artifacts,
    }
}

fn entry_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Rename `from` to `to` without replacing anything already at `to`.
fn move_entry(from: &Path, to: &Path) -> Result<(), (ArchiveErrorKind, String)> {
    if entry_exists(to) {
        return Err((
            ArchiveErrorKind::AlreadyExists,
            format!("{} already exists", to.display()),
        ));
    }
    fs::rename(from, to).map_err(|err| io_failure(&err, from, to))
}

fn io_failure(err: &io::Error, from: &Path, to: &Path) -> (ArchiveErrorKind, String) {
    (
        classify_io(err),
        format!("failed to move {} to {}: {err}", from.display(), to.display()),
    )
}

fn simulate(
    ctx: &ArchiveContext,
    session: &Session,
    files: Vec<ArchiveFile>,
    dest: &Path,
) -> ArchiveResult {
    let archive_dir = ctx.archive_dir(session);
    let artifacts = files
        .into_iter()
        .map(|file| {
            let destination = ctx.display_path(&archive_dir.join(file.entry_name()));
            outcome(file, ArtifactStatus::Simulated, destination, None)
        })
        .collect();
    ArchiveResult {
        session: session.clone(),
        success: true,
        archive_path: Some(ctx.display_path(dest)),
        error: None,
        error_kind: None,
        artifacts,
    }
}

/// Archive one session. Never panics on filesystem failures; every outcome is
/// folded into the returned result.
pub fn archive_session(
    ctx: &ArchiveContext,
    session: &Session,
    stats: &mut RecoveryStats,
) -> ArchiveResult {
    let archive_dir = ctx.archive_dir(session);
    let dest = archive_dir.join(session.file_name());
    let set = resolve_file_set(session, stats);

    // Check-then-act: a concurrent invoker could still race this window.
    if entry_exists(&dest) {
        let result = failed_result(
            session,
            set.files,
            ctx.display_path(&dest),
            ArchiveErrorKind::AlreadyExists,
            format!("{} already exists", dest.display()),
        );
        record_audit(ctx, &result);
        return result;
    }

    if ctx.mode.is_read_only() {
        return simulate(ctx, session, set.files, &dest);
    }

    if let Err(err) = fs::create_dir_all(&archive_dir) {
        let result = failed_result(
            session,
            set.files,
            dest.display().to_string(),
            classify_io(&err),
            format!("failed to create {}: {err}", archive_dir.display()),
        );
        record_audit(ctx, &result);
        return result;
    }

    let mut files = set.files.into_iter();
    let Some(transcript) = files.next() else {
        return failed_result(
            session,
            Vec::new(),
            dest.display().to_string(),
            ArchiveErrorKind::Unknown,
            "empty archive file set".to_string(),
        );
    };

    if let Err(err) = fs::rename(&transcript.path, &dest) {
        let (kind, message) = io_failure(&err, &transcript.path, &dest);
        let mut rest = vec![transcript];
        rest.extend(files);
        let result = failed_result(session, rest, dest.display().to_string(), kind, message);
        record_audit(ctx, &result);
        return result;
    }

    let mut artifacts = vec![outcome(
        transcript,
        ArtifactStatus::Moved,
        dest.display().to_string(),
        None,
    )];

    for file in files {
        let target = archive_dir.join(file.entry_name());
        let destination = target.display().to_string();
        match move_entry(&file.path, &target) {
            Ok(()) => artifacts.push(outcome(file, ArtifactStatus::Moved, destination, None)),
            Err((kind, message)) => {
                warn::emit(WarnEvent {
                    code: "ARTIFACT_STRANDED",
                    stage: "archive",
                    action: stranded_action(file.kind),
                    session: &session.id,
                    path: &file.path.display().to_string(),
                    reason: kind.as_str(),
                    err: &message,
                });
                artifacts.push(outcome(
                    file,
                    ArtifactStatus::Stranded,
                    destination,
                    Some((kind, message)),
                ));
            }
        }
    }

    let result = ArchiveResult {
        session: session.clone(),
        success: true,
        archive_path: Some(dest.display().to_string()),
        error: None,
        error_kind: None,
        artifacts,
    };
    record_audit(ctx, &result);
    result
}

fn stranded_action(kind: ArchiveFileKind) -> &'static str {
    match kind {
        ArchiveFileKind::Transcript => "move-transcript",
        ArchiveFileKind::CompanionFolder => "move-companion-folder",
        ArchiveFileKind::AgentTranscript => "move-agent-transcript",
        ArchiveFileKind::AgentCompanionFolder => "move-agent-companion-folder",
    }
}

fn record_audit(ctx: &ArchiveContext, result: &ArchiveResult) {
    if ctx.mode.is_read_only() {
        return;
    }
    let Some(audit_log) = ctx.audit_log.as_deref() else {
        return;
    };

    let (status, message) = if result.success {
        let stranded = result.stranded().count();
        let status = if stranded == 0 { "ok" } else { "partial" };
        (
            status,
            format!(
                "archived to {} ({} artifacts, {} stranded)",
                result.archive_path.as_deref().unwrap_or("na"),
                result.artifacts.len(),
                stranded
            ),
        )
    } else {
        (
            "failed",
            format!(
                "{}: {}",
                result.error_kind.unwrap_or(ArchiveErrorKind::Unknown).as_str(),
                result.error.as_deref().unwrap_or("na")
            ),
        )
    };

    if let Err(err) =
        audit::append_event(audit_log, "archive", status, &result.session.id, &message)
    {
        warn::emit(WarnEvent {
            code: "AUDIT_WRITE_FAILED",
            stage: "archive",
            action: "append-audit",
            session: &result.session.id,
            path: &audit_log.display().to_string(),
            reason: "audit-log-unwritable",
            err: &format!("{err:#}"),
        });
    }
}

/// Archive `sessions` one at a time in input order. `on_progress` fires right
/// before each attempt with `(completed, total, current)`. Exactly one result
/// per input session; failures never stop the batch.
pub fn archive_sessions<F>(
    ctx: &ArchiveContext,
    sessions: &[Session],
    stats: &mut RecoveryStats,
    mut on_progress: F,
) -> Vec<ArchiveResult>
where
    F: FnMut(usize, usize, &Session),
{
    let total = sessions.len();
    let mut results = Vec::with_capacity(total);
    for (completed, session) in sessions.iter().enumerate() {
        on_progress(completed, total, session);
        results.push(archive_session(ctx, session, stats));
    }
    results
}
