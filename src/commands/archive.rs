use anyhow::Result;

use crate::archiver::config::{ArchiverConfig, RunMode};
use crate::archiver::engine::{
    ArchiveContext, ArchiveResult, ArchiveSummary, archive_sessions, summarize,
};
use crate::archiver::recovery::RecoveryStats;
use crate::archiver::util::format_size;
use crate::commands::{CommandReport, SessionQuery, select_sessions};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    pub query: SessionQuery,
    pub mode: RunMode,
}

#[derive(Serialize)]
struct ArchiveData<'a> {
    mode: RunMode,
    summary: ArchiveSummary,
    results: &'a [ArchiveResult],
}

pub fn run(cfg: &ArchiverConfig, opts: &ArchiveOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("archive");
    let mut stats = RecoveryStats::default();

    report.detail(format!("mode={}", opts.mode));
    if let Some(banner) = opts.mode.banner() {
        report.detail(banner);
    }

    if opts.query.filter.is_none() && opts.query.session_ids.is_empty() {
        report.issue("refusing to archive without --filter or --session");
        return Ok(report);
    }

    let Some(sessions) = select_sessions(cfg, &opts.query, &mut report, &mut stats)? else {
        return Ok(report);
    };
    if sessions.is_empty() {
        report.detail("no sessions matched; nothing to archive");
        report.recovery(&stats);
        return Ok(report);
    }

    let ctx = ArchiveContext::from_config(cfg, opts.mode);
    let results = archive_sessions(&ctx, &sessions, &mut stats, |done, total, current| {
        eprintln!("archiving {}/{} {}", done + 1, total, current.id);
    });

    for result in &results {
        if result.success {
            report.detail(format!(
                "archived session={} to={}",
                result.session.id,
                result.archive_path.as_deref().unwrap_or("-")
            ));
        } else {
            report.issue(format!(
                "failed session={} kind={} error={}",
                result.session.id,
                result.error_kind.map(|k| k.as_str()).unwrap_or("unknown"),
                result.error.as_deref().unwrap_or("-")
            ));
        }
        for artifact in result.stranded() {
            report.issue(format!(
                "stranded session={} artifact={} kind={}",
                result.session.id,
                artifact.file.path.display(),
                artifact.error_kind.map(|k| k.as_str()).unwrap_or("unknown")
            ));
        }
    }

    let summary = summarize(&results);
    report.detail(format!(
        "summary total={} successful={} failed={} archived_size={}",
        summary.total,
        summary.successful,
        summary.failed,
        format_size(summary.total_size)
    ));
    report.recovery(&stats);
    report.attach(&ArchiveData {
        mode: opts.mode,
        summary,
        results: &results,
    })?;
    Ok(report)
}
