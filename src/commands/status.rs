use anyhow::Result;

use crate::archiver::config::{ArchiverConfig, RunMode};
use crate::archiver::projects::projects_dir_exists;
use crate::archiver::util::format_size;
use crate::commands::CommandReport;

pub fn run(cfg: &ArchiverConfig, mode: RunMode) -> Result<CommandReport> {
    let mut report = CommandReport::new("status");

    report.detail(format!("projects_dir={}", cfg.projects_dir().display()));
    report.detail(format!("archive_folder={}", cfg.archive.folder));
    report.detail(format!("mode={mode}"));
    if let Some(banner) = mode.banner() {
        report.detail(banner);
    }
    report.detail(format!("state_home={}", cfg.paths.state_home.display()));
    report.detail(format!("logs_dir={}", cfg.paths.logs_dir.display()));
    if cfg.archive.audit_log {
        report.detail(format!("audit_log={}", cfg.paths.audit_log.display()));
    } else {
        report.detail("audit_log=disabled");
    }

    if !projects_dir_exists(cfg.projects_dir()) {
        report.issue(format!(
            "missing projects dir ({})",
            cfg.projects_dir().display()
        ));
        return Ok(report);
    }

    match fs2::available_space(cfg.projects_dir()) {
        Ok(bytes) => report.detail(format!("available_space={}", format_size(bytes))),
        Err(err) => report.issue(format!("available_space=unknown ({err})")),
    }

    Ok(report)
}
