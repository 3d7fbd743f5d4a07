use anyhow::Result;

use crate::archiver::config::ArchiverConfig;
use crate::archiver::recovery::RecoveryStats;
use crate::commands::{CommandReport, discover_projects};

pub fn run(cfg: &ArchiverConfig) -> Result<CommandReport> {
    let mut report = CommandReport::new("projects");
    let mut stats = RecoveryStats::default();

    report.detail(format!("projects_dir={}", cfg.projects_dir().display()));
    let Some(projects) = discover_projects(cfg, &mut report, &mut stats) else {
        return Ok(report);
    };

    report.detail(format!("projects={}", projects.len()));
    for project in &projects {
        report.detail(format!(
            "project={} folder={} sessions={}",
            project.readable_path, project.folder_name, project.session_count
        ));
    }
    report.recovery(&stats);
    report.attach(&projects)?;
    Ok(report)
}
