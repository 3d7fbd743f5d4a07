use anyhow::Result;

use crate::archiver::config::ArchiverConfig;
use crate::archiver::files::files_to_archive;
use crate::archiver::recovery::RecoveryStats;
use crate::archiver::util::{format_size, truncate_id};
use crate::commands::{CommandReport, SessionQuery, select_sessions};

pub fn run(cfg: &ArchiverConfig, query: &SessionQuery) -> Result<CommandReport> {
    let mut report = CommandReport::new("preview");
    let mut stats = RecoveryStats::default();

    let Some(sessions) = select_sessions(cfg, query, &mut report, &mut stats)? else {
        return Ok(report);
    };

    let sets = files_to_archive(&sessions, &mut stats);
    let grand_total: u64 = sets.iter().map(|s| s.total_size).sum();
    let file_count: usize = sets.iter().map(|s| s.files.len()).sum();

    report.detail(format!("sessions={}", sets.len()));
    report.detail(format!("files={file_count}"));
    report.detail(format!("total_size={}", format_size(grand_total)));
    for set in &sets {
        report.detail(format!(
            "session={} files={} size={}",
            truncate_id(&set.session_id),
            set.files.len(),
            format_size(set.total_size)
        ));
        for file in &set.files {
            report.detail(format!(
                "  {} kind={} size={}",
                file.name,
                file.kind.as_str(),
                format_size(file.size)
            ));
        }
    }
    report.recovery(&stats);
    report.attach(&sets)?;
    Ok(report)
}
