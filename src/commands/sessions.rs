use anyhow::Result;

use crate::archiver::config::ArchiverConfig;
use crate::archiver::recovery::RecoveryStats;
use crate::archiver::sessions::total_size;
use crate::archiver::util::{format_size, truncate};
use crate::commands::{CommandReport, SessionQuery, select_sessions};

const LABEL_WIDTH: usize = 60;

pub fn run(cfg: &ArchiverConfig, query: &SessionQuery) -> Result<CommandReport> {
    let mut report = CommandReport::new("sessions");
    let mut stats = RecoveryStats::default();

    let Some(sessions) = select_sessions(cfg, query, &mut report, &mut stats)? else {
        return Ok(report);
    };

    report.detail(format!("sessions={}", sessions.len()));
    report.detail(format!("total_size={}", format_size(total_size(&sessions))));
    for session in &sessions {
        let when = session
            .timestamp
            .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let label = session.label().map(|l| truncate(l, LABEL_WIDTH));
        report.detail(format!(
            "session={} at={} size={} agents={} titled={} label={}",
            session.id,
            when,
            format_size(session.size),
            session.agent_count,
            session.has_custom_title,
            label.as_deref().unwrap_or("-")
        ));
    }
    report.recovery(&stats);
    report.attach(&sessions)?;
    Ok(report)
}
