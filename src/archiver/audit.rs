use crate::archiver::util::now_epoch_secs;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub at_epoch_secs: u64,
    pub phase: String,
    pub status: String,
    pub session: String,
    pub message: String,
}

pub fn append_event(
    audit_log: &Path,
    phase: &str,
    status: &str,
    session: &str,
    message: &str,
) -> Result<()> {
    if let Some(parent) = audit_log.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let event = AuditEvent {
        at_epoch_secs: now_epoch_secs()?,
        phase: phase.to_string(),
        status: status.to_string(),
        session: session.to_string(),
        message: message.to_string(),
    };

    let line = format!("{}\n", serde_json::to_string(&event)?);
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(audit_log)
        .with_context(|| format!("failed to open {}", audit_log.display()))?;
    file.write_all(line.as_bytes())?;
    Ok(())
}
