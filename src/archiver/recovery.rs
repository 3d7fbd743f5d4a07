use serde::Serialize;

/// Local recovery paths taken while scanning. None of these abort a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryKind {
    MalformedLine,
    UnreadableTranscript,
    UnreadableAgent,
    UnreadableFolder,
}

impl RecoveryKind {
    pub fn code(self) -> &'static str {
        match self {
            Self::MalformedLine => "MALFORMED_LINE",
            Self::UnreadableTranscript => "TRANSCRIPT_UNREADABLE",
            Self::UnreadableAgent => "AGENT_UNREADABLE",
            Self::UnreadableFolder => "FOLDER_UNREADABLE",
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            Self::MalformedLine => "json-parse-failed",
            Self::UnreadableTranscript => "transcript-excluded",
            Self::UnreadableAgent => "agent-treated-as-unrelated",
            Self::UnreadableFolder => "folder-treated-as-absent",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryStats {
    pub malformed_lines: usize,
    pub unreadable_transcripts: usize,
    pub unreadable_agents: usize,
    pub unreadable_folders: usize,
}

impl RecoveryStats {
    pub fn record(&mut self, kind: RecoveryKind, count: usize) {
        let slot = match kind {
            RecoveryKind::MalformedLine => &mut self.malformed_lines,
            RecoveryKind::UnreadableTranscript => &mut self.unreadable_transcripts,
            RecoveryKind::UnreadableAgent => &mut self.unreadable_agents,
            RecoveryKind::UnreadableFolder => &mut self.unreadable_folders,
        };
        *slot += count;
    }

    pub fn total(&self) -> usize {
        self.malformed_lines
            + self.unreadable_transcripts
            + self.unreadable_agents
            + self.unreadable_folders
    }

    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }
}
