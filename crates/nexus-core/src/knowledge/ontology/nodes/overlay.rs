//! Overlay nodes derived from the base graph: communities and processes.
//!
//! Overlays reference symbols through relations only.

use serde::{Deserialize, Serialize};

// =============================================================================
// COMMUNITY
// =============================================================================

/// A functional cluster of symbols.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityNode {
    /// Unique identifier (`community:<n>`)
    pub id: String,

    /// Heuristic label derived from member names
    pub label: String,

    /// Number of member symbols
    pub symbol_count: usize,

    /// Share of member relation weight that stays inside the cluster, in `[0, 1]`
    pub cohesion: f64,
}

impl CommunityNode {
    pub fn id_for(n: usize) -> String {
        format!("community:{}", n)
    }
}

// =============================================================================
// PROCESS
// =============================================================================

/// Heuristic classification of an execution flow by its entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessType {
    HttpHandler,
    CliCommand,
    EventListener,
    Test,
    Unknown,
}

impl ProcessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HttpHandler => "http_handler",
            Self::CliCommand => "cli_command",
            Self::EventListener => "event_listener",
            Self::Test => "test",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "http_handler" => Self::HttpHandler,
            "cli_command" => Self::CliCommand,
            "event_listener" => Self::EventListener,
            "test" => Self::Test,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for ProcessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered call flow starting at an entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessNode {
    /// Unique identifier (`process:<n>`)
    pub id: String,

    /// `"<Entry> → <Terminal>"`, or the entry name for single-step flows
    pub label: String,

    /// Type inherited from the entry point
    pub process_type: ProcessType,

    /// Number of steps
    pub step_count: usize,

    /// Id of the first step
    pub entry_id: String,

    /// Id of the last step
    pub terminal_id: String,

    /// Distinct communities the steps belong to
    pub community_count: usize,
}

impl ProcessNode {
    pub fn id_for(n: usize) -> String {
        format!("process:{}", n)
    }
}
