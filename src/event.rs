use serde::Serialize;

use crate::notify::Dispatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Init,
    Connected,
    Polling,
    Reconnecting,
    Terminated,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Connected => "CONNECTED",
            Self::Polling => "POLLING",
            Self::Reconnecting => "RECONNECTING",
            Self::Terminated => "TERMINATED",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the health endpoint sees. Published by the supervisor after every
/// phase change and cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub phase: Phase,
    pub consecutive_failures: u32,
    pub last_poll_ms: Option<u64>,
    pub tracked_symbols: Vec<String>,
    pub alerts_sent: u64,
    pub cycles_completed: u64,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            phase: Phase::Init,
            consecutive_failures: 0,
            last_poll_ms: None,
            tracked_symbols: Vec::new(),
            alerts_sent: 0,
            cycles_completed: 0,
        }
    }
}

/// Outcome of one analysed symbol within a cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolOutcome {
    NoSignal,
    Skipped { reason: String },
    Dispatched(Dispatch),
    DeliveryFailed { error: String },
}

/// Summary of one poll cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub rows_seen: usize,
    pub new_rows: usize,
    pub parse_failures: usize,
    pub outcomes: Vec<(String, SymbolOutcome)>,
    pub exits: Vec<(String, &'static str)>,
    pub purged_records: usize,
}

impl CycleReport {
    pub fn sent(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, SymbolOutcome::Dispatched(Dispatch::Sent)))
            .count()
    }

    pub fn rate_limited(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, SymbolOutcome::Dispatched(Dispatch::RateLimited { .. })))
            .count()
    }

    pub fn analysed(&self) -> Vec<&str> {
        self.outcomes.iter().map(|(s, _)| s.as_str()).collect()
    }
}
