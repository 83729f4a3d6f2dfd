//! Queue change type definitions

use serde::{Deserialize, Serialize};

/// Why the queue changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum QueueChangeTrigger {
    /// Tracks appended by a command
    Enqueue,
    /// Head removed by an explicit skip
    Skip,
    /// Head removed because its stream reached end-of-data
    Completion,
    /// Broken head dropped (only when failed tracks are skipped)
    FailedTrack,
    /// Everything but the active head removed
    Clear,
    /// Tail reordered
    Shuffle,
    /// Whole queue dropped by stop or idle disconnect
    Stop,
}

impl std::fmt::Display for QueueChangeTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueChangeTrigger::Enqueue => write!(f, "Enqueue"),
            QueueChangeTrigger::Skip => write!(f, "Skip"),
            QueueChangeTrigger::Completion => write!(f, "Completion"),
            QueueChangeTrigger::FailedTrack => write!(f, "FailedTrack"),
            QueueChangeTrigger::Clear => write!(f, "Clear"),
            QueueChangeTrigger::Shuffle => write!(f, "Shuffle"),
            QueueChangeTrigger::Stop => write!(f, "Stop"),
        }
    }
}
