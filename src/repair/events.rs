use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;

/// A state of the repair state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RepairPhase {
    Sanitizing,
    StructuralFix,
    RemoteValidating,
    Patching,
    NeedsCredential,
    Done,
    Exhausted,
    Cancelled,
    Failed,
}

impl RepairPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RepairPhase::Done | RepairPhase::Exhausted | RepairPhase::Cancelled | RepairPhase::Failed
        )
    }
}

impl fmt::Display for RepairPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RepairPhase::Sanitizing => "sanitizing",
            RepairPhase::StructuralFix => "structural-fix",
            RepairPhase::RemoteValidating => "remote-validating",
            RepairPhase::Patching => "patching",
            RepairPhase::NeedsCredential => "needs-credential",
            RepairPhase::Done => "done",
            RepairPhase::Exhausted => "exhausted",
            RepairPhase::Cancelled => "cancelled",
            RepairPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Progress of a repair session. Events are snapshots; nothing in the session
/// depends on whether they are received.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RepairEvent {
    /// The session entered a phase. `errors` is the error list known at that point.
    PhaseEntered {
        iteration: u32,
        phase: RepairPhase,
        errors: Vec<String>,
    },
    /// Fixes were appended to the log.
    FixesApplied {
        iteration: u32,
        fixes: Vec<String>,
    },
    /// The session is sleeping before retrying a transient failure.
    Waiting {
        iteration: u32,
        attempt: u32,
        delay: Duration,
        reason: String,
    },
}

pub type EventSender = mpsc::UnboundedSender<RepairEvent>;

pub type EventReceiver = mpsc::UnboundedReceiver<RepairEvent>;

pub fn create_event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
