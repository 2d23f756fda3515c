//! Job lifecycle state and its transition rules.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a job.
///
/// `Pending → Active → {Completed | Failed | Cancelled}` and
/// `Pending → Cancelled`. The three right-hand states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Active,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Active => "active",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }

    /// Parses the lowercase name used on the wire. Unknown names yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(JobState::Pending),
            "active" => Some(JobState::Active),
            "completed" => Some(JobState::Completed),
            "failed" => Some(JobState::Failed),
            "cancelled" | "canceled" => Some(JobState::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }

    pub fn can_transition_to(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Pending, JobState::Active)
                | (JobState::Pending, JobState::Cancelled)
                | (JobState::Active, JobState::Completed)
                | (JobState::Active, JobState::Failed)
                | (JobState::Active, JobState::Cancelled)
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [JobState; 5] = [
        JobState::Pending,
        JobState::Active,
        JobState::Completed,
        JobState::Failed,
        JobState::Cancelled,
    ];

    #[test]
    fn terminal_states_have_no_outgoing_transitions() {
        for from in ALL.into_iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be refused");
            }
        }
    }

    #[test]
    fn pending_cannot_skip_to_completed_or_failed() {
        assert!(!JobState::Pending.can_transition_to(JobState::Completed));
        assert!(!JobState::Pending.can_transition_to(JobState::Failed));
        assert!(JobState::Pending.can_transition_to(JobState::Cancelled));
        assert!(!JobState::Active.can_transition_to(JobState::Pending));
    }

    #[test]
    fn parse_accepts_wire_names() {
        for s in ALL {
            assert_eq!(JobState::parse(s.as_str()), Some(s));
        }
        assert_eq!(JobState::parse("Canceled"), Some(JobState::Cancelled));
        assert_eq!(JobState::parse("paused"), None);
    }
}
