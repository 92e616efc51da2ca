/// Job phase definitions for a single sweep run
///
/// A run goes `Start -> Seeding -> Crawling -> Aggregated -> Persisting ->
/// Notifying -> Done`. `Failed` is reachable from every non-terminal phase.
use std::fmt;

/// Represents the current phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobPhase {
    // ===== Active Phases =====
    /// Nothing has happened yet
    Start,

    /// Seed URLs are being generated
    Seeding,

    /// Listing pages are being fetched and scanned
    Crawling,

    /// The identifier set is complete
    Aggregated,

    /// Identifiers are being written to the store
    Persisting,

    /// The downstream service is being pinged
    Notifying,

    // ===== Terminal Phases =====
    /// The run finished
    Done,

    /// The run was aborted
    Failed,
}

impl JobPhase {
    /// Returns true if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns the phase that normally follows this one
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Start => Some(Self::Seeding),
            Self::Seeding => Some(Self::Crawling),
            Self::Crawling => Some(Self::Aggregated),
            Self::Aggregated => Some(Self::Persisting),
            Self::Persisting => Some(Self::Notifying),
            Self::Notifying => Some(Self::Done),
            Self::Done | Self::Failed => None,
        }
    }

    /// Returns true if moving from this phase to `to` is legal
    pub fn can_transition_to(&self, to: JobPhase) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == Self::Failed || self.next() == Some(to)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Seeding => "seeding",
            Self::Crawling => "crawling",
            Self::Aggregated => "aggregated",
            Self::Persisting => "persisting",
            Self::Notifying => "notifying",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Returns all phases in order
    pub fn all_phases() -> Vec<Self> {
        vec![
            Self::Start,
            Self::Seeding,
            Self::Crawling,
            Self::Aggregated,
            Self::Persisting,
            Self::Notifying,
            Self::Done,
            Self::Failed,
        ]
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
