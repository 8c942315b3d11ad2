//! # Pack Lifecycle States
//!
//! ```text
//! Draft ──(first version)──▶ Published ──▶ Deprecated
//!   │                           ▲              │
//!   │                           └──────────────┘ (reinstatement)
//!   └──▶ Rejected (terminal)
//! ```
//!
//! `Draft → Published` is never requested directly. It happens inside the
//! publish transaction, exactly once, when the first version is committed.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Lifecycle status of a pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackStatus {
    /// Created, no versions yet.
    Draft,
    /// Has at least one version and is downloadable.
    Published,
    /// Refused by a moderator (terminal).
    Rejected,
    /// Still downloadable by existing holders, closed to new versions.
    Deprecated,
}

impl PackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Rejected => "rejected",
            Self::Deprecated => "deprecated",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected)
    }

    /// Whether a new version may be committed to a pack in this state.
    pub fn accepts_versions(&self) -> bool {
        matches!(self, Self::Draft | Self::Published)
    }

    /// Whether version content may be downloaded.
    pub fn is_downloadable(&self) -> bool {
        matches!(self, Self::Published | Self::Deprecated)
    }

    /// Targets reachable by an explicit status change request.
    ///
    /// `Published` is absent from `Draft`'s list; that edge belongs to the
    /// publish transaction.
    pub fn valid_transitions(&self) -> &'static [PackStatus] {
        match self {
            Self::Draft => &[Self::Rejected],
            Self::Published => &[Self::Deprecated],
            Self::Deprecated => &[Self::Published],
            Self::Rejected => &[],
        }
    }

    pub fn can_transition_to(&self, target: PackStatus) -> bool {
        self.valid_transitions().contains(&target)
    }
}

impl FromStr for PackStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            "rejected" => Ok(Self::Rejected),
            "deprecated" => Ok(Self::Deprecated),
            other => Err(ValidationError::UnknownStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for PackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_cannot_be_published_by_request() {
        assert!(!PackStatus::Draft.can_transition_to(PackStatus::Published));
    }

    #[test]
    fn rejected_is_terminal() {
        assert!(PackStatus::Rejected.is_terminal());
        assert!(PackStatus::Rejected.valid_transitions().is_empty());
    }

    #[test]
    fn deprecation_is_reversible() {
        assert!(PackStatus::Published.can_transition_to(PackStatus::Deprecated));
        assert!(PackStatus::Deprecated.can_transition_to(PackStatus::Published));
    }

    #[test]
    fn only_draft_and_published_accept_versions() {
        assert!(PackStatus::Draft.accepts_versions());
        assert!(PackStatus::Published.accepts_versions());
        assert!(!PackStatus::Deprecated.accepts_versions());
        assert!(!PackStatus::Rejected.accepts_versions());
    }

    #[test]
    fn string_roundtrip() {
        for s in [
            PackStatus::Draft,
            PackStatus::Published,
            PackStatus::Rejected,
            PackStatus::Deprecated,
        ] {
            assert_eq!(s.as_str().parse::<PackStatus>().unwrap(), s);
        }
    }
}
