use crate::models::identity::IdentityKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed enumeration of abuse reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportCategory {
    AbusiveLanguage,
    ScamSpam,
    InappropriateBehavior,
    FakeProfile,
    Other,
}

impl ReportCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportCategory::AbusiveLanguage => "abusive_language",
            ReportCategory::ScamSpam => "scam_spam",
            ReportCategory::InappropriateBehavior => "inappropriate_behavior",
            ReportCategory::FakeProfile => "fake_profile",
            ReportCategory::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "abusive_language" => Some(ReportCategory::AbusiveLanguage),
            "scam_spam" => Some(ReportCategory::ScamSpam),
            "inappropriate_behavior" => Some(ReportCategory::InappropriateBehavior),
            "fake_profile" => Some(ReportCategory::FakeProfile),
            "other" => Some(ReportCategory::Other),
            _ => None,
        }
    }
}

/// Report lifecycle. `Reviewed` is a non-terminal annotation; `Resolved` and
/// `Dismissed` are terminal, with no transition back to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Reviewed,
    Resolved,
    Dismissed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Reviewed => "reviewed",
            ReportStatus::Resolved => "resolved",
            ReportStatus::Dismissed => "dismissed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ReportStatus::Pending),
            "reviewed" => Some(ReportStatus::Reviewed),
            "resolved" => Some(ReportStatus::Resolved),
            "dismissed" => Some(ReportStatus::Dismissed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ReportStatus::Resolved | ReportStatus::Dismissed)
    }
}

/// The two terminal outcomes an operator can apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportOutcome {
    Resolved,
    Dismissed,
}

impl From<ReportOutcome> for ReportStatus {
    fn from(outcome: ReportOutcome) -> Self {
        match outcome {
            ReportOutcome::Resolved => ReportStatus::Resolved,
            ReportOutcome::Dismissed => ReportStatus::Dismissed,
        }
    }
}

/// One side of a report: identity class tag plus opaque id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRef {
    pub kind: IdentityKind,
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub reporter: PartyRef,
    pub reported: PartyRef,
    pub category: ReportCategory,
    pub description: String,
    /// Evidentiary pointer, captured at report creation and immutable after.
    pub related_room_id: Option<String>,
    pub status: ReportStatus,
    pub admin_notes: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewReport {
    pub reporter: PartyRef,
    pub reported: PartyRef,
    pub category: ReportCategory,
    pub description: String,
    pub related_room_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!ReportStatus::Pending.is_terminal());
        assert!(!ReportStatus::Reviewed.is_terminal());
        assert!(ReportStatus::Resolved.is_terminal());
        assert!(ReportStatus::Dismissed.is_terminal());
    }

    #[test]
    fn category_wire_names() {
        assert_eq!(
            serde_json::to_string(&ReportCategory::ScamSpam).unwrap(),
            "\"scam_spam\""
        );
        assert_eq!(
            ReportCategory::parse("inappropriate_behavior"),
            Some(ReportCategory::InappropriateBehavior)
        );
        assert_eq!(ReportCategory::parse("harassment"), None);
    }

    #[test]
    fn outcome_maps_to_status() {
        assert_eq!(
            ReportStatus::from(ReportOutcome::Dismissed),
            ReportStatus::Dismissed
        );
    }
}
