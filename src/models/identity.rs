use serde::{Deserialize, Serialize};

/// The three identity classes a counterparty can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityKind {
    User,
    Expert,
    Organisation,
}

impl IdentityKind {
    /// Fixed precedence order for resolving an untagged identity.
    pub const RESOLUTION_ORDER: [IdentityKind; 3] = [
        IdentityKind::User,
        IdentityKind::Expert,
        IdentityKind::Organisation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityKind::User => "user",
            IdentityKind::Expert => "expert",
            IdentityKind::Organisation => "organisation",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(IdentityKind::User),
            "expert" => Some(IdentityKind::Expert),
            "organisation" => Some(IdentityKind::Organisation),
            _ => None,
        }
    }
}

/// Display identity returned by the directory collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityProfile {
    pub name: String,
    pub image: Option<String>,
    pub email: Option<String>,
}

impl IdentityProfile {
    /// Placeholder substituted when no identity class matches; the inbox
    /// listing must never fail on a missing counterparty.
    pub fn unknown() -> Self {
        Self {
            name: "Unknown User".to_string(),
            image: None,
            email: None,
        }
    }
}
