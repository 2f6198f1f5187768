//! Canonical event vocabulary.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The closed set of catalog-relevant domain actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    Created,
    Updated,
    Deleted,
    Attached,
    Detached,
}

impl EventAction {
    /// Parse an action name; unknown names yield `None`.
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "created" => Some(Self::Created),
            "updated" => Some(Self::Updated),
            "deleted" => Some(Self::Deleted),
            "attached" => Some(Self::Attached),
            "detached" => Some(Self::Detached),
            _ => None,
        }
    }

    /// Delete and detach only need ids; the other actions refetch data.
    pub fn requires_refetch(self) -> bool {
        matches!(self, Self::Created | Self::Updated | Self::Attached)
    }
}

impl fmt::Display for EventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventAction::Created => write!(f, "created"),
            EventAction::Updated => write!(f, "updated"),
            EventAction::Deleted => write!(f, "deleted"),
            EventAction::Attached => write!(f, "attached"),
            EventAction::Detached => write!(f, "detached"),
        }
    }
}

/// Normalized form of any consumed event.
///
/// `action` stays a raw string so that vocabularies newer than
/// [`EventAction`] pass through normalization and are dropped at dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalEvent {
    /// Raw action, e.g. `created`.
    pub action: String,
    /// Ids of every data entry, in order.
    pub ids: Vec<String>,
    /// One object per affected instance.
    pub data: Vec<Value>,
}

impl CanonicalEvent {
    /// The known action, or `None` for unknown vocabularies.
    pub fn action(&self) -> Option<EventAction> {
        EventAction::parse(&self.action)
    }
}
