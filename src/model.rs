use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One configured recurring search job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkUnit {
    pub name: String,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl WorkUnit {
    /// Key under which the cursor for this unit is stored.
    pub fn key(&self) -> &str {
        &self.name
    }

    /// Configured search term, ignoring blank values.
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// High-water-mark of the last fully processed batch. Opaque; never parsed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cursor {
    pub high_water_id: String,
}

impl Cursor {
    pub fn new(high_water_id: impl Into<String>) -> Self {
        Self {
            high_water_id: high_water_id.into(),
        }
    }
}

/// One entry returned by the remote search API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteItem {
    pub id: String,
    pub author: String,
    #[serde(default)]
    pub author_name: Option<String>,
    pub text: String,
    /// Creation time exactly as the API sent it. May be malformed.
    pub created_at: String,
}

impl RemoteItem {
    pub fn display_author(&self) -> &str {
        self.author_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.author)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub item: RemoteItem,
    pub visible: bool,
    pub stored_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Action,
    Alert,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Action => "action",
            NotificationKind::Alert => "alert",
        }
    }
}

/// Visibility actions a notification offers for a stored record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VisibilityAction {
    Show,
    Hide,
}

impl VisibilityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisibilityAction::Show => "show",
            VisibilityAction::Hide => "hide",
        }
    }

    pub fn parse_action(s: &str) -> Option<Self> {
        match s {
            "show" => Some(VisibilityAction::Show),
            "hide" => Some(VisibilityAction::Hide),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VisibilityAction::Show => "Show in feed",
            VisibilityAction::Hide => "Hide from feed",
        }
    }

    pub fn visible(&self) -> bool {
        matches!(self, VisibilityAction::Show)
    }
}

/// A button-like reference to a stored record. `silent` targets do not
/// produce a further chat message when pressed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionTarget {
    pub id: String,
    pub label: String,
    pub silent: bool,
    pub record_id: String,
}

impl ActionTarget {
    pub fn visibility(action: VisibilityAction, record_id: &str) -> Self {
        Self {
            id: action.as_str().to_string(),
            label: action.label().to_string(),
            silent: true,
            record_id: record_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    pub detail: String,
    #[serde(default)]
    pub targets: Vec<ActionTarget>,
}

impl Notification {
    pub fn alert(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Alert,
            message: message.into(),
            detail: detail.into(),
            targets: Vec::new(),
        }
    }
}
