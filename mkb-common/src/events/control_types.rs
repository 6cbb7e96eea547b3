//! Control button and notification type definitions
//!
//! Supporting types for control requests and user-facing notices.

use serde::{Deserialize, Serialize};

/// Buttons in a component's controls block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlAction {
    MoveUp,
    MoveDown,
    Edit,
    Duplicate,
    Delete,
}

impl ControlAction {
    /// Display order in the controls block
    pub const ALL: [ControlAction; 5] = [
        ControlAction::MoveUp,
        ControlAction::MoveDown,
        ControlAction::Edit,
        ControlAction::Duplicate,
        ControlAction::Delete,
    ];

    /// Value of the button's `data-action` attribute
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlAction::MoveUp => "move-up",
            ControlAction::MoveDown => "move-down",
            ControlAction::Edit => "edit",
            ControlAction::Duplicate => "duplicate",
            ControlAction::Delete => "delete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == s)
    }

    /// Button tooltip
    pub fn label(&self) -> &'static str {
        match self {
            ControlAction::MoveUp => "Move Up",
            ControlAction::MoveDown => "Move Down",
            ControlAction::Edit => "Edit",
            ControlAction::Duplicate => "Duplicate",
            ControlAction::Delete => "Delete",
        }
    }
}

impl std::fmt::Display for ControlAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Toast severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}
