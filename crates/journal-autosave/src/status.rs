use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// User-visible phase of the autosave lifecycle.
///
/// Only the coordinator moves between these states; hosts observe them
/// through [`crate::AutosaveCoordinator::status`] or a watch subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    Error,
}

impl SaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Saving => "saving",
            Self::Saved => "saved",
            Self::Error => "error",
        }
    }

    /// Badge text shown next to the editor. Idle renders nothing.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "",
            Self::Saving => "Saving...",
            Self::Saved => "Saved",
            Self::Error => "Save failed",
        }
    }
}

impl std::fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SaveStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "saving" => Ok(Self::Saving),
            "saved" => Ok(Self::Saved),
            "error" => Ok(Self::Error),
            _ => Err(format!("Invalid save status: {}", s)),
        }
    }
}
