//! Keyboard-shortcut dispatch.
//!
//! Maps a key event to the action the client should perform. Dispatch is
//! pure: the caller reports where focus is and applies the returned action.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusTarget {
    #[default]
    Page,
    /// A contenteditable region such as the rich-text editor.
    Editable,
    TextInput,
    SearchInput,
}

impl FocusTarget {
    fn is_input(self) -> bool {
        !matches!(self, Self::Page)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// `KeyboardEvent.key`, e.g. `"n"`, `"Escape"`, `"ArrowUp"`.
    pub key: String,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub meta: bool,
    #[serde(default)]
    pub target: FocusTarget,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn in_target(mut self, target: FocusTarget) -> Self {
        self.target = target;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortcutAction {
    NewEntry,
    FocusSearch,
    Save,
    Delete,
    Escape,
    ShowHelp,
    NavigateUp,
    NavigateDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dispatch {
    pub action: ShortcutAction,
    /// Whether the browser's default handling of the key must be suppressed.
    pub prevent_default: bool,
}

impl Dispatch {
    fn prevent(action: ShortcutAction) -> Self {
        Self {
            action,
            prevent_default: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ShortcutDispatcher {
    enabled: bool,
}

impl ShortcutDispatcher {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn dispatch(&self, event: &KeyEvent) -> Option<Dispatch> {
        if !self.enabled {
            return None;
        }
        let key = event.key.as_str();
        let modifier = event.ctrl || event.meta;

        if event.target.is_input() {
            return match (key, event.target) {
                // The editor's force-save keystroke.
                ("s", FocusTarget::Editable) if modifier => {
                    Some(Dispatch::prevent(ShortcutAction::Save))
                }
                ("Escape", _) => Some(Dispatch {
                    action: ShortcutAction::Escape,
                    prevent_default: false,
                }),
                ("ArrowUp", FocusTarget::SearchInput) => {
                    Some(Dispatch::prevent(ShortcutAction::NavigateUp))
                }
                ("ArrowDown", FocusTarget::SearchInput) => {
                    Some(Dispatch::prevent(ShortcutAction::NavigateDown))
                }
                _ => None,
            };
        }

        match (modifier, key) {
            (true, "n") => Some(Dispatch::prevent(ShortcutAction::NewEntry)),
            (true, "f") => Some(Dispatch::prevent(ShortcutAction::FocusSearch)),
            (true, "s") => Some(Dispatch::prevent(ShortcutAction::Save)),
            (true, "d") => Some(Dispatch::prevent(ShortcutAction::Delete)),
            (_, "Escape") => Some(Dispatch {
                action: ShortcutAction::Escape,
                prevent_default: false,
            }),
            (true, "/") => Some(Dispatch::prevent(ShortcutAction::ShowHelp)),
            (_, "ArrowUp") => Some(Dispatch::prevent(ShortcutAction::NavigateUp)),
            (_, "ArrowDown") => Some(Dispatch::prevent(ShortcutAction::NavigateDown)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ShortcutCategory {
    Navigation,
    Actions,
    General,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ShortcutHelp {
    pub keys: &'static [&'static str],
    pub description: &'static str,
    pub category: ShortcutCategory,
    pub action: ShortcutAction,
}

pub const SHORTCUTS: &[ShortcutHelp] = &[
    ShortcutHelp {
        keys: &["Ctrl", "N"],
        description: "Create new entry",
        category: ShortcutCategory::Actions,
        action: ShortcutAction::NewEntry,
    },
    ShortcutHelp {
        keys: &["Ctrl", "S"],
        description: "Save current entry",
        category: ShortcutCategory::Actions,
        action: ShortcutAction::Save,
    },
    ShortcutHelp {
        keys: &["Ctrl", "D"],
        description: "Delete current entry",
        category: ShortcutCategory::Actions,
        action: ShortcutAction::Delete,
    },
    ShortcutHelp {
        keys: &["Ctrl", "F"],
        description: "Focus search bar",
        category: ShortcutCategory::Navigation,
        action: ShortcutAction::FocusSearch,
    },
    ShortcutHelp {
        keys: &["↑", "↓"],
        description: "Navigate entry list",
        category: ShortcutCategory::Navigation,
        action: ShortcutAction::NavigateDown,
    },
    ShortcutHelp {
        keys: &["Escape"],
        description: "Clear search / Close modals",
        category: ShortcutCategory::General,
        action: ShortcutAction::Escape,
    },
    ShortcutHelp {
        keys: &["Ctrl", "/"],
        description: "Show this help",
        category: ShortcutCategory::General,
        action: ShortcutAction::ShowHelp,
    },
];
