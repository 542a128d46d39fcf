//! Per-user application settings, stored as one JSON document per user in
//! the database `settings` table.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{ALLOWED_AUTOSAVE_INTERVALS, AutosaveSection};
use crate::errors::ConfigError;
use crate::store::DbHandle;

const SETTINGS_KEY: &str = "app";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

/// Keys missing from a stored or submitted document take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub autosave_interval_secs: u64,
    pub autosave_enabled: bool,
    pub theme: Theme,
    pub keyboard_shortcuts_enabled: bool,
    pub export_include_metadata: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            autosave_interval_secs: 10,
            autosave_enabled: true,
            theme: Theme::default(),
            keyboard_shortcuts_enabled: true,
            export_include_metadata: true,
        }
    }
}

impl UserSettings {
    /// Defaults seeded from the server's `[autosave]` section.
    pub fn from_server_defaults(autosave: &AutosaveSection) -> Self {
        Self {
            autosave_interval_secs: autosave.interval_secs,
            autosave_enabled: autosave.enabled,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !ALLOWED_AUTOSAVE_INTERVALS.contains(&self.autosave_interval_secs) {
            return Err(ConfigError::InvalidSetting {
                key: "autosave_interval_secs".to_string(),
                reason: format!("must be one of {:?}", ALLOWED_AUTOSAVE_INTERVALS),
            });
        }
        Ok(())
    }

    pub fn autosave_delay(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs)
    }

    /// Overlay the keys present in `patch` onto `self`.
    pub fn merged(&self, patch: serde_json::Value) -> Result<Self, ConfigError> {
        let mut base = serde_json::to_value(self)?;
        if let (Some(base_map), serde_json::Value::Object(patch_map)) = (base.as_object_mut(), patch)
        {
            for (key, value) in patch_map {
                base_map.insert(key, value);
            }
        }
        let merged: Self = serde_json::from_value(base)?;
        merged.validate()?;
        Ok(merged)
    }
}

/// Load a user's settings, falling back to `defaults` for anything unset.
pub async fn load(
    db: &DbHandle,
    owner_id: &str,
    defaults: &UserSettings,
) -> anyhow::Result<UserSettings> {
    let owner = owner_id.to_string();
    let stored = db
        .call(move |db| db.get_setting(&owner, SETTINGS_KEY))
        .await?;
    match stored {
        Some(json) => {
            let value: serde_json::Value = serde_json::from_str(&json)
                .map_err(ConfigError::from)?;
            Ok(defaults.merged(value)?)
        }
        None => Ok(defaults.clone()),
    }
}

pub async fn save(db: &DbHandle, owner_id: &str, settings: &UserSettings) -> anyhow::Result<()> {
    settings.validate()?;
    let owner = owner_id.to_string();
    let json = serde_json::to_string(settings)?;
    db.call(move |db| db.set_setting(&owner, SETTINGS_KEY, &json))
        .await
}
