//! Local preferences
//!
//! Display language and notification delivery preferences, kept as one JSON
//! document in the data directory. Values are local only; nothing here is
//! sent to the backend.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use waybill_core::{Categorized, ErrorCategory};

/// File name inside the data directory.
pub const PREFERENCES_FILE: &str = "preferences.json";

/// Errors from the preference store.
#[derive(Debug, thiserror::Error)]
pub enum PreferencesError {
    /// Reading or writing the file failed
    #[error("preferences file {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// The file exists but is not valid preferences JSON
    #[error("preferences file {path} is corrupt: {message}")]
    Corrupt {
        /// File involved
        path: PathBuf,
        /// Parser message
        message: String,
    },
    /// No preference has this key
    #[error("unknown preference '{0}'")]
    UnknownKey(String),
    /// The value does not fit the preference
    #[error("invalid value '{value}' for '{key}'")]
    InvalidValue {
        /// Preference key
        key: String,
        /// Rejected value
        value: String,
    },
    /// No data directory could be determined
    #[error("no data directory available")]
    NoDataDir,
}

impl PreferencesError {
    /// Whether retrying may succeed.
    pub fn is_transient(&self) -> bool {
        self.category().is_transient()
    }
}

impl Categorized for PreferencesError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::Io { .. } | Self::Corrupt { .. } | Self::NoDataDir => ErrorCategory::Storage,
            Self::UnknownKey(_) | Self::InvalidValue { .. } => ErrorCategory::Input,
        }
    }
}

/// Display language.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English
    #[default]
    En,
    /// French
    Fr,
}

impl Language {
    /// Language code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Fr => "fr",
        }
    }
}

impl std::str::FromStr for Language {
    type Err = PreferencesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Self::En),
            "fr" => Ok(Self::Fr),
            other => Err(PreferencesError::InvalidValue {
                key: "language".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Delivery channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Channels {
    /// Email alerts
    pub email: bool,
    /// SMS alerts
    pub sms: bool,
    /// Web push notifications
    pub web_push: bool,
}

impl Default for Channels {
    fn default() -> Self {
        Self {
            email: true,
            sms: true,
            web_push: false,
        }
    }
}

/// Alert kinds the recipient wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Alerts {
    /// New order placed
    pub new_order: bool,
    /// Inventory below threshold
    pub low_stock: bool,
    /// Shipment status changes
    pub shipment_updates: bool,
    /// Fleet maintenance reminders
    pub maintenance: bool,
}

impl Default for Alerts {
    fn default() -> Self {
        Self {
            new_order: true,
            low_stock: false,
            shipment_updates: false,
            maintenance: false,
        }
    }
}

/// Notification delivery preferences.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationPreferences {
    /// Delivery channels
    pub channels: Channels,
    /// Alert kinds
    pub alerts: Alerts,
}

/// Everything persisted in the preferences file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Display language
    pub language: Language,
    /// Notification preferences
    pub notifications: NotificationPreferences,
}

impl Preferences {
    /// Every settable key with its current value, in display order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let c = &self.notifications.channels;
        let a = &self.notifications.alerts;
        vec![
            ("language", self.language.code().to_string()),
            ("channels.email", c.email.to_string()),
            ("channels.sms", c.sms.to_string()),
            ("channels.web_push", c.web_push.to_string()),
            ("alerts.new_order", a.new_order.to_string()),
            ("alerts.low_stock", a.low_stock.to_string()),
            ("alerts.shipment_updates", a.shipment_updates.to_string()),
            ("alerts.maintenance", a.maintenance.to_string()),
        ]
    }

    /// Set one preference from its `entries` key.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), PreferencesError> {
        if key == "language" {
            self.language = value.parse()?;
            return Ok(());
        }

        let flag = match key {
            "channels.email" => &mut self.notifications.channels.email,
            "channels.sms" => &mut self.notifications.channels.sms,
            "channels.web_push" => &mut self.notifications.channels.web_push,
            "alerts.new_order" => &mut self.notifications.alerts.new_order,
            "alerts.low_stock" => &mut self.notifications.alerts.low_stock,
            "alerts.shipment_updates" => &mut self.notifications.alerts.shipment_updates,
            "alerts.maintenance" => &mut self.notifications.alerts.maintenance,
            other => return Err(PreferencesError::UnknownKey(other.to_string())),
        };
        *flag = parse_flag(value).ok_or_else(|| PreferencesError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })?;
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Some(true),
        "false" | "off" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// File-backed preference store.
#[derive(Debug)]
pub struct PreferencesStore {
    path: PathBuf,
    data: Preferences,
    dirty: bool,
}

impl PreferencesStore {
    /// Default data directory, `<platform data dir>/waybill`.
    pub fn default_dir() -> Result<PathBuf, PreferencesError> {
        dirs::data_dir()
            .map(|dir| dir.join("waybill"))
            .ok_or(PreferencesError::NoDataDir)
    }

    /// Open the store in `data_dir`. A missing file yields defaults.
    pub fn open(data_dir: &Path) -> Result<Self, PreferencesError> {
        let path = data_dir.join(PREFERENCES_FILE);
        let data = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| PreferencesError::Corrupt {
                path: path.clone(),
                message: e.to_string(),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Preferences::default(),
            Err(source) => return Err(PreferencesError::Io { path, source }),
        };
        Ok(Self {
            path,
            data,
            dirty: false,
        })
    }

    /// Current preferences.
    pub fn data(&self) -> &Preferences {
        &self.data
    }

    /// Change preferences; marks the store dirty.
    pub fn update<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Preferences),
    {
        f(&mut self.data);
        self.dirty = true;
    }

    /// Set one preference by key.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), PreferencesError> {
        self.data.set(key, value)?;
        self.dirty = true;
        Ok(())
    }

    /// Whether there are unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write pending changes.
    pub fn save(&mut self) -> Result<(), PreferencesError> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| PreferencesError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let bytes = serde_json::to_vec_pretty(&self.data).map_err(|e| PreferencesError::Corrupt {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&self.path, bytes).map_err(|source| PreferencesError::Io {
            path: self.path.clone(),
            source,
        })?;
        self.dirty = false;
        tracing::debug!(path = %self.path.display(), "Preferences saved");
        Ok(())
    }

    /// File location.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_error_categories() {
        let err = PreferencesError::UnknownKey("theme".into());
        assert_eq!(err.category(), ErrorCategory::Input);
        assert!(err.category().is_user_correctable());
        assert_eq!(PreferencesError::NoDataDir.category(), ErrorCategory::Storage);
        assert!(!PreferencesError::NoDataDir.is_transient());
    }

    #[test]
    fn test_defaults_match_dashboard() {
        let prefs = Preferences::default();
        assert_eq!(prefs.language, Language::En);
        assert!(prefs.notifications.channels.email);
        assert!(prefs.notifications.channels.sms);
        assert!(!prefs.notifications.channels.web_push);
        assert!(prefs.notifications.alerts.new_order);
        assert!(!prefs.notifications.alerts.low_stock);
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_value(Preferences::default()).unwrap();
        assert_eq!(json["language"], "en");
        assert_eq!(json["notifications"]["channels"]["webPush"], false);
        assert_eq!(json["notifications"]["alerts"]["shipmentUpdates"], false);
    }

    #[test]
    fn test_set_by_key() {
        let mut prefs = Preferences::default();
        prefs.set("language", "FR").unwrap();
        prefs.set("alerts.low_stock", "on").unwrap();
        assert_eq!(prefs.language, Language::Fr);
        assert!(prefs.notifications.alerts.low_stock);

        assert_matches!(prefs.set("alerts.bogus", "true"), Err(PreferencesError::UnknownKey(_)));
        assert_matches!(
            prefs.set("channels.sms", "maybe"),
            Err(PreferencesError::InvalidValue { .. })
        );
        assert_matches!(prefs.set("language", "de"), Err(PreferencesError::InvalidValue { .. }));
    }

    #[test]
    fn test_store_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = PreferencesStore::open(dir.path()).unwrap();
        assert_eq!(store.data(), &Preferences::default());
        assert!(!store.is_dirty());

        store.update(|p| p.notifications.channels.web_push = true);
        store.set("language", "fr").unwrap();
        store.save().unwrap();
        assert!(!store.is_dirty());

        let reopened = PreferencesStore::open(dir.path()).unwrap();
        assert!(reopened.data().notifications.channels.web_push);
        assert_eq!(reopened.data().language, Language::Fr);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PREFERENCES_FILE), r#"{"language":"fr"}"#).unwrap();

        let store = PreferencesStore::open(dir.path()).unwrap();
        assert_eq!(store.data().language, Language::Fr);
        assert!(store.data().notifications.alerts.new_order);
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PREFERENCES_FILE), b"[").unwrap();
        assert_matches!(
            PreferencesStore::open(dir.path()),
            Err(PreferencesError::Corrupt { .. })
        );
    }
}
