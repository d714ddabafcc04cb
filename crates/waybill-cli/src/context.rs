//! Resolved CLI context: layered config plus credential and data locations

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use waybill_app::PreferencesStore;
use waybill_core::WaybillConfig;
use waybill_transport::{CredentialSource, FileSession, StaticCredentials};

/// Session file name inside the data directory.
const SESSION_FILE: &str = "session.json";

pub struct CliContext {
    pub config: WaybillConfig,
    pub config_path: PathBuf,
}

/// `<platform config dir>/waybill/config.toml`, or a relative fallback.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("waybill"))
        .unwrap_or_else(|| PathBuf::from(".waybill"))
        .join("config.toml")
}

impl CliContext {
    /// Defaults, then the file, then `WAYBILL_*`, then `--set` overrides.
    pub fn load(config_path: Option<PathBuf>, overrides: &[String]) -> Result<Self> {
        let config_path = config_path.unwrap_or_else(default_config_path);
        let mut config = WaybillConfig::load_from_file(&config_path)?;
        config.merge_with_env()?;

        for entry in overrides {
            let (key, value) = entry
                .split_once('=')
                .with_context(|| format!("override '{entry}' is not KEY=VALUE"))?;
            config.set_from_string(key.trim(), value)?;
        }
        config.validate()?;

        tracing::debug!(path = %config_path.display(), "Configuration loaded");
        Ok(Self {
            config,
            config_path,
        })
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.config.session.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(PreferencesStore::default_dir()?),
        }
    }

    pub fn session_path(&self) -> Result<PathBuf> {
        match &self.config.session.session_file {
            Some(path) => Ok(path.clone()),
            None => Ok(self.data_dir()?.join(SESSION_FILE)),
        }
    }

    pub fn session_file(&self) -> Result<FileSession> {
        let path = self.session_path()?;
        FileSession::load(&path)
            .with_context(|| format!("failed to read session file {}", path.display()))
    }

    /// A configured token wins over the session file.
    pub fn credentials(&self) -> Result<Arc<dyn CredentialSource>> {
        if let Some(token) = &self.config.session.token {
            return Ok(Arc::new(StaticCredentials::new(token.clone())));
        }
        Ok(Arc::new(self.session_file()?))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply_after_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[feed]\npoll_interval_secs = 30\n").unwrap();

        let ctx = CliContext::load(
            Some(path),
            &["feed.poll_interval_secs=5".to_string(), "session.token=abc".to_string()],
        )
        .unwrap();
        assert_eq!(ctx.config.feed.poll_interval_secs, 5);
        assert_eq!(ctx.config.session.token.as_deref(), Some("abc"));
        assert!(ctx.credentials().unwrap().bearer().is_some());
    }

    #[test]
    fn test_malformed_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = CliContext::load(
            Some(dir.path().join("missing.toml")),
            &["feed.poll_interval_secs".to_string()],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_session_path_defaults_into_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = CliContext::load(
            Some(dir.path().join("missing.toml")),
            &[format!("session.data_dir={}", dir.path().display())],
        )
        .unwrap();
        assert_eq!(ctx.session_path().unwrap(), dir.path().join(SESSION_FILE));
    }
}
