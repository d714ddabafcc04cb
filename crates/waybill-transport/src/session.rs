//! Session credentials
//!
//! The sign-in flow (outside this workspace) leaves a bearer token and the
//! recipient email behind. Every REST call and the push-channel handshake
//! read the token through [`CredentialSource`]; a `401` from the backend
//! invalidates it, the same way the dashboard drops its stored token and
//! email when a request comes back unauthorized.

use crate::error::{TransportError, TransportResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A signed-in session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token.
    pub token: String,
    /// Recipient email, when the sign-in flow stored it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Ambient source of the bearer credential.
pub trait CredentialSource: Send + Sync + 'static {
    /// Current bearer token, if signed in.
    fn bearer(&self) -> Option<String>;

    /// Forget the credential after the backend rejected it.
    fn invalidate(&self);
}

/// A credential held in memory, e.g. from `WAYBILL_SESSION_TOKEN`.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    token: RwLock<Option<String>>,
}

impl StaticCredentials {
    /// Wrap a token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    /// A source that never has a credential.
    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl CredentialSource for StaticCredentials {
    fn bearer(&self) -> Option<String> {
        self.token.read().clone()
    }

    fn invalidate(&self) {
        if self.token.write().take().is_some() {
            tracing::info!("Session credential invalidated");
        }
    }
}

/// A session persisted as JSON on disk.
#[derive(Debug)]
pub struct FileSession {
    path: PathBuf,
    session: RwLock<Option<Session>>,
}

impl FileSession {
    /// Load the session file. A missing file is a signed-out session.
    pub fn load(path: impl Into<PathBuf>) -> TransportResult<Self> {
        let path = path.into();
        let session = match std::fs::read(&path) {
            Ok(bytes) => Some(serde_json::from_slice(&bytes).map_err(|e| {
                TransportError::SessionStore(format!("{}: {e}", path.display()))
            })?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(TransportError::SessionStore(format!(
                    "{}: {e}",
                    path.display()
                )))
            }
        };
        Ok(Self {
            path,
            session: RwLock::new(session),
        })
    }

    /// Persist a new session, replacing any previous one.
    pub fn store(&self, session: Session) -> TransportResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| TransportError::SessionStore(e.to_string()))?;
        }
        let bytes = serde_json::to_vec_pretty(&session)
            .map_err(|e| TransportError::SessionStore(e.to_string()))?;
        std::fs::write(&self.path, bytes)
            .map_err(|e| TransportError::SessionStore(e.to_string()))?;
        *self.session.write() = Some(session);
        Ok(())
    }

    /// Current session, if any.
    pub fn session(&self) -> Option<Session> {
        self.session.read().clone()
    }

    /// Location of the session file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialSource for FileSession {
    fn bearer(&self) -> Option<String> {
        self.session.read().as_ref().map(|s| s.token.clone())
    }

    fn invalidate(&self) {
        if self.session.write().take().is_none() {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::info!(path = %self.path.display(), "Session invalidated"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove invalidated session file"
            ),
        }
    }
}
