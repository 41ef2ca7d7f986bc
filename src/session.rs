use secrecy::{ExposeSecret, SecretString};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::PortalError;

/// Name of the file holding the bearer token.
pub const TOKEN_FILE: &str = "authToken";

/// Authentication context handed to everything that talks to the API.
#[derive(Debug, Clone, Default)]
pub struct Session {
    token: Option<Arc<SecretString>>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let token: String = token.into();
        if token.trim().is_empty() {
            return Self::anonymous();
        }
        Self {
            token: Some(Arc::new(SecretString::from(token.trim().to_string()))),
        }
    }

    pub fn token(&self) -> Option<&Arc<SecretString>> {
        self.token.as_ref()
    }

    pub fn require_token(&self) -> Result<&Arc<SecretString>, PortalError> {
        self.token.as_ref().ok_or(PortalError::MissingToken)
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

/// Persists the token between runs, one file in the data directory.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at the platform data directory for `portal`.
    pub fn open_default() -> Self {
        Self::at(default_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TOKEN_FILE)
    }

    pub fn load(&self) -> Result<Session, PortalError> {
        match fs::read_to_string(self.path()) {
            Ok(token) => Ok(Session::with_token(token)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Session::anonymous()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, token: &SecretString) -> Result<(), PortalError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path(), token.expose_secret())?;
        Ok(())
    }

    pub fn clear(&self) -> Result<bool, PortalError> {
        match fs::remove_file(self.path()) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn default_dir() -> PathBuf {
    // Use XDG data directory or fallback
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "portal") {
        proj_dirs.data_dir().to_path_buf()
    } else {
        PathBuf::from(".")
    }
}
