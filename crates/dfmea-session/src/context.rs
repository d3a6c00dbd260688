use std::fs;
use std::path::{Path, PathBuf};

use dfmea_config::{AuthConfig, AuthUserConfig, dfmea_dir, session_path};
use dfmea_core::{Page, Role, Theme, User, resolve_route};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::current_unix_timestamp_millis;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("not signed in")]
    NotSignedIn,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("session file error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct PersistedSession {
    #[serde(default)]
    user: Option<User>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    theme: Theme,
}

/// Signed-in user, token and theme for one workspace. Read once from
/// `.dfmea/session.json` and written back on every change.
#[derive(Debug, Clone)]
pub struct AppContext {
    workspace_root: PathBuf,
    users: Vec<AuthUserConfig>,
    persisted: PersistedSession,
}

impl AppContext {
    pub fn load(workspace_root: impl AsRef<Path>, auth: &AuthConfig) -> Result<Self, AuthError> {
        let workspace_root = workspace_root.as_ref().to_path_buf();
        let path = session_path(&workspace_root);

        let persisted = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            match serde_json::from_str(&raw) {
                Ok(persisted) => persisted,
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        path = %path.display(),
                        "ignoring unreadable session file"
                    );
                    PersistedSession::default()
                }
            }
        } else {
            PersistedSession::default()
        };

        Ok(Self {
            workspace_root,
            users: auth.users.clone(),
            persisted,
        })
    }

    /// Email matches case-insensitively, password exactly.
    pub fn login(&mut self, email: &str, password: &str) -> Result<&User, AuthError> {
        let found = self
            .users
            .iter()
            .find(|user| {
                user.email.eq_ignore_ascii_case(email.trim()) && user.password == password
            })
            .ok_or(AuthError::InvalidCredentials)?;

        let user = User {
            id: found.id.clone(),
            name: found.name.clone(),
            email: found.email.clone(),
            role: found.role,
        };
        self.persisted.token = Some(format!(
            "mock-jwt-{}-{}",
            user.id,
            current_unix_timestamp_millis()
        ));
        self.persisted.user = Some(user);
        self.persist()?;

        tracing::info!(email = %found.email, role = found.role.as_str(), "signed in");
        self.persisted.user.as_ref().ok_or(AuthError::NotSignedIn)
    }

    /// Clears user and token. The theme survives.
    pub fn logout(&mut self) -> Result<(), AuthError> {
        self.persisted.user = None;
        self.persisted.token = None;
        self.persist()
    }

    /// Called when a service rejects the token.
    pub fn session_expired(&mut self) -> Result<(), AuthError> {
        tracing::warn!("session token rejected, signing out");
        self.logout()
    }

    pub fn user(&self) -> Option<&User> {
        self.persisted.user.as_ref()
    }

    pub fn require_user(&self) -> Result<&User, AuthError> {
        self.user().ok_or(AuthError::NotSignedIn)
    }

    pub fn token(&self) -> Option<&str> {
        self.persisted.token.as_deref()
    }

    pub fn role(&self) -> Option<Role> {
        self.user().map(|user| user.role)
    }

    pub fn has_role(&self, roles: &[Role]) -> bool {
        self.role().is_some_and(|role| roles.contains(&role))
    }

    /// Page actually shown when `requested` is asked for.
    pub fn resolve(&self, requested: Page) -> Page {
        resolve_route(self.role(), requested)
    }

    pub fn theme(&self) -> Theme {
        self.persisted.theme
    }

    pub fn set_theme(&mut self, theme: Theme) -> Result<(), AuthError> {
        self.persisted.theme = theme;
        self.persist()
    }

    pub fn toggle_theme(&mut self) -> Result<Theme, AuthError> {
        let theme = self.persisted.theme.toggled();
        self.set_theme(theme)?;
        Ok(theme)
    }

    fn persist(&self) -> Result<(), AuthError> {
        fs::create_dir_all(dfmea_dir(&self.workspace_root))?;
        let content = serde_json::to_string_pretty(&self.persisted)?;
        fs::write(session_path(&self.workspace_root), content)?;
        Ok(())
    }
}
