use tracing::debug;

use super::principal::Identity;
use crate::error::{AppError, AppResult};
use crate::security;
use crate::storage::{SharedDirectory, UserPatch};
use crate::validation;

pub type SessionToken = String;

/// Profile changes; at least one field must be present.
#[derive(Debug, Clone, Default)]
pub struct IdentityChanges {
    pub full_name: Option<String>,
    pub password: Option<String>,
}

fn new_token() -> SessionToken {
    // v4 uuid: 122 random bits
    uuid::Uuid::new_v4().to_string()
}

fn invalid_credentials() -> AppError {
    AppError::unauthorized("invalid_credentials", "username or password is wrong")
}

/// Issues, validates and revokes the single live session token stored on each user row.
pub struct SessionAuthority {
    store: SharedDirectory,
}

impl SessionAuthority {
    pub fn new(store: SharedDirectory) -> Self { Self { store } }

    /// Verify the password and store a fresh token, replacing any previous one.
    pub fn issue(&self, username: &str, password: &str) -> AppResult<Identity> {
        let Some(user) = self.store.find_user(username)? else {
            debug!(target: "auth", user = username, "login rejected: unknown user");
            return Err(invalid_credentials());
        };
        if !security::verify_password(&user.password_hash, password) {
            debug!(target: "auth", user = username, "login rejected: password mismatch");
            return Err(invalid_credentials());
        }
        let token = new_token();
        self.store.set_session_token(&user.username, &token)?;
        debug!(target: "auth", user = username, "session issued");
        Ok(Identity::from_user(&user, &token))
    }

    pub fn validate(&self, token: Option<&str>) -> AppResult<Identity> {
        let token = token.map(str::trim).unwrap_or_default();
        if token.is_empty() {
            return Err(AppError::unauthenticated("missing_token", "unauthenticated"));
        }
        match self.store.find_user_by_token(token)? {
            Some(user) => Ok(Identity::from_user(&user, token)),
            None => {
                debug!(target: "auth", "token rejected: no live session");
                Err(AppError::unauthorized("invalid_session", "unauthorized"))
            }
        }
    }

    /// Clear the caller's token if it is still the live one. A token that was
    /// already revoked or replaced by a newer login is left alone, and that is not an error.
    pub fn revoke(&self, who: &Identity) -> AppResult<()> {
        let cleared = self.store.clear_session_token(&who.username, &who.token)?;
        debug!(target: "auth", user = %who.username, cleared, "session revoked");
        Ok(())
    }

    /// Apply profile changes to whichever user still holds `who.token`. The token is not rotated.
    pub fn update_identity(&self, who: &Identity, changes: &IdentityChanges) -> AppResult<Identity> {
        validation::any_present("user", &[changes.full_name.is_some(), changes.password.is_some()])?;
        validation::optional(changes.full_name.as_deref(), |v| validation::name("full_name", v))?;
        validation::optional(changes.password.as_deref(), |v| validation::password("password", v))?;

        let password_hash = match &changes.password {
            Some(pw) => Some(security::hash_password(pw)?),
            None => None,
        };
        let patch = UserPatch { full_name: changes.full_name.clone(), password_hash };
        match self.store.update_user_for_session(&who.token, &patch)? {
            Some(user) => Ok(Identity::from_user(&user, &who.token)),
            None => Err(AppError::unauthorized("invalid_session", "unauthorized")),
        }
    }
}
