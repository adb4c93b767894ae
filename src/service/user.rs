use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::identity::{Identity, IdentityChanges, SessionAuthority};
use crate::security;
use crate::storage::{NewUser, SharedDirectory, StoreError};
use crate::validation;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterUserRequest {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginUserRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserResponse {
    pub username: String,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl UserResponse {
    fn profile(who: &Identity) -> Self {
        Self { username: who.username.clone(), full_name: who.full_name.clone(), token: None }
    }
}

/// Registration, login and the caller's own profile.
pub struct UserService {
    store: SharedDirectory,
    sessions: SessionAuthority,
}

impl UserService {
    pub fn new(store: SharedDirectory) -> Self {
        Self { sessions: SessionAuthority::new(store.clone()), store }
    }

    pub fn register(&self, req: RegisterUserRequest) -> AppResult<UserResponse> {
        let username = validation::required("username", req.username.as_deref())?;
        let full_name = validation::required("full_name", req.full_name.as_deref())?;
        let password = validation::required("password", req.password.as_deref())?;
        validation::name("username", username)?;
        validation::name("full_name", full_name)?;
        validation::password("password", password)?;

        let taken = || AppError::conflict("username_taken", "username already exists");
        if self.store.find_user(username)?.is_some() {
            return Err(taken());
        }
        // a concurrent registration can still win between the check and the insert
        let user = self
            .store
            .insert_user(NewUser {
                username: username.to_string(),
                full_name: full_name.to_string(),
                password_hash: security::hash_password(password)?,
            })
            .map_err(|e| match e {
                StoreError::Duplicate { .. } => taken(),
                other => other.into(),
            })?;
        info!(target: "auth", user = %user.username, "user registered");
        Ok(UserResponse { username: user.username, full_name: user.full_name, token: None })
    }

    pub fn login(&self, req: LoginUserRequest) -> AppResult<UserResponse> {
        let username = validation::required("username", req.username.as_deref())?;
        let password = validation::required("password", req.password.as_deref())?;
        validation::name("username", username)?;
        validation::length("password", password, validation::NAME_MAX)?;

        let who = self.sessions.issue(username, password)?;
        info!(target: "auth", user = %who.username, "user logged in");
        Ok(UserResponse { username: who.username, full_name: who.full_name, token: Some(who.token) })
    }

    /// Resolve the token presented with a request.
    pub fn authenticate(&self, token: Option<&str>) -> AppResult<Identity> {
        self.sessions.validate(token)
    }

    pub fn current(&self, who: &Identity) -> UserResponse { UserResponse::profile(who) }

    pub fn update(&self, who: &Identity, req: UpdateUserRequest) -> AppResult<UserResponse> {
        let changes = IdentityChanges { full_name: req.full_name, password: req.password };
        let updated = self.sessions.update_identity(who, &changes)?;
        info!(target: "auth", user = %updated.username, "profile updated");
        Ok(UserResponse::profile(&updated))
    }

    pub fn logout(&self, who: &Identity) -> AppResult<bool> {
        self.sessions.revoke(who)?;
        info!(target: "auth", user = %who.username, "user logged out");
        Ok(true)
    }
}
