use serde::Serialize;

use crate::storage::User;

/// The authenticated caller, resolved from a live session token.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub full_name: String,
    /// The token this identity was resolved from; profile updates are scoped by it.
    #[serde(skip_serializing)]
    pub token: String,
}

impl Identity {
    pub(crate) fn from_user(user: &User, token: &str) -> Self {
        Self { username: user.username.clone(), full_name: user.full_name.clone(), token: token.to_string() }
    }
}
