//! Identity model

use serde::{Deserialize, Serialize};

/// A user as resolved by the external auth service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// Stable subject id
    pub id: String,
    /// Account email (empty when the account has none)
    pub email: String,
}

impl AuthenticatedUser {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
        }
    }
}
