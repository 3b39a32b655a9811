use serde::{Deserialize, Serialize};

use crate::error::{e500, ApiError};
use crate::store::ProfileDirectory;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    pub fn parse(v: &str) -> Option<Role> {
        match v.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "teacher" => Some(Role::Teacher),
            "student" => Some(Role::Student),
            _ => None,
        }
    }
}

/// Roles allowed to run batch mutations.
pub const STAFF: &[Role] = &[Role::Teacher, Role::Admin];

/// Caller resolved for one request. Passed explicitly to whatever needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub role: Option<Role>,
}

/// Resolves the session token to a user and looks up the user's role.
pub async fn authenticate(
    token: Option<&str>,
    directory: &dyn ProfileDirectory,
) -> Result<Identity, ApiError> {
    let token = token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::Authentication)?;

    let user_id = directory
        .resolve_session(token)
        .await
        .map_err(e500)?
        .ok_or(ApiError::Authentication)?;

    let role = directory.role_of(&user_id).await.map_err(e500)?;
    Ok(Identity { user_id, role })
}

pub fn authorize(identity: &Identity, allowed: &[Role]) -> Result<(), ApiError> {
    match identity.role {
        Some(role) if allowed.contains(&role) => Ok(()),
        _ => {
            tracing::warn!(user_id = %identity.user_id, role = ?identity.role, "role not permitted");
            Err(ApiError::Authorization)
        }
    }
}
