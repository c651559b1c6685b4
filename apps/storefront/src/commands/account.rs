//! # Account Commands
//!
//! Registration, profile and login lookups. Credential hashing and token
//! issuance belong to the external auth collaborator; it hands us finished
//! hashes and reads login records back.

use arcade_core::validation::{validate_email, validate_username};
use arcade_core::{CoreError, Identity, Role, User};
use arcade_db::NewUser;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::{keys, CacheState, DbState};

/// New account fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    /// Already hashed by the auth collaborator.
    pub password_hash: String,
    pub display_name: Option<String>,
}

/// What the auth collaborator needs to verify a login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRecord {
    pub user_id: String,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

/// Creates a `user` account with an empty wallet.
pub async fn register_user(db: &DbState, request: RegisterRequest) -> Result<User, ApiError> {
    debug!(username = %request.username, "register_user command");

    validate_username(&request.username).map_err(CoreError::from)?;
    validate_email(&request.email).map_err(CoreError::from)?;
    if request.password_hash.is_empty() {
        return Err(ApiError::validation("password hash is required"));
    }

    let user = db
        .inner()
        .users()
        .create(NewUser {
            username: request.username,
            email: request.email,
            password_hash: request.password_hash,
            role: Role::User,
            balance_cents: 0,
            display_name: request.display_name.filter(|n| !n.trim().is_empty()),
        })
        .await?;

    info!(user_id = %user.id, username = %user.username, "User registered");
    Ok(user)
}

/// The caller's profile, read through the cache.
pub async fn get_profile(db: &DbState, cache: &CacheState, identity: &Identity) -> Result<User, ApiError> {
    debug!(user_id = %identity.user_id, "get_profile command");

    cache
        .inner()
        .get_or_try_insert_with(&keys::user(&identity.user_id), cache.profile_ttl, || async move {
            let user = db
                .inner()
                .users()
                .get_by_id(&identity.user_id)
                .await?
                .ok_or_else(|| CoreError::UserNotFound(identity.user_id.clone()))?;
            Ok::<User, ApiError>(user)
        })
        .await
}

/// Login lookup by username, read through the cache.
pub async fn find_login(db: &DbState, cache: &CacheState, username: &str) -> Result<LoginRecord, ApiError> {
    debug!(username = %username, "find_login command");

    cache
        .inner()
        .get_or_try_insert_with(&keys::login(username), cache.profile_ttl, || async move {
            let user = db
                .inner()
                .users()
                .get_by_username(username)
                .await?
                .ok_or_else(|| ApiError::not_found("User", username))?;
            Ok::<LoginRecord, ApiError>(LoginRecord {
                user_id: user.id,
                username: user.username,
                password_hash: user.password_hash,
                role: user.role,
            })
        })
        .await
}
