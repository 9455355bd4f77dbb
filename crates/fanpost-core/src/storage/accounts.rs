//! CRUD operations for connected social accounts (the account registry).
//!
//! Accounts are keyed by `(user_id, account_id)` where `account_id` is
//! always `"<platform>:<platform_user_id>"`. Full rows (with credentials)
//! are only handed to the worker; listing strips secrets.

use super::{now_iso, DbPool};
use crate::error::StorageError;

/// A connected account row, including its credentials.
///
/// Only the worker and the credential manager see this shape; everything
/// user-facing goes through [`AccountSummary`].
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Account {
    /// Owning user.
    pub user_id: String,
    /// Composite identifier `"<platform>:<platform_user_id>"`.
    pub account_id: String,
    /// Platform tag (facebook, instagram, twitter, youtube, linkedin, tiktok).
    pub platform: String,
    /// Entity kind on the platform: user, page, business, or organization.
    pub account_type: String,
    /// The platform's identifier for the entity.
    pub platform_user_id: String,
    /// Human-readable name (page name, channel title, etc.).
    pub display_name: String,
    /// Platform handle, where the platform has one.
    pub username: Option<String>,
    /// Current OAuth access token.
    pub access_token: String,
    /// Refresh token, or for Twitter the OAuth 1.0a token secret.
    pub refresh_token: Option<String>,
    /// Absolute expiry of the access token in epoch seconds. NULL = non-expiring.
    pub token_expires_at: Option<i64>,
    /// ISO-8601 UTC timestamp when created.
    pub created_at: String,
    /// ISO-8601 UTC timestamp when last updated.
    pub updated_at: String,
}

/// An account row with the credential fields stripped, safe to return
/// from list endpoints.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct AccountSummary {
    /// Owning user.
    pub user_id: String,
    /// Composite identifier `"<platform>:<platform_user_id>"`.
    pub account_id: String,
    /// Platform tag.
    pub platform: String,
    /// Entity kind on the platform.
    pub account_type: String,
    /// The platform's identifier for the entity.
    pub platform_user_id: String,
    /// Human-readable name.
    pub display_name: String,
    /// Platform handle, where the platform has one.
    pub username: Option<String>,
    /// ISO-8601 UTC timestamp when created.
    pub created_at: String,
    /// ISO-8601 UTC timestamp when last updated.
    pub updated_at: String,
}

/// Fields required to register (or re-register) an account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub user_id: String,
    pub platform: String,
    pub platform_user_id: String,
    pub account_type: String,
    pub display_name: String,
    pub username: Option<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<i64>,
}

/// Derive the composite account id from platform and entity id.
pub fn account_id_for(platform: &str, platform_user_id: &str) -> String {
    format!("{platform}:{platform_user_id}")
}

/// Insert or overwrite an account. Idempotent under the composite key:
/// re-linking the same entity replaces credentials and metadata in place.
pub async fn create(pool: &DbPool, account: &NewAccount) -> Result<String, StorageError> {
    let account_id = account_id_for(&account.platform, &account.platform_user_id);
    let now = now_iso();

    sqlx::query(
        "INSERT INTO accounts \
           (user_id, account_id, platform, account_type, platform_user_id, \
            display_name, username, access_token, refresh_token, token_expires_at, \
            created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT (user_id, account_id) DO UPDATE SET \
           account_type = excluded.account_type, \
           display_name = excluded.display_name, \
           username = excluded.username, \
           access_token = excluded.access_token, \
           refresh_token = excluded.refresh_token, \
           token_expires_at = excluded.token_expires_at, \
           updated_at = excluded.updated_at",
    )
    .bind(&account.user_id)
    .bind(&account_id)
    .bind(&account.platform)
    .bind(&account.account_type)
    .bind(&account.platform_user_id)
    .bind(&account.display_name)
    .bind(&account.username)
    .bind(&account.access_token)
    .bind(&account.refresh_token)
    .bind(account.token_expires_at)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(account_id)
}

/// Fetch a full account row, credentials included. Internal use only.
pub async fn get(
    pool: &DbPool,
    user_id: &str,
    account_id: &str,
) -> Result<Option<Account>, StorageError> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE user_id = ? AND account_id = ?")
        .bind(user_id)
        .bind(account_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })
}

/// List a user's accounts without secrets, optionally filtered by platform.
pub async fn list(
    pool: &DbPool,
    user_id: &str,
    platform: Option<&str>,
) -> Result<Vec<AccountSummary>, StorageError> {
    const COLUMNS: &str = "user_id, account_id, platform, account_type, platform_user_id, \
                           display_name, username, created_at, updated_at";

    let rows = match platform {
        Some(p) => {
            sqlx::query_as::<_, AccountSummary>(&format!(
                "SELECT {COLUMNS} FROM accounts WHERE user_id = ? AND platform = ? \
                 ORDER BY created_at ASC"
            ))
            .bind(user_id)
            .bind(p)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as::<_, AccountSummary>(&format!(
                "SELECT {COLUMNS} FROM accounts WHERE user_id = ? ORDER BY created_at ASC"
            ))
            .bind(user_id)
            .fetch_all(pool)
            .await
        }
    };

    rows.map_err(|e| StorageError::Query { source: e })
}

/// Atomically replace the credential triple for an account.
///
/// All three fields are written in a single UPDATE so a concurrent reader
/// never observes a mixed triple.
pub async fn update_tokens(
    pool: &DbPool,
    user_id: &str,
    account_id: &str,
    access_token: &str,
    refresh_token: Option<&str>,
    token_expires_at: Option<i64>,
) -> Result<(), StorageError> {
    sqlx::query(
        "UPDATE accounts \
         SET access_token = ?, refresh_token = ?, token_expires_at = ?, updated_at = ? \
         WHERE user_id = ? AND account_id = ?",
    )
    .bind(access_token)
    .bind(refresh_token)
    .bind(token_expires_at)
    .bind(now_iso())
    .bind(user_id)
    .bind(account_id)
    .execute(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(())
}

/// Delete an account. Returns whether a row was removed.
pub async fn delete(pool: &DbPool, user_id: &str, account_id: &str) -> Result<bool, StorageError> {
    let result = sqlx::query("DELETE FROM accounts WHERE user_id = ? AND account_id = ?")
        .bind(user_id)
        .bind(account_id)
        .execute(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })?;

    Ok(result.rows_affected() > 0)
}
