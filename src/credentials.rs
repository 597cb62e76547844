use chrono::Utc;
use regex::Regex;
use std::sync::LazyLock;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{AdminStats, Playlist, Role, UpdateUserRequest, UserRecord, UserView},
    password::{hash_password, verify_password},
    repository::RepositoryState,
};

pub const MIN_PASSWORD_LEN: usize = 6;
const RECENT_USERS: i64 = 5;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
});

/// Trims and lowercases an email for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

fn required_email(email: Option<String>, password: &Option<String>) -> AppResult<String> {
    let email = email.as_deref().map(normalize_email).unwrap_or_default();
    if email.is_empty() || password.as_deref().is_none_or(str::is_empty) {
        return Err(AppError::Validation(
            "email and password are required".to_string(),
        ));
    }
    if !is_valid_email(&email) {
        return Err(AppError::Validation("invalid email".to_string()));
    }
    Ok(email)
}

/// SeedOutcome
///
/// Result of the operational admin bootstrap.
#[derive(Debug, Clone)]
pub enum SeedOutcome {
    Created(UserRecord),
    AlreadyExists(UserRecord),
}

/// CredentialStore
///
/// Registration, login and the admin user-management operations. Holds the injected
/// repository handle; cheap to clone.
#[derive(Clone)]
pub struct CredentialStore {
    repo: RepositoryState,
}

impl CredentialStore {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    /// register
    ///
    /// Validates input, hashes the password and creates the user (role forced to `user`)
    /// together with its liked playlist in one repository write.
    pub async fn register(
        &self,
        email: Option<String>,
        password: Option<String>,
        name: Option<String>,
    ) -> AppResult<UserRecord> {
        let email = required_email(email, &password)?;
        let password = password.unwrap_or_default();
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        // Cheap pre-check; the store's unique constraint is what actually guarantees uniqueness.
        if self.repo.find_user_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("email is already registered"));
        }

        self.create_account(email, password, name, Role::User).await
    }

    async fn create_account(
        &self,
        email: String,
        password: String,
        name: Option<String>,
        role: Role,
    ) -> AppResult<UserRecord> {
        let password_hash = hash_password(password).await?;
        let now = Utc::now();
        let user = UserRecord {
            id: Uuid::new_v4(),
            email,
            name: name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            password_hash,
            role,
            created_at: now,
            updated_at: now,
        };
        let liked = Playlist::liked_for(user.id);

        let created = self
            .repo
            .create_user_with_liked_playlist(user, liked)
            .await?;
        tracing::info!(user_id = %created.id, role = %created.role, "user registered");
        Ok(created)
    }

    /// login
    ///
    /// Unknown email and wrong password both fail with the same `Unauthorized`.
    pub async fn login(&self, email: Option<String>, password: Option<String>) -> AppResult<UserRecord> {
        let email = required_email(email, &password)?;
        let password = password.unwrap_or_default();

        let user = self.repo.find_user_by_email(&email).await?;

        // Unknown emails still pay for one hash verification.
        let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
        let verified = verify_password(password, stored_hash).await?;

        match user {
            Some(user) if verified => Ok(user),
            _ => {
                tracing::warn!("login rejected");
                Err(AppError::Unauthorized)
            }
        }
    }

    pub async fn get_user(&self, id: Uuid) -> AppResult<UserRecord> {
        self.repo.get_user(id).await?.ok_or(AppError::NotFound("user"))
    }

    /// list_users
    ///
    /// Newest first, optionally filtered by a case-insensitive substring of name or email.
    pub async fn list_users(&self, search: Option<&str>) -> AppResult<Vec<UserView>> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        let users = self.repo.list_users(search, None).await?;
        Ok(users.iter().map(UserView::from).collect())
    }

    /// update_user
    ///
    /// Applies a partial update of name, email (re-checked for uniqueness) and role.
    pub async fn update_user(&self, id: Uuid, patch: UpdateUserRequest) -> AppResult<UserRecord> {
        let mut user = self.get_user(id).await?;

        if let Some(email) = patch.email.as_deref().map(normalize_email) {
            if email != user.email {
                if !is_valid_email(&email) {
                    return Err(AppError::Validation("invalid email".to_string()));
                }
                if self.repo.find_user_by_email(&email).await?.is_some() {
                    return Err(AppError::Conflict("email is already in use"));
                }
                user.email = email;
            }
        }

        if let Some(name) = patch.name {
            let name = name.trim().to_string();
            user.name = (!name.is_empty()).then_some(name);
        }

        if let Some(role) = patch.role {
            user.role = role.trim().parse()?;
        }

        user.updated_at = Utc::now();

        let updated = self
            .repo
            .update_user(&user)
            .await?
            .ok_or(AppError::NotFound("user"))?;
        tracing::info!(user_id = %updated.id, role = %updated.role, "user updated");
        Ok(updated)
    }

    /// delete_user
    ///
    /// An admin may not delete their own account.
    pub async fn delete_user(&self, id: Uuid, requester_id: Uuid) -> AppResult<UserRecord> {
        if id == requester_id {
            return Err(AppError::SelfDeleteForbidden);
        }
        let user = self.get_user(id).await?;
        if !self.repo.delete_user(id).await? {
            return Err(AppError::NotFound("user"));
        }
        tracing::info!(user_id = %id, deleted_by = %requester_id, "user deleted");
        Ok(user)
    }

    pub async fn stats(&self) -> AppResult<AdminStats> {
        let total_users = self.repo.count_users(None).await?;
        let total_admins = self.repo.count_users(Some(Role::Admin)).await?;
        let recent_users = self
            .repo
            .list_users(None, Some(RECENT_USERS))
            .await?
            .iter()
            .map(UserView::from)
            .collect();
        Ok(AdminStats {
            total_users,
            total_admins,
            recent_users,
        })
    }

    /// seed_admin
    ///
    /// Operational bootstrap for the first administrator. Never exposed over HTTP.
    pub async fn seed_admin(
        &self,
        email: &str,
        password: String,
        name: Option<String>,
    ) -> AppResult<SeedOutcome> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(AppError::Validation("invalid email".to_string()));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if let Some(existing) = self.repo.find_user_by_email(&email).await? {
            return Ok(SeedOutcome::AlreadyExists(existing));
        }
        let admin = self
            .create_account(email, password, name, Role::Admin)
            .await?;
        Ok(SeedOutcome::Created(admin))
    }
}
