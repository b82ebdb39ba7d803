use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use super::identifier::Identifier;
use super::repo_types::User;

/// Which unique column a write collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictField {
    Username,
    Identifier,
}

impl fmt::Display for ConflictField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictField::Username => f.write_str("username"),
            ConflictField::Identifier => f.write_str("identifier"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} already exists")]
    Conflict(ConflictField),

    #[error("user not found")]
    Missing,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Result of the one-shot first admin creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Created,
    Closed,
}

/// Durable user persistence. Implementations own uniqueness: `create` and
/// `create_first_admin` must check and insert as one atomic step.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user, failing with `Conflict` on a taken username or identifier.
    async fn create(&self, user: &User) -> Result<(), StoreError>;

    /// Insert `user` only if no admin exists yet.
    async fn create_first_admin(&self, user: &User) -> Result<BootstrapOutcome, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// `username` must already be case-folded.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_identifier(&self, identifier: &Identifier)
        -> Result<Option<User>, StoreError>;

    async fn find_any_admin(&self) -> Result<Option<User>, StoreError>;

    /// Persist verification state and the OTP challenge. `is_verified` never
    /// goes back to false once stored.
    async fn save(&self, user: &User) -> Result<(), StoreError>;
}
