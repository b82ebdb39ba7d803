use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::identifier::Identifier;
use super::repo::{BootstrapOutcome, ConflictField, StoreError, UserStore};
use super::repo_types::{User, UserRow};

const UNIQUE_VIOLATION: &str = "23505";
const USERS_IDENTIFIER_KEY: &str = "users_identifier_key";
const BOOTSTRAP_LOCK_ID: i64 = 7_310_224;

/// Postgres-backed credential store. Uniqueness is enforced by the table's
/// constraints, so concurrent inserts cannot both succeed.
#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn conflict_field(err: &sqlx::Error) -> Option<ConflictField> {
    let sqlx::Error::Database(db_err) = err else {
        return None;
    };
    if db_err.code().as_deref() != Some(UNIQUE_VIOLATION) {
        return None;
    }
    match db_err.constraint() {
        Some(USERS_IDENTIFIER_KEY) => Some(ConflictField::Identifier),
        _ => Some(ConflictField::Username),
    }
}

fn insert_query(user: &User) -> sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments> {
    sqlx::query(
        r#"
        INSERT INTO users (id, username, password_hash, identifier_kind, identifier,
                           is_verified, is_admin, otp_code, otp_expiry, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(user.id)
    .bind(&user.username)
    .bind(&user.password_hash)
    .bind(user.identifier.as_ref().map(|i| i.kind().as_str()))
    .bind(user.identifier.as_ref().map(|i| i.value()))
    .bind(user.is_verified)
    .bind(user.is_admin)
    .bind(user.otp.as_ref().map(|o| o.code.as_str()))
    .bind(user.otp.as_ref().map(|o| o.expires_at))
    .bind(user.created_at)
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: &User) -> Result<(), StoreError> {
        match insert_query(user).execute(&self.db).await {
            Ok(_) => {
                debug!(user_id = %user.id, "user row inserted");
                Ok(())
            }
            Err(e) => match conflict_field(&e) {
                Some(field) => Err(StoreError::Conflict(field)),
                None => Err(anyhow::Error::new(e).context("insert user").into()),
            },
        }
    }

    async fn create_first_admin(&self, user: &User) -> Result<BootstrapOutcome, StoreError> {
        let mut tx = self.db.begin().await.context("begin bootstrap tx")?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(BOOTSTRAP_LOCK_ID)
            .execute(&mut *tx)
            .await
            .context("acquire bootstrap lock")?;

        let admin_exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE is_admin)")
                .fetch_one(&mut *tx)
                .await
                .context("check for existing admin")?;
        if admin_exists {
            tx.rollback().await.context("rollback bootstrap tx")?;
            return Ok(BootstrapOutcome::Closed);
        }

        if let Err(e) = insert_query(user).execute(&mut *tx).await {
            let _ = tx.rollback().await;
            return match conflict_field(&e) {
                Some(field) => Err(StoreError::Conflict(field)),
                None => Err(anyhow::Error::new(e).context("insert first admin").into()),
            };
        }

        tx.commit().await.context("commit bootstrap tx")?;
        Ok(BootstrapOutcome::Created)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, password_hash, identifier_kind, identifier,
                   is_verified, is_admin, otp_code, otp_expiry, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(row.map(User::from))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, password_hash, identifier_kind, identifier,
                   is_verified, is_admin, otp_code, otp_expiry, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await
        .context("find user by username")?;
        Ok(row.map(User::from))
    }

    async fn find_by_identifier(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, password_hash, identifier_kind, identifier,
                   is_verified, is_admin, otp_code, otp_expiry, created_at
            FROM users
            WHERE identifier = $1 AND identifier_kind = $2
            "#,
        )
        .bind(identifier.value())
        .bind(identifier.kind().as_str())
        .fetch_optional(&self.db)
        .await
        .context("find user by identifier")?;
        Ok(row.map(User::from))
    }

    async fn find_any_admin(&self) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, password_hash, identifier_kind, identifier,
                   is_verified, is_admin, otp_code, otp_expiry, created_at
            FROM users
            WHERE is_admin
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.db)
        .await
        .context("find any admin")?;
        Ok(row.map(User::from))
    }

    async fn save(&self, user: &User) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
               SET is_verified = is_verified OR $2,
                   otp_code = CASE WHEN is_verified OR $2 THEN NULL ELSE $3 END,
                   otp_expiry = CASE WHEN is_verified OR $2 THEN NULL ELSE $4 END
             WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(user.is_verified)
        .bind(user.otp.as_ref().map(|o| o.code.as_str()))
        .bind(user.otp.as_ref().map(|o| o.expires_at))
        .execute(&self.db)
        .await
        .context("update user")?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing);
        }
        Ok(())
    }
}
