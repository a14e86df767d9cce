//! Repository for the `users` table.

use sqlx::PgPool;
use upwatch_core::types::DbId;

use crate::models::user::{CreateUser, User};

const COLUMNS: &str = "id, email, name, created_at, updated_at";

/// Provides owner lookups.
pub struct UserRepo;

impl UserRepo {
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (email, name) VALUES ($1, $2) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.email)
            .bind(&input.name)
            .fetch_one(pool)
            .await
    }

    /// Email address of a user, `None` when the user does not exist.
    pub async fn find_email(pool: &PgPool, id: DbId) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT email FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
