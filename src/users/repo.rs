use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use uuid::Uuid;

use crate::users::repo_types::{NewUser, UniqueField, User};

const USER_COLUMNS: &str = "id, username, email, password_hash, role, created_at, updated_at";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} already taken")]
    Duplicate(UniqueField),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                match db_err.constraint() {
                    Some("users_username_key") => return StoreError::Duplicate(UniqueField::Username),
                    Some("users_email_key") => return StoreError::Duplicate(UniqueField::Email),
                    _ => {}
                }
            }
        }
        StoreError::Backend(anyhow::Error::new(e).context("users query"))
    }
}

/// Persistence for user records. Uniqueness of `username` and `email` is
/// enforced here, at write time.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    /// Which unique field, if any, is already used by another record.
    async fn find_taken(&self, username: &str, email: &str) -> Result<Option<UniqueField>, StoreError>;
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;
    /// Users ordered by creation time, oldest first.
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, StoreError>;
    async fn count(&self) -> Result<i64, StoreError>;
    /// Returns `false` when nothing was deleted.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { db })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db)
            .await
            .context("run migrations")?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user =
            sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
                .bind(email)
                .fetch_optional(&self.db)
                .await?;
        Ok(user)
    }

    async fn find_taken(&self, username: &str, email: &str) -> Result<Option<UniqueField>, StoreError> {
        let rows = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT username, email
            FROM users
            WHERE username = $1 OR email = $2
            LIMIT 2
            "#,
        )
        .bind(username)
        .bind(email)
        .fetch_all(&self.db)
        .await?;

        if rows.iter().any(|(_, e)| e == email) {
            return Ok(Some(UniqueField::Email));
        }
        Ok(rows.first().map(|_| UniqueField::Username))
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, username, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .fetch_one(&self.db)
        .await?;
        Ok(created)
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            ORDER BY created_at ASC, id ASC
            LIMIT $1 OFFSET $2
            "#
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await?;
        Ok(total)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo_types::Role;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.into(),
            email: email.into(),
            password_hash: "$argon2id$unused".into(),
            role: Role::User,
        }
    }

    #[tokio::test]
    #[ignore = "needs PostgreSQL in DATABASE_URL"]
    async fn unique_violations_name_the_field() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL set");
        let store = PgUserStore::connect(&url, 2).await.expect("connect");
        store.migrate().await.expect("migrate");

        let tag = Uuid::new_v4().simple().to_string();
        let name = format!("dup-{}", &tag[..12]);
        let email = format!("dup-{tag}@example.com");
        let first = store.create(new_user(&name, &email)).await.expect("first insert");

        let other_name = format!("oth-{}", &tag[..12]);
        let err = store.create(new_user(&other_name, &email)).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(UniqueField::Email)), "got {err:?}");

        let other_email = format!("oth-{tag}@example.com");
        let err = store.create(new_user(&name, &other_email)).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(UniqueField::Username)), "got {err:?}");

        assert!(store.delete(first.id).await.expect("cleanup"));
    }
}
