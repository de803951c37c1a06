//! Users Repository
//!
//! 사용자 관련 PostgreSQL 연산을 담당합니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use todo_core::{NewUser, Role, User};

use super::{RepositoryError, RepositoryResult, UserRepository};

// ================================================================================================
// Types
// ================================================================================================

/// users 테이블 레코드
#[derive(Debug, Clone, FromRow)]
struct UserRecord {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    #[sqlx(default)]
    avatar: Option<String>,
    #[sqlx(default)]
    refresh_token: Option<String>,
    role: String,
    confirmed: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRecord> for User {
    type Error = RepositoryError;

    fn try_from(record: UserRecord) -> Result<Self, Self::Error> {
        let role = Role::parse(&record.role).ok_or_else(|| {
            RepositoryError::InvalidData(format!("unknown role '{}'", record.role))
        })?;

        Ok(User {
            id: record.id,
            username: record.username,
            email: record.email,
            password_hash: record.password_hash,
            avatar: record.avatar,
            refresh_token: record.refresh_token,
            role,
            confirmed: record.confirmed,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, avatar, refresh_token, role, \
                            confirmed, created_at, updated_at";

// ================================================================================================
// Repository
// ================================================================================================

/// PostgreSQL 사용자 저장소
#[derive(Debug, Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_by(&self, sql: &str, bind: QueryKey<'_>) -> RepositoryResult<Option<User>> {
        let query = sqlx::query_as::<_, UserRecord>(sql);
        let query = match bind {
            QueryKey::Id(id) => query.bind(id),
            QueryKey::Email(email) => query.bind(email),
        };

        query
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }
}

enum QueryKey<'a> {
    Id(i64),
    Email(&'a str),
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        self.fetch_one_by(&sql, QueryKey::Email(email)).await
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        self.fetch_one_by(&sql, QueryKey::Id(id)).await
    }

    async fn create(&self, new_user: NewUser) -> RepositoryResult<User> {
        let sql = format!(
            r#"
            INSERT INTO users (username, email, password_hash, avatar, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        );

        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(&new_user.username)
            .bind(&new_user.email)
            .bind(&new_user.password_hash)
            .bind(&new_user.avatar)
            .bind(new_user.role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if e.as_database_error()
                    .is_some_and(|db| db.is_unique_violation())
                {
                    RepositoryError::Conflict(new_user.email.clone())
                } else {
                    RepositoryError::Database(e)
                }
            })?;

        User::try_from(record)
    }

    async fn save(&self, user: &User) -> RepositoryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET username = $2, email = $3, password_hash = $4, avatar = $5,
                refresh_token = $6, role = $7, confirmed = $8, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.avatar)
        .bind(&user.refresh_token)
        .bind(user.role.as_str())
        .bind(user.confirmed)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn swap_refresh_token(
        &self,
        id: i64,
        expected: &str,
        new: Option<&str>,
    ) -> RepositoryResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET refresh_token = $3, updated_at = NOW()
            WHERE id = $1 AND refresh_token IS NOT DISTINCT FROM $2
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(new)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_refresh_token(&self, id: i64, token: Option<&str>) -> RepositoryResult<()> {
        let result =
            sqlx::query("UPDATE users SET refresh_token = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(token)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn clear_refresh_token(&self, id: i64) -> RepositoryResult<()> {
        sqlx::query("UPDATE users SET refresh_token = NULL, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(role: &str) -> UserRecord {
        let now = Utc::now();
        UserRecord {
            id: 3,
            username: "bob".to_string(),
            email: "bob@example.com".to_string(),
            password_hash: "$argon2id$...".to_string(),
            avatar: None,
            refresh_token: Some("rt".to_string()),
            role: role.to_string(),
            confirmed: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_record_conversion() {
        let user = User::try_from(record("moderator")).unwrap();
        assert_eq!(user.role, Role::Moderator);
        assert!(user.holds_refresh_token("rt"));
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        assert!(matches!(
            User::try_from(record("superuser")),
            Err(RepositoryError::InvalidData(_))
        ));
    }
}
