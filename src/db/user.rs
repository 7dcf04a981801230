/// User records and the queries the account service runs against them
use crate::error::{ApiError, ApiResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, username, email, fullname, password_hash, avatar, avatar_public_id,
     cover_image, cover_image_public_id, refresh_token_hash, created_at, updated_at";

/// User record in the database
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub fullname: String,
    /// Argon2id PHC string
    pub password_hash: String,
    pub avatar: String,
    pub avatar_public_id: Option<String>,
    /// Empty when the user never uploaded a cover image
    pub cover_image: String,
    pub cover_image_public_id: Option<String>,
    /// SHA-256 hex digest of the single active refresh token
    pub refresh_token_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User projection safe to return to clients
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub avatar: String,
    pub cover_image: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            fullname: user.fullname,
            avatar: user.avatar,
            cover_image: user.cover_image,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Fields required to insert a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub password_hash: String,
    pub avatar: String,
    pub avatar_public_id: Option<String>,
    pub cover_image: String,
    pub cover_image_public_id: Option<String>,
}

/// Credential store backed by SQLite
#[derive(Clone)]
pub struct UserRepository {
    db: SqlitePool,
}

impl UserRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Insert a user; unique index violations surface as `Conflict`
    pub async fn create(&self, new_user: NewUser) -> ApiResult<User> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO users (id, username, email, fullname, password_hash, avatar, avatar_public_id,
                                cover_image, cover_image_public_id, refresh_token_hash, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL, ?10, ?10)",
        )
        .bind(&id)
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.fullname)
        .bind(&new_user.password_hash)
        .bind(&new_user.avatar)
        .bind(&new_user.avatar_public_id)
        .bind(&new_user.cover_image)
        .bind(&new_user.cover_image_public_id)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(map_unique_violation)?;

        self.get(&id).await
    }

    /// Find a user by id
    pub async fn find_by_id(&self, id: &str) -> ApiResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = ?1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    /// Get a user by id or fail with `NotFound`
    pub async fn get(&self, id: &str) -> ApiResult<User> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::NotFound("User does not exist".to_string()))
    }

    /// Find the first user matching either the username or the email
    pub async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> ApiResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE username = ?1 OR email = ?2 LIMIT 1",
            USER_COLUMNS
        ))
        .bind(username.map(str::to_lowercase))
        .bind(email.map(str::to_lowercase))
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    /// Check whether the username or email is taken
    pub async fn username_or_email_taken(&self, username: &str, email: &str) -> ApiResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ?1 OR email = ?2")
                .bind(username.to_lowercase())
                .bind(email.to_lowercase())
                .fetch_one(&self.db)
                .await?;

        Ok(count > 0)
    }

    /// Overwrite the stored refresh token digest; `None` clears it.
    /// Returns false if the user does not exist.
    pub async fn set_refresh_token_hash(&self, id: &str, digest: Option<&str>) -> ApiResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token_hash = ?1, updated_at = ?2 WHERE id = ?3",
        )
        .bind(digest)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace the refresh token digest only if it still equals `expected`.
    /// Returns false when another rotation or a logout won the race.
    pub async fn swap_refresh_token_hash(
        &self,
        id: &str,
        expected: &str,
        replacement: &str,
    ) -> ApiResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token_hash = ?1, updated_at = ?2
             WHERE id = ?3 AND refresh_token_hash = ?4",
        )
        .bind(replacement)
        .bind(Utc::now())
        .bind(id)
        .bind(expected)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Store a new password hash
    pub async fn update_password_hash(&self, id: &str, password_hash: &str) -> ApiResult<()> {
        let result =
            sqlx::query("UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3")
                .bind(password_hash)
                .bind(Utc::now())
                .bind(id)
                .execute(&self.db)
                .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("User does not exist".to_string()));
        }

        Ok(())
    }

    /// Update display name and email
    pub async fn update_details(&self, id: &str, fullname: &str, email: &str) -> ApiResult<User> {
        let result = sqlx::query(
            "UPDATE users SET fullname = ?1, email = ?2, updated_at = ?3 WHERE id = ?4",
        )
        .bind(fullname)
        .bind(email.to_lowercase())
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await
        .map_err(map_unique_violation)?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("User does not exist".to_string()));
        }

        self.get(id).await
    }

    /// Point the avatar at a new remote asset
    pub async fn update_avatar(&self, id: &str, url: &str, public_id: &str) -> ApiResult<User> {
        self.update_image_columns("avatar", "avatar_public_id", id, url, public_id)
            .await
    }

    /// Point the cover image at a new remote asset
    pub async fn update_cover_image(
        &self,
        id: &str,
        url: &str,
        public_id: &str,
    ) -> ApiResult<User> {
        self.update_image_columns("cover_image", "cover_image_public_id", id, url, public_id)
            .await
    }

    async fn update_image_columns(
        &self,
        url_column: &'static str,
        id_column: &'static str,
        id: &str,
        url: &str,
        public_id: &str,
    ) -> ApiResult<User> {
        let result = sqlx::query(&format!(
            "UPDATE users SET {} = ?1, {} = ?2, updated_at = ?3 WHERE id = ?4",
            url_column, id_column
        ))
        .bind(url)
        .bind(public_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("User does not exist".to_string()));
        }

        self.get(id).await
    }
}

fn map_unique_violation(err: sqlx::Error) -> ApiError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => ApiError::Conflict(
            "User with email or username already exists".to_string(),
        ),
        _ => ApiError::Database(err),
    }
}
