/// Account operations composing the credential store, token service and
/// upload orchestrator
use crate::{
    account::{
        password, ChangePasswordRequest, LoginRequest, RegisterFields, RegisterRequest,
        UpdateAccountRequest,
    },
    db::user::{NewUser, PublicUser, User, UserRepository},
    error::{ApiError, ApiResult},
    media::{RemoteAsset, StagedUpload, UploadOrchestrator},
    metrics,
    token::{TokenError, TokenPair, TokenService},
};
use std::sync::Arc;
use validator::Validate;

/// Which profile image an upload replaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSlot {
    Avatar,
    CoverImage,
}

impl ImageSlot {
    fn label(&self) -> &'static str {
        match self {
            ImageSlot::Avatar => "Avatar",
            ImageSlot::CoverImage => "Cover image",
        }
    }

    fn current_public_id(&self, user: &User) -> Option<String> {
        match self {
            ImageSlot::Avatar => user.avatar_public_id.clone(),
            ImageSlot::CoverImage => user.cover_image_public_id.clone(),
        }
    }
}

/// Account manager service
pub struct AccountManager {
    users: UserRepository,
    tokens: Arc<TokenService>,
    uploads: UploadOrchestrator,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(
        users: UserRepository,
        tokens: Arc<TokenService>,
        uploads: UploadOrchestrator,
    ) -> Self {
        Self {
            users,
            tokens,
            uploads,
        }
    }

    /// Register a new user.
    ///
    /// Once an upload has succeeded, any later failure deletes every asset
    /// uploaded by this call before the original error is returned.
    pub async fn register(&self, request: RegisterRequest) -> ApiResult<PublicUser> {
        let RegisterRequest {
            fields,
            avatar,
            cover_image,
        } = request;

        let password_hash = match self.check_registration(&fields).await {
            Ok(hash) => hash,
            Err(e) => {
                self.discard_all([avatar, cover_image]).await;
                metrics::record_account_creation(false);
                return Err(e);
            }
        };

        let Some(avatar) = avatar else {
            self.discard_all([cover_image]).await;
            metrics::record_account_creation(false);
            return Err(ApiError::InvalidInput("Avatar file is required".to_string()));
        };

        let avatar = match self.uploads.upload(avatar).await {
            Ok(asset) => asset,
            Err(e) => {
                self.discard_all([cover_image]).await;
                metrics::record_account_creation(false);
                return Err(e);
            }
        };
        let mut uploaded = vec![avatar.clone()];

        // Cover image is optional; a failed upload registers without one
        let cover = match cover_image {
            Some(staged) => match self.uploads.upload(staged).await {
                Ok(asset) => {
                    uploaded.push(asset.clone());
                    Some(asset)
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "cover image upload failed, registering without it"
                    );
                    None
                }
            },
            None => None,
        };

        let new_user = NewUser {
            username: fields.username.trim().to_lowercase(),
            email: fields.email.trim().to_lowercase(),
            fullname: fields.fullname.trim().to_string(),
            password_hash,
            avatar: avatar.url,
            avatar_public_id: Some(avatar.public_id),
            cover_image: cover.as_ref().map(|c| c.url.clone()).unwrap_or_default(),
            cover_image_public_id: cover.map(|c| c.public_id),
        };

        match self.users.create(new_user).await {
            Ok(user) => {
                metrics::record_account_creation(true);
                tracing::info!(user_id = %user.id, username = %user.username, "user registered");
                Ok(user.into())
            }
            Err(e) => {
                tracing::error!(error = %e, "user creation failed, deleting uploaded images");
                self.uploads.compensate(&uploaded).await;
                metrics::record_account_creation(false);
                Err(e)
            }
        }
    }

    /// Validate registration fields and hash the password
    async fn check_registration(&self, fields: &RegisterFields) -> ApiResult<String> {
        if [&fields.fullname, &fields.email, &fields.username, &fields.password]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(ApiError::InvalidInput("All fields are required".to_string()));
        }

        fields
            .validate()
            .map_err(|e| ApiError::InvalidInput(e.to_string()))?;

        if self
            .users
            .username_or_email_taken(fields.username.trim(), fields.email.trim())
            .await?
        {
            return Err(ApiError::Conflict(
                "User with email or username already exists".to_string(),
            ));
        }

        password::hash_password(&fields.password)
    }

    /// Authenticate by username or email and issue a token pair
    pub async fn login(&self, request: LoginRequest) -> ApiResult<(PublicUser, TokenPair)> {
        let result = self.login_inner(request).await;
        metrics::record_login(result.is_ok());
        result
    }

    async fn login_inner(&self, request: LoginRequest) -> ApiResult<(PublicUser, TokenPair)> {
        let username = request
            .username
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let email = request
            .email
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        if username.is_none() && email.is_none() {
            return Err(ApiError::InvalidInput(
                "Username or email is required".to_string(),
            ));
        }
        if request.password.is_empty() {
            return Err(ApiError::InvalidInput("Password is required".to_string()));
        }

        let user = self
            .users
            .find_by_username_or_email(username, email)
            .await?
            .ok_or_else(|| ApiError::NotFound("User does not exist".to_string()))?;

        if !password::verify_password(&request.password, &user.password_hash)? {
            tracing::info!(user_id = %user.id, "login rejected: bad password");
            return Err(ApiError::Unauthorized("Invalid user credentials".to_string()));
        }

        let tokens = self.tokens.issue(&user.id).await?;
        let user = self.users.get(&user.id).await?;

        tracing::info!(user_id = %user.id, "user logged in");
        Ok((user.into(), tokens))
    }

    /// Exchange a refresh token for a new pair (single-use rotation)
    pub async fn refresh(&self, refresh_token: Option<&str>) -> ApiResult<TokenPair> {
        let token = refresh_token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(TokenError::Missing)
            .inspect_err(|_| metrics::record_token_refresh("missing"))?;

        match self.tokens.rotate(token).await {
            Ok((user_id, pair)) => {
                metrics::record_token_refresh("rotated");
                tracing::info!(user_id = %user_id, "access token refreshed");
                Ok(pair)
            }
            Err(e) => {
                let outcome = match &e {
                    ApiError::Token(kind) => kind.code(),
                    _ => "error",
                };
                metrics::record_token_refresh(outcome);
                Err(e)
            }
        }
    }

    /// Clear the stored refresh token; outstanding access tokens expire naturally
    pub async fn logout(&self, user_id: &str) -> ApiResult<()> {
        self.tokens.revoke(user_id).await?;
        tracing::info!(user_id, "user logged out");
        Ok(())
    }

    /// Change the password after checking the current one
    pub async fn change_password(
        &self,
        user_id: &str,
        request: ChangePasswordRequest,
    ) -> ApiResult<()> {
        if request.new_password.is_empty() {
            return Err(ApiError::InvalidInput("New password is required".to_string()));
        }

        let user = self.users.get(user_id).await?;

        if !password::verify_password(&request.old_password, &user.password_hash)? {
            return Err(ApiError::Unauthorized("Invalid old password".to_string()));
        }

        let password_hash = password::hash_password(&request.new_password)?;
        self.users.update_password_hash(user_id, &password_hash).await?;

        tracing::info!(user_id, "password changed");
        Ok(())
    }

    /// Public projection of the user
    pub async fn current_user(&self, user_id: &str) -> ApiResult<PublicUser> {
        Ok(self.users.get(user_id).await?.into())
    }

    /// Update display name and email
    pub async fn update_account_details(
        &self,
        user_id: &str,
        request: UpdateAccountRequest,
    ) -> ApiResult<PublicUser> {
        if request.fullname.trim().is_empty() || request.email.trim().is_empty() {
            return Err(ApiError::InvalidInput(
                "Fullname and email are required".to_string(),
            ));
        }

        request
            .validate()
            .map_err(|e| ApiError::InvalidInput(e.to_string()))?;

        let user = self
            .users
            .update_details(user_id, request.fullname.trim(), request.email.trim())
            .await?;

        Ok(user.into())
    }

    /// Replace the avatar
    pub async fn update_avatar(
        &self,
        user_id: &str,
        staged: Option<StagedUpload>,
    ) -> ApiResult<PublicUser> {
        self.replace_image(user_id, staged, ImageSlot::Avatar).await
    }

    /// Replace the cover image
    pub async fn update_cover_image(
        &self,
        user_id: &str,
        staged: Option<StagedUpload>,
    ) -> ApiResult<PublicUser> {
        self.replace_image(user_id, staged, ImageSlot::CoverImage).await
    }

    /// Upload a new image, point the user at it, then drop the previous asset
    async fn replace_image(
        &self,
        user_id: &str,
        staged: Option<StagedUpload>,
        slot: ImageSlot,
    ) -> ApiResult<PublicUser> {
        let Some(staged) = staged else {
            return Err(ApiError::InvalidInput(format!(
                "{} file is missing",
                slot.label()
            )));
        };

        let user = match self.users.get(user_id).await {
            Ok(user) => user,
            Err(e) => {
                self.uploads.discard(staged).await;
                return Err(e);
            }
        };
        let previous = slot.current_public_id(&user);

        let asset = self.uploads.upload(staged).await?;

        let updated = match self.store_image(user_id, &asset, slot).await {
            Ok(user) => user,
            Err(e) => {
                self.uploads.remove(&asset.public_id).await;
                return Err(e);
            }
        };

        if let Some(previous) = previous.filter(|id| *id != asset.public_id) {
            self.uploads.remove(&previous).await;
        }

        tracing::info!(user_id, slot = slot.label(), "profile image replaced");
        Ok(updated.into())
    }

    async fn store_image(
        &self,
        user_id: &str,
        asset: &RemoteAsset,
        slot: ImageSlot,
    ) -> ApiResult<User> {
        match slot {
            ImageSlot::Avatar => {
                self.users
                    .update_avatar(user_id, &asset.url, &asset.public_id)
                    .await
            }
            ImageSlot::CoverImage => {
                self.users
                    .update_cover_image(user_id, &asset.url, &asset.public_id)
                    .await
            }
        }
    }

    async fn discard_all<const N: usize>(&self, staged: [Option<StagedUpload>; N]) {
        for file in staged.into_iter().flatten() {
            self.uploads.discard(file).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ServerConfig,
        db::test_pool,
        media::testing::{stage, FakeMediaHost},
    };
    use sqlx::SqlitePool;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    struct Harness {
        manager: AccountManager,
        tokens: Arc<TokenService>,
        host: Arc<FakeMediaHost>,
        db: SqlitePool,
        dir: TempDir,
    }

    async fn setup_with(host: FakeMediaHost) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::for_tests(dir.path());
        let db = test_pool().await;
        let users = UserRepository::new(db.clone());
        let tokens = Arc::new(TokenService::new(users.clone(), config.authentication));
        let host = Arc::new(host);
        let uploads = UploadOrchestrator::new(host.clone());

        Harness {
            manager: AccountManager::new(users, tokens.clone(), uploads),
            tokens,
            host,
            db,
            dir,
        }
    }

    async fn setup() -> Harness {
        setup_with(FakeMediaHost::default()).await
    }

    fn fields(username: &str, email: &str) -> RegisterFields {
        RegisterFields {
            fullname: "Alice Liddell".to_string(),
            email: email.to_string(),
            username: username.to_string(),
            password: "p".to_string(),
        }
    }

    async fn register_request(
        h: &Harness,
        username: &str,
        email: &str,
        with_cover: bool,
    ) -> RegisterRequest {
        let staging = h.dir.path().join("staging");
        RegisterRequest {
            fields: fields(username, email),
            avatar: Some(stage(&staging, "avatar").await),
            cover_image: if with_cover {
                Some(stage(&staging, "coverImage").await)
            } else {
                None
            },
        }
    }

    async fn user_count(db: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(db)
            .await
            .unwrap()
    }

    async fn staging_is_empty(h: &Harness) -> bool {
        let mut entries = match tokio::fs::read_dir(h.dir.path().join("staging")).await {
            Ok(entries) => entries,
            Err(_) => return true,
        };
        entries.next_entry().await.unwrap().is_none()
    }

    async fn login(
        h: &Harness,
        username: &str,
        password: &str,
    ) -> ApiResult<(PublicUser, TokenPair)> {
        h.manager
            .login(LoginRequest {
                username: Some(username.to_string()),
                email: None,
                password: password.to_string(),
            })
            .await
    }

    #[tokio::test]
    async fn test_register_success() {
        let h = setup().await;
        let request = register_request(&h, "Alice", "A@x.com", true).await;

        let user = h.manager.register(request).await.unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.email, "a@x.com");
        assert!(user.avatar.starts_with("http://media.test/"));
        assert!(user.cover_image.starts_with("http://media.test/"));

        assert_eq!(h.host.stored().len(), 2);
        assert!(staging_is_empty(&h).await);
    }

    #[tokio::test]
    async fn test_register_without_cover_stores_empty_cover() {
        let h = setup().await;
        let request = register_request(&h, "alice", "a@x.com", false).await;

        let user = h.manager.register(request).await.unwrap();
        assert_eq!(user.cover_image, "");
        assert_eq!(h.host.stored().len(), 1);
    }

    #[tokio::test]
    async fn test_register_duplicate_is_conflict_without_uploads() {
        let h = setup().await;
        let first = register_request(&h, "alice", "a@x.com", false).await;
        h.manager.register(first).await.unwrap();

        for (username, email) in [("alice", "other@x.com"), ("bob", "a@x.com")] {
            let again = register_request(&h, username, email, true).await;
            let result = h.manager.register(again).await;
            assert!(matches!(result, Err(ApiError::Conflict(_))));
        }

        assert_eq!(user_count(&h.db).await, 1);
        assert_eq!(h.host.stored().len(), 1);
        assert!(staging_is_empty(&h).await);
    }

    #[tokio::test]
    async fn test_register_missing_avatar_fails_before_upload() {
        let h = setup().await;
        let mut request = register_request(&h, "alice", "a@x.com", true).await;
        let avatar = request.avatar.take().unwrap();
        tokio::fs::remove_file(&avatar.path).await.unwrap();

        let result = h.manager.register(request).await;
        assert!(matches!(
            result,
            Err(ApiError::InvalidInput(msg)) if msg == "Avatar file is required"
        ));
        assert!(h.host.stored().is_empty());
        assert!(h.host.destroyed().is_empty());
        assert!(staging_is_empty(&h).await);
    }

    #[tokio::test]
    async fn test_register_requires_all_fields() {
        let h = setup().await;
        let mut request = register_request(&h, "alice", "a@x.com", false).await;
        request.fields.fullname = "   ".to_string();

        let result = h.manager.register(request).await;
        assert!(matches!(result, Err(ApiError::InvalidInput(_))));
        assert!(h.host.stored().is_empty());
        assert!(staging_is_empty(&h).await);
    }

    #[tokio::test]
    async fn test_register_rejects_bad_email() {
        let h = setup().await;
        let request = register_request(&h, "alice", "not-an-email", false).await;

        let result = h.manager.register(request).await;
        assert!(matches!(result, Err(ApiError::InvalidInput(_))));
        assert_eq!(user_count(&h.db).await, 0);
    }

    #[tokio::test]
    async fn test_register_avatar_upload_failure() {
        let h = setup_with(FakeMediaHost::failing_after(0)).await;
        let request = register_request(&h, "alice", "a@x.com", true).await;

        let result = h.manager.register(request).await;
        assert!(matches!(result, Err(ApiError::UploadFailed(_))));
        assert_eq!(user_count(&h.db).await, 0);
        assert!(staging_is_empty(&h).await);
    }

    #[tokio::test]
    async fn test_register_cover_upload_failure_keeps_avatar() {
        let h = setup_with(FakeMediaHost::failing_after(1)).await;
        let request = register_request(&h, "alice", "a@x.com", true).await;

        let user = h.manager.register(request).await.unwrap();
        assert_eq!(user.cover_image, "");
        assert_eq!(user.avatar, "http://media.test/asset-0");
        assert_eq!(h.host.stored(), vec!["asset-0".to_string()]);
        assert!(h.host.destroyed().is_empty());
        assert_eq!(user_count(&h.db).await, 1);
        assert!(staging_is_empty(&h).await);
    }

    #[tokio::test]
    async fn test_register_record_failure_deletes_uploaded_assets() {
        let h = setup().await;
        sqlx::query(
            "CREATE TRIGGER reject_users BEFORE INSERT ON users
             BEGIN SELECT RAISE(ABORT, 'insert disabled'); END;",
        )
        .execute(&h.db)
        .await
        .unwrap();

        let request = register_request(&h, "alice", "a@x.com", true).await;
        let result = h.manager.register(request).await;

        assert!(matches!(result, Err(ApiError::Database(_))));
        assert!(h.host.stored().is_empty());
        assert_eq!(h.host.destroyed().len(), 2);
        assert_eq!(user_count(&h.db).await, 0);
    }

    #[tokio::test]
    async fn test_failed_compensation_does_not_mask_primary_error() {
        let h = setup().await;
        h.host.fail_destroy.store(true, Ordering::SeqCst);
        sqlx::query(
            "CREATE TRIGGER reject_users BEFORE INSERT ON users
             BEGIN SELECT RAISE(ABORT, 'insert disabled'); END;",
        )
        .execute(&h.db)
        .await
        .unwrap();

        let request = register_request(&h, "alice", "a@x.com", false).await;
        let result = h.manager.register(request).await;

        assert!(matches!(result, Err(ApiError::Database(_))));
        // Orphaned, but the caller still sees the original failure
        assert_eq!(h.host.stored().len(), 1);
    }

    #[tokio::test]
    async fn test_login_success_issues_tokens() {
        let h = setup().await;
        let request = register_request(&h, "alice", "a@x.com", false).await;
        let registered = h.manager.register(request).await.unwrap();

        let (user, pair) = login(&h, "alice", "p").await.unwrap();
        assert_eq!(user.id, registered.id);
        assert_eq!(h.tokens.verify_access(&pair.access_token).unwrap().sub, user.id);
        assert_eq!(h.tokens.verify_refresh(&pair.refresh_token).await.unwrap().id, user.id);

        let (by_email, _) = h
            .manager
            .login(LoginRequest {
                username: None,
                email: Some("A@X.COM".to_string()),
                password: "p".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(by_email.id, registered.id);
    }

    #[tokio::test]
    async fn test_login_wrong_password_issues_nothing() {
        let h = setup().await;
        let request = register_request(&h, "alice", "a@x.com", false).await;
        let registered = h.manager.register(request).await.unwrap();

        let result = login(&h, "alice", "wrong").await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));

        let stored: Option<String> =
            sqlx::query_scalar("SELECT refresh_token_hash FROM users WHERE id = ?1")
                .bind(&registered.id)
                .fetch_one(&h.db)
                .await
                .unwrap();
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn test_login_unknown_user_and_missing_identifier() {
        let h = setup().await;

        assert!(matches!(
            login(&h, "nobody", "p").await,
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            h.manager.login(LoginRequest::default()).await,
            Err(ApiError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_rotates_and_rejects_reuse() {
        let h = setup().await;
        let request = register_request(&h, "alice", "a@x.com", false).await;
        h.manager.register(request).await.unwrap();
        let (_, first) = login(&h, "alice", "p").await.unwrap();

        let second = h.manager.refresh(Some(&first.refresh_token)).await.unwrap();
        assert_ne!(second.refresh_token, first.refresh_token);

        let reuse = h.manager.refresh(Some(&first.refresh_token)).await;
        assert!(matches!(reuse, Err(ApiError::Token(TokenError::Revoked))));

        assert!(h.manager.refresh(Some(&second.refresh_token)).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_without_token() {
        let h = setup().await;

        for token in [None, Some(""), Some("   ")] {
            let result = h.manager.refresh(token).await;
            assert!(matches!(result, Err(ApiError::Token(TokenError::Missing))));
        }
    }

    #[tokio::test]
    async fn test_logout_revokes_refresh_token() {
        let h = setup().await;
        let request = register_request(&h, "alice", "a@x.com", false).await;
        let user = h.manager.register(request).await.unwrap();
        let (_, pair) = login(&h, "alice", "p").await.unwrap();

        h.manager.logout(&user.id).await.unwrap();

        let result = h.manager.refresh(Some(&pair.refresh_token)).await;
        assert!(matches!(result, Err(ApiError::Token(TokenError::Revoked))));
        // Access tokens are stateless and stay valid until they expire
        assert!(h.tokens.verify_access(&pair.access_token).is_ok());
    }

    #[tokio::test]
    async fn test_change_password() {
        let h = setup().await;
        let request = register_request(&h, "alice", "a@x.com", false).await;
        let user = h.manager.register(request).await.unwrap();

        let wrong = h
            .manager
            .change_password(
                &user.id,
                ChangePasswordRequest {
                    old_password: "nope".to_string(),
                    new_password: "new".to_string(),
                },
            )
            .await;
        assert!(matches!(wrong, Err(ApiError::Unauthorized(_))));

        h.manager
            .change_password(
                &user.id,
                ChangePasswordRequest {
                    old_password: "p".to_string(),
                    new_password: "new".to_string(),
                },
            )
            .await
            .unwrap();

        assert!(matches!(
            login(&h, "alice", "p").await,
            Err(ApiError::Unauthorized(_))
        ));
        assert!(login(&h, "alice", "new").await.is_ok());
    }

    #[tokio::test]
    async fn test_update_account_details() {
        let h = setup().await;
        let request = register_request(&h, "alice", "a@x.com", false).await;
        let user = h.manager.register(request).await.unwrap();

        let missing = h
            .manager
            .update_account_details(
                &user.id,
                UpdateAccountRequest {
                    fullname: String::new(),
                    email: "new@x.com".to_string(),
                },
            )
            .await;
        assert!(matches!(missing, Err(ApiError::InvalidInput(_))));

        let updated = h
            .manager
            .update_account_details(
                &user.id,
                UpdateAccountRequest {
                    fullname: "Alice L.".to_string(),
                    email: "New@x.com".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.fullname, "Alice L.");
        assert_eq!(updated.email, "new@x.com");
    }

    #[tokio::test]
    async fn test_update_avatar_replaces_and_removes_previous() {
        let h = setup().await;
        let request = register_request(&h, "alice", "a@x.com", false).await;
        let user = h.manager.register(request).await.unwrap();
        let original = user.avatar.clone();

        let staged = stage(&h.dir.path().join("staging"), "avatar").await;
        let updated = h.manager.update_avatar(&user.id, Some(staged)).await.unwrap();

        assert_ne!(updated.avatar, original);
        assert_eq!(h.host.destroyed(), vec!["asset-0".to_string()]);
        assert_eq!(h.host.stored(), vec!["asset-1".to_string()]);
        assert!(staging_is_empty(&h).await);
    }

    #[tokio::test]
    async fn test_update_cover_image_without_previous() {
        let h = setup().await;
        let request = register_request(&h, "alice", "a@x.com", false).await;
        let user = h.manager.register(request).await.unwrap();

        let staged = stage(&h.dir.path().join("staging"), "coverImage").await;
        let updated = h
            .manager
            .update_cover_image(&user.id, Some(staged))
            .await
            .unwrap();

        assert!(updated.cover_image.starts_with("http://media.test/"));
        assert!(h.host.destroyed().is_empty());
    }

    #[tokio::test]
    async fn test_update_image_requires_file() {
        let h = setup().await;
        let request = register_request(&h, "alice", "a@x.com", false).await;
        let user = h.manager.register(request).await.unwrap();

        assert!(matches!(
            h.manager.update_avatar(&user.id, None).await,
            Err(ApiError::InvalidInput(_))
        ));
        assert!(matches!(
            h.manager.update_cover_image(&user.id, None).await,
            Err(ApiError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_update_image_upload_failure_keeps_previous() {
        let h = setup_with(FakeMediaHost::failing_after(1)).await;
        let request = register_request(&h, "alice", "a@x.com", false).await;
        let user = h.manager.register(request).await.unwrap();

        let staged = stage(&h.dir.path().join("staging"), "avatar").await;
        let result = h.manager.update_avatar(&user.id, Some(staged)).await;

        assert!(matches!(result, Err(ApiError::UploadFailed(_))));
        assert_eq!(h.manager.current_user(&user.id).await.unwrap().avatar, user.avatar);
        assert!(h.host.destroyed().is_empty());
        assert!(staging_is_empty(&h).await);
    }
}
