/// Access/refresh token issuance, verification and rotation
///
/// Access tokens are verified statelessly. Refresh tokens are single-use: the
/// SHA-256 digest of the only valid one is stored on the user record and every
/// rotation replaces it with a compare-and-swap.
use crate::{
    config::AuthConfig,
    db::user::{User, UserRepository},
    error::{ApiError, ApiResult},
};
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

const ACCESS_TYPE: &str = "access";
const REFRESH_TYPE: &str = "refresh";

/// Token failure kinds, kept distinct so callers can tell expiry from reuse
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("No refresh token found")]
    Missing,

    #[error("Token has expired")]
    Expired,

    #[error("Invalid token")]
    Invalid,

    #[error("Refresh token has been revoked or already used")]
    Revoked,
}

impl TokenError {
    /// Stable machine-readable code for the error envelope
    pub fn code(&self) -> &'static str {
        match self {
            TokenError::Missing => "TokenMissing",
            TokenError::Expired => "TokenExpired",
            TokenError::Invalid => "TokenInvalid",
            TokenError::Revoked => "TokenRevoked",
        }
    }
}

/// Claims carried by access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub typ: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Claims carried by refresh tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub typ: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly minted access/refresh pair
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues and verifies signed tokens bound to a user id
pub struct TokenService {
    users: UserRepository,
    config: AuthConfig,
}

impl TokenService {
    pub fn new(users: UserRepository, config: AuthConfig) -> Self {
        Self { users, config }
    }

    /// Mint a new pair for the user and make its refresh token the only valid one
    pub async fn issue(&self, user_id: &str) -> ApiResult<TokenPair> {
        let user = self.users.get(user_id).await?;
        let pair = self.mint(&user)?;

        self.users
            .set_refresh_token_hash(&user.id, Some(&digest(&pair.refresh_token)))
            .await?;

        tracing::debug!(user_id = %user.id, "issued token pair");
        Ok(pair)
    }

    /// Verify an access token without consulting persisted state
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let claims: AccessClaims = decode_claims(token, &self.config.access_token_secret)?;
        if claims.typ != ACCESS_TYPE {
            return Err(TokenError::Invalid);
        }
        Ok(claims)
    }

    /// Exchange a refresh token for a new pair; the old refresh token stops working
    pub async fn rotate(&self, token: &str) -> ApiResult<(String, TokenPair)> {
        let user = self.verify_refresh(token).await?;
        let pair = self.mint(&user)?;

        let swapped = self
            .users
            .swap_refresh_token_hash(&user.id, &digest(token), &digest(&pair.refresh_token))
            .await?;

        if !swapped {
            tracing::warn!(user_id = %user.id, "refresh token consumed concurrently");
            return Err(TokenError::Revoked.into());
        }

        tracing::debug!(user_id = %user.id, "rotated token pair");
        Ok((user.id, pair))
    }

    /// Forget the stored refresh token so it can no longer be exchanged
    pub async fn revoke(&self, user_id: &str) -> ApiResult<()> {
        if !self.users.set_refresh_token_hash(user_id, None).await? {
            return Err(ApiError::NotFound("User does not exist".to_string()));
        }
        Ok(())
    }

    /// Verify a refresh token against its signature, expiry and the stored
    /// digest, returning the user it belongs to
    pub async fn verify_refresh(&self, token: &str) -> ApiResult<User> {
        if token.trim().is_empty() {
            return Err(TokenError::Missing.into());
        }

        let claims: RefreshClaims = decode_claims(token, &self.config.refresh_token_secret)?;
        if claims.typ != REFRESH_TYPE {
            return Err(TokenError::Invalid.into());
        }

        let user = self
            .users
            .find_by_id(&claims.sub)
            .await?
            .ok_or(TokenError::Invalid)?;

        if user.refresh_token_hash.as_deref() != Some(digest(token).as_str()) {
            tracing::warn!(user_id = %user.id, "stale or foreign refresh token presented");
            return Err(TokenError::Revoked.into());
        }

        Ok(user)
    }

    fn mint(&self, user: &User) -> ApiResult<TokenPair> {
        let now = Utc::now().timestamp();

        let access = AccessClaims {
            sub: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            fullname: user.fullname.clone(),
            typ: ACCESS_TYPE.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.config.access_token_ttl_secs,
        };

        let refresh = RefreshClaims {
            sub: user.id.clone(),
            typ: REFRESH_TYPE.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.config.refresh_token_ttl_secs,
        };

        Ok(TokenPair {
            access_token: sign(&access, &self.config.access_token_secret)?,
            refresh_token: sign(&refresh, &self.config.refresh_token_secret)?,
        })
    }
}

fn sign<T: Serialize>(claims: &T, secret: &str) -> ApiResult<String> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Jwt(format!("Failed to sign token: {}", e)))
}

fn decode_claims<T: DeserializeOwned>(token: &str, secret: &str) -> Result<T, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 5;

    decode::<T>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!("token verification failed: {}", e);
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })
}

/// SHA-256 hex digest used to store refresh tokens
pub fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ServerConfig, db::test_pool, db::user::NewUser};

    async fn setup() -> (TokenService, UserRepository, String) {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::for_tests(dir.path());
        let users = UserRepository::new(test_pool().await);

        let user = users
            .create(NewUser {
                username: "alice".to_string(),
                email: "a@x.com".to_string(),
                fullname: "Alice".to_string(),
                password_hash: "hash".to_string(),
                avatar: "http://media/a.png".to_string(),
                avatar_public_id: None,
                cover_image: String::new(),
                cover_image_public_id: None,
            })
            .await
            .unwrap();

        (
            TokenService::new(users.clone(), config.authentication),
            users,
            user.id,
        )
    }

    fn unwrap_token_error(result: ApiResult<impl std::fmt::Debug>) -> TokenError {
        match result {
            Err(ApiError::Token(kind)) => kind,
            other => panic!("expected token error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_issue_then_verify_access() {
        let (tokens, users, user_id) = setup().await;

        let pair = tokens.issue(&user_id).await.unwrap();
        let claims = tokens.verify_access(&pair.access_token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.username, "alice");

        let stored = users.get(&user_id).await.unwrap();
        assert_eq!(stored.refresh_token_hash, Some(digest(&pair.refresh_token)));
        assert_ne!(stored.refresh_token_hash.as_deref(), Some(pair.refresh_token.as_str()));
    }

    #[tokio::test]
    async fn test_issue_unknown_user() {
        let (tokens, _, _) = setup().await;
        assert!(matches!(
            tokens.issue("no-such-user").await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rotation_is_single_use() {
        let (tokens, _, user_id) = setup().await;

        let first = tokens.issue(&user_id).await.unwrap();
        assert_eq!(tokens.verify_refresh(&first.refresh_token).await.unwrap().id, user_id);

        let (rotated_for, second) = tokens.rotate(&first.refresh_token).await.unwrap();
        assert_eq!(rotated_for, user_id);
        assert_ne!(first.refresh_token, second.refresh_token);

        assert_eq!(
            unwrap_token_error(tokens.verify_refresh(&first.refresh_token).await),
            TokenError::Revoked
        );
        assert_eq!(
            unwrap_token_error(tokens.rotate(&first.refresh_token).await),
            TokenError::Revoked
        );
        assert_eq!(tokens.verify_refresh(&second.refresh_token).await.unwrap().id, user_id);
    }

    #[tokio::test]
    async fn test_reissue_invalidates_previous_refresh_token() {
        let (tokens, _, user_id) = setup().await;

        let first = tokens.issue(&user_id).await.unwrap();
        let second = tokens.issue(&user_id).await.unwrap();

        assert_eq!(
            unwrap_token_error(tokens.verify_refresh(&first.refresh_token).await),
            TokenError::Revoked
        );
        assert!(tokens.verify_refresh(&second.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_revoke_keeps_access_token_valid() {
        let (tokens, _, user_id) = setup().await;

        let pair = tokens.issue(&user_id).await.unwrap();
        tokens.revoke(&user_id).await.unwrap();

        assert_eq!(
            unwrap_token_error(tokens.verify_refresh(&pair.refresh_token).await),
            TokenError::Revoked
        );
        assert!(tokens.verify_access(&pair.access_token).is_ok());
    }

    #[tokio::test]
    async fn test_error_kinds_are_distinct() {
        let (tokens, _, user_id) = setup().await;
        let pair = tokens.issue(&user_id).await.unwrap();

        assert_eq!(
            unwrap_token_error(tokens.verify_refresh("").await),
            TokenError::Missing
        );
        assert_eq!(
            unwrap_token_error(tokens.verify_refresh("not-a-jwt").await),
            TokenError::Invalid
        );
        // An access token is signed with a different secret
        assert_eq!(
            unwrap_token_error(tokens.verify_refresh(&pair.access_token).await),
            TokenError::Invalid
        );
        assert_eq!(
            tokens.verify_access(&pair.refresh_token).unwrap_err(),
            TokenError::Invalid
        );

        let now = Utc::now().timestamp();
        let expired = sign(
            &RefreshClaims {
                sub: user_id,
                typ: REFRESH_TYPE.to_string(),
                jti: Uuid::new_v4().to_string(),
                iat: now - 7200,
                exp: now - 3600,
            },
            &tokens.config.refresh_token_secret,
        )
        .unwrap();
        assert_eq!(
            unwrap_token_error(tokens.verify_refresh(&expired).await),
            TokenError::Expired
        );
    }
}
