/// Account management system
///
/// Handles registration, login, token refresh, logout and profile updates.

mod manager;
pub mod password;

pub use manager::AccountManager;

use crate::{db::user::PublicUser, media::StagedUpload};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Text fields of the registration form
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RegisterFields {
    pub fullname: String,
    #[validate(email(message = "Email address is not valid"))]
    pub email: String,
    #[validate(length(max = 64, message = "Username is too long"))]
    pub username: String,
    pub password: String,
}

/// Registration request: form fields plus staged image files
#[derive(Debug, Default)]
pub struct RegisterRequest {
    pub fields: RegisterFields,
    pub avatar: Option<StagedUpload>,
    pub cover_image: Option<StagedUpload>,
}

/// Login request; either identifier may be used
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    #[serde(default)]
    pub password: String,
}

/// Login response body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: PublicUser,
    pub access_token: String,
    pub refresh_token: String,
}

/// Token refresh request; the cookie takes precedence over this body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

/// Password change request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Account details update request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateAccountRequest {
    #[serde(default)]
    pub fullname: String,
    #[serde(default)]
    #[validate(email(message = "Email address is not valid"))]
    pub email: String,
}
