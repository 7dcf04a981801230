/// User account endpoints under /api/v1/users
use crate::{
    account::{
        ChangePasswordRequest, LoginRequest, LoginResponse, RefreshRequest, RegisterFields,
        RegisterRequest, UpdateAccountRequest,
    },
    api::{
        extract::JsonOrForm,
        middleware::{clear_token_cookies, cookie_value, set_token_cookies, REFRESH_TOKEN_COOKIE},
        multipart::stage_form,
        ApiResponse,
    },
    auth::AuthContext,
    context::AppContext,
    db::user::PublicUser,
    error::{ApiError, ApiResult},
    token::TokenPair,
};
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    routing::{get, patch, post},
    Router,
};
use axum_extra::extract::{cookie::CookieJar, WithRejection};
use serde_json::{json, Value};

const AVATAR_FIELD: &str = "avatar";
const COVER_IMAGE_FIELD: &str = "coverImage";

/// Build user routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh-token", post(refresh_token))
        .route("/logout", post(logout))
        .route("/change-password", post(change_password))
        .route("/current-user", get(current_user))
        .route("/update-account", patch(update_account))
        .route("/avatar", patch(update_avatar))
        .route("/cover-image", patch(update_cover_image))
}

/// Register with multipart fields plus `avatar` and optional `coverImage`
async fn register(
    State(ctx): State<AppContext>,
    WithRejection(multipart, _): WithRejection<Multipart, ApiError>,
) -> ApiResult<ApiResponse<PublicUser>> {
    let mut form = stage_form(
        multipart,
        &ctx.config.storage.staging_directory,
        &[AVATAR_FIELD, COVER_IMAGE_FIELD],
    )
    .await?;

    let request = RegisterRequest {
        fields: RegisterFields {
            fullname: form.text("fullname"),
            email: form.text("email"),
            username: form.text("username"),
            password: form.text("password"),
        },
        avatar: form.take_file(AVATAR_FIELD),
        cover_image: form.take_file(COVER_IMAGE_FIELD),
    };

    let user = ctx.accounts.register(request).await?;

    Ok(ApiResponse::new(
        StatusCode::CREATED,
        user,
        "User registered successfully",
    ))
}

/// Log in by username or email, from a JSON or form-encoded body
async fn login(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    JsonOrForm(req): JsonOrForm<LoginRequest>,
) -> ApiResult<(CookieJar, ApiResponse<LoginResponse>)> {
    let (user, TokenPair {
        access_token,
        refresh_token,
    }) = ctx.accounts.login(req).await?;

    let jar = set_token_cookies(jar, &access_token, &refresh_token, ctx.secure_cookies());

    Ok((
        jar,
        ApiResponse::ok(
            LoginResponse {
                user,
                access_token,
                refresh_token,
            },
            "User logged in successfully",
        ),
    ))
}

/// Rotate the refresh token; the cookie wins over the body
async fn refresh_token(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    body: Option<JsonOrForm<RefreshRequest>>,
) -> ApiResult<(CookieJar, ApiResponse<TokenPair>)> {
    let incoming = cookie_value(&jar, REFRESH_TOKEN_COOKIE)
        .or_else(|| body.and_then(|JsonOrForm(b)| b.refresh_token));

    let pair = ctx.accounts.refresh(incoming.as_deref()).await?;
    let jar = set_token_cookies(
        jar,
        &pair.access_token,
        &pair.refresh_token,
        ctx.secure_cookies(),
    );

    Ok((jar, ApiResponse::ok(pair, "Access token refreshed successfully")))
}

/// Revoke the refresh token and clear cookies
async fn logout(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    jar: CookieJar,
) -> ApiResult<(CookieJar, ApiResponse<Value>)> {
    ctx.accounts.logout(&auth.user_id).await?;

    Ok((
        clear_token_cookies(jar, ctx.secure_cookies()),
        ApiResponse::ok(json!({}), "User logged out successfully"),
    ))
}

async fn change_password(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    JsonOrForm(req): JsonOrForm<ChangePasswordRequest>,
) -> ApiResult<ApiResponse<Value>> {
    ctx.accounts.change_password(&auth.user_id, req).await?;
    Ok(ApiResponse::ok(json!({}), "Password changed successfully"))
}

async fn current_user(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> ApiResult<ApiResponse<PublicUser>> {
    let user = ctx.accounts.current_user(&auth.user_id).await?;
    Ok(ApiResponse::ok(user, "Current user details"))
}

async fn update_account(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    JsonOrForm(req): JsonOrForm<UpdateAccountRequest>,
) -> ApiResult<ApiResponse<PublicUser>> {
    let user = ctx
        .accounts
        .update_account_details(&auth.user_id, req)
        .await?;
    Ok(ApiResponse::ok(user, "Account details updated successfully"))
}

async fn update_avatar(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    WithRejection(multipart, _): WithRejection<Multipart, ApiError>,
) -> ApiResult<ApiResponse<PublicUser>> {
    let mut form = stage_form(
        multipart,
        &ctx.config.storage.staging_directory,
        &[AVATAR_FIELD],
    )
    .await?;

    let user = ctx
        .accounts
        .update_avatar(&auth.user_id, form.take_file(AVATAR_FIELD))
        .await?;
    Ok(ApiResponse::ok(user, "Avatar updated successfully"))
}

async fn update_cover_image(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    WithRejection(multipart, _): WithRejection<Multipart, ApiError>,
) -> ApiResult<ApiResponse<PublicUser>> {
    let mut form = stage_form(
        multipart,
        &ctx.config.storage.staging_directory,
        &[COVER_IMAGE_FIELD],
    )
    .await?;

    let user = ctx
        .accounts
        .update_cover_image(&auth.user_id, form.take_file(COVER_IMAGE_FIELD))
        .await?;
    Ok(ApiResponse::ok(user, "Cover image updated successfully"))
}
