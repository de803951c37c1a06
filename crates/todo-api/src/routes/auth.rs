//! 인증 endpoint.
//!
//! 회원가입, 로그인, 토큰 갱신, 이메일 확인을 제공합니다.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    middleware,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use todo_core::{NewUser, Role, User};
use todo_notification::ConfirmationEmail;
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use validator::Validate;

use super::extract::{JsonOrForm, ValidatedJson};
use crate::auth::{BearerToken, ConfirmOutcome, CurrentUser, TokenPair};
use crate::error::{ApiError, ApiErrorResponse, ApiResult};
use crate::middleware::{rate_limit_middleware, RateLimiter};
use crate::state::AppState;

// ================================================================================================
// Types
// ================================================================================================

/// 회원가입 요청.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SignupRequest {
    #[validate(length(min = 3, max = 50, message = "username must be 3-50 characters"))]
    pub username: String,
    #[validate(
        email(message = "invalid email address"),
        length(max = 150, message = "email must be at most 150 characters")
    )]
    pub email: String,
    #[validate(length(min = 6, max = 128, message = "password must be 6-128 characters"))]
    pub password: String,
}

/// 로그인 요청 (OAuth2 password 폼과 동일한 필드명).
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    /// 이메일
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// 확인 메일 재요청.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RequestEmail {
    #[validate(email(message = "invalid email address"))]
    pub email: String,
}

/// 사용자 응답. 비밀번호 해시와 리프레시 토큰은 포함하지 않습니다.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    pub role: Role,
    pub confirmed: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            avatar: user.avatar,
            role: user.role,
            confirmed: user.confirmed,
            created_at: user.created_at,
        }
    }
}

/// 메시지 응답.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

// ================================================================================================
// Helpers
// ================================================================================================

/// 이메일 기반 Gravatar URL (SHA-256).
pub fn gravatar_url(email: &str) -> String {
    let digest = Sha256::digest(email.trim().to_lowercase().as_bytes());
    format!(
        "https://www.gravatar.com/avatar/{}?d=identicon",
        hex::encode(digest)
    )
}

/// 요청의 Host 헤더로 기본 URL을 구성합니다.
fn request_base_url(headers: &HeaderMap, fallback: &str) -> String {
    let host = headers.get(header::HOST).and_then(|h| h.to_str().ok());
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("http");

    match host {
        Some(host) => format!("{scheme}://{host}/"),
        None => fallback.to_string(),
    }
}

/// 확인 메일을 백그라운드로 전송합니다. 전송 실패는 로그만 남깁니다.
fn queue_confirmation(state: &AppState, user: &User, base_url: String) -> ApiResult<()> {
    let token = state.tokens().issue_email_confirmation(&user.email)?;
    let email = ConfirmationEmail::new(&user.email, &user.username, base_url, token.token);
    let mailer = state.mailer.clone();

    tokio::spawn(async move {
        match mailer.send_confirmation(&email).await {
            Ok(()) => debug!(mailer = mailer.name(), "Confirmation email dispatched"),
            Err(e) => warn!(
                mailer = mailer.name(),
                recipient = %email.recipient,
                error = %e,
                "Failed to send confirmation email"
            ),
        }
    });

    Ok(())
}

// ================================================================================================
// Handlers
// ================================================================================================

/// 회원가입.
#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "가입 완료", body = UserResponse),
        (status = 409, description = "이미 존재하는 계정", body = ApiErrorResponse),
        (status = 422, description = "입력 검증 실패", body = ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn signup(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(body): ValidatedJson<SignupRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    let email = body.email.trim().to_lowercase();

    if state.users.find_by_email(&email).await?.is_some() {
        return Err(ApiError::Conflict("Account already exists".to_string()));
    }

    let password_hash = state.sessions.hash_password(&body.password).await?;
    let new_user = NewUser::new(body.username, email.as_str(), password_hash)
        .with_avatar(Some(gravatar_url(&email)));
    let user = state.users.create(new_user).await?;

    info!(user_id = user.id, "User signed up");

    let base_url = request_base_url(&headers, &state.public_url);
    queue_confirmation(&state, &user, base_url)?;

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// 로그인.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body(content = LoginRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "토큰 발급", body = TokenPair),
        (status = 401, description = "잘못된 자격 증명 또는 미확인 이메일", body = ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    JsonOrForm(body): JsonOrForm<LoginRequest>,
) -> ApiResult<Json<TokenPair>> {
    let email = body.username.trim().to_lowercase();
    let pair = state.sessions.login(&email, &body.password).await?;
    Ok(Json(pair))
}

/// 토큰 갱신 (리프레시 토큰 회전).
#[utoipa::path(
    get,
    path = "/api/auth/refresh_token",
    responses(
        (status = 200, description = "새 토큰 페어", body = TokenPair),
        (status = 401, description = "유효하지 않거나 재사용된 리프레시 토큰", body = ApiErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
) -> ApiResult<Json<TokenPair>> {
    let pair = state.sessions.rotate_refresh(&token).await?;
    Ok(Json(pair))
}

/// 이메일 확인.
#[utoipa::path(
    get,
    path = "/api/auth/confirmed_email/{token}",
    params(("token" = String, Path, description = "이메일 확인 토큰")),
    responses(
        (status = 200, description = "확인 완료", body = MessageResponse),
        (status = 401, description = "유효하지 않은 토큰", body = ApiErrorResponse),
        (status = 404, description = "사용자 없음", body = ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn confirmed_email(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let message = match state.sessions.confirm_email(&token).await? {
        ConfirmOutcome::Confirmed => "Email confirmed",
        ConfirmOutcome::AlreadyConfirmed => "Your email is already confirmed",
    };
    Ok(MessageResponse::new(message))
}

/// 확인 메일 재전송 요청.
#[utoipa::path(
    post,
    path = "/api/auth/request_email",
    request_body = RequestEmail,
    responses(
        (status = 200, description = "요청 처리", body = MessageResponse),
        (status = 404, description = "사용자 없음", body = ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn request_email(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(body): ValidatedJson<RequestEmail>,
) -> ApiResult<Json<MessageResponse>> {
    let email = body.email.trim().to_lowercase();
    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if user.confirmed {
        return Ok(MessageResponse::new("Your email is already confirmed"));
    }

    let base_url = request_base_url(&headers, &state.public_url);
    queue_confirmation(&state, &user, base_url)?;

    Ok(MessageResponse::new("Check your email for confirmation."))
}

/// 현재 사용자 조회.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "현재 사용자", body = UserResponse),
        (status = 401, description = "인증 필요", body = ApiErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(user.into())
}

// ================================================================================================
// Router
// ================================================================================================

/// 인증 라우터. 모든 경로에 IP별 요청 제한이 적용됩니다.
pub fn auth_router(limiter: RateLimiter) -> Router<Arc<AppState>> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/refresh_token", get(refresh_token))
        .route("/confirmed_email/{token}", get(confirmed_email))
        .route("/request_email", post(request_email))
        .route("/me", get(me))
        .layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
}
