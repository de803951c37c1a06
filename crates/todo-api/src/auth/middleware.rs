//! Axum용 인증 추출기 및 미들웨어.
//!
//! # 사용 예시
//!
//! ```rust,ignore
//! async fn protected_handler(CurrentUser(user): CurrentUser) -> impl IntoResponse {
//!     format!("Hello, {}!", user.username)
//! }
//!
//! // 역할 게이트
//! let staff_only = Router::new()
//!     .route("/todos/all", get(list_all))
//!     .route_layer(middleware::from_fn_with_state(
//!         RoleGuard::new(state.clone(), RoleSet::staff()),
//!         require_roles,
//!     ));
//! ```

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use todo_core::User;

use super::roles::{RoleGate, RoleSet};
use crate::error::ApiError;
use crate::state::AppState;

/// Authorization 헤더에서 Bearer 토큰 추출.
///
/// 스킴 이름은 대소문자를 구분하지 않습니다.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(ApiError::Unauthenticated)?;

    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(ApiError::Unauthenticated)?;

    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(ApiError::Unauthenticated);
    }

    Ok(token)
}

/// 인증된 현재 사용자 추출기.
///
/// 역할 게이트를 통과한 요청이면 게이트가 확인한 사용자를 그대로 사용하고,
/// 그렇지 않으면 Access Token으로 직접 해석합니다.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<User>() {
            return Ok(CurrentUser(user.clone()));
        }

        let state = Arc::<AppState>::from_ref(state);
        let token = bearer_token(&parts.headers)?;
        let user = state.sessions.resolve_current_user(token).await?;

        Ok(CurrentUser(user))
    }
}

/// 원본 Bearer 토큰 추출기 (리프레시 토큰 회전용).
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        bearer_token(&parts.headers).map(|t| BearerToken(t.to_string()))
    }
}

/// 역할 게이트 미들웨어 상태.
#[derive(Clone)]
pub struct RoleGuard {
    state: Arc<AppState>,
    gate: RoleGate,
}

impl RoleGuard {
    pub fn new(state: Arc<AppState>, allowed: RoleSet) -> Self {
        Self {
            state,
            gate: RoleGate::new(allowed),
        }
    }
}

/// 허용된 역할만 통과시키는 미들웨어.
///
/// 통과한 사용자는 요청 extension에 저장되어 [`CurrentUser`]가 재사용합니다.
pub async fn require_roles(
    State(guard): State<RoleGuard>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())?;
    let user = guard.state.sessions.resolve_current_user(token).await?;

    guard.gate.check(&user)?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
