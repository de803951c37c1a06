//! API 라우트.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 상세 헬스 체크 (readiness)
//! - `/metrics` - Prometheus 메트릭
//! - `/api/auth` - 회원가입, 로그인, 토큰 갱신, 이메일 확인
//! - `/api/todos` - 할 일 CRUD

pub mod auth;
pub mod extract;
pub mod health;
pub mod todos;

use std::sync::Arc;

use axum::{routing::get, Router};

use crate::middleware::RateLimiter;
use crate::state::AppState;

pub use auth::{
    auth_router, gravatar_url, LoginRequest, MessageResponse, RequestEmail, SignupRequest,
    UserResponse,
};
pub use extract::{JsonOrForm, ValidatedJson};
pub use health::{health_router, ComponentHealth, ComponentStatus, HealthResponse};
pub use todos::{todos_router, Pagination, TodoRequest, TodoUpdateRequest};

/// API 라우터 생성.
///
/// 인증 라우트에는 `limiter`의 IP별 요청 제한이 적용됩니다.
pub fn create_api_router(state: Arc<AppState>, limiter: RateLimiter) -> Router<Arc<AppState>> {
    Router::new()
        .nest("/health", health_router())
        .route("/metrics", get(health::metrics_handler))
        .nest("/api/auth", auth_router(limiter))
        .nest("/api/todos", todos_router(state))
}
