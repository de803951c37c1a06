//! 할 일 백엔드 REST API 서버.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - Axum 기반 REST API
//! - 용도별 서명 토큰 인증 (Access/Refresh/이메일 확인)
//! - 리프레시 토큰 회전 및 재사용 감지
//! - 역할 기반 접근 제어
//! - 헬스 체크 엔드포인트와 Prometheus 메트릭
//!
//! # 모듈 구성
//!
//! - [`state`]: 애플리케이션 공유 상태 (AppState)
//! - [`routes`]: REST API 엔드포인트
//! - [`auth`]: 토큰, 비밀번호, 세션, 역할 게이트
//! - [`repository`]: 사용자/할 일 저장소 (PostgreSQL, 메모리)
//! - [`metrics`]: Prometheus 메트릭 수집
//! - [`middleware`]: HTTP 미들웨어
//! - [`openapi`]: OpenAPI 문서 및 Swagger UI

pub mod auth;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod openapi;
pub mod repository;
pub mod routes;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    Router,
};
use todo_core::ServerConfig;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use auth::{Claims, SessionResolver, TokenPair, TokenScope, TokenService};
pub use error::{ApiError, ApiErrorResponse, ApiResult};
pub use metrics::setup_metrics_recorder;
pub use middleware::{metrics_layer, RateLimitConfig, RateLimiter};
pub use routes::create_api_router;
pub use state::AppState;

/// CORS 레이어 구성.
///
/// origin 목록이 비어 있거나 모두 잘못된 값이면 모든 origin을 허용합니다.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let allow_origin = if parsed.is_empty() {
        warn!("No valid CORS origins configured, allowing any origin");
        AllowOrigin::any()
    } else {
        info!("CORS configured with {} allowed origins", parsed.len());
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .max_age(Duration::from_secs(3600))
}

/// 전체 애플리케이션 라우터 생성.
///
/// API 라우트, Swagger UI, 메트릭/트레이스/타임아웃/CORS 레이어를 조합합니다.
pub fn build_app(state: Arc<AppState>, limiter: RateLimiter, server: &ServerConfig) -> Router {
    create_api_router(state.clone(), limiter)
        .with_state(state)
        .merge(openapi::swagger_ui_router())
        .layer(axum::middleware::from_fn(metrics_layer))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(server.request_timeout_secs),
        ))
        .layer(cors_layer(&server.cors_origins))
}
