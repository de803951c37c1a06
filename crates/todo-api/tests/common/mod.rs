//! 통합 테스트 공용 헬퍼.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use serde_json::Value;
use todo_api::{build_app, AppState, RateLimitConfig, RateLimiter, TokenPair};
use todo_core::{AuthConfig, ManualClock, PasswordCost, Role, ServerConfig, SharedClock};
use todo_notification::MemoryMailer;
use tower::ServiceExt;

pub const PASSWORD: &str = "Secret123!";

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub mailer: Arc<MemoryMailer>,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_rate_limit(RateLimitConfig::new(6_000).with_burst(1_000))
    }

    pub fn with_rate_limit(config: RateLimitConfig) -> Self {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ));
        let shared: SharedClock = clock.clone();
        let mailer = Arc::new(MemoryMailer::new());
        let auth = AuthConfig::with_secret("integration-test-secret-key-minimum-32-chars")
            .with_hash_cost(PasswordCost::minimal());

        let state = Arc::new(AppState::in_memory(&auth, shared, mailer.clone()).unwrap());
        let router = build_app(
            state.clone(),
            RateLimiter::new(config),
            &ServerConfig::default(),
        );

        Self {
            router,
            state,
            mailer,
            clock,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn signup(&self, username: &str, email: &str) -> Response<Body> {
        let body = serde_json::json!({
            "username": username,
            "email": email,
            "password": PASSWORD,
        });
        self.send(json_request("POST", "/api/auth/signup", &body)).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Response<Body> {
        let form = format!("username={}&password={}", email.replace('@', "%40"), password.replace('!', "%21"));
        let request = Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form))
            .unwrap();
        self.send(request).await
    }

    /// 확인 메일이 도착할 때까지 기다린 뒤 토큰을 반환합니다.
    pub async fn confirmation_token(&self, email: &str) -> String {
        for _ in 0..100 {
            if let Some(mail) = self.mailer.last_for(email) {
                return mail.token;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no confirmation email for {email}");
    }

    /// 가입 → 이메일 확인 → 로그인까지 마친 토큰 페어.
    pub async fn confirmed_session(&self, username: &str, email: &str) -> TokenPair {
        assert_eq!(self.signup(username, email).await.status(), StatusCode::CREATED);

        let token = self.confirmation_token(email).await;
        let confirm = self
            .send(get(&format!("/api/auth/confirmed_email/{token}"), None))
            .await;
        assert_eq!(confirm.status(), StatusCode::OK);

        let response = self.login(email, PASSWORD).await;
        assert_eq!(response.status(), StatusCode::OK);
        serde_json::from_value(body_json(response).await).unwrap()
    }

    pub async fn set_role(&self, email: &str, role: Role) {
        let mut user = self
            .state
            .users
            .find_by_email(email)
            .await
            .unwrap()
            .unwrap();
        user.role = role;
        self.state.users.save(&user).await.unwrap();
    }
}

pub fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
    with_bearer(Request::builder().method("GET").uri(uri), bearer)
        .body(Body::empty())
        .unwrap()
}

pub fn delete(uri: &str, bearer: Option<&str>) -> Request<Body> {
    with_bearer(Request::builder().method("DELETE").uri(uri), bearer)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    authed_json(method, uri, body, None)
}

pub fn authed_json(method: &str, uri: &str, body: &Value, bearer: Option<&str>) -> Request<Body> {
    with_bearer(Request::builder().method(method).uri(uri), bearer)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn with_bearer(builder: axum::http::request::Builder, bearer: Option<&str>) -> axum::http::request::Builder {
    match bearer {
        Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
        None => builder,
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
