//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! AppState는 `Arc`로 래핑되어 여러 요청 간에 공유됩니다. 서명 설정과 저장소는
//! 시작 시 한 번 구성되며 이후 바뀌지 않습니다.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use todo_core::{AuthConfig, SharedClock};
use todo_notification::Mailer;

use crate::auth::{PasswordError, PasswordHasher, SessionResolver, TokenError, TokenService};
use crate::repository::{
    MemoryTodoRepository, MemoryUserRepository, TodoRepository, UserRepository,
};

/// 상태 구성 에러.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("토큰 서비스 구성 실패: {0}")]
    Token(#[from] TokenError),
    #[error("비밀번호 해셔 구성 실패: {0}")]
    Password(#[from] PasswordError),
}

/// 애플리케이션 공유 상태.
#[derive(Clone)]
pub struct AppState {
    /// 세션 리졸버 (토큰 서비스 + 사용자 저장소 + 해셔)
    pub sessions: SessionResolver,

    /// 사용자 저장소
    pub users: Arc<dyn UserRepository>,

    /// 할 일 저장소
    pub todos: Arc<dyn TodoRepository>,

    /// 확인 메일 전송기
    pub mailer: Arc<dyn Mailer>,

    /// 데이터베이스 연결 풀 (메모리 저장소 사용 시 None)
    pub db_pool: Option<sqlx::PgPool>,

    /// Prometheus 렌더링 핸들
    pub metrics: Option<PrometheusHandle>,

    /// Host 헤더가 없을 때 확인 링크에 사용할 기본 URL
    pub public_url: String,

    pub clock: SharedClock,

    pub started_at: chrono::DateTime<chrono::Utc>,

    pub version: String,
}

impl AppState {
    /// 저장소와 전송기로 상태를 구성합니다.
    pub fn new(
        auth: &AuthConfig,
        clock: SharedClock,
        users: Arc<dyn UserRepository>,
        todos: Arc<dyn TodoRepository>,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, StateError> {
        let tokens = Arc::new(TokenService::new(auth, clock.clone())?);
        let hasher = PasswordHasher::new(auth.hash_cost)?;

        Ok(Self {
            sessions: SessionResolver::new(tokens, users.clone(), hasher),
            users,
            todos,
            mailer,
            db_pool: None,
            metrics: None,
            public_url: "http://127.0.0.1:8000/".to_string(),
            started_at: clock.now(),
            clock,
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    /// 메모리 저장소로 상태를 구성합니다.
    pub fn in_memory(
        auth: &AuthConfig,
        clock: SharedClock,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, StateError> {
        let users = Arc::new(MemoryUserRepository::new(clock.clone()));
        let todos = Arc::new(MemoryTodoRepository::new(clock.clone()));
        Self::new(auth, clock, users, todos, mailer)
    }

    pub fn with_db_pool(mut self, pool: sqlx::PgPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn with_public_url(mut self, url: impl Into<String>) -> Self {
        let mut url = url.into();
        if !url.ends_with('/') {
            url.push('/');
        }
        self.public_url = url;
        self
    }

    pub fn tokens(&self) -> &TokenService {
        self.sessions.tokens()
    }

    /// 데이터베이스 연결 상태 확인.
    pub async fn is_db_healthy(&self) -> bool {
        match &self.db_pool {
            Some(pool) => sqlx::query("SELECT 1").execute(pool).await.is_ok(),
            None => true,
        }
    }

    /// 서버 업타임(초).
    pub fn uptime_secs(&self) -> i64 {
        (self.clock.now() - self.started_at).num_seconds()
    }
}
