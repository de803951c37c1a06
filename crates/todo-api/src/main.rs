//! 할 일 백엔드 API 서버.
//!
//! 설정을 읽어 저장소와 메일 전송기를 구성한 뒤 Axum 서버를 시작합니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use todo_api::repository::{PgTodoRepository, PgUserRepository};
use todo_api::{build_app, setup_metrics_recorder, AppState, RateLimitConfig, RateLimiter};
use todo_core::{init_logging, AppConfig, LogConfig, SharedClock, SystemClock};
use todo_notification::{LogMailer, Mailer, RelayConfig, RelayMailer};

/// 요청 제한 버킷 정리 주기.
const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// 설정에 따라 메일 전송기를 선택합니다.
fn create_mailer(config: &AppConfig) -> anyhow::Result<Arc<dyn Mailer>> {
    match &config.mail.relay_url {
        Some(url) => {
            let relay = RelayConfig::new(url, &config.mail.from_address)
                .with_from_name(&config.mail.from_name)
                .with_timeout(Duration::from_secs(config.mail.timeout_secs));
            let mailer = RelayMailer::new(relay).context("메일 릴레이 구성 실패")?;
            info!(relay = %url, "Mail relay configured");
            Ok(Arc::new(mailer))
        }
        None => {
            warn!("Mail relay not configured, confirmation emails will only be logged");
            Ok(Arc::new(LogMailer))
        }
    }
}

/// 설정에 따라 PostgreSQL 또는 메모리 저장소로 상태를 구성합니다.
async fn create_app_state(
    config: &AppConfig,
    clock: SharedClock,
    mailer: Arc<dyn Mailer>,
) -> anyhow::Result<AppState> {
    let Some(url) = &config.database.url else {
        warn!("DATABASE URL not set, using in-memory storage (data is lost on restart)");
        return Ok(AppState::in_memory(&config.auth, clock, mailer)?);
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
        .connect(url)
        .await
        .context("데이터베이스 연결 실패")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("마이그레이션 실패")?;
    info!("Database connected and migrated");

    let state = AppState::new(
        &config.auth,
        clock,
        Arc::new(PgUserRepository::new(pool.clone())),
        Arc::new(PgTodoRepository::new(pool.clone())),
        mailer,
    )?;

    Ok(state.with_db_pool(pool))
}

/// 유휴 요청 제한 버킷을 주기적으로 정리합니다.
fn spawn_rate_limit_cleanup(limiter: RateLimiter, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_CLEANUP_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => limiter.cleanup().await,
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    let config = AppConfig::load_default().context("설정 로드 실패")?;

    init_logging(LogConfig::from(&config.logging))
        .map_err(|e| anyhow::anyhow!("로깅 초기화 실패: {e}"))?;

    info!("Starting Todo API server...");

    let metrics_handle = setup_metrics_recorder().context("메트릭 레코더 설치 실패")?;
    info!("Prometheus metrics recorder initialized");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| {
            error!(
                host = %config.server.host,
                port = config.server.port,
                error = %e,
                "소켓 주소 설정이 유효하지 않습니다. TODO__SERVER__HOST, TODO__SERVER__PORT를 확인하세요."
            );
            e
        })?;

    let clock: SharedClock = Arc::new(SystemClock);
    let mailer = create_mailer(&config)?;
    let state = Arc::new(
        create_app_state(&config, clock, mailer)
            .await?
            .with_metrics(metrics_handle)
            .with_public_url(format!("http://{addr}/")),
    );

    info!(
        version = %state.version,
        has_db = state.db_pool.is_some(),
        mailer = state.mailer.name(),
        "Application state initialized"
    );

    let limiter = RateLimiter::new(
        RateLimitConfig::new(config.server.auth_requests_per_minute)
            .with_trusted_proxy(config.server.trust_proxy_headers),
    );
    let shutdown_token = CancellationToken::new();
    spawn_rate_limit_cleanup(limiter.clone(), shutdown_token.clone());

    let app = build_app(state, limiter, &config.server);

    info!(%addr, "API server listening");
    info!("Swagger UI available at http://{}/swagger-ui", addr);
    info!("Metrics available at http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_token.clone()))
    .await?;

    shutdown_token.cancel();
    info!("Server stopped gracefully");

    Ok(())
}

/// Ctrl+C 또는 SIGTERM 수신 시 종료 토큰을 취소합니다.
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    shutdown_token.cancel();
}
