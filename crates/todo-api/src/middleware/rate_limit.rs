//! Rate limiting middleware.
//!
//! 클라이언트 IP별 Token Bucket으로 인증 엔드포인트의 요청 빈도를 제한합니다.

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::counter;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::ApiError;

/// Rate Limiter 설정.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// 분당 최대 요청 수
    pub requests_per_minute: u32,
    /// 버스트 허용량 (순간적으로 허용되는 추가 요청)
    pub burst_size: u32,
    /// 유휴 버킷 정리 기준
    pub idle_timeout: Duration,
    /// 프록시 헤더(X-Forwarded-For, X-Real-IP)를 신뢰할지 여부.
    /// 신뢰할 수 있는 리버스 프록시 뒤에서만 켜야 합니다.
    pub trust_proxy_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(60)
    }
}

impl RateLimitConfig {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
            burst_size: requests_per_minute / 10,
            idle_timeout: Duration::from_secs(600),
            trust_proxy_headers: false,
        }
    }

    #[must_use]
    pub fn with_burst(mut self, burst_size: u32) -> Self {
        self.burst_size = burst_size;
        self
    }

    #[must_use]
    pub fn with_trusted_proxy(mut self, trusted: bool) -> Self {
        self.trust_proxy_headers = trusted;
        self
    }
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    max_tokens: f64,
    /// 초당 리필 토큰 수
    refill_rate: f64,
}

impl TokenBucket {
    fn new(config: &RateLimitConfig) -> Self {
        let refill_rate = f64::from(config.requests_per_minute) / 60.0;
        let max_tokens = refill_rate.max(1.0) + f64::from(config.burst_size);

        Self {
            tokens: max_tokens,
            last_refill: Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    fn try_acquire(&mut self) -> Result<(), u64> {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else if self.refill_rate > 0.0 {
            Err(((1.0 - self.tokens) / self.refill_rate).ceil() as u64)
        } else {
            Err(60)
        }
    }
}

/// IP별 Rate Limiter.
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: Arc<RwLock<HashMap<IpAddr, TokenBucket>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 요청 허용 여부 확인. 제한 시 재시도 대기 시간(초)을 반환합니다.
    pub async fn check(&self, ip: IpAddr) -> Result<(), u64> {
        let mut buckets = self.buckets.write().await;
        buckets
            .entry(ip)
            .or_insert_with(|| TokenBucket::new(&self.config))
            .try_acquire()
    }

    /// 유휴 버킷 정리.
    pub async fn cleanup(&self) {
        let idle_timeout = self.config.idle_timeout;
        let now = Instant::now();
        self.buckets
            .write()
            .await
            .retain(|_, bucket| now.duration_since(bucket.last_refill) < idle_timeout);
    }

    /// 현재 추적 중인 IP 수.
    pub async fn tracked_ips(&self) -> usize {
        self.buckets.read().await.len()
    }
}

/// Rate Limiting 미들웨어 함수.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let ip = extract_client_ip(&request, limiter.config.trust_proxy_headers);

    match limiter.check(ip).await {
        Ok(()) => {
            counter!("rate_limit_requests_total", "status" => "allowed").increment(1);
            next.run(request).await
        }
        Err(retry_after) => {
            counter!("rate_limit_requests_total", "status" => "limited").increment(1);
            tracing::warn!(client_ip = %ip, retry_after, "Rate limit exceeded");
            ApiError::RateLimited { retry_after }.into_response()
        }
    }
}

/// 요청에서 클라이언트 IP 추출.
///
/// `trust_proxy_headers`가 켜져 있으면 X-Forwarded-For, X-Real-IP를 먼저 확인합니다.
/// 꺼져 있으면 클라이언트가 보낸 헤더는 무시하고 연결 주소만 사용합니다.
fn extract_client_ip(request: &Request, trust_proxy_headers: bool) -> IpAddr {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    if !trust_proxy_headers {
        return peer.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    let headers = request.headers();

    let forwarded: Option<IpAddr> = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse().ok());

    let real_ip = || -> Option<IpAddr> {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|ip| ip.trim().parse().ok())
    };

    forwarded
        .or_else(real_ip)
        .or(peer)
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}
