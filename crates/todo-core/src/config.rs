//! 설정 관리.
//!
//! 이 모듈은 애플리케이션 설정을 정의하고 관리합니다.
//! 로드 순서: 내장 기본값 → TOML 파일(선택) → `TODO__` 접두사 환경 변수.

use std::path::Path;

use chrono::Duration;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

/// 이메일 확인 토큰 수명 (초). 설정으로 바꿀 수 없습니다.
pub const CONFIRM_TTL_SECS: i64 = 86_400;

/// 토큰 수명 상한 (초, 10년).
pub const MAX_TTL_SECS: i64 = 10 * 365 * 86_400;

/// 지원하는 서명 알고리즘 (HMAC 계열).
pub const SUPPORTED_ALGORITHMS: [&str; 3] = ["HS256", "HS384", "HS512"];

/// 설정 에러.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("설정 로드 실패: {0}")]
    Load(#[from] config::ConfigError),

    #[error("잘못된 설정 값 ({key}): {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// 애플리케이션 설정.
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// 서버 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 데이터베이스 설정
    #[serde(default)]
    pub database: DatabaseConfig,
    /// 인증 설정
    pub auth: AuthConfig,
    /// 메일 설정
    #[serde(default)]
    pub mail: MailConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
    /// 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// CORS 허용 origin 목록
    pub cors_origins: Vec<String>,
    /// 인증 엔드포인트의 분당 요청 한도 (IP별)
    pub auth_requests_per_minute: u32,
    /// 요청 제한 시 X-Forwarded-For/X-Real-IP를 신뢰할지 여부 (리버스 프록시 뒤에서만)
    pub trust_proxy_headers: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            request_timeout_secs: 30,
            cors_origins: vec![
                "http://localhost".to_string(),
                "http://localhost:8080".to_string(),
            ],
            auth_requests_per_minute: 60,
            trust_proxy_headers: false,
        }
    }
}

/// 데이터베이스 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL 연결 URL. 없으면 인메모리 저장소를 사용합니다.
    pub url: Option<String>,
    /// 최대 연결 수
    pub max_connections: u32,
    /// 연결 타임아웃 (초)
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            connect_timeout_secs: 5,
        }
    }
}

/// 비밀번호 해싱 비용 (Argon2id 파라미터).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PasswordCost {
    /// 메모리 사용량 (KiB)
    pub memory_kib: u32,
    /// 반복 횟수
    pub iterations: u32,
    /// 병렬도
    pub parallelism: u32,
}

impl Default for PasswordCost {
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl PasswordCost {
    /// 테스트용 최소 비용.
    pub fn minimal() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }
}

/// 인증 설정.
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    /// 토큰 서명 키
    #[serde(deserialize_with = "deserialize_secret")]
    pub secret_key: SecretString,
    /// 서명 알고리즘 (HS256, HS384, HS512)
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    /// Access Token 수명 (초)
    #[serde(default = "default_access_ttl")]
    pub access_ttl_secs: i64,
    /// Refresh Token 수명 (초)
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_secs: i64,
    /// 비밀번호 해싱 비용
    #[serde(default)]
    pub hash_cost: PasswordCost,
}

fn default_algorithm() -> String {
    "HS256".to_string()
}
fn default_access_ttl() -> i64 {
    15 * 60
}
fn default_refresh_ttl() -> i64 {
    7 * 24 * 60 * 60
}

/// 초 단위 수명을 검증된 `Duration`으로 변환합니다.
pub fn ttl_from_secs(secs: i64) -> Option<Duration> {
    if (1..=MAX_TTL_SECS).contains(&secs) {
        Duration::try_seconds(secs)
    } else {
        None
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

impl AuthConfig {
    /// 기본 수명/알고리즘으로 인증 설정 생성.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        let secret: String = secret.into();
        Self {
            secret_key: SecretString::from(secret),
            algorithm: default_algorithm(),
            access_ttl_secs: default_access_ttl(),
            refresh_ttl_secs: default_refresh_ttl(),
            hash_cost: PasswordCost::default(),
        }
    }

    pub fn with_hash_cost(mut self, cost: PasswordCost) -> Self {
        self.hash_cost = cost;
        self
    }

    pub fn with_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithm = algorithm.into();
        self
    }

    /// Access Token 기본 수명. 범위(1초 ~ [`MAX_TTL_SECS`])를 벗어나면 `None`.
    pub fn access_ttl(&self) -> Option<Duration> {
        ttl_from_secs(self.access_ttl_secs)
    }

    /// Refresh Token 기본 수명. 범위를 벗어나면 `None`.
    pub fn refresh_ttl(&self) -> Option<Duration> {
        ttl_from_secs(self.refresh_ttl_secs)
    }

    /// 이메일 확인 토큰 수명 (고정 1일).
    pub fn confirm_ttl(&self) -> Duration {
        Duration::seconds(CONFIRM_TTL_SECS)
    }

    /// 설정 값 검증.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret_key.expose_secret().trim().is_empty() {
            return Err(ConfigError::invalid("auth.secret_key", "비어 있을 수 없습니다"));
        }
        if !SUPPORTED_ALGORITHMS.contains(&self.algorithm.as_str()) {
            return Err(ConfigError::invalid(
                "auth.algorithm",
                format!("지원하지 않는 알고리즘: {}", self.algorithm),
            ));
        }
        if self.access_ttl().is_none() {
            return Err(ConfigError::invalid(
                "auth.access_ttl_secs",
                format!("1 ~ {MAX_TTL_SECS} 범위여야 합니다"),
            ));
        }
        if self.refresh_ttl().is_none() {
            return Err(ConfigError::invalid(
                "auth.refresh_ttl_secs",
                format!("1 ~ {MAX_TTL_SECS} 범위여야 합니다"),
            ));
        }
        let cost = self.hash_cost;
        if cost.iterations == 0 || cost.parallelism == 0 {
            return Err(ConfigError::invalid(
                "auth.hash_cost",
                "iterations와 parallelism은 1 이상이어야 합니다",
            ));
        }
        if cost.memory_kib < 8 * cost.parallelism {
            return Err(ConfigError::invalid(
                "auth.hash_cost.memory_kib",
                "parallelism × 8 KiB 이상이어야 합니다",
            ));
        }
        Ok(())
    }
}

/// 메일 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// HTTP 메일 릴레이 URL. 없으면 메일을 로그로만 남깁니다.
    pub relay_url: Option<String>,
    /// 발신 주소
    pub from_address: String,
    /// 발신자 이름
    pub from_name: String,
    /// 릴레이 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            relay_url: None,
            from_address: "noreply@example.com".to_string(),
            from_name: "Todo Systems".to_string(),
            timeout_secs: 10,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨 필터 (예: "info", "todo_api=debug")
    pub level: String,
    /// 출력 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없으면 무시하고 기본값과 환경 변수만 사용합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let builder = config::Config::builder()
            // 파일에서 로드
            .add_source(config::File::from(path.as_ref()).required(false))
            // 환경 변수로 오버라이드
            .add_source(
                config::Environment::with_prefix("TODO")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .try_parsing(true),
            );

        Self::finish(builder.build()?)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load("config/default.toml")
    }

    /// TOML 문자열에서 설정을 로드합니다.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?;

        Self::finish(config)
    }

    fn finish(config: config::Config) -> Result<Self, ConfigError> {
        let app: AppConfig = config.try_deserialize()?;
        app.auth.validate()?;
        Ok(app)
    }
}
