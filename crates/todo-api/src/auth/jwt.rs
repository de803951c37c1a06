//! 토큰 발급 및 검증.
//!
//! Access / Refresh / 이메일 확인 토큰을 JWS compact 형식으로 발급합니다.
//! 서명 검증은 `jsonwebtoken`이, 만료 판정은 주입된 [`Clock`]이 담당하므로
//! 테스트에서 초 단위로 만료를 재현할 수 있습니다.
//!
//! [`Clock`]: todo_core::Clock

use std::str::FromStr;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use todo_core::{AuthConfig, SharedClock};
use tracing::debug;

use crate::metrics;

/// 등록된 클레임 이름. 호출자가 넘긴 추가 클레임에서 제거됩니다.
const REGISTERED_CLAIMS: [&str; 8] = ["sub", "scope", "iat", "exp", "jti", "nbf", "iss", "aud"];

/// 토큰 용도.
///
/// 서로 겹치지 않으며, 한 용도로 발급된 토큰은 다른 용도로 사용할 수 없습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenScope {
    Access,
    Refresh,
    EmailConfirmation,
}

impl TokenScope {
    /// `scope` 클레임 값.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenScope::Access => "access_token",
            TokenScope::Refresh => "refresh_token",
            TokenScope::EmailConfirmation => "email_token",
        }
    }
}

impl std::fmt::Display for TokenScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 토큰 페이로드.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - 사용자 이메일
    pub sub: String,
    /// 토큰 용도
    pub scope: String,
    /// Issued At (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    /// JWT ID - 같은 초에 발급된 토큰도 서로 다르게 만듭니다
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    /// 호출자가 넣은 보조 클레임 (권한 판단에 사용하지 않음)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 발급된 토큰.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// 인코딩된 토큰 문자열
    pub token: String,
    pub scope: TokenScope,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IssuedToken {
    /// 남은 수명 (초).
    pub fn expires_in(&self) -> i64 {
        (self.expires_at - self.issued_at).num_seconds()
    }
}

/// Access Token + Refresh Token 페어.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// 항상 "bearer"
    pub token_type: String,
    /// Access Token 수명 (초)
    pub expires_in: i64,
}

impl TokenPair {
    pub fn new(access: IssuedToken, refresh: IssuedToken) -> Self {
        Self {
            expires_in: access.expires_in(),
            access_token: access.token,
            refresh_token: refresh.token,
            token_type: "bearer".to_string(),
        }
    }
}

/// 토큰 에러.
///
/// 검증 실패 세 가지(`InvalidSignature`, `Expired`, `ScopeMismatch`)는
/// 내부 로그에서만 구분하고, 응답에서는 하나로 합칩니다.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("지원하지 않는 서명 알고리즘: {0}")]
    UnsupportedAlgorithm(String),
    #[error("토큰 수명이 허용 범위를 벗어났습니다")]
    InvalidLifetime,
    #[error("토큰 인코딩 실패: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),
    #[error("서명이 유효하지 않거나 형식이 잘못된 토큰")]
    InvalidSignature,
    #[error("토큰이 만료되었습니다")]
    Expired,
    #[error("토큰 용도 불일치 (expected {expected}, got {actual})")]
    ScopeMismatch {
        expected: TokenScope,
        actual: String,
    },
}

impl TokenError {
    /// 검증 실패 여부 (외부에는 인증 실패로만 노출).
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            TokenError::InvalidSignature | TokenError::Expired | TokenError::ScopeMismatch { .. }
        )
    }

    /// 로그/메트릭용 사유 코드.
    pub fn reason(&self) -> &'static str {
        match self {
            TokenError::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            TokenError::InvalidLifetime => "invalid_lifetime",
            TokenError::Encoding(_) => "encoding",
            TokenError::InvalidSignature => "invalid_signature",
            TokenError::Expired => "expired",
            TokenError::ScopeMismatch { .. } => "scope_mismatch",
        }
    }
}

/// 토큰 서비스.
///
/// 서명 키와 알고리즘은 생성 시 고정되며 이후 변경되지 않습니다.
/// 여러 요청에서 `Arc`로 공유해 사용합니다.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    header: Header,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
    confirm_ttl: Duration,
    clock: SharedClock,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("algorithm", &self.header.alg)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// 인증 설정으로 토큰 서비스를 생성합니다.
    pub fn new(config: &AuthConfig, clock: SharedClock) -> Result<Self, TokenError> {
        let algorithm = Algorithm::from_str(&config.algorithm)
            .ok()
            .filter(|alg| matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512))
            .ok_or_else(|| TokenError::UnsupportedAlgorithm(config.algorithm.clone()))?;

        let access_ttl = config.access_ttl().ok_or(TokenError::InvalidLifetime)?;
        let refresh_ttl = config.refresh_ttl().ok_or(TokenError::InvalidLifetime)?;

        let secret = config.secret_key.expose_secret().as_bytes();

        // 만료는 clock 기준으로 직접 판정
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "exp"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            header: Header::new(algorithm),
            validation,
            access_ttl,
            refresh_ttl,
            confirm_ttl: config.confirm_ttl(),
            clock,
        })
    }

    /// Access Token 기본 수명.
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Refresh Token 기본 수명.
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Access Token 발급.
    ///
    /// `extra`는 토큰 본문에 병합되는 보조 데이터이며, 등록된 클레임과 같은
    /// 키는 버려집니다.
    pub fn issue_access(
        &self,
        subject: &str,
        extra: Option<Map<String, Value>>,
        lifetime: Option<Duration>,
    ) -> Result<IssuedToken, TokenError> {
        let lifetime = lifetime.unwrap_or(self.access_ttl);
        self.issue(subject, TokenScope::Access, extra.unwrap_or_default(), lifetime)
    }

    /// Refresh Token 발급.
    pub fn issue_refresh(
        &self,
        subject: &str,
        lifetime: Option<Duration>,
    ) -> Result<IssuedToken, TokenError> {
        let lifetime = lifetime.unwrap_or(self.refresh_ttl);
        self.issue(subject, TokenScope::Refresh, Map::new(), lifetime)
    }

    /// 이메일 확인 토큰 발급 (수명 1일 고정).
    pub fn issue_email_confirmation(&self, subject: &str) -> Result<IssuedToken, TokenError> {
        self.issue(
            subject,
            TokenScope::EmailConfirmation,
            Map::new(),
            self.confirm_ttl,
        )
    }

    fn issue(
        &self,
        subject: &str,
        scope: TokenScope,
        mut extra: Map<String, Value>,
        lifetime: Duration,
    ) -> Result<IssuedToken, TokenError> {
        if lifetime <= Duration::zero() {
            return Err(TokenError::InvalidLifetime);
        }

        for key in REGISTERED_CLAIMS {
            extra.remove(key);
        }

        let now = self.clock.now();
        let expires_at = now
            .checked_add_signed(lifetime)
            .ok_or(TokenError::InvalidLifetime)?;
        let claims = Claims {
            sub: subject.to_string(),
            scope: scope.as_str().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Some(uuid::Uuid::new_v4().to_string()),
            extra,
        };

        let token = encode(&self.header, &claims, &self.encoding_key).map_err(TokenError::Encoding)?;
        metrics::record_token_issued(scope);

        Ok(IssuedToken {
            token,
            scope,
            issued_at: timestamp_to_datetime(claims.iat),
            expires_at: timestamp_to_datetime(claims.exp),
        })
    }

    /// 토큰을 디코딩하고 서명, 만료, 용도를 검증합니다.
    pub fn decode(&self, token: &str, expected: TokenScope) -> Result<Claims, TokenError> {
        let result = self.decode_inner(token, expected);

        if let Err(e) = &result {
            debug!(reason = e.reason(), expected = %expected, "Token verification failed");
            metrics::record_verification_failure(e.reason());
        }

        result
    }

    /// 토큰을 검증하고 subject를 반환합니다.
    pub fn verify(&self, token: &str, expected: TokenScope) -> Result<String, TokenError> {
        self.decode(token, expected).map(|claims| claims.sub)
    }

    fn decode_inner(&self, token: &str, expected: TokenScope) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| TokenError::InvalidSignature)?
            .claims;

        if claims.iat > claims.exp {
            return Err(TokenError::InvalidSignature);
        }

        if self.clock.now().timestamp() > claims.exp {
            return Err(TokenError::Expired);
        }

        if claims.scope != expected.as_str() {
            return Err(TokenError::ScopeMismatch {
                expected,
                actual: claims.scope,
            });
        }

        Ok(claims)
    }
}

fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).single().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use todo_core::{ManualClock, SystemClock};

    const TEST_SECRET: &str = "test-secret-key-for-jwt-testing-minimum-32-chars";

    fn service() -> TokenService {
        TokenService::new(&AuthConfig::with_secret(TEST_SECRET), Arc::new(SystemClock)).unwrap()
    }

    fn service_with_clock(clock: Arc<ManualClock>) -> TokenService {
        TokenService::new(&AuthConfig::with_secret(TEST_SECRET), clock).unwrap()
    }

    #[test]
    fn test_issue_and_verify_each_scope() {
        let service = service();

        let access = service.issue_access("alice@example.com", None, None).unwrap();
        let refresh = service.issue_refresh("alice@example.com", None).unwrap();
        let confirm = service.issue_email_confirmation("alice@example.com").unwrap();

        assert_eq!(
            service.verify(&access.token, TokenScope::Access).unwrap(),
            "alice@example.com"
        );
        assert_eq!(
            service.verify(&refresh.token, TokenScope::Refresh).unwrap(),
            "alice@example.com"
        );
        assert_eq!(
            service
                .verify(&confirm.token, TokenScope::EmailConfirmation)
                .unwrap(),
            "alice@example.com"
        );
    }

    #[test]
    fn test_default_lifetimes() {
        let service = service();

        let access = service.issue_access("a@b.c", None, None).unwrap();
        let refresh = service.issue_refresh("a@b.c", None).unwrap();
        let confirm = service.issue_email_confirmation("a@b.c").unwrap();

        assert_eq!(access.expires_at - access.issued_at, Duration::minutes(15));
        assert_eq!(refresh.expires_at - refresh.issued_at, Duration::days(7));
        assert_eq!(confirm.expires_at - confirm.issued_at, Duration::days(1));
        assert_eq!(access.expires_in(), 900);
    }

    #[test]
    fn test_lifetime_override() {
        let service = service();
        let access = service
            .issue_access("a@b.c", None, Some(Duration::seconds(30)))
            .unwrap();
        assert_eq!(access.expires_in(), 30);

        let refresh = service
            .issue_refresh("a@b.c", Some(Duration::hours(1)))
            .unwrap();
        assert_eq!(refresh.expires_in(), 3600);

        assert!(matches!(
            service.issue_access("a@b.c", None, Some(Duration::zero())),
            Err(TokenError::InvalidLifetime)
        ));
    }

    #[test]
    fn test_out_of_range_lifetimes_are_rejected() {
        let mut config = AuthConfig::with_secret(TEST_SECRET);
        config.access_ttl_secs = i64::MAX;
        assert!(matches!(
            TokenService::new(&config, Arc::new(SystemClock)),
            Err(TokenError::InvalidLifetime)
        ));

        // 날짜 범위를 넘는 수명은 패닉 없이 거부
        let service = service();
        assert!(matches!(
            service.issue_access("a@b.c", None, Some(Duration::days(365 * 300_000))),
            Err(TokenError::InvalidLifetime)
        ));
        assert!(matches!(
            service.issue_refresh("a@b.c", Some(Duration::weeks(52 * 300_000))),
            Err(TokenError::InvalidLifetime)
        ));
    }

    #[test]
    fn test_scope_isolation() {
        let service = service();
        let access = service.issue_access("a@b.c", None, None).unwrap();
        let refresh = service.issue_refresh("a@b.c", None).unwrap();
        let confirm = service.issue_email_confirmation("a@b.c").unwrap();

        assert!(matches!(
            service.verify(&refresh.token, TokenScope::Access),
            Err(TokenError::ScopeMismatch { .. })
        ));
        assert!(matches!(
            service.verify(&access.token, TokenScope::Refresh),
            Err(TokenError::ScopeMismatch { .. })
        ));
        assert!(matches!(
            service.verify(&confirm.token, TokenScope::Access),
            Err(TokenError::ScopeMismatch { .. })
        ));
        assert!(matches!(
            service.verify(&access.token, TokenScope::EmailConfirmation),
            Err(TokenError::ScopeMismatch { .. })
        ));
    }

    #[test]
    fn test_access_token_expiry_boundary() {
        let t0 = Utc::now();
        let clock = Arc::new(ManualClock::new(t0));
        let service = service_with_clock(clock.clone());

        let token = service
            .issue_access("alice@example.com", None, Some(Duration::minutes(15)))
            .unwrap();

        clock.set(t0 + Duration::minutes(14) + Duration::seconds(59));
        assert_eq!(
            service.verify(&token.token, TokenScope::Access).unwrap(),
            "alice@example.com"
        );

        clock.set(t0 + Duration::minutes(15) + Duration::seconds(1));
        assert!(matches!(
            service.verify(&token.token, TokenScope::Access),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_confirmation_token_expires_after_one_day() {
        let t0 = Utc::now();
        let clock = Arc::new(ManualClock::new(t0));
        let service = service_with_clock(clock.clone());

        let token = service.issue_email_confirmation("a@b.c").unwrap();
        clock.advance(Duration::hours(23));
        assert!(service
            .verify(&token.token, TokenScope::EmailConfirmation)
            .is_ok());

        clock.advance(Duration::hours(2));
        assert!(matches!(
            service.verify(&token.token, TokenScope::EmailConfirmation),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_extra_claims_cannot_override_registered() {
        let service = service();
        let mut extra = Map::new();
        extra.insert("username".to_string(), Value::from("alice"));
        extra.insert("scope".to_string(), Value::from("refresh_token"));
        extra.insert("sub".to_string(), Value::from("mallory@example.com"));
        extra.insert("exp".to_string(), Value::from(i64::MAX));

        let token = service
            .issue_access("alice@example.com", Some(extra), None)
            .unwrap();
        let claims = service.decode(&token.token, TokenScope::Access).unwrap();

        assert_eq!(claims.sub, "alice@example.com");
        assert_eq!(claims.scope, "access_token");
        assert_eq!(claims.exp, token.expires_at.timestamp());
        assert_eq!(claims.extra.get("username"), Some(&Value::from("alice")));
        assert!(!claims.extra.contains_key("scope"));
    }

    #[test]
    fn test_tokens_issued_together_differ() {
        let service = service();
        let a = service.issue_refresh("a@b.c", None).unwrap();
        let b = service.issue_refresh("a@b.c", None).unwrap();
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_wrong_secret() {
        let token = service().issue_access("a@b.c", None, None).unwrap();

        let other = TokenService::new(
            &AuthConfig::with_secret("wrong-secret-key-for-testing-minimum-32-chars"),
            Arc::new(SystemClock),
        )
        .unwrap();
        assert!(matches!(
            other.verify(&token.token, TokenScope::Access),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn test_algorithm_is_enforced() {
        let hs256 = service();
        let hs512 = TokenService::new(
            &AuthConfig::with_secret(TEST_SECRET).with_algorithm("HS512"),
            Arc::new(SystemClock),
        )
        .unwrap();

        let token = hs512.issue_access("a@b.c", None, None).unwrap();
        assert!(hs512.verify(&token.token, TokenScope::Access).is_ok());
        assert!(matches!(
            hs256.verify(&token.token, TokenScope::Access),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn test_unsupported_algorithm() {
        let result = TokenService::new(
            &AuthConfig::with_secret(TEST_SECRET).with_algorithm("RS256"),
            Arc::new(SystemClock),
        );
        assert!(matches!(result, Err(TokenError::UnsupportedAlgorithm(_))));
    }

    #[test]
    fn test_malformed_tokens() {
        let service = service();
        for token in ["", "invalid.token.here", "a.b", "Bearer xyz"] {
            assert!(matches!(
                service.verify(token, TokenScope::Access),
                Err(TokenError::InvalidSignature)
            ));
        }
    }

    #[test]
    fn test_error_reasons() {
        assert!(TokenError::Expired.is_verification_failure());
        assert!(!TokenError::InvalidLifetime.is_verification_failure());
        assert_eq!(TokenError::InvalidSignature.reason(), "invalid_signature");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_round_trip_returns_subject(subject in "[a-z0-9._%+-]{1,20}@[a-z0-9-]{1,12}\\.[a-z]{2,4}") {
            let service = service();
            let token = service.issue_access(&subject, None, None).unwrap();
            prop_assert_eq!(service.verify(&token.token, TokenScope::Access).unwrap(), subject);
        }

        #[test]
        fn prop_tampering_any_byte_invalidates(index in any::<prop::sample::Index>(), replacement in any::<u8>()) {
            let service = service();
            let token = service.issue_refresh("alice@example.com", None).unwrap().token;
            let mut bytes = token.clone().into_bytes();
            let i = index.index(bytes.len());
            prop_assume!(bytes[i] != replacement);
            bytes[i] = replacement;

            let tampered = String::from_utf8_lossy(&bytes).into_owned();
            prop_assume!(tampered != token);
            prop_assert!(service.verify(&tampered, TokenScope::Refresh).is_err());
        }
    }
}
