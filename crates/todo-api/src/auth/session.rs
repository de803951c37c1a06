//! 세션 해석 및 리프레시 토큰 회전.
//!
//! Bearer 토큰을 사용자로 해석하고, 로그인/토큰 회전/이메일 확인을 처리합니다.
//! 요청 간에 공유되는 가변 상태는 사용자 레코드에 저장된 리프레시 토큰뿐이며,
//! 회전은 저장소의 조건부 쓰기로 직렬화됩니다.

use std::sync::Arc;

use serde_json::{Map, Value};
use todo_core::{auth_span, User};
use tracing::{debug, info, warn, Instrument};

use super::jwt::{TokenPair, TokenScope, TokenService};
use super::password::PasswordHasher;
use crate::error::ApiError;
use crate::metrics;
use crate::repository::UserRepository;

/// 이메일 확인 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// 이번 요청으로 확인됨
    Confirmed,
    /// 이미 확인된 상태 (변경 없음)
    AlreadyConfirmed,
}

/// 세션 리졸버.
///
/// 토큰 서비스와 사용자 저장소를 생성자에서 받아, 테스트에서 가짜 구현으로
/// 교체할 수 있습니다. 조회 결과는 캐시하지 않습니다.
#[derive(Clone)]
pub struct SessionResolver {
    tokens: Arc<TokenService>,
    users: Arc<dyn UserRepository>,
    hasher: PasswordHasher,
}

impl SessionResolver {
    pub fn new(
        tokens: Arc<TokenService>,
        users: Arc<dyn UserRepository>,
        hasher: PasswordHasher,
    ) -> Self {
        Self {
            tokens,
            users,
            hasher,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    /// Access Token으로 현재 사용자를 해석합니다.
    ///
    /// 토큰 검증 실패와 존재하지 않는 subject는 구분되지 않습니다.
    pub async fn resolve_current_user(&self, bearer: &str) -> Result<User, ApiError> {
        let email = self.tokens.verify(bearer, TokenScope::Access)?;

        self.users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| {
                debug!("Access token subject has no matching user");
                ApiError::Unauthenticated
            })
    }

    /// 이메일/비밀번호로 로그인하고 토큰 페어를 발급합니다.
    ///
    /// 발급된 리프레시 토큰은 사용자 레코드에 저장되어 이전 세션을 대체합니다.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, ApiError> {
        async {
            let Some(user) = self.users.find_by_email(email).await? else {
                metrics::record_login("unknown_user");
                return Err(ApiError::InvalidCredentials);
            };

            if !self.verify_password(password, &user.password_hash).await? {
                metrics::record_login("wrong_password");
                return Err(ApiError::InvalidCredentials);
            }

            if !user.confirmed {
                metrics::record_login("unconfirmed");
                return Err(ApiError::EmailNotConfirmed);
            }

            let mut claims = Map::new();
            claims.insert("username".to_string(), Value::from(user.username.clone()));

            let access = self.tokens.issue_access(&user.email, Some(claims), None)?;
            let refresh = self.tokens.issue_refresh(&user.email, None)?;

            self.users
                .set_refresh_token(user.id, Some(&refresh.token))
                .await?;

            metrics::record_login("success");
            info!(user_id = user.id, "User logged in");
            Ok::<_, ApiError>(TokenPair::new(access, refresh))
        }
        .instrument(auth_span!("login", email))
        .await
    }

    /// 리프레시 토큰을 회전합니다.
    ///
    /// 제시된 토큰이 저장된 토큰과 다르면 재사용으로 보고 세션을 폐기합니다.
    /// 같은 토큰으로 동시에 회전하면 한쪽만 성공하고, 진 쪽은 세션을 폐기합니다.
    pub async fn rotate_refresh(&self, presented: &str) -> Result<TokenPair, ApiError> {
        async {
            let email = self.tokens.verify(presented, TokenScope::Refresh)?;

            let user = self
                .users
                .find_by_email(&email)
                .await?
                .ok_or(ApiError::Unauthenticated)?;

            if !user.holds_refresh_token(presented) {
                return Err(self.revoke(&user).await);
            }

            let access = self.tokens.issue_access(&user.email, None, None)?;
            let refresh = self.tokens.issue_refresh(&user.email, None)?;

            let swapped = self
                .users
                .swap_refresh_token(user.id, presented, Some(&refresh.token))
                .await?;
            if !swapped {
                return Err(self.revoke(&user).await);
            }

            debug!(user_id = user.id, "Refresh token rotated");
            Ok::<_, ApiError>(TokenPair::new(access, refresh))
        }
        .instrument(auth_span!("rotate_refresh"))
        .await
    }

    /// 재사용이 감지된 세션 폐기.
    async fn revoke(&self, user: &User) -> ApiError {
        warn!(user_id = user.id, "Refresh token reuse detected, revoking session");
        metrics::record_refresh_reuse();

        match self.users.clear_refresh_token(user.id).await {
            Ok(()) => ApiError::Unauthenticated,
            Err(e) => e.into(),
        }
    }

    /// 이메일 확인 토큰으로 계정을 확인합니다. 여러 번 호출해도 결과는 같습니다.
    pub async fn confirm_email(&self, token: &str) -> Result<ConfirmOutcome, ApiError> {
        async {
            let email = self.tokens.verify(token, TokenScope::EmailConfirmation)?;

            let mut user = self
                .users
                .find_by_email(&email)
                .await?
                .ok_or_else(|| ApiError::not_found("User not found"))?;

            if user.confirmed {
                return Ok(ConfirmOutcome::AlreadyConfirmed);
            }

            user.confirmed = true;
            self.users.save(&user).await?;

            info!(user_id = user.id, "Email confirmed");
            Ok::<_, ApiError>(ConfirmOutcome::Confirmed)
        }
        .instrument(auth_span!("confirm_email"))
        .await
    }

    /// 비밀번호 해싱 (블로킹 풀에서 실행).
    pub async fn hash_password(&self, password: &str) -> Result<String, ApiError> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();

        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?
            .map_err(ApiError::from)
    }

    async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, ApiError> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();
        let hash = hash.to_owned();

        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{MemoryUserRepository, RepositoryResult};
    use async_trait::async_trait;
    use tokio::sync::Barrier;
    use todo_core::{AuthConfig, NewUser, PasswordCost, Role, SystemClock};

    struct Fixture {
        sessions: SessionResolver,
        users: Arc<MemoryUserRepository>,
    }

    /// 이메일 조회 직후 배리어들을 차례로 기다리는 저장소.
    ///
    /// 조회한 레코드가 낡은 상태에서 다른 쓰기가 끼어드는 상황을 재현합니다.
    struct GatedUsers {
        inner: Arc<MemoryUserRepository>,
        gates: Vec<Arc<Barrier>>,
    }

    #[async_trait]
    impl UserRepository for GatedUsers {
        async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
            let user = self.inner.find_by_email(email).await?;
            for gate in &self.gates {
                gate.wait().await;
            }
            Ok(user)
        }

        async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>> {
            self.inner.find_by_id(id).await
        }

        async fn create(&self, new_user: NewUser) -> RepositoryResult<User> {
            self.inner.create(new_user).await
        }

        async fn save(&self, user: &User) -> RepositoryResult<()> {
            self.inner.save(user).await
        }

        async fn swap_refresh_token(
            &self,
            id: i64,
            expected: &str,
            new: Option<&str>,
        ) -> RepositoryResult<bool> {
            self.inner.swap_refresh_token(id, expected, new).await
        }

        async fn set_refresh_token(&self, id: i64, token: Option<&str>) -> RepositoryResult<()> {
            self.inner.set_refresh_token(id, token).await
        }

        async fn clear_refresh_token(&self, id: i64) -> RepositoryResult<()> {
            self.inner.clear_refresh_token(id).await
        }
    }

    fn tokens() -> Arc<TokenService> {
        let config = AuthConfig::with_secret("session-test-secret-key-minimum-32-chars");
        Arc::new(TokenService::new(&config, Arc::new(SystemClock)).unwrap())
    }

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(PasswordCost::minimal()).unwrap()
    }

    async fn fixture() -> Fixture {
        let users = Arc::new(MemoryUserRepository::new(Arc::new(SystemClock)));

        Fixture {
            sessions: SessionResolver::new(tokens(), users.clone(), hasher()),
            users,
        }
    }

    /// 같은 사용자 저장소 위에 조회를 멈추는 세션 리졸버를 만듭니다.
    fn gated(f: &Fixture, gates: Vec<Arc<Barrier>>) -> SessionResolver {
        let users = Arc::new(GatedUsers {
            inner: f.users.clone(),
            gates,
        });
        SessionResolver::new(f.sessions.tokens.clone(), users, hasher())
    }

    async fn register(f: &Fixture, email: &str, confirmed: bool) -> User {
        let hash = f.sessions.hash_password("Secret123!").await.unwrap();
        let mut user = f
            .users
            .create(NewUser::new("alice", email, hash))
            .await
            .unwrap();
        user.confirmed = confirmed;
        f.users.save(&user).await.unwrap();
        user
    }

    #[tokio::test]
    async fn test_login_issues_pair_and_stores_refresh() {
        let f = fixture().await;
        register(&f, "alice@example.com", true).await;

        let pair = f
            .sessions
            .login("alice@example.com", "Secret123!")
            .await
            .unwrap();
        assert_eq!(pair.token_type, "bearer");

        let stored = f
            .users
            .find_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(stored.holds_refresh_token(&pair.refresh_token));

        let claims = f
            .sessions
            .tokens()
            .decode(&pair.access_token, TokenScope::Access)
            .unwrap();
        assert_eq!(claims.extra.get("username"), Some(&Value::from("alice")));
    }

    #[tokio::test]
    async fn test_login_failures() {
        let f = fixture().await;
        register(&f, "alice@example.com", false).await;

        assert!(matches!(
            f.sessions.login("nobody@example.com", "Secret123!").await,
            Err(ApiError::InvalidCredentials)
        ));
        assert!(matches!(
            f.sessions.login("alice@example.com", "wrong").await,
            Err(ApiError::InvalidCredentials)
        ));
        assert!(matches!(
            f.sessions.login("alice@example.com", "Secret123!").await,
            Err(ApiError::EmailNotConfirmed)
        ));
    }

    #[tokio::test]
    async fn test_resolve_current_user() {
        let f = fixture().await;
        let user = register(&f, "alice@example.com", true).await;
        let pair = f
            .sessions
            .login("alice@example.com", "Secret123!")
            .await
            .unwrap();

        let resolved = f
            .sessions
            .resolve_current_user(&pair.access_token)
            .await
            .unwrap();
        assert_eq!(resolved.id, user.id);

        // 리프레시 토큰은 Access로 사용할 수 없음
        assert!(matches!(
            f.sessions.resolve_current_user(&pair.refresh_token).await,
            Err(ApiError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_unknown_subject_is_unauthenticated() {
        let f = fixture().await;
        let token = f
            .sessions
            .tokens()
            .issue_access("ghost@example.com", None, None)
            .unwrap();

        assert!(matches!(
            f.sessions.resolve_current_user(&token.token).await,
            Err(ApiError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_rotate_then_reuse_revokes_session() {
        let f = fixture().await;
        register(&f, "alice@example.com", true).await;
        let a = f
            .sessions
            .login("alice@example.com", "Secret123!")
            .await
            .unwrap();

        let b = f.sessions.rotate_refresh(&a.refresh_token).await.unwrap();
        assert_ne!(a.refresh_token, b.refresh_token);

        // A 재사용 → 세션 폐기
        assert!(matches!(
            f.sessions.rotate_refresh(&a.refresh_token).await,
            Err(ApiError::Unauthenticated)
        ));
        let stored = f
            .users
            .find_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(stored.refresh_token.is_none());

        // B도 더 이상 유효하지 않음
        assert!(matches!(
            f.sessions.rotate_refresh(&b.refresh_token).await,
            Err(ApiError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_rotation_losing_swap_revokes_session() {
        let f = fixture().await;
        register(&f, "alice@example.com", true).await;
        let pair = f
            .sessions
            .login("alice@example.com", "Secret123!")
            .await
            .unwrap();

        // 두 회전 모두 같은 (낡은) 레코드를 읽은 뒤에야 교체를 시도
        let sessions = gated(&f, vec![Arc::new(Barrier::new(2))]);
        let (a, b) = tokio::join!(
            sessions.rotate_refresh(&pair.refresh_token),
            sessions.rotate_refresh(&pair.refresh_token),
        );

        let (winner, loser) = match (a, b) {
            (Ok(winner), Err(loser)) | (Err(loser), Ok(winner)) => (winner, loser),
            (a, b) => panic!("expected exactly one winner, got {a:?} / {b:?}"),
        };
        assert!(matches!(loser, ApiError::Unauthenticated));

        let stored = f
            .users
            .find_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(stored.refresh_token.is_none());

        assert!(matches!(
            f.sessions.rotate_refresh(&winner.refresh_token).await,
            Err(ApiError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_login_keeps_concurrent_profile_changes() {
        let f = fixture().await;
        let user = register(&f, "alice@example.com", true).await;

        let read = Arc::new(Barrier::new(2));
        let resume = Arc::new(Barrier::new(2));
        let sessions = gated(&f, vec![read.clone(), resume.clone()]);

        // 로그인이 레코드를 읽은 뒤, 토큰을 쓰기 전에 역할이 바뀜
        let promote = async {
            read.wait().await;
            let mut current = f.users.find_by_id(user.id).await.unwrap().unwrap();
            current.role = Role::Admin;
            f.users.save(&current).await.unwrap();
            resume.wait().await;
        };
        let (pair, ()) = tokio::join!(sessions.login("alice@example.com", "Secret123!"), promote);
        let pair = pair.unwrap();

        let stored = f.users.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.role, Role::Admin);
        assert!(stored.holds_refresh_token(&pair.refresh_token));
    }

    #[tokio::test]
    async fn test_access_token_cannot_rotate() {
        let f = fixture().await;
        register(&f, "alice@example.com", true).await;
        let pair = f
            .sessions
            .login("alice@example.com", "Secret123!")
            .await
            .unwrap();

        assert!(matches!(
            f.sessions.rotate_refresh(&pair.access_token).await,
            Err(ApiError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_confirm_email_is_idempotent() {
        let f = fixture().await;
        register(&f, "alice@example.com", false).await;
        let token = f
            .sessions
            .tokens()
            .issue_email_confirmation("alice@example.com")
            .unwrap();

        assert_eq!(
            f.sessions.confirm_email(&token.token).await.unwrap(),
            ConfirmOutcome::Confirmed
        );
        assert_eq!(
            f.sessions.confirm_email(&token.token).await.unwrap(),
            ConfirmOutcome::AlreadyConfirmed
        );
    }

    #[tokio::test]
    async fn test_confirm_email_unknown_user() {
        let f = fixture().await;
        let token = f
            .sessions
            .tokens()
            .issue_email_confirmation("ghost@example.com")
            .unwrap();

        assert!(matches!(
            f.sessions.confirm_email(&token.token).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_confirm_email_rejects_access_token() {
        let f = fixture().await;
        register(&f, "alice@example.com", false).await;
        let access = f
            .sessions
            .tokens()
            .issue_access("alice@example.com", None, None)
            .unwrap();

        assert!(matches!(
            f.sessions.confirm_email(&access.token).await,
            Err(ApiError::Unauthenticated)
        ));
    }
}
