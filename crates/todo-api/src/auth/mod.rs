//! 인증 및 권한 부여.
//!
//! # 구성 요소
//!
//! - [`PasswordHasher`]: Argon2id 비밀번호 해싱
//! - [`TokenService`]: 용도별(Access/Refresh/이메일 확인) 토큰 발급 및 검증
//! - [`SessionResolver`]: Bearer 토큰 → 사용자, 리프레시 토큰 회전, 이메일 확인
//! - [`RoleGate`]: 역할 기반 라우트 접근 제어
//! - [`CurrentUser`]: Axum 핸들러용 인증 추출기

mod jwt;
mod middleware;
mod password;
mod roles;
mod session;

pub use jwt::{Claims, IssuedToken, TokenError, TokenPair, TokenScope, TokenService};
pub use middleware::{bearer_token, require_roles, BearerToken, CurrentUser, RoleGuard};
pub use password::{PasswordError, PasswordHasher};
pub use roles::{RoleGate, RoleSet};
pub use session::{ConfirmOutcome, SessionResolver};
