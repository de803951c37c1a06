//! 사용자(Principal) 모델.

use chrono::{DateTime, Utc};

use super::Role;

/// 인증된 사용자 레코드.
///
/// 비밀번호 해시와 리프레시 토큰을 포함하므로 직렬화하지 않습니다.
/// 외부 응답에는 API 계층의 뷰 타입을 사용하세요.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// 토큰 subject로 사용되는 고유 이메일
    pub email: String,
    /// PHC 형식 비밀번호 해시
    pub password_hash: String,
    pub avatar: Option<String>,
    /// 마지막으로 발급된 리프레시 토큰 (최대 1개만 유효)
    pub refresh_token: Option<String>,
    pub role: Role,
    /// 이메일 확인 여부
    pub confirmed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// 저장된 리프레시 토큰이 주어진 토큰과 일치하는지 확인.
    pub fn holds_refresh_token(&self, token: &str) -> bool {
        self.refresh_token.as_deref() == Some(token)
    }
}

/// 신규 사용자 입력.
///
/// 비밀번호는 이미 해싱된 상태여야 합니다.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub avatar: Option<String>,
    pub role: Role,
}

impl NewUser {
    /// 기본 역할(user)로 신규 사용자 입력 생성.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            avatar: None,
            role: Role::default(),
        }
    }

    pub fn with_avatar(mut self, avatar: Option<String>) -> Self {
        self.avatar = avatar;
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }
}
