//! 메일 타입 및 trait 정의.

use async_trait::async_trait;
use serde::Serialize;

/// 확인 메일 제목.
pub const CONFIRMATION_SUBJECT: &str = "Confirm your email";

/// 이메일 확인 메일.
///
/// 토큰은 인증 코어가 발급한 이메일 확인 토큰입니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationEmail {
    /// 수신자 주소
    pub recipient: String,
    /// 본문에 표시할 사용자 이름
    pub username: String,
    /// 서비스 기본 URL (예: "http://localhost:8000/")
    pub host: String,
    /// 이메일 확인 토큰
    pub token: String,
}

impl ConfirmationEmail {
    pub fn new(
        recipient: impl Into<String>,
        username: impl Into<String>,
        host: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            username: username.into(),
            host: host.into(),
            token: token.into(),
        }
    }

    /// 확인 링크.
    pub fn confirmation_link(&self) -> String {
        let host = self.host.trim_end_matches('/');
        format!("{}/api/auth/confirmed_email/{}", host, self.token)
    }

    /// HTML 본문. 사용자 입력은 이스케이프됩니다.
    pub fn html_body(&self) -> String {
        let link = escape_html(&self.confirmation_link());
        format!(
            "<p>Hi {username},</p>\
             <p>Thanks for signing up. Please confirm your email address:</p>\
             <p><a href=\"{link}\">Confirm email</a></p>\
             <p>The link is valid for 24 hours.</p>",
            username = escape_html(&self.username),
        )
    }

    /// 텍스트 본문.
    pub fn text_body(&self) -> String {
        format!(
            "Hi {},\n\nPlease confirm your email address:\n{}\n\nThe link is valid for 24 hours.\n",
            self.username,
            self.confirmation_link()
        )
    }
}

/// HTML 본문에 넣을 문자열 이스케이프.
fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// 릴레이에 전달하는 메시지 형식.
#[derive(Debug, Clone, Serialize)]
pub struct OutgoingMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// 메일 작업용 Result 타입.
pub type MailResult<T> = Result<T, MailError>;

/// 메일 에러.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("메일 전송 실패: {0}")]
    SendFailed(String),

    #[error("잘못된 설정: {0}")]
    InvalidConfig(String),

    #[error("네트워크 에러: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// 메일 전송기 trait.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// 이메일 확인 메일을 전송합니다.
    async fn send_confirmation(&self, email: &ConfirmationEmail) -> MailResult<()>;

    /// 전송기 이름을 반환합니다.
    fn name(&self) -> &str;
}
