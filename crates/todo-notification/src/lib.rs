//! # Todo Notification
//!
//! 계정 확인 메일 전송.
//!
//! 지원 전송 방식:
//! - 로그 출력 ([`LogMailer`]) - 릴레이가 설정되지 않은 개발 환경
//! - HTTP 메일 릴레이 ([`RelayMailer`])
//!
//! 인증 코어는 확인 토큰만 만들고, 실제 전송은 [`Mailer`] 구현에 맡깁니다.

pub mod log_mailer;
pub mod relay;
pub mod types;

pub use log_mailer::*;
pub use relay::*;
pub use types::*;
