//! 로그 기반 전송기.

use async_trait::async_trait;
use tracing::info;

use crate::types::{ConfirmationEmail, MailResult, Mailer};

/// 메일을 보내지 않고 로그만 남기는 전송기.
///
/// 메일 릴레이가 설정되지 않은 환경에서 사용합니다. 토큰은 기록하지 않습니다.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_confirmation(&self, email: &ConfirmationEmail) -> MailResult<()> {
        info!(
            recipient = %email.recipient,
            username = %email.username,
            "Confirmation email suppressed (no mail relay configured)"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// 전송 내역을 메모리에 기록하는 전송기 (테스트용).
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: std::sync::Mutex<Vec<ConfirmationEmail>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 지금까지 전송된 메일.
    pub fn sent(&self) -> Vec<ConfirmationEmail> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// 특정 수신자에게 마지막으로 전송된 메일.
    pub fn last_for(&self, recipient: &str) -> Option<ConfirmationEmail> {
        self.sent()
            .into_iter()
            .rev()
            .find(|m| m.recipient == recipient)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl Mailer for MemoryMailer {
    async fn send_confirmation(&self, email: &ConfirmationEmail) -> MailResult<()> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email.clone());
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
