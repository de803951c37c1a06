//! HTTP 메일 릴레이 전송기.
//!
//! 메일 릴레이 서비스의 엔드포인트로 JSON 메시지를 POST합니다.
//! 템플릿 렌더링과 SMTP 전송은 릴레이가 담당합니다.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::types::{
    ConfirmationEmail, MailError, MailResult, Mailer, OutgoingMessage, CONFIRMATION_SUBJECT,
};

/// 메일 릴레이 설정.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// 릴레이 엔드포인트 URL
    pub url: String,
    /// 발신 주소
    pub from_address: String,
    /// 발신자 이름
    pub from_name: String,
    /// 요청 타임아웃
    pub timeout: Duration,
}

impl RelayConfig {
    pub fn new(url: impl Into<String>, from_address: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            from_address: from_address.into(),
            from_name: "Todo Systems".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_from_name(mut self, name: impl Into<String>) -> Self {
        self.from_name = name.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn from_header(&self) -> String {
        format!("{} <{}>", self.from_name, self.from_address)
    }
}

/// HTTP 릴레이 전송기.
pub struct RelayMailer {
    config: RelayConfig,
    client: reqwest::Client,
}

impl RelayMailer {
    /// 새 릴레이 전송기를 생성합니다.
    pub fn new(config: RelayConfig) -> MailResult<Self> {
        if config.url.trim().is_empty() {
            return Err(MailError::InvalidConfig("relay url is empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MailError::InvalidConfig(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn build_message(&self, email: &ConfirmationEmail) -> OutgoingMessage {
        OutgoingMessage {
            from: self.config.from_header(),
            to: vec![email.recipient.clone()],
            subject: CONFIRMATION_SUBJECT.to_string(),
            html: email.html_body(),
            text: email.text_body(),
        }
    }
}

#[async_trait]
impl Mailer for RelayMailer {
    async fn send_confirmation(&self, email: &ConfirmationEmail) -> MailResult<()> {
        let message = self.build_message(email);

        let response = self
            .client
            .post(&self.config.url)
            .json(&message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                recipient = %email.recipient,
                status = status.as_u16(),
                "Mail relay rejected message"
            );
            return Err(MailError::SendFailed(format!(
                "relay returned {}: {}",
                status, body
            )));
        }

        debug!(recipient = %email.recipient, "Confirmation email sent via relay");
        Ok(())
    }

    fn name(&self) -> &str {
        "relay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn sample_email() -> ConfirmationEmail {
        ConfirmationEmail::new(
            "alice@example.com",
            "alice",
            "http://localhost:8000/",
            "confirm-token",
        )
    }

    #[test]
    fn test_empty_url_rejected() {
        let result = RelayMailer::new(RelayConfig::new("  ", "noreply@example.com"));
        assert!(matches!(result, Err(MailError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_send_posts_json_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/send")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(json!({
                "from": "Todo Systems <noreply@example.com>",
                "to": ["alice@example.com"],
                "subject": "Confirm your email"
            })))
            .with_status(202)
            .create_async()
            .await;

        let mailer = RelayMailer::new(RelayConfig::new(
            format!("{}/send", server.url()),
            "noreply@example.com",
        ))
        .unwrap();

        mailer.send_confirmation(&sample_email()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_body_contains_confirmation_link() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/send")
            .match_body(Matcher::Regex(
                "api/auth/confirmed_email/confirm-token".to_string(),
            ))
            .with_status(200)
            .create_async()
            .await;

        let mailer = RelayMailer::new(RelayConfig::new(
            format!("{}/send", server.url()),
            "noreply@example.com",
        ))
        .unwrap();

        mailer.send_confirmation(&sample_email()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_relay_error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/send")
            .with_status(503)
            .with_body("unavailable")
            .create_async()
            .await;

        let mailer = RelayMailer::new(RelayConfig::new(
            format!("{}/send", server.url()),
            "noreply@example.com",
        ))
        .unwrap();

        let result = mailer.send_confirmation(&sample_email()).await;
        match result {
            Err(MailError::SendFailed(msg)) => assert!(msg.contains("503")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
