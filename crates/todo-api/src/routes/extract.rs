//! 검증 추출기.
//!
//! 요청 본문을 역직렬화한 뒤 `validator`로 검증합니다. 실패는 모두
//! `VALIDATION_ERROR` 응답으로 통일됩니다.

use axum::{
    extract::{rejection::FormRejection, rejection::JsonRejection, FromRequest, Request},
    http::header::CONTENT_TYPE,
    Form, Json,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use validator::Validate;

use crate::error::ApiError;

fn json_rejection(rejection: JsonRejection) -> ApiError {
    ApiError::Validation(json!({ "body": rejection.body_text() }))
}

fn form_rejection(rejection: FormRejection) -> ApiError {
    ApiError::Validation(json!({ "body": rejection.body_text() }))
}

/// 검증된 JSON 본문.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(json_rejection)?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// JSON 또는 폼(`application/x-www-form-urlencoded`) 본문.
///
/// 로그인처럼 OAuth2 password 폼과 JSON을 모두 받는 엔드포인트에 사용합니다.
#[derive(Debug, Clone)]
pub struct JsonOrForm<T>(pub T);

impl<T, S> FromRequest<S> for JsonOrForm<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        let value = if is_json {
            Json::<T>::from_request(req, state)
                .await
                .map_err(json_rejection)?
                .0
        } else {
            Form::<T>::from_request(req, state)
                .await
                .map_err(form_rejection)?
                .0
        };

        value.validate()?;
        Ok(JsonOrForm(value))
    }
}
