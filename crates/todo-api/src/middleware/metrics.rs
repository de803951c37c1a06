//! HTTP 요청 메트릭 미들웨어.

use axum::{
    extract::Request,
    http::Method,
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::metrics::{
    normalize_path, record_http_duration, record_http_request, record_http_response,
};

/// 요청 하나에 붙는 메트릭 라벨.
///
/// 확인 토큰과 리소스 ID는 경로 라벨에 남지 않으며, 표준이 아닌 메서드는
/// `OTHER`로 묶어 라벨 종류가 무한히 늘지 않게 합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLabels {
    pub method: &'static str,
    pub path: String,
}

impl RequestLabels {
    pub fn from_request(request: &Request) -> Self {
        Self {
            method: method_label(request.method()),
            path: normalize_path(request.uri().path()),
        }
    }
}

fn method_label(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::POST => "POST",
        Method::PUT => "PUT",
        Method::DELETE => "DELETE",
        Method::PATCH => "PATCH",
        Method::HEAD => "HEAD",
        Method::OPTIONS => "OPTIONS",
        _ => "OTHER",
    }
}

/// 요청 수, 상태별 응답 수, 처리 시간을 기록합니다.
pub async fn metrics_layer(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let labels = RequestLabels::from_request(&request);

    record_http_request(labels.method, &labels.path);

    let response = next.run(request).await;

    record_http_response(labels.method, &labels.path, response.status().as_u16());
    record_http_duration(labels.method, &labels.path, start.elapsed().as_secs_f64());

    response
}
