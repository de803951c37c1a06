//! OpenAPI 문서화 설정.
//!
//! Swagger UI는 `/swagger-ui` 경로에서 사용 가능합니다.
//!
//! 새로운 엔드포인트를 추가할 때:
//!
//! 1. 응답/요청 타입에 `#[derive(ToSchema)]` 추가
//! 2. 핸들러에 `#[utoipa::path(...)]` 어노테이션 추가
//! 3. 이 파일의 `components(schemas(...))` 및 `paths(...)` 섹션에 추가

use axum::Router;
use todo_core::{Role, Todo};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::TokenPair;
use crate::error::ApiErrorResponse;
use crate::routes::{
    ComponentHealth, ComponentStatus, HealthResponse, LoginRequest, MessageResponse,
    RequestEmail, SignupRequest, TodoRequest, TodoUpdateRequest, UserResponse,
};

/// `bearer` 보안 스키마 등록.
struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Todo API 문서.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Todo API",
        description = r#"
# 할 일 백엔드 REST API

## 인증

1. `POST /api/auth/signup` 으로 가입 후 메일의 확인 링크를 엽니다.
2. `POST /api/auth/login` 으로 Access/Refresh 토큰 페어를 받습니다.
3. 보호된 엔드포인트는 `Authorization: Bearer <access_token>` 헤더가 필요합니다.
4. Access Token이 만료되면 `GET /api/auth/refresh_token` 에 Refresh Token을 보냅니다.
   Refresh Token은 한 번만 사용할 수 있으며, 재사용이 감지되면 세션이 폐기됩니다.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8000", description = "로컬 개발 서버"),
    ),
    tags(
        (name = "health", description = "헬스 체크 - 서버 상태 확인"),
        (name = "auth", description = "인증 - 가입, 로그인, 토큰 갱신, 이메일 확인"),
        (name = "todos", description = "할 일 - 사용자별 할 일 CRUD")
    ),
    modifiers(&BearerSecurity),
    components(
        schemas(
            // ===== Health =====
            HealthResponse,
            ComponentHealth,
            ComponentStatus,

            // ===== Common =====
            ApiErrorResponse,
            MessageResponse,

            // ===== Auth =====
            SignupRequest,
            LoginRequest,
            RequestEmail,
            UserResponse,
            TokenPair,
            Role,

            // ===== Todos =====
            Todo,
            TodoRequest,
            TodoUpdateRequest,
        )
    ),
    paths(
        // ===== Health =====
        crate::routes::health::health_check,
        crate::routes::health::health_ready,

        // ===== Auth =====
        crate::routes::auth::signup,
        crate::routes::auth::login,
        crate::routes::auth::refresh_token,
        crate::routes::auth::confirmed_email,
        crate::routes::auth::request_email,
        crate::routes::auth::me,

        // ===== Todos =====
        crate::routes::todos::list_todos,
        crate::routes::todos::list_all_todos,
        crate::routes::todos::get_todo,
        crate::routes::todos::create_todo,
        crate::routes::todos::update_todo,
        crate::routes::todos::delete_todo,
    )
)]
pub struct ApiDoc;

/// Swagger UI 라우터 생성.
///
/// - `/swagger-ui` - Swagger UI 대화형 문서
/// - `/api-docs/openapi.json` - OpenAPI JSON 스펙
pub fn swagger_ui_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}
