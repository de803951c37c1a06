//! 할 일 endpoint.
//!
//! 모든 경로는 Access Token이 필요하며, `/all`은 관리자와 모더레이터만 접근합니다.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use todo_core::{NewTodo, Todo, TodoUpdate};
use tracing::debug;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::extract::ValidatedJson;
use crate::auth::{require_roles, CurrentUser, RoleGuard, RoleSet};
use crate::error::{ApiError, ApiErrorResponse, ApiResult};
use crate::state::AppState;

// ================================================================================================
// Types
// ================================================================================================

/// 페이지 쿼리.
#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct Pagination {
    /// 페이지 크기 (10 ~ 500)
    #[serde(default = "default_limit")]
    #[validate(range(min = 10, max = 500))]
    pub limit: i64,
    /// 건너뛸 개수
    #[serde(default)]
    #[validate(range(min = 0))]
    pub offset: i64,
}

fn default_limit() -> i64 {
    10
}

/// 할 일 생성 요청.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TodoRequest {
    #[validate(length(min = 1, max = 50))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 250))]
    pub description: String,
}

/// 할 일 수정 요청.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TodoUpdateRequest {
    #[validate(length(min = 1, max = 50))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 250))]
    pub description: String,
    pub completed: bool,
}

fn checked(query: Pagination) -> ApiResult<Pagination> {
    query.validate()?;
    Ok(query)
}

fn todo_not_found() -> ApiError {
    ApiError::not_found("Todo not found")
}

// ================================================================================================
// Handlers
// ================================================================================================

/// 내 할 일 목록.
#[utoipa::path(
    get,
    path = "/api/todos",
    params(Pagination),
    responses(
        (status = 200, description = "할 일 목록", body = [Todo]),
        (status = 401, description = "인증 필요", body = ApiErrorResponse),
        (status = 422, description = "잘못된 페이지 값", body = ApiErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "todos"
)]
pub async fn list_todos(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<Pagination>,
) -> ApiResult<Json<Vec<Todo>>> {
    let page = checked(query)?;
    let todos = state
        .todos
        .list_for_user(user.id, page.limit, page.offset)
        .await?;
    Ok(Json(todos))
}

/// 전체 할 일 목록 (관리자/모더레이터).
#[utoipa::path(
    get,
    path = "/api/todos/all",
    params(Pagination),
    responses(
        (status = 200, description = "전체 할 일 목록", body = [Todo]),
        (status = 401, description = "인증 필요", body = ApiErrorResponse),
        (status = 403, description = "권한 없음", body = ApiErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "todos"
)]
pub async fn list_all_todos(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<Pagination>,
) -> ApiResult<Json<Vec<Todo>>> {
    let page = checked(query)?;
    debug!(user_id = user.id, role = %user.role, "Listing all todos");
    let todos = state.todos.list_all(page.limit, page.offset).await?;
    Ok(Json(todos))
}

/// 할 일 조회.
#[utoipa::path(
    get,
    path = "/api/todos/{todo_id}",
    params(("todo_id" = i64, Path, description = "할 일 ID")),
    responses(
        (status = 200, description = "할 일", body = Todo),
        (status = 404, description = "없음", body = ApiErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "todos"
)]
pub async fn get_todo(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(todo_id): Path<i64>,
) -> ApiResult<Json<Todo>> {
    let todo = state
        .todos
        .get(user.id, todo_id)
        .await?
        .ok_or_else(todo_not_found)?;
    Ok(Json(todo))
}

/// 할 일 생성.
#[utoipa::path(
    post,
    path = "/api/todos",
    request_body = TodoRequest,
    responses(
        (status = 201, description = "생성됨", body = Todo),
        (status = 422, description = "입력 검증 실패", body = ApiErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "todos"
)]
pub async fn create_todo(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(body): ValidatedJson<TodoRequest>,
) -> ApiResult<(StatusCode, Json<Todo>)> {
    let todo = state
        .todos
        .create(
            user.id,
            NewTodo {
                title: body.title,
                description: body.description,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(todo)))
}

/// 할 일 수정.
#[utoipa::path(
    put,
    path = "/api/todos/{todo_id}",
    params(("todo_id" = i64, Path, description = "할 일 ID")),
    request_body = TodoUpdateRequest,
    responses(
        (status = 200, description = "수정됨", body = Todo),
        (status = 404, description = "없음", body = ApiErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "todos"
)]
pub async fn update_todo(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(todo_id): Path<i64>,
    ValidatedJson(body): ValidatedJson<TodoUpdateRequest>,
) -> ApiResult<Json<Todo>> {
    let update = TodoUpdate {
        title: body.title,
        description: body.description,
        completed: body.completed,
    };
    let todo = state
        .todos
        .update(user.id, todo_id, update)
        .await?
        .ok_or_else(todo_not_found)?;
    Ok(Json(todo))
}

/// 할 일 삭제.
#[utoipa::path(
    delete,
    path = "/api/todos/{todo_id}",
    params(("todo_id" = i64, Path, description = "할 일 ID")),
    responses(
        (status = 204, description = "삭제됨"),
        (status = 404, description = "없음", body = ApiErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "todos"
)]
pub async fn delete_todo(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(todo_id): Path<i64>,
) -> ApiResult<StatusCode> {
    state
        .todos
        .delete(user.id, todo_id)
        .await?
        .ok_or_else(todo_not_found)?;
    Ok(StatusCode::NO_CONTENT)
}

// ================================================================================================
// Router
// ================================================================================================

/// 할 일 라우터.
pub fn todos_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let staff_only = Router::new()
        .route("/all", get(list_all_todos))
        .route_layer(middleware::from_fn_with_state(
            RoleGuard::new(state, RoleSet::staff()),
            require_roles,
        ));

    Router::new()
        .route("/", get(list_todos).post(create_todo))
        .route(
            "/{todo_id}",
            get(get_todo).put(update_todo).delete(delete_todo),
        )
        .merge(staff_only)
}
