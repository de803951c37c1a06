//! 저장소 계층.
//!
//! 라우트 핸들러와 세션 로직은 아래 트레이트에만 의존합니다.
//! PostgreSQL 구현과 메모리 구현을 제공하며, 테스트와 DB 없는 실행에서는
//! 메모리 구현을 사용합니다.

pub mod memory;
pub mod todos;
pub mod users;

use async_trait::async_trait;
use todo_core::{NewTodo, NewUser, Todo, TodoUpdate, User};

pub use memory::{MemoryTodoRepository, MemoryUserRepository};
pub use todos::PgTodoRepository;
pub use users::PgUserRepository;

/// 저장소 에러.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// 고유 제약 위반 (예: 이메일 중복)
    #[error("이미 존재합니다: {0}")]
    Conflict(String),
    #[error("레코드를 찾을 수 없습니다")]
    NotFound,
    #[error("저장된 데이터가 올바르지 않습니다: {0}")]
    InvalidData(String),
    #[error("데이터베이스 에러: {0}")]
    Database(#[from] sqlx::Error),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// 사용자 저장소.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// 이메일(토큰 subject)로 사용자 조회.
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>>;

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>>;

    /// 신규 사용자 저장. 이메일이 이미 있으면 `Conflict`.
    async fn create(&self, new_user: NewUser) -> RepositoryResult<User>;

    /// 사용자 레코드 전체를 덮어씁니다.
    async fn save(&self, user: &User) -> RepositoryResult<()>;

    /// 저장된 리프레시 토큰이 `expected`일 때만 `new`로 교체합니다.
    ///
    /// 교체에 성공하면 `true`. 동시 회전 시 한쪽만 성공합니다.
    async fn swap_refresh_token(
        &self,
        id: i64,
        expected: &str,
        new: Option<&str>,
    ) -> RepositoryResult<bool>;

    /// 리프레시 토큰 컬럼만 갱신합니다. 다른 필드는 건드리지 않습니다.
    async fn set_refresh_token(&self, id: i64, token: Option<&str>) -> RepositoryResult<()>;

    /// 저장된 리프레시 토큰을 무조건 지웁니다 (세션 폐기).
    async fn clear_refresh_token(&self, id: i64) -> RepositoryResult<()>;
}

/// 할 일 저장소.
///
/// `list_all`을 제외한 모든 연산은 소유자 범위로 제한됩니다.
#[async_trait]
pub trait TodoRepository: Send + Sync {
    async fn list_for_user(&self, user_id: i64, limit: i64, offset: i64)
        -> RepositoryResult<Vec<Todo>>;

    async fn list_all(&self, limit: i64, offset: i64) -> RepositoryResult<Vec<Todo>>;

    async fn get(&self, user_id: i64, todo_id: i64) -> RepositoryResult<Option<Todo>>;

    async fn create(&self, user_id: i64, new_todo: NewTodo) -> RepositoryResult<Todo>;

    /// 수정된 할 일 반환. 없거나 소유자가 다르면 `None`.
    async fn update(
        &self,
        user_id: i64,
        todo_id: i64,
        update: TodoUpdate,
    ) -> RepositoryResult<Option<Todo>>;

    /// 삭제된 할 일 반환. 없거나 소유자가 다르면 `None`.
    async fn delete(&self, user_id: i64, todo_id: i64) -> RepositoryResult<Option<Todo>>;
}
