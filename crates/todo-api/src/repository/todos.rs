//! Todos Repository
//!
//! 할 일 관련 PostgreSQL 연산을 담당합니다.

use async_trait::async_trait;
use todo_core::{NewTodo, Todo, TodoUpdate};
use sqlx::PgPool;

use super::{RepositoryResult, TodoRepository};

const TODO_COLUMNS: &str = "id, title, description, completed, user_id, created_at, updated_at";

/// PostgreSQL 할 일 저장소
#[derive(Debug, Clone)]
pub struct PgTodoRepository {
    pool: PgPool,
}

impl PgTodoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Todo는 core 타입이므로 FromRow 대신 튜플로 읽어 변환
type TodoRow = (
    i64,
    String,
    String,
    bool,
    i64,
    chrono::DateTime<chrono::Utc>,
    chrono::DateTime<chrono::Utc>,
);

fn into_todo(row: TodoRow) -> Todo {
    let (id, title, description, completed, user_id, created_at, updated_at) = row;
    Todo {
        id,
        title,
        description,
        completed,
        user_id,
        created_at,
        updated_at,
    }
}

#[async_trait]
impl TodoRepository for PgTodoRepository {
    async fn list_for_user(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<Todo>> {
        let sql = format!(
            "SELECT {TODO_COLUMNS} FROM todos WHERE user_id = $1 ORDER BY id LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, TodoRow>(&sql)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(into_todo).collect())
    }

    async fn list_all(&self, limit: i64, offset: i64) -> RepositoryResult<Vec<Todo>> {
        let sql = format!("SELECT {TODO_COLUMNS} FROM todos ORDER BY id LIMIT $1 OFFSET $2");
        let rows = sqlx::query_as::<_, TodoRow>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(into_todo).collect())
    }

    async fn get(&self, user_id: i64, todo_id: i64) -> RepositoryResult<Option<Todo>> {
        let sql = format!("SELECT {TODO_COLUMNS} FROM todos WHERE id = $1 AND user_id = $2");
        let row = sqlx::query_as::<_, TodoRow>(&sql)
            .bind(todo_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(into_todo))
    }

    async fn create(&self, user_id: i64, new_todo: NewTodo) -> RepositoryResult<Todo> {
        let sql = format!(
            r#"
            INSERT INTO todos (title, description, user_id)
            VALUES ($1, $2, $3)
            RETURNING {TODO_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, TodoRow>(&sql)
            .bind(&new_todo.title)
            .bind(&new_todo.description)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(into_todo(row))
    }

    async fn update(
        &self,
        user_id: i64,
        todo_id: i64,
        update: TodoUpdate,
    ) -> RepositoryResult<Option<Todo>> {
        let sql = format!(
            r#"
            UPDATE todos
            SET title = $3, description = $4, completed = $5, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {TODO_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, TodoRow>(&sql)
            .bind(todo_id)
            .bind(user_id)
            .bind(&update.title)
            .bind(&update.description)
            .bind(update.completed)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(into_todo))
    }

    async fn delete(&self, user_id: i64, todo_id: i64) -> RepositoryResult<Option<Todo>> {
        let sql = format!(
            "DELETE FROM todos WHERE id = $1 AND user_id = $2 RETURNING {TODO_COLUMNS}"
        );
        let row = sqlx::query_as::<_, TodoRow>(&sql)
            .bind(todo_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(into_todo))
    }
}
