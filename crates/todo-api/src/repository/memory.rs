//! 메모리 저장소.
//!
//! 데이터베이스 URL이 없을 때와 테스트에서 사용합니다. 프로세스가 끝나면
//! 데이터는 사라집니다.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use todo_core::{NewTodo, NewUser, SharedClock, Todo, TodoUpdate, User};
use tokio::sync::RwLock;

use super::{RepositoryError, RepositoryResult, TodoRepository, UserRepository};

/// 메모리 사용자 저장소.
pub struct MemoryUserRepository {
    users: RwLock<BTreeMap<i64, User>>,
    next_id: AtomicI64,
    clock: SharedClock,
}

impl MemoryUserRepository {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            users: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
            clock,
        }
    }

    /// 저장된 사용자 수.
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn create(&self, new_user: NewUser) -> RepositoryResult<User> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == new_user.email) {
            return Err(RepositoryError::Conflict(new_user.email));
        }

        let now = self.clock.now();
        let user = User {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            avatar: new_user.avatar,
            refresh_token: None,
            role: new_user.role,
            confirmed: false,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn save(&self, user: &User) -> RepositoryResult<()> {
        let mut users = self.users.write().await;
        let stored = users.get_mut(&user.id).ok_or(RepositoryError::NotFound)?;
        *stored = User {
            updated_at: self.clock.now(),
            ..user.clone()
        };
        Ok(())
    }

    async fn swap_refresh_token(
        &self,
        id: i64,
        expected: &str,
        new: Option<&str>,
    ) -> RepositoryResult<bool> {
        let mut users = self.users.write().await;
        match users.get_mut(&id) {
            Some(user) if user.holds_refresh_token(expected) => {
                user.refresh_token = new.map(str::to_string);
                user.updated_at = self.clock.now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_refresh_token(&self, id: i64, token: Option<&str>) -> RepositoryResult<()> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        user.refresh_token = token.map(str::to_string);
        user.updated_at = self.clock.now();
        Ok(())
    }

    async fn clear_refresh_token(&self, id: i64) -> RepositoryResult<()> {
        if let Some(user) = self.users.write().await.get_mut(&id) {
            user.refresh_token = None;
            user.updated_at = self.clock.now();
        }
        Ok(())
    }
}

/// 메모리 할 일 저장소.
pub struct MemoryTodoRepository {
    todos: RwLock<BTreeMap<i64, Todo>>,
    next_id: AtomicI64,
    clock: SharedClock,
}

impl MemoryTodoRepository {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            todos: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
            clock,
        }
    }
}

fn page(limit: i64, offset: i64) -> (usize, usize) {
    (
        usize::try_from(offset).unwrap_or(0),
        usize::try_from(limit).unwrap_or(0),
    )
}

#[async_trait]
impl TodoRepository for MemoryTodoRepository {
    async fn list_for_user(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<Todo>> {
        let (skip, take) = page(limit, offset);
        let todos = self.todos.read().await;
        Ok(todos
            .values()
            .filter(|t| t.user_id == user_id)
            .skip(skip)
            .take(take)
            .cloned()
            .collect())
    }

    async fn list_all(&self, limit: i64, offset: i64) -> RepositoryResult<Vec<Todo>> {
        let (skip, take) = page(limit, offset);
        let todos = self.todos.read().await;
        Ok(todos.values().skip(skip).take(take).cloned().collect())
    }

    async fn get(&self, user_id: i64, todo_id: i64) -> RepositoryResult<Option<Todo>> {
        let todos = self.todos.read().await;
        Ok(todos
            .get(&todo_id)
            .filter(|t| t.user_id == user_id)
            .cloned())
    }

    async fn create(&self, user_id: i64, new_todo: NewTodo) -> RepositoryResult<Todo> {
        let now = self.clock.now();
        let todo = Todo {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            title: new_todo.title,
            description: new_todo.description,
            completed: false,
            user_id,
            created_at: now,
            updated_at: now,
        };
        self.todos.write().await.insert(todo.id, todo.clone());
        Ok(todo)
    }

    async fn update(
        &self,
        user_id: i64,
        todo_id: i64,
        update: TodoUpdate,
    ) -> RepositoryResult<Option<Todo>> {
        let mut todos = self.todos.write().await;
        match todos.get_mut(&todo_id) {
            Some(todo) if todo.user_id == user_id => {
                todo.apply(update, self.clock.now());
                Ok(Some(todo.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete(&self, user_id: i64, todo_id: i64) -> RepositoryResult<Option<Todo>> {
        let mut todos = self.todos.write().await;
        if todos.get(&todo_id).is_some_and(|t| t.user_id == user_id) {
            Ok(todos.remove(&todo_id))
        } else {
            Ok(None)
        }
    }
}
