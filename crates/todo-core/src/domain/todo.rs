//! 할 일 모델.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 할 일 레코드.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct Todo {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub completed: bool,
    /// 소유자 ID
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 신규 할 일 입력.
#[derive(Debug, Clone)]
pub struct NewTodo {
    pub title: String,
    pub description: String,
}

/// 할 일 수정 입력.
#[derive(Debug, Clone)]
pub struct TodoUpdate {
    pub title: String,
    pub description: String,
    pub completed: bool,
}

impl Todo {
    /// 수정 내용을 적용하고 `updated_at`을 갱신합니다.
    pub fn apply(&mut self, update: TodoUpdate, now: DateTime<Utc>) {
        self.title = update.title;
        self.description = update.description;
        self.completed = update.completed;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_apply_update() {
        let created = Utc::now();
        let mut todo = Todo {
            id: 7,
            title: "buy milk".to_string(),
            description: String::new(),
            completed: false,
            user_id: 1,
            created_at: created,
            updated_at: created,
        };

        let later = created + Duration::minutes(5);
        todo.apply(
            TodoUpdate {
                title: "buy oat milk".to_string(),
                description: "2L".to_string(),
                completed: true,
            },
            later,
        );

        assert_eq!(todo.title, "buy oat milk");
        assert!(todo.completed);
        assert_eq!(todo.created_at, created);
        assert_eq!(todo.updated_at, later);
    }
}
