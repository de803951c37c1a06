//! 도메인 모델.

mod role;
mod todo;
mod user;

pub use role::Role;
pub use todo::{NewTodo, Todo, TodoUpdate};
pub use user::{NewUser, User};
