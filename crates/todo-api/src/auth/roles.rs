//! 역할 기반 접근 제어.
//!
//! 라우트 등록 시 허용 역할 집합을 고정하고, 요청마다 주체의 역할을 확인합니다.

use std::collections::HashSet;

use todo_core::{Role, User};

use crate::error::ApiError;
use crate::metrics;

/// 변경 불가능한 역할 집합.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSet(HashSet<Role>);

impl RoleSet {
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        Self(roles.into_iter().collect())
    }

    /// 관리자와 운영자.
    pub fn staff() -> Self {
        Self::new([Role::Admin, Role::Moderator])
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.0.iter()
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<T: IntoIterator<Item = Role>>(iter: T) -> Self {
        Self::new(iter)
    }
}

/// 역할 게이트.
///
/// # 사용 예시
///
/// ```rust,ignore
/// let gate = RoleGate::new(RoleSet::staff());
/// gate.check(&user)?;
/// ```
#[derive(Debug, Clone)]
pub struct RoleGate {
    allowed: RoleSet,
}

impl RoleGate {
    pub fn new(allowed: RoleSet) -> Self {
        Self { allowed }
    }

    pub fn allowed(&self) -> &RoleSet {
        &self.allowed
    }

    /// 주체의 역할이 허용 집합에 속하는지 확인합니다.
    pub fn check(&self, user: &User) -> Result<(), ApiError> {
        if self.allowed.contains(user.role) {
            Ok(())
        } else {
            metrics::record_role_denied(user.role);
            Err(ApiError::Forbidden)
        }
    }
}
