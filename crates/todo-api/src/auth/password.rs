//! 비밀번호 해싱.
//!
//! Argon2id 기반 비밀번호 해싱 및 검증. 비용 파라미터는 시작 시 고정됩니다.

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use todo_core::PasswordCost;
use tracing::warn;

/// 비밀번호 처리 에러.
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("잘못된 해싱 파라미터: {0}")]
    InvalidParams(String),
    #[error("비밀번호 해싱 실패")]
    HashingFailed,
}

/// 비밀번호 해셔.
///
/// 솔트는 해싱할 때마다 새로 생성되며, 결과는 PHC 형식 문자열입니다.
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("params", self.argon2.params())
            .finish()
    }
}

impl PasswordHasher {
    /// 주어진 비용으로 해셔를 생성합니다.
    pub fn new(cost: PasswordCost) -> Result<Self, PasswordError> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// 비밀번호 해싱.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let hash = hasher.hash("my_secure_password")?;
    /// // "$argon2id$v=19$m=19456,t=2,p=1$..."
    /// ```
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|_| PasswordError::HashingFailed)?;

        Ok(hash.to_string())
    }

    /// 비밀번호 검증.
    ///
    /// 해시에 기록된 파라미터로 다시 계산해 상수 시간으로 비교합니다.
    /// 해시 형식이 잘못되었으면 `false`를 반환합니다.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Stored password hash is malformed");
                return false;
            }
        };

        self.argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(PasswordCost::minimal()).unwrap()
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hasher = hasher();
        let password = "TestPassword123!";
        let hash = hasher.hash(password).unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify(password, &hash));
        assert!(!hasher.verify("WrongPassword123!", &hash));
    }

    #[test]
    fn test_same_password_different_hashes() {
        let hasher = hasher();
        let hash1 = hasher.hash("Password1").unwrap();
        let hash2 = hasher.hash("Password1").unwrap();

        // 솔트가 다르므로 해시가 다름
        assert_ne!(hash1, hash2);
        assert!(hasher.verify("Password1", &hash1));
        assert!(hasher.verify("Password1", &hash2));
    }

    #[test]
    fn test_cost_is_recorded_in_hash() {
        let hasher = PasswordHasher::new(PasswordCost {
            memory_kib: 64,
            iterations: 3,
            parallelism: 2,
        })
        .unwrap();
        let hash = hasher.hash("pw").unwrap();
        assert!(hash.contains("m=64,t=3,p=2"));

        // 다른 비용의 해셔로도 검증 가능 (파라미터는 해시에서 읽음)
        assert!(self::hasher().verify("pw", &hash));
    }

    #[test]
    fn test_malformed_hash_is_rejected() {
        assert!(!hasher().verify("password", "not-a-valid-hash"));
        assert!(!hasher().verify("password", ""));
    }

    #[test]
    fn test_invalid_params() {
        let result = PasswordHasher::new(PasswordCost {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        });
        assert!(matches!(result, Err(PasswordError::InvalidParams(_))));
    }

    #[test]
    fn test_unicode_password() {
        let hasher = hasher();
        let password = "한글패스워드123";
        let hash = hasher.hash(password).unwrap();
        assert!(hasher.verify(password, &hash));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_verify_matches_only_hashed_input(a in ".{0,24}", b in ".{0,24}") {
            let hasher = hasher();
            let hash = hasher.hash(&a).unwrap();
            prop_assert!(hasher.verify(&a, &hash));
            if a != b {
                prop_assert!(!hasher.verify(&b, &hash));
            }
        }
    }
}
