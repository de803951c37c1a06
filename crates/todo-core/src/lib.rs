//! # Todo Core
//!
//! 할 일 백엔드의 핵심 도메인 모델 및 공통 인프라를 제공합니다.
//!
//! 이 크레이트는 다른 크레이트 전반에서 사용되는 기본 타입을 제공합니다:
//! - 사용자 역할 및 사용자(Principal) 모델
//! - 할 일(Todo) 모델
//! - 설정 관리
//! - 로깅 인프라
//! - 시계 추상화 (토큰 만료 판정용)

pub mod clock;
pub mod config;
pub mod domain;
pub mod logging;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::*;
pub use domain::*;
pub use logging::*;
