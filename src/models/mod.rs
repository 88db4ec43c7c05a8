//! # 데이터 모델 모듈
//!
//! 애플리케이션에서 사용하는 데이터 구조체(struct)들을 정의합니다.
//! 각 하위 모듈은 특정 도메인의 데이터 타입을 담당합니다:
//! - `lesson`: 레슨과 복습 기록, 목록 스냅샷
//! - `session`: 로그인 세션 상태와 로그인 결과 보고서
//! - `user`: 사용자 계정과 신원(identity)
//!
//! `pub use X::*;`로 재공개하여 `crate::models::Lesson`처럼 짧게 접근할 수 있습니다.

pub mod lesson;
pub mod session;
pub mod user;

pub use lesson::*;
pub use session::*;
pub use user::*;
