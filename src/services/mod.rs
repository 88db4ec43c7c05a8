//! # 서비스 계층
//!
//! 라우트 핸들러와 데이터베이스 사이의 로직을 담당합니다.
//!
//! - `local_store`: 기기 로컬 키-값 저장소 (JSON 파일)
//! - `repository`: 로컬/원격 레슨 저장소를 하나의 트레이트로 추상화
//! - `auth`: 인증 협력자 (계정, 로그인 세션 토큰, 세션 변경 알림)
//! - `sync`: 레슨 목록 동기화기

pub mod auth;
pub mod local_store;
pub mod repository;
pub mod sync;
