//! # 레슨(Lesson) 라우트 핸들러
//!
//! 화면의 사용자 동작(레슨 추가, 복습 추가, 레슨 삭제)을 처리하는 HTTP 핸들러입니다.
//! 모든 핸들러는 처리 후의 목록 스냅샷을 돌려주며, 클라이언트는 이것으로 표를 다시 그립니다.
//!
//! ## 엔드포인트
//! - `GET    /api/v1/lessons`              → 현재 목록 스냅샷
//! - `POST   /api/v1/lessons`              → 레슨 추가 (`{ "name": "..." }`)
//! - `POST   /api/v1/lessons/{id}/reviews` → 오늘 날짜로 복습 추가
//! - `DELETE /api/v1/lessons/{id}`         → 레슨 삭제
//!
//! ## 잠금
//! 핸들러는 동기화기의 잠금을 작업이 끝날 때까지 쥡니다.
//! 그래서 사용자 동작은 하나씩 차례대로 처리됩니다.

use crate::{
    error::AppError,
    models::*,
    services::{auth::PasswordAuthenticator, sync::SharedSync},
};
use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

/// 애플리케이션 공유 상태
///
/// 모든 요청 핸들러가 `State(state): State<AppState>`로 접근합니다.
/// 두 필드 모두 `Arc`이므로 clone해도 같은 객체를 가리킵니다.
#[derive(Clone)]
pub struct AppState {
    /// 레슨 목록 동기화기 (잠금으로 보호됨)
    pub sync: SharedSync,
    /// 계정 등록에 쓰는 인증 구현체 (동기화기도 같은 객체를 사용)
    pub auth: Arc<PasswordAuthenticator>,
}

/// `GET /lessons` — 현재 목록 스냅샷을 조회합니다.
///
/// 첫 로딩 중이면 `loading: true`와 빈 목록이 반환됩니다.
pub async fn list_lessons(State(state): State<AppState>) -> Json<LessonSnapshot> {
    let sync = state.sync.lock().await;
    Json(sync.snapshot())
}

/// `POST /lessons` — 오늘 학습한 레슨을 추가합니다.
///
/// 이름이 비어 있거나 공백뿐이면 아무것도 바뀌지 않은 스냅샷이 반환됩니다.
pub async fn create_lesson(
    State(state): State<AppState>,
    Json(req): Json<CreateLessonRequest>,
) -> Result<Json<LessonSnapshot>, AppError> {
    let mut sync = state.sync.lock().await;
    sync.add_lesson(&req.name).await?;
    Ok(Json(sync.snapshot()))
}

/// `POST /lessons/{id}/reviews` — 레슨에 오늘 날짜로 복습 기록을 추가합니다.
///
/// `{id}`는 로컬 레슨이면 숫자, 원격 레슨이면 문서 키입니다.
pub async fn add_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LessonSnapshot>, AppError> {
    let id: LessonId = id.parse()?;
    let mut sync = state.sync.lock().await;
    sync.add_review(&id).await?;
    Ok(Json(sync.snapshot()))
}

/// `DELETE /lessons/{id}` — 레슨을 삭제합니다.
pub async fn delete_lesson(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LessonSnapshot>, AppError> {
    let id: LessonId = id.parse()?;
    let mut sync = state.sync.lock().await;
    sync.delete_lesson(&id).await?;
    Ok(Json(sync.snapshot()))
}
