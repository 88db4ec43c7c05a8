//! # 헬스체크(Health Check) 핸들러
//!
//! 서버가 정상적으로 동작하는지 확인하는 엔드포인트입니다.
//!
//! ## 엔드포인트
//! - `GET /api/v1/health` → `{ "status": "ok", "loading": false }`
//!
//! `loading`이 true이면 서버는 떠 있지만 첫 레슨 로딩이 아직 끝나지 않은 상태입니다.

use crate::routes::lessons::AppState;
use axum::{extract::State, Json};
use serde_json::{json, Value};

/// `GET /health` — 서버 상태와 첫 로딩 완료 여부를 확인합니다.
///
/// 참고: `Result`를 사용하지 않으므로 이 핸들러는 실패하지 않습니다.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let loading = state.sync.lock().await.is_loading();
    Json(json!({
        "status": "ok",
        "loading": loading
    }))
}
