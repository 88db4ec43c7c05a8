//! # 라우트 핸들러 모듈
//!
//! HTTP 요청을 처리하는 핸들러 함수들을 모아둔 모듈입니다.
//! Axum에서 핸들러는 HTTP 요청을 받아 응답을 반환하는 async 함수입니다.
//!
//! 각 하위 모듈:
//! - `auth`: 계정 등록, 로그인, 로그아웃, 현재 세션
//! - `health`: 서버 상태 확인 (헬스체크)
//! - `lessons`: 레슨 목록 조회와 변경

pub mod auth;
pub mod health;
pub mod lessons;

pub use health::*;
pub use lessons::*;

use axum::{
    routing::{delete, get, post},
    Router,
};

/// `/api/v1` 아래에 중첩될 API 라우터를 만듭니다.
///
/// Axum 0.8부터 경로 파라미터는 `{id}` 형식으로 씁니다.
pub fn api_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/sign-in", post(auth::sign_in))
        .route("/auth/sign-out", post(auth::sign_out))
        .route("/auth/session", get(auth::session));

    Router::new()
        .merge(auth_routes)
        .route("/lessons", get(list_lessons).post(create_lesson))
        .route("/lessons/{id}", delete(delete_lesson))
        .route("/lessons/{id}/reviews", post(add_review))
        .route("/health", get(health_check))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::memory_pool;
    use crate::error::AppError;
    use crate::models::{Credentials, UserIdentity};
    use crate::services::{
        auth::{Authenticator, PasswordAuthenticator},
        local_store::LocalStore,
        sync::{initialize_shared, LessonSync},
    };
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use std::{sync::Arc, time::Duration};
    use tempfile::TempDir;
    use tokio::{
        sync::{watch, Notify},
        time::timeout,
    };
    use tower::ServiceExt;

    async fn test_app() -> (Router, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path().join("local.json")).await.unwrap();
        let pool = memory_pool().await;
        let auth = Arc::new(PasswordAuthenticator::new(pool.clone(), store.clone(), "secret"));
        let mut sync = LessonSync::new(auth.clone(), store, pool);
        sync.initialize().await.unwrap();

        let state = AppState {
            sync: sync.into_shared(),
            auth,
        };
        (api_router(state), dir)
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(body) => Body::from(body.to_string()),
                None => Body::empty(),
            })
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _dir) = test_app().await;
        let (status, body) = call(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok", "loading": false }));
    }

    /// 풀어줄 때까지 현재 사용자 조회가 끝나지 않는 인증 협력자
    struct HeldAuth {
        release: Arc<Notify>,
        session_tx: watch::Sender<Option<UserIdentity>>,
    }

    #[async_trait]
    impl Authenticator for HeldAuth {
        async fn current_user(&self) -> Result<Option<UserIdentity>, AppError> {
            self.release.notified().await;
            Ok(None)
        }

        async fn sign_in(&self, _credentials: &Credentials) -> Result<UserIdentity, AppError> {
            Err(AppError::Unauthorized("Invalid username or password".to_string()))
        }

        async fn sign_out(&self) -> Result<(), AppError> {
            Ok(())
        }

        fn subscribe(&self) -> watch::Receiver<Option<UserIdentity>> {
            self.session_tx.subscribe()
        }
    }

    #[tokio::test]
    async fn test_requests_during_initial_load_do_not_wait() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path().join("local.json")).await.unwrap();
        let pool = memory_pool().await;
        let release = Arc::new(Notify::new());
        let held = Arc::new(HeldAuth {
            release: release.clone(),
            session_tx: watch::channel(None).0,
        });
        let sync = LessonSync::new(held, store.clone(), pool.clone()).into_shared();
        let loader = {
            let sync = sync.clone();
            tokio::spawn(async move { initialize_shared(&sync).await })
        };
        let app = api_router(AppState {
            sync,
            auth: Arc::new(PasswordAuthenticator::new(pool, store, "secret")),
        });

        let within = Duration::from_secs(1);
        let (status, body) = timeout(within, call(&app, "GET", "/health", None))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["loading"], true);

        let (status, body) = timeout(
            within,
            call(&app, "POST", "/lessons", Some(json!({ "name": "Algebra" }))),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "loading");

        let (_, body) = timeout(within, call(&app, "GET", "/lessons", None))
            .await
            .unwrap();
        assert_eq!(body["loading"], true);

        release.notify_one();
        loader.await.unwrap().unwrap();

        let (_, body) = call(&app, "GET", "/health", None).await;
        assert_eq!(body["loading"], false);
        let (status, _) = call(&app, "POST", "/lessons", Some(json!({ "name": "Algebra" }))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_lesson_flow_over_http() {
        let (app, _dir) = test_app().await;

        let (status, body) =
            call(&app, "POST", "/lessons", Some(json!({ "name": "Algebra" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session"]["state"], "anonymous");
        let lessons = body["lessons"].as_array().unwrap();
        assert_eq!(lessons.len(), 1);
        assert_eq!(lessons[0]["name"], "Algebra");
        let id = lessons[0]["id"].as_i64().unwrap();

        let (status, body) = call(&app, "POST", &format!("/lessons/{}/reviews", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["lessons"][0]["reviews"].as_array().unwrap().len(), 1);

        let (status, body) = call(&app, "DELETE", &format!("/lessons/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["lessons"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_lesson_name_is_a_no_op() {
        let (app, _dir) = test_app().await;
        let (status, body) = call(&app, "POST", "/lessons", Some(json!({ "name": "  " }))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["lessons"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_review_of_unknown_lesson_is_404() {
        let (app, _dir) = test_app().await;
        let (status, body) = call(&app, "POST", "/lessons/12345/reviews", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn test_register_sign_in_and_out() {
        let (app, _dir) = test_app().await;
        call(&app, "POST", "/lessons", Some(json!({ "name": "Algebra" }))).await;

        let (status, user) = call(
            &app,
            "POST",
            "/auth/register",
            Some(json!({ "username": "alice", "display_name": "Alice", "password": "password123" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(user["display_name"], "Alice");

        let (status, body) = call(
            &app,
            "POST",
            "/auth/sign-in",
            Some(json!({ "username": "alice", "password": "password123" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["migrated"], 1);
        assert_eq!(body["pending"], 0);
        assert_eq!(body["snapshot"]["session"]["state"], "authenticated");
        assert!(body["snapshot"]["lessons"][0]["id"].is_string());

        let (_, session) = call(&app, "GET", "/auth/session", None).await;
        assert_eq!(session["user"]["id"], user["id"]);

        let (status, body) = call(&app, "POST", "/auth/sign-out", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session"]["state"], "anonymous");
        assert!(body["lessons"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_credentials_are_401() {
        let (app, _dir) = test_app().await;
        let (status, body) = call(
            &app,
            "POST",
            "/auth/sign-in",
            Some(json!({ "username": "nobody", "password": "password123" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "unauthorized");
    }
}
