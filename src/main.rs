//! # Studytrack 웹 서버 진입점
//!
//! 학습한 레슨과 복습 날짜를 기록하는 서비스의 **시작점(entry point)**입니다.
//!
//! 이 파일이 수행하는 작업:
//! 1. 환경변수(.env) 로딩
//! 2. 로깅(tracing) 초기화
//! 3. 원격 저장소(SQLite) 연결 풀 생성과 마이그레이션
//! 4. 로컬 저장소(JSON 파일) 열기
//! 5. 인증 협력자와 레슨 동기화기 생성
//! 6. 첫 로딩과 세션 변경 구독을 백그라운드로 시작
//! 7. API 라우터 설정 후 HTTP 서버 시작

mod config;
mod db;
mod error;
mod models;
mod routes;
mod services;

use anyhow::Result;
use axum::Router;
use config::Config;
use routes::AppState;
use services::{
    auth::{Authenticator, PasswordAuthenticator},
    local_store::LocalStore,
    sync::{follow_session_changes, initialize_shared, LessonSync},
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{path::Path, str::FromStr, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1단계: 환경변수 로딩 ──
    // .env 파일이 없어도 에러 없이 넘어갑니다.
    dotenvy::dotenv().ok();

    // ── 2단계: 로깅(tracing) 초기화 ──
    // RUST_LOG가 없으면 studytrack, tower_http, axum 모듈을 debug 레벨로 설정
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studytrack=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!("Starting Studytrack server on {}:{}", config.host, config.port);

    // ── 3단계: 원격 저장소 연결 ──
    // create_if_missing: DB 파일이 없으면 새로 만듭니다.
    let connect_options =
        SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await?;

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;

    // ── 4단계: 로컬 저장소 열기 ──
    // 파일이 깨져 있으면 덮어쓰지 않고 시작을 중단합니다.
    let store = LocalStore::open(&config.local_store_path).await?;
    tracing::info!("Local store: {}", store.path().display());

    // ── 5단계: 인증 협력자와 동기화기 ──
    // 같은 PasswordAuthenticator를 라우터(계정 등록)와 동기화기(로그인/로그아웃)가 공유합니다.
    let auth = Arc::new(PasswordAuthenticator::new(
        pool.clone(),
        store.clone(),
        config.jwt_secret.clone(),
    ));
    let session_updates = auth.subscribe();
    let sync = LessonSync::new(auth.clone(), store, pool).into_shared();

    // ── 6단계: 첫 로딩과 세션 구독 ──
    // 첫 로딩이 끝날 때까지 스냅샷은 `loading: true`이고, 변경 요청은 503으로 거절됩니다.
    // 첫 로딩은 동기화기 잠금을 쥐지 않으므로, 그동안에도 헬스체크와 조회는 바로 응답합니다.
    {
        let sync = sync.clone();
        tokio::spawn(async move {
            if let Err(e) = initialize_shared(&sync).await {
                tracing::error!("Initial lesson load failed: {}", e);
            }
        });
    }
    tokio::spawn(follow_session_changes(sync.clone(), session_updates));

    let state = AppState { sync, auth };

    // ── 7단계: 라우터와 미들웨어 ──
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let frontend_dist = Path::new(&config.frontend_dist);
    let app = if frontend_dist.exists() {
        tracing::info!("Serving frontend static files from {}", config.frontend_dist);

        // SPA이므로, 찾을 수 없는 경로는 index.html로 돌려보냅니다.
        let serve_dir = ServeDir::new(frontend_dist)
            .not_found_service(ServeFile::new(frontend_dist.join("index.html")));

        Router::new()
            .nest("/api/v1", routes::api_router(state))
            .fallback_service(serve_dir)
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    } else {
        tracing::warn!("Frontend dist directory not found, serving API only");

        Router::new()
            .nest("/api/v1", routes::api_router(state))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    };

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
