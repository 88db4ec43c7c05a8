//! # 레슨 목록 동기화기 (Lesson List Synchronizer)
//!
//! 메모리의 레슨 목록을 들고 있으면서, 현재 세션에 맞는 저장소 하나에 반영합니다.
//!
//! ## 세션별 저장소
//! - 익명: `LocalRepository` — 목록이 바뀔 때마다 전체를 로컬 저장소에 씀
//! - 로그인: `RemoteRepository` — 작업마다 원격 문서 하나를 생성/수정/삭제
//!
//! 저장소는 세션이 바뀔 때 한 번만 선택됩니다 (`select_repository`).
//!
//! ## 일관성 규칙
//! - 저장소 쓰기가 먼저, 메모리 변경은 그 다음입니다.
//!   저장소 쓰기가 실패하면 메모리는 그대로 남습니다.
//! - 메모리 변경 뒤의 스냅샷 쓰기(`persist_snapshot`)가 실패하면 메모리 변경을 되돌립니다.
//! - 모든 실패는 로그를 남기고 `AppError`로 호출자에게 전달됩니다.
//!
//! ## 동시성
//! `SharedSync`(= `Arc<Mutex<LessonSync>>`)의 잠금을 작업이 끝날 때까지 쥐고 있으므로,
//! 빠르게 연속된 두 복습 추가도 차례대로 처리되어 둘 다 기록됩니다.
//!
//! 예외는 첫 로딩입니다. `initialize_shared()`는 세션 조회와 목록 읽기를
//! 잠금 밖에서 하고, 결과를 설치할 때만 잠급니다. 그동안 다른 요청은
//! `loading: true` 스냅샷이나 503을 바로 받습니다.

use crate::{
    error::AppError,
    models::*,
    services::{
        auth::Authenticator,
        local_store::LocalStore,
        repository::{LessonRepository, LocalRepository, RemoteRepository, LESSONS_KEY},
    },
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// 핸들러와 세션 구독 태스크가 함께 쓰는 동기화기
pub type SharedSync = Arc<Mutex<LessonSync>>;

pub struct LessonSync {
    auth: Arc<dyn Authenticator>,
    store: LocalStore,
    pool: SqlitePool,
    session: Session,
    repo: Box<dyn LessonRepository>,
    lessons: Vec<Lesson>,
    loading: bool,
}

impl LessonSync {
    /// 익명 세션, 빈 목록, 로딩 중 상태로 시작합니다.
    /// 첫 로딩은 `initialize()`가 수행합니다.
    pub fn new(auth: Arc<dyn Authenticator>, store: LocalStore, pool: SqlitePool) -> Self {
        let repo = Box::new(LocalRepository::new(store.clone()));
        Self {
            auth,
            store,
            pool,
            session: Session::Anonymous,
            repo,
            lessons: Vec::new(),
            loading: true,
        }
    }

    pub fn into_shared(self) -> SharedSync {
        Arc::new(Mutex::new(self))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn snapshot(&self) -> LessonSnapshot {
        LessonSnapshot {
            session: self.session.clone(),
            loading: self.loading,
            lessons: self.lessons.clone(),
        }
    }

    /// 인증 협력자에게 현재 사용자를 묻고 첫 로딩을 수행합니다.
    ///
    /// 세션 조회에 실패하면 익명으로 시작합니다.
    /// 공유된 동기화기에서는 잠금을 오래 쥐지 않는 `initialize_shared()`를 씁니다.
    pub async fn initialize(&mut self) -> Result<(), AppError> {
        let load = self.initial_loader().run().await;
        self.finish_initial_load(load)
    }

    fn initial_loader(&self) -> InitialLoader {
        InitialLoader {
            auth: self.auth.clone(),
            store: self.store.clone(),
            pool: self.pool.clone(),
        }
    }

    /// 잠금 밖에서 읽어온 첫 로딩 결과를 설치하고 로딩 상태를 끝냅니다.
    fn finish_initial_load(&mut self, load: InitialLoad) -> Result<(), AppError> {
        self.repo = load.repo;
        self.session = load.session;
        self.loading = false;

        let result = match load.lessons {
            Ok(lessons) => {
                self.lessons = lessons;
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to load lessons from {} store: {}", self.repo.backend(), e);
                self.lessons.clear();
                Err(e)
            }
        };
        tracing::info!(
            "Initial load finished: {} lessons from {} store",
            self.lessons.len(),
            self.repo.backend()
        );
        result
    }

    /// 현재 세션의 저장소에서 목록 전체를 다시 읽어 메모리를 교체합니다.
    ///
    /// 읽기에 실패하면 목록을 비운 채 에러를 반환합니다.
    /// 다른 세션의 목록이 화면에 남아 있지 않게 하기 위함입니다.
    pub async fn load_lessons(&mut self) -> Result<(), AppError> {
        match self.repo.load_all().await {
            Ok(lessons) => {
                tracing::debug!(
                    "Loaded {} lessons from {} store",
                    lessons.len(),
                    self.repo.backend()
                );
                self.lessons = lessons;
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to load lessons from {} store: {}", self.repo.backend(), e);
                self.lessons.clear();
                Err(e)
            }
        }
    }

    /// 오늘 학습한 레슨을 목록 끝에 추가합니다.
    ///
    /// 이름이 공백뿐이면 아무것도 하지 않고 `Ok(None)`을 반환합니다.
    /// 이름은 입력된 그대로 저장됩니다 (앞뒤 공백 포함).
    pub async fn add_lesson(&mut self, name: &str) -> Result<Option<Lesson>, AppError> {
        self.ensure_loaded()?;
        if name.trim().is_empty() {
            return Ok(None);
        }

        let lesson = self
            .repo
            .create(NewLesson::studied_today(name))
            .await
            .map_err(|e| self.log_failure("create lesson", e))?;

        self.lessons.push(lesson.clone());
        if let Err(e) = self.repo.persist_snapshot(&self.lessons).await {
            self.lessons.pop();
            return Err(self.log_failure("save lesson list", e));
        }

        tracing::info!("Added lesson {} ({})", lesson.id, lesson.name);
        Ok(Some(lesson))
    }

    /// 레슨의 복습 기록 끝에 오늘 날짜를 추가합니다.
    ///
    /// 메모리에 없는 레슨이면 저장소를 건드리지 않고 `NotFound`를 반환합니다.
    pub async fn add_review(&mut self, id: &LessonId) -> Result<Lesson, AppError> {
        self.ensure_loaded()?;
        let index = self.position(id)?;

        let mut reviews = self.lessons[index].reviews.clone();
        reviews.push(today());

        self.repo
            .update_reviews(id, &reviews)
            .await
            .map_err(|e| self.log_failure("save review", e))?;

        let previous = std::mem::replace(&mut self.lessons[index].reviews, reviews);
        if let Err(e) = self.repo.persist_snapshot(&self.lessons).await {
            self.lessons[index].reviews = previous;
            return Err(self.log_failure("save lesson list", e));
        }

        let lesson = self.lessons[index].clone();
        tracing::info!("Reviewed lesson {} ({} reviews)", lesson.id, lesson.reviews.len());
        Ok(lesson)
    }

    /// 레슨을 삭제합니다. 나머지 레슨의 순서는 유지됩니다.
    pub async fn delete_lesson(&mut self, id: &LessonId) -> Result<Lesson, AppError> {
        self.ensure_loaded()?;
        let index = self.position(id)?;

        self.repo
            .delete(id)
            .await
            .map_err(|e| self.log_failure("delete lesson", e))?;

        let removed = self.lessons.remove(index);
        if let Err(e) = self.repo.persist_snapshot(&self.lessons).await {
            self.lessons.insert(index, removed);
            return Err(self.log_failure("save lesson list", e));
        }

        tracing::info!("Deleted lesson {} ({})", removed.id, removed.name);
        Ok(removed)
    }

    /// 로그인하고, 로컬 레슨을 새 사용자의 원격 저장소로 옮긴 뒤 원격 목록을 읽습니다.
    ///
    /// 인증에 실패하면 세션은 그대로입니다.
    /// 이전이 중간에 실패해도 로그인은 유지되며, 남은 레슨 수가 보고서의 `pending`에 담깁니다.
    /// 원격 목록을 읽지 못하면 로그인은 유지되고, 보고서의 `load_error`에 원인이 담깁니다.
    pub async fn sign_in(&mut self, credentials: &Credentials) -> Result<SignInReport, AppError> {
        self.ensure_loaded()?;
        if self.session.is_authenticated() {
            return Err(AppError::Conflict("Already signed in".to_string()));
        }

        let user = self
            .auth
            .sign_in(credentials)
            .await
            .map_err(|e| self.log_failure("sign in", e))?;

        let (migrated, pending) = self.migrate_local_lessons(&user).await;

        self.switch_session(Session::Authenticated { user: user.clone() });
        let load_error = match self.load_lessons().await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!("Signed in but could not load remote lessons: {}", e);
                Some(e.to_string())
            }
        };

        Ok(SignInReport {
            user,
            migrated,
            pending,
            load_error,
        })
    }

    /// 로그아웃하고, 메모리를 비운 뒤 로컬 저장소에서 다시 읽습니다.
    ///
    /// 이미 익명이면 아무것도 하지 않습니다.
    pub async fn sign_out(&mut self) -> Result<(), AppError> {
        self.ensure_loaded()?;
        if !self.session.is_authenticated() {
            return Ok(());
        }

        self.auth
            .sign_out()
            .await
            .map_err(|e| self.log_failure("sign out", e))?;

        self.switch_session(Session::Anonymous);
        self.load_lessons().await
    }

    /// 인증 협력자가 알린 세션 변화를 반영합니다.
    ///
    /// 앱 밖에서 세션이 복원되거나 만료된 경우에 쓰입니다.
    /// 현재 세션과 같으면 아무것도 하지 않고 `false`를 반환합니다.
    /// 이 경로에서는 로컬 레슨 이전을 하지 않습니다.
    pub async fn apply_session(&mut self, user: Option<UserIdentity>) -> Result<bool, AppError> {
        let session = Session::from_user(user);
        if session == self.session {
            return Ok(false);
        }

        tracing::info!("Session changed externally: {:?}", session);
        self.switch_session(session);
        self.load_lessons().await?;
        Ok(true)
    }

    /// 세션을 바꾸고 그 세션의 저장소를 고릅니다. 메모리 목록은 비웁니다.
    fn switch_session(&mut self, session: Session) {
        self.repo = select_repository(&session, &self.store, &self.pool);
        self.session = session;
        self.lessons.clear();
    }

    /// 로컬 저장소의 레슨을 하나씩 원격 문서로 복사합니다.
    ///
    /// 모두 성공하면 로컬 키를 지웁니다.
    /// 중간에 실패하면 아직 옮기지 못한 레슨만 로컬에 남겨,
    /// 다음 로그인 때 중복 없이 다시 시도할 수 있게 합니다.
    ///
    /// 반환값: (옮긴 수, 남은 수)
    async fn migrate_local_lessons(&self, user: &UserIdentity) -> (usize, usize) {
        let local = LocalRepository::new(self.store.clone());
        let pending = match local.load_all().await {
            Ok(lessons) => lessons,
            Err(e) => {
                tracing::warn!("Could not read local lessons for migration: {}", e);
                return (0, 0);
            }
        };
        if pending.is_empty() {
            return (0, 0);
        }

        let remote = RemoteRepository::new(self.pool.clone(), user.id.clone());
        for (index, lesson) in pending.iter().enumerate() {
            if let Err(e) = remote.create(NewLesson::copy_of(lesson)).await {
                let remaining = &pending[index..];
                tracing::warn!(
                    "Migrated {} of {} local lessons for user {}; {} left locally: {}",
                    index,
                    pending.len(),
                    user.id,
                    remaining.len(),
                    e
                );
                if let Err(e) = local.persist_snapshot(remaining).await {
                    tracing::error!("Could not write back unmigrated lessons: {}", e);
                }
                return (index, remaining.len());
            }
        }

        if let Err(e) = self.store.remove(LESSONS_KEY).await {
            tracing::error!("Migrated local lessons but could not clear local store: {}", e);
        }
        tracing::info!("Migrated {} local lessons for user {}", pending.len(), user.id);
        (pending.len(), 0)
    }

    fn ensure_loaded(&self) -> Result<(), AppError> {
        if self.loading {
            return Err(AppError::ServiceUnavailable(
                "Lessons are still loading".to_string(),
            ));
        }
        Ok(())
    }

    fn position(&self, id: &LessonId) -> Result<usize, AppError> {
        self.lessons
            .iter()
            .position(|lesson| &lesson.id == id)
            .ok_or(AppError::NotFound)
    }

    fn log_failure(&self, action: &str, e: AppError) -> AppError {
        tracing::error!("Failed to {} ({} store): {}", action, self.repo.backend(), e);
        e
    }
}

/// 세션에 맞는 저장소 구현체
fn select_repository(
    session: &Session,
    store: &LocalStore,
    pool: &SqlitePool,
) -> Box<dyn LessonRepository> {
    match session.user() {
        Some(user) => Box::new(RemoteRepository::new(pool.clone(), user.id.clone())),
        None => Box::new(LocalRepository::new(store.clone())),
    }
}

/// 첫 로딩에 필요한 협력자들 (잠금 밖에서 사용)
struct InitialLoader {
    auth: Arc<dyn Authenticator>,
    store: LocalStore,
    pool: SqlitePool,
}

/// 잠금 밖에서 읽어온 첫 로딩 결과
struct InitialLoad {
    session: Session,
    repo: Box<dyn LessonRepository>,
    lessons: Result<Vec<Lesson>, AppError>,
}

impl InitialLoader {
    async fn run(self) -> InitialLoad {
        let user = match self.auth.current_user().await {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!("Could not restore session, starting anonymous: {}", e);
                None
            }
        };
        let session = Session::from_user(user);
        let repo = select_repository(&session, &self.store, &self.pool);
        let lessons = repo.load_all().await;
        InitialLoad {
            session,
            repo,
            lessons,
        }
    }
}

/// 공유된 동기화기의 첫 로딩
///
/// 잠금은 협력자를 꺼낼 때와 결과를 설치할 때만 잠깐 쥡니다.
/// 그 사이에 들어온 요청은 `loading: true` 상태를 보게 됩니다.
pub async fn initialize_shared(sync: &SharedSync) -> Result<(), AppError> {
    let loader = sync.lock().await.initial_loader();
    let load = loader.run().await;
    sync.lock().await.finish_initial_load(load)
}

/// 인증 협력자의 세션 알림을 받아 동기화기에 반영하는 루프
///
/// 송신자가 사라지면(`changed()`가 에러) 종료합니다.
pub async fn follow_session_changes(
    sync: SharedSync,
    mut updates: watch::Receiver<Option<UserIdentity>>,
) {
    while updates.changed().await.is_ok() {
        let user = updates.borrow_and_update().clone();
        let mut sync = sync.lock().await;
        if sync.is_loading() {
            // initialize()가 직접 세션을 조회합니다
            continue;
        }
        if let Err(e) = sync.apply_session(user).await {
            tracing::warn!("Failed to apply session change: {}", e);
        }
    }
    tracing::debug!("Session subscription closed");
}
