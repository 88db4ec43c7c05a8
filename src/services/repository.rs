//! # 레슨 저장소 (Repository) 추상화
//!
//! 로컬 저장소와 원격 저장소를 하나의 트레이트 `LessonRepository` 뒤에 숨깁니다.
//! 동기화기(`services::sync`)는 세션이 바뀔 때 한 번만 구현체를 고르고,
//! 이후의 변경 작업에서는 "로그인했는가?"를 다시 묻지 않습니다.
//!
//! | 구현체 | 사용 시점 | 식별자 | 영속화 방식 |
//! |--------|-----------|--------|-------------|
//! | `LocalRepository` | 익명 | 밀리초 타임스탬프 | 변경마다 목록 전체를 씀 |
//! | `RemoteRepository` | 로그인 | UUIDv7 문서 키 | 작업마다 문서 하나를 씀 |

use crate::{
    db,
    error::AppError,
    models::*,
    services::local_store::LocalStore,
};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicI64, Ordering};

/// 로컬 저장소에서 레슨 목록을 보관하는 고정 키
pub const LESSONS_KEY: &str = "studyLessons";
/// 해석하지 못한 레슨 목록 원본을 보관하는 키
pub const LESSONS_BACKUP_KEY: &str = "studyLessons.corrupt";

/// 레슨 저장소가 제공해야 하는 기능
///
/// `#[async_trait]`: 트레이트의 async fn을 `Box<dyn LessonRepository>`로
/// 사용할 수 있도록 변환합니다.
#[async_trait]
pub trait LessonRepository: Send + Sync {
    /// 로그에 표시할 저장소 이름
    fn backend(&self) -> &'static str;

    /// 저장된 레슨 전체를 순서대로 읽어옵니다.
    async fn load_all(&self) -> Result<Vec<Lesson>, AppError>;

    /// 새 레슨을 만들고 식별자가 부여된 레슨을 반환합니다.
    async fn create(&self, lesson: NewLesson) -> Result<Lesson, AppError>;

    /// 레슨의 복습 기록 전체를 저장합니다.
    async fn update_reviews(&self, id: &LessonId, reviews: &[NaiveDate]) -> Result<(), AppError>;

    /// 레슨을 삭제합니다.
    async fn delete(&self, id: &LessonId) -> Result<(), AppError>;

    /// 메모리의 목록이 바뀐 뒤 호출됩니다.
    ///
    /// 목록 전체를 한 번에 보관하는 저장소만 구현합니다.
    async fn persist_snapshot(&self, _lessons: &[Lesson]) -> Result<(), AppError> {
        Ok(())
    }
}

/// 익명 상태의 저장소 — 로컬 저장소의 `"studyLessons"` 키 하나에 목록 전체를 보관합니다.
#[derive(Debug)]
pub struct LocalRepository {
    store: LocalStore,
    last_id: AtomicI64,
}

impl LocalRepository {
    pub fn new(store: LocalStore) -> Self {
        Self {
            store,
            last_id: AtomicI64::new(0),
        }
    }

    /// 현재 시각(밀리초) 기반 식별자
    ///
    /// 같은 밀리초에 두 번 호출되거나 시계가 뒤로 가도 항상 이전 값보다 커집니다.
    fn next_id(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let prev = match self
            .last_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            }) {
            Ok(prev) | Err(prev) => prev,
        };
        now.max(prev + 1)
    }

    /// 목록에서 가장 큰 로컬 식별자를 기억해 새 식별자와 겹치지 않게 합니다.
    fn remember_ids(&self, lessons: &[Lesson]) {
        let max = lessons
            .iter()
            .filter_map(|lesson| match lesson.id {
                LessonId::Local(id) => Some(id),
                LessonId::Remote(_) => None,
            })
            .max();
        if let Some(max) = max {
            self.last_id.fetch_max(max, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl LessonRepository for LocalRepository {
    fn backend(&self) -> &'static str {
        "local"
    }

    /// 값이 없으면 빈 목록입니다.
    ///
    /// 값이 JSON 목록으로 해석되지 않으면 원본을 `LESSONS_BACKUP_KEY`에 옮겨두고
    /// 빈 목록으로 시작합니다. 다음 저장이 원본을 덮어써도 백업은 남습니다.
    async fn load_all(&self) -> Result<Vec<Lesson>, AppError> {
        let Some(raw) = self.store.get(LESSONS_KEY).await else {
            return Ok(Vec::new());
        };

        match serde_json::from_str::<Vec<Lesson>>(&raw) {
            Ok(lessons) => {
                self.remember_ids(&lessons);
                Ok(lessons)
            }
            Err(e) => {
                tracing::warn!(
                    "Local lesson list is malformed ({}); backing it up under {:?}",
                    e,
                    LESSONS_BACKUP_KEY
                );
                self.store.set(LESSONS_BACKUP_KEY, raw).await?;
                Ok(Vec::new())
            }
        }
    }

    async fn create(&self, lesson: NewLesson) -> Result<Lesson, AppError> {
        Ok(Lesson {
            id: LessonId::Local(self.next_id()),
            name: lesson.name,
            date_studied: lesson.date_studied,
            reviews: lesson.reviews,
            owner_id: None,
        })
    }

    // 개별 변경은 persist_snapshot()의 전체 쓰기로 반영됩니다.
    async fn update_reviews(&self, _id: &LessonId, _reviews: &[NaiveDate]) -> Result<(), AppError> {
        Ok(())
    }

    async fn delete(&self, _id: &LessonId) -> Result<(), AppError> {
        Ok(())
    }

    async fn persist_snapshot(&self, lessons: &[Lesson]) -> Result<(), AppError> {
        let raw = serde_json::to_string(lessons)?;
        self.store.set(LESSONS_KEY, raw).await
    }
}

/// 로그인 상태의 저장소 — 한 사용자(owner)의 원격 레슨 문서들만 다룹니다.
#[derive(Debug, Clone)]
pub struct RemoteRepository {
    pool: SqlitePool,
    owner_id: String,
}

impl RemoteRepository {
    pub fn new(pool: SqlitePool, owner_id: impl Into<String>) -> Self {
        Self {
            pool,
            owner_id: owner_id.into(),
        }
    }

    /// 원격 문서 키만 허용합니다. 로컬 식별자는 원격 저장소에 존재할 수 없습니다.
    fn document_key(id: &LessonId) -> Result<&str, AppError> {
        match id {
            LessonId::Remote(key) => Ok(key),
            LessonId::Local(_) => Err(AppError::NotFound),
        }
    }
}

#[async_trait]
impl LessonRepository for RemoteRepository {
    fn backend(&self) -> &'static str {
        "remote"
    }

    async fn load_all(&self) -> Result<Vec<Lesson>, AppError> {
        db::list_lessons_by_owner(&self.pool, &self.owner_id).await
    }

    async fn create(&self, lesson: NewLesson) -> Result<Lesson, AppError> {
        db::create_lesson(&self.pool, &self.owner_id, &lesson).await
    }

    async fn update_reviews(&self, id: &LessonId, reviews: &[NaiveDate]) -> Result<(), AppError> {
        let key = Self::document_key(id)?;
        if db::update_lesson_reviews(&self.pool, &self.owner_id, key, reviews).await? {
            Ok(())
        } else {
            Err(AppError::NotFound)
        }
    }

    /// 이미 지워진 문서를 다시 지우는 것은 성공으로 처리합니다.
    async fn delete(&self, id: &LessonId) -> Result<(), AppError> {
        let key = Self::document_key(id)?;
        if !db::delete_lesson(&self.pool, &self.owner_id, key).await? {
            tracing::warn!("Remote lesson {} was already gone", key);
        }
        Ok(())
    }
}
