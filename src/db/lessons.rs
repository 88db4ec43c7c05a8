//! # 원격 레슨 문서 쿼리 모듈
//!
//! `lessons` 테이블에 대한 CRUD 쿼리 함수들입니다.
//! 이 테이블은 로그인한 사용자의 레슨을 보관하는 "원격 저장소" 역할을 하며,
//! 모든 조회는 소유자(owner_id) 기준으로 이루어집니다.
//!
//! 모든 함수는 `async`이며 `SqlitePool`을 받아 데이터베이스와 상호작용합니다.

use crate::error::AppError;
use crate::models::*;
use chrono::NaiveDate;
use sqlx::SqlitePool;

/// 소유자의 모든 레슨을 생성 순서대로 조회합니다.
///
/// UUIDv7은 생성 시각 순으로 정렬되므로, 같은 밀리초에 만들어진
/// 문서도 `id`로 순서가 결정됩니다.
pub async fn list_lessons_by_owner(
    pool: &SqlitePool,
    owner_id: &str,
) -> Result<Vec<Lesson>, AppError> {
    let rows = sqlx::query_as::<_, LessonRow>(
        r#"
        SELECT id, owner_id, name, date_studied, reviews
        FROM lessons
        WHERE owner_id = ?
        ORDER BY created_at, id
        "#,
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    // 행 하나라도 해석에 실패하면 전체 조회를 실패로 처리합니다.
    // collect::<Result<Vec<_>, _>>(): 첫 번째 Err에서 멈추고 그 에러를 반환
    rows.into_iter().map(Lesson::try_from).collect()
}

/// 문서 키로 단일 레슨을 조회합니다.
///
/// # 반환값
/// - `Ok(Some(Lesson))`: 문서를 찾은 경우
/// - `Ok(None)`: 해당 키의 문서가 없는 경우
pub async fn get_lesson(pool: &SqlitePool, id: &str) -> Result<Option<Lesson>, AppError> {
    let row = sqlx::query_as::<_, LessonRow>(
        r#"
        SELECT id, owner_id, name, date_studied, reviews
        FROM lessons
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(Lesson::try_from).transpose()
}

/// 새 레슨 문서를 생성하고, 저장소가 부여한 키를 가진 레슨을 반환합니다.
pub async fn create_lesson(
    pool: &SqlitePool,
    owner_id: &str,
    lesson: &NewLesson,
) -> Result<Lesson, AppError> {
    let id = uuid::Uuid::now_v7().to_string();
    let reviews = serde_json::to_string(&lesson.reviews)?;

    sqlx::query(
        r#"
        INSERT INTO lessons (id, owner_id, name, date_studied, reviews)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(owner_id)
    .bind(&lesson.name)
    .bind(lesson.date_studied.format(DATE_FORMAT).to_string())
    .bind(&reviews)
    .execute(pool)
    .await?;

    get_lesson(pool, &id)
        .await?
        .ok_or(AppError::Internal("Failed to retrieve created lesson".to_string()))
}

/// 레슨 문서의 복습 기록 전체를 덮어씁니다 (부분 업데이트).
///
/// 소유자가 일치하는 문서만 수정합니다.
///
/// # 반환값
/// - `Ok(true)`: 수정 성공
/// - `Ok(false)`: 해당 소유자의 문서가 없음
pub async fn update_lesson_reviews(
    pool: &SqlitePool,
    owner_id: &str,
    id: &str,
    reviews: &[NaiveDate],
) -> Result<bool, AppError> {
    let reviews = serde_json::to_string(reviews)?;

    let result = sqlx::query(
        r#"
        UPDATE lessons
        SET reviews = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
        WHERE id = ? AND owner_id = ?
        "#,
    )
    .bind(&reviews)
    .bind(id)
    .bind(owner_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// 레슨 문서를 삭제합니다.
///
/// # 반환값
/// - `Ok(true)`: 삭제 성공
/// - `Ok(false)`: 해당 소유자의 문서가 없음
pub async fn delete_lesson(pool: &SqlitePool, owner_id: &str, id: &str) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM lessons WHERE id = ? AND owner_id = ?")
        .bind(id)
        .bind(owner_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
