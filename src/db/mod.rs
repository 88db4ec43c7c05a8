//! # 데이터베이스 접근 계층 (Data Access Layer)
//!
//! 원격 저장소(SQLite)와 직접 상호작용하는 함수들을 모아둔 모듈입니다.
//! 저장소 구현(`services::repository`)과 인증(`services::auth`)에서 호출합니다.
//!
//! 각 하위 모듈:
//! - `lessons`: 소유자별 레슨 문서 CRUD 쿼리
//! - `users`: 사용자 계정 쿼리

pub mod lessons;
pub mod users;

pub use lessons::*;

#[cfg(test)]
pub mod testing {
    //! 테스트용 인메모리 데이터베이스

    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    /// 마이그레이션이 적용된 인메모리 SQLite 풀
    ///
    /// `sqlite::memory:`는 연결마다 별도의 DB가 되므로 연결을 하나로 제한합니다.
    pub async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    /// 비밀번호 해시 없이 사용자 행만 만듭니다 (외래키 충족용).
    pub async fn insert_user(pool: &SqlitePool, id: &str, username: &str) {
        crate::db::users::insert_account(pool, id, username, username, "unused")
            .await
            .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::models::{LessonId, NewLesson};
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn test_create_and_list_by_owner() {
        let pool = memory_pool().await;
        insert_user(&pool, "u1", "alice").await;
        insert_user(&pool, "u2", "bob").await;

        let first = create_lesson(&pool, "u1", &NewLesson::studied_today("Algebra"))
            .await
            .unwrap();
        create_lesson(&pool, "u2", &NewLesson::studied_today("Biology"))
            .await
            .unwrap();
        let second = create_lesson(&pool, "u1", &NewLesson::studied_today("Calculus"))
            .await
            .unwrap();

        assert!(matches!(first.id, LessonId::Remote(_)));
        assert_eq!(first.owner_id.as_deref(), Some("u1"));

        let lessons = list_lessons_by_owner(&pool, "u1").await.unwrap();
        let names: Vec<_> = lessons.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Algebra", "Calculus"]);
        assert_eq!(lessons[1].id, second.id);
    }

    #[tokio::test]
    async fn test_update_reviews_is_owner_scoped() {
        let pool = memory_pool().await;
        insert_user(&pool, "u1", "alice").await;
        insert_user(&pool, "u2", "bob").await;

        let lesson = create_lesson(&pool, "u1", &NewLesson::studied_today("Algebra"))
            .await
            .unwrap();
        let key = lesson.id.to_string();
        let reviews = vec![date("2024-05-01"), date("2024-05-08")];

        assert!(!update_lesson_reviews(&pool, "u2", &key, &reviews).await.unwrap());
        assert!(update_lesson_reviews(&pool, "u1", &key, &reviews).await.unwrap());

        let stored = get_lesson(&pool, &key).await.unwrap().unwrap();
        assert_eq!(stored.reviews, reviews);
    }

    #[tokio::test]
    async fn test_delete_lesson() {
        let pool = memory_pool().await;
        insert_user(&pool, "u1", "alice").await;

        let lesson = create_lesson(&pool, "u1", &NewLesson::studied_today("Algebra"))
            .await
            .unwrap();
        let key = lesson.id.to_string();

        assert!(delete_lesson(&pool, "u1", &key).await.unwrap());
        assert!(!delete_lesson(&pool, "u1", &key).await.unwrap());
        assert!(get_lesson(&pool, &key).await.unwrap().is_none());
    }
}
