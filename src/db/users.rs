//! 계정 조회와 생성
//!
//! 인증 협력자(`services::auth`)가 필요로 하는 형태로만 읽습니다:
//! 로그인 검증용 `Account`, 세션 복원용 `UserIdentity`.

use crate::error::AppError;
use crate::models::user::{Account, UserIdentity};
use sqlx::SqlitePool;

/// 계정을 만들고 새 사용자의 신원을 반환합니다.
///
/// 같은 아이디가 이미 있으면 UNIQUE 제약 위반을 `Conflict`로 바꿉니다.
pub async fn insert_account(
    pool: &SqlitePool,
    id: &str,
    username: &str,
    display_name: &str,
    password_hash: &str,
) -> Result<UserIdentity, AppError> {
    sqlx::query_as::<_, UserIdentity>(
        r#"
        INSERT INTO users (id, username, display_name, password_hash)
        VALUES (?, ?, ?, ?)
        RETURNING id, display_name
        "#,
    )
    .bind(id)
    .bind(username)
    .bind(display_name)
    .bind(password_hash)
    .fetch_one(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            AppError::Conflict("Username already exists".to_string())
        }
        e => AppError::Database(e),
    })
}

/// 로그인할 때 비밀번호 해시를 확인하기 위한 조회
pub async fn find_account(pool: &SqlitePool, username: &str) -> Result<Option<Account>, AppError> {
    let account = sqlx::query_as::<_, Account>(
        r#"
        SELECT id, display_name, password_hash
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(account)
}

/// 저장된 세션 토큰의 사용자가 아직 있는지 확인할 때 사용합니다.
pub async fn find_identity(pool: &SqlitePool, id: &str) -> Result<Option<UserIdentity>, AppError> {
    let identity = sqlx::query_as::<_, UserIdentity>(
        "SELECT id, display_name FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(identity)
}
