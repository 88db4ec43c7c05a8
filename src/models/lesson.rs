//! # 레슨 모델 정의
//!
//! 학습한 레슨(Lesson)과 복습 기록을 표현하는 데이터 구조체들을 정의합니다.
//!
//! ## 구조체 역할
//! - `LessonId`: 로컬(타임스탬프 숫자) / 원격(문서 키 문자열) 식별자
//! - `Lesson`: 목록에 표시되고 로컬 저장소에 JSON으로 저장되는 레슨
//! - `NewLesson`: 저장소에 새로 만들 레슨 (아직 식별자 없음)
//! - `LessonRow`: 원격 저장소 `lessons` 테이블의 한 행
//! - `LessonSnapshot`: 클라이언트가 화면에 그리는 목록 상태 전체
//!
//! ## JSON 형식
//! 로컬 저장소 값은 기존 브라우저 저장 형식과 같습니다:
//! ```text
//! [{"id":1712345678901,"name":"Algebra","dateStudied":"2024-04-05","reviews":[]}]
//! ```

use crate::error::AppError;
use crate::models::session::Session;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 날짜 저장 형식 (`yyyy-MM-dd`)
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// 오늘 날짜 (로컬 시간대 기준)
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// 레슨 식별자
///
/// 어느 저장소가 레슨을 만들었는지에 따라 형태가 다릅니다.
/// - `Local`: 로컬 저장소가 부여한 밀리초 타임스탬프 (JSON 숫자)
/// - `Remote`: 원격 저장소가 부여한 문서 키 (JSON 문자열, UUIDv7)
///
/// `#[serde(untagged)]`: 태그 없이 값의 모양(숫자/문자열)으로 variant를 구분합니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LessonId {
    Local(i64),
    Remote(String),
}

impl fmt::Display for LessonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LessonId::Local(id) => write!(f, "{}", id),
            LessonId::Remote(key) => f.write_str(key),
        }
    }
}

/// URL 경로(`/lessons/{id}`)의 문자열을 식별자로 변환합니다.
///
/// 숫자로만 이루어져 있으면 로컬 식별자, 아니면 원격 문서 키입니다.
/// UUID는 하이픈을 포함하므로 숫자로 해석될 일이 없습니다.
impl FromStr for LessonId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AppError::BadRequest("Lesson id must not be empty".to_string()));
        }
        Ok(match s.parse::<i64>() {
            Ok(id) => LessonId::Local(id),
            Err(_) => LessonId::Remote(s.to_string()),
        })
    }
}

/// 레슨 엔티티
///
/// 생성 후 `name`과 `date_studied`는 바뀌지 않고,
/// `reviews`는 뒤에 날짜가 추가되기만 합니다 (삭제 없음).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: LessonId,
    pub name: String,
    /// 학습한 날짜 — chrono의 serde 구현이 "2024-04-05" 형식으로 직렬화합니다.
    pub date_studied: NaiveDate,
    #[serde(default)]
    pub reviews: Vec<NaiveDate>,
    /// 원격 저장소에 있는 레슨에만 존재하는 소유자 ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}

/// 저장소에 새로 만들 레슨
#[derive(Debug, Clone)]
pub struct NewLesson {
    pub name: String,
    pub date_studied: NaiveDate,
    pub reviews: Vec<NaiveDate>,
}

impl NewLesson {
    /// 오늘 학습한, 복습 기록이 없는 레슨
    pub fn studied_today(name: &str) -> Self {
        Self {
            name: name.to_string(),
            date_studied: today(),
            reviews: Vec::new(),
        }
    }

    /// 로그인 시 로컬 레슨을 원격으로 옮길 때 사용합니다.
    /// 식별자와 소유자만 새로 받고 나머지 내용은 그대로 유지됩니다.
    pub fn copy_of(lesson: &Lesson) -> Self {
        Self {
            name: lesson.name.clone(),
            date_studied: lesson.date_studied,
            reviews: lesson.reviews.clone(),
        }
    }
}

/// 원격 저장소 `lessons` 테이블의 한 행
///
/// SQLite에는 날짜/배열 타입이 없으므로 날짜는 TEXT,
/// 복습 기록은 JSON 배열 TEXT로 저장됩니다.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LessonRow {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub date_studied: String,
    pub reviews: String,
}

impl TryFrom<LessonRow> for Lesson {
    type Error = AppError;

    fn try_from(row: LessonRow) -> Result<Self, Self::Error> {
        let date_studied = NaiveDate::parse_from_str(&row.date_studied, DATE_FORMAT)
            .map_err(|e| {
                AppError::Internal(format!("Lesson {} has invalid date: {}", row.id, e))
            })?;
        let reviews: Vec<NaiveDate> = serde_json::from_str(&row.reviews)?;

        Ok(Lesson {
            id: LessonId::Remote(row.id),
            name: row.name,
            date_studied,
            reviews,
            owner_id: Some(row.owner_id),
        })
    }
}

/// 레슨 추가 요청 — `POST /api/v1/lessons`의 요청 본문
#[derive(Debug, Deserialize)]
pub struct CreateLessonRequest {
    pub name: String,
}

/// 화면에 그려질 목록 상태 전체
///
/// 모든 변경 요청은 처리 후 이 스냅샷을 돌려줍니다.
/// `loading`이 true인 동안에는 첫 로딩이 끝나지 않은 상태입니다.
#[derive(Debug, Clone, Serialize)]
pub struct LessonSnapshot {
    pub session: Session,
    pub loading: bool,
    pub lessons: Vec<Lesson>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    #[test]
    fn test_local_json_matches_browser_format() {
        let raw = r#"[{"id":1712345678901,"name":"Algebra","dateStudied":"2024-04-05","reviews":["2024-04-06"]}]"#;
        let lessons: Vec<Lesson> = serde_json::from_str(raw).unwrap();

        assert_eq!(lessons.len(), 1);
        assert_eq!(lessons[0].id, LessonId::Local(1712345678901));
        assert_eq!(lessons[0].date_studied, date("2024-04-05"));
        assert_eq!(lessons[0].reviews, vec![date("2024-04-06")]);
        assert_eq!(lessons[0].owner_id, None);

        // ownerId는 없을 때 생략되므로 같은 문자열로 돌아옵니다.
        assert_eq!(serde_json::to_string(&lessons).unwrap(), raw);
    }

    #[test]
    fn test_remote_id_serializes_as_string() {
        let lesson = Lesson {
            id: LessonId::Remote("0190c3a2-doc".to_string()),
            name: "Physics".to_string(),
            date_studied: date("2024-01-02"),
            reviews: vec![],
            owner_id: Some("user-1".to_string()),
        };
        let value = serde_json::to_value(&lesson).unwrap();
        assert_eq!(value["id"], "0190c3a2-doc");
        assert_eq!(value["ownerId"], "user-1");
        assert_eq!(value["dateStudied"], "2024-01-02");
    }

    #[test]
    fn test_lesson_id_from_path() {
        assert_eq!("42".parse::<LessonId>().unwrap(), LessonId::Local(42));
        assert_eq!(
            "0190c3a2-7b1c-7cc0-8000-000000000000".parse::<LessonId>().unwrap(),
            LessonId::Remote("0190c3a2-7b1c-7cc0-8000-000000000000".to_string())
        );
        assert!("  ".parse::<LessonId>().is_err());
    }

    #[test]
    fn test_row_with_broken_reviews_is_rejected() {
        let row = LessonRow {
            id: "doc".to_string(),
            owner_id: "user".to_string(),
            name: "Chemistry".to_string(),
            date_studied: "2024-03-01".to_string(),
            reviews: "not json".to_string(),
        };
        assert!(matches!(
            Lesson::try_from(row),
            Err(AppError::Serialization(_))
        ));
    }
}
