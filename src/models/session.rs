//! # 로그인 세션 모델 정의
//!
//! 현재 기기의 인증 상태를 표현합니다.
//!
//! ## 상태 전이
//! ```text
//! Anonymous ──sign_in──▶ Authenticated(U)   (로컬 레슨을 원격으로 이전)
//! Authenticated(U) ──sign_out──▶ Anonymous  (로컬 저장소에서 다시 로딩)
//! ```
//! 시작 시 상태는 인증 협력자에게 현재 사용자를 물어서 결정합니다.

use crate::models::lesson::LessonSnapshot;
use crate::models::user::UserIdentity;
use serde::Serialize;

/// 현재 세션 — 익명이거나 한 명의 사용자에 묶여 있습니다.
///
/// JSON: `{"state":"anonymous"}` 또는
/// `{"state":"authenticated","user":{"id":"...","display_name":"..."}}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Session {
    #[default]
    Anonymous,
    Authenticated { user: UserIdentity },
}

impl Session {
    pub fn from_user(user: Option<UserIdentity>) -> Self {
        match user {
            Some(user) => Session::Authenticated { user },
            None => Session::Anonymous,
        }
    }

    pub fn user(&self) -> Option<&UserIdentity> {
        match self {
            Session::Anonymous => None,
            Session::Authenticated { user } => Some(user),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }
}

/// 로그인 결과 보고서
///
/// 로컬 레슨 이전이 중간에 실패해도 로그인 자체는 성공합니다.
/// 이전하지 못한 레슨 수는 `pending`에 담기고 로컬 저장소에 남습니다.
/// 로그인 후 원격 목록을 읽지 못했다면 `load_error`가 채워집니다.
/// 이때 스냅샷의 빈 목록은 "레슨이 없음"이 아니라 "읽지 못함"입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignInReport {
    pub user: UserIdentity,
    pub migrated: usize,
    pub pending: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_error: Option<String>,
}

/// `POST /api/v1/auth/sign-in`의 응답 본문
#[derive(Debug, Serialize)]
pub struct SignInResponse {
    #[serde(flatten)]
    pub report: SignInReport,
    pub snapshot: LessonSnapshot,
}
