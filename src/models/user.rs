use serde::{Deserialize, Serialize};

/// 로그인 검증에 필요한 계정 정보 (`users` 테이블 중 세 열)
///
/// 비밀번호 해시가 들어 있으므로 직렬화하지 않습니다.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Account {
    pub id: String,
    pub display_name: String,
    pub password_hash: String,
}

/// 인증 협력자가 돌려주는 사용자 신원 (고유 ID + 표시 이름)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserIdentity {
    pub id: String,
    pub display_name: String,
}

impl From<Account> for UserIdentity {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            display_name: account.display_name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub display_name: Option<String>,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}
