//! # 인증 협력자 (Authentication collaborator)
//!
//! 동기화기는 `Authenticator` 트레이트만 알고, 실제 인증 방식은 모릅니다.
//! 기본 구현 `PasswordAuthenticator`는 다음과 같이 동작합니다:
//!
//! 1. 계정은 원격 저장소의 `users` 테이블에 있고, 비밀번호는 Argon2id 해시로 보관
//! 2. 로그인에 성공하면 서명된 JWT 세션 토큰을 발급해 로컬 저장소(`"authSession"`)에 저장
//! 3. 서버가 다시 시작되면 `current_user()`가 저장된 토큰을 검증해 세션을 복원
//! 4. 세션이 바뀔 때마다 `watch` 채널로 구독자에게 알림
//!
//! ## watch 채널
//! `tokio::sync::watch`는 "가장 최근 값 하나"만 보관하는 채널입니다.
//! 구독자는 `changed().await`로 값이 바뀔 때까지 기다렸다가 최신 값을 읽습니다.

use crate::{
    db::users as db_users,
    error::AppError,
    models::*,
    services::local_store::LocalStore,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tokio::sync::watch;

/// 로컬 저장소에서 세션 토큰을 보관하는 키
pub const SESSION_KEY: &str = "authSession";

/// 세션 토큰 유효 기간
const SESSION_TTL_DAYS: i64 = 7;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // user id
    pub name: String,
    pub exp: i64,
    pub iat: i64,
}

pub fn create_session_token(
    user: &UserIdentity,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id.clone(),
        name: user.display_name.clone(),
        iat: now.timestamp(),
        exp: (now + Duration::days(SESSION_TTL_DAYS)).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn verify_session_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            AppError::Unauthorized("Session has expired".to_string())
        }
        _ => AppError::Unauthorized("Invalid session token".to_string()),
    })?;

    Ok(token_data.claims)
}

/// 동기화기가 사용하는 인증 기능
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// 현재 기기에 살아 있는 세션의 사용자 (시작 시 한 번 호출)
    async fn current_user(&self) -> Result<Option<UserIdentity>, AppError>;

    /// 로그인합니다. 실패하면 세션은 바뀌지 않습니다.
    async fn sign_in(&self, credentials: &Credentials) -> Result<UserIdentity, AppError>;

    /// 로그아웃합니다.
    async fn sign_out(&self) -> Result<(), AppError>;

    /// 세션이 바뀔 때마다 새 사용자(또는 None)를 받는 구독
    fn subscribe(&self) -> watch::Receiver<Option<UserIdentity>>;
}

/// 아이디/비밀번호 기반 인증 구현체
pub struct PasswordAuthenticator {
    pool: SqlitePool,
    store: LocalStore,
    jwt_secret: String,
    session_tx: watch::Sender<Option<UserIdentity>>,
}

impl PasswordAuthenticator {
    pub fn new(pool: SqlitePool, store: LocalStore, jwt_secret: impl Into<String>) -> Self {
        let (session_tx, _) = watch::channel(None);
        Self {
            pool,
            store,
            jwt_secret: jwt_secret.into(),
            session_tx,
        }
    }

    /// 새 계정을 만듭니다. 로그인은 하지 않습니다.
    pub async fn register(&self, req: &RegisterRequest) -> Result<UserIdentity, AppError> {
        let username = req.username.trim();
        if username.len() < 3 {
            return Err(AppError::BadRequest(
                "Username must be at least 3 characters".to_string(),
            ));
        }
        if req.password.len() < 8 {
            return Err(AppError::BadRequest(
                "Password must be at least 8 characters".to_string(),
            ));
        }

        let display_name = req
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(username);

        // Hash password with Argon2id
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(req.password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?
            .to_string();

        // 아이디 중복은 UNIQUE 제약이 판단합니다 (Conflict)
        let user_id = uuid::Uuid::now_v7().to_string();
        let identity =
            db_users::insert_account(&self.pool, &user_id, username, display_name, &password_hash)
                .await?;

        tracing::info!("Registered user {} ({})", username, identity.id);
        Ok(identity)
    }

    /// 값이 실제로 바뀐 경우에만 구독자를 깨웁니다.
    fn publish(&self, user: Option<UserIdentity>) {
        self.session_tx.send_if_modified(|current| {
            if *current == user {
                false
            } else {
                *current = user;
                true
            }
        });
    }

    async fn forget_session(&self) -> Result<(), AppError> {
        self.store.remove(SESSION_KEY).await?;
        self.publish(None);
        Ok(())
    }
}

#[async_trait]
impl Authenticator for PasswordAuthenticator {
    async fn current_user(&self) -> Result<Option<UserIdentity>, AppError> {
        let Some(token) = self.store.get(SESSION_KEY).await else {
            self.publish(None);
            return Ok(None);
        };

        let claims = match verify_session_token(&token, &self.jwt_secret) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::warn!("Discarding stored session: {}", e);
                self.forget_session().await?;
                return Ok(None);
            }
        };

        let Some(identity) = db_users::find_identity(&self.pool, &claims.sub).await? else {
            tracing::warn!("Stored session refers to unknown user {}", claims.sub);
            self.forget_session().await?;
            return Ok(None);
        };

        self.publish(Some(identity.clone()));
        Ok(Some(identity))
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<UserIdentity, AppError> {
        let account = db_users::find_account(&self.pool, credentials.username.trim())
            .await?
            .ok_or(AppError::Unauthorized("Invalid username or password".to_string()))?;

        let parsed_hash = PasswordHash::new(&account.password_hash)
            .map_err(|e| AppError::Internal(format!("Password hash parse error: {}", e)))?;

        Argon2::default()
            .verify_password(credentials.password.as_bytes(), &parsed_hash)
            .map_err(|_| AppError::Unauthorized("Invalid username or password".to_string()))?;

        let identity = UserIdentity::from(account);
        let token = create_session_token(&identity, &self.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))?;
        self.store.set(SESSION_KEY, token).await?;

        tracing::info!("User {} signed in", identity.id);
        self.publish(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        self.forget_session().await?;
        tracing::info!("Signed out");
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Option<UserIdentity>> {
        self.session_tx.subscribe()
    }
}

#[cfg(test)]
pub mod testing {
    //! 다른 모듈의 테스트에서 쓰는 인증 헬퍼

    use super::*;

    pub const PASSWORD: &str = "correct horse battery";

    pub fn credentials(username: &str) -> Credentials {
        Credentials {
            username: username.to_string(),
            password: PASSWORD.to_string(),
        }
    }

    pub async fn register(auth: &PasswordAuthenticator, username: &str) -> UserIdentity {
        auth.register(&RegisterRequest {
            username: username.to_string(),
            display_name: None,
            password: PASSWORD.to_string(),
        })
        .await
        .unwrap()
    }
}
