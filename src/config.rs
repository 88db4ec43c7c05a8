//! # 애플리케이션 설정(Configuration) 모듈
//!
//! 환경변수에서 서버 설정값을 읽어오는 모듈입니다.
//! `.env` 파일이나 시스템 환경변수에서 값을 가져옵니다.
//!
//! 설정 항목:
//! - `DATABASE_URL`: 원격 저장소(SQLite) 경로
//! - `JWT_SECRET`: 로그인 세션 토큰 서명에 사용할 비밀키
//! - `LOCAL_STORE_PATH`: 기기 로컬 저장소(JSON 파일) 경로
//! - `FRONTEND_DIST`: 빌드된 프론트엔드 정적 파일 디렉토리
//! - `HOST`: 서버 바인딩 주소
//! - `PORT`: 서버 포트 번호

use std::env;

/// 애플리케이션 전체 설정을 담는 구조체
///
/// 서버 시작 시 환경변수에서 한 번 읽어온 후,
/// 애플리케이션 전체에서 공유됩니다.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite 데이터베이스 URL (예: "sqlite:data/studytrack.db?mode=rwc")
    pub database_url: String,
    /// 세션 토큰 서명/검증에 사용하는 비밀키
    pub jwt_secret: String,
    /// 로컬 저장소 파일 경로 (기본값: "data/local_storage.json")
    pub local_store_path: String,
    /// 프론트엔드 빌드 결과 디렉토리 (기본값: "frontend/dist")
    pub frontend_dist: String,
    /// 서버가 바인딩할 호스트 주소 (기본값: "0.0.0.0")
    pub host: String,
    /// 서버 포트 번호 (기본값: 3000)
    pub port: u16,
}

impl Config {
    /// 환경변수에서 설정값을 읽어 Config 인스턴스를 생성합니다.
    ///
    /// # 에러
    /// `DATABASE_URL`과 `JWT_SECRET`은 필수이며, 없으면 에러가 발생합니다.
    /// 나머지 설정은 기본값이 있어 환경변수가 없어도 동작합니다.
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")?,
            jwt_secret: env::var("JWT_SECRET")?,
            local_store_path: env::var("LOCAL_STORE_PATH")
                .unwrap_or_else(|_| "data/local_storage.json".to_string()),
            frontend_dist: env::var("FRONTEND_DIST")
                .unwrap_or_else(|_| "frontend/dist".to_string()),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            // 파싱 실패 시 기본값 3000 사용
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
        })
    }
}
