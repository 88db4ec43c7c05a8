//! # 로컬 저장소 (기기 단위 키-값 저장소)
//!
//! 브라우저의 localStorage처럼 문자열 키에 문자열 값을 저장합니다.
//! 전체 맵을 하나의 JSON 파일로 보관하며, 값이 바뀔 때마다 파일 전체를 다시 씁니다.
//!
//! 이 저장소를 쓰는 키:
//! - `"studyLessons"`: 익명 상태의 레슨 목록 (JSON 배열 문자열)
//! - `"studyLessons.corrupt"`: 해석하지 못한 레슨 목록 원본 백업
//! - `"authSession"`: 로그인 세션 토큰
//!
//! ## 파일 쓰기 방식
//! 임시 파일에 먼저 쓴 뒤 `rename`으로 교체합니다.
//! 쓰는 도중 프로세스가 죽어도 기존 파일은 깨지지 않습니다.

use crate::error::AppError;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;

/// 파일 기반 키-값 저장소
///
/// `Clone`은 내부 `Arc`만 복제하므로, 복제본들은 같은 파일과 맵을 공유합니다.
#[derive(Debug, Clone)]
pub struct LocalStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl LocalStore {
    /// 저장소 파일을 열어 메모리로 읽어옵니다.
    ///
    /// 파일이 없거나 비어 있으면 빈 저장소로 시작합니다.
    /// 파일 자체가 JSON으로 해석되지 않으면 덮어쓰지 않도록 에러를 반환합니다.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let path = path.into();

        let entries = match fs::read_to_string(&path).await {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!("Opened local store {} ({} keys)", path.display(), entries.len());

        Ok(Self {
            inner: Arc::new(Inner {
                path,
                entries: Mutex::new(entries),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.inner.entries.lock().await.get(key).cloned()
    }

    /// 값을 저장하고 파일에 바로 반영합니다.
    ///
    /// 파일 쓰기에 실패하면 메모리의 맵도 바뀌지 않습니다.
    pub async fn set(&self, key: &str, value: String) -> Result<(), AppError> {
        let mut entries = self.inner.entries.lock().await;
        let mut next = entries.clone();
        next.insert(key.to_string(), value);
        self.flush(&next).await?;
        *entries = next;
        Ok(())
    }

    /// 키를 삭제합니다. 없는 키를 삭제해도 에러가 아닙니다.
    pub async fn remove(&self, key: &str) -> Result<(), AppError> {
        let mut entries = self.inner.entries.lock().await;
        if !entries.contains_key(key) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.remove(key);
        self.flush(&next).await?;
        *entries = next;
        Ok(())
    }

    async fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), AppError> {
        let path = &self.inner.path;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let raw = serde_json::to_string_pretty(entries)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, raw).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_store() -> (LocalStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path().join("local.json")).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_set_get_remove() {
        let (store, _dir) = test_store().await;
        assert_eq!(store.get("studyLessons").await, None);

        store.set("studyLessons", "[]".to_string()).await.unwrap();
        assert_eq!(store.get("studyLessons").await.as_deref(), Some("[]"));

        store.remove("studyLessons").await.unwrap();
        assert_eq!(store.get("studyLessons").await, None);
        // 두 번 지워도 괜찮습니다
        store.remove("studyLessons").await.unwrap();
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let (store, dir) = test_store().await;
        store.set("a", "1".to_string()).await.unwrap();
        store.set("b", "2".to_string()).await.unwrap();
        drop(store);

        let reopened = LocalStore::open(dir.path().join("local.json")).await.unwrap();
        assert_eq!(reopened.get("a").await.as_deref(), Some("1"));
        assert_eq!(reopened.get("b").await.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_creates_missing_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("local.json");
        let store = LocalStore::open(&path).await.unwrap();

        store.set("k", "v".to_string()).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_malformed_file_is_not_opened() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("local.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(LocalStore::open(&path).await.is_err());
        // 원본 파일은 그대로 남아 있어야 합니다
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }
}
