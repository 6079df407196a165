//! InMemoryBucket - 開発用・テスト用のバケット
//!
//! # 実装詳細
//! - BTreeMap<String, Bytes> でキーをソート済みで保持
//! - Mutex で排他制御（ロックを保持したまま await しない）
//! - upload は本体を読み切ってから一度に insert する

use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncReadExt;

use crate::ports::bucket::dir_prefix;
use crate::ports::{Bucket, BucketError, ObjectReader};

/// InMemoryBucket はプロセス内のオブジェクトストア
///
/// `Clone` は同じ中身を共有します。
///
/// # 使用例
/// ```ignore
/// let bkt = InMemoryBucket::new();
/// bkt.upload_bytes("a/b", Bytes::from_static(b"x")).await?;
/// assert_eq!(bkt.objects().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryBucket {
    objects: Arc<Mutex<BTreeMap<String, Bytes>>>,
}

impl InMemoryBucket {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Bytes>> {
        // ロック中に panic しても中身は一貫しているので poison は無視する
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of every stored object.
    pub fn objects(&self) -> BTreeMap<String, Bytes> {
        self.lock().clone()
    }
}

#[async_trait]
impl Bucket for InMemoryBucket {
    fn name(&self) -> &str {
        "inmem"
    }

    async fn upload(&self, key: &str, mut body: ObjectReader) -> Result<(), BucketError> {
        let mut data = Vec::new();
        body.read_to_end(&mut data)
            .await
            .map_err(|source| BucketError::Io {
                key: key.to_string(),
                source,
            })?;
        self.lock().insert(key.to_string(), Bytes::from(data));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<ObjectReader, BucketError> {
        let data = self
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| BucketError::NotFound(key.to_string()))?;
        Ok(Box::new(Cursor::new(data)))
    }

    async fn exists(&self, key: &str) -> Result<bool, BucketError> {
        Ok(self.lock().contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<(), BucketError> {
        match self.lock().remove(key) {
            Some(_) => Ok(()),
            None => Err(BucketError::NotFound(key.to_string())),
        }
    }

    async fn iter(&self, dir: &str) -> Result<Vec<String>, BucketError> {
        let prefix = dir_prefix(dir);
        let objects = self.lock();
        let entries: BTreeSet<String> = objects
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(key, _)| {
                let rest = &key[prefix.len()..];
                match rest.find('/') {
                    Some(idx) => format!("{prefix}{}", &rest[..=idx]),
                    None => key.clone(),
                }
            })
            .collect();
        Ok(entries.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(s: &'static str) -> Bytes {
        Bytes::from_static(s.as_bytes())
    }

    #[tokio::test]
    async fn upload_get_delete_roundtrip() {
        let bkt = InMemoryBucket::new();
        bkt.upload_bytes("a/b", bytes("hello")).await.unwrap();
        assert!(bkt.exists("a/b").await.unwrap());
        assert_eq!(bkt.get_bytes("a/b").await.unwrap(), bytes("hello"));

        bkt.delete("a/b").await.unwrap();
        assert!(!bkt.exists("a/b").await.unwrap());
        assert!(bkt.get("a/b").await.err().unwrap().is_not_found());
        assert!(bkt.delete("a/b").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn upload_overwrites() {
        let bkt = InMemoryBucket::new();
        bkt.upload_bytes("k", bytes("one")).await.unwrap();
        bkt.upload_bytes("k", bytes("two")).await.unwrap();
        assert_eq!(bkt.objects().len(), 1);
        assert_eq!(bkt.get_bytes("k").await.unwrap(), bytes("two"));
    }

    #[tokio::test]
    async fn iter_lists_direct_children() {
        let bkt = InMemoryBucket::new();
        for key in ["b/index", "b/chunks/000001", "b/chunks/000002", "bb/index", "debug/metas/b"] {
            bkt.upload_bytes(key, bytes("x")).await.unwrap();
        }

        assert_eq!(bkt.iter("").await.unwrap(), vec!["b/", "bb/", "debug/"]);
        assert_eq!(bkt.iter("b/").await.unwrap(), vec!["b/chunks/", "b/index"]);
        assert_eq!(bkt.iter("b").await.unwrap(), vec!["b/chunks/", "b/index"]);
        assert_eq!(
            bkt.iter("b/chunks/").await.unwrap(),
            vec!["b/chunks/000001", "b/chunks/000002"]
        );
        assert!(bkt.iter("missing/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clones_share_state() {
        let bkt = InMemoryBucket::new();
        let other = bkt.clone();
        other.upload_bytes("k", bytes("v")).await.unwrap();
        assert!(bkt.exists("k").await.unwrap());
    }
}
