//! テスト用のヘルパー（ブロックディレクトリの生成、故障注入バケット）

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::domain::{BlockId, BlockMeta, BlockStats, Compaction, Downsample, SourceType, ThanosMeta};
use crate::impls::InMemoryBucket;
use crate::ports::{Bucket, BucketError, ObjectReader};

pub(crate) const INDEX_SIZE: usize = 401;
pub(crate) const CHUNK_SIZE: usize = 3751;

pub(crate) fn block_id(n: u64) -> BlockId {
    BlockId::from_parts(1_700_000_000_000 + n, u128::from(n))
}

/// ラベル `{ext1: val1}` を持つ descriptor（files は空）
pub(crate) fn test_meta(id: BlockId) -> BlockMeta {
    BlockMeta {
        ulid: id,
        min_time: 0,
        max_time: 1000,
        stats: BlockStats {
            num_samples: 500,
            num_series: 5,
            num_chunks: 5,
        },
        compaction: Compaction {
            level: 1,
            sources: vec![id],
        },
        version: 1,
        thanos: ThanosMeta {
            version: 1,
            labels: BTreeMap::from([("ext1".to_string(), "val1".to_string())]),
            downsample: Downsample { resolution: 124 },
            source: SourceType::Test,
            files: Vec::new(),
        },
    }
}

/// `<root>/<id>/` に index, chunks/000001, descriptor を持つブロックを作る
pub(crate) fn create_test_block(root: &Path, id: BlockId) -> PathBuf {
    create_block_with_meta(root, id, &test_meta(id))
}

pub(crate) fn create_block_with_meta(root: &Path, id: BlockId, meta: &BlockMeta) -> PathBuf {
    let dir = root.join(id.to_string());
    std::fs::create_dir_all(dir.join("chunks")).unwrap();

    let mut rng = StdRng::seed_from_u64(id.timestamp_ms());
    let mut index = vec![0u8; INDEX_SIZE];
    rng.fill_bytes(&mut index);
    let mut chunk = vec![0u8; CHUNK_SIZE];
    rng.fill_bytes(&mut chunk);

    std::fs::write(dir.join("index"), index).unwrap();
    std::fs::write(dir.join("chunks").join("000001"), chunk).unwrap();
    std::fs::write(dir.join("descriptor"), meta.encode().unwrap()).unwrap();
    dir
}

/// 呼び出しを記録し、指定した操作・キーで失敗するバケット
///
/// `fail_on("upload", "/descriptor")` はキーが `/descriptor` で終わる upload を失敗させます。
#[derive(Default)]
pub(crate) struct ScriptedBucket {
    pub(crate) inner: InMemoryBucket,
    fail: Option<(&'static str, String)>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedBucket {
    pub(crate) fn wrap(inner: InMemoryBucket) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub(crate) fn fail_on(mut self, op: &'static str, key_suffix: &str) -> Self {
        self.fail = Some((op, key_suffix.to_string()));
        self
    }

    /// `"<op> <key>"` in call order.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, op: &'static str, key: &str) -> Result<(), BucketError> {
        self.calls.lock().unwrap().push(format!("{op} {key}"));
        match &self.fail {
            Some((fail_op, suffix)) if *fail_op == op && key.ends_with(suffix.as_str()) => {
                Err(BucketError::Other("injected failure".to_string()))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Bucket for ScriptedBucket {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn upload(&self, key: &str, body: ObjectReader) -> Result<(), BucketError> {
        self.record("upload", key)?;
        self.inner.upload(key, body).await
    }

    async fn get(&self, key: &str) -> Result<ObjectReader, BucketError> {
        self.record("get", key)?;
        self.inner.get(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, BucketError> {
        self.record("exists", key)?;
        self.inner.exists(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), BucketError> {
        self.record("delete", key)?;
        self.inner.delete(key).await
    }

    async fn iter(&self, dir: &str) -> Result<Vec<String>, BucketError> {
        self.record("iter", dir)?;
        self.inner.iter(dir).await
    }
}
