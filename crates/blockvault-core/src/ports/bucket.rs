//! Bucket port - オブジェクトストレージ（InMemory / Filesystem / ...）
//!
//! バケットはキー → バイトストリームの単純なストアです。
//! 各操作は単体で冪等であること（同じ引数で何度呼んでも同じ結果）を要求します。
//!
//! 本体は `ObjectReader`（`AsyncRead`）で受け渡すので、大きな chunk ファイルも
//! メモリに載せずに流せます。descriptor のような小さなオブジェクトは
//! `upload_bytes` / `get_bytes` で扱います。
//!
//! # キーの規約
//! - 区切り文字は `/`
//! - `iter(dir)` は `dir` 直下の子だけを返し、サブディレクトリは末尾 `/` 付きで返す

use std::io::Cursor;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

/// オブジェクト本体のストリーム
pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;

/// BucketError はストレージ層のエラー
#[derive(Debug, thiserror::Error)]
pub enum BucketError {
    /// オブジェクトが存在しない（削除済み・未アップロード）
    #[error("object {0} not found")]
    NotFound(String),

    #[error("{key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

impl BucketError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BucketError::NotFound(_))
    }
}

/// Bucket はブロックを置くオブジェクトストアの能力セット
///
/// # Thread Safety
/// - `Send + Sync` を要求（並行アップロード・削除から共有される）
#[async_trait]
pub trait Bucket: Send + Sync {
    /// 人間向けの名前（ログ用）
    fn name(&self) -> &str;

    /// `body` を最後まで読んで `key` に書き込む（既存なら上書き）
    async fn upload(&self, key: &str, body: ObjectReader) -> Result<(), BucketError>;

    /// `key` の内容をストリームで返す。存在しなければ `BucketError::NotFound`。
    async fn get(&self, key: &str) -> Result<ObjectReader, BucketError>;

    async fn exists(&self, key: &str) -> Result<bool, BucketError>;

    /// `key` を削除。存在しなければ `BucketError::NotFound`。
    async fn delete(&self, key: &str) -> Result<(), BucketError>;

    /// `dir` 直下のエントリ一覧（フルキー、ソート済み）
    ///
    /// `dir` は空文字（ルート）か `/` で終わるディレクトリキー。
    async fn iter(&self, dir: &str) -> Result<Vec<String>, BucketError>;

    /// Upload a small in-memory object.
    async fn upload_bytes(&self, key: &str, data: Bytes) -> Result<(), BucketError> {
        self.upload(key, Box::new(Cursor::new(data))).await
    }

    /// Read a small object fully into memory.
    async fn get_bytes(&self, key: &str) -> Result<Bytes, BucketError> {
        let mut body = self.get(key).await?;
        let mut buf = Vec::new();
        body.read_to_end(&mut buf)
            .await
            .map_err(|source| BucketError::Io {
                key: key.to_string(),
                source,
            })?;
        Ok(Bytes::from(buf))
    }
}

/// Normalize a directory key to either `""` or `"<path>/"`.
pub(crate) fn dir_prefix(dir: &str) -> String {
    let trimmed = dir.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}
