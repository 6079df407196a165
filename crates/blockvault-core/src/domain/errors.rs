//! Errors - エラー型と分類
//!
//! ローカル検証のエラーはすべてリモート書き込みの前に返ります。
//! バケット側のエラーは内部でリトライせず、そのまま呼び出し元へ返します。

use std::io;
use std::path::PathBuf;

use super::context::ContextError;
use super::deletion_mark::MarkDecodeError;
use super::ids::{BlockId, IdError};
use super::meta::MetaDecodeError;
use crate::ports::BucketError;

/// ErrorKind は呼び出し側がリトライ方針を決めるための分類
///
/// - Transient: 一時的なエラー（キャンセル・期限切れ。再実行で解消しうる）
/// - Permanent: 恒久的なエラー（入力が不正。リトライ無意味）
/// - Infrastructure: インフラエラー（ストレージやローカルディスクの障害）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
    Infrastructure,
}

/// BlockError はブロック操作のエラー
#[derive(Debug, thiserror::Error)]
pub enum BlockError {
    #[error("{}: {source}", path.display())]
    DirectoryNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("not a block dir: {0}")]
    NotABlockDirectory(#[source] IdError),

    #[error("{}: {source}", path.display())]
    MissingDescriptor {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("parse {}: {source}", path.display())]
    CorruptDescriptor {
        path: PathBuf,
        #[source]
        source: MetaDecodeError,
    },

    #[error("descriptor ulid {meta} does not match block dir {dir}")]
    IdMismatch { dir: BlockId, meta: BlockId },

    #[error("empty external labels are not allowed")]
    EmptyExternalLabels,

    #[error("{}: {source}", path.display())]
    MissingDataFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: {source}", path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Store-layer failure (connectivity, permission, ...).
    #[error("{op} {key}: {source}")]
    Bucket {
        op: &'static str,
        key: String,
        #[source]
        source: BucketError,
    },

    #[error("block {0} not found in bucket")]
    BlockNotFound(BlockId),

    #[error("{}: expected {expected} bytes, got {actual}", path.display())]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("parse {key}: {source}")]
    CorruptDeletionMark {
        key: String,
        #[source]
        source: MarkDecodeError,
    },

    #[error("encode: {0}")]
    Encode(#[source] serde_json::Error),

    #[error(transparent)]
    Context(#[from] ContextError),
}

impl BlockError {
    pub(crate) fn bucket(op: &'static str, key: &str, source: BucketError) -> Self {
        BlockError::Bucket {
            op,
            key: key.to_string(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BlockError::Context(_) => ErrorKind::Transient,
            BlockError::Bucket { .. } | BlockError::LocalIo { .. } => ErrorKind::Infrastructure,
            _ => ErrorKind::Permanent,
        }
    }

    /// Whether the failure happened before anything was written remotely.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            BlockError::DirectoryNotFound { .. }
                | BlockError::NotABlockDirectory(_)
                | BlockError::MissingDescriptor { .. }
                | BlockError::CorruptDescriptor { .. }
                | BlockError::IdMismatch { .. }
                | BlockError::EmptyExternalLabels
                | BlockError::MissingDataFile { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_labels_message_is_exact() {
        assert_eq!(
            BlockError::EmptyExternalLabels.to_string(),
            "empty external labels are not allowed"
        );
    }

    #[test]
    fn not_a_block_dir_wraps_decode_failure() {
        let err = BlockError::NotABlockDirectory(IdError::Decode(ulid::DecodeError::InvalidLength));
        assert!(err.to_string().starts_with("not a block dir: ulid: "));
        assert!(err.is_validation());
        assert_eq!(err.kind(), ErrorKind::Permanent);
    }

    #[test]
    fn classification() {
        let backend = BlockError::bucket("upload", "a/b", BucketError::Other("denied".into()));
        assert_eq!(backend.kind(), ErrorKind::Infrastructure);
        assert!(!backend.is_validation());
        assert_eq!(backend.to_string(), "upload a/b: denied");

        let cancelled = BlockError::from(ContextError::Cancelled);
        assert_eq!(cancelled.kind(), ErrorKind::Transient);
        assert_eq!(cancelled.to_string(), "context canceled");
    }
}
