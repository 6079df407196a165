//! blockvault-core
//!
//! Lifecycle of immutable time-series blocks between local disk and an object store.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, meta, deletion_mark, layout, errors, context）
//! - **ports**: 抽象化レイヤー（Bucket, Clock, Counter）
//! - **impls**: 実装（InMemoryBucket, FilesystemBucket）
//! - **app**: 操作（upload, delete, mark_for_deletion, download, fetch）
//! - **config**: YAML のバケット設定
//! - **observability**: prometheus カウンタ
//!
//! # 不変条件
//! - ブロックは `<id>/descriptor` が存在する時だけ完了として見える
//! - 削除後も `debug/metas/<id>` は残る
//!
//! ログは `tracing` で出すだけで、subscriber のインストールは呼び出し側の責務です。

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;

#[cfg(test)]
pub(crate) mod testutil;

pub use self::app::{
    delete, download, download_meta, list_complete_blocks, mark_for_deletion, read_deletion_mark,
    upload,
};
pub use self::domain::{BlockError, BlockId, BlockMeta, Context, DeletionMark};
