//! Impls - Bucket の実装
//!
//! このモジュールには ports の実装を含めます。
//!
//! # 含まれる実装
//! - **InMemoryBucket**: 開発用・テスト用のバケット
//! - **FilesystemBucket**: ローカルディスク上のバケット
//!
//! ネットワーク越しのオブジェクトストア（S3, GCS, ...）は対象外です。
//! 必要なら別クレートで `Bucket` を実装してください。

pub mod fs_bucket;
pub mod inmem_bucket;

// 主要な型を再エクスポート
pub use self::fs_bucket::FilesystemBucket;
pub use self::inmem_bucket::InMemoryBucket;
