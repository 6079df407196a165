//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（オブジェクトストア、時計、メトリクス）への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - オブジェクトストアがブロックの存在と完全性の正本（source of truth）
//! - 協調者（bucket, clock, counter）はすべて引数で明示的に渡す

pub mod bucket;
pub mod clock;
pub mod counter;

// 主要な trait を再エクスポート
pub use self::bucket::{Bucket, BucketError, ObjectReader};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::counter::Counter;
