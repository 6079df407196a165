//! App - ブロックのライフサイクル操作
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//! どの操作も状態を持たない async 関数で、協調者（bucket, clock, counter）は引数で受け取ります。
//!
//! # 主要コンポーネント
//! - **upload**: ローカル検証 → データファイル → descriptor → 監査コピー
//! - **delete**: descriptor → 残りのオブジェクト → deletion-mark の順で削除
//! - **mark_for_deletion**: 冪等な削除予約 + カウンタ
//! - **download / download_meta**: リモートからローカルへの逆方向
//! - **list_complete_blocks / read_deletion_mark**: 読み手側の参照
//!
//! # 設計原則
//! - リモート呼び出しはすべて `Context::run` を通す（キャンセルと期限を即座に反映）
//! - 内部リトライはしない

use std::future::Future;

use crate::domain::{BlockError, Context};
use crate::ports::BucketError;

pub mod delete;
pub mod download;
pub mod fetch;
pub mod mark;
pub mod upload;

// 主要な関数を再エクスポート
pub use self::delete::delete;
pub use self::download::{download, download_meta};
pub use self::fetch::{list_complete_blocks, read_deletion_mark};
pub use self::mark::mark_for_deletion;
pub use self::upload::upload;

/// Run one bucket call under `ctx`, tagging failures with the operation and key.
pub(crate) async fn call<T, F>(
    ctx: &Context,
    op: &'static str,
    key: &str,
    fut: F,
) -> Result<T, BlockError>
where
    F: Future<Output = Result<T, BucketError>>,
{
    ctx.run(fut)
        .await?
        .map_err(|source| BlockError::bucket(op, key, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::layout::audit_meta_key;
    use crate::impls::{FilesystemBucket, InMemoryBucket};
    use crate::ports::{Bucket, FixedClock};
    use crate::testutil::{block_id, create_test_block};
    use chrono::{TimeZone, Utc};
    use rstest::rstest;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// upload → mark → delete を一通り流す
    async fn lifecycle(bucket: &dyn Bucket) {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = Context::background();
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        let counter = AtomicU64::new(0);
        let (keep, gone) = (block_id(1), block_id(2));

        for id in [keep, gone] {
            upload(&ctx, bucket, create_test_block(tmp.path(), id)).await.unwrap();
        }
        assert_eq!(list_complete_blocks(&ctx, bucket).await.unwrap(), vec![keep, gone]);

        mark_for_deletion(&ctx, bucket, &clock, gone, &counter).await.unwrap();
        mark_for_deletion(&ctx, bucket, &clock, gone, &counter).await.unwrap();
        assert_eq!(counter.load(Ordering::Relaxed), 1);
        assert!(read_deletion_mark(&ctx, bucket, gone).await.unwrap().is_some());
        assert!(read_deletion_mark(&ctx, bucket, keep).await.unwrap().is_none());

        delete(&ctx, bucket, gone).await.unwrap();
        assert_eq!(list_complete_blocks(&ctx, bucket).await.unwrap(), vec![keep]);
        assert!(bucket.exists(&audit_meta_key(&gone)).await.unwrap());
        assert!(bucket.iter(&format!("{gone}/")).await.unwrap().is_empty());
        assert!(matches!(
            download_meta(&ctx, bucket, gone).await,
            Err(BlockError::BlockNotFound(_))
        ));
    }

    #[rstest]
    #[case::in_memory(false)]
    #[case::filesystem(true)]
    #[tokio::test]
    async fn full_lifecycle(#[case] on_disk: bool) {
        let store = tempfile::tempdir().unwrap();
        if on_disk {
            lifecycle(&FilesystemBucket::new(store.path())).await;
        } else {
            lifecycle(&InMemoryBucket::new()).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn call_reports_deadline() {
        let ctx = Context::background().with_timeout(std::time::Duration::from_millis(10));
        let slow = async {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            Ok::<_, BucketError>(())
        };
        let err = call(&ctx, "get", "k", slow).await.unwrap_err();
        assert_eq!(err.to_string(), "context deadline exceeded");
    }
}
