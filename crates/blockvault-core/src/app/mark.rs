//! MarkForDeletion - 削除予約マーカーの書き込み
//!
//! # 状態遷移
//! `unmarked --mark_for_deletion--> marked`（marked は終端。先へ進めるのは外部の reaper）
//!
//! 同じブロックへの並行呼び出しは両方が「未マーク」を観測して両方書くことがあり、
//! その場合カウンタは 2 増えます。マーカーの内容は同じなので許容しています。

use bytes::Bytes;
use tracing::info;

use super::call;
use crate::domain::layout::deletion_mark_key;
use crate::domain::{BlockError, BlockId, Context, DeletionMark};
use crate::ports::{Bucket, Clock, Counter};

/// `<id>/deletion-mark` を書き、`counter` を 1 増やす
///
/// 既にマーカーがあれば何もせず成功します（カウンタも増やさない）。
///
/// # 使用例
/// ```ignore
/// let metrics = BlockMetrics::register(&registry)?;
/// mark_for_deletion(&ctx, bucket.as_ref(), &SystemClock, id, &metrics.marked_for_deletion).await?;
/// ```
pub async fn mark_for_deletion(
    ctx: &Context,
    bucket: &dyn Bucket,
    clock: &dyn Clock,
    id: BlockId,
    counter: &dyn Counter,
) -> Result<(), BlockError> {
    let key = deletion_mark_key(&id);
    if call(ctx, "exists", &key, bucket.exists(&key)).await? {
        info!(block = %id, key = %key, "block already marked for deletion");
        return Ok(());
    }

    let mark = DeletionMark::new(id, clock.now().timestamp());
    let data = mark.encode().map_err(BlockError::Encode)?;
    call(ctx, "upload", &key, bucket.upload_bytes(&key, Bytes::from(data))).await?;

    counter.inc();
    info!(block = %id, deletion_time = mark.deletion_time, "block has been marked for deletion");
    Ok(())
}
