//! Fetch - 読み手側の参照
//!
//! 読み手は `<id>/descriptor` の存在だけを完了シグナルとして扱います。
//! descriptor の無い名前空間はアップロード途中か削除途中なので無視します。

use tracing::debug;

use super::call;
use crate::domain::layout::{deletion_mark_key, descriptor_key};
use crate::domain::{BlockError, BlockId, Context, DeletionMark, parse_trailing_block_id};
use crate::ports::Bucket;

/// バケット直下にある完了済みブロックの ID（昇順）
pub async fn list_complete_blocks(
    ctx: &Context,
    bucket: &dyn Bucket,
) -> Result<Vec<BlockId>, BlockError> {
    let mut ids = Vec::new();
    for entry in call(ctx, "iter", "", bucket.iter("")).await? {
        let Some(id) = parse_trailing_block_id(&entry) else {
            continue;
        };
        let key = descriptor_key(&id);
        if call(ctx, "exists", &key, bucket.exists(&key)).await? {
            ids.push(id);
        } else {
            debug!(block = %id, "skipping block without descriptor");
        }
    }
    ids.sort();
    Ok(ids)
}

/// `<id>/deletion-mark` を読む。無ければ `None`。
pub async fn read_deletion_mark(
    ctx: &Context,
    bucket: &dyn Bucket,
    id: BlockId,
) -> Result<Option<DeletionMark>, BlockError> {
    let key = deletion_mark_key(&id);
    let data = match ctx.run(bucket.get_bytes(&key)).await? {
        Ok(data) => data,
        Err(e) if e.is_not_found() => return Ok(None),
        Err(source) => return Err(BlockError::bucket("get", &key, source)),
    };
    DeletionMark::decode(&data)
        .map(Some)
        .map_err(|source| BlockError::CorruptDeletionMark { key, source })
}
