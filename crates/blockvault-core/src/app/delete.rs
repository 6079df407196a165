//! Delete - ブロック名前空間 `<id>/` の物理削除
//!
//! # 削除順序
//! 1. `<id>/descriptor`（この時点で読み手からは見えなくなる）
//! 2. 残りのオブジェクト（deletion-mark 以外、再帰的に）
//! 3. `<id>/deletion-mark`（最後に消すので、途中で失敗しても reaper が再試行できる）
//!
//! 個々のオブジェクトが既に無いことはエラーではありません。
//! `debug/metas/<id>` は uploader の持ち物なので触りません。

use tracing::{debug, info};

use crate::domain::layout::{block_dir_key, deletion_mark_key, descriptor_key};
use crate::domain::{BlockError, BlockId, Context};
use crate::ports::Bucket;

/// `<id>/` 以下をすべて削除
///
/// 既に一部（または全部）が消えていても成功します。失敗するのはストレージ層の障害のみ。
pub async fn delete(ctx: &Context, bucket: &dyn Bucket, id: BlockId) -> Result<(), BlockError> {
    let mut removed = 0usize;

    if delete_if_present(ctx, bucket, &descriptor_key(&id)).await? {
        removed += 1;
    }

    let mark = deletion_mark_key(&id);
    let mut pending = vec![block_dir_key(&id)];
    while let Some(dir) = pending.pop() {
        let entries = super::call(ctx, "iter", &dir, bucket.iter(&dir)).await?;
        for entry in entries {
            if entry.ends_with('/') {
                pending.push(entry);
            } else if entry != mark && delete_if_present(ctx, bucket, &entry).await? {
                removed += 1;
            }
        }
    }

    if delete_if_present(ctx, bucket, &mark).await? {
        removed += 1;
    }

    info!(block = %id, bucket = bucket.name(), removed, "deleted block");
    Ok(())
}

/// 削除できたら true、既に無ければ false
async fn delete_if_present(
    ctx: &Context,
    bucket: &dyn Bucket,
    key: &str,
) -> Result<bool, BlockError> {
    match ctx.run(bucket.delete(key)).await? {
        Ok(()) => {
            debug!(key, "deleted object");
            Ok(true)
        }
        Err(e) if e.is_not_found() => {
            debug!(key, "object already gone");
            Ok(false)
        }
        Err(source) => Err(BlockError::bucket("delete", key, source)),
    }
}
