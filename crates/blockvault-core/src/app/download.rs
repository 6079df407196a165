//! Download - バケットからローカルディレクトリへ
//!
//! アップロードの逆順です。データファイルはストリームのままローカルへコピーし、descriptor はローカルでも最後に
//! アトミックに書きます。途中で失敗したディレクトリには descriptor が無いので、
//! そのままアップロードしようとしても検証で弾かれます。

use std::io;
use std::path::{Component, Path};

use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::call;
use crate::domain::layout::{
    DELETION_MARK_FILENAME, DESCRIPTOR_FILENAME, block_dir_key, descriptor_key, object_key,
};
use crate::domain::{BlockError, BlockId, BlockMeta, Context};
use crate::ports::{Bucket, BucketError};

/// `<id>/descriptor` を取得してデコード
pub async fn download_meta(
    ctx: &Context,
    bucket: &dyn Bucket,
    id: BlockId,
) -> Result<BlockMeta, BlockError> {
    let key = descriptor_key(&id);
    let data = match ctx.run(bucket.get_bytes(&key)).await? {
        Ok(data) => data,
        Err(e) if e.is_not_found() => return Err(BlockError::BlockNotFound(id)),
        Err(source) => return Err(BlockError::bucket("get", &key, source)),
    };
    BlockMeta::decode(&data).map_err(|source| BlockError::CorruptDescriptor {
        path: key.into(),
        source,
    })
}

/// ブロック `id` を `dst` にダウンロード（`dst` がそのままブロックディレクトリになる）
///
/// descriptor の `files` にサイズがあれば検証します。
pub async fn download(
    ctx: &Context,
    bucket: &dyn Bucket,
    id: BlockId,
    dst: impl AsRef<Path>,
) -> Result<(), BlockError> {
    let dst = dst.as_ref();
    let meta = download_meta(ctx, bucket, id).await?;

    tokio::fs::create_dir_all(dst)
        .await
        .map_err(|source| BlockError::LocalIo {
            path: dst.to_path_buf(),
            source,
        })?;

    let files: Vec<(String, Option<u64>)> = if meta.thanos.files.is_empty() {
        // 古いブロックには manifest が無いので一覧から拾う
        list_remote_files(ctx, bucket, &id)
            .await?
            .into_iter()
            .map(|rel| (rel, None))
            .collect()
    } else {
        meta.thanos
            .files
            .iter()
            .filter(|f| f.rel_path != DESCRIPTOR_FILENAME)
            .map(|f| (f.rel_path.clone(), f.size_bytes))
            .collect()
    };

    for (rel_path, expected) in &files {
        let path = dst.join(checked_rel_path(rel_path)?);
        let key = object_key(&id, rel_path);
        let mut body = call(ctx, "get", &key, bucket.get(&key)).await?;

        let local = |source| BlockError::LocalIo {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(local)?;
        }
        let mut file = tokio::fs::File::create(&path).await.map_err(local)?;
        let actual = ctx
            .run(tokio::io::copy(&mut body, &mut file))
            .await?
            .map_err(|source| {
                BlockError::bucket(
                    "get",
                    &key,
                    BucketError::Io {
                        key: key.clone(),
                        source,
                    },
                )
            })?;
        file.flush().await.map_err(local)?;
        drop(file);

        if let Some(expected) = *expected {
            if actual != expected {
                let _ = tokio::fs::remove_file(&path).await;
                return Err(BlockError::SizeMismatch {
                    path,
                    expected,
                    actual,
                });
            }
        }
        debug!(block = %id, key = %key, bytes = actual, "downloaded file");
    }

    meta.write_to_dir(dst).await?;
    info!(block = %id, dst = %dst.display(), files = files.len(), "downloaded block");
    Ok(())
}

/// `<id>/` 以下のファイルの相対パス（descriptor と deletion-mark を除く）
async fn list_remote_files(
    ctx: &Context,
    bucket: &dyn Bucket,
    id: &BlockId,
) -> Result<Vec<String>, BlockError> {
    let root = block_dir_key(id);
    let mut files = Vec::new();
    let mut pending = vec![root.clone()];
    while let Some(dir) = pending.pop() {
        for entry in call(ctx, "iter", &dir, bucket.iter(&dir)).await? {
            if entry.ends_with('/') {
                pending.push(entry);
                continue;
            }
            let rel = &entry[root.len()..];
            if rel != DESCRIPTOR_FILENAME && rel != DELETION_MARK_FILENAME {
                files.push(rel.to_string());
            }
        }
    }
    files.sort();
    Ok(files)
}

/// manifest のパスが dst の外を指していないことを確認
fn checked_rel_path(rel_path: &str) -> Result<&Path, BlockError> {
    let path = Path::new(rel_path);
    if path.components().all(|c| matches!(c, Component::Normal(_))) {
        Ok(path)
    } else {
        Err(BlockError::LocalIo {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "file escapes block directory"),
        })
    }
}
