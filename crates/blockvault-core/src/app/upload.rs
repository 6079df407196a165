//! Upload - ローカルのブロックディレクトリをバケットへ
//!
//! # フロー
//! 1. ローカル検証（リモート I/O の前にすべて終わらせる）
//! 2. ファイル一覧とサイズを収集し、descriptor の `files` を確定
//! 3. データファイルをアップロード（ファイルを開いてそのままストリームで渡す）
//! 4. descriptor を `<id>/descriptor` に書く（これが完了シグナル）
//! 5. 同じバイト列を `debug/metas/<id>` に書く（監査用、削除されない）
//!
//! 途中で失敗しても descriptor が無いのでブロックは読み手から見えません。
//! 再実行すれば最初からやり直して同じオブジェクト集合に収束します。

use std::cmp::Ordering;
use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::{debug, info};

use super::call;
use crate::domain::layout::{
    CHUNKS_DIRNAME, DESCRIPTOR_FILENAME, INDEX_FILENAME, audit_meta_key, descriptor_key, object_key,
};
use crate::domain::{BlockError, BlockId, BlockMeta, Context, File, decode_trailing_block_id};
use crate::ports::Bucket;

/// ローカルのブロックを順序付きでアップロード
///
/// # 使用例
/// ```ignore
/// let ctx = Context::background().with_timeout(Duration::from_secs(60));
/// upload(&ctx, bucket.as_ref(), "/data/01H8Z3W0M1S7Q5T2V4X6Y8Z0AB").await?;
/// ```
pub async fn upload(
    ctx: &Context,
    bucket: &dyn Bucket,
    dir: impl AsRef<Path>,
) -> Result<(), BlockError> {
    let dir = dir.as_ref();
    let (id, mut meta) = validate(dir).await?;

    let data_files = gather_file_stats(dir).await?;
    meta.thanos.files = std::iter::once(File::descriptor())
        .chain(data_files.iter().cloned())
        .collect();
    // エンコード失敗もリモート書き込みの前に出す
    let descriptor = Bytes::from(meta.encode().map_err(BlockError::Encode)?);

    for file in &data_files {
        let path = dir.join(&file.rel_path);
        let body = tokio::fs::File::open(&path)
            .await
            .map_err(|source| BlockError::LocalIo { path, source })?;
        let key = object_key(&id, &file.rel_path);
        call(ctx, "upload", &key, bucket.upload(&key, Box::new(body))).await?;
        debug!(block = %id, key = %key, "uploaded file");
    }

    let key = descriptor_key(&id);
    call(ctx, "upload", &key, bucket.upload_bytes(&key, descriptor.clone())).await?;

    let key = audit_meta_key(&id);
    call(ctx, "upload", &key, bucket.upload_bytes(&key, descriptor)).await?;

    info!(
        block = %id,
        bucket = bucket.name(),
        files = data_files.len(),
        "uploaded block"
    );
    Ok(())
}

/// ローカル検証。順番に意味があるので並べ替えないこと。
async fn validate(dir: &Path) -> Result<(BlockId, BlockMeta), BlockError> {
    let stat = tokio::fs::metadata(dir)
        .await
        .map_err(|source| BlockError::DirectoryNotFound {
            path: dir.to_path_buf(),
            source,
        })?;
    if !stat.is_dir() {
        return Err(BlockError::DirectoryNotFound {
            path: dir.to_path_buf(),
            source: io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
        });
    }
    // 読めないディレクトリもここで弾く
    tokio::fs::read_dir(dir)
        .await
        .map_err(|source| BlockError::DirectoryNotFound {
            path: dir.to_path_buf(),
            source,
        })?;

    let id = decode_trailing_block_id(dir).map_err(BlockError::NotABlockDirectory)?;

    let meta = BlockMeta::read_from_dir(dir).await?;
    if meta.ulid != id {
        return Err(BlockError::IdMismatch {
            dir: id,
            meta: meta.ulid,
        });
    }

    if meta.thanos.labels.is_empty() {
        return Err(BlockError::EmptyExternalLabels);
    }

    check_chunks(&dir.join(CHUNKS_DIRNAME)).await?;
    check_index(&dir.join(INDEX_FILENAME)).await?;

    Ok((id, meta))
}

async fn check_chunks(chunks_dir: &Path) -> Result<(), BlockError> {
    let missing = |source| BlockError::MissingDataFile {
        path: chunks_dir.to_path_buf(),
        source,
    };
    let mut entries = tokio::fs::read_dir(chunks_dir).await.map_err(missing)?;
    while let Some(entry) = entries.next_entry().await.map_err(missing)? {
        if entry.file_type().await.map_err(missing)?.is_file() {
            return Ok(());
        }
    }
    Err(missing(io::Error::new(
        io::ErrorKind::NotFound,
        "no chunk files",
    )))
}

async fn check_index(index: &Path) -> Result<(), BlockError> {
    let missing = |source| BlockError::MissingDataFile {
        path: index.to_path_buf(),
        source,
    };
    let stat = tokio::fs::metadata(index).await.map_err(missing)?;
    if !stat.is_file() {
        return Err(missing(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        )));
    }
    Ok(())
}

/// ブロック直下のすべてのファイル（descriptor を除く）とサイズ
///
/// 並び順: `index` → `chunks/*` → その他（それぞれ相対パス順）
async fn gather_file_stats(dir: &Path) -> Result<Vec<File>, BlockError> {
    let mut files = Vec::new();
    let mut pending: Vec<(PathBuf, String)> = vec![(dir.to_path_buf(), String::new())];

    while let Some((current, prefix)) = pending.pop() {
        let local = |source| BlockError::LocalIo {
            path: current.clone(),
            source,
        };
        let mut entries = tokio::fs::read_dir(&current).await.map_err(local)?;
        while let Some(entry) = entries.next_entry().await.map_err(local)? {
            let path = entry.path();
            let name = entry
                .file_name()
                .into_string()
                .map_err(|_| BlockError::LocalIo {
                    path: path.clone(),
                    source: io::Error::new(io::ErrorKind::InvalidData, "file name is not UTF-8"),
                })?;
            let rel_path = format!("{prefix}{name}");
            let stat = tokio::fs::metadata(&path)
                .await
                .map_err(|source| BlockError::LocalIo {
                    path: path.clone(),
                    source,
                })?;
            if stat.is_dir() {
                pending.push((path, format!("{rel_path}/")));
            } else if rel_path != DESCRIPTOR_FILENAME {
                files.push(File::sized(rel_path, stat.len()));
            }
        }
    }

    files.sort_by(|a, b| manifest_order(&a.rel_path, &b.rel_path));
    Ok(files)
}

fn manifest_order(a: &str, b: &str) -> Ordering {
    fn rank(rel_path: &str) -> u8 {
        if rel_path == INDEX_FILENAME {
            0
        } else if rel_path.starts_with(&format!("{CHUNKS_DIRNAME}/")) {
            1
        } else {
            2
        }
    }
    rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
}
