//! FilesystemBucket - ローカルディスク上のバケット
//!
//! キー `a/b/c` は `<root>/a/b/c` に対応します。
//! 書き込みは一時ファイル + rename なので、読み手が書きかけのオブジェクトを見ることはありません。
//! 本体は一時ファイルへストリームでコピーし、読み出しも開いたファイルをそのまま返します。

use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use ulid::Ulid;

use crate::ports::bucket::dir_prefix;
use crate::ports::{Bucket, BucketError, ObjectReader};

const TMP_PREFIX: &str = ".tmp-";

#[derive(Debug, Clone)]
pub struct FilesystemBucket {
    root: PathBuf,
    name: String,
}

impl FilesystemBucket {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let name = format!("fs:{}", root.display());
        Self { root, name }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, BucketError> {
        let rel = Path::new(key.trim_start_matches('/'));
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(BucketError::Other(format!("invalid object key {key:?}")));
        }
        Ok(self.root.join(rel))
    }

    /// 空になった親ディレクトリを root まで遡って削除
    async fn prune_empty_parents(&self, path: &Path) {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir == self.root || !dir.starts_with(&self.root) {
                break;
            }
            // 空でなければ失敗するので、それで止める
            if tokio::fs::remove_dir(dir).await.is_err() {
                break;
            }
            current = dir.parent();
        }
    }
}

/// `parent` の下に一時ファイルを作る
///
/// 並行する delete が空になった `parent` を消すことがあるので、
/// NotFound なら一度だけディレクトリを作り直して再試行します。
async fn create_tmp_file(parent: &Path) -> io::Result<(PathBuf, File)> {
    let tmp = parent.join(format!("{TMP_PREFIX}{}", Ulid::new()));
    tokio::fs::create_dir_all(parent).await?;
    match File::create(&tmp).await {
        Ok(file) => Ok((tmp, file)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(dir = %parent.display(), "parent directory vanished, recreating");
            tokio::fs::create_dir_all(parent).await?;
            let file = File::create(&tmp).await?;
            Ok((tmp, file))
        }
        Err(e) => Err(e),
    }
}

/// `body` を `file` に流し込んで閉じる
async fn copy_into(body: &mut ObjectReader, mut file: File) -> io::Result<u64> {
    let written = tokio::io::copy(body, &mut file).await?;
    file.flush().await?;
    Ok(written)
}

fn io_err(key: &str, source: io::Error) -> BucketError {
    if source.kind() == io::ErrorKind::NotFound {
        BucketError::NotFound(key.to_string())
    } else {
        BucketError::Io {
            key: key.to_string(),
            source,
        }
    }
}

#[async_trait]
impl Bucket for FilesystemBucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upload(&self, key: &str, mut body: ObjectReader) -> Result<(), BucketError> {
        let path = self.path_for(key)?;
        let parent = path
            .parent()
            .ok_or_else(|| BucketError::Other(format!("invalid object key {key:?}")))?;

        let (tmp, file) = create_tmp_file(parent).await.map_err(|source| BucketError::Io {
            key: key.to_string(),
            source,
        })?;
        let written = match copy_into(&mut body, file).await {
            Ok(n) => n,
            Err(source) => {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(BucketError::Io {
                    key: key.to_string(),
                    source,
                });
            }
        };
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_err(key, e));
        }
        debug!(key, bytes = written, "stored object");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<ObjectReader, BucketError> {
        let path = self.path_for(key)?;
        let file = File::open(&path).await.map_err(|e| io_err(key, e))?;
        let meta = file.metadata().await.map_err(|e| io_err(key, e))?;
        if !meta.is_file() {
            return Err(BucketError::NotFound(key.to_string()));
        }
        Ok(Box::new(file))
    }

    async fn exists(&self, key: &str) -> Result<bool, BucketError> {
        let path = self.path_for(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err(key, e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), BucketError> {
        let path = self.path_for(key)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| io_err(key, e))?;
        self.prune_empty_parents(&path).await;
        Ok(())
    }

    async fn iter(&self, dir: &str) -> Result<Vec<String>, BucketError> {
        let prefix = dir_prefix(dir);
        let path = self.path_for(&prefix)?;
        let mut read_dir = match tokio::fs::read_dir(&path).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&prefix, e)),
        };

        let mut entries = Vec::new();
        while let Some(entry) = read_dir.next_entry().await.map_err(|e| io_err(&prefix, e))? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(TMP_PREFIX) {
                continue;
            }
            let file_type = entry.file_type().await.map_err(|e| io_err(&prefix, e))?;
            if file_type.is_dir() {
                entries.push(format!("{prefix}{name}/"));
            } else {
                entries.push(format!("{prefix}{name}"));
            }
        }
        entries.sort();
        Ok(entries)
    }
}
