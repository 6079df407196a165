//! Config - バケット設定（YAML）
//!
//! ```yaml
//! type: FILESYSTEM
//! config:
//!   directory: /var/lib/blocks
//! ```
//!
//! `config` の中身は `type` ごとに解釈します。

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::impls::{FilesystemBucket, InMemoryBucket};
use crate::ports::Bucket;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse bucket config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unknown bucket type {0:?}")]
    UnknownKind(String),

    #[error("invalid {kind} config: {reason}")]
    Invalid { kind: BucketKind, reason: String },
}

/// サポートしているバケットの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BucketKind {
    #[serde(rename = "FILESYSTEM")]
    Filesystem,
    #[serde(rename = "IN_MEMORY")]
    InMemory,
}

impl BucketKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BucketKind::Filesystem => "FILESYSTEM",
            BucketKind::InMemory => "IN_MEMORY",
        }
    }
}

impl fmt::Display for BucketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BucketKind {
    type Err = ConfigError;

    /// 大文字小文字は区別しない
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "FILESYSTEM" => Ok(BucketKind::Filesystem),
            "IN_MEMORY" => Ok(BucketKind::InMemory),
            _ => Err(ConfigError::UnknownKind(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketConfig {
    #[serde(rename = "type")]
    pub kind: BucketKind,

    /// type ごとの設定（未解釈のまま保持）
    #[serde(default)]
    pub config: serde_yaml::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilesystemConfig {
    pub directory: PathBuf,
}

impl BucketConfig {
    pub fn in_memory() -> Self {
        Self {
            kind: BucketKind::InMemory,
            config: serde_yaml::Value::Null,
        }
    }

    pub fn filesystem(directory: impl Into<PathBuf>) -> Self {
        let mut map = serde_yaml::Mapping::new();
        map.insert(
            "directory".into(),
            directory.into().to_string_lossy().into_owned().into(),
        );
        Self {
            kind: BucketKind::Filesystem,
            config: serde_yaml::Value::Mapping(map),
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// 設定からバケットを作る
    pub fn build(&self) -> Result<Arc<dyn Bucket>, ConfigError> {
        let bucket: Arc<dyn Bucket> = match self.kind {
            BucketKind::Filesystem => {
                let cfg: FilesystemConfig = serde_yaml::from_value(self.config.clone())?;
                if cfg.directory.as_os_str().is_empty() {
                    return Err(ConfigError::Invalid {
                        kind: self.kind,
                        reason: "missing directory".to_string(),
                    });
                }
                Arc::new(FilesystemBucket::new(cfg.directory))
            }
            BucketKind::InMemory => Arc::new(InMemoryBucket::new()),
        };
        info!(kind = %self.kind, bucket = bucket.name(), "created bucket");
        Ok(bucket)
    }
}
