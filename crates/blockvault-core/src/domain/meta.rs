//! BlockMeta - ブロックの descriptor ドキュメント
//!
//! descriptor はブロックの時間範囲・統計・ファイル一覧を記述します。
//! オブジェクトストアへの書き込みは常に [`BlockMeta::encode`] を通すので、
//! 同じ内容からは必ず同じバイト列が得られます（キー順固定・タブインデント・末尾改行）。

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::errors::BlockError;
use super::ids::BlockId;
use super::layout::DESCRIPTOR_FILENAME;

/// Only supported descriptor schema version.
pub const META_VERSION_1: u32 = 1;

/// Only supported `thanos` section version.
pub const THANOS_META_VERSION_1: u32 = 1;

/// Descriptor of one block.
///
/// フィールドの宣言順がそのまま JSON のキー順になります。並べ替え禁止。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockMeta {
    pub ulid: BlockId,
    pub min_time: i64,
    pub max_time: i64,
    pub stats: BlockStats,
    pub compaction: Compaction,
    pub version: u32,
    pub thanos: ThanosMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockStats {
    pub num_samples: u64,
    pub num_series: u64,
    pub num_chunks: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compaction {
    pub level: u32,
    #[serde(default)]
    pub sources: Vec<BlockId>,
}

/// Producer-specific section of the descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThanosMeta {
    pub version: u32,

    /// External labels. ラベルなしのブロックはアップロード不可。
    #[serde(default, deserialize_with = "nullable_labels")]
    pub labels: BTreeMap<String, String>,

    pub downsample: Downsample,

    pub source: SourceType,

    /// Filled in by the uploader just before the descriptor is written.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<File>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Downsample {
    pub resolution: i64,
}

/// One entry of the uploaded-file manifest.
///
/// `size_bytes` は descriptor 自身のエントリでは常に `None`（シリアライズ前にサイズが決まらないため）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    pub rel_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

impl File {
    pub fn sized(rel_path: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            rel_path: rel_path.into(),
            size_bytes: Some(size_bytes),
        }
    }

    /// The descriptor's own manifest entry.
    pub fn descriptor() -> Self {
        Self {
            rel_path: DESCRIPTOR_FILENAME.to_string(),
            size_bytes: None,
        }
    }
}

/// Which component produced the block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceType {
    Sidecar,
    Receive,
    Compactor,
    CompactorRepair,
    Ruler,
    BucketRepair,
    Test,
    /// 未知のタグはそのまま往復させる
    Unknown(String),
}

impl SourceType {
    pub fn as_str(&self) -> &str {
        match self {
            SourceType::Sidecar => "sidecar",
            SourceType::Receive => "receive",
            SourceType::Compactor => "compactor",
            SourceType::CompactorRepair => "compactor.repair",
            SourceType::Ruler => "ruler",
            SourceType::BucketRepair => "bucket.repair",
            SourceType::Test => "test",
            SourceType::Unknown(tag) => tag,
        }
    }
}

impl From<&str> for SourceType {
    fn from(tag: &str) -> Self {
        match tag {
            "sidecar" => SourceType::Sidecar,
            "receive" => SourceType::Receive,
            "compactor" => SourceType::Compactor,
            "compactor.repair" => SourceType::CompactorRepair,
            "ruler" => SourceType::Ruler,
            "bucket.repair" => SourceType::BucketRepair,
            "test" => SourceType::Test,
            other => SourceType::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SourceType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SourceType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(SourceType::from(tag.as_str()))
    }
}

fn nullable_labels<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<BTreeMap<String, String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl BlockMeta {
    /// Deterministic encoding: declaration-order keys, one tab per level, trailing newline.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        encode_tab_indented(self)
    }

    /// バイト列からデコードし、バージョンを検証
    pub fn decode(data: &[u8]) -> Result<Self, MetaDecodeError> {
        let meta: BlockMeta = serde_json::from_slice(data)?;
        if meta.version != META_VERSION_1 {
            return Err(MetaDecodeError::UnsupportedVersion(meta.version));
        }
        if meta.thanos.version != THANOS_META_VERSION_1 {
            return Err(MetaDecodeError::UnsupportedThanosVersion(meta.thanos.version));
        }
        Ok(meta)
    }

    /// `<dir>/descriptor` を読み込む
    ///
    /// ファイルが無ければ `MissingDescriptor`、壊れていれば `CorruptDescriptor`。
    pub async fn read_from_dir(dir: &Path) -> Result<Self, BlockError> {
        let path = dir.join(DESCRIPTOR_FILENAME);
        let data = tokio::fs::read(&path)
            .await
            .map_err(|source| BlockError::MissingDescriptor {
                path: path.clone(),
                source,
            })?;
        Self::decode(&data).map_err(|source| BlockError::CorruptDescriptor { path, source })
    }

    /// `<dir>/descriptor` をアトミックに書き込む（一時ファイル + rename）
    pub async fn write_to_dir(&self, dir: &Path) -> Result<(), BlockError> {
        let data = self.encode().map_err(BlockError::Encode)?;
        let path = dir.join(DESCRIPTOR_FILENAME);
        let tmp = dir.join(format!("{DESCRIPTOR_FILENAME}.tmp"));
        write_then_rename(&tmp, &path, &data).await
    }

    /// Whether the manifest (if any) names this relative path.
    pub fn lists_file(&self, rel_path: &str) -> bool {
        self.thanos.files.iter().any(|f| f.rel_path == rel_path)
    }
}

async fn write_then_rename(tmp: &Path, path: &Path, data: &[u8]) -> Result<(), BlockError> {
    let local = |source| BlockError::LocalIo {
        path: path.to_path_buf(),
        source,
    };
    tokio::fs::write(tmp, data).await.map_err(local)?;
    tokio::fs::rename(tmp, path).await.map_err(local)
}

/// Serialize `value` as JSON indented with one tab per level, followed by a newline.
pub(crate) fn encode_tab_indented<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}

/// MetaDecodeError は descriptor のデコード失敗
#[derive(Debug, thiserror::Error)]
pub enum MetaDecodeError {
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected meta file version {0}")]
    UnsupportedVersion(u32),

    #[error("unexpected thanos meta version {0}")]
    UnsupportedThanosVersion(u32),
}
