//! DeletionMark - 削除予約マーカー
//!
//! `<id>/deletion-mark` が存在すること自体が「このブロックは物理削除待ち」というシグナルです。
//! 一度書いたら変更しません（物理削除は外部の reaper の責務）。

use serde::{Deserialize, Serialize};

use super::ids::BlockId;

pub const DELETION_MARK_VERSION_1: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionMark {
    pub id: BlockId,

    /// Unix seconds.
    pub deletion_time: i64,

    pub version: u32,
}

impl DeletionMark {
    pub fn new(id: BlockId, deletion_time: i64) -> Self {
        Self {
            id,
            deletion_time,
            version: DELETION_MARK_VERSION_1,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        super::meta::encode_tab_indented(self)
    }

    pub fn decode(data: &[u8]) -> Result<Self, MarkDecodeError> {
        let mark: DeletionMark = serde_json::from_slice(data)?;
        if mark.version != DELETION_MARK_VERSION_1 {
            return Err(MarkDecodeError::UnsupportedVersion(mark.version));
        }
        Ok(mark)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MarkDecodeError {
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected deletion mark file version {0}")]
    UnsupportedVersion(u32),
}
