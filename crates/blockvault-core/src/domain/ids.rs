//! Block identifiers.
//!
//! # ULID ベースの BlockId
//! ブロックは ULID (Universally Unique Lexicographically Sortable Identifier) で識別します。
//!
//! ## ULID の特性
//! - **時刻でソート可能**: 先頭 48-bit がミリ秒タイムスタンプ
//! - **固定長**: Crockford base32 で常に 26 文字
//! - **128-bit**: UUID と同じサイズ
//!
//! オブジェクトストア上では `<id>/...` が 1 ブロックの名前空間になります。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use ulid::Ulid;

/// Length of the canonical string encoding.
pub const ENCODED_LEN: usize = 26;

/// IdError は BlockId のデコード失敗
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("ulid: {0}")]
    Decode(#[from] ulid::DecodeError),

    /// 26 文字でも 128-bit に収まらない値（先頭文字が '7' より大きい）
    #[error("ulid: overflow when unmarshaling")]
    Overflow,

    #[error("ulid: empty path")]
    EmptyPath,
}

/// BlockId はブロックの主キー
///
/// `Ulid` の薄いラッパーで、JSON では 26 文字の文字列として表現されます。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(Ulid);

impl BlockId {
    /// ULID から BlockId を作成
    pub const fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    /// ゼロ値（デコード失敗時の値）
    pub const fn nil() -> Self {
        Self(Ulid::nil())
    }

    /// タイムスタンプとランダム部分から作成
    pub fn from_parts(timestamp_ms: u64, random: u128) -> Self {
        Self(Ulid::from_parts(timestamp_ms, random))
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }

    /// 先頭 48-bit のミリ秒タイムスタンプ
    pub fn timestamp_ms(&self) -> u64 {
        self.0.timestamp_ms()
    }

    /// 文字列を厳密にデコード
    ///
    /// ちょうど 26 文字で、かつ 128-bit に収まる場合のみ成功します。
    pub fn decode(s: &str) -> Result<Self, IdError> {
        if s.len() == ENCODED_LEN && s.as_bytes()[0] > b'7' {
            return Err(IdError::Overflow);
        }
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl From<Ulid> for BlockId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl FromStr for BlockId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// パスの最後のセグメントを BlockId としてデコード（失敗理由つき）
///
/// 末尾の区切り文字は無視されます（`a/<id>/` は `<id>` として扱う）。
pub fn decode_trailing_block_id(path: impl AsRef<Path>) -> Result<BlockId, IdError> {
    let segment = path
        .as_ref()
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or(IdError::EmptyPath)?;
    BlockId::decode(segment)
}

/// パスの最後のセグメントがブロック ID ならそれを返す
///
/// `""`, `"something"`, `"<id>/something"` はいずれも `None` です。
pub fn parse_trailing_block_id(path: impl AsRef<Path>) -> Option<BlockId> {
    decode_trailing_block_id(path).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn id(ts: u64) -> BlockId {
        BlockId::from_parts(ts, 0)
    }

    #[rstest]
    #[case::empty(String::new(), None)]
    #[case::not_an_id("something".to_string(), None)]
    #[case::bare(id(1).to_string(), Some(id(1)))]
    #[case::absolute(format!("/{}", id(2)), Some(id(2)))]
    #[case::nested(format!("some/path/{}", id(3)), Some(id(3)))]
    #[case::trailing_separator(format!("some/path/{}/", id(5)), Some(id(5)))]
    #[case::followed_by_segment(format!("{}/something", id(4)), None)]
    #[case::extra_characters(format!("{}x", id(6)), None)]
    fn parses_trailing_segment(#[case] input: String, #[case] expected: Option<BlockId>) {
        assert_eq!(parse_trailing_block_id(&input), expected);
    }

    #[test]
    fn decode_reports_reason() {
        assert_eq!(
            decode_trailing_block_id("a/test"),
            Err(IdError::Decode(ulid::DecodeError::InvalidLength))
        );
        assert_eq!(decode_trailing_block_id(""), Err(IdError::EmptyPath));
    }

    #[test]
    fn overflowing_encoding_is_rejected() {
        let too_big = "8ZZZZZZZZZZZZZZZZZZZZZZZZZ";
        assert_eq!(BlockId::decode(too_big), Err(IdError::Overflow));
        assert!(BlockId::decode("7ZZZZZZZZZZZZZZZZZZZZZZZZZ").is_ok());
    }

    #[test]
    fn display_is_fixed_width_and_sortable() {
        let a = id(1);
        let b = id(2);
        assert_eq!(a.to_string().len(), ENCODED_LEN);
        assert!(a < b);
        assert!(a.to_string() < b.to_string());
        assert_eq!(a.to_string().parse::<BlockId>().unwrap(), a);
    }

    #[test]
    fn serializes_as_plain_string() {
        let block = id(42);
        let json = serde_json::to_string(&block).unwrap();
        assert_eq!(json, format!("\"{block}\""));
        let back: BlockId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, block);
    }
}
