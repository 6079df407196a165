//! Layout - ブロックのファイル名とリモートキー
//!
//! ```text
//! <id>/descriptor          確定済み BlockMeta（完了シグナル）
//! <id>/index               インデックスファイル
//! <id>/chunks/<NNNNNN>     チャンクファイル
//! <id>/deletion-mark       削除予約マーカー
//! debug/metas/<id>         descriptor の監査用コピー（削除されない）
//! ```

use super::ids::BlockId;

/// Descriptor file name, both locally and remotely.
pub const DESCRIPTOR_FILENAME: &str = "descriptor";

pub const INDEX_FILENAME: &str = "index";

pub const CHUNKS_DIRNAME: &str = "chunks";

pub const DELETION_MARK_FILENAME: &str = "deletion-mark";

/// 監査用コピーの名前空間（uploader だけが書き込む）
pub const DEBUG_METAS_DIR: &str = "debug/metas";

/// `<id>/` （ブロック名前空間のディレクトリキー）
pub fn block_dir_key(id: &BlockId) -> String {
    format!("{id}/")
}

/// `<id>/<rel_path>`
pub fn object_key(id: &BlockId, rel_path: &str) -> String {
    format!("{id}/{rel_path}")
}

pub fn descriptor_key(id: &BlockId) -> String {
    object_key(id, DESCRIPTOR_FILENAME)
}

pub fn deletion_mark_key(id: &BlockId) -> String {
    object_key(id, DELETION_MARK_FILENAME)
}

pub fn audit_meta_key(id: &BlockId) -> String {
    format!("{DEBUG_METAS_DIR}/{id}")
}
