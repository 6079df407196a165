//! Observability - ブロック操作のカウンタ
//!
//! グローバルなレジストリは使いません。呼び出し側が `Registry` を用意して登録します。

use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

/// BlockMetrics は呼び出し側が所有するカウンタの束
///
/// # 使用例
/// ```ignore
/// let registry = Registry::new();
/// let metrics = BlockMetrics::register(&registry)?;
/// mark_for_deletion(&ctx, bucket, &SystemClock, id, &metrics.marked_for_deletion).await?;
/// ```
#[derive(Debug, Clone)]
pub struct BlockMetrics {
    pub marked_for_deletion: IntCounter,
    pub uploaded: IntCounter,
    pub deleted: IntCounter,
}

impl BlockMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        Ok(Self {
            marked_for_deletion: IntCounter::new(
                "blocks_marked_for_deletion_total",
                "Total number of blocks marked for deletion.",
            )?,
            uploaded: IntCounter::new("blocks_uploaded_total", "Total number of uploaded blocks.")?,
            deleted: IntCounter::new("blocks_deleted_total", "Total number of deleted blocks.")?,
        })
    }

    /// 新しいカウンタを作り `registry` に登録する
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let metrics = Self::new()?;
        registry.register(Box::new(metrics.marked_for_deletion.clone()))?;
        registry.register(Box::new(metrics.uploaded.clone()))?;
        registry.register(Box::new(metrics.deleted.clone()))?;
        Ok(metrics)
    }
}

/// Prometheus text exposition of everything in `registry`.
pub fn encode_text(registry: &Registry) -> Result<String, prometheus::Error> {
    let mut buf = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buf)?;
    String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
