//! Counter port - 呼び出し側が所有するカウンタ
//!
//! コア側ではカウンタを作成もリセットもしません（グローバルなレジストリは使わない）。
//! 並行に `inc` されても安全であることだけを要求します。

use std::sync::atomic::{AtomicU64, Ordering};

pub trait Counter: Send + Sync {
    fn inc(&self);
}

impl Counter for prometheus::IntCounter {
    fn inc(&self) {
        prometheus::IntCounter::inc(self);
    }
}

impl Counter for prometheus::Counter {
    fn inc(&self) {
        prometheus::Counter::inc(self);
    }
}

impl Counter for AtomicU64 {
    fn inc(&self) {
        self.fetch_add(1, Ordering::Relaxed);
    }
}

impl<C: Counter + ?Sized> Counter for std::sync::Arc<C> {
    fn inc(&self) {
        (**self).inc();
    }
}
