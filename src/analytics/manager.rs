//! 计数器缓冲管理器
//!
//! 负责收集和刷新浏览量、短链点击等计数器，支持：
//! - 高并发计数（使用 DashMap）
//! - 定时刷盘到存储后端
//! - 阈值触发刷盘
//! - 刷盘失败时恢复缓冲

use dashmap::DashMap;
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use tokio::sync::Mutex;
use tokio::time::{Duration, sleep};
use tracing::{debug, trace, warn};

use crate::analytics::{AccessDimension, CounterKey, CounterSink};

/// 计数缓冲区状态，封装所有可变状态
struct CounterBuffer {
    data: DashMap<CounterKey, usize>,
    /// 缓冲区中的总增量（用于阈值判断）
    total: AtomicUsize,
    /// 刷盘锁，防止并发刷盘
    flush_lock: Mutex<()>,
    /// 是否有 flush 任务待处理（防止重复 spawn）
    flush_pending: AtomicBool,
}

impl CounterBuffer {
    fn new() -> Self {
        Self {
            data: DashMap::new(),
            total: AtomicUsize::new(0),
            flush_lock: Mutex::new(()),
            flush_pending: AtomicBool::new(false),
        }
    }

    fn increment(&self, key: CounterKey) -> usize {
        trace!("CounterBuffer: Incremented key: {}", key);
        *self.data.entry(key).or_insert(0) += 1;
        self.total.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// 收集所有更新并清空缓冲区（逐个 remove 避免竞态）
    fn drain(&self) -> Vec<(CounterKey, usize)> {
        let keys: Vec<CounterKey> = self.data.iter().map(|r| r.key().clone()).collect();

        let mut updates = Vec::with_capacity(keys.len());
        let mut total_removed = 0;
        for key in keys {
            if let Some((k, v)) = self.data.remove(&key) {
                total_removed += v;
                updates.push((k, v));
            }
        }

        if total_removed > 0 {
            self.total
                .fetch_update(Ordering::Release, Ordering::Relaxed, |current| {
                    Some(current.saturating_sub(total_removed))
                })
                .ok();
        }

        updates
    }

    fn restore(&self, updates: Vec<(CounterKey, usize)>) {
        let mut restored_total = 0;
        for (k, v) in updates {
            *self.data.entry(k).or_insert(0) += v;
            restored_total += v;
        }
        self.total.fetch_add(restored_total, Ordering::Relaxed);
    }

    fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }
}

/// 计数器管理器
///
/// Collects counter increments that are not read back by the request that
/// produced them and writes them to the [`CounterSink`] in batches.
#[derive(Clone)]
pub struct ClickManager {
    buffer: Arc<CounterBuffer>,
    sink: Arc<dyn CounterSink>,
    flush_interval: Duration,
    /// 触发刷盘的最大增量数
    max_clicks_before_flush: usize,
}

impl ClickManager {
    pub fn new(
        sink: Arc<dyn CounterSink>,
        flush_interval: Duration,
        max_clicks_before_flush: usize,
    ) -> Self {
        Self {
            buffer: Arc::new(CounterBuffer::new()),
            sink,
            flush_interval,
            max_clicks_before_flush,
        }
    }

    /// SmartLink 浏览量 +1
    pub fn record_view(&self, smart_link_id: i64) {
        self.increment(CounterKey::SmartLinkView(smart_link_id));
    }

    /// Record one short link hit with its access dimensions.
    pub fn record_short_link_hit(
        &self,
        code: &str,
        unique_visitor: bool,
        country: &str,
        referrer: &str,
        device: &str,
    ) {
        self.increment(CounterKey::ShortLinkClick(code.to_string()));
        if unique_visitor {
            self.increment(CounterKey::ShortLinkVisitor(code.to_string()));
        }
        for (dimension, value) in [
            (AccessDimension::Country, country),
            (AccessDimension::Referrer, referrer),
            (AccessDimension::Device, device),
        ] {
            self.increment(CounterKey::ShortLinkAccess {
                code: code.to_string(),
                dimension,
                value: value.to_string(),
            });
        }
    }

    /// 增加计数（线程安全，无锁）
    pub fn increment(&self, key: CounterKey) {
        let current_size = self.buffer.increment(key);
        trace!("ClickManager: Current buffer size: {}", current_size);

        if current_size >= self.max_clicks_before_flush {
            // 只有成功将 flush_pending 从 false 设为 true 的任务才 spawn
            if self
                .buffer
                .flush_pending
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
                .is_ok()
            {
                let buffer = Arc::clone(&self.buffer);
                let sink = Arc::clone(&self.sink);
                tokio::spawn(async move {
                    if let Ok(_guard) = buffer.flush_lock.try_lock() {
                        Self::flush_buffer(&buffer, &sink).await;
                    } else {
                        trace!("ClickManager: flush already in progress, skipping");
                    }
                    buffer.flush_pending.store(false, Ordering::Release);
                });
            }
        }
    }

    /// 启动后台刷盘任务（作为异步方法运行）
    pub async fn start_background_task(&self) {
        loop {
            sleep(self.flush_interval).await;

            debug!("ClickManager: Triggering scheduled flush");
            if let Ok(_guard) = self.buffer.flush_lock.try_lock() {
                Self::flush_buffer(&self.buffer, &self.sink).await;
            } else {
                trace!("ClickManager: flush already in progress, skipping scheduled flush");
            }
        }
    }

    /// 手动触发刷盘（阻塞直到完成）
    pub async fn flush(&self) {
        debug!("ClickManager: Manual flush triggered");
        let _guard = self.buffer.flush_lock.lock().await;
        Self::flush_buffer(&self.buffer, &self.sink).await;
    }

    async fn flush_buffer(buffer: &CounterBuffer, sink: &Arc<dyn CounterSink>) {
        let updates = buffer.drain();

        if updates.is_empty() {
            trace!("ClickManager: No counters to flush");
            return;
        }

        let count = updates.len();
        match sink.flush_counters(updates.clone()).await {
            Ok(_) => {
                debug!("ClickManager: Successfully flushed {} entries", count);
            }
            Err(e) => {
                buffer.restore(updates);
                warn!(
                    "ClickManager: flush_counters failed: {}, {} entries restored to buffer",
                    e, count
                );
            }
        }
    }

    /// 获取当前缓冲区总增量（用于健康检查）
    pub fn buffer_size(&self) -> usize {
        self.buffer.total()
    }
}
