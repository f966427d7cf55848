use super::CounterKey;

/// 计数器 Sink（聚合模式）
///
/// `updates` 中每个键只出现一次，值为待累加的增量。
#[async_trait::async_trait]
pub trait CounterSink: Send + Sync {
    async fn flush_counters(&self, updates: Vec<(CounterKey, usize)>) -> anyhow::Result<()>;
}
