//! 写入器的内部诊断与计数。
//!
//! 每个写入器持有一份 [`WriterStats`]，所有计数都是原子操作，
//! 可以在任意线程中通过 [`WriterStats::snapshot`] 读取。

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 写入器运行时计数
#[derive(Debug)]
pub struct WriterStats {
    start_time: Instant,

    /// 成功写入活动文件的字节数
    bytes_written: AtomicU64,

    /// 成功的写入调用次数
    writes: AtomicU64,

    /// 写入失败次数
    write_errors: AtomicU64,

    /// 完成的滚动次数
    rotations: AtomicU64,

    /// 缓冲模式的刷新次数
    flushes: AtomicU64,

    /// 完成压缩的历史文件数
    compressions: AtomicU64,

    /// 压缩失败次数
    compression_failures: AtomicU64,

    /// 被保留策略删除的历史文件数
    evictions: AtomicU64,

    /// 后台任务失败次数（关闭旧句柄、删除文件等）
    background_failures: AtomicU64,

    /// 异步模式下因错误槽已满而被丢弃的错误数
    async_errors_dropped: AtomicU64,
}

/// 计数快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub uptime: Duration,
    pub bytes_written: u64,
    pub writes: u64,
    pub write_errors: u64,
    pub rotations: u64,
    pub flushes: u64,
    pub compressions: u64,
    pub compression_failures: u64,
    pub evictions: u64,
    pub background_failures: u64,
    pub async_errors_dropped: u64,
}

impl Default for WriterStats {
    fn default() -> Self {
        Self::new()
    }
}

impl WriterStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            bytes_written: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
            rotations: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            compressions: AtomicU64::new(0),
            compression_failures: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            background_failures: AtomicU64::new(0),
            async_errors_dropped: AtomicU64::new(0),
        }
    }

    /// 记录一次成功写入
    pub fn record_write(&self, bytes: usize) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_write_error(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rotation(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_compression(&self) {
        self.compressions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_compression_failure(&self) {
        self.compression_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_background_failure(&self) {
        self.background_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_async_error_dropped(&self) {
        self.async_errors_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// 获取当前计数的快照
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime: self.start_time.elapsed(),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            rotations: self.rotations.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            compressions: self.compressions.load(Ordering::Relaxed),
            compression_failures: self.compression_failures.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            background_failures: self.background_failures.load(Ordering::Relaxed),
            async_errors_dropped: self.async_errors_dropped.load(Ordering::Relaxed),
        }
    }
}
