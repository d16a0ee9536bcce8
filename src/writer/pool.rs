//! 异步模式使用的无锁缓冲区池
//!
//! 缓冲区按需分配、用完归还，池满时直接丢弃多余的缓冲区。

use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicU64, Ordering};

/// 缓冲区池计数
#[derive(Debug, Default)]
pub struct PoolMetrics {
    /// 复用池中缓冲区的次数
    pub hits: AtomicU64,
    /// 池为空而新分配的次数
    pub misses: AtomicU64,
    /// 池满而丢弃的缓冲区数
    pub drops: AtomicU64,
}

impl PoolMetrics {
    #[inline]
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn record_drop(&self) {
        self.drops.fetch_add(1, Ordering::Relaxed);
    }
}

/// 固定容量的写缓冲区池
#[derive(Debug)]
pub struct BufferPool {
    queue: ArrayQueue<Vec<u8>>,
    buffer_capacity: usize,
    metrics: PoolMetrics,
}

impl BufferPool {
    /// 最多缓存 `pool_size` 个容量为 `buffer_capacity` 的缓冲区
    pub fn new(pool_size: usize, buffer_capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(pool_size.max(1)),
            buffer_capacity,
            metrics: PoolMetrics::default(),
        }
    }

    /// 单个缓冲区的容量
    pub fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }

    /// 取出一个空缓冲区，池为空时新分配
    #[inline]
    pub fn get(&self) -> Vec<u8> {
        match self.queue.pop() {
            Some(buf) => {
                self.metrics.record_hit();
                buf
            }
            None => {
                self.metrics.record_miss();
                Vec::with_capacity(self.buffer_capacity)
            }
        }
    }

    /// 清空后归还缓冲区
    #[inline]
    pub fn put(&self, mut buf: Vec<u8>) {
        buf.clear();
        if self.queue.push(buf).is_err() {
            self.metrics.record_drop();
        }
    }

    /// 池中空闲缓冲区数
    pub fn available(&self) -> usize {
        self.queue.len()
    }

    pub fn metrics(&self) -> &PoolMetrics {
        &self.metrics
    }
}
