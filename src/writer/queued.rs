//! `async` 模式：数据拷贝进池化缓冲区后入队，由单个消费者线程写入文件。
//!
//! 消费者是唯一的文件写入点，因此滚动检查也在消费者一侧进行。消费者遇到的
//! 错误放入单槽错误通道，由下一次 `write` 返回；槽已被占用时新错误被丢弃。

use crate::config::{Config, WriterMode};
use crate::diagnostics::WriterStats;
use crate::error::{Result, RollingWriterError};
use crate::writer::core::WriterCore;
use crate::writer::pool::BufferPool;
use crate::writer::RollingWrite;
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use crossbeam::select;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

pub struct QueuedWriter {
    core: Arc<WriterCore>,
    pool: Arc<BufferPool>,
    queue_tx: Sender<Vec<u8>>,
    queue_rx: Receiver<Vec<u8>>,
    errors_tx: Sender<RollingWriterError>,
    errors_rx: Receiver<RollingWriterError>,
    stop_tx: Mutex<Option<Sender<()>>>,
    consumer: Mutex<Option<JoinHandle<()>>>,
    /// 生产者持读锁，close 持写锁，保证 close 之前完成的写入都已入队
    gate: RwLock<()>,
    closed: AtomicBool,
}

impl std::fmt::Debug for QueuedWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedWriter")
            .field("core", &self.core)
            .field("queued", &self.queue_rx.len())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl QueuedWriter {
    pub fn new(core: WriterCore, config: &Config) -> Result<Self> {
        let core = Arc::new(core);
        let pool = Arc::new(BufferPool::new(
            config.tuning.async_queue_size,
            config.tuning.async_buffer_size,
        ));
        let (queue_tx, queue_rx) = channel::bounded(config.tuning.async_queue_size);
        let (errors_tx, errors_rx) = channel::bounded(1);
        let (stop_tx, stop_rx) = channel::bounded::<()>(0);

        let consumer = {
            let core = Arc::clone(&core);
            let pool = Arc::clone(&pool);
            let queue_rx = queue_rx.clone();
            let errors_tx = errors_tx.clone();
            thread::Builder::new()
                .name("rolling-async-writer".to_string())
                .spawn(move || run_consumer(core, pool, queue_rx, stop_rx, errors_tx))?
        };

        Ok(Self {
            core,
            pool,
            queue_tx,
            queue_rx,
            errors_tx,
            errors_rx,
            stop_tx: Mutex::new(Some(stop_tx)),
            consumer: Mutex::new(Some(consumer)),
            gate: RwLock::new(()),
            closed: AtomicBool::new(false),
        })
    }

    /// 队列中等待写入的缓冲区数
    pub fn queued(&self) -> usize {
        self.queue_rx.len()
    }
}

impl RollingWrite for QueuedWriter {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        let _gate = self.gate.read();
        if self.closed.load(Ordering::Acquire) {
            return Err(RollingWriterError::Closed);
        }
        if let Ok(err) = self.errors_rx.try_recv() {
            return Err(err);
        }

        for chunk in buf.chunks(self.pool.buffer_capacity()) {
            let mut pooled = self.pool.get();
            pooled.extend_from_slice(chunk);
            self.queue_tx
                .send(pooled)
                .map_err(|_| RollingWriterError::Closed)?;
        }
        Ok(buf.len())
    }

    fn close(&self) -> Result<()> {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(RollingWriterError::Closed);
        }

        // 等待在途生产者入队完毕
        drop(self.gate.write());

        drop(self.stop_tx.lock().take());
        if let Some(handle) = self.consumer.lock().take() {
            if handle.join().is_err() {
                warn!("async consumer thread panicked");
            }
        }

        let mut drained = 0usize;
        while let Ok(pending) = self.queue_rx.try_recv() {
            let result = self.core.rotate_and_write(&pending);
            self.pool.put(pending);
            drained += 1;
            if let Err(e) = result {
                if !park_error(&self.errors_tx, e, self.core.stats()) {
                    break;
                }
            }
        }
        let metrics = self.pool.metrics();
        debug!(
            buffers = drained,
            pool_hits = metrics.hits.load(Ordering::Relaxed),
            pool_misses = metrics.misses.load(Ordering::Relaxed),
            pool_drops = metrics.drops.load(Ordering::Relaxed),
            "async queue drained on close"
        );

        if let Ok(err) = self.errors_rx.try_recv() {
            debug!(error = %err, "async write error discarded at close");
        }

        self.core.shutdown();
        Ok(())
    }

    fn mode(&self) -> WriterMode {
        WriterMode::Asynchronous
    }

    fn core(&self) -> &WriterCore {
        &self.core
    }
}

fn run_consumer(
    core: Arc<WriterCore>,
    pool: Arc<BufferPool>,
    queue_rx: Receiver<Vec<u8>>,
    stop_rx: Receiver<()>,
    errors_tx: Sender<RollingWriterError>,
) {
    loop {
        select! {
            recv(queue_rx) -> msg => {
                let Ok(pending) = msg else {
                    return;
                };
                let result = core.rotate_and_write(&pending);
                pool.put(pending);
                if let Err(e) = result {
                    park_error(&errors_tx, e, core.stats());
                }
            }
            recv(stop_rx) -> _ => return,
        }
    }
}

/// 把消费者侧的错误放入单槽通道；槽已满时记录并丢弃，返回 false
fn park_error(
    errors_tx: &Sender<RollingWriterError>,
    err: RollingWriterError,
    stats: &WriterStats,
) -> bool {
    match errors_tx.try_send(err) {
        Ok(()) => true,
        Err(TrySendError::Full(err)) | Err(TrySendError::Disconnected(err)) => {
            stats.record_async_error_dropped();
            warn!(error = %err, "async write error dropped, previous error not yet reported");
            false
        }
    }
}
