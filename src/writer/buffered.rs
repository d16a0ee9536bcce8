//! `buffer` 模式：写入追加到共享缓冲区，超过阈值时由一个写入者批量刷新。
//!
//! 追加在互斥锁下进行；刷新通过 `flushing` 标志的 compare-and-swap 保证
//! 同一时刻只有一个在途刷新，其余写入者继续向新缓冲区追加。

use crate::config::{Config, WriterMode};
use crate::error::{Result, RollingWriterError};
use crate::writer::core::WriterCore;
use crate::writer::RollingWrite;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

#[derive(Debug)]
pub struct BufferedWriter {
    core: WriterCore,
    threshold: usize,
    pending: Mutex<Vec<u8>>,
    flushing: AtomicBool,
    gate: RwLock<()>,
    closed: AtomicBool,
}

impl BufferedWriter {
    pub fn new(core: WriterCore, config: &Config) -> Self {
        let threshold = config.buffer_threshold;
        Self {
            core,
            threshold,
            pending: Mutex::new(Vec::with_capacity(threshold * 2)),
            flushing: AtomicBool::new(false),
            gate: RwLock::new(()),
            closed: AtomicBool::new(false),
        }
    }

    /// 缓冲区中尚未刷新的字节数
    pub fn buffered(&self) -> usize {
        self.pending.lock().len()
    }

    fn try_begin_flush(&self) -> bool {
        self.flushing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn begin_flush_blocking(&self) {
        while !self.try_begin_flush() {
            std::thread::yield_now();
        }
    }

    /// 写出一段已取出的数据；失败时把数据放回缓冲区最前面
    ///
    /// 调用前必须已持有 `flushing` 标志，返回前释放。滚动只在 `write`
    /// 入口处理，这里不检查 fire 通道。
    fn flush_batch(&self, batch: Vec<u8>) -> Result<()> {
        let result = if batch.is_empty() {
            Ok(())
        } else {
            self.core.write_active(&batch).map(|_| ())
        };

        match result {
            Ok(()) => {
                if !batch.is_empty() {
                    self.core.stats().record_flush();
                }
            }
            Err(_) => {
                let mut pending = self.pending.lock();
                let mut restored = batch;
                restored.extend_from_slice(&pending);
                *pending = restored;
            }
        }
        self.flushing.store(false, Ordering::Release);
        result
    }

    fn take_pending(&self) -> Vec<u8> {
        let mut pending = self.pending.lock();
        std::mem::replace(&mut *pending, Vec::with_capacity(self.threshold * 2))
    }
}

impl RollingWrite for BufferedWriter {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        let _gate = self.gate.read();
        if self.closed.load(Ordering::Acquire) {
            return Err(RollingWriterError::Closed);
        }
        // 滚动失败时调用方的数据不进入缓冲区
        self.core.poll_rotation()?;

        let batch = {
            let mut pending = self.pending.lock();
            pending.extend_from_slice(buf);
            if pending.len() > self.threshold && self.try_begin_flush() {
                Some(std::mem::replace(
                    &mut *pending,
                    Vec::with_capacity(self.threshold * 2),
                ))
            } else {
                None
            }
        };

        if let Some(batch) = batch {
            self.flush_batch(batch)?;
        }
        Ok(buf.len())
    }

    fn flush(&self) -> Result<()> {
        let _gate = self.gate.read();
        if self.closed.load(Ordering::Acquire) {
            return Err(RollingWriterError::Closed);
        }
        self.begin_flush_blocking();
        let batch = self.take_pending();
        self.flush_batch(batch)
    }

    fn close(&self) -> Result<()> {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(RollingWriterError::Closed);
        }

        drop(self.gate.write());
        self.begin_flush_blocking();
        let remaining = self.take_pending();
        debug!(bytes = remaining.len(), "flushing buffered bytes on close");
        let result = self.flush_batch(remaining);

        self.core.shutdown();
        result
    }

    fn mode(&self) -> WriterMode {
        WriterMode::Buffered
    }

    fn core(&self) -> &WriterCore {
        &self.core
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigOption;
    use crate::diagnostics::WriterStats;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn buffered_writer(dir: &TempDir, threshold: usize) -> BufferedWriter {
        let config = Config::from_options([
            ConfigOption::LogPath(dir.path().to_path_buf()),
            ConfigOption::FileName("buffered".to_string()),
            ConfigOption::WithoutRolling,
            ConfigOption::Buffer,
            ConfigOption::BufferThreshold(threshold),
        ]);
        let core = WriterCore::new(&config, Arc::new(WriterStats::new())).unwrap();
        BufferedWriter::new(core, &config)
    }

    #[test]
    fn test_flush_only_after_threshold() {
        let temp_dir = TempDir::new().unwrap();
        let writer = buffered_writer(&temp_dir, 10);

        writer.write(b"12345").unwrap();
        writer.write(b"67890").unwrap();
        // 恰好等于阈值不刷新
        assert_eq!(writer.buffered(), 10);
        assert_eq!(fs::read(writer.core().active_path()).unwrap(), b"");

        writer.write(b"!").unwrap();
        assert_eq!(writer.buffered(), 0);
        assert_eq!(
            fs::read(writer.core().active_path()).unwrap(),
            b"1234567890!"
        );
        assert_eq!(writer.core().stats().snapshot().flushes, 1);
        writer.close().unwrap();
    }

    #[test]
    fn test_concurrent_writers_leave_flush_idle() {
        let temp_dir = TempDir::new().unwrap();
        let writer = buffered_writer(&temp_dir, 64);

        std::thread::scope(|scope| {
            for producer in 0..4u8 {
                let writer = &writer;
                scope.spawn(move || {
                    for _ in 0..250 {
                        writer.write(&[b'a' + producer; 16]).unwrap();
                    }
                });
            }
        });

        assert!(!writer.flushing.load(Ordering::Acquire));
        let on_disk = fs::read(writer.core().active_path()).unwrap().len();
        assert_eq!(on_disk + writer.buffered(), 4 * 250 * 16);
        // 每次刷新至少写出 threshold + 1 字节
        let flushes = writer.core().stats().snapshot().flushes as usize;
        assert!(flushes >= 1 && flushes <= on_disk / 65);
        writer.close().unwrap();
    }

    #[test]
    fn test_close_writes_remaining() {
        let temp_dir = TempDir::new().unwrap();
        let writer = buffered_writer(&temp_dir, 1024);

        writer.write(b"tail bytes").unwrap();
        writer.close().unwrap();

        assert_eq!(
            fs::read_to_string(writer.core().active_path()).unwrap(),
            "tail bytes"
        );
        assert!(matches!(writer.write(b"x"), Err(RollingWriterError::Closed)));
    }

    #[test]
    fn test_explicit_flush() {
        let temp_dir = TempDir::new().unwrap();
        let writer = buffered_writer(&temp_dir, 1024);

        writer.write(b"abc").unwrap();
        writer.flush().unwrap();
        assert_eq!(fs::read(writer.core().active_path()).unwrap(), b"abc");
        writer.close().unwrap();
    }

    #[test]
    fn test_rotation_failure_does_not_buffer_payload() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::from_options([
            ConfigOption::LogPath(temp_dir.path().to_path_buf()),
            ConfigOption::FileName("buffered".to_string()),
            ConfigOption::RollingVolumeSize("1K".to_string()),
            ConfigOption::PollInterval(std::time::Duration::from_millis(20)),
            ConfigOption::Buffer,
            ConfigOption::BufferThreshold(4),
        ]);
        let core = WriterCore::new(&config, Arc::new(WriterStats::new())).unwrap();
        let writer = BufferedWriter::new(core, &config);

        // 历史文件名被一个非空目录占用，重命名必然失败
        let namer = writer.core().manager().namer();
        let blocked = namer.historical_name(&namer.segment_start());
        fs::create_dir(&blocked).unwrap();
        fs::write(blocked.join("occupied"), b"x").unwrap();

        writer.write(&[b'x'; 2000]).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(200));

        assert!(matches!(
            writer.write(b"FAILED-WRITE"),
            Err(RollingWriterError::RotationError(_))
        ));
        assert_eq!(writer.buffered(), 0);

        fs::remove_dir_all(&blocked).unwrap();
        writer.close().unwrap();

        let content = fs::read(writer.core().active_path()).unwrap();
        assert_eq!(content, vec![b'x'; 2000]);
        assert!(!String::from_utf8_lossy(&content).contains("FAILED-WRITE"));
    }

    #[test]
    fn test_failed_flush_restores_bytes() {
        let temp_dir = TempDir::new().unwrap();
        let writer = buffered_writer(&temp_dir, 4);

        // 关掉活动句柄，使刷新失败
        writer.core().shutdown();
        assert!(matches!(
            writer.write(b"hello"),
            Err(RollingWriterError::Closed)
        ));
        assert_eq!(writer.buffered(), 5);

        writer.pending.lock().clear();
        assert!(!writer.flushing.load(Ordering::Acquire));
    }
}
