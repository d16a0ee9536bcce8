//! `lock` 模式：滚动检查与写入在同一把互斥锁下完成。

use crate::config::WriterMode;
use crate::error::{Result, RollingWriterError};
use crate::writer::core::WriterCore;
use crate::writer::RollingWrite;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug)]
pub struct LockedWriter {
    core: WriterCore,
    lock: Mutex<()>,
    closed: AtomicBool,
}

impl LockedWriter {
    pub fn new(core: WriterCore) -> Self {
        Self {
            core,
            lock: Mutex::new(()),
            closed: AtomicBool::new(false),
        }
    }
}

impl RollingWrite for LockedWriter {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        let _guard = self.lock.lock();
        if self.closed.load(Ordering::Acquire) {
            return Err(RollingWriterError::Closed);
        }
        self.core.rotate_and_write(buf)
    }

    fn close(&self) -> Result<()> {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(RollingWriterError::Closed);
        }
        // 等待持锁中的写入完成
        let _guard = self.lock.lock();
        self.core.shutdown();
        Ok(())
    }

    fn mode(&self) -> WriterMode {
        WriterMode::Locked
    }

    fn core(&self) -> &WriterCore {
        &self.core
    }
}
