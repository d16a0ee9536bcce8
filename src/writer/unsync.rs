//! `none` 模式：不加锁，直接检查滚动并写入。
//!
//! 句柄交换本身是原子的，但多个生产者之间的顺序不做保证。

use crate::config::WriterMode;
use crate::error::{Result, RollingWriterError};
use crate::writer::core::WriterCore;
use crate::writer::RollingWrite;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug)]
pub struct UnsyncWriter {
    core: WriterCore,
    closed: AtomicBool,
}

impl UnsyncWriter {
    pub fn new(core: WriterCore) -> Self {
        Self {
            core,
            closed: AtomicBool::new(false),
        }
    }
}

impl RollingWrite for UnsyncWriter {
    fn write(&self, buf: &[u8]) -> Result<usize> {
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
        self.core.shutdown();
        Ok(())
    }

    fn mode(&self) -> WriterMode {
        WriterMode::Unsynchronized
    }

    fn core(&self) -> &WriterCore {
        &self.core
    }
}
