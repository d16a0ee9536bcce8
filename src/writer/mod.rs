//! 写入器的四种并发模式及其公共接口。

pub mod buffered;
pub mod core;
pub mod locked;
pub mod pool;
pub mod queued;
pub mod unsync;

use crate::config::{Config, WriterMode};
use crate::diagnostics::WriterStats;
use crate::error::Result;
use std::sync::Arc;

pub use self::buffered::BufferedWriter;
pub use self::core::WriterCore;
pub use self::locked::LockedWriter;
pub use self::pool::BufferPool;
pub use self::queued::QueuedWriter;
pub use self::unsync::UnsyncWriter;

/// 滚动写入器的统一接口
///
/// 写入成功表示数据已被接受，不代表已经完成滚动、压缩或清理。
/// 关闭之后的写入和重复关闭都返回 `Closed`。
pub trait RollingWrite: Send + Sync + std::fmt::Debug {
    /// 写入整段数据，返回接受的字节数
    fn write(&self, buf: &[u8]) -> Result<usize>;

    /// 把缓冲中的数据写到文件；没有缓冲的模式什么都不做
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// 关闭写入器
    fn close(&self) -> Result<()>;

    /// 并发模式
    fn mode(&self) -> WriterMode;

    /// 共享的写入器核心
    fn core(&self) -> &WriterCore;
}

/// 根据配置中的写入模式构建写入器
pub fn build_writer(config: &Config) -> Result<Box<dyn RollingWrite>> {
    let mode = config.writer_mode()?;
    let core = WriterCore::new(config, Arc::new(WriterStats::new()))?;

    let writer: Box<dyn RollingWrite> = match mode {
        WriterMode::Unsynchronized => Box::new(UnsyncWriter::new(core)),
        WriterMode::Locked => Box::new(LockedWriter::new(core)),
        WriterMode::Asynchronous => Box::new(QueuedWriter::new(core, config)?),
        WriterMode::Buffered => Box::new(BufferedWriter::new(core, config)),
    };
    Ok(writer)
}
