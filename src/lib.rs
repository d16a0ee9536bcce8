//! rolling_writer - 可滚动的日志文件写入器
//!
//! 把字节写入 `<log_path>/<file_name>.log`，并按 cron 定时或文件大小把当前文件
//! 滚动为 `<file_name>.log[.gz].<时间标签>` 历史文件，可选 gzip 压缩，
//! 并只保留最近的若干个历史文件。
//!
//! 支持四种并发模式：`none`（不加锁）、`lock`（互斥锁）、`async`（队列 +
//! 后台写线程）和 `buffer`（阈值批量刷新）。
//!
//! # 快速开始
//!
//! ```no_run
//! use rolling_writer::{ConfigOption, RollingWriter};
//! use std::io::Write;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut writer = RollingWriter::with_options([
//!         ConfigOption::LogPath("./log".into()),
//!         ConfigOption::FileName("app".to_string()),
//!         ConfigOption::RollingVolumeSize("100MB".to_string()),
//!         ConfigOption::MaxRemain(5),
//!         ConfigOption::Compress,
//!     ])?;
//!
//!     writeln!(writer, "service started")?;
//!     writer.close()?;
//!     Ok(())
//! }
//! ```
//!
//! # 作为 tracing 的输出
//!
//! ```no_run
//! use rolling_writer::{ConfigOption, RollingWriter};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let writer = RollingWriter::with_options([ConfigOption::Asynchronous])?;
//!     tracing_subscriber::fmt()
//!         .with_ansi(false)
//!         .with_writer(writer.clone())
//!         .init();
//!
//!     tracing::info!("written through the rolling writer");
//!     writer.close()?;
//!     Ok(())
//! }
//! ```

pub mod background;
pub mod compress;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod retention;
pub mod rotation;
pub mod utils;
pub mod writer;

// 重新导出主要类型
pub use config::{
    load_config_from_file, load_config_from_str, Config, ConfigFormat, ConfigOption,
    RollingPolicy, TuningConfig, WriterMode,
};
pub use diagnostics::{StatsSnapshot, WriterStats};
pub use error::{Result, RollingWriterError};
pub use rotation::size::parse_volume_size;
pub use writer::RollingWrite;

use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::fmt::MakeWriter;

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 滚动写入器句柄
///
/// 克隆开销很小，所有克隆共享同一个底层写入器；最后一个克隆被释放时
/// 写入器自动关闭。
#[derive(Clone)]
pub struct RollingWriter {
    inner: Arc<WriterHandle>,
}

struct WriterHandle(Box<dyn RollingWrite>);

impl Drop for WriterHandle {
    fn drop(&mut self) {
        match self.0.close() {
            Ok(()) | Err(RollingWriterError::Closed) => {}
            Err(e) => warn!(error = %e, "failed to close rolling writer on drop"),
        }
    }
}

impl std::fmt::Debug for RollingWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollingWriter")
            .field("mode", &self.mode())
            .field("active_path", &self.active_path())
            .finish()
    }
}

impl RollingWriter {
    /// 根据配置创建写入器
    pub fn new(config: Config) -> Result<Self> {
        let writer = writer::build_writer(&config)?;
        Ok(Self {
            inner: Arc::new(WriterHandle(writer)),
        })
    }

    /// 在默认配置上应用选项后创建写入器
    pub fn with_options<I>(options: I) -> Result<Self>
    where
        I: IntoIterator<Item = ConfigOption>,
    {
        Self::new(Config::from_options(options))
    }

    /// 从配置文件创建写入器
    pub fn from_config_file<P: AsRef<Path>>(path: P, format: ConfigFormat) -> Result<Self> {
        Self::new(load_config_from_file(path.as_ref(), format)?)
    }

    /// 从配置字符串创建写入器
    pub fn from_config_str(text: &str, format: ConfigFormat) -> Result<Self> {
        Self::new(load_config_from_str(text, format)?)
    }

    /// 写入一段字节，返回接受的字节数
    pub fn write_bytes(&self, buf: &[u8]) -> Result<usize> {
        self.inner.0.write(buf)
    }

    /// 把缓冲模式中积累的数据写到文件
    pub fn flush_buffered(&self) -> Result<()> {
        self.inner.0.flush()
    }

    /// 关闭写入器；之后的写入以及再次关闭都返回 `Closed`
    pub fn close(&self) -> Result<()> {
        self.inner.0.close()
    }

    /// 并发模式
    pub fn mode(&self) -> WriterMode {
        self.inner.0.mode()
    }

    /// 活动文件的绝对路径
    pub fn active_path(&self) -> &Path {
        self.inner.0.core().active_path()
    }

    /// 运行时计数快照
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.0.core().stats().snapshot()
    }
}

impl io::Write for RollingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_buffered().map_err(io::Error::from)
    }
}

impl io::Write for &RollingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_buffered().map_err(io::Error::from)
    }
}

impl<'a> MakeWriter<'a> for RollingWriter {
    type Writer = &'a RollingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn options(dir: &TempDir, mode: ConfigOption) -> Vec<ConfigOption> {
        vec![
            ConfigOption::LogPath(dir.path().to_path_buf()),
            ConfigOption::FileName("lib".to_string()),
            ConfigOption::WithoutRolling,
            mode,
        ]
    }

    #[test]
    fn test_every_mode_writes_and_closes() {
        for mode in [
            ConfigOption::Unsynchronized,
            ConfigOption::Lock,
            ConfigOption::Asynchronous,
            ConfigOption::Buffer,
        ] {
            let temp_dir = TempDir::new().unwrap();
            let mut writer = RollingWriter::with_options(options(&temp_dir, mode)).unwrap();
            writer.write_all(b"hello\n").unwrap();
            writer.close().unwrap();

            let content = std::fs::read_to_string(writer.active_path()).unwrap();
            assert_eq!(content, "hello\n", "mode {}", writer.mode());
        }
    }

    #[test]
    fn test_mode_reported() {
        let temp_dir = TempDir::new().unwrap();
        let writer =
            RollingWriter::with_options(options(&temp_dir, ConfigOption::Buffer)).unwrap();
        assert_eq!(writer.mode(), WriterMode::Buffered);
        assert!(writer.active_path().is_absolute());
        assert!(writer.active_path().ends_with("lib.log"));
    }

    #[test]
    fn test_write_after_close_maps_to_broken_pipe() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer =
            RollingWriter::with_options(options(&temp_dir, ConfigOption::Lock)).unwrap();
        writer.close().unwrap();

        let err = writer.write(b"late").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert!(matches!(writer.close(), Err(RollingWriterError::Closed)));
    }

    #[test]
    fn test_drop_of_last_clone_closes() {
        let temp_dir = TempDir::new().unwrap();
        let writer =
            RollingWriter::with_options(options(&temp_dir, ConfigOption::Asynchronous)).unwrap();
        let path = writer.active_path().to_path_buf();

        let clone = writer.clone();
        drop(writer);
        (&clone).write_all(b"still open\n").unwrap();
        drop(clone);

        assert_eq!(std::fs::read_to_string(path).unwrap(), "still open\n");
    }

    #[test]
    fn test_from_config_str() {
        let temp_dir = TempDir::new().unwrap();
        let json = format!(
            r#"{{ "log_path": {:?}, "file_name": "json", "rolling_policy": 0, "writer_mode": "none" }}"#,
            temp_dir.path().to_string_lossy()
        );
        let writer = RollingWriter::from_config_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(writer.mode(), WriterMode::Unsynchronized);
        assert!(writer.active_path().ends_with("json.log"));
    }

    #[test]
    fn test_invalid_mode_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::from_options(options(&temp_dir, ConfigOption::Lock));
        config.writer_mode = "turbo".to_string();
        assert!(matches!(
            RollingWriter::new(config),
            Err(RollingWriterError::InvalidArgument(_))
        ));
    }
}
