//! 写入器核心：活动文件句柄、滚动检查与滚动后的后台处理。
//!
//! 所有并发模式共享同一套协议：写入前非阻塞地检查 fire 通道，若有待处理
//! 的历史文件名则先执行 [`WriterCore::reopen`]，再写入调用方的数据。

use crate::background::BackgroundWorker;
use crate::compress::compress_file;
use crate::config::Config;
use crate::diagnostics::WriterStats;
use crate::error::{Result, RollingWriterError};
use crate::retention::RetentionQueue;
use crate::rotation::manager::RotationManager;
use crate::rotation::naming::temp_path;
use crate::utils::FileTools;
use arc_swap::ArcSwapOption;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// 等待旧句柄上所有在途写入结束的最长时间
const RELEASE_TIMEOUT: Duration = Duration::from_secs(5);

/// 写入器核心
pub struct WriterCore {
    active_path: PathBuf,
    file: ArcSwapOption<File>,
    manager: RotationManager,
    retention: Option<Arc<RetentionQueue>>,
    compress: bool,
    wait_background_on_close: bool,
    background: BackgroundWorker,
    stats: Arc<WriterStats>,
}

impl std::fmt::Debug for WriterCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterCore")
            .field("active_path", &self.active_path)
            .field("open", &self.is_open())
            .field("manager", &self.manager)
            .field("compress", &self.compress)
            .finish()
    }
}

impl WriterCore {
    /// 创建日志目录、启动滚动管理器并打开活动文件
    pub fn new(config: &Config, stats: Arc<WriterStats>) -> Result<Self> {
        config.validate()?;
        FileTools::ensure_directory_exists(&config.log_path)?;

        let mut config = config.clone();
        config.log_path = fs::canonicalize(&config.log_path)?;
        let active_path = config.log_file_path();

        let manager = RotationManager::new(&config)?;
        let retention = match config.retention() {
            Some(max_remain) => Some(Arc::new(RetentionQueue::with_existing(
                max_remain,
                manager.namer(),
                Arc::clone(&stats),
            )?)),
            None => None,
        };
        let file = FileTools::open_file_append(&active_path)?;
        let background = BackgroundWorker::spawn(format!("rolling-bg-{}", config.file_name))?;

        info!(
            path = %active_path.display(),
            policy = ?config.rolling_policy,
            compress = config.compress,
            max_remain = config.max_remain,
            "rolling writer opened"
        );

        Ok(Self {
            active_path,
            file: ArcSwapOption::from_pointee(file),
            manager,
            retention,
            compress: config.compress,
            wait_background_on_close: config.wait_background_on_close,
            background,
            stats,
        })
    }

    /// 活动文件的绝对路径
    pub fn active_path(&self) -> &Path {
        &self.active_path
    }

    pub fn stats(&self) -> &Arc<WriterStats> {
        &self.stats
    }

    pub fn manager(&self) -> &RotationManager {
        &self.manager
    }

    pub fn background(&self) -> &BackgroundWorker {
        &self.background
    }

    /// 活动句柄是否仍然存在
    pub fn is_open(&self) -> bool {
        self.file.load().is_some()
    }

    /// 非阻塞地检查 fire 通道，有待处理的文件名时执行滚动
    pub fn poll_rotation(&self) -> Result<()> {
        match self.manager.fire().try_recv() {
            Ok(historical) => self.reopen(historical),
            Err(_) => Ok(()),
        }
    }

    /// 把活动文件重命名为 `historical`，打开新的活动文件并交换句柄
    ///
    /// 只有重命名和打开失败会返回错误；旧句柄的关闭、压缩与保留清理
    /// 交给后台线程。
    pub fn reopen(&self, historical: PathBuf) -> Result<()> {
        fs::rename(&self.active_path, &historical).map_err(|e| {
            RollingWriterError::rotation(format!(
                "rename {} -> {}: {}",
                self.active_path.display(),
                historical.display(),
                e
            ))
        })?;

        let fresh = FileTools::open_file_append(&self.active_path).map_err(|e| {
            RollingWriterError::rotation(format!("reopen {}: {}", self.active_path.display(), e))
        })?;

        let previous = self.file.swap(Some(Arc::new(fresh)));
        self.stats.record_rotation();
        info!(file = %historical.display(), "rotation performed");

        let job = Retirement {
            previous,
            historical,
            compress: self.compress,
            retention: self.retention.clone(),
            stats: Arc::clone(&self.stats),
        };
        if let Err(e) = self.background.submit(move || job.run()) {
            self.stats.record_background_failure();
            warn!(error = %e, "failed to schedule post-rotation work");
        }
        Ok(())
    }

    /// 把整段数据写入当前活动句柄
    pub fn write_active(&self, buf: &[u8]) -> Result<usize> {
        let guard = self.file.load();
        let Some(file) = &*guard else {
            return Err(RollingWriterError::Closed);
        };

        let mut handle: &File = file;
        match handle.write_all(buf) {
            Ok(()) => {
                self.stats.record_write(buf.len());
                Ok(buf.len())
            }
            Err(e) => {
                self.stats.record_write_error();
                Err(e.into())
            }
        }
    }

    /// 检查滚动后写入
    pub fn rotate_and_write(&self, buf: &[u8]) -> Result<usize> {
        self.poll_rotation()?;
        self.write_active(buf)
    }

    /// 依次停止滚动触发、关闭活动文件、停止后台线程
    pub fn shutdown(&self) {
        self.manager.close();

        if let Some(handle) = self.file.swap(None) {
            match release_handle(handle) {
                Some(file) => {
                    if let Err(e) = file.sync_data() {
                        warn!(path = %self.active_path.display(), error = %e, "sync on close failed");
                    }
                }
                None => self.stats.record_background_failure(),
            }
        }

        self.background.shutdown(self.wait_background_on_close);
        info!(path = %self.active_path.display(), "rolling writer closed");
    }
}

/// 滚动后的后台任务
struct Retirement {
    previous: Option<Arc<File>>,
    historical: PathBuf,
    compress: bool,
    retention: Option<Arc<RetentionQueue>>,
    stats: Arc<WriterStats>,
}

impl Retirement {
    fn run(mut self) {
        if let Some(handle) = self.previous.take() {
            if release_handle(handle).is_none() {
                self.stats.record_background_failure();
            }
        }

        if self.compress && !self.compress_historical() {
            return;
        }

        if let Some(retention) = &self.retention {
            retention.enqueue(self.historical);
        }
    }

    /// 历史文件先改名为 `.tmp`，再压缩回原名；失败时保留临时文件
    fn compress_historical(&self) -> bool {
        let tmp = temp_path(&self.historical);
        if let Err(e) = fs::rename(&self.historical, &tmp) {
            self.stats.record_compression_failure();
            error!(file = %self.historical.display(), error = %e, "failed to stage file for compression");
            return false;
        }

        match compress_file(&tmp, &self.historical) {
            Ok(bytes) => {
                self.stats.record_compression();
                debug!(file = %self.historical.display(), bytes, "historical file compressed");
                if let Err(e) = FileTools::remove_file_safe(&tmp) {
                    self.stats.record_background_failure();
                    warn!(file = %tmp.display(), error = %e, "failed to remove compression temp file");
                }
                true
            }
            Err(e) => {
                self.stats.record_compression_failure();
                error!(file = %tmp.display(), error = %e, "compression failed, temp file kept");
                false
            }
        }
    }
}

/// 等待所有在途写入释放句柄后取回所有权
///
/// 超时后放弃等待，句柄在最后一个持有者释放时关闭。
fn release_handle(mut handle: Arc<File>) -> Option<File> {
    let deadline = Instant::now() + RELEASE_TIMEOUT;
    let mut backoff = Duration::from_micros(50);
    loop {
        match Arc::try_unwrap(handle) {
            Ok(file) => return Some(file),
            Err(shared) => {
                if Instant::now() >= deadline {
                    warn!("previous file handle still in use, leaving it to the last owner");
                    return None;
                }
                handle = shared;
                thread::sleep(backoff);
                backoff = (backoff * 2).min(Duration::from_millis(10));
            }
        }
    }
}
