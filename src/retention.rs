//! 历史文件保留策略
//!
//! 维护一个容量为 `max_remain` 的有界 FIFO 队列。队列满时先删除最旧的
//! 历史文件，再把新文件入队，因此磁盘上最多保留 `max_remain` 个历史文件。

use crate::diagnostics::WriterStats;
use crate::error::Result;
use crate::rotation::naming::FileNamer;
use crate::utils::FileTools;
use crossbeam::queue::ArrayQueue;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// 历史文件保留队列
#[derive(Debug)]
pub struct RetentionQueue {
    queue: ArrayQueue<PathBuf>,
    stats: Arc<WriterStats>,
}

impl RetentionQueue {
    /// 创建容量为 `max_remain` 的空队列
    ///
    /// `max_remain` 必须大于 0。
    pub fn new(max_remain: usize, stats: Arc<WriterStats>) -> Self {
        Self {
            queue: ArrayQueue::new(max_remain),
            stats,
        }
    }

    /// 创建队列并把目录中已存在的历史文件按时间标签从旧到新登记进来
    ///
    /// 超出容量的旧文件会在登记时被删除。
    pub fn with_existing(max_remain: usize, namer: &FileNamer, stats: Arc<WriterStats>) -> Result<Self> {
        let retention = Self::new(max_remain, stats);
        for path in scan_existing(namer.log_path(), namer)? {
            retention.enqueue(path);
        }
        Ok(retention)
    }

    /// 登记一个新的历史文件；队列满时先淘汰最旧的文件
    pub fn enqueue(&self, path: PathBuf) {
        let mut item = path;
        loop {
            match self.queue.push(item) {
                Ok(()) => {
                    debug!(tracked = self.tracked(), "historical log file registered");
                    return;
                }
                Err(rejected) => {
                    item = rejected;
                    self.evict_oldest();
                }
            }
        }
    }

    /// 删除队列中最旧的历史文件
    ///
    /// 删除失败只记录警告，该文件不再被跟踪。
    pub fn evict_oldest(&self) -> Option<PathBuf> {
        let oldest = self.queue.pop()?;
        match FileTools::remove_file_safe(&oldest) {
            Ok(()) => {
                self.stats.record_eviction();
                debug!(file = %oldest.display(), "evicted historical log file");
            }
            Err(e) => {
                self.stats.record_background_failure();
                warn!(file = %oldest.display(), error = %e, "failed to remove historical log file");
            }
        }
        Some(oldest)
    }

    /// 当前跟踪的历史文件数
    pub fn tracked(&self) -> usize {
        self.queue.len()
    }
}

/// 扫描目录中属于该写入器的历史文件，按时间标签升序返回
pub fn scan_existing(dir: &Path, namer: &FileNamer) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if let Some(tag_time) = namer.parse_historical(name) {
            found.push((tag_time, entry.path()));
        }
    }

    found.sort();
    Ok(found.into_iter().map(|(_, path)| path).collect())
}
