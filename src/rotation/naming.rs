//! 日志文件命名
//!
//! - 活动文件：`<log_path>/<file_name>.log`
//! - 历史文件：`<log_path>/<file_name>.log[.gz].<时间标签>`
//! - 压缩临时文件：`<历史文件>.tmp`

use crate::config::Config;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

/// 历史文件名生成器
///
/// 持有当前分段的起始时间。每生成一个历史文件名，起始时间就被重置为当前时间，
/// 因此生成操作在内部锁下串行执行。
#[derive(Debug)]
pub struct FileNamer {
    log_path: PathBuf,
    file_name: String,
    time_tag_format: String,
    compress: bool,
    segment_start: Mutex<DateTime<Local>>,
}

impl FileNamer {
    /// 根据配置创建生成器，分段起始时间为当前时间
    pub fn new(config: &Config) -> Self {
        Self {
            log_path: config.log_path.clone(),
            file_name: config.file_name.clone(),
            time_tag_format: config.time_tag_format.clone(),
            compress: config.compress,
            segment_start: Mutex::new(Local::now()),
        }
    }

    /// 日志目录
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// 活动文件路径
    pub fn active_path(&self) -> PathBuf {
        self.log_path.join(format!("{}.log", self.file_name))
    }

    /// 生成下一个历史文件名，并把分段起始时间重置为当前时间
    pub fn generate_file_name(&self) -> PathBuf {
        let mut start = self.segment_start.lock();
        let name = self.historical_name(&start);
        *start = Local::now();
        name
    }

    /// 以给定时间作为分段起点的历史文件名（不修改状态）
    pub fn historical_name(&self, start: &DateTime<Local>) -> PathBuf {
        let tag = start.format(&self.time_tag_format);
        let name = if self.compress {
            format!("{}.log.gz.{}", self.file_name, tag)
        } else {
            format!("{}.log.{}", self.file_name, tag)
        };
        self.log_path.join(name)
    }

    /// 当前分段的起始时间
    pub fn segment_start(&self) -> DateTime<Local> {
        *self.segment_start.lock()
    }

    /// 判断目录项是否为本写入器产生的历史文件，是则返回其时间标签对应的时间
    pub fn parse_historical(&self, file_name: &str) -> Option<NaiveDateTime> {
        let rest = file_name.strip_prefix(&format!("{}.log.", self.file_name))?;
        let tag = rest.strip_prefix("gz.").unwrap_or(rest);
        if tag.is_empty() {
            return None;
        }
        parse_time_tag(tag, &self.time_tag_format)
    }
}

/// 按时间标签格式解析；格式不含时分时按当天零点处理
pub fn parse_time_tag(tag: &str, format: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(tag, format)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(tag, format)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// 压缩过程中使用的临时文件名
pub fn temp_path(historical: &Path) -> PathBuf {
    let mut name = historical.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
