//! 定义滚动写入器的全部配置结构体。
//!
//! 配置可以通过三种方式得到：直接构造 [`Config`]、在默认配置上应用
//! [`ConfigOption`] 列表，或者从 JSON / YAML / TOML 文件解析。

use crate::error::{Result, RollingWriterError};
use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// 异步模式下单个池化缓冲区的默认容量（字节）
pub const DEFAULT_ASYNC_BUFFER_SIZE: usize = 0x100000;
/// 异步模式下写入队列的默认容量（缓冲区个数）
pub const DEFAULT_ASYNC_QUEUE_SIZE: usize = 1024;
/// 大小滚动策略下检查文件大小的默认间隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

// --- 辅助函数，用于提供配置项的默认值 ---
fn default_time_tag_format() -> String {
    "%Y%m%d%H%M".to_string()
}
fn default_log_path() -> PathBuf {
    PathBuf::from("./log")
}
fn default_file_name() -> String {
    "log".to_string()
}
fn default_max_remain() -> i64 {
    -1
}
fn default_rolling_time_pattern() -> String {
    "0 0 * * *".to_string()
}
fn default_rolling_volume_size() -> String {
    "1G".to_string()
}
fn default_writer_mode() -> String {
    "lock".to_string()
}
fn default_buffer_threshold() -> usize {
    64
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_async_buffer_size() -> usize {
    DEFAULT_ASYNC_BUFFER_SIZE
}
fn default_async_queue_size() -> usize {
    DEFAULT_ASYNC_QUEUE_SIZE
}
fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

/// 日志滚动策略。
///
/// 配置文件中既可以写数字 (`0` / `1` / `2`)，也可以写名称
/// (`"WithoutRolling"` / `"TimeRolling"` / `"VolumeRolling"`)。
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(try_from = "PolicyRepr")]
pub enum RollingPolicy {
    /// 不滚动
    WithoutRolling,
    /// 按 cron 表达式定时滚动
    #[default]
    TimeRolling,
    /// 按文件大小滚动
    VolumeRolling,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PolicyRepr {
    Code(i64),
    Name(String),
}

impl TryFrom<PolicyRepr> for RollingPolicy {
    type Error = String;

    fn try_from(repr: PolicyRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            PolicyRepr::Code(0) => Ok(RollingPolicy::WithoutRolling),
            PolicyRepr::Code(1) => Ok(RollingPolicy::TimeRolling),
            PolicyRepr::Code(2) => Ok(RollingPolicy::VolumeRolling),
            PolicyRepr::Code(other) => Err(format!("unknown rolling policy code: {}", other)),
            PolicyRepr::Name(name) => name.parse(),
        }
    }
}

impl FromStr for RollingPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "withoutrolling" | "without_rolling" | "none" => Ok(RollingPolicy::WithoutRolling),
            "timerolling" | "time_rolling" | "time" => Ok(RollingPolicy::TimeRolling),
            "volumerolling" | "volume_rolling" | "volume" | "size" => {
                Ok(RollingPolicy::VolumeRolling)
            }
            _ => Err(format!("unknown rolling policy: {}", s)),
        }
    }
}

/// 写入器并发模式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterMode {
    /// 无保护，仅在单生产者下保证顺序
    Unsynchronized,
    /// 互斥锁串行化
    Locked,
    /// 队列 + 后台写线程
    Asynchronous,
    /// 阈值批量刷新
    Buffered,
}

impl WriterMode {
    /// 配置文件中使用的名称
    pub fn as_str(&self) -> &'static str {
        match self {
            WriterMode::Unsynchronized => "none",
            WriterMode::Locked => "lock",
            WriterMode::Asynchronous => "async",
            WriterMode::Buffered => "buffer",
        }
    }
}

impl FromStr for WriterMode {
    type Err = RollingWriterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(WriterMode::Unsynchronized),
            "lock" => Ok(WriterMode::Locked),
            "async" => Ok(WriterMode::Asynchronous),
            "buffer" => Ok(WriterMode::Buffered),
            _ => Err(RollingWriterError::invalid_argument(format!(
                "unknown writer mode: {:?}",
                s
            ))),
        }
    }
}

impl std::fmt::Display for WriterMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 可调参数：替代全局可变默认值的显式覆盖点。
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TuningConfig {
    #[serde(default = "default_async_buffer_size")]
    pub async_buffer_size: usize,
    #[serde(default = "default_async_queue_size")]
    pub async_queue_size: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl TuningConfig {
    /// 大小轮询间隔
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            async_buffer_size: default_async_buffer_size(),
            async_queue_size: default_async_queue_size(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// 滚动写入器的顶层配置结构体。
///
/// 字段名同时接受 snake_case（JSON / TOML 习惯）和 camelCase（YAML 习惯）。
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_time_tag_format", alias = "timeTagFormat")]
    pub time_tag_format: String,
    #[serde(default = "default_log_path", alias = "logPath")]
    pub log_path: PathBuf,
    #[serde(default = "default_file_name", alias = "fileName")]
    pub file_name: String,
    #[serde(default = "default_max_remain", alias = "maxRemain")]
    pub max_remain: i64,
    #[serde(default, alias = "rollingPolicy")]
    pub rolling_policy: RollingPolicy,
    #[serde(default = "default_rolling_time_pattern", alias = "rollingTimePattern")]
    pub rolling_time_pattern: String,
    #[serde(default = "default_rolling_volume_size", alias = "rollingVolumeSize")]
    pub rolling_volume_size: String,
    #[serde(default = "default_writer_mode", alias = "writerMode")]
    pub writer_mode: String,
    #[serde(
        default = "default_buffer_threshold",
        alias = "bufferWriterThreshold",
        alias = "buffer_writer_threshold"
    )]
    pub buffer_threshold: usize,
    #[serde(default = "default_false")]
    pub compress: bool,
    #[serde(default = "default_true", alias = "waitBackgroundOnClose")]
    pub wait_background_on_close: bool,
    #[serde(default)]
    pub tuning: TuningConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            time_tag_format: default_time_tag_format(),
            log_path: default_log_path(),
            file_name: default_file_name(),
            max_remain: default_max_remain(),
            rolling_policy: RollingPolicy::default(),
            rolling_time_pattern: default_rolling_time_pattern(),
            rolling_volume_size: default_rolling_volume_size(),
            writer_mode: default_writer_mode(),
            buffer_threshold: default_buffer_threshold(),
            compress: default_false(),
            wait_background_on_close: default_true(),
            tuning: TuningConfig::default(),
        }
    }
}

impl Config {
    /// 在默认配置上依次应用选项
    pub fn from_options<I>(options: I) -> Self
    where
        I: IntoIterator<Item = ConfigOption>,
    {
        let mut config = Self::default();
        for option in options {
            option.apply(&mut config);
        }
        config
    }

    /// 当前活动日志文件的完整路径：`<log_path>/<file_name>.log`
    pub fn log_file_path(&self) -> PathBuf {
        self.log_path.join(format!("{}.log", self.file_name))
    }

    /// 解析写入模式
    pub fn writer_mode(&self) -> Result<WriterMode> {
        self.writer_mode.parse()
    }

    /// 保留的历史文件数；`None` 表示不限制
    pub fn retention(&self) -> Option<usize> {
        if self.max_remain > 0 {
            Some(self.max_remain as usize)
        } else {
            None
        }
    }

    /// 验证配置的有效性。
    pub fn validate(&self) -> Result<()> {
        if self.log_path.as_os_str().is_empty() {
            return Err(RollingWriterError::invalid_argument("日志目录不能为空"));
        }

        if self.file_name.trim().is_empty() {
            return Err(RollingWriterError::invalid_argument("日志文件名不能为空"));
        }

        self.writer_mode()?;

        if self.time_tag_format.trim().is_empty() {
            return Err(RollingWriterError::invalid_argument("时间标签格式不能为空"));
        }

        if StrftimeItems::new(&self.time_tag_format).any(|item| matches!(item, Item::Error)) {
            return Err(RollingWriterError::invalid_argument(format!(
                "无效的时间标签格式: {}",
                self.time_tag_format
            )));
        }

        if self.buffer_threshold == 0 {
            return Err(RollingWriterError::invalid_argument(
                "缓冲刷新阈值必须大于0",
            ));
        }

        if self.tuning.async_buffer_size == 0 || self.tuning.async_queue_size == 0 {
            return Err(RollingWriterError::invalid_argument(
                "异步缓冲区大小和队列容量必须大于0",
            ));
        }

        if self.rolling_policy == RollingPolicy::VolumeRolling && self.tuning.poll_interval_ms == 0
        {
            return Err(RollingWriterError::invalid_argument(
                "大小轮询间隔必须大于0",
            ));
        }

        Ok(())
    }
}

/// 配置选项，用于在默认配置上逐项修改。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOption {
    /// 更新时间标签格式
    TimeTagFormat(String),
    /// 更新日志目录
    LogPath(PathBuf),
    /// 更新日志文件名称
    FileName(String),
    /// 改为 async 模式
    Asynchronous,
    /// 改为 lock 模式
    Lock,
    /// 改为 buffer 模式
    Buffer,
    /// 改为 none 模式
    Unsynchronized,
    /// 修改 buffer 模式的刷新阈值
    BufferThreshold(usize),
    /// 开启历史文件压缩
    Compress,
    /// 更新历史文件保存数
    MaxRemain(i64),
    /// 设置为不滚动
    WithoutRolling,
    /// 设置为按时间滚动，并更新 cron 表达式
    RollingTimePattern(String),
    /// 设置为按大小滚动，并更新截断大小
    RollingVolumeSize(String),
    /// 修改大小轮询间隔
    PollInterval(Duration),
    /// 修改异步池化缓冲区容量
    AsyncBufferSize(usize),
    /// 修改异步队列容量
    AsyncQueueSize(usize),
    /// 关闭时是否等待后台压缩/清理完成
    WaitBackgroundOnClose(bool),
}

impl ConfigOption {
    /// 将选项应用到配置上
    pub fn apply(self, config: &mut Config) {
        match self {
            ConfigOption::TimeTagFormat(format) => config.time_tag_format = format,
            ConfigOption::LogPath(path) => config.log_path = path,
            ConfigOption::FileName(name) => config.file_name = name,
            ConfigOption::Asynchronous => config.writer_mode = "async".to_string(),
            ConfigOption::Lock => config.writer_mode = "lock".to_string(),
            ConfigOption::Buffer => config.writer_mode = "buffer".to_string(),
            ConfigOption::Unsynchronized => config.writer_mode = "none".to_string(),
            ConfigOption::BufferThreshold(n) => config.buffer_threshold = n,
            ConfigOption::Compress => config.compress = true,
            ConfigOption::MaxRemain(max) => config.max_remain = max,
            ConfigOption::WithoutRolling => config.rolling_policy = RollingPolicy::WithoutRolling,
            ConfigOption::RollingTimePattern(pattern) => {
                config.rolling_policy = RollingPolicy::TimeRolling;
                config.rolling_time_pattern = pattern;
            }
            ConfigOption::RollingVolumeSize(size) => {
                config.rolling_policy = RollingPolicy::VolumeRolling;
                config.rolling_volume_size = size;
            }
            ConfigOption::PollInterval(interval) => {
                config.tuning.poll_interval_ms = interval.as_millis() as u64
            }
            ConfigOption::AsyncBufferSize(size) => config.tuning.async_buffer_size = size,
            ConfigOption::AsyncQueueSize(size) => config.tuning.async_queue_size = size,
            ConfigOption::WaitBackgroundOnClose(wait) => config.wait_background_on_close = wait,
        }
    }
}

/// 配置文件格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
    Toml,
}

impl FromStr for ConfigFormat {
    type Err = RollingWriterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ConfigFormat::Json),
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "toml" => Ok(ConfigFormat::Toml),
            _ => Err(RollingWriterError::invalid_argument(format!(
                "unsupported config format: {:?}",
                s
            ))),
        }
    }
}

/// 从字符串解析配置，缺失的字段保留默认值。
pub fn load_config_from_str(text: &str, format: ConfigFormat) -> Result<Config> {
    let config = match format {
        ConfigFormat::Json => serde_json::from_str(text)?,
        ConfigFormat::Yaml => serde_yaml::from_str(text)?,
        ConfigFormat::Toml => toml::from_str(text)?,
    };
    Ok(config)
}

/// 从文件解析配置。
pub fn load_config_from_file(path: &Path, format: ConfigFormat) -> Result<Config> {
    if !path.exists() {
        return Err(RollingWriterError::invalid_argument(format!(
            "配置文件不存在: {}",
            path.display()
        )));
    }

    let text = std::fs::read_to_string(path)?;
    load_config_from_str(&text, format)
}
