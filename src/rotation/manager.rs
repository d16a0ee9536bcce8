//! 滚动触发管理器
//!
//! 根据滚动策略在后台线程中判断何时需要滚动，并通过 fire 通道把下一个
//! 历史文件名交给写入器。fire 通道是零容量的会合通道：触发线程在交付
//! 文件名之前会一直阻塞，因此任何时刻最多只有一个未被消费的文件名。

use crate::config::{Config, RollingPolicy};
use crate::error::{Result, RollingWriterError};
use crate::rotation::naming::FileNamer;
use crate::rotation::size::parse_volume_size;
use crate::utils::file_tools::FileTools;
use chrono::{DateTime, Local};
use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::select;
use cron::Schedule;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// 滚动触发管理器
pub struct RotationManager {
    policy: RollingPolicy,
    namer: Arc<FileNamer>,
    fire_rx: Receiver<PathBuf>,
    /// 不滚动策略下保持通道存活，使其处于空闲而非断开状态
    _idle_tx: Option<Sender<PathBuf>>,
    stop_tx: Mutex<Option<Sender<()>>>,
    trigger: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for RotationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotationManager")
            .field("policy", &self.policy)
            .field("namer", &self.namer)
            .field("running", &self.trigger.lock().is_some())
            .finish()
    }
}

impl RotationManager {
    /// 根据配置创建管理器并启动对应的后台触发线程
    pub fn new(config: &Config) -> Result<Self> {
        let namer = Arc::new(FileNamer::new(config));
        let (fire_tx, fire_rx) = channel::bounded(0);
        let (stop_tx, stop_rx) = channel::bounded::<()>(0);

        let (trigger, idle_tx) = match config.rolling_policy {
            RollingPolicy::WithoutRolling => (None, Some(fire_tx)),
            RollingPolicy::TimeRolling => {
                let schedule = parse_schedule(&config.rolling_time_pattern)?;
                info!(
                    pattern = %config.rolling_time_pattern,
                    "time rolling enabled"
                );
                let namer = Arc::clone(&namer);
                let handle = thread::Builder::new()
                    .name("rolling-time-trigger".to_string())
                    .spawn(move || run_time_trigger(schedule, namer, fire_tx, stop_rx))?;
                (Some(handle), None)
            }
            RollingPolicy::VolumeRolling => {
                let threshold = parse_volume_size(&config.rolling_volume_size);
                let interval = config.tuning.poll_interval();
                info!(
                    size = %config.rolling_volume_size,
                    threshold,
                    interval_ms = interval.as_millis() as u64,
                    "volume rolling enabled"
                );
                let namer = Arc::clone(&namer);
                let handle = thread::Builder::new()
                    .name("rolling-volume-poller".to_string())
                    .spawn(move || {
                        run_volume_poller(threshold, interval, namer, fire_tx, stop_rx)
                    })?;
                (Some(handle), None)
            }
        };

        Ok(Self {
            policy: config.rolling_policy,
            namer,
            fire_rx,
            _idle_tx: idle_tx,
            stop_tx: Mutex::new(Some(stop_tx)),
            trigger: Mutex::new(trigger),
        })
    }

    /// fire 通道的接收端，产出下一个历史文件名
    pub fn fire(&self) -> &Receiver<PathBuf> {
        &self.fire_rx
    }

    /// 历史文件名生成器
    pub fn namer(&self) -> &Arc<FileNamer> {
        &self.namer
    }

    /// 生成下一个历史文件名（会重置分段起始时间）
    pub fn generate_file_name(&self) -> PathBuf {
        self.namer.generate_file_name()
    }

    /// 停止后台触发线程；重复调用是空操作
    pub fn close(&self) {
        let Some(stop_tx) = self.stop_tx.lock().take() else {
            return;
        };
        drop(stop_tx);

        if let Some(handle) = self.trigger.lock().take() {
            if handle.join().is_err() {
                warn!("rotation trigger thread panicked");
            }
        }
        debug!(policy = ?self.policy, "rotation manager closed");
    }

    /// 后台触发线程是否仍在运行
    pub fn is_running(&self) -> bool {
        self.trigger
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for RotationManager {
    fn drop(&mut self) {
        self.close();
    }
}

/// 解析 cron 表达式；标准 5 段表达式会补上秒字段 `0`，并把星期字段换算为
/// cron crate 的编号
pub fn parse_schedule(pattern: &str) -> Result<Schedule> {
    let pattern = pattern.trim();
    let fields: Vec<&str> = pattern.split_whitespace().collect();
    let expr = if let [minute, hour, day, month, weekday] = fields.as_slice() {
        format!(
            "0 {} {} {} {} {}",
            minute,
            hour,
            day,
            month,
            translate_day_of_week(weekday)?
        )
    } else {
        pattern.to_string()
    };

    Schedule::from_str(&expr).map_err(|e| {
        RollingWriterError::invalid_argument(format!("invalid cron pattern {:?}: {}", pattern, e))
    })
}

/// 标准 cron 的星期编号为 0-7（0 和 7 都是周日），cron crate 为 1-7（1 是周日）。
///
/// 数字写法展开为换算后的列表，名称与不带步长的通配符原样保留。
fn translate_day_of_week(field: &str) -> Result<String> {
    let invalid = || {
        RollingWriterError::invalid_argument(format!("invalid day-of-week field {:?}", field))
    };
    let parse_day = |value: &str| match value.parse::<u32>() {
        Ok(day) if day <= 7 => Ok(day),
        _ => Err(invalid()),
    };

    let mut parts = Vec::new();
    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => match step.parse::<usize>() {
                Ok(step) if step > 0 => (range, Some(step)),
                _ => return Err(invalid()),
            },
            None => (item, None),
        };

        let is_wildcard = range == "*" || range == "?";
        if range.chars().any(|c| c.is_ascii_alphabetic()) || (is_wildcard && step.is_none()) {
            parts.push(item.to_string());
            continue;
        }

        let (start, end) = if is_wildcard {
            (0, 6)
        } else if let Some((start, end)) = range.split_once('-') {
            (parse_day(start)?, parse_day(end)?)
        } else {
            let day = parse_day(range)?;
            // `n/step` 表示从 n 到周六
            (day, if step.is_some() { 6u32.max(day) } else { day })
        };
        if start > end {
            return Err(invalid());
        }

        for day in (start..=end).step_by(step.unwrap_or(1)) {
            parts.push((day % 7 + 1).to_string());
        }
    }
    Ok(parts.join(","))
}

/// 生成文件名并交付给写入器；收到停止信号或通道断开时返回 false
fn deliver(namer: &FileNamer, fire_tx: &Sender<PathBuf>, stop_rx: &Receiver<()>) -> bool {
    let name = namer.generate_file_name();
    debug!(file = %name.display(), "rotation fired");
    select! {
        send(fire_tx, name) -> res => res.is_ok(),
        recv(stop_rx) -> _ => false,
    }
}

fn run_time_trigger(
    schedule: Schedule,
    namer: Arc<FileNamer>,
    fire_tx: Sender<PathBuf>,
    stop_rx: Receiver<()>,
) {
    let mut anchor: DateTime<Local> = Local::now();
    loop {
        let Some(next) = schedule.after(&anchor).next() else {
            debug!("cron schedule has no upcoming ticks");
            return;
        };
        let wait = (next - Local::now()).to_std().unwrap_or(Duration::ZERO);

        select! {
            recv(stop_rx) -> _ => return,
            default(wait) => {}
        }

        if !deliver(&namer, &fire_tx, &stop_rx) {
            return;
        }
        // 交付可能阻塞很久，跳过期间错过的触发点
        anchor = next.max(Local::now());
    }
}

fn run_volume_poller(
    threshold: u64,
    interval: Duration,
    namer: Arc<FileNamer>,
    fire_tx: Sender<PathBuf>,
    stop_rx: Receiver<()>,
) {
    let mut ticker = channel::tick(interval);
    let path = namer.active_path();
    loop {
        select! {
            recv(stop_rx) -> _ => return,
            recv(ticker) -> _ => {}
        }

        let Ok(size) = FileTools::get_file_size(&path) else {
            continue;
        };
        if size > threshold {
            if !deliver(&namer, &fire_tx, &stop_rx) {
                return;
            }
            // 交付期间积压的 tick 会在重命名前再次检查旧文件，重新计时
            ticker = channel::tick(interval);
        }
    }
}
