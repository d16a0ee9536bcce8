//! 滚动相关模块：大小解析、文件命名与滚动触发。

pub mod manager;
pub mod naming;
pub mod size;

pub use manager::{parse_schedule, RotationManager};
pub use naming::{parse_time_tag, temp_path, FileNamer};
pub use size::{parse_volume_size, DEFAULT_VOLUME_SIZE};
