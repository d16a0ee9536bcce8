//! 文件工具模块
//!
//! 提供写入器需要的文件操作：目录创建、活动文件打开、安全删除与大小查询。

use crate::error::{Result, RollingWriterError};
use std::fs::{self, File, OpenOptions};
use std::path::Path;

/// 活动文件的创建权限
#[cfg(unix)]
const ACTIVE_FILE_MODE: u32 = 0o644;

/// 文件工具结构体
///
/// 提供各种文件操作的静态方法
pub struct FileTools;

impl FileTools {
    /// 确保目录存在，如果不存在则创建
    ///
    /// 路径存在但不是目录时返回 `InvalidArgument`。
    pub fn ensure_directory_exists<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();

        if !path.exists() {
            fs::create_dir_all(path)?;
        } else if !path.is_dir() {
            return Err(RollingWriterError::invalid_argument(format!(
                "路径存在但不是目录: {}",
                path.display()
            )));
        }

        Ok(())
    }

    /// 以追加模式打开活动文件，不存在时创建（unix 下权限为 0644）
    pub fn open_file_append<P: AsRef<Path>>(file_path: P) -> Result<File> {
        let mut options = OpenOptions::new();
        options.read(true).append(true).create(true);

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(ACTIVE_FILE_MODE);
        }

        Ok(options.open(file_path.as_ref())?)
    }

    /// 获取文件大小（字节）
    pub fn get_file_size<P: AsRef<Path>>(file_path: P) -> Result<u64> {
        Ok(fs::metadata(file_path.as_ref())?.len())
    }

    /// 安全地删除文件；文件不存在视为成功
    pub fn remove_file_safe<P: AsRef<Path>>(file_path: P) -> Result<()> {
        match fs::remove_file(file_path.as_ref()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
