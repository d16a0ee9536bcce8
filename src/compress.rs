//! 历史文件的 gzip 压缩。

use crate::error::{Result, RollingWriterError};
use crate::utils::FileTools;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

/// 把 `src` 压缩为 gzip 文件 `dst`
///
/// 失败时删除不完整的 `dst`，`src` 保持不变。
pub fn compress_file(src: &Path, dst: &Path) -> Result<u64> {
    match gzip_into(src, dst) {
        Ok(written) => Ok(written),
        Err(e) => {
            if let Err(cleanup) = FileTools::remove_file_safe(dst) {
                tracing::warn!(
                    file = %dst.display(),
                    error = %cleanup,
                    "failed to remove partial gzip file"
                );
            }
            Err(RollingWriterError::compression(format!(
                "{} -> {}: {}",
                src.display(),
                dst.display(),
                e
            )))
        }
    }
}

fn gzip_into(src: &Path, dst: &Path) -> io::Result<u64> {
    let mut reader = BufReader::new(File::open(src)?);
    let mut encoder = GzEncoder::new(File::create(dst)?, Compression::default());
    let copied = io::copy(&mut reader, &mut encoder)?;
    let file = encoder.finish()?;
    file.sync_all()?;
    Ok(copied)
}
