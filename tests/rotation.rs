use flate2::read::GzDecoder;
use rolling_writer::{ConfigOption, RollingWriter};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

/// 按文件名排序的历史文件
fn historical_files(dir: &Path, active: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.file_name() != active.file_name())
        .collect();
    files.sort();
    files
}

fn volume_options(dir: &TempDir, poll: Duration) -> Vec<ConfigOption> {
    vec![
        ConfigOption::LogPath(dir.path().to_path_buf()),
        ConfigOption::FileName("app".to_string()),
        ConfigOption::TimeTagFormat("%Y%m%d%H%M%S%f".to_string()),
        ConfigOption::RollingVolumeSize("1K".to_string()),
        ConfigOption::PollInterval(poll),
    ]
}

#[test]
fn test_volume_rotation_happens_exactly_once() {
    let temp_dir = TempDir::new().unwrap();
    let mut writer =
        RollingWriter::with_options(volume_options(&temp_dir, Duration::from_secs(1))).unwrap();
    let active = writer.active_path().to_path_buf();

    let first = vec![b'x'; 1500];
    writer.write_all(&first).unwrap();
    thread::sleep(Duration::from_millis(2500));

    writer.write_all(b"after\n").unwrap();
    thread::sleep(Duration::from_millis(1500));
    writer.close().unwrap();

    let historical = historical_files(temp_dir.path(), &active);
    assert_eq!(historical.len(), 1, "expected one rotation: {:?}", historical);
    assert_eq!(fs::read(&historical[0]).unwrap(), first);
    assert_eq!(fs::read_to_string(&active).unwrap(), "after\n");
    assert_eq!(writer.stats().rotations, 1);
}

#[test]
fn test_long_pause_after_crossing_rotates_once() {
    let temp_dir = TempDir::new().unwrap();
    let mut writer =
        RollingWriter::with_options(volume_options(&temp_dir, Duration::from_millis(20))).unwrap();
    let active = writer.active_path().to_path_buf();

    let first = vec![b'x'; 1500];
    writer.write_all(&first).unwrap();
    // 停顿远超两个轮询间隔
    thread::sleep(Duration::from_millis(200));
    writer.write_all(b"a").unwrap();
    thread::sleep(Duration::from_millis(200));
    writer.write_all(b"b").unwrap();
    writer.close().unwrap();

    let historical = historical_files(temp_dir.path(), &active);
    assert_eq!(historical.len(), 1, "expected one rotation: {:?}", historical);
    assert_eq!(fs::read(&historical[0]).unwrap(), first);
    assert_eq!(fs::read_to_string(&active).unwrap(), "ab");
    assert_eq!(writer.stats().rotations, 1);
}

#[test]
fn test_retention_keeps_most_recent_segments() {
    let temp_dir = TempDir::new().unwrap();
    let mut options = volume_options(&temp_dir, Duration::from_millis(20));
    options.push(ConfigOption::MaxRemain(2));
    let mut writer = RollingWriter::with_options(options).unwrap();
    let active = writer.active_path().to_path_buf();

    // 每个分段写满 2000 个相同字节，等待轮询线程触发后由下一次写入完成滚动
    for segment in 0..5u8 {
        writer.write_all(&[b'a' + segment; 2000]).unwrap();
        thread::sleep(Duration::from_millis(300));
    }
    writer.write_all(b"end").unwrap();
    writer.close().unwrap();

    assert_eq!(writer.stats().rotations, 5);
    let historical = historical_files(temp_dir.path(), &active);
    assert_eq!(historical.len(), 2, "{:?}", historical);
    assert_eq!(fs::read(&historical[0]).unwrap(), vec![b'd'; 2000]);
    assert_eq!(fs::read(&historical[1]).unwrap(), vec![b'e'; 2000]);
    assert_eq!(fs::read_to_string(&active).unwrap(), "end");
}

#[test]
fn test_compressed_segment_round_trips() {
    let temp_dir = TempDir::new().unwrap();
    let mut options = volume_options(&temp_dir, Duration::from_millis(20));
    options.push(ConfigOption::Compress);
    let mut writer = RollingWriter::with_options(options).unwrap();
    let active = writer.active_path().to_path_buf();

    let mut segment = String::new();
    for i in 0..100 {
        segment.push_str(&format!("record {:03} before rotation\n", i));
    }
    writer.write_all(segment.as_bytes()).unwrap();
    thread::sleep(Duration::from_millis(300));
    writer.write_all(b"next segment\n").unwrap();
    writer.close().unwrap();

    let historical = historical_files(temp_dir.path(), &active);
    assert_eq!(historical.len(), 1, "{:?}", historical);
    let name = historical[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("app.log.gz."), "{}", name);

    let mut decoded = String::new();
    GzDecoder::new(File::open(&historical[0]).unwrap())
        .read_to_string(&mut decoded)
        .unwrap();
    assert_eq!(decoded, segment);
    assert_eq!(writer.stats().compressions, 1);
}

#[test]
fn test_startup_scan_trims_existing_history() {
    let temp_dir = TempDir::new().unwrap();
    for day in 1..=4 {
        fs::write(
            temp_dir.path().join(format!("app.log.2024010{}0000", day)),
            b"old",
        )
        .unwrap();
    }
    fs::write(temp_dir.path().join("unrelated.txt"), b"keep").unwrap();

    let writer = RollingWriter::with_options([
        ConfigOption::LogPath(temp_dir.path().to_path_buf()),
        ConfigOption::FileName("app".to_string()),
        ConfigOption::WithoutRolling,
        ConfigOption::MaxRemain(2),
    ])
    .unwrap();
    writer.close().unwrap();

    assert!(!temp_dir.path().join("app.log.202401010000").exists());
    assert!(!temp_dir.path().join("app.log.202401020000").exists());
    assert!(temp_dir.path().join("app.log.202401030000").exists());
    assert!(temp_dir.path().join("app.log.202401040000").exists());
    assert!(temp_dir.path().join("unrelated.txt").exists());
}

#[test]
fn test_without_rolling_never_rotates() {
    let temp_dir = TempDir::new().unwrap();
    let mut writer = RollingWriter::with_options([
        ConfigOption::LogPath(temp_dir.path().to_path_buf()),
        ConfigOption::FileName("app".to_string()),
        ConfigOption::WithoutRolling,
    ])
    .unwrap();
    let active = writer.active_path().to_path_buf();

    for _ in 0..10 {
        writer.write_all(&[b'z'; 512]).unwrap();
    }
    writer.close().unwrap();

    assert!(historical_files(temp_dir.path(), &active).is_empty());
    assert_eq!(fs::metadata(&active).unwrap().len(), 5120);
}
