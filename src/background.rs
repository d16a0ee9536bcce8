//! 后台任务线程
//!
//! 关闭旧文件句柄、压缩与保留清理都在这个专用线程中按提交顺序执行，
//! 写入路径只负责提交任务。

use crate::error::{Result, RollingWriterError};
use crossbeam::channel::{self, Sender};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// 单线程 FIFO 后台任务执行器
pub struct BackgroundWorker {
    name: String,
    sender: Mutex<Option<Sender<Job>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    pending: Arc<AtomicUsize>,
}

impl std::fmt::Debug for BackgroundWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundWorker")
            .field("name", &self.name)
            .field("pending", &self.pending())
            .field("running", &self.sender.lock().is_some())
            .finish()
    }
}

impl BackgroundWorker {
    /// 启动后台线程
    pub fn spawn(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let (tx, rx) = channel::unbounded::<Job>();
        let pending = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&pending);
        let thread_name = name.clone();
        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            for job in rx.iter() {
                if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                    error!(worker = %thread_name, "background job panicked");
                }
                counter.fetch_sub(1, Ordering::AcqRel);
            }
            debug!(worker = %thread_name, "background worker exited");
        })?;

        Ok(Self {
            name,
            sender: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
            pending,
        })
    }

    /// 提交任务；执行器已关闭时返回 `Closed`
    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let guard = self.sender.lock();
        let sender = guard.as_ref().ok_or(RollingWriterError::Closed)?;
        self.pending.fetch_add(1, Ordering::AcqRel);
        if sender.send(Box::new(job)).is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            return Err(RollingWriterError::internal("background worker thread is gone"));
        }
        Ok(())
    }

    /// 尚未执行完的任务数
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// 等待此前提交的任务全部执行完毕，超时返回 false
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let (done_tx, done_rx) = channel::bounded::<()>(1);
        if self
            .submit(move || {
                let _ = done_tx.send(());
            })
            .is_err()
        {
            return self.pending() == 0;
        }
        done_rx.recv_timeout(timeout).is_ok()
    }

    /// 停止接收新任务
    ///
    /// `wait` 为 true 时阻塞到队列中剩余任务全部执行完；否则线程在后台
    /// 继续执行剩余任务后自行退出。重复调用是空操作。
    pub fn shutdown(&self, wait: bool) {
        if self.sender.lock().take().is_none() {
            return;
        }

        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        if wait {
            if handle.join().is_err() {
                warn!(worker = %self.name, "background worker panicked during shutdown");
            }
        } else {
            debug!(
                worker = %self.name,
                pending = self.pending(),
                "background worker detached"
            );
        }
    }
}

impl Drop for BackgroundWorker {
    fn drop(&mut self) {
        self.shutdown(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn test_jobs_run_in_submission_order() {
        let worker = BackgroundWorker::spawn("test-order").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..50 {
            let seen = Arc::clone(&seen);
            worker.submit(move || seen.lock().push(i)).unwrap();
        }
        worker.shutdown(true);

        assert_eq!(*seen.lock(), (0..50).collect::<Vec<_>>());
        assert_eq!(worker.pending(), 0);
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let worker = BackgroundWorker::spawn("test-closed").unwrap();
        worker.shutdown(true);
        worker.shutdown(true);

        let result = worker.submit(|| {});
        assert!(matches!(result, Err(RollingWriterError::Closed)));
    }

    #[test]
    fn test_panicking_job_does_not_stop_worker() {
        let worker = BackgroundWorker::spawn("test-panic").unwrap();
        let ran = Arc::new(AtomicBool::new(false));

        worker.submit(|| panic!("boom")).unwrap();
        let flag = Arc::clone(&ran);
        worker
            .submit(move || flag.store(true, Ordering::SeqCst))
            .unwrap();

        assert!(worker.wait_idle(Duration::from_secs(5)));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_shutdown_without_wait_still_drains() {
        let worker = BackgroundWorker::spawn("test-detach").unwrap();
        let (tx, rx) = channel::bounded(1);
        worker
            .submit(move || {
                thread::sleep(Duration::from_millis(50));
                tx.send(()).unwrap();
            })
            .unwrap();

        worker.shutdown(false);
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }
}
