//! Periodic callback installation

use crate::{PlayerError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Callback run on every timer period
pub type TickCallback = Box<dyn FnMut() + Send + 'static>;

/// Installs a callback that runs at a fixed period
pub trait PeriodicTimer: Send + Sync {
    /// Start calling `callback` every `interval`.
    ///
    /// Fails with [`PlayerError::TimerInstall`] if a callback is already installed.
    fn install(&self, interval: Duration, callback: TickCallback) -> Result<()>;

    /// Stop the callback and wait for it to finish. No-op if nothing is installed.
    fn uninstall(&self);

    /// Whether a callback is currently installed
    fn is_installed(&self) -> bool;
}

struct TimerWorker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Timer backed by a dedicated thread
#[derive(Default)]
pub struct ThreadTimer {
    worker: Mutex<Option<TimerWorker>>,
}

impl ThreadTimer {
    /// Timer with nothing installed
    pub fn new() -> Self {
        Self::default()
    }
}

impl PeriodicTimer for ThreadTimer {
    fn install(&self, interval: Duration, mut callback: TickCallback) -> Result<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Err(PlayerError::TimerInstall(
                "periodic timer is being used by another callback".into(),
            ));
        }
        if interval.is_zero() {
            return Err(PlayerError::TimerInstall("timer interval must be positive".into()));
        }

        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name("bgpcm-tick".into())
            .spawn(move || {
                let mut next = Instant::now() + interval;
                while !flag.load(Ordering::Acquire) {
                    let now = Instant::now();
                    if now < next {
                        std::thread::park_timeout(next - now);
                        continue;
                    }
                    callback();
                    next += interval;
                    // Fell behind: skip missed periods instead of bursting
                    if next < now {
                        next = now + interval;
                    }
                }
            })
            .map_err(|e| PlayerError::TimerInstall(e.to_string()))?;

        *worker = Some(TimerWorker { stop, handle });
        Ok(())
    }

    fn uninstall(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            worker.stop.store(true, Ordering::Release);
            worker.handle.thread().unpark();
            let _ = worker.handle.join();
        }
    }

    fn is_installed(&self) -> bool {
        self.worker.lock().is_some()
    }
}

impl Drop for ThreadTimer {
    fn drop(&mut self) {
        self.uninstall();
    }
}
