//! Running instance registry
//!
//! Only one player may be resident at a time. [`PidFileRegistry`] records the
//! running instance as `<dir>/<name>.pid`; a remover asks it to tear down by
//! creating `<dir>/<name>.stop` and waits until the instance has removed its
//! pid file.

use crate::{PlayerError, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Default wait for a running instance to acknowledge teardown
pub const DEFAULT_TEARDOWN_TIMEOUT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A running instance found in the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceHandle {
    /// Program name
    pub name: String,
    /// Process id recorded at registration
    pub pid: u32,
}

/// Lookup and removal of resident instances
pub trait InstanceRegistry {
    /// Find a running instance registered under `name`
    fn find_running(&self, name: &str) -> Result<Option<InstanceHandle>>;

    /// Ask the instance to tear down and wait until it has
    fn teardown(&self, handle: &InstanceHandle) -> Result<()>;
}

/// Registry backed by pid files in a directory
#[derive(Debug, Clone)]
pub struct PidFileRegistry {
    dir: PathBuf,
    timeout: Duration,
}

impl PidFileRegistry {
    /// Registry keeping its files in `dir`
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        PidFileRegistry {
            dir: dir.into(),
            timeout: DEFAULT_TEARDOWN_TIMEOUT,
        }
    }

    /// Registry in the system temporary directory
    pub fn in_temp_dir() -> Self {
        Self::new(std::env::temp_dir())
    }

    /// Override the teardown wait
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn pid_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.pid"))
    }

    fn stop_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.stop"))
    }

    /// Register the current process under `name`.
    ///
    /// Fails if another instance is already registered.
    pub fn register(&self, name: &str) -> Result<Registration> {
        let pid_path = self.pid_path(name);
        let stop_path = self.stop_path(name);

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&pid_path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => {
                    PlayerError::Registry(format!("{name} is already running"))
                }
                _ => PlayerError::Registry(format!("cannot create {}: {e}", pid_path.display())),
            })?;
        writeln!(file, "{}", std::process::id())?;

        // A stale request from an earlier remover must not stop us immediately
        let _ = fs::remove_file(&stop_path);

        tracing::debug!(path = %pid_path.display(), "instance registered");
        Ok(Registration {
            pid_path,
            stop_path,
        })
    }
}

impl InstanceRegistry for PidFileRegistry {
    fn find_running(&self, name: &str) -> Result<Option<InstanceHandle>> {
        let text = match fs::read_to_string(self.pid_path(name)) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let pid = text
            .trim()
            .parse()
            .map_err(|_| PlayerError::Registry(format!("corrupt pid file for {name}")))?;
        Ok(Some(InstanceHandle {
            name: name.to_string(),
            pid,
        }))
    }

    fn teardown(&self, handle: &InstanceHandle) -> Result<()> {
        let pid_path = self.pid_path(&handle.name);
        let stop_path = self.stop_path(&handle.name);
        fs::write(&stop_path, handle.pid.to_string())?;

        let deadline = Instant::now() + self.timeout;
        while pid_path.exists() {
            if Instant::now() >= deadline {
                let _ = fs::remove_file(&pid_path);
                let _ = fs::remove_file(&stop_path);
                return Err(PlayerError::Registry(format!(
                    "instance {} did not respond; stale registration removed",
                    handle.pid
                )));
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        let _ = fs::remove_file(&stop_path);
        tracing::debug!(pid = handle.pid, "instance removed");
        Ok(())
    }
}

/// Live registration of the current process; removed on drop
#[derive(Debug)]
pub struct Registration {
    pid_path: PathBuf,
    stop_path: PathBuf,
}

impl Registration {
    /// Whether a remover has asked this instance to stop
    pub fn stop_requested(&self) -> bool {
        self.stop_path.exists()
    }

    /// Path of the pid file
    pub fn pid_path(&self) -> &Path {
        &self.pid_path
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.pid_path);
        let _ = fs::remove_file(&self.stop_path);
    }
}
