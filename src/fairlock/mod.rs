//! Client for the per-resource fair lock broker.
//!
//! A broker daemon (`fairlock@<name>.service`) listens on
//! `<socket_dir>/<name>` and admits one connected client at a time in
//! arrival order. Holding the connection open *is* holding the lock:
//!
//! 1. connect, starting the broker service if nothing is listening
//! 2. read the broker's short readiness blob (this blocks until our turn)
//! 3. send `"<pid> - <monotonic seconds>"` so the broker can log the holder
//! 4. keep the stream open for the critical section; closing it releases
//!
//! Starting the broker is bounded by the configured timeout, after which
//! entering fails with `SmError::ServiceUnavailable`.


use crate::config::Config;
use crate::error::{Result, SmError};
use crate::fs::validate_component;
use nix::time::{ClockId, clock_gettime};
use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

/// Interval between broker readiness probes.
const SERVICE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Size of the broker's readiness message.
const READY_BLOB_LEN: usize = 10;

/// A named lock served by a broker daemon.
///
/// The re-entry check only sees this instance, so a process should hold one
/// `Fairlock` per name; [`SmContext::fairlock`](crate::context::SmContext::fairlock)
/// hands out shared instances.
#[derive(Debug)]
pub struct Fairlock {
    name: String,
    socket_path: PathBuf,
    service_manager: String,
    start_timeout: Duration,
    stream: Mutex<Option<UnixStream>>,
}

impl Fairlock {
    pub fn new(name: &str, config: &Config) -> Result<Self> {
        Self::with_settings(
            name,
            &config.fairlock_socket_dir,
            &config.fairlock_service_manager,
            config.fairlock_start_timeout(),
        )
    }

    pub fn with_settings(
        name: &str,
        socket_dir: &Path,
        service_manager: &str,
        start_timeout: Duration,
    ) -> Result<Self> {
        validate_component("fairlock name", name)?;
        Ok(Self {
            name: name.to_string(),
            socket_path: socket_dir.join(name),
            service_manager: service_manager.to_string(),
            start_timeout,
            stream: Mutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn service_name(&self) -> String {
        format!("fairlock@{}.service", self.name)
    }

    fn stream(&self) -> MutexGuard<'_, Option<UnixStream>> {
        self.stream
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    /// True while this instance holds the broker connection.
    pub fn is_entered(&self) -> bool {
        self.stream().is_some()
    }

    /// Block until the broker grants the lock.
    ///
    /// Entering an instance that is already entered would wait on ourselves
    /// forever and is rejected instead.
    pub fn enter(&self) -> Result<FairlockGuard<'_>> {
        let mut slot = self.stream();
        if slot.is_some() {
            return Err(SmError::ReentrancyViolation(format!(
                "deadlock: fairlock '{}' is already held by this process",
                self.name
            )));
        }

        let mut stream = match UnixStream::connect(&self.socket_path) {
            Ok(stream) => stream,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused
                ) =>
            {
                log::info!("fairlock {}: broker not listening, starting it", self.name);
                self.ensure_service()?;
                UnixStream::connect(&self.socket_path).map_err(|e| self.io_error("connect to", e))?
            }
            Err(e) => return Err(self.io_error("connect to", e)),
        };

        let mut ready = [0u8; READY_BLOB_LEN];
        stream
            .read(&mut ready)
            .map_err(|e| self.io_error("wait for", e))?;

        let message = format!("{} - {}", std::process::id(), monotonic_seconds()?);
        stream
            .write_all(message.as_bytes())
            .map_err(|e| self.io_error("identify to", e))?;

        log::debug!("fairlock {}: entered", self.name);
        *slot = Some(stream);
        Ok(FairlockGuard { lock: self })
    }

    fn exit(&self) {
        if self.stream().take().is_some() {
            log::debug!("fairlock {}: exited", self.name);
        }
    }

    /// Start the broker unit and wait, bounded, for it to report active.
    fn ensure_service(&self) -> Result<()> {
        let service = self.service_name();
        if !self.run_service_manager(&["start", &service])? {
            log::warn!("fairlock {}: '{} start {}' failed", self.name, self.service_manager, service);
        }

        let deadline = Instant::now() + self.start_timeout;
        loop {
            thread::sleep(SERVICE_POLL_INTERVAL);
            if self.run_service_manager(&["--quiet", "is-active", &service])? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(SmError::ServiceUnavailable(format!(
                    "timed out waiting for {} to start",
                    service
                )));
            }
        }
    }

    /// Run the service manager, returning whether it exited successfully.
    fn run_service_manager(&self, args: &[&str]) -> Result<bool> {
        let output = Command::new(&self.service_manager)
            .args(args)
            .output()
            .map_err(|e| {
                SmError::io(
                    format!(
                        "failed to execute {} {}",
                        self.service_manager,
                        args.join(" ")
                    ),
                    e,
                )
            })?;
        Ok(output.status.success())
    }

    fn io_error(&self, action: &str, e: io::Error) -> SmError {
        SmError::io(
            format!(
                "failed to {} fairlock broker at '{}'",
                action,
                self.socket_path.display()
            ),
            e,
        )
    }
}

fn monotonic_seconds() -> Result<String> {
    let now = clock_gettime(ClockId::CLOCK_MONOTONIC)
        .map_err(|e| SmError::io("failed to read monotonic clock", io::Error::from(e)))?;
    Ok(format!("{}.{:09}", now.tv_sec(), now.tv_nsec()))
}

/// Holds a [`Fairlock`] until dropped.
#[derive(Debug)]
#[must_use = "the fairlock is released when the guard is dropped"]
pub struct FairlockGuard<'a> {
    lock: &'a Fairlock,
}

impl Drop for FairlockGuard<'_> {
    fn drop(&mut self) {
        self.lock.exit();
    }
}
