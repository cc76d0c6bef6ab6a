//! Process identity and liveness checks.
//!
//! A waiter is identified by `(pid, start time)`. A pid alone is not enough:
//! after a crash the pid may be reused by an unrelated process, which would
//! then appear to own the queue slot forever.

use crate::error::{Result, SmError};
use std::fs;
use std::io;

/// Answers "is the process that queued this entry still running?".
pub trait ProcessLiveness: Send + Sync {
    /// `(pid, start time)` of the calling process.
    fn current(&self) -> Result<(u32, u64)>;

    /// Start time of `pid`, or `None` if no such process exists.
    fn start_time(&self, pid: u32) -> Result<Option<u64>>;

    /// True if `pid` exists and started at `start_time`.
    fn is_alive(&self, pid: u32, start_time: u64) -> Result<bool> {
        Ok(self.start_time(pid)? == Some(start_time))
    }
}

/// Liveness from `/proc/<pid>/stat` (Linux).
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcStat;

impl ProcStat {
    /// Field 22 of `stat`, counted after the parenthesised command name
    /// since that may itself contain spaces or parentheses.
    fn parse_start_time(stat: &str) -> Option<u64> {
        let after_comm = &stat[stat.rfind(')')? + 1..];
        after_comm.split_whitespace().nth(19)?.parse().ok()
    }
}

impl ProcessLiveness for ProcStat {
    fn current(&self) -> Result<(u32, u64)> {
        let pid = std::process::id();
        let start = self.start_time(pid)?.ok_or_else(|| {
            SmError::CorruptState(format!("no /proc entry for own pid {}", pid))
        })?;
        Ok((pid, start))
    }

    fn start_time(&self, pid: u32) -> Result<Option<u64>> {
        let path = format!("/proc/{}/stat", pid);
        let stat = match fs::read_to_string(&path) {
            Ok(stat) => stat,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SmError::io(format!("failed to read '{}'", path), e)),
        };

        Self::parse_start_time(&stat)
            .map(Some)
            .ok_or_else(|| SmError::CorruptState(format!("unparsable '{}'", path)))
    }
}
