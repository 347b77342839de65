//! Process inspection: working directories and liveness.
//!
//! Looking up another process's cwd is best-effort. Each mechanism is tried in
//! order and any failure (permission denied, process gone, tool missing) just
//! moves on to the next:
//!
//! 1. `/proc/<pid>/cwd` symlink (Linux)
//! 2. `sysinfo` process table (macOS and others)
//! 3. `lsof -a -p <pid> -d cwd -Fn`

use crate::command::run_with_timeout;
use std::path::Path;
use std::process::Command;
use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, System, UpdateKind};
use tracing::trace;

const LSOF_TIMEOUT: Duration = Duration::from_millis(500);

/// Source of a process's working directory.
pub trait ProcessInspector: Send + Sync {
    fn cwd_of(&self, pid: u32) -> Option<String>;
}

#[derive(Debug, Clone, Default)]
pub struct SystemProcessInspector;

impl ProcessInspector for SystemProcessInspector {
    fn cwd_of(&self, pid: u32) -> Option<String> {
        proc_link_cwd(pid)
            .or_else(|| sysinfo_cwd(pid))
            .or_else(|| lsof_cwd(pid))
    }
}

fn proc_link_cwd(pid: u32) -> Option<String> {
    let link = format!("/proc/{}/cwd", pid);
    match std::fs::read_link(&link) {
        Ok(target) => path_to_string(&target),
        Err(err) => {
            trace!(pid, error = %err, "proc cwd link unavailable");
            None
        }
    }
}

fn sysinfo_cwd(pid: u32) -> Option<String> {
    let mut sys = System::new();
    let sys_pid = Pid::from_u32(pid);
    sys.refresh_process_specifics(
        sys_pid,
        ProcessRefreshKind::new().with_cwd(UpdateKind::Always),
    );
    let process = sys.process(sys_pid)?;
    path_to_string(process.cwd()?)
}

fn lsof_cwd(pid: u32) -> Option<String> {
    let pid_arg = pid.to_string();
    let mut command = Command::new("lsof");
    command.args(["-a", "-p", pid_arg.as_str(), "-d", "cwd", "-Fn"]);
    match run_with_timeout(&mut command, LSOF_TIMEOUT) {
        Ok(output) if output.status.success() => {
            parse_lsof_cwd(&String::from_utf8_lossy(&output.stdout))
        }
        Ok(_) => None,
        Err(err) => {
            trace!(pid, error = %err, "lsof cwd lookup failed");
            None
        }
    }
}

/// Extracts the `n<path>` field from `lsof -Fn` output.
fn parse_lsof_cwd(output: &str) -> Option<String> {
    output
        .lines()
        .filter_map(|line| line.strip_prefix('n'))
        .map(str::trim)
        .find(|path| path.starts_with('/'))
        .map(str::to_string)
}

fn path_to_string(path: &Path) -> Option<String> {
    let text = path.to_str()?;
    if text.is_empty() || !text.starts_with('/') {
        return None;
    }
    Some(text.to_string())
}

pub fn is_pid_alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }
    // SAFETY: signal 0 performs permission and existence checks only.
    if unsafe { libc::kill(raw, 0) } == 0 {
        return true;
    }
    // EPERM means the process exists but belongs to someone else.
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}
