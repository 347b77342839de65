//! Subprocess execution with a hard deadline.
//!
//! Every external call on the polling path (kitty remote control, lsof) must
//! return within a bounded time; a hung child is killed and reported as
//! `ErrorKind::TimedOut`. Pipe readers get a short grace period after the
//! child exits; a reader still blocked on a pipe held open by a grandchild is
//! left detached and its output dropped.

use std::io::{self, Read};
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_STEP: Duration = Duration::from_millis(5);
const DRAIN_GRACE: Duration = Duration::from_millis(200);

pub fn run_with_timeout(command: &mut Command, timeout: Duration) -> io::Result<Output> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    // Drain pipes on separate threads so a chatty child cannot block on a
    // full pipe while we wait for it to exit.
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            let grace = Instant::now() + DRAIN_GRACE;
            collect(stdout, grace);
            collect(stderr, grace);
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("process did not exit within {}ms", timeout.as_millis()),
            ));
        }
        thread::sleep(POLL_STEP);
    };

    let grace = Instant::now() + DRAIN_GRACE;
    Ok(Output {
        status,
        stdout: collect(stdout, grace),
        stderr: collect(stderr, grace),
    })
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        let _ = pipe.read_to_end(&mut buffer);
        buffer
    })
}

/// Joins a reader that finishes before `deadline`; otherwise detaches it.
fn collect(handle: Option<JoinHandle<Vec<u8>>>, deadline: Instant) -> Vec<u8> {
    let Some(handle) = handle else {
        return Vec::new();
    };
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return Vec::new();
        }
        thread::sleep(POLL_STEP);
    }
    handle.join().unwrap_or_default()
}
