//! Shared test harness for the socket-level specs: spawn a real `evrd`
//! binary against a scratch socket path and speak newline-delimited
//! JSON to it directly, the way any non-CLI client would.
//!
//! There is no `oj`-style CLI front end in this workspace, so where the
//! prior harness drove a binary through subcommands, these specs drive
//! `evrd` by connecting straight to its socket with
//! [`std::os::unix::net::UnixStream`].

use assert_cmd::cargo::cargo_bin;
use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::process::{Child, Command};
use std::time::{Duration, Instant};

pub const WAIT_MAX_MS: u64 = 5_000;

/// Poll `predicate` until it returns `true` or `timeout_ms` elapses.
pub fn wait_for(timeout_ms: u64, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        if predicate() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

/// A running `evrd` process bound to a throwaway socket under a temp dir.
///
/// `Drop` kills the process if it hasn't already exited, so a failing
/// assertion never leaks a daemon.
pub struct Daemon {
    child: Child,
    socket_path: PathBuf,
    _tempdir: tempfile::TempDir,
}

impl Daemon {
    /// Start `evrd` with a fresh socket, waiting for it to come up.
    pub fn start() -> Self {
        Self::start_with_env(&[])
    }

    pub fn start_with_env(extra_env: &[(&str, &str)]) -> Self {
        let tempdir = tempfile::tempdir().expect("create tempdir for daemon socket");
        let socket_path = tempdir.path().join("daemon.sock");

        let mut cmd = Command::new(cargo_bin("evrd"));
        cmd.env("KSI_SOCKET", &socket_path).env("RUST_LOG", "warn");
        for (key, value) in extra_env {
            cmd.env(key, value);
        }
        let child = cmd.spawn().expect("spawn evrd");

        let up = wait_for(WAIT_MAX_MS, || socket_path.exists());
        assert!(up, "evrd should create its socket file within {WAIT_MAX_MS}ms");

        Self { child, socket_path, _tempdir: tempdir }
    }

    pub fn connect(&self) -> Client {
        let up = wait_for(WAIT_MAX_MS, || UnixStream::connect(&self.socket_path).is_ok());
        assert!(up, "should be able to connect to evrd's socket");
        Client::connect(&self.socket_path)
    }

    /// Open a bare `UnixStream` for tests that need to drive the wire
    /// protocol by hand instead of through [`Client`].
    pub fn connect_raw(&self) -> UnixStream {
        UnixStream::connect(&self.socket_path).expect("connect to daemon socket")
    }

    /// Wait for the process to exit on its own (after a shutdown
    /// request) and return its exit code.
    pub fn wait_for_exit(&mut self, timeout_ms: u64) -> Option<i32> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if let Ok(Some(status)) = self.child.try_wait() {
                return status.code();
            }
            if Instant::now() >= deadline {
                return None;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        if matches!(self.child.try_wait(), Ok(None)) {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// One connection to a running daemon, speaking line-delimited JSON.
pub struct Client {
    writer: UnixStream,
    reader: BufReader<UnixStream>,
}

impl Client {
    pub fn connect(socket_path: &std::path::Path) -> Self {
        let stream = UnixStream::connect(socket_path).expect("connect to daemon socket");
        let reader = BufReader::new(stream.try_clone().expect("clone socket handle"));
        Self { writer: stream, reader }
    }

    /// Send a raw request object and return the single parsed response line.
    pub fn send(&mut self, request: &Value) -> Value {
        let mut line = serde_json::to_string(request).expect("serialize request");
        line.push('\n');
        self.writer.write_all(line.as_bytes()).expect("write request");
        self.writer.flush().expect("flush request");

        let mut response_line = String::new();
        self.reader.read_line(&mut response_line).expect("read response");
        serde_json::from_str(response_line.trim_end()).expect("parse response as JSON")
    }

    pub fn emit(&mut self, event: &str, data: Value) -> Value {
        self.send(&json!({"event": event, "data": data}))
    }

    pub fn emit_with_correlation(&mut self, event: &str, data: Value, correlation_id: &str) -> Value {
        self.send(&json!({"event": event, "data": data, "correlation_id": correlation_id}))
    }
}
