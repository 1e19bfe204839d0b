#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::Result;
use stty_port::{config::PortConfig, port::PortEvent};
use tempfile::{NamedTempFile, TempDir};
use tokio::sync::broadcast;
use tokio::time::timeout;

/// A stand-in for the external line configuration tool.
///
/// A shell script which first drops a marker file next to itself,
/// then runs the given body. The marker tells tests whether the tool
/// was ever spawned.
pub struct Tool {
    dir: TempDir,

    /// Path to the executable script.
    pub path: PathBuf,
}

impl Tool {
    pub fn new(body: &str) -> Self {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let path = dir.path().join("stty-stub.sh");

        let script = format!("#!/bin/sh\ntouch \"$(dirname \"$0\")/ran\"\n{body}\n");
        std::fs::write(&path, script).expect("Should write tool script");

        let mut permissions = std::fs::metadata(&path)
            .expect("Script metadata")
            .permissions();
        permissions.set_mode(0o755);
        std::fs::set_permissions(&path, permissions).expect("Should make script executable");

        Self { dir, path }
    }

    /// A tool which succeeds immediately.
    pub fn ok() -> Self {
        Self::new("exit 0")
    }

    /// A tool which fails with the given exit code.
    pub fn failing(exit_code: i32) -> Self {
        Self::new(&format!("exit {exit_code}"))
    }

    /// A tool which hangs for the given number of seconds.
    pub fn hanging(seconds: u32) -> Self {
        Self::new(&format!("sleep {seconds}"))
    }

    /// Whether the tool was ever spawned.
    pub fn was_spawned(&self) -> bool {
        self.dir.path().join("ran").exists()
    }
}

/// A simulated serial device: a temp file with the given initial
/// contents. Reads see the contents then end-of-input; writes land in
/// the file in submission order.
pub fn device_with(contents: &[u8]) -> NamedTempFile {
    use std::io::Write;

    let mut file = NamedTempFile::new().expect("Should create temp device");
    file.write_all(contents).expect("Should seed device");
    file.flush().expect("Should flush device");
    file
}

/// An empty simulated device.
pub fn device() -> NamedTempFile {
    device_with(b"")
}

/// A configuration targeting the simulated device and stub tool,
/// with a test-friendly timeout.
pub fn test_config(device: &Path, tool: &Tool) -> PortConfig {
    PortConfig::new(device)
        .set_stty_path(tool.path.clone())
        .set_init_timeout(Some(Duration::from_secs(5)))
}

/// Receive the next port event, bounded so a broken test fails
/// instead of hanging.
pub async fn next_event(events: &mut broadcast::Receiver<PortEvent>) -> Result<PortEvent> {
    let event = timeout(Duration::from_secs(5), events.recv()).await??;
    Ok(event)
}
