//! Fake `claude` binaries for driving the executors end to end.

#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ghostrun_core::Event;
use ghostrun_core::config::ExecutorConfig;
use ghostrun_server::executor::{EventObserver, Executor};
use tempfile::TempDir;
use tokio::sync::mpsc;

pub const SYSTEM_S1: &str = r#"{"type":"system","subtype":"init","session_id":"s1"}"#;
pub const TEXT_HELLO: &str =
    r#"{"type":"assistant","message":{"content":[{"type":"text","text":"hello"}]}}"#;
pub const RESULT_DONE: &str =
    r#"{"type":"result","session_id":"s1","result":{"result":"done","cost_usd":0.02}}"#;
pub const ASK_PROCEED: &str = r#"{"type":"assistant","message":{"content":[{"type":"tool_use","name":"AskUserQuestion","input":{"questions":[{"question":"Proceed?","header":"Confirm","options":[{"label":"Yes","description":""},{"label":"No","description":""}],"multiSelect":false}]}}]}}"#;

/// A temp directory holding a fake agent script and a project directory.
pub struct FakeAgent {
    dir: TempDir,
    pub bin: PathBuf,
    pub project: PathBuf,
}

impl FakeAgent {
    /// Write a `/bin/sh` script with `body` as the fake agent.
    pub fn new(body: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("claude");
        std::fs::write(&bin, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();
        let project = dir.path().join("project");
        std::fs::create_dir(&project).unwrap();
        Self { dir, bin, project }
    }

    /// A script that prints `lines` verbatim, then runs `tail`.
    pub fn printing(lines: &[&str], tail: &str) -> Self {
        let mut body = String::from("cat <<'EOF'\n");
        for line in lines {
            body.push_str(line);
            body.push('\n');
        }
        body.push_str("EOF\n");
        body.push_str(tail);
        Self::new(&body)
    }

    pub fn executor(&self, timeout_secs: u64) -> Executor {
        Executor::new(&ExecutorConfig {
            claude_bin: self.bin.clone(),
            timeout_secs,
            ..ExecutorConfig::default()
        })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}

/// Drain the channel until the executor closes it.
pub async fn collect(mut rx: mpsc::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

/// Observer that records every event it sees.
#[derive(Default)]
pub struct Recorder {
    pub events: Mutex<Vec<Event>>,
}

impl EventObserver for Recorder {
    fn observe(&self, event: &Event) {
        self.events.lock().unwrap().push(event.clone());
    }
}
