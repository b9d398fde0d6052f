#![allow(dead_code)]

use async_trait::async_trait;
use henchman::engine::{TaskEngine, TaskReporter};
use henchman::inventory::Machine;
use henchman::modules::{ModuleResult, ModuleSearchPath, Status};
use henchman::plan::Task;
use henchman::transport::{DestKind, Result, Transport, TransportError};
use henchman::types::VarsMap;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const CHANGED: &str = r#"{"status":"changed","msg":"done","output":{"rc":0}}"#;
pub const OK: &str = r#"{"status":"ok","msg":""}"#;
pub const FAILURE: &str = r#"{"status":"failure","msg":"boom"}"#;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Exec {
        cmd: String,
        stdin: String,
        sudo: bool,
    },
    Put {
        src: PathBuf,
        dst: String,
        kind: DestKind,
    },
}

/// In-memory transport. Bookkeeping commands (`mkdir`, `chmod`) succeed
/// silently; every other command is a module run answered from the script,
/// falling back to the default output once the script is exhausted.
#[derive(Debug)]
pub struct RecordingTransport {
    calls: Mutex<Vec<Call>>,
    script: Mutex<VecDeque<String>>,
    default_output: String,
    uploads: Mutex<Vec<String>>,
}

impl RecordingTransport {
    pub fn new(default_output: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
            default_output: default_output.to_string(),
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn scripted(outputs: &[&str], default_output: &str) -> Self {
        let transport = Self::new(default_output);
        transport
            .script
            .lock()
            .unwrap()
            .extend(outputs.iter().map(|s| s.to_string()));
        transport
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Contents of every uploaded regular file, in upload order.
    pub fn uploaded_contents(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    /// `(cmd, stdin, sudo)` of every module run.
    pub fn module_runs(&self) -> Vec<(String, String, bool)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Exec { cmd, stdin, sudo } if !is_bookkeeping(&cmd) => Some((cmd, stdin, sudo)),
                _ => None,
            })
            .collect()
    }

    pub fn module_stdin(&self) -> Vec<serde_json::Value> {
        self.module_runs()
            .into_iter()
            .map(|(_, stdin, _)| serde_json::from_str(&stdin).unwrap())
            .collect()
    }
}

fn is_bookkeeping(cmd: &str) -> bool {
    cmd.starts_with("mkdir -p") || cmd.starts_with("chmod ") || cmd.starts_with("rm -rf")
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn exec(&self, cmd: &str, stdin: &[u8], sudo: bool) -> Result<Vec<u8>> {
        self.calls.lock().unwrap().push(Call::Exec {
            cmd: cmd.to_string(),
            stdin: String::from_utf8_lossy(stdin).to_string(),
            sudo,
        });

        if is_bookkeeping(cmd) {
            return Ok(Vec::new());
        }

        let output = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_output.clone());
        Ok(output.into_bytes())
    }

    async fn put(&self, src: &Path, dst: &str, kind: DestKind) -> Result<()> {
        if src.is_file() {
            let content = std::fs::read_to_string(src).map_err(TransportError::Io)?;
            self.uploads.lock().unwrap().push(content);
        }
        self.calls.lock().unwrap().push(Call::Put {
            src: src.to_path_buf(),
            dst: dst.to_string(),
            kind,
        });
        Ok(())
    }
}

/// Reporter keeping every finished task as `(host, rendered name, status)`.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    finished: Mutex<Vec<(String, String, Status)>>,
    retries: Mutex<Vec<(String, u32)>>,
}

impl RecordingReporter {
    pub fn finished(&self) -> Vec<(String, String, Status)> {
        self.finished.lock().unwrap().clone()
    }

    pub fn finished_on(&self, host: &str) -> Vec<(String, Status)> {
        self.finished()
            .into_iter()
            .filter(|(h, _, _)| h == host)
            .map(|(_, name, status)| (name, status))
            .collect()
    }

    pub fn retries(&self) -> Vec<(String, u32)> {
        self.retries.lock().unwrap().clone()
    }
}

impl TaskReporter for RecordingReporter {
    fn task_retrying(&self, host: &str, _task: &Task, attempt: u32, _result: &ModuleResult) {
        self.retries.lock().unwrap().push((host.to_string(), attempt));
    }

    fn task_finished(&self, host: &str, task: &Task, result: &ModuleResult) {
        self.finished.lock().unwrap().push((
            host.to_string(),
            task.display_name().to_string(),
            result.status,
        ));
    }
}

/// A module directory holding empty executables for `names`.
pub fn module_dir(names: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for name in names {
        std::fs::write(dir.path().join(name), "#!/bin/sh\n").unwrap();
    }
    dir
}

pub struct Harness {
    pub modules: TempDir,
    pub reporter: Arc<RecordingReporter>,
    pub engine: Arc<TaskEngine>,
}

impl Harness {
    pub fn new(modules: &[&str]) -> Self {
        let modules = module_dir(modules);
        let reporter = Arc::new(RecordingReporter::default());
        let engine = Arc::new(TaskEngine::new(
            ModuleSearchPath::new(vec![modules.path().to_path_buf()]),
            reporter.clone(),
        ));
        Self {
            modules,
            reporter,
            engine,
        }
    }

    pub fn with_local(modules: &[&str], local: Arc<RecordingTransport>) -> Self {
        let mut harness = Self::new(modules);
        let engine = TaskEngine::new(
            ModuleSearchPath::new(vec![harness.modules.path().to_path_buf()]),
            harness.reporter.clone(),
        )
        .with_local_transport(local);
        harness.engine = Arc::new(engine);
        harness
    }
}

pub fn machine(host: &str, transport: Arc<RecordingTransport>) -> Machine {
    Machine::new(host, VarsMap::new(), transport)
}
