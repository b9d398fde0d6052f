use super::{sudo_wrap, DestKind, Result, Transport, TransportError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;
use walkdir::WalkDir;

/// Runs commands through the orchestrator host's own shell.
#[derive(Debug, Clone, Default)]
pub struct LocalTransport {
    env: BTreeMap<String, String>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override an environment variable for commands and path expansion.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    fn lookup(&self, var: &str) -> Option<String> {
        self.env
            .get(var)
            .cloned()
            .or_else(|| std::env::var(var).ok())
    }

    /// Expand `~` and `${VAR}` the way the shell would for `dst`.
    pub fn expand_path(&self, dst: &str) -> PathBuf {
        let expanded =
            shellexpand::full_with_context_no_errors(dst, || self.lookup("HOME"), |var| {
                self.lookup(var)
            });
        PathBuf::from(expanded.as_ref())
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn exec(&self, cmd: &str, stdin: &[u8], sudo: bool) -> Result<Vec<u8>> {
        let command = if sudo { sudo_wrap(cmd) } else { cmd.to_string() };
        debug!(command = %command, "Executing local command");

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut input) = child.stdin.take() {
            let data = stdin.to_vec();
            // The child may exit without reading; a broken pipe here is not our failure.
            tokio::spawn(async move {
                let _ = input.write_all(&data).await;
                let _ = input.shutdown().await;
            });
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(TransportError::CommandFailed {
                command,
                status: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        Ok(output.stdout)
    }

    async fn put(&self, src: &Path, dst: &str, kind: DestKind) -> Result<()> {
        let src = src.to_path_buf();
        let dst = self.expand_path(dst);
        debug!(src = %src.display(), dst = %dst.display(), ?kind, "Copying locally");

        tokio::task::spawn_blocking(move || copy_local(&src, &dst, kind)).await?
    }
}

fn copy_local(src: &Path, dst: &Path, kind: DestKind) -> Result<()> {
    let target = match kind {
        DestKind::File => dst.to_path_buf(),
        DestKind::Dir => {
            fs::create_dir_all(dst)?;
            let name = src.file_name().ok_or_else(|| TransportError::Transfer {
                dest: dst.display().to_string(),
                reason: format!("source {} has no file name", src.display()),
            })?;
            dst.join(name)
        }
    };

    if src.is_dir() {
        copy_tree(src, &target)
    } else {
        fs::copy(src, &target)?;
        Ok(())
    }
}

fn copy_tree(src: &Path, target: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| TransportError::Transfer {
            dest: target.display().to_string(),
            reason: e.to_string(),
        })?;
        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let dest = target.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest)?;
        } else {
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}
