use crate::error::{HenchmanError, Result};
use crate::modules::{
    create_dir_command, upload_target, Module, ModuleError, ModuleKind, ModuleResult,
    ResolvedModule, Phase, Status, BUNDLE_EXEC,
};
use crate::template::render_str;
use crate::transport::{Transport, TransportError};
use crate::types::{remote_path, VarsMap, REMOTE_DIR};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

const SRC_PARAM: &str = "src";
const REMOTE_SRC_PARAM: &str = "rmt_src";

/// Drives one rendered module through its phases on a transport.
pub struct ModuleInvocation<'a> {
    module: Module,
    resolved: ResolvedModule,
    transport: &'a dyn Transport,
    sudo: bool,
    context: &'a VarsMap,
    remote_dir: String,
    original_src: Option<Value>,
    remote_src: Option<String>,
    rendered: Option<NamedTempFile>,
}

impl<'a> ModuleInvocation<'a> {
    pub fn new(
        module: Module,
        resolved: ResolvedModule,
        transport: &'a dyn Transport,
        sudo: bool,
        context: &'a VarsMap,
    ) -> Self {
        Self {
            module,
            resolved,
            transport,
            sudo,
            context,
            remote_dir: REMOTE_DIR.to_string(),
            original_src: None,
            remote_src: None,
            rendered: None,
        }
    }

    /// Run every phase. Module-level failures come back as a result;
    /// transport and staging problems are errors.
    pub async fn run(mut self) -> Result<ModuleResult> {
        let kind = self.module.kind();
        if kind != ModuleKind::Default {
            let src = self.module.params.get(SRC_PARAM).cloned();
            if src.as_ref().and_then(Value::as_str).is_none() {
                return Err(ModuleError::MissingParam {
                    module: self.module.name.clone(),
                    param: SRC_PARAM.to_string(),
                }
                .into());
            }
            self.original_src = src;
        }

        for phase in kind.phases() {
            debug!(module = %self.module.name, phase = %phase, "Running phase");
            match phase {
                Phase::CreateDir => self.create_dir().await?,
                Phase::PutModule => self.put_module().await?,
                Phase::ProcessTemplate => self.process_template().await?,
                Phase::PutFile => self.put_file().await?,
                Phase::CopyRemote => self.copy_remote(),
                Phase::ResetSrc => self.reset_src(),
                Phase::ExecModule => return self.exec_module().await,
            }
        }

        Ok(ModuleResult::new(Status::Error, "module was never executed"))
    }

    async fn create_dir(&mut self) -> Result<()> {
        let stdout = self.transport.exec(&create_dir_command(), &[], false).await?;
        let text = String::from_utf8_lossy(&stdout);
        if let Some(dir) = text.lines().map(str::trim).rfind(|l| !l.is_empty()) {
            self.remote_dir = if dir.ends_with('/') {
                dir.to_string()
            } else {
                format!("{dir}/")
            };
        }
        Ok(())
    }

    fn exec_path(&self) -> String {
        let base = remote_path(&self.remote_dir, &self.module.name);
        match self.resolved {
            ResolvedModule::Standalone { .. } => base,
            ResolvedModule::Bundle { .. } => remote_path(&base, BUNDLE_EXEC),
        }
    }

    async fn put_module(&mut self) -> Result<()> {
        let (dst, kind) = upload_target(
            &self.remote_dir,
            &self.module.name,
            self.resolved.is_bundle(),
        );
        self.transport
            .put(self.resolved.upload_path(), &dst, kind)
            .await?;

        let chmod = format!("chmod 0755 {}", self.exec_path());
        self.transport.exec(&chmod, &[], false).await?;
        Ok(())
    }

    async fn process_template(&mut self) -> Result<()> {
        let src = self.src_path()?;
        let content = tokio::fs::read_to_string(&src)
            .await
            .map_err(|e| self.staging_error(&src, e))?;
        let rendered = render_str(&content, self.context)?;

        let file = tokio::task::spawn_blocking(move || -> std::io::Result<NamedTempFile> {
            let mut file = NamedTempFile::new()?;
            file.write_all(rendered.as_bytes())?;
            Ok(file)
        })
        .await
        .map_err(|e| self.staging_error(&src, e))?
        .map_err(|e| self.staging_error(&src, e))?;

        self.module.params.insert(
            SRC_PARAM.to_string(),
            Value::String(file.path().display().to_string()),
        );
        self.rendered = Some(file);
        Ok(())
    }

    async fn put_file(&mut self) -> Result<()> {
        let local = self.src_path()?;
        let metadata = tokio::fs::metadata(&local)
            .await
            .map_err(|e| self.staging_error(&local, e))?;

        // Rendered templates are uploaded under the name the operator gave.
        let basename = self
            .original_src
            .as_ref()
            .and_then(Value::as_str)
            .map(Path::new)
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| self.staging_error(&local, "source has no file name"))?;

        let (dst, kind) = upload_target(&self.remote_dir, &basename, metadata.is_dir());
        self.transport.put(&local, &dst, kind).await?;
        self.remote_src = Some(remote_path(&self.remote_dir, &basename));
        Ok(())
    }

    fn copy_remote(&mut self) {
        if let Some(remote) = &self.remote_src {
            self.module
                .params
                .insert(REMOTE_SRC_PARAM.to_string(), Value::String(remote.clone()));
        }
    }

    fn reset_src(&mut self) {
        // The rendered copy is already on the endpoint.
        self.rendered.take();
        if let Some(src) = &self.original_src {
            self.module.params.insert(SRC_PARAM.to_string(), src.clone());
        }
    }

    async fn exec_module(&self) -> Result<ModuleResult> {
        let command = self.exec_path();
        let stdin = serde_json::to_vec(&self.module.params).map_err(ModuleError::from)?;

        match self.transport.exec(&command, &stdin, self.sudo).await {
            Ok(stdout) => Ok(ModuleResult::from_stdout(&stdout)),
            Err(TransportError::CommandFailed {
                status,
                stdout,
                stderr,
                ..
            }) => Ok(ModuleResult::parse(stdout.as_bytes()).unwrap_or_else(|_| {
                ModuleResult {
                    status: Status::Error,
                    msg: format!("module exited with status {status}: {}", stderr.trim()),
                    output: Value::String(stdout),
                }
            })),
            Err(err) => Err(HenchmanError::from(err)),
        }
    }

    fn src_path(&self) -> Result<PathBuf> {
        self.module
            .param_str(SRC_PARAM)
            .map(PathBuf::from)
            .ok_or_else(|| {
                ModuleError::MissingParam {
                    module: self.module.name.clone(),
                    param: SRC_PARAM.to_string(),
                }
                .into()
            })
    }

    fn staging_error(&self, path: &Path, reason: impl ToString) -> ModuleError {
        ModuleError::Staging {
            module: self.module.name.clone(),
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}
