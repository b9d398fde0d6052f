use super::module::ModuleKind;
use crate::transport::DestKind;
use crate::types::{remote_path, REMOTE_DIR};
use std::fmt;

/// One step of running a module on an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    CreateDir,
    PutModule,
    PutFile,
    ProcessTemplate,
    CopyRemote,
    ResetSrc,
    ExecModule,
}

const DEFAULT_PHASES: &[Phase] = &[Phase::CreateDir, Phase::PutModule, Phase::ExecModule];

const COPY_PHASES: &[Phase] = &[
    Phase::CreateDir,
    Phase::PutModule,
    Phase::PutFile,
    Phase::CopyRemote,
    Phase::ExecModule,
];

const TEMPLATE_PHASES: &[Phase] = &[
    Phase::CreateDir,
    Phase::PutModule,
    Phase::ProcessTemplate,
    Phase::PutFile,
    Phase::CopyRemote,
    Phase::ResetSrc,
    Phase::ExecModule,
];

impl ModuleKind {
    pub fn phases(&self) -> &'static [Phase] {
        match self {
            ModuleKind::Default => DEFAULT_PHASES,
            ModuleKind::Copy => COPY_PHASES,
            ModuleKind::Template => TEMPLATE_PHASES,
        }
    }
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::CreateDir => "create_dir",
            Phase::PutModule => "put_module",
            Phase::PutFile => "put_file",
            Phase::ProcessTemplate => "process_template",
            Phase::CopyRemote => "copy_remote",
            Phase::ResetSrc => "reset_src",
            Phase::ExecModule => "exec_module",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command for `create_dir`. Echoes the expanded directory so later phases
/// can use an absolute path.
pub fn create_dir_command() -> String {
    format!("mkdir -p {REMOTE_DIR} && echo {REMOTE_DIR}")
}

/// Upload target for a local path placed under `remote_dir`.
///
/// Files are addressed by their full remote path; directories are shipped
/// into `remote_dir` and keep their own name.
pub fn upload_target(remote_dir: &str, basename: &str, is_dir: bool) -> (String, DestKind) {
    if is_dir {
        (remote_dir.to_string(), DestKind::Dir)
    } else {
        (remote_path(remote_dir, basename), DestKind::File)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(kind: ModuleKind) -> Vec<&'static str> {
        kind.phases().iter().map(Phase::as_str).collect()
    }

    #[test]
    fn test_phase_orders() {
        assert_eq!(
            names(ModuleKind::Default),
            vec!["create_dir", "put_module", "exec_module"]
        );
        assert_eq!(
            names(ModuleKind::Copy),
            vec!["create_dir", "put_module", "put_file", "copy_remote", "exec_module"]
        );
        assert_eq!(
            names(ModuleKind::Template),
            vec![
                "create_dir",
                "put_module",
                "process_template",
                "put_file",
                "copy_remote",
                "reset_src",
                "exec_module"
            ]
        );
    }

    #[test]
    fn test_upload_targets() {
        assert_eq!(
            upload_target(REMOTE_DIR, "shell", false),
            ("${HOME}/.henchman/shell".to_string(), DestKind::File)
        );
        assert_eq!(
            upload_target(REMOTE_DIR, "apt", true),
            ("${HOME}/.henchman/".to_string(), DestKind::Dir)
        );
    }

    #[test]
    fn test_create_dir_command() {
        assert_eq!(
            create_dir_command(),
            "mkdir -p ${HOME}/.henchman/ && echo ${HOME}/.henchman/"
        );
    }
}
