use super::error::{ModuleError, Result};
use crate::types::DEFAULT_MODULES_DIR;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Bundle entry point inside a module directory.
pub const BUNDLE_EXEC: &str = "exec";

/// Where a module name resolved to on the local filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedModule {
    /// A single executable file.
    Standalone { path: PathBuf },
    /// A directory uploaded as a whole, entered through its `exec` file.
    Bundle { dir: PathBuf, exec: PathBuf },
}

impl ResolvedModule {
    /// Local path uploaded by `put_module`.
    pub fn upload_path(&self) -> &Path {
        match self {
            ResolvedModule::Standalone { path } => path,
            ResolvedModule::Bundle { dir, .. } => dir,
        }
    }

    pub fn is_bundle(&self) -> bool {
        matches!(self, ResolvedModule::Bundle { .. })
    }
}

/// Ordered list of local directories searched for module executables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSearchPath {
    dirs: Vec<PathBuf>,
}

impl ModuleSearchPath {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    /// The default `modules` directory followed by any extra roots.
    pub fn with_defaults(extra: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut dirs = vec![PathBuf::from(DEFAULT_MODULES_DIR)];
        dirs.extend(extra);
        Self { dirs }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// First directory holding `name` wins, either as a regular file or as a
    /// bundle directory with an `exec` file.
    pub fn resolve(&self, name: &str) -> Result<ResolvedModule> {
        for dir in &self.dirs {
            let candidate = dir.join(name);
            if candidate.is_file() {
                debug!(module = %name, path = %candidate.display(), "Resolved module");
                return Ok(ResolvedModule::Standalone { path: candidate });
            }

            let exec = candidate.join(BUNDLE_EXEC);
            if exec.is_file() {
                debug!(module = %name, path = %candidate.display(), "Resolved module bundle");
                return Ok(ResolvedModule::Bundle {
                    dir: candidate,
                    exec,
                });
            }
        }

        Err(ModuleError::ModuleNotFound {
            name: name.to_string(),
            searched: self.dirs.iter().map(|d| d.display().to_string()).collect(),
        })
    }
}

impl Default for ModuleSearchPath {
    fn default() -> Self {
        Self::with_defaults(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_resolve_standalone_and_bundle() {
        let root = tempfile::tempdir().unwrap();
        let first = root.path().join("first");
        let second = root.path().join("second");
        fs::create_dir_all(first.join("apt")).unwrap();
        fs::write(first.join("apt").join("exec"), "#!/bin/sh").unwrap();
        fs::create_dir_all(&second).unwrap();
        fs::write(second.join("shell"), "#!/bin/sh").unwrap();

        let search = ModuleSearchPath::new(vec![first.clone(), second.clone()]);

        let shell = search.resolve("shell").unwrap();
        assert_eq!(
            shell,
            ResolvedModule::Standalone {
                path: second.join("shell")
            }
        );

        let apt = search.resolve("apt").unwrap();
        assert!(apt.is_bundle());
        assert_eq!(apt.upload_path(), first.join("apt"));
    }

    #[test]
    fn test_first_hit_wins() {
        let root = tempfile::tempdir().unwrap();
        let a = root.path().join("a");
        let b = root.path().join("b");
        fs::create_dir_all(&a).unwrap();
        fs::create_dir_all(&b).unwrap();
        fs::write(a.join("shell"), "a").unwrap();
        fs::write(b.join("shell"), "b").unwrap();

        let search = ModuleSearchPath::new(vec![a.clone(), b]);
        for _ in 0..3 {
            assert_eq!(search.resolve("shell").unwrap().upload_path(), a.join("shell"));
        }
    }

    #[test]
    fn test_directory_without_exec_is_skipped() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("a").join("yum")).unwrap();
        let search = ModuleSearchPath::new(vec![root.path().join("a")]);

        match search.resolve("yum") {
            Err(ModuleError::ModuleNotFound { name, searched }) => {
                assert_eq!(name, "yum");
                assert_eq!(searched.len(), 1);
            }
            other => panic!("expected not found, got {other:?}"),
        }
    }
}
