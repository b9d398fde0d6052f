//! Uniform command execution and file upload toward an endpoint.

pub mod error;
pub mod local;
pub mod scp;
pub mod ssh;

pub use error::*;
pub use local::LocalTransport;
pub use ssh::SshTransport;

use crate::types::TransportConfig;
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// How the destination of a [`Transport::put`] is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestKind {
    /// `dst` is the full path of the uploaded file; its parent must exist.
    File,
    /// `dst` is a directory, created if absent; the source lands inside it
    /// under its own basename.
    Dir,
}

#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Run `cmd` through a shell, feeding `stdin`. Returns stdout.
    async fn exec(&self, cmd: &str, stdin: &[u8], sudo: bool) -> Result<Vec<u8>>;

    /// Upload a local file or directory tree.
    async fn put(&self, src: &Path, dst: &str, kind: DestKind) -> Result<()>;
}

/// Run a command as root through a login-less shell.
pub fn sudo_wrap(cmd: &str) -> String {
    format!("sudo -H -u root /bin/sh -c {}", shell_words::quote(cmd))
}

/// Hostnames always served by the local transport.
pub fn is_local_host(hostname: &str) -> bool {
    hostname == "localhost"
}

/// Build the transport a host's config asks for.
pub fn from_config(config: &TransportConfig) -> Result<Arc<dyn Transport>> {
    let wants_local = config.get("transport").map(String::as_str) == Some("local")
        || config.get("hostname").is_some_and(|h| is_local_host(h));

    if wants_local {
        Ok(Arc::new(LocalTransport::new()))
    } else {
        Ok(Arc::new(SshTransport::new(config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sudo_wrap_quotes_command() {
        assert_eq!(sudo_wrap("echo hi"), "sudo -H -u root /bin/sh -c 'echo hi'");
        assert_eq!(sudo_wrap("ls"), "sudo -H -u root /bin/sh -c ls");
    }

    #[test]
    fn test_from_config_picks_local_for_localhost() {
        let mut config = TransportConfig::new();
        config.insert("hostname".to_string(), "localhost".to_string());
        let transport = from_config(&config).unwrap();
        assert!(format!("{transport:?}").contains("LocalTransport"));
    }

    #[test]
    fn test_from_config_requires_credentials_for_ssh() {
        let mut config = TransportConfig::new();
        config.insert("hostname".to_string(), "10.0.0.1".to_string());
        config.insert("username".to_string(), "deploy".to_string());
        let err = from_config(&config).unwrap_err();
        assert!(matches!(err, TransportError::InvalidConfig { .. }));
    }
}
