use super::{scp, sudo_wrap, DestKind, Result, Transport, TransportError};
use crate::types::TransportConfig;
use async_trait::async_trait;
use ssh2::{Channel, Session};
use std::fmt;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const DEFAULT_PORT: u16 = 22;
const POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Clone)]
enum SshAuth {
    Password(String),
    KeyFile(PathBuf),
}

impl fmt::Debug for SshAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SshAuth::Password(_) => f.write_str("Password(***)"),
            SshAuth::KeyFile(path) => write!(f, "KeyFile({})", path.display()),
        }
    }
}

/// SSH endpoint. Every `exec`/`put` opens its own TCP session.
#[derive(Debug, Clone)]
pub struct SshTransport {
    hostname: String,
    port: u16,
    username: String,
    auth: SshAuth,
    sudo: bool,
}

impl SshTransport {
    /// Validate the config. No connection is made here.
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let hostname = required(config, "hostname")?;
        let username = required(config, "username")?;

        let port = match config.get("port").map(|p| p.trim()).filter(|p| !p.is_empty()) {
            Some(port) => port.parse().map_err(|_| TransportError::InvalidConfig {
                reason: format!("port '{port}' for {hostname} is not a valid port number"),
            })?,
            None => DEFAULT_PORT,
        };

        let password = non_empty(config, "password");
        let keyfile = non_empty(config, "keyfile");
        let auth = match (password, keyfile) {
            (Some(password), _) => SshAuth::Password(password.to_string()),
            (None, Some(keyfile)) => {
                let path = PathBuf::from(shellexpand::tilde(keyfile).into_owned());
                if !path.is_file() {
                    return Err(TransportError::InvalidConfig {
                        reason: format!("keyfile {} does not exist", path.display()),
                    });
                }
                SshAuth::KeyFile(path)
            }
            (None, None) => {
                return Err(TransportError::InvalidConfig {
                    reason: format!("either password or keyfile is required for {hostname}"),
                })
            }
        };

        let sudo = config
            .get("sudo")
            .is_some_and(|v| matches!(v.as_str(), "true" | "True" | "yes" | "1"));

        Ok(Self {
            hostname,
            port,
            username,
            auth,
            sudo,
        })
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }

    fn session_error(&self, err: ssh2::Error) -> TransportError {
        TransportError::Session {
            host: self.hostname.clone(),
            reason: err.to_string(),
        }
    }

    fn connect(&self) -> Result<Session> {
        let address = self.address();
        let tcp = TcpStream::connect(&address).map_err(|source| TransportError::Connect {
            address: address.clone(),
            source,
        })?;

        let mut session = Session::new().map_err(|e| self.session_error(e))?;
        session.set_tcp_stream(tcp);
        session.handshake().map_err(|e| self.session_error(e))?;

        let auth_result = match &self.auth {
            SshAuth::Password(password) => session.userauth_password(&self.username, password),
            SshAuth::KeyFile(path) => session.userauth_pubkey_file(&self.username, None, path, None),
        };
        auth_result.map_err(|e| TransportError::Auth {
            host: self.hostname.clone(),
            user: self.username.clone(),
            reason: e.to_string(),
        })?;

        if !session.authenticated() {
            return Err(TransportError::Auth {
                host: self.hostname.clone(),
                user: self.username.clone(),
                reason: "server rejected credentials".to_string(),
            });
        }

        Ok(session)
    }

    fn open_channel(&self, session: &Session, command: &str) -> Result<Channel> {
        let mut channel = session.channel_session().map_err(|e| self.session_error(e))?;
        channel.exec(command).map_err(|e| self.session_error(e))?;
        Ok(channel)
    }

    fn exec_blocking(&self, cmd: &str, stdin: &[u8], sudo: bool) -> Result<Vec<u8>> {
        let command = if sudo || self.sudo {
            sudo_wrap(cmd)
        } else {
            cmd.to_string()
        };
        debug!(host = %self.hostname, command = %command, "Executing remote command");

        let session = self.connect()?;
        let mut channel = self.open_channel(&session, &command)?;
        if !stdin.is_empty() {
            channel.write_all(stdin)?;
        }
        channel.send_eof().map_err(|e| self.session_error(e))?;

        session.set_blocking(false);
        let drained = {
            let mut out = channel.stream(0);
            let mut err = channel.stderr();
            drain_streams(&mut out, &mut err, || channel.eof())
        };
        session.set_blocking(true);
        let (stdout, stderr) = drained?;
        let stderr = String::from_utf8_lossy(&stderr).to_string();

        channel.wait_close().map_err(|e| self.session_error(e))?;
        let status = channel.exit_status().map_err(|e| self.session_error(e))?;
        if status != 0 {
            return Err(TransportError::CommandFailed {
                command,
                status,
                stdout: String::from_utf8_lossy(&stdout).to_string(),
                stderr,
            });
        }

        Ok(stdout)
    }

    fn put_blocking(&self, src: &Path, dst: &str, kind: DestKind) -> Result<()> {
        let name = match kind {
            DestKind::File => dst.rsplit('/').next().unwrap_or(dst).to_string(),
            DestKind::Dir => src
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .ok_or_else(|| TransportError::Transfer {
                    dest: dst.to_string(),
                    reason: format!("source {} has no file name", src.display()),
                })?,
        };
        let command = scp::sink_command(dst, kind);
        debug!(host = %self.hostname, src = %src.display(), command = %command, "Uploading");

        let session = self.connect()?;
        let mut channel = self.open_channel(&session, &command)?;
        scp::send(&mut channel, src, &name, dst)?;

        channel.send_eof().map_err(|e| self.session_error(e))?;
        channel.wait_close().map_err(|e| self.session_error(e))?;
        let status = channel.exit_status().map_err(|e| self.session_error(e))?;
        if status != 0 {
            return Err(TransportError::Transfer {
                dest: dst.to_string(),
                reason: format!("remote scp exited with status {status}"),
            });
        }
        Ok(())
    }
}

/// Read stdout and stderr together so a chatty stream cannot stall the
/// remote process while the other is drained. Both readers must be
/// non-blocking; `eof` reports when the remote side has nothing left.
fn drain_streams(
    stdout: &mut impl Read,
    stderr: &mut impl Read,
    eof: impl Fn() -> bool,
) -> io::Result<(Vec<u8>, Vec<u8>)> {
    let mut out = Vec::new();
    let mut err = Vec::new();
    let mut buf = [0u8; 16 * 1024];

    loop {
        let read_out = read_available(stdout, &mut buf, &mut out)?;
        let read_err = read_available(stderr, &mut buf, &mut err)?;
        if read_out || read_err {
            continue;
        }
        if eof() {
            return Ok((out, err));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Whether any bytes arrived. `WouldBlock` and end of stream read nothing.
fn read_available(reader: &mut impl Read, buf: &mut [u8], sink: &mut Vec<u8>) -> io::Result<bool> {
    match reader.read(buf) {
        Ok(0) => Ok(false),
        Ok(n) => {
            sink.extend_from_slice(&buf[..n]);
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
        Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(true),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn exec(&self, cmd: &str, stdin: &[u8], sudo: bool) -> Result<Vec<u8>> {
        let this = self.clone();
        let cmd = cmd.to_string();
        let stdin = stdin.to_vec();
        tokio::task::spawn_blocking(move || this.exec_blocking(&cmd, &stdin, sudo)).await?
    }

    async fn put(&self, src: &Path, dst: &str, kind: DestKind) -> Result<()> {
        let this = self.clone();
        let src = src.to_path_buf();
        let dst = dst.to_string();
        tokio::task::spawn_blocking(move || this.put_blocking(&src, &dst, kind)).await?
    }
}

fn non_empty<'a>(config: &'a TransportConfig, key: &str) -> Option<&'a str> {
    config
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
}

fn required(config: &TransportConfig, key: &str) -> Result<String> {
    non_empty(config, key)
        .map(str::to_string)
        .ok_or_else(|| TransportError::InvalidConfig {
            reason: format!("'{key}' is required for ssh"),
        })
}
