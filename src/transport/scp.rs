//! Source side of the SCP sink protocol, driven over any byte stream.

use super::{DestKind, Result, TransportError};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;

const DEFAULT_FILE_MODE: u32 = 0o644;
const DEFAULT_DIR_MODE: u32 = 0o755;

/// Remote command that receives an upload for `dst`.
pub fn sink_command(dst: &str, kind: DestKind) -> String {
    match kind {
        DestKind::File => format!("scp -t {dst}"),
        DestKind::Dir => format!("mkdir -p {dst} && cd {dst} && scp -qrt ./"),
    }
}

pub fn file_header(mode: u32, len: u64, name: &str) -> String {
    format!("C{:04o} {} {}\n", mode & 0o7777, len, name)
}

pub fn dir_header(mode: u32, name: &str) -> String {
    format!("D{:04o} 0 {}\n", mode & 0o7777, name)
}

pub const END_DIR: &[u8] = b"E\n";

/// Push `src` through an already started sink, named `name` on the far side.
pub fn send<S: Read + Write>(stream: &mut S, src: &Path, name: &str, dest: &str) -> Result<()> {
    read_ack(stream, dest)?;
    if src.is_dir() {
        send_dir(stream, src, name, dest)
    } else {
        send_file(stream, src, name, dest)
    }
}

fn send_file<S: Read + Write>(stream: &mut S, src: &Path, name: &str, dest: &str) -> Result<()> {
    let metadata = fs::metadata(src)?;
    let header = file_header(mode_of(&metadata, DEFAULT_FILE_MODE), metadata.len(), name);
    stream.write_all(header.as_bytes())?;
    read_ack(stream, dest)?;

    let mut file = File::open(src)?;
    io::copy(&mut file, stream)?;
    stream.write_all(&[0])?;
    stream.flush()?;
    read_ack(stream, dest)
}

fn send_dir<S: Read + Write>(stream: &mut S, src: &Path, name: &str, dest: &str) -> Result<()> {
    let metadata = fs::metadata(src)?;
    stream.write_all(dir_header(mode_of(&metadata, DEFAULT_DIR_MODE), name).as_bytes())?;
    read_ack(stream, dest)?;

    let mut entries = fs::read_dir(src)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let child_name = entry.file_name().to_string_lossy().to_string();
        let path = entry.path();
        if path.is_dir() {
            send_dir(stream, &path, &child_name, dest)?;
        } else {
            send_file(stream, &path, &child_name, dest)?;
        }
    }

    stream.write_all(END_DIR)?;
    stream.flush()?;
    read_ack(stream, dest)
}

/// Read one status byte. `1` and `2` carry a message line.
fn read_ack<R: Read>(reader: &mut R, dest: &str) -> Result<()> {
    let mut code = [0u8; 1];
    if reader.read(&mut code)? == 0 {
        return Err(TransportError::Transfer {
            dest: dest.to_string(),
            reason: "remote scp closed the stream".to_string(),
        });
    }
    if code[0] == 0 {
        return Ok(());
    }

    let mut message = Vec::new();
    let mut byte = [0u8; 1];
    while reader.read(&mut byte)? == 1 && byte[0] != b'\n' {
        message.push(byte[0]);
    }
    Err(TransportError::Transfer {
        dest: dest.to_string(),
        reason: String::from_utf8_lossy(&message).trim().to_string(),
    })
}

#[cfg(unix)]
fn mode_of(metadata: &fs::Metadata, _default: u32) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode()
}

#[cfg(not(unix))]
fn mode_of(_metadata: &fs::Metadata, default: u32) -> u32 {
    default
}
