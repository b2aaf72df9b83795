//! Pluggable listing formatters: `LIST` long format, `NLST` short format, and
//! `MLSD`/`MLST` machine-readable facts.

use super::entry::DirEntry;
use crate::path::PathPermissionBits;
use chrono::{DateTime, Datelike, Utc};
use std::time::SystemTime;

/// Which of the three listing formats to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFormat {
    /// `ls -l`-approximating long format, used by `LIST`.
    Long,
    /// Name-only, used by `NLST`.
    Short,
    /// RFC 3659 facts, used by `MLSD`.
    Machine,
}

/// Which RFC 3659 facts are enabled for `MLSD`/`MLST` rendering.
#[derive(Debug, Clone, Copy)]
pub struct MlstFacts {
    /// Emit the `Type` fact.
    pub type_: bool,
    /// Emit the `Modify` fact.
    pub modify: bool,
    /// Emit the `Size` fact.
    pub size: bool,
    /// Emit the `Unique` fact.
    pub unique: bool,
    /// Emit the `Perm` fact.
    pub perm: bool,
}

impl Default for MlstFacts {
    fn default() -> Self {
        MlstFacts { type_: true, modify: true, size: true, unique: true, perm: true }
    }
}

const BATCH_LIMIT: usize = 16 * 1024;

/// Renders as many entries from `entries[start..]` as fit in a 16 KiB batch,
/// returning the rendered bytes, the index to resume from, and whether more
/// entries remain, driving chunked sending for large directories.
pub fn format_batch(
    entries: &[DirEntry],
    start: usize,
    format: ListFormat,
    facts: MlstFacts,
    session_salt: u64,
) -> (Vec<u8>, usize, bool) {
    let mut buf = Vec::new();
    let mut i = start;
    while i < entries.len() {
        let rendered = render_entry(&entries[i], format, facts, session_salt);
        if !buf.is_empty() && buf.len() + rendered.len() > BATCH_LIMIT {
            break;
        }
        buf.extend_from_slice(&rendered);
        i += 1;
    }
    let more = i < entries.len();
    (buf, i, more)
}

fn render_entry(entry: &DirEntry, format: ListFormat, facts: MlstFacts, session_salt: u64) -> Vec<u8> {
    match format {
        ListFormat::Long => long_line(entry),
        ListFormat::Short => format!("{}\r\n", entry.name).into_bytes(),
        ListFormat::Machine => facts_line(entry, facts, session_salt).into_bytes(),
    }
}

fn long_line(entry: &DirEntry) -> Vec<u8> {
    let dt: DateTime<Utc> = entry.mtime.into();
    let now: DateTime<Utc> = Utc::now();
    let recent = (now - dt).num_days().abs() < 183;

    let perm_prefix = if entry.is_dir { "drwxr-xr-x" } else { "-rw-r--r--" };
    let size_field = if entry.is_dir { "       1 ".to_string() } else { format!("{:>8} ", entry.size) };
    let month = MONTHS[dt.month0() as usize];
    let day = dt.day();
    let trailer = if recent { dt.format("%H:%M").to_string() } else { dt.format("%Y").to_string() };

    format!("{perm_prefix} 1 ftp ftp {size_field}{month} {day:>2} {trailer:>5} {}\r\n", entry.name).into_bytes()
}

const MONTHS: [&str; 12] = ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];

/// Renders a single `MLSD`/`MLST` facts line for `entry`, given the enabled
/// `facts` and a per-session salt used to derive the `Unique` token (see
/// above).
pub fn facts_line(entry: &DirEntry, facts: MlstFacts, session_salt: u64) -> String {
    let mut out = String::from(" ");

    if facts.type_ {
        let ty = match entry.name.as_str() {
            "." => "cdir",
            ".." => "pdir",
            _ if entry.is_dir => "dir",
            _ => "file",
        };
        out.push_str(&format!("Type={ty};"));
    }
    if facts.modify {
        let dt: DateTime<Utc> = entry.mtime.into();
        out.push_str(&format!("Modify={};", dt.format("%Y%m%d%H%M%S")));
    }
    if facts.size {
        out.push_str(&format!("Size={};", entry.size));
    }
    if facts.unique {
        out.push_str(&format!("Unique={};", unique_token(entry, session_salt)));
    }
    if facts.perm {
        out.push_str(&format!("Perm={};", perm_string(entry)));
    }

    out.push(' ');
    out.push_str(&entry.name);
    out.push_str("\r\n");
    out
}

/// Derives a session-scoped stable token for the `Unique` fact without
/// exposing raw device/inode numbers: an FNV-1a hash of the entry's physical
/// path salted with the session identifier, truncated to 16 hex digits.
fn unique_token(entry: &DirEntry, session_salt: u64) -> String {
    let mut hash: u64 = 0xcbf29ce484222325 ^ session_salt;
    for byte in entry.ppath.to_string_lossy().as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    format!("{hash:016x}")
}

fn perm_string(entry: &DirEntry) -> String {
    let mut perm = String::new();
    let bits = entry.bits;
    if entry.is_dir {
        if bits.contains(PathPermissionBits::CAN_CREATE_FILE) {
            perm.push('c');
        }
        if bits.contains(PathPermissionBits::CAN_DELETE_DIR) {
            perm.push('d');
        }
        if entry.is_virtual || bits.contains(PathPermissionBits::CAN_ENTER) {
            perm.push('e');
        }
        if bits.contains(PathPermissionBits::CAN_CREATE_DIR) {
            perm.push('m');
        }
        if bits.contains(PathPermissionBits::CAN_DELETE_FILE) || bits.contains(PathPermissionBits::CAN_DELETE_DIR) {
            perm.push('p');
        }
    } else {
        if bits.contains(PathPermissionBits::CAN_WRITE) {
            perm.push('a');
        }
        if bits.contains(PathPermissionBits::CAN_DELETE_FILE) {
            perm.push('d');
        }
        if bits.contains(PathPermissionBits::CAN_READ) {
            perm.push('r');
        }
        if bits.contains(PathPermissionBits::CAN_WRITE) {
            perm.push('w');
        }
    }
    if bits.contains(PathPermissionBits::CAN_RENAME) {
        perm.push('f');
    }
    perm
}
