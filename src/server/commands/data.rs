//! Data-channel commands: `PASV`/`PORT`/`REST`/`ABOR`, the transfer verbs
//! (`RETR`/`STOR`/`APPE`/`STOU`), and the listing commands (`LIST`/`NLST`/
//! `MLSD`/`MLST`).
//!
//! `MLST` is the odd one out: RFC 3659 answers it directly on the control
//! channel, so it never produces a [`DataOp`].

use super::{Outcome, ServerContext};
use crate::auth::UserDetail;
use crate::error::{EngineError, Result};
use crate::fs::FileOperation;
use crate::listing::{is_hidden, list_entries, DirEntry, ListFormat, MlstFacts};
use crate::path::PathPermissionBits;
use crate::server::reply::{Reply, ReplyCode};
use crate::server::session::Session;
use crate::server::transfer::Direction;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// What the connection loop must do on the data channel after flushing the
/// reply carried alongside it in [`Outcome::Data`].
pub enum DataOp {
    /// Stream a file in `direction`, starting at the session's armed `REST`
    /// offset if any.
    Transfer {
        /// Physical path of the file to read from or write to.
        ppath: PathBuf,
        /// How the file should be opened.
        operation: FileOperation,
        /// Which way bytes flow relative to the server.
        direction: Direction,
    },
    /// Render and send an already-resolved, already-filtered entry list.
    List {
        /// Entries to render, in the order they should appear.
        entries: Vec<DirEntry>,
        /// Which of the three listing formats to use.
        format: ListFormat,
        /// Salt for the `MLSD` `Unique` fact.
        session_salt: u64,
    },
}

pub async fn pasv<U: UserDetail>(session: &mut Session<U>, ctx: &ServerContext<U>) -> Result<Outcome> {
    let listener = crate::server::passive::bind(session.local_addr.ip(), ctx.passive_ports.clone()).await.map_err(EngineError::Io)?;
    let bound = listener.local_addr().map_err(EngineError::Io)?;
    let encoded =
        crate::server::passive::encode_pasv_address(bound).ok_or_else(|| EngineError::Internal("PASV requires an IPv4 control connection".to_string()))?;
    session.ftp_state.data_chan = crate::server::ftp_state::DataChanInitiation::Pasv(listener);
    Ok(Reply::new(ReplyCode::EnteringPassiveMode, format!("Entering Passive Mode ({encoded})")).into())
}

pub fn port<U: UserDetail>(param: &str, session: &mut Session<U>) -> Result<Outcome> {
    let addr = parse_port_address(param)?;
    session.ftp_state.data_chan = crate::server::ftp_state::DataChanInitiation::Port(addr);
    Ok(Reply::new(ReplyCode::CommandOkay, "PORT command successful").into())
}

fn parse_port_address(param: &str) -> Result<SocketAddr> {
    let fields: Vec<&str> = param.trim().split(',').collect();
    if fields.len() != 6 {
        return Err(EngineError::ClientParse("PORT requires h1,h2,h3,h4,p1,p2".to_string()));
    }
    let mut nums = [0u8; 6];
    for (slot, field) in nums.iter_mut().zip(fields.iter()) {
        *slot = field.trim().parse().map_err(|_| EngineError::ClientParse(format!("PORT field {field:?} is not a byte")))?;
    }
    let ip = IpAddr::V4(std::net::Ipv4Addr::new(nums[0], nums[1], nums[2], nums[3]));
    let port = (u16::from(nums[4]) << 8) | u16::from(nums[5]);
    Ok(SocketAddr::new(ip, port))
}

pub fn rest<U: UserDetail>(param: &str, session: &mut Session<U>) -> Result<Outcome> {
    let offset: u64 = param.trim().parse().map_err(|_| EngineError::ClientParse("REST requires a non-negative byte offset".to_string()))?;
    if offset != 0 && session.ftp_state.transfer_type == crate::server::ftp_state::TransferType::Ascii {
        return Err(EngineError::TransientFile("REST with a non-zero offset is not supported in ASCII mode".to_string()));
    }
    session.ftp_state.restart_offset = Some(offset);
    Ok(Reply::new(ReplyCode::FileActionPending, format!("Restarting at {offset}. Send STOR or RETR to initiate transfer")).into())
}

/// Requests that a transfer already underway on this session stop early.
/// The 426/226 reply pair this produces is sent by the connection loop once
/// the transfer future it is concurrently awaiting actually unwinds;
/// nothing here can observe that happening synchronously.
pub fn abor<U: UserDetail>(session: &mut Session<U>) -> Result<Outcome> {
    if session.ftp_state.request_abort() {
        Ok(Reply::none().into())
    } else {
        Ok(Reply::new(ReplyCode::ClosingDataConnection, "No transfer in progress").into())
    }
}

pub fn retr<U: UserDetail>(param: &str, session: &mut Session<U>) -> Result<Outcome> {
    let (ppath, bits) = super::resolve(session, param)?;
    if !bits.contains(PathPermissionBits::CAN_READ) {
        return Err(EngineError::AccessDenied("CAN_READ not granted".to_string()));
    }
    if !ppath.is_file() {
        return Err(EngineError::NotFound(param.to_string()));
    }
    session.ftp_state.in_transfer = true;
    let reply = Reply::new(ReplyCode::FileStatusOkay, "Opening data connection for transfer");
    Ok(Outcome::Data(reply, DataOp::Transfer { ppath, operation: FileOperation::Read, direction: Direction::Send }))
}

pub fn stor<U: UserDetail>(param: &str, session: &mut Session<U>) -> Result<Outcome> {
    let (ppath, bits) = super::resolve(session, param)?;
    if !bits.contains(PathPermissionBits::CAN_CREATE_FILE) && !bits.contains(PathPermissionBits::CAN_WRITE) {
        return Err(EngineError::AccessDenied("CAN_CREATE_FILE/CAN_WRITE not granted".to_string()));
    }
    // A `REST` armed ahead of `STOR` resumes an upload; truncating the
    // target first (the ordinary `Write` open mode) would destroy the very
    // bytes the client expects to keep, so resume opens with `Append`
    // instead and relies on the seek below to land at the requested offset.
    let operation = if session.ftp_state.restart_offset.is_some() { FileOperation::Append } else { FileOperation::Write };
    session.ftp_state.in_transfer = true;
    let reply = Reply::new(ReplyCode::FileStatusOkay, "Opening data connection for transfer");
    Ok(Outcome::Data(reply, DataOp::Transfer { ppath, operation, direction: Direction::Receive }))
}

pub fn appe<U: UserDetail>(param: &str, session: &mut Session<U>) -> Result<Outcome> {
    let (ppath, bits) = super::resolve(session, param)?;
    if !bits.contains(PathPermissionBits::CAN_CREATE_FILE) && !bits.contains(PathPermissionBits::CAN_WRITE) {
        return Err(EngineError::AccessDenied("CAN_CREATE_FILE/CAN_WRITE not granted".to_string()));
    }
    session.ftp_state.restart_offset = None;
    session.ftp_state.in_transfer = true;
    let reply = Reply::new(ReplyCode::FileStatusOkay, "Opening data connection for transfer");
    Ok(Outcome::Data(reply, DataOp::Transfer { ppath, operation: FileOperation::Append, direction: Direction::Receive }))
}

pub fn stou<U: UserDetail>(session: &mut Session<U>) -> Result<Outcome> {
    if session.ftp_state.restart_offset.is_some_and(|offset| offset != 0) {
        return Err(EngineError::TransientFile("STOU does not accept a non-zero REST offset".to_string()));
    }
    let (dir_ppath, bits) = super::resolve(session, "")?;
    if !bits.contains(PathPermissionBits::CAN_CREATE_FILE) {
        return Err(EngineError::AccessDenied("CAN_CREATE_FILE not granted".to_string()));
    }
    let name = format!("vftpd-{}", uuid::Uuid::new_v4());
    let ppath = dir_ppath.join(&name);
    session.ftp_state.in_transfer = true;
    let reply = Reply::new(ReplyCode::FileStatusOkay, format!("FILE: {name}"));
    Ok(Outcome::Data(reply, DataOp::Transfer { ppath, operation: FileOperation::WriteNew, direction: Direction::Receive }))
}

pub fn list<U: UserDetail>(param: &str, session: &mut Session<U>, format: ListFormat) -> Result<Outcome> {
    let (target, show_hidden) = strip_hidden_flag(param);
    let (ppath, bits) = super::resolve(session, target)?;
    if !bits.contains(PathPermissionBits::CAN_LIST) {
        return Err(EngineError::AccessDenied("CAN_LIST not granted".to_string()));
    }
    let normalized = crate::path::normalize(target, &session.cwd)?;
    let entries = list_entries(&ppath, &normalized, &session.permissions).map_err(EngineError::Io)?;

    let can_see_hidden_files = bits.contains(PathPermissionBits::CAN_SEE_HIDDEN_FILES);
    let can_see_hidden_dirs = bits.contains(PathPermissionBits::CAN_SEE_HIDDEN_DIRS);
    let visible: Vec<DirEntry> = entries
        .into_iter()
        .filter(|entry| {
            let can_see = if entry.is_dir { can_see_hidden_dirs } else { can_see_hidden_files };
            !is_hidden(&entry.name, show_hidden, can_see)
        })
        .collect();

    session.ftp_state.in_transfer = true;
    let reply = Reply::new(ReplyCode::FileStatusOkay, "Here comes the directory listing");
    Ok(Outcome::Data(reply, DataOp::List { entries: visible, format, session_salt: session.salt }))
}

/// Strips a leading `ls`-style flag group (`-a`, `-l`, `-al`, ...) some
/// clients prepend to `LIST`/`NLST`, returning the remaining path argument
/// and whether `-a` (show hidden entries) was present.
fn strip_hidden_flag(param: &str) -> (&str, bool) {
    let trimmed = param.trim_start();
    if let Some(rest) = trimmed.strip_prefix('-') {
        let (flags, remainder) = match rest.find(char::is_whitespace) {
            Some(idx) => (&rest[..idx], rest[idx..].trim_start()),
            None => (rest, ""),
        };
        if !flags.is_empty() && flags.chars().all(|c| c == 'a' || c == 'l') {
            return (remainder, flags.contains('a'));
        }
    }
    (trimmed, false)
}

pub fn mlst<U: UserDetail>(param: &str, session: &mut Session<U>) -> Result<Outcome> {
    let (ppath, bits) = super::resolve(session, param)?;
    let normalized = crate::path::normalize(param, &session.cwd)?;
    let metadata = std::fs::metadata(&ppath)?;
    let name = crate::path::split(&normalized).last().map(|s| s.to_string()).unwrap_or_else(|| "/".to_string());

    let entry = DirEntry {
        name,
        is_dir: metadata.is_dir(),
        size: if metadata.is_dir() { 0 } else { metadata.len() },
        mtime: metadata.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH),
        is_virtual: false,
        bits,
        ppath: ppath.clone(),
    };
    let line = crate::listing::facts_line(&entry, MlstFacts::default(), session.salt);
    Ok(Reply::new_multiline(ReplyCode::FileActionOkay, ["Listing:".to_string(), line.trim_end().to_string(), "End".to_string()]).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::DefaultUser;
    use crate::path::Permissions;
    use crate::server::ftp_state::TransferType;
    use crate::server::session::Session;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    fn addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 2121)
    }

    fn session() -> Session<DefaultUser> {
        Session::new(addr(), addr(), Permissions::new(), Duration::from_secs(60))
    }

    #[test]
    fn rest_rejects_nonzero_offset_in_ascii_mode() {
        let mut session = session();
        session.ftp_state.transfer_type = TransferType::Ascii;
        assert!(matches!(rest("5", &mut session), Err(EngineError::TransientFile(_))));
        assert!(session.ftp_state.restart_offset.is_none());
    }

    #[test]
    fn rest_allows_zero_offset_in_ascii_mode() {
        let mut session = session();
        session.ftp_state.transfer_type = TransferType::Ascii;
        assert!(rest("0", &mut session).is_ok());
        assert_eq!(session.ftp_state.restart_offset, Some(0));
    }

    #[test]
    fn rest_allows_nonzero_offset_in_binary_mode() {
        let mut session = session();
        assert!(rest("512", &mut session).is_ok());
        assert_eq!(session.ftp_state.restart_offset, Some(512));
    }

    #[test]
    fn stou_rejects_armed_nonzero_rest() {
        let mut session = session();
        session.ftp_state.restart_offset = Some(5);
        assert!(matches!(stou(&mut session), Err(EngineError::TransientFile(_))));
    }

    #[test]
    fn parses_port_address() {
        let addr = parse_port_address("192,168,1,2,18,52").unwrap();
        assert_eq!(addr, SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 2)), 0x1234));
    }

    #[test]
    fn rejects_malformed_port_address() {
        assert!(parse_port_address("192,168,1,2,18").is_err());
        assert!(parse_port_address("192,168,1,2,18,xyz").is_err());
        assert!(parse_port_address("999,168,1,2,18,52").is_err());
    }

    #[test]
    fn strips_dash_a_flag() {
        assert_eq!(strip_hidden_flag("-a /home"), ("/home", true));
        assert_eq!(strip_hidden_flag("-la /home"), ("/home", true));
        assert_eq!(strip_hidden_flag("-l"), ("", false));
        assert_eq!(strip_hidden_flag("/home"), ("/home", false));
        assert_eq!(strip_hidden_flag(""), ("", false));
    }
}
