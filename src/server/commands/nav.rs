//! Directory navigation, file management, and the handful of session-wide
//! settings commands (`TYPE`/`STRU`/`MODE`/`OPTS`).

use super::Outcome;
use crate::auth::UserDetail;
use crate::error::{EngineError, Result};
use crate::path::PathPermissionBits;
use crate::server::ftp_state::TransferType;
use crate::server::reply::{Reply, ReplyCode};
use crate::server::session::Session;

/// Doubles embedded `"` characters, per RFC 959 §4.1.1's quoting rule for
/// pathnames carried inside a `257`-style reply.
fn quote_path(path: &str) -> String {
    path.replace('"', "\"\"")
}

pub fn pwd<U: UserDetail>(session: &Session<U>) -> Result<Outcome> {
    Ok(Reply::new(ReplyCode::DirCreated, format!("\"{}\" is the current directory", quote_path(&session.cwd))).into())
}

pub fn cwd<U: UserDetail>(param: &str, session: &mut Session<U>) -> Result<Outcome> {
    let normalized = crate::path::normalize(param, &session.cwd)?;
    let resolved = session.permissions.get_path(&normalized)?;
    if !resolved.mount.bits().contains(PathPermissionBits::CAN_ENTER) {
        return Err(EngineError::AccessDenied(format!("cannot enter {normalized}")));
    }
    session.cwd = normalized;
    Ok(Reply::new(ReplyCode::FileActionOkay, "Directory successfully changed").into())
}

pub fn cdup<U: UserDetail>(session: &mut Session<U>) -> Result<Outcome> {
    cwd("..", session)
}

pub fn mkd<U: UserDetail>(param: &str, session: &mut Session<U>) -> Result<Outcome> {
    let (ppath, bits) = super::resolve(session, param)?;
    if !bits.contains(PathPermissionBits::CAN_CREATE_DIR) {
        return Err(EngineError::AccessDenied("CAN_CREATE_DIR not granted".to_string()));
    }
    std::fs::create_dir(&ppath)?;
    let normalized = crate::path::normalize(param, &session.cwd)?;
    Ok(Reply::new(ReplyCode::DirCreated, format!("\"{}\" created", quote_path(&normalized))).into())
}

pub fn rmd<U: UserDetail>(param: &str, session: &mut Session<U>) -> Result<Outcome> {
    let (ppath, bits) = super::resolve(session, param)?;
    if !bits.contains(PathPermissionBits::CAN_DELETE_DIR) {
        return Err(EngineError::AccessDenied("CAN_DELETE_DIR not granted".to_string()));
    }
    std::fs::remove_dir(&ppath)?;
    Ok(Reply::new(ReplyCode::FileActionOkay, "Directory removed").into())
}

pub fn dele<U: UserDetail>(param: &str, session: &mut Session<U>) -> Result<Outcome> {
    let (ppath, bits) = super::resolve(session, param)?;
    if !bits.contains(PathPermissionBits::CAN_DELETE_FILE) {
        return Err(EngineError::AccessDenied("CAN_DELETE_FILE not granted".to_string()));
    }
    std::fs::remove_file(&ppath)?;
    Ok(Reply::new(ReplyCode::FileActionOkay, "File deleted").into())
}

pub fn rnfr<U: UserDetail>(param: &str, session: &mut Session<U>) -> Result<Outcome> {
    let (ppath, bits) = super::resolve(session, param)?;
    if !bits.contains(PathPermissionBits::CAN_RENAME) {
        return Err(EngineError::AccessDenied("CAN_RENAME not granted".to_string()));
    }
    if !ppath.exists() {
        return Err(EngineError::NotFound(param.to_string()));
    }
    let normalized = crate::path::normalize(param, &session.cwd)?;
    session.ftp_state.rename_from = Some(normalized);
    Ok(Reply::new(ReplyCode::FileActionPending, "File exists, ready for destination name").into())
}

pub fn rnto<U: UserDetail>(param: &str, session: &mut Session<U>) -> Result<Outcome> {
    let from_vpath = session.ftp_state.rename_from.take().ok_or(EngineError::BadSequence)?;
    let (from_ppath, _) = super::resolve(session, &from_vpath)?;
    let (to_ppath, bits) = super::resolve(session, param)?;
    if !bits.contains(PathPermissionBits::CAN_RENAME) {
        return Err(EngineError::AccessDenied("CAN_RENAME not granted".to_string()));
    }
    std::fs::rename(&from_ppath, &to_ppath)?;
    Ok(Reply::new(ReplyCode::FileActionOkay, "Rename successful").into())
}

pub fn size<U: UserDetail>(param: &str, session: &mut Session<U>) -> Result<Outcome> {
    let (ppath, bits) = super::resolve(session, param)?;
    if !bits.contains(PathPermissionBits::CAN_READ) {
        return Err(EngineError::AccessDenied("CAN_READ not granted".to_string()));
    }
    let metadata = std::fs::metadata(&ppath)?;
    if !metadata.is_file() {
        return Err(EngineError::NotFound(format!("{param} is not a regular file")));
    }
    Ok(Reply::new(ReplyCode::FileStatus, metadata.len().to_string()).into())
}

pub fn mdtm<U: UserDetail>(param: &str, session: &mut Session<U>) -> Result<Outcome> {
    let (ppath, _) = super::resolve(session, param)?;
    let metadata = std::fs::metadata(&ppath)?;
    let modified = metadata.modified()?;
    let dt: chrono::DateTime<chrono::Utc> = modified.into();
    Ok(Reply::new(ReplyCode::FileStatus, dt.format("%Y%m%d%H%M%S").to_string()).into())
}

pub fn set_type<U: UserDetail>(param: &str, session: &mut Session<U>) -> Result<Outcome> {
    match param.trim().to_ascii_uppercase().chars().next() {
        Some('A') => {
            session.ftp_state.transfer_type = TransferType::Ascii;
            Ok(Reply::new(ReplyCode::CommandOkay, "Switching to ASCII mode").into())
        }
        Some('I') | Some('L') => {
            session.ftp_state.transfer_type = TransferType::Binary;
            Ok(Reply::new(ReplyCode::CommandOkay, "Switching to Binary mode").into())
        }
        _ => Ok(Reply::new(ReplyCode::CommandNotImplementedForParameter, "Unsupported TYPE").into()),
    }
}

pub fn stru(param: &str) -> Result<Outcome> {
    if param.trim().eq_ignore_ascii_case("F") {
        Ok(Reply::new(ReplyCode::CommandOkay, "Structure set to File").into())
    } else {
        Ok(Reply::new(ReplyCode::CommandNotImplementedForParameter, "Only F is supported").into())
    }
}

pub fn mode(param: &str) -> Result<Outcome> {
    if param.trim().eq_ignore_ascii_case("S") {
        Ok(Reply::new(ReplyCode::CommandOkay, "Mode set to Stream").into())
    } else {
        Ok(Reply::new(ReplyCode::CommandNotImplementedForParameter, "Only S is supported").into())
    }
}

pub fn opts(param: &str) -> Result<Outcome> {
    let mut parts = param.splitn(2, char::is_whitespace);
    match parts.next().map(str::to_ascii_uppercase).as_deref() {
        Some("UTF8") => Ok(Reply::new(ReplyCode::CommandOkay, "UTF8 enabled").into()),
        _ => Ok(Reply::new(ReplyCode::CommandNotImplementedForParameter, "Unsupported OPTS option").into()),
    }
}

pub fn stat<U: UserDetail>(param: &str, session: &mut Session<U>) -> Result<Outcome> {
    if param.is_empty() {
        return Ok(Reply::new_multiline(ReplyCode::SystemStatus, ["Status:", &format!("Logged in, cwd={}", session.cwd), "End"]).into());
    }
    let (ppath, _) = super::resolve(session, param)?;
    let normalized = crate::path::normalize(param, &session.cwd)?;
    let entries = crate::listing::list_entries(&ppath, &normalized, &session.permissions)?;
    let mut lines = vec!["Status follows:".to_string()];
    for entry in &entries {
        lines.push(entry.name.clone());
    }
    lines.push("End of status".to_string());
    Ok(Reply::new_multiline(ReplyCode::DirectoryStatus, lines).into())
}
