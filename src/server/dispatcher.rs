//! Line framing and the gate-descriptor command dispatcher.
//!
//! Each registered command carries a small fixed [`Gate`] struct rather than
//! a virtual predicate method; the dispatcher inspects it uniformly instead
//! of calling back into per-command code to ask "am I allowed to run yet".

use crate::error::EngineError;
use crate::server::ftp_state::FtpState;
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// One line of client input, split into its command name and parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCommand {
    /// Upper-cased command name, e.g. `"RETR"`.
    pub name: String,
    /// Everything after the first run of whitespace, verbatim.
    pub param: String,
}

/// A control line without CRLF longer than this terminates the session.
const MAX_LINE: usize = 16 * 1024;

/// Decodes CRLF-terminated FTP command lines; encoding of [`super::reply::Reply`]
/// is implemented directly on this type in `reply.rs`.
pub struct FtpCodec {
    next_index: usize,
}

impl FtpCodec {
    /// A fresh codec with no partial-line state.
    pub fn new() -> Self {
        FtpCodec { next_index: 0 }
    }
}

impl Default for FtpCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FtpCodec {
    type Item = ClientCommand;
    type Error = EngineError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<ClientCommand>, Self::Error> {
        let Some(newline_offset) = buf[self.next_index..].iter().position(|b| *b == b'\n') else {
            if buf.len() > MAX_LINE {
                return Err(EngineError::ClientParse("line too long".to_string()));
            }
            self.next_index = buf.len();
            return Ok(None);
        };

        let newline_index = newline_offset + self.next_index;
        let line = buf.split_to(newline_index + 1);
        self.next_index = 0;
        parse_line(&line).map(Some)
    }
}

fn parse_line(line: &[u8]) -> Result<ClientCommand, EngineError> {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let text = std::str::from_utf8(line).map_err(|_| EngineError::ClientParse("invalid UTF-8".to_string()))?;

    let (name_part, param_part) = match text.find(char::is_whitespace) {
        Some(idx) => (&text[..idx], text[idx..].trim_start()),
        None => (text, ""),
    };

    if name_part.is_empty() || name_part.len() > 8 || !name_part.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(EngineError::ClientParse(format!("unrecognized command {name_part:?}")));
    }

    Ok(ClientCommand { name: name_part.to_ascii_uppercase(), param: param_part.to_string() })
}

/// Preconditions a command must satisfy before its handler runs, checked in
/// a fixed order; the first failing gate short-circuits dispatch.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gate {
    /// Must equal the previous command's name (case-insensitive), or any
    /// previous command is fine if `None`.
    pub need_prev_cmd: Option<&'static str>,
    /// Requires a completed login.
    pub must_be_logged_in: bool,
    /// Requires that login has *not* completed yet.
    pub must_not_be_logged_in: bool,
    /// Requires a transfer currently in progress.
    pub must_be_in_transfer: bool,
    /// Requires no transfer currently in progress.
    pub must_not_be_in_transfer: bool,
    /// Requires `PASV` or `PORT` to have been issued already.
    pub need_port_or_pasv: bool,
    /// Requires the control channel to be TLS-protected.
    pub must_have_encryption: bool,
    /// Requires a non-empty parameter string.
    pub requires_param: bool,
}

/// Why a gate rejected a command, alongside the reply that should be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateFailure {
    /// `need_prev_cmd` didn't match.
    BadSequence,
    /// `must_be_logged_in` failed.
    NotLoggedIn,
    /// `must_not_be_logged_in` failed.
    AlreadyLoggedIn,
    /// `must_be_in_transfer` failed.
    NoTransfer,
    /// `must_not_be_in_transfer` failed.
    TransferInProgress,
    /// `need_port_or_pasv` failed.
    NeedPortOrPasv,
    /// `must_have_encryption` failed.
    TlsRequired,
    /// `requires_param` failed.
    MissingParam,
}

impl Gate {
    /// Evaluates this gate against `state` and whether the session is
    /// logged in, returning the first violated precondition, if any.
    pub fn check(&self, state: &FtpState, logged_in: bool, param: &str) -> Option<GateFailure> {
        if let Some(want) = self.need_prev_cmd {
            let matches = state.prev_cmd_name.as_deref().map(|p| p.eq_ignore_ascii_case(want)).unwrap_or(false);
            if !matches {
                return Some(GateFailure::BadSequence);
            }
        }
        if self.must_be_logged_in && !logged_in {
            return Some(GateFailure::NotLoggedIn);
        }
        if self.must_not_be_logged_in && logged_in {
            return Some(GateFailure::AlreadyLoggedIn);
        }
        if self.must_be_in_transfer && !state.in_transfer {
            return Some(GateFailure::NoTransfer);
        }
        if self.must_not_be_in_transfer && state.in_transfer {
            return Some(GateFailure::TransferInProgress);
        }
        if self.need_port_or_pasv && matches!(state.data_chan, crate::server::ftp_state::DataChanInitiation::None) {
            return Some(GateFailure::NeedPortOrPasv);
        }
        if self.must_have_encryption && !state.cc_is_encrypted {
            return Some(GateFailure::TlsRequired);
        }
        if self.requires_param && param.is_empty() {
            return Some(GateFailure::MissingParam);
        }
        None
    }
}

impl GateFailure {
    /// Renders this failure as the reply the dispatcher sends back.
    pub fn into_reply(self) -> super::reply::Reply {
        use super::reply::{Reply, ReplyCode};
        match self {
            GateFailure::BadSequence => Reply::new(ReplyCode::BadSequenceOfCommands, "Bad sequence of commands"),
            GateFailure::NotLoggedIn => Reply::new(ReplyCode::NotLoggedIn, "Please login with USER and PASS"),
            GateFailure::AlreadyLoggedIn => Reply::new(ReplyCode::ActionNotTaken, "You are logged in!"),
            GateFailure::NoTransfer => Reply::new(ReplyCode::ActionNotTaken, "No active file transfer"),
            GateFailure::TransferInProgress => Reply::new(ReplyCode::ActionNotTaken, "Active file transfer!"),
            GateFailure::NeedPortOrPasv => Reply::new(ReplyCode::BadSequenceOfCommands, "Need PASV or PORT before this command"),
            GateFailure::TlsRequired => Reply::new(ReplyCode::TlsRequired, "TLS is required on this connection"),
            GateFailure::MissingParam => Reply::new(ReplyCode::SyntaxErrorInParams, "Missing required parameter"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_and_param() {
        let cmd = parse_line(b"retr file.txt\r\n").unwrap();
        assert_eq!(cmd.name, "RETR");
        assert_eq!(cmd.param, "file.txt");
    }

    #[test]
    fn parses_bare_command_with_no_param() {
        let cmd = parse_line(b"PWD\r\n").unwrap();
        assert_eq!(cmd.name, "PWD");
        assert_eq!(cmd.param, "");
    }

    #[test]
    fn rejects_overlong_command_name() {
        assert!(parse_line(b"TOOOOOLONG arg\r\n").is_err());
    }

    #[test]
    fn rejects_non_alphabetic_command() {
        assert!(parse_line(b"RE7R x\r\n").is_err());
    }

    #[test]
    fn codec_buffers_partial_lines() {
        let mut codec = FtpCodec::new();
        let mut buf = BytesMut::from(&b"RE"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"TR a.txt\r\n");
        let cmd = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(cmd.name, "RETR");
    }

    #[test]
    fn gate_rejects_missing_login() {
        let gate = Gate { must_be_logged_in: true, ..Default::default() };
        let state = FtpState::new();
        assert_eq!(gate.check(&state, false, ""), Some(GateFailure::NotLoggedIn));
        assert_eq!(gate.check(&state, true, ""), None);
    }

    #[test]
    fn gate_checks_prev_cmd_case_insensitively() {
        let gate = Gate { need_prev_cmd: Some("RNFR"), ..Default::default() };
        let mut state = FtpState::new();
        assert_eq!(gate.check(&state, true, ""), Some(GateFailure::BadSequence));
        state.prev_cmd_name = Some("rnfr".to_string());
        assert_eq!(gate.check(&state, true, ""), None);
    }
}
