//! Reply codes and the `Reply` value the dispatcher renders onto the wire.

use bytes::BytesMut;
use std::io::Write;
use tokio_util::codec::Encoder;

/// A reply to the FTP client: nothing, a single line, or a multi-line block.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Send nothing at all (used for commands mid-transfer that don't reply
    /// on the control channel, and for the synthetic "connection closing").
    None,
    /// A single `<code> <message>` line.
    CodeAndMsg {
        /// The three-digit reply code.
        code: ReplyCode,
        /// The human-readable message.
        msg: String,
    },
    /// A multi-line reply: all but the last line are prefixed with a space
    /// (or the code, for continuation) per RFC 959 §4.2.
    MultiLine {
        /// The three-digit reply code, repeated on the opening and closing line.
        code: ReplyCode,
        /// The lines in between, in order.
        lines: Vec<String>,
    },
}

impl Reply {
    /// A single-line reply.
    pub fn new(code: ReplyCode, message: impl Into<String>) -> Self {
        Reply::CodeAndMsg { code, msg: message.into() }
    }

    /// A multi-line reply built from any `Display`-able iterator.
    pub fn new_multiline<I>(code: ReplyCode, lines: I) -> Self
    where
        I: IntoIterator,
        I::Item: std::fmt::Display,
    {
        Reply::MultiLine { code, lines: lines.into_iter().map(|line| format!("{line}")).collect() }
    }

    /// No reply at all.
    pub fn none() -> Self {
        Reply::None
    }
}

/// The three-digit reply codes this engine emits.
///
/// Named to match the error taxonomy in [`crate::error::EngineError::reply_code`]
/// rather than the bare RFC prose, since that is the mapping callers reason
/// about; the numeric value is still exactly the RFC 959/3659/2228 code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ReplyCode {
    /// 110: restart marker reply.
    RestartMarker = 110,
    /// 125: data connection already open, transfer starting.
    ConnectionAlreadyOpen = 125,
    /// 150: file status okay, about to open data connection.
    FileStatusOkay = 150,

    /// 200: command okay.
    CommandOkay = 200,
    /// 211: system status / help reply.
    SystemStatus = 211,
    /// 212: directory status.
    DirectoryStatus = 212,
    /// 213: file status.
    FileStatus = 213,
    /// 214: help message.
    HelpMessage = 214,
    /// 215: NAME system type.
    SystemType = 215,
    /// 220: service ready for new user.
    ServiceReady = 220,
    /// 221: control connection closing.
    ClosingControlConnection = 221,
    /// 225: data connection open, no transfer in progress.
    DataConnectionOpen = 225,
    /// 226: closing data connection, requested action successful.
    ClosingDataConnection = 226,
    /// 227: entering passive mode, `(h1,h2,h3,h4,p1,p2)`.
    EnteringPassiveMode = 227,
    /// 230: user logged in.
    UserLoggedIn = 230,
    /// 234: `AUTH` accepted, security data exchange not needed.
    AuthOkayNoDataNeeded = 234,
    /// 250: requested file action okay, completed.
    FileActionOkay = 250,
    /// 257: `PATHNAME` created.
    DirCreated = 257,

    /// 331: username okay, need password.
    NeedPassword = 331,
    /// 350: requested file action pending further information (e.g. `RNFR`, `REST`).
    FileActionPending = 350,

    /// 421: service not available, control connection closing.
    ServiceNotAvailable = 421,
    /// 425: can't open data connection.
    CantOpenDataConnection = 425,
    /// 426: connection closed, transfer aborted.
    ConnectionClosed = 426,
    /// 450: requested file action not taken, file unavailable.
    TransientFileError = 450,
    /// 451: local error in processing.
    LocalError = 451,
    /// 452: insufficient storage space.
    OutOfSpace = 452,

    /// 500: syntax error, command unrecognized.
    SyntaxErrorInCommand = 500,
    /// 501: syntax error in parameters or arguments.
    SyntaxErrorInParams = 501,
    /// 502: command not implemented.
    CommandNotImplemented = 502,
    /// 503: bad sequence of commands.
    BadSequenceOfCommands = 503,
    /// 504: command not implemented for that parameter.
    CommandNotImplementedForParameter = 504,
    /// 530: not logged in.
    NotLoggedIn = 530,
    /// 534: request denied, policy requires TLS.
    TlsRequired = 534,
    /// 550: requested action not taken, file unavailable/access denied.
    ActionNotTaken = 550,
    /// 553: requested action not taken, bad filename.
    BadFileName = 553,
}

impl Encoder<Reply> for super::dispatcher::FtpCodec {
    type Error = std::io::Error;

    fn encode(&mut self, reply: Reply, buf: &mut BytesMut) -> Result<(), Self::Error> {
        let mut scratch = Vec::new();
        match reply {
            Reply::None => return Ok(()),
            Reply::CodeAndMsg { code, msg } => {
                if msg.is_empty() {
                    writeln!(scratch, "{}\r", code as u32)?;
                } else {
                    writeln!(scratch, "{} {}\r", code as u32, msg)?;
                }
            }
            Reply::MultiLine { code, mut lines } => {
                let last_line = lines.pop().unwrap_or_default();
                for line in lines.iter_mut() {
                    if line.chars().next().is_some_and(|c| c.is_ascii_digit()) {
                        line.insert(0, ' ');
                    }
                }
                if lines.is_empty() {
                    writeln!(scratch, "{} {}\r", code as u32, last_line)?;
                } else {
                    write!(scratch, "{}-{}\r\n{} {}\r\n", code as u32, lines.join("\r\n"), code as u32, last_line)?;
                }
            }
        }
        buf.extend_from_slice(&scratch);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::codec::Encoder as _;

    #[test]
    fn single_line_renders_code_and_message() {
        let mut codec = crate::server::dispatcher::FtpCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(Reply::new(ReplyCode::CommandOkay, "ok"), &mut buf).unwrap();
        assert_eq!(&buf[..], b"200 ok\r\n");
    }

    #[test]
    fn empty_message_omits_trailing_space() {
        let mut codec = crate::server::dispatcher::FtpCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(Reply::new(ReplyCode::CommandOkay, ""), &mut buf).unwrap();
        assert_eq!(&buf[..], b"200\r\n");
    }

    #[test]
    fn multiline_wraps_code_on_first_and_last_line() {
        let mut codec = crate::server::dispatcher::FtpCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(Reply::new_multiline(ReplyCode::SystemStatus, vec!["a", "b", "c"]), &mut buf).unwrap();
        assert_eq!(&buf[..], b"211-a\r\nb\r\n211 c\r\n");
    }

    #[test]
    fn none_produces_no_bytes() {
        let mut codec = crate::server::dispatcher::FtpCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(Reply::none(), &mut buf).unwrap();
        assert!(buf.is_empty());
    }
}
