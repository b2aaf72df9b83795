//! Per-connection protocol state: transfer type, data-channel initiation
//! mode, and the bookkeeping the dispatcher needs between commands.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

/// `TYPE` setting: whether data transfers are passed through raw or through
/// the CRLF-translating ASCII filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferType {
    /// `TYPE A`: CRLF translation in [`crate::fs::AsciiFile`].
    Ascii,
    /// `TYPE I`: raw bytes, no translation.
    #[default]
    Binary,
}

/// How the next data connection will be established.
#[derive(Debug, Default)]
pub enum DataChanInitiation {
    /// No `PORT`/`PASV` issued yet.
    #[default]
    None,
    /// `PORT` was issued; connect out to this client-supplied address.
    Port(SocketAddr),
    /// `PASV` was issued; accept on this already-bound listener.
    Pasv(TcpListener),
}

/// Whether data-channel traffic should be protected (`PROT P`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataChanProtection {
    /// `PROT C`: clear data channel.
    #[default]
    Clear,
    /// `PROT P`: private (TLS) data channel.
    Private,
}

/// Everything the dispatcher and transfer loop need to remember between one
/// command and the next, beyond the session's identity and permissions.
#[derive(Debug, Default)]
pub struct FtpState {
    /// Current `TYPE`.
    pub transfer_type: TransferType,
    /// How the next data connection will be opened.
    pub data_chan: DataChanInitiation,
    /// Data-channel protection level, toggled by `PROT`.
    pub protection: DataChanProtection,
    /// `REST` offset armed for the next transfer command, if any.
    pub restart_offset: Option<u64>,
    /// The file staged by `RNFR`, awaiting a matching `RNTO`.
    pub rename_from: Option<crate::path::Vpath>,
    /// Name of the previously dispatched command, for `need_prev_cmd` gates.
    pub prev_cmd_name: Option<String>,
    /// Set true while a data transfer is actively running.
    pub in_transfer: bool,
    /// Flipped by the `ABOR` handler; polled by the running transfer loop
    /// between buffer-sized chunks so it can unwind early. Shared (rather
    /// than a plain `bool`) because `ABOR` is dispatched from the same
    /// connection loop that is concurrently awaiting the transfer future,
    /// not from inside it.
    pub abort_flag: Arc<AtomicBool>,
    /// Whether the control channel is currently TLS-protected.
    pub cc_is_encrypted: bool,
}

impl FtpState {
    /// A fresh, unauthenticated state as it exists right after connect.
    pub fn new() -> Self {
        FtpState::default()
    }

    /// Requests that the in-progress transfer (if any) stop at its next
    /// opportunity. Returns whether a transfer was actually running.
    pub fn request_abort(&self) -> bool {
        if self.in_transfer {
            self.abort_flag.store(true, Ordering::Relaxed);
        }
        self.in_transfer
    }

    /// Clears the data-channel bookkeeping once a transfer (successful or
    /// not) has completed, per the "reset FTP state transfer fields" step.
    pub fn reset_transfer(&mut self) {
        self.data_chan = DataChanInitiation::None;
        self.restart_offset = None;
        self.in_transfer = false;
        self.abort_flag.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_is_binary_and_idle() {
        let state = FtpState::new();
        assert_eq!(state.transfer_type, TransferType::Binary);
        assert!(!state.in_transfer);
        assert!(matches!(state.data_chan, DataChanInitiation::None));
    }

    #[test]
    fn reset_transfer_clears_bookkeeping() {
        let mut state = FtpState::new();
        state.in_transfer = true;
        state.abort_flag.store(true, Ordering::Relaxed);
        state.restart_offset = Some(42);
        state.reset_transfer();
        assert!(!state.in_transfer);
        assert!(!state.abort_flag.load(Ordering::Relaxed));
        assert_eq!(state.restart_offset, None);
    }

    #[test]
    fn request_abort_is_noop_without_a_transfer() {
        let state = FtpState::new();
        assert!(!state.request_abort());
        assert!(!state.abort_flag.load(Ordering::Relaxed));
    }
}
