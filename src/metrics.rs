//! Prometheus counters for commands received, replies sent, transfer
//! throughput, and session churn. Only compiled in with the `prometheus`
//! feature; every function here is a no-op away from the registry it
//! updates, so call sites don't need to be feature-gated themselves.

use crate::error::EngineError;
use crate::server::dispatcher::ClientCommand;
use crate::server::reply::{Reply, ReplyCode};
use lazy_static::lazy_static;
use prometheus::{opts, register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter, IntCounterVec, IntGauge};

lazy_static! {
    static ref FTP_SESSIONS: IntGauge = register_int_gauge!(opts!("ftp_sessions_total", "Total number of FTP sessions.")).unwrap();
    static ref FTP_BACKEND_WRITE_BYTES: IntCounter =
        register_int_counter!(opts!("ftp_backend_write_bytes", "Total number of bytes written to the backend.")).unwrap();
    static ref FTP_BACKEND_READ_BYTES: IntCounter =
        register_int_counter!(opts!("ftp_backend_read_bytes", "Total number of bytes retrieved from the backend.")).unwrap();
    static ref FTP_BACKEND_WRITE_FILES: IntCounter =
        register_int_counter!(opts!("ftp_backend_write_files", "Total number of files written to the backend.")).unwrap();
    static ref FTP_BACKEND_READ_FILES: IntCounter =
        register_int_counter!(opts!("ftp_backend_read_files", "Total number of files retrieved from the backend.")).unwrap();
    static ref FTP_COMMAND_TOTAL: IntCounterVec = register_int_counter_vec!("ftp_command_total", "Total number of commands received.", &["command"]).unwrap();
    static ref FTP_REPLY_TOTAL: IntCounterVec =
        register_int_counter_vec!("ftp_reply_total", "Total number of reply codes server sent to clients.", &["range"]).unwrap();
    static ref FTP_ERROR_TOTAL: IntCounterVec = register_int_counter_vec!("ftp_error_total", "Total number of errors encountered.", &["type"]).unwrap();
}

/// Increase the metrics gauge for client sessions.
pub fn inc_session() {
    FTP_SESSIONS.inc();
}

/// Decrease the metrics gauge for client sessions.
pub fn dec_session() {
    FTP_SESSIONS.dec();
}

/// Records a command as it's pulled off the wire, before dispatch.
pub fn add_command_metric(cmd: &ClientCommand) {
    FTP_COMMAND_TOTAL.with_label_values(&[&cmd.name.to_lowercase()]).inc();
}

/// Records the reply sent back for a command.
pub fn add_reply_metric(reply: &Reply) {
    match *reply {
        Reply::None => {}
        Reply::CodeAndMsg { code, .. } => add_replycode_metric(code),
        Reply::MultiLine { code, .. } => add_replycode_metric(code),
    }
}

fn add_replycode_metric(code: ReplyCode) {
    let range = format!("{}xx", code as u32 / 100 % 10);
    FTP_REPLY_TOTAL.with_label_values(&[&range]).inc();
}

/// Records a dispatch error by its taxonomy variant, before it's turned
/// into a reply code.
pub fn add_error_metric(error: &EngineError) {
    let label = match error {
        EngineError::ClientParse(_) => "client_parse",
        EngineError::AccessDenied(_) => "access_denied",
        EngineError::NotFound(_) => "not_found",
        EngineError::AlreadyExists(_) => "already_exists",
        EngineError::BadSequence => "bad_sequence",
        EngineError::Io(_) => "io",
        EngineError::Tls(_) => "tls",
        EngineError::Internal(_) => "internal",
        EngineError::TransientFile(_) => "transient_file",
    };
    FTP_ERROR_TOTAL.with_label_values(&[label]).inc();
}

/// Records bytes sent to the client as part of a `RETR`/`LIST`-style transfer.
pub fn add_backend_read_metric(bytes: u64) {
    FTP_BACKEND_READ_BYTES.inc_by(bytes);
    FTP_BACKEND_READ_FILES.inc();
}

/// Records bytes received from the client as part of a `STOR`/`APPE`/`STOU` transfer.
pub fn add_backend_write_metric(bytes: u64) {
    FTP_BACKEND_WRITE_BYTES.inc_by(bytes);
    FTP_BACKEND_WRITE_FILES.inc();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::dispatcher::ClientCommand;

    #[test]
    fn command_metric_lowercases_the_label() {
        let cmd = ClientCommand { name: "RETR".to_string(), param: "file.txt".to_string() };
        add_command_metric(&cmd);
    }

    #[test]
    fn reply_metric_buckets_by_hundred() {
        add_reply_metric(&Reply::new(ReplyCode::CommandOkay, "ok"));
        add_reply_metric(&Reply::None);
    }

    #[test]
    fn error_metric_handles_every_variant() {
        add_error_metric(&EngineError::BadSequence);
        add_error_metric(&EngineError::TransientFile("x".to_string()));
    }

    #[test]
    fn session_gauge_inc_dec_is_callable() {
        inc_session();
        dec_session();
    }

    #[test]
    fn backend_byte_counters_are_callable() {
        add_backend_read_metric(10);
        add_backend_write_metric(20);
    }
}
