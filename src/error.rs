//! Crate-wide error taxonomy.
//!
//! Every fallible operation in the engine resolves, eventually, to one of the
//! [`EngineError`] kinds below. The dispatcher is the single place that turns
//! a kind into a three-digit FTP reply code; individual commands never write
//! a literal status code themselves.

use crate::server::reply::ReplyCode;
use std::io;

/// Errors raised while building a [`crate::server::Server`].
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The passive port range supplied to the builder was empty or inverted.
    #[error("invalid passive port range")]
    InvalidPassivePortRange,
    /// TLS was requested but no certificate/key pair was configured.
    #[error("FTPS was enabled but no TLS configuration was supplied")]
    MissingTlsConfig,
    /// The supplied configuration tree was missing a required key.
    #[error("missing configuration value at {0}")]
    MissingConfigValue(String),
    /// A mount read from a [`crate::config::ConfigTree`] could not be added,
    /// either because its permission literal didn't parse or because it
    /// collided with an existing mount.
    #[error("invalid mount configuration: {0}")]
    InvalidMount(String),
    /// Binding the control-channel listener failed.
    #[error("failed to bind listener: {0}")]
    Bind(#[source] io::Error),
}

/// The abstract error kinds from the engine's error taxonomy.
///
/// Each variant knows how to render itself as a reply code via
/// [`EngineError::reply_code`]; nothing downstream needs to re-derive that
/// mapping.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The client sent a line that could not be parsed as a command.
    #[error("client parse error: {0}")]
    ClientParse(String),
    /// A permission bit was missing, or path normalization rejected the input.
    #[error("access denied: {0}")]
    AccessDenied(String),
    /// The requested file or directory does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The target of a creating operation already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),
    /// A command was sent out of the sequence its gates require.
    #[error("bad sequence of commands")]
    BadSequence,
    /// An underlying OS I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// A TLS handshake or record operation failed.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),
    /// An unexpected internal error occurred while handling a command.
    #[error("internal error: {0}")]
    Internal(String),
    /// A transfer precondition failed in a way that's retryable on a
    /// different command sequence, e.g. a non-zero `REST` offset combined
    /// with ASCII mode, or armed ahead of `STOU`.
    #[error("transient file error: {0}")]
    TransientFile(String),
}

impl EngineError {
    /// Maps this error kind to the reply code the protocol's error taxonomy
    /// assigns it. This is the *only* place that mapping happens.
    pub fn reply_code(&self) -> ReplyCode {
        match self {
            EngineError::ClientParse(_) => ReplyCode::SyntaxErrorInParams,
            EngineError::AccessDenied(_) => ReplyCode::ActionNotTaken,
            EngineError::NotFound(_) => ReplyCode::ActionNotTaken,
            EngineError::AlreadyExists(_) => ReplyCode::ActionNotTaken,
            EngineError::BadSequence => ReplyCode::BadSequenceOfCommands,
            EngineError::Io(_) => ReplyCode::LocalError,
            EngineError::Tls(_) => ReplyCode::CantOpenDataConnection,
            EngineError::Internal(_) => ReplyCode::ServiceNotAvailable,
            EngineError::TransientFile(_) => ReplyCode::TransientFileError,
        }
    }
}

/// Convenience alias used throughout the engine's internals.
pub type Result<T> = std::result::Result<T, EngineError>;
