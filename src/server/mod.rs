//! The control-channel server (components D, E, F, G, H wired together):
//! accepts connections, drives each one's command/reply cycle, and
//! coordinates data-channel transfers concurrently with `ABOR`.

pub mod commands;
pub mod dispatcher;
pub mod ftp_state;
pub mod passive;
pub mod reply;
pub mod session;
pub mod session_manager;
pub mod shutdown;
pub mod socket;
pub mod tls;
pub mod transfer;

use crate::auth::{Authenticator, UserDetail};
use crate::error::{EngineError, Result, ServerError};
use crate::path::Permissions;
use commands::{DataOp, Outcome, ServerContext};
use dispatcher::{ClientCommand, FtpCodec};
use ftp_state::DataChanInitiation;
use futures_util::{SinkExt, StreamExt};
use reply::{Reply, ReplyCode};
use session::Session;
use slog::Drain;
use session_manager::{SessionManager, SharedSession};
use shutdown::Shutdown;
use socket::Socket;
use std::net::SocketAddr;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tls::FtpsConfig;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_util::codec::Framed;

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(10);

/// An embeddable, multi-tenant FTP(S) server engine, generic over the
/// authenticated user type `U`.
///
/// Built with [`Server::with_authenticator`]; call [`Server::listen`] to
/// start accepting connections. Dropping a listening server (or notifying
/// its [`Shutdown`] handle) stops it.
pub struct Server<U: UserDetail> {
    ctx: ServerContext<U>,
    idle_timeout: Duration,
    sessions: Arc<SessionManager<U>>,
    shutdown: Arc<Shutdown>,
}

impl<U: UserDetail + 'static> Server<U> {
    /// Starts building a server around `authenticator`.
    pub fn with_authenticator(authenticator: Arc<dyn Authenticator<U>>) -> ServerBuilder<U> {
        ServerBuilder::new(authenticator)
    }

    /// A handle for triggering and waiting out a graceful shutdown from
    /// outside the task running [`Server::listen`].
    pub fn shutdown_handle(&self) -> Arc<Shutdown> {
        self.shutdown.clone()
    }

    /// The number of sessions currently tracked (including any that have
    /// disconnected but not yet been swept).
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Accepts connections on `bind_addr` until [`Shutdown::notify`] fires on
    /// this server's handle, then stops accepting and returns once every
    /// in-flight session has finished.
    pub async fn listen(self, bind_addr: impl tokio::net::ToSocketAddrs) -> Result<()> {
        let listener = TcpListener::bind(bind_addr).await.map_err(EngineError::Io)?;
        let bind_addr = listener.local_addr().map_err(EngineError::Io)?;
        tracing::info!(%bind_addr, "listening for FTP connections");
        let server = Arc::new(self);

        loop {
            let mut signal = server.shutdown.subscribe().await;
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer_addr) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                            continue;
                        }
                    };
                    tracing::info!(%peer_addr, "accepted control connection");
                    let server = server.clone();
                    tokio::spawn(async move {
                        let signal = server.shutdown.subscribe().await;
                        if let Err(e) = server.serve_connection(stream, peer_addr, signal).await {
                            tracing::warn!(%peer_addr, error = %e, "control connection ended with an error");
                        }
                    });
                }
                _ = signal.triggered() => {
                    tracing::info!("shutdown requested, no longer accepting new connections");
                    break;
                }
            }
        }

        server.shutdown.linger().await;
        Ok(())
    }

    async fn serve_connection(&self, stream: TcpStream, peer_addr: SocketAddr, mut signal: shutdown::Signal) -> Result<()> {
        let local_addr = stream.local_addr().map_err(EngineError::Io)?;
        let mut new_session = Session::new(peer_addr, local_addr, self.ctx.base_permissions.clone(), self.idle_timeout);
        let scoped_logger = self.ctx.logger.new(slog::o!("session_id" => new_session.id.to_string(), "peer_addr" => peer_addr.to_string()));
        new_session = new_session.with_logger(scoped_logger);
        let session = Arc::new(Mutex::new(new_session));
        let session_id = self.sessions.register(&session);
        #[cfg(feature = "prometheus")]
        crate::metrics::inc_session();

        let mut framed = Framed::new(Socket::plain(stream), FtpCodec::new());
        framed.send(Reply::new(ReplyCode::ServiceReady, self.ctx.greeting.clone())).await.map_err(EngineError::Io)?;

        let mut housekeeping = tokio::time::interval(HOUSEKEEPING_INTERVAL);
        housekeeping.tick().await;

        let result = 'outer: loop {
            tokio::select! {
                line = framed.next() => {
                    let Some(line) = line else { break 'outer Ok(()) };
                    let cmd = match line {
                        Ok(cmd) => cmd,
                        Err(e) => {
                            let _ = framed.send(Reply::new(e.reply_code(), format!("{e}"))).await;
                            break 'outer Err(e);
                        }
                    };
                    match self.process_line(&cmd, &session, framed).await {
                        Ok((new_framed, false)) => framed = new_framed,
                        Ok((new_framed, true)) => { framed = new_framed; break 'outer Ok(()); }
                        Err(e) => break 'outer Err(e),
                    }
                }
                _ = housekeeping.tick() => {
                    let alive = session.lock().await.on_housekeeping();
                    if !alive {
                        let _ = framed.send(Reply::new(ReplyCode::ServiceNotAvailable, "Idle timeout, closing control connection")).await;
                        break 'outer Ok(());
                    }
                }
                _ = signal.triggered() => {
                    let _ = framed.send(Reply::new(ReplyCode::ServiceNotAvailable, "Server is shutting down")).await;
                    break 'outer Ok(());
                }
            }
        };

        self.sessions.close(session_id);
        #[cfg(feature = "prometheus")]
        crate::metrics::dec_session();
        result
    }

    /// Gates, dispatches, and reacts to one already-decoded command line.
    /// Returns the (possibly TLS-upgraded) framed codec and whether the
    /// connection loop should close afterwards.
    async fn process_line(&self, cmd: &ClientCommand, session: &SharedSession<U>, mut framed: Framed<Socket, FtpCodec>) -> Result<(Framed<Socket, FtpCodec>, bool)> {
        #[cfg(feature = "prometheus")]
        crate::metrics::add_command_metric(cmd);

        let (outcome, logger) = {
            let mut guard = session.lock().await;
            guard.touch();
            let logged_in = guard.is_logged_in();
            let gate = commands::gate_for(&cmd.name);
            let outcome = match gate.check(&guard.ftp_state, logged_in, &cmd.param) {
                Some(failure) => Ok(Outcome::Reply(failure.into_reply())),
                None => commands::dispatch(cmd, &mut guard, &self.ctx).await,
            };
            guard.ftp_state.prev_cmd_name = Some(cmd.name.clone());
            (outcome, guard.logger.clone())
        };
        slog::debug!(logger, "control channel command {:?}", cmd);

        match outcome {
            Err(e) => {
                #[cfg(feature = "prometheus")]
                crate::metrics::add_error_metric(&e);
                slog::warn!(logger, "control channel error {:?}", e);
                let reply = Reply::new(e.reply_code(), format!("{e}"));
                #[cfg(feature = "prometheus")]
                crate::metrics::add_reply_metric(&reply);
                framed.send(reply).await.map_err(EngineError::Io)?;
                Ok((framed, false))
            }
            Ok(Outcome::Reply(reply)) => {
                #[cfg(feature = "prometheus")]
                crate::metrics::add_reply_metric(&reply);
                framed.send(reply).await.map_err(EngineError::Io)?;
                Ok((framed, false))
            }
            Ok(Outcome::Close(reply)) => {
                #[cfg(feature = "prometheus")]
                crate::metrics::add_reply_metric(&reply);
                framed.send(reply).await.map_err(EngineError::Io)?;
                Ok((framed, true))
            }
            Ok(Outcome::UpgradeTls(reply)) => {
                #[cfg(feature = "prometheus")]
                crate::metrics::add_reply_metric(&reply);
                framed.send(reply).await.map_err(EngineError::Io)?;
                let framed = self.upgrade_control_channel(framed, session).await?;
                Ok((framed, false))
            }
            Ok(Outcome::Data(reply, op)) => {
                #[cfg(feature = "prometheus")]
                crate::metrics::add_reply_metric(&reply);
                framed.send(reply).await.map_err(EngineError::Io)?;
                let framed = self.run_data_op(op, session, framed).await?;
                Ok((framed, false))
            }
        }
    }

    async fn upgrade_control_channel(&self, framed: Framed<Socket, FtpCodec>, session: &SharedSession<U>) -> Result<Framed<Socket, FtpCodec>> {
        let socket = framed.into_inner();
        let plain = match socket {
            Socket::Plain(tcp) => tcp,
            Socket::Tls(_) => return Err(EngineError::Internal("control channel is already TLS-protected".to_string())),
        };
        let acceptor = self.ctx.ftps.acceptor().ok_or_else(|| EngineError::Internal("AUTH TLS accepted without a TLS acceptor configured".to_string()))?;
        let tls = tls::upgrade(&acceptor, plain).await?;
        session.lock().await.ftp_state.cc_is_encrypted = true;
        Ok(Framed::new(Socket::tls(tls), FtpCodec::new()))
    }

    /// Establishes the data connection, then either streams a file transfer
    /// (concurrently watching for `ABOR` on the control channel) or renders
    /// and sends a directory listing, and finally sends the closing reply.
    async fn run_data_op(&self, op: DataOp, session: &SharedSession<U>, mut framed: Framed<Socket, FtpCodec>) -> Result<Framed<Socket, FtpCodec>> {
        let (data_chan, protection, transfer_type, restart_offset, abort_flag) = {
            let mut guard = session.lock().await;
            (
                std::mem::take(&mut guard.ftp_state.data_chan),
                guard.ftp_state.protection,
                guard.ftp_state.transfer_type,
                guard.ftp_state.restart_offset.take(),
                guard.ftp_state.abort_flag.clone(),
            )
        };

        let mut socket = match transfer::establish_data_connection(&data_chan, protection, &self.ctx.ftps).await {
            Ok(socket) => socket,
            Err(_) => {
                session.lock().await.ftp_state.reset_transfer();
                framed.send(Reply::new(ReplyCode::CantOpenDataConnection, "Could not open data connection")).await.map_err(EngineError::Io)?;
                return Ok(framed);
            }
        };

        match op {
            DataOp::Transfer { ppath, operation, direction } => {
                let touch_session = session.clone();
                let touch = move || {
                    if let Ok(mut guard) = touch_session.try_lock() {
                        guard.touch();
                    }
                };

                let transfer_fut = transfer::run(&mut socket, &ppath, operation, transfer_type, direction, restart_offset, &abort_flag, touch);
                tokio::pin!(transfer_fut);

                let outcome = loop {
                    tokio::select! {
                        result = &mut transfer_fut => break result,
                        line = framed.next() => {
                            match line {
                                Some(Ok(next)) if next.name == "ABOR" => {
                                    session.lock().await.ftp_state.request_abort();
                                }
                                Some(Ok(_other)) => {
                                    framed.send(Reply::new(ReplyCode::BadSequenceOfCommands, "A transfer is in progress; only ABOR is accepted")).await.map_err(EngineError::Io)?;
                                }
                                Some(Err(_)) | None => {
                                    abort_flag.store(true, Ordering::Relaxed);
                                }
                            }
                        }
                    }
                };

                match outcome {
                    Ok(o) if o.aborted => {
                        framed.send(Reply::new(ReplyCode::ConnectionClosed, "Connection closed; transfer aborted")).await.map_err(EngineError::Io)?;
                        framed.send(Reply::new(ReplyCode::ClosingDataConnection, "ABOR successful")).await.map_err(EngineError::Io)?;
                    }
                    Ok(o) => {
                        #[cfg(feature = "prometheus")]
                        match direction {
                            transfer::Direction::Send => crate::metrics::add_backend_read_metric(o.bytes),
                            transfer::Direction::Receive => crate::metrics::add_backend_write_metric(o.bytes),
                        }
                        framed.send(Reply::new(ReplyCode::ClosingDataConnection, "Transfer complete")).await.map_err(EngineError::Io)?;
                    }
                    Err(e) => {
                        framed.send(Reply::new(e.reply_code(), format!("{e}"))).await.map_err(EngineError::Io)?;
                    }
                }
            }
            DataOp::List { entries, format, session_salt } => {
                let facts = crate::listing::MlstFacts::default();
                let mut idx = 0;
                let io_result = loop {
                    let (buf, next, more) = crate::listing::format_batch(&entries, idx, format, facts, session_salt);
                    if let Err(e) = socket.write_all(&buf).await {
                        break Err(e);
                    }
                    idx = next;
                    if !more {
                        break socket.flush().await;
                    }
                };
                match io_result {
                    Ok(()) => framed.send(Reply::new(ReplyCode::ClosingDataConnection, "Directory send OK")).await.map_err(EngineError::Io)?,
                    Err(e) => framed.send(Reply::new(ReplyCode::ConnectionClosed, format!("{e}"))).await.map_err(EngineError::Io)?,
                }
            }
        }

        session.lock().await.ftp_state.reset_transfer();
        Ok(framed)
    }
}

/// Incrementally configures a [`Server`] before it starts accepting
/// connections.
pub struct ServerBuilder<U: UserDetail> {
    authenticator: Arc<dyn Authenticator<U>>,
    ftps: FtpsConfig,
    passive_ports: Option<Range<u16>>,
    greeting: String,
    base_permissions: Permissions,
    idle_timeout: Duration,
    logger: slog::Logger,
}

impl<U: UserDetail + 'static> ServerBuilder<U> {
    fn new(authenticator: Arc<dyn Authenticator<U>>) -> Self {
        ServerBuilder {
            authenticator,
            ftps: FtpsConfig::Off,
            passive_ports: None,
            greeting: "vftpd ready".to_string(),
            base_permissions: Permissions::new(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            logger: slog::Logger::root(slog_stdlog::StdLog.fuse(), slog::o!()),
        }
    }

    /// Sets the structured ([slog](https://crates.io/crates/slog)) logger
    /// the engine logs every command, reply, and error through. Defaults to
    /// one that forwards into the `log` facade via `slog-stdlog`.
    pub fn logger(mut self, logger: slog::Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Sets the `220` banner text.
    pub fn greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = greeting.into();
        self
    }

    /// Restricts `PASV` to `range` instead of letting the OS pick an
    /// ephemeral port.
    pub fn passive_ports(mut self, range: Range<u16>) -> Result<Self, ServerError> {
        if range.is_empty() {
            return Err(ServerError::InvalidPassivePortRange);
        }
        self.passive_ports = Some(range);
        Ok(self)
    }

    /// Loads a PEM certificate chain and private key, enabling `AUTH TLS`
    /// and `PROT P`.
    pub fn ftps(mut self, cert_path: impl AsRef<std::path::Path>, key_path: impl AsRef<std::path::Path>) -> Result<Self, ServerError> {
        self.ftps = FtpsConfig::from_pem_files(cert_path.as_ref(), key_path.as_ref())?;
        Ok(self)
    }

    /// Adds a single system-wide mount present for every session, before
    /// login overlays the authenticated user's home mount on top.
    pub fn mount(mut self, path: crate::path::VirtualPath) -> Result<Self, ServerError> {
        self.base_permissions.add_path(path).map_err(|e| ServerError::InvalidMount(e.to_string()))?;
        Ok(self)
    }

    /// Loads every mount found under `at` in `config` (see
    /// [`crate::config::ConfigTree`]) as a system-wide base mount.
    pub fn load_mounts(mut self, config: &dyn crate::config::ConfigTree, at: &str) -> Result<Self, ServerError> {
        self.base_permissions = crate::config::load_mounts(config, at, self.base_permissions)?;
        Ok(self)
    }

    /// Seeds the system-wide base mounts from an [`crate::entity::Entity`]'s
    /// rolled-up effective permissions (its own local mounts merged with
    /// every ancestor's, child-dominates on conflict). Typically the
    /// `Interface` leaf of a `Server`/`Host`/`Protocol`/`Interface` tree.
    pub fn entity(mut self, entity: &crate::entity::Entity) -> Self {
        self.base_permissions.merge(&entity.effective_permissions());
        self
    }

    /// Sets the idle duration after which a session's housekeeping sweep
    /// closes its control connection. Defaults to 5 minutes.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Finalizes configuration into a runnable [`Server`].
    pub fn build(self) -> Server<U> {
        Server {
            ctx: ServerContext {
                authenticator: self.authenticator,
                ftps: self.ftps,
                passive_ports: self.passive_ports,
                greeting: self.greeting,
                base_permissions: self.base_permissions,
                logger: self.logger,
            },
            idle_timeout: self.idle_timeout,
            sessions: Arc::new(SessionManager::new()),
            shutdown: Arc::new(Shutdown::new()),
        }
    }
}
