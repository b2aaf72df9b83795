//! The per-connection session: identity, effective permissions, working
//! directory, and the housekeeping clock the session manager watches.

use crate::auth::UserDetail;
use crate::path::{Permissions, Vpath};
use crate::server::ftp_state::FtpState;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Where a session currently sits in the login state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, `USER` not yet sent (or rejected).
    New,
    /// `USER` accepted, waiting on `PASS`.
    WaitPass,
    /// Logged in, processing ordinary commands.
    WaitCmd,
}

/// A single client connection's state, shared between the control-channel
/// task and anything that looks the session up by id (e.g. a future admin
/// interface or the session manager's housekeeping sweep).
pub struct Session<U: UserDetail> {
    /// Stable identifier, handed out at connect time.
    pub id: Uuid,
    /// Per-session salt mixed into `MLST`'s `Unique` fact so it can't be
    /// correlated across sessions.
    pub salt: u64,
    /// The connecting client's address.
    pub peer_addr: SocketAddr,
    /// The server-side address of the control connection, used to pick the
    /// interface a `PASV` listener binds on.
    pub local_addr: SocketAddr,
    /// Authenticated subject, once `USER`/`PASS` succeed.
    pub user: Option<Arc<U>>,
    /// Raw username as presented to `USER`, kept even before `PASS` succeeds
    /// so gates like "must match the pending username" can inspect it.
    pub pending_username: Option<String>,
    /// Effective permission set for this session (home mount plus whatever
    /// base mounts the owning [`crate::entity::Entity`] contributed).
    pub permissions: Permissions,
    /// Current working directory, as a virtual path.
    pub cwd: Vpath,
    /// Login state machine position.
    pub state: SessionState,
    /// Protocol bookkeeping between commands (`TYPE`, `PASV`/`PORT`, etc).
    pub ftp_state: FtpState,
    /// When this session was created.
    pub created_at: Instant,
    /// When a command or data byte was last seen on this session.
    pub last_active: Instant,
    /// Idle duration after which housekeeping closes the session.
    pub idle_timeout: Duration,
    /// Structured logger scoped to this session; gains a `username` field
    /// once `USER` is accepted.
    pub logger: slog::Logger,
}

impl<U: UserDetail> Session<U> {
    /// Creates a new, unauthenticated session for a freshly accepted
    /// control connection.
    pub fn new(peer_addr: SocketAddr, local_addr: SocketAddr, base_permissions: Permissions, idle_timeout: Duration) -> Self {
        let mut salt_bytes = [0u8; 8];
        let _ = getrandom::fill(&mut salt_bytes);
        Session {
            id: Uuid::new_v4(),
            salt: u64::from_le_bytes(salt_bytes),
            peer_addr,
            local_addr,
            user: None,
            pending_username: None,
            permissions: base_permissions,
            cwd: "/".to_string(),
            state: SessionState::New,
            ftp_state: FtpState::new(),
            created_at: Instant::now(),
            last_active: Instant::now(),
            idle_timeout,
            logger: slog::Logger::root(slog::Discard, slog::o!()),
        }
    }

    /// Scopes `logger` to this session (e.g. with a `session_id` field) and
    /// installs it, replacing the no-op default [`Session::new`] sets.
    pub fn with_logger(mut self, logger: slog::Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Marks the session active now, resetting the idle clock. Called on
    /// every command and at least every 5s of wall time during a transfer.
    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    /// Runs one housekeeping check: `false` means the session has been idle
    /// longer than its timeout and should be closed.
    pub fn on_housekeeping(&self) -> bool {
        self.last_active.elapsed() < self.idle_timeout
    }

    /// Whether the session has completed the login sequence.
    pub fn is_logged_in(&self) -> bool {
        self.state == SessionState::WaitCmd
    }

    /// Completes login: installs `user`'s permissions merged with the base
    /// set already on the session, and advances to [`SessionState::WaitCmd`].
    pub fn log_in(&mut self, user: U) {
        self.permissions = user.build_session_permissions(&self.permissions);
        self.logger = self.logger.new(slog::o!("username" => user.to_string()));
        self.user = Some(Arc::new(user));
        self.state = SessionState::WaitCmd;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::DefaultUser;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 2121)
    }

    #[test]
    fn new_session_starts_unauthenticated_at_root() {
        let session = Session::<DefaultUser>::new(addr(), addr(), Permissions::new(), Duration::from_secs(60));
        assert_eq!(session.state, SessionState::New);
        assert_eq!(session.cwd, "/");
        assert!(session.user.is_none());
    }

    #[test]
    fn log_in_advances_state_and_installs_user() {
        let mut session = Session::<DefaultUser>::new(addr(), addr(), Permissions::new(), Duration::from_secs(60));
        session.log_in(DefaultUser::new("finn"));
        assert!(session.is_logged_in());
        assert_eq!(session.user.as_ref().unwrap().username, "finn");
    }

    #[test]
    fn housekeeping_reports_stale_after_timeout() {
        let mut session = Session::<DefaultUser>::new(addr(), addr(), Permissions::new(), Duration::from_millis(0));
        session.last_active = Instant::now() - Duration::from_secs(1);
        assert!(!session.on_housekeeping());
        session.touch();
        assert!(session.last_active.elapsed() < Duration::from_secs(1));
    }
}
