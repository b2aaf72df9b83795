//! The ~35 command handlers and the gate table that guards them.
//!
//! Each entry in [`gate_for`] is the fixed [`Gate`] struct the dispatcher
//! checks before the matching arm in [`dispatch`] ever runs; there is no
//! per-command virtual method, just data the dispatcher reads uniformly.

mod auth;
mod data;
mod nav;

use crate::auth::{Authenticator, UserDetail};
use crate::error::{EngineError, Result};
use crate::path::Permissions;
use crate::server::dispatcher::{ClientCommand, Gate};
use crate::server::reply::{Reply, ReplyCode};
use crate::server::session::Session;
use crate::server::tls::FtpsConfig;
use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;

pub use data::DataOp;

/// Shared, read-mostly configuration every command handler may need, built
/// once per [`crate::server::Server`] and cloned (cheaply, via `Arc`
/// fields) into every connection task.
pub struct ServerContext<U: UserDetail> {
    /// Turns `USER`/`PASS` into a [`UserDetail`].
    pub authenticator: Arc<dyn Authenticator<U>>,
    /// TLS material for `AUTH TLS` and `PROT P`.
    pub ftps: FtpsConfig,
    /// Configured `PASV` port range, if restricted.
    pub passive_ports: Option<Range<u16>>,
    /// Sent as the `220` banner.
    pub greeting: String,
    /// System-wide mounts every session starts with, before login overlays
    /// the authenticated user's home.
    pub base_permissions: Permissions,
    /// Root structured logger; each session gets a child scoped with its
    /// own `session_id` field.
    pub logger: slog::Logger,
}

/// What a successful dispatch asks the connection loop to do next.
pub enum Outcome {
    /// Send this reply; nothing else.
    Reply(Reply),
    /// Send this reply, then perform a data-channel transfer.
    Data(Reply, DataOp),
    /// Send this reply, then upgrade the control socket to TLS.
    UpgradeTls(Reply),
    /// Send this reply, then close the connection.
    Close(Reply),
}

impl From<Reply> for Outcome {
    fn from(reply: Reply) -> Self {
        Outcome::Reply(reply)
    }
}

/// The fixed precondition set for `name`, consulted before [`dispatch`]
/// runs the matching handler. Unknown commands get the "always available,
/// no special preconditions" gate; [`dispatch`] itself rejects them with
/// 502.
pub fn gate_for(name: &str) -> Gate {
    let logged_in_only = Gate { must_be_logged_in: true, ..Default::default() };
    let pre_login_only = Gate { must_not_be_logged_in: true, ..Default::default() };
    let logged_in_with_param = Gate { must_be_logged_in: true, requires_param: true, ..Default::default() };
    let transfer_command = Gate { must_be_logged_in: true, need_port_or_pasv: true, must_not_be_in_transfer: true, ..Default::default() };

    match name {
        "USER" => Gate { requires_param: true, ..Default::default() },
        "PASS" => Gate { need_prev_cmd: Some("USER"), ..Default::default() },
        "ACCT" => pre_login_only,
        "AUTH" => Gate { requires_param: true, ..Default::default() },
        "PBSZ" => logged_in_only,
        "PROT" => Gate { must_be_logged_in: true, requires_param: true, ..Default::default() },
        "CCC" => logged_in_only,

        "PWD" | "XPWD" => logged_in_only,
        "CWD" | "XCWD" => logged_in_with_param,
        "CDUP" | "XCUP" => logged_in_only,
        "MKD" | "XMKD" => logged_in_with_param,
        "RMD" | "XRMD" => logged_in_with_param,
        "DELE" => logged_in_with_param,
        "RNFR" => logged_in_with_param,
        "RNTO" => Gate { must_be_logged_in: true, requires_param: true, need_prev_cmd: Some("RNFR"), ..Default::default() },
        "SIZE" => logged_in_with_param,
        "MDTM" => logged_in_with_param,
        "ALLO" => logged_in_only,

        "SYST" => Gate::default(),
        "TYPE" => Gate { must_be_logged_in: true, requires_param: true, ..Default::default() },
        "STRU" => logged_in_with_param,
        "MODE" => logged_in_with_param,
        "NOOP" => Gate::default(),
        "HELP" => Gate::default(),
        "FEAT" => Gate::default(),
        "OPTS" => logged_in_with_param,
        "QUIT" => Gate::default(),
        "STAT" => logged_in_only,

        "PASV" => logged_in_only,
        "PORT" => Gate { must_be_logged_in: true, requires_param: true, ..Default::default() },
        "REST" => Gate { must_be_logged_in: true, requires_param: true, ..Default::default() },
        "ABOR" => logged_in_only,

        "RETR" => transfer_command,
        "STOR" => transfer_command,
        "APPE" => transfer_command,
        "STOU" => Gate { must_be_logged_in: true, need_port_or_pasv: true, must_not_be_in_transfer: true, ..Default::default() },
        "LIST" => transfer_command,
        "NLST" => transfer_command,
        "MLSD" => transfer_command,
        "MLST" => logged_in_only,

        _ => Gate::default(),
    }
}

/// Runs `cmd`'s handler. Callers have already evaluated [`gate_for`] and
/// confirmed it passes.
pub async fn dispatch<U: UserDetail + 'static>(cmd: &ClientCommand, session: &mut Session<U>, ctx: &ServerContext<U>) -> Result<Outcome> {
    let name = cmd.name.as_str();
    let param = cmd.param.as_str();

    match name {
        "USER" => auth::user(param, session),
        "PASS" => auth::pass(param, session, ctx).await,
        "ACCT" => Ok(Reply::new(ReplyCode::CommandOkay, "ACCT not required").into()),
        "AUTH" => auth::auth(param, ctx),
        "PBSZ" => Ok(Reply::new(ReplyCode::CommandOkay, "PBSZ=0").into()),
        "PROT" => auth::prot(param, session),
        "CCC" => Ok(Reply::new(ReplyCode::CommandOkay, "Clear control channel").into()),

        "PWD" | "XPWD" => nav::pwd(session),
        "CWD" | "XCWD" => nav::cwd(param, session),
        "CDUP" | "XCUP" => nav::cdup(session),
        "MKD" | "XMKD" => nav::mkd(param, session),
        "RMD" | "XRMD" => nav::rmd(param, session),
        "DELE" => nav::dele(param, session),
        "RNFR" => nav::rnfr(param, session),
        "RNTO" => nav::rnto(param, session),
        "SIZE" => nav::size(param, session),
        "MDTM" => nav::mdtm(param, session),
        "ALLO" => Ok(Reply::new(ReplyCode::CommandOkay, "ALLO command successful").into()),

        "SYST" => Ok(Reply::new(ReplyCode::SystemType, "UNIX Type: L8").into()),
        "TYPE" => nav::set_type(param, session),
        "STRU" => nav::stru(param),
        "MODE" => nav::mode(param),
        "NOOP" => Ok(Reply::new(ReplyCode::CommandOkay, "NOOP ok").into()),
        "HELP" => Ok(Reply::new_multiline(
            ReplyCode::HelpMessage,
            ["Help:", "USER PASS ACCT SYST TYPE STRU MODE RETR STOR APPE", "LIST NLST MLSD MLST PASV PORT PWD CWD CDUP MKD RMD DELE", "RNFR RNTO SIZE MDTM REST ABOR AUTH PBSZ PROT CCC QUIT", "End"],
        )
        .into()),
        "FEAT" => Ok(Reply::new_multiline(ReplyCode::SystemStatus, ["Extensions supported:", " SIZE", " MDTM", " MLST Type*;Size*;Modify*;Perm*;", " MLSD", " REST STREAM", " PBSZ", " PROT", " AUTH TLS", "End"]).into()),
        "OPTS" => nav::opts(param),
        "QUIT" => Ok(Outcome::Close(Reply::new(ReplyCode::ClosingControlConnection, "Bye"))),
        "STAT" => nav::stat(param, session),

        "PASV" => data::pasv(session, ctx).await,
        "PORT" => data::port(param, session),
        "REST" => data::rest(param, session),
        "ABOR" => data::abor(session),

        "RETR" => data::retr(param, session),
        "STOR" => data::stor(param, session),
        "APPE" => data::appe(param, session),
        "STOU" => data::stou(session),
        "LIST" => data::list(param, session, crate::listing::ListFormat::Long),
        "NLST" => data::list(param, session, crate::listing::ListFormat::Short),
        "MLSD" => data::list(param, session, crate::listing::ListFormat::Machine),
        "MLST" => data::mlst(param, session),

        _ => Err(EngineError::ClientParse(format!("unsupported command {name}"))),
    }
}

/// Looks a client-supplied path parameter up against the session's
/// effective permissions, returning the physical path and its mount's bits.
pub(super) fn resolve<U: UserDetail>(session: &Session<U>, vpath: &str) -> Result<(PathBuf, crate::path::PathPermissionBits)> {
    session.permissions.resolve(vpath, &session.cwd)
}
