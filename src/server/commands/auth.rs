//! `USER`/`PASS`/`ACCT` login, and `AUTH`/`PBSZ`/`PROT`/`CCC` TLS negotiation.

use super::{Outcome, ServerContext};
use crate::auth::{AuthenticationError, UserDetail};
use crate::error::Result;
use crate::server::ftp_state::DataChanProtection;
use crate::server::reply::{Reply, ReplyCode};
use crate::server::session::{Session, SessionState};

pub fn user<U: UserDetail>(param: &str, session: &mut Session<U>) -> Result<Outcome> {
    session.pending_username = Some(param.to_string());
    session.state = SessionState::WaitPass;
    Ok(Reply::new(ReplyCode::NeedPassword, format!("Username {param} okay, need password")).into())
}

pub async fn pass<U: UserDetail + 'static>(param: &str, session: &mut Session<U>, ctx: &ServerContext<U>) -> Result<Outcome> {
    let username = match session.pending_username.clone() {
        Some(u) => u,
        None => return Ok(Reply::new(ReplyCode::BadSequenceOfCommands, "Login with USER first").into()),
    };

    match ctx.authenticator.authenticate(&username, param).await {
        Ok(user) if !user.account_enabled() => {
            session.state = SessionState::New;
            Ok(Reply::new(ReplyCode::NotLoggedIn, format!("{}", AuthenticationError::AccountDisabled)).into())
        }
        Ok(user) => {
            session.log_in(user);
            Ok(Reply::new(ReplyCode::UserLoggedIn, "Login successful").into())
        }
        Err(e) => {
            session.state = SessionState::New;
            Ok(Reply::new(ReplyCode::NotLoggedIn, format!("{e}")).into())
        }
    }
}

pub fn auth<U: UserDetail>(param: &str, ctx: &ServerContext<U>) -> Result<Outcome> {
    let scheme = param.trim().to_ascii_uppercase();
    if scheme != "TLS" && scheme != "TLS-C" && scheme != "SSL" {
        return Ok(Reply::new(ReplyCode::CommandNotImplementedForParameter, "Only AUTH TLS is supported").into());
    }
    if !ctx.ftps.is_enabled() {
        return Ok(Reply::new(ReplyCode::ServiceNotAvailable, "TLS is not configured on this server").into());
    }
    Ok(Outcome::UpgradeTls(Reply::new(ReplyCode::AuthOkayNoDataNeeded, "AUTH TLS successful")))
}

pub fn prot<U: UserDetail>(param: &str, session: &mut Session<U>) -> Result<Outcome> {
    match param.trim().to_ascii_uppercase().as_str() {
        "C" => {
            session.ftp_state.protection = DataChanProtection::Clear;
            Ok(Reply::new(ReplyCode::CommandOkay, "Protection set to Clear").into())
        }
        "P" => {
            session.ftp_state.protection = DataChanProtection::Private;
            Ok(Reply::new(ReplyCode::CommandOkay, "Protection set to Private").into())
        }
        _ => Ok(Reply::new(ReplyCode::CommandNotImplementedForParameter, "Only C and P are supported").into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AnonymousAuthenticator, AnonymousUser};
    use crate::path::Permissions;
    use crate::server::tls::FtpsConfig;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::sync::Arc;
    use std::time::Duration;

    fn ctx() -> ServerContext<AnonymousUser> {
        ServerContext {
            authenticator: Arc::new(AnonymousAuthenticator),
            ftps: FtpsConfig::Off,
            passive_ports: None,
            greeting: "test".to_string(),
            base_permissions: Permissions::new(),
            logger: slog::Logger::root(slog::Discard, slog::o!()),
        }
    }

    fn session() -> Session<AnonymousUser> {
        Session::new(
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 2121),
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 21),
            Permissions::new(),
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn user_then_pass_logs_in() {
        let mut s = session();
        user("anonymous", &mut s).unwrap();
        assert_eq!(s.state, SessionState::WaitPass);
        pass("pw", &mut s, &ctx()).await.unwrap();
        assert!(s.is_logged_in());
    }

    #[tokio::test]
    async fn pass_without_user_is_bad_sequence() {
        let mut s = session();
        let outcome = pass("pw", &mut s, &ctx()).await.unwrap();
        match outcome {
            Outcome::Reply(Reply::CodeAndMsg { code, .. }) => assert_eq!(code, ReplyCode::BadSequenceOfCommands),
            _ => panic!("expected a reply"),
        }
    }

    #[test]
    fn auth_without_tls_config_is_rejected() {
        let outcome = auth("TLS", &ctx()).unwrap();
        match outcome {
            Outcome::Reply(Reply::CodeAndMsg { code, .. }) => assert_eq!(code, ReplyCode::ServiceNotAvailable),
            _ => panic!("expected a reply"),
        }
    }
}
