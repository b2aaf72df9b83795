//! A minimal custom [`Authenticator`] backed by a flat `user:password` file,
//! one credential pair per line. No bundled JSON/PAM/REST authenticator ships
//! with this engine; callers are expected to write one of these themselves
//! against whatever credential store they already have.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use vftpd::auth::{AuthenticationError, Authenticator, DefaultUser};
use vftpd::path::{default_home_permissions, PathKind, VirtualPath};
use vftpd::Server;

struct FlatFileAuthenticator {
    credentials: HashMap<String, String>,
}

impl FlatFileAuthenticator {
    fn load(path: &str) -> std::io::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let credentials = contents
            .lines()
            .filter_map(|line| line.split_once(':'))
            .map(|(user, pass)| (user.to_string(), pass.to_string()))
            .collect();
        Ok(FlatFileAuthenticator { credentials })
    }
}

#[async_trait]
impl Authenticator<DefaultUser> for FlatFileAuthenticator {
    async fn authenticate(&self, username: &str, password: &str) -> Result<DefaultUser, AuthenticationError> {
        match self.credentials.get(username) {
            Some(expected) if expected == password => Ok(DefaultUser::new(username)),
            Some(_) => Err(AuthenticationError::BadPassword),
            None => Err(AuthenticationError::UnknownUsername),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let authenticator = FlatFileAuthenticator::load("credentials.txt")?;

    let addr = "127.0.0.1:2121";
    let root = std::env::temp_dir();
    let mount = VirtualPath::new("/", root, default_home_permissions(), PathKind::Directory);
    let server = Server::with_authenticator(Arc::new(authenticator)).mount(mount)?.build();

    println!("Starting ftp server on {addr}");
    server.listen(addr).await?;

    Ok(())
}
