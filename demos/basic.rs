//! The most basic usage: an anonymous, unauthenticated server rooted at a
//! temporary directory.

use std::sync::Arc;
use vftpd::auth::AnonymousAuthenticator;
use vftpd::path::{default_permissions, PathKind, VirtualPath};
use vftpd::Server;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let addr = "127.0.0.1:2121";
    let root = std::env::temp_dir();
    let mount = VirtualPath::new("/", root, default_permissions(), PathKind::Directory);

    let server = Server::with_authenticator(Arc::new(AnonymousAuthenticator)).mount(mount).unwrap().build();

    println!("Starting ftp server on {addr}");
    server.listen(addr).await.unwrap();
}
