//! The pluggable authentication seam (§6.2 of the design notes).
//!
//! The engine never stores or validates credentials itself — "user database
//! and password storage" is explicitly an external collaborator. What the
//! core defines is a small `async_trait` seam: an [`Authenticator`] that
//! turns a username/password pair into a [`UserDetail`], and a [`UserDetail`]
//! that tells the engine what that subject is allowed to do. Downstream
//! crates (PAM, a REST lookup, a flat file) implement [`Authenticator`]
//! against their own backing store; this crate ships only
//! [`AnonymousAuthenticator`] as a batteries-included default.

mod anonymous;
mod authenticator;
mod user;

pub use anonymous::{AnonymousAuthenticator, AnonymousUser};
pub use authenticator::{AuthenticationError, Authenticator};
pub use user::{DefaultUser, UserDetail};
