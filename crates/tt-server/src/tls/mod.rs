//! TLS echo service

mod echo;
mod identity;
mod listener;

pub use echo::echo;
pub use identity::{crypto_provider, spki_fingerprint, IdentityError, ServerIdentity};
pub use listener::{ServiceOptions, TlsEchoService};
