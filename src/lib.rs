//! A SASL (RFC 4422) authentication library providing the client and server
//! roles of an authentication exchange, along with the ANONYMOUS (RFC 4505),
//! EXTERNAL (RFC 4422), PLAIN (RFC 4616) and SCRAM-SHA-1 (RFC 5802)
//! mechanisms.
//!
//! The conversation driver in [`driver`] pumps challenge/response bytes
//! between a [`mechanism::ClientMechanism`] or [`mechanism::ServerMechanism`]
//! and an abstract transport ([`channel::Incoming`]/[`channel::Outgoing`]),
//! cooperatively cancellable via a [`tokio_util::sync::CancellationToken`].
//!
//! GSSAPI is out of scope: it wraps a native Kerberos library and doesn't
//! fit this crate's pure-Rust dependency stack.

pub mod anonymous;
pub mod channel;
mod crypto;
pub mod driver;
pub mod error;
pub mod external;
pub mod mechanism;
mod nonce;
pub mod plain;
pub mod registry;
pub mod scram;
pub mod verifier;

pub use error::{Error, Result};
pub use mechanism::{ClientMechanism, ServerMechanism};
