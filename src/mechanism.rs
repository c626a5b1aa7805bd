//! The mechanism contract driven by [`crate::driver`].

use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// The client half of a SASL mechanism.
///
/// A mechanism instance is single-use: once [`ClientMechanism::completed`]
/// returns `true`, calling [`ClientMechanism::next`] again is a programmer
/// error and raises `UnexpectedChallenge`.
pub trait ClientMechanism: Send {
    /// The mechanism's registered name, available independent of state.
    fn name(&self) -> &'static str;

    /// Produces the initial response. Called exactly once, before any call
    /// to `next`.
    fn start(&mut self, cancel: &CancellationToken) -> Result<Vec<u8>>;

    /// Produces the next response given the server's latest challenge.
    fn next(&mut self, cancel: &CancellationToken, challenge: &[u8]) -> Result<Vec<u8>>;

    /// Whether the client side of the exchange is finished.
    fn completed(&self) -> bool;

    /// Opts into a post-conversation cleanup hook. Most mechanisms hold no
    /// resources worth releasing explicitly and can leave this as-is.
    fn as_cleanup(&mut self) -> Option<&mut dyn Cleanup> {
        None
    }
}

/// The server half of a SASL mechanism.
pub trait ServerMechanism: Send {
    /// The mechanism's registered name, available independent of state.
    fn name(&self) -> &'static str;

    /// Produces the first challenge. `initial_response` is the client's
    /// initial response if the transport carried one, or empty otherwise.
    fn start(&mut self, cancel: &CancellationToken, initial_response: &[u8]) -> Result<Vec<u8>>;

    /// Produces the next challenge given the client's latest response.
    fn next(&mut self, cancel: &CancellationToken, response: &[u8]) -> Result<Vec<u8>>;

    /// Whether the server side of the exchange is finished.
    fn completed(&self) -> bool;

    /// Opts into a post-conversation cleanup hook. Most mechanisms hold no
    /// resources worth releasing explicitly and can leave this as-is.
    fn as_cleanup(&mut self) -> Option<&mut dyn Cleanup> {
        None
    }
}

/// Optional hook for mechanisms that hold resources worth releasing
/// explicitly once a conversation ends (e.g. registries implement this to
/// call back into caller-provided cleanup after `auth` returns).
pub trait Cleanup {
    fn cleanup(&mut self);
}
