//! Transport-agnostic byte conduits used by the conversation driver.

use std::sync::mpsc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Polling cadence used while waiting on the rendezvous channel for
/// cancellation to become observable. Short enough that cancellation feels
/// immediate, long enough not to spin.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// The sending half of a message conduit.
pub trait Outgoing: Send {
    fn send(&self, cancel: &CancellationToken, payload: Vec<u8>) -> Result<()>;
}

/// The receiving half of a message conduit.
pub trait Incoming: Send {
    fn recv(&self, cancel: &CancellationToken) -> Result<Vec<u8>>;
}

/// A single-slot bounded channel: `send` blocks only while the one buffered
/// slot is occupied, never waiting on a concurrent `recv` the way a true
/// zero-capacity rendezvous would. Built on `std::sync::mpsc::sync_channel(1)`,
/// polled against a `CancellationToken` so neither side can block forever
/// past a cancellation.
///
/// The one-slot buffer matters: both driver loops send their first message
/// (an initial response, or an empty "go ahead" challenge) before receiving
/// anything, so a zero-capacity channel run in both directions at once would
/// deadlock before either side reached its first `recv`.
pub struct RendezvousOutgoing {
    tx: mpsc::SyncSender<Vec<u8>>,
}

pub struct RendezvousIncoming {
    rx: mpsc::Receiver<Vec<u8>>,
}

/// Builds one direction of a single-slot conduit.
pub fn rendezvous_pair() -> (RendezvousOutgoing, RendezvousIncoming) {
    let (tx, rx) = mpsc::sync_channel(1);
    (RendezvousOutgoing { tx }, RendezvousIncoming { rx })
}

impl Outgoing for RendezvousOutgoing {
    fn send(&self, cancel: &CancellationToken, payload: Vec<u8>) -> Result<()> {
        let mut payload = Some(payload);
        loop {
            if cancel.is_cancelled() {
                return Err(Error::cancelled());
            }
            match self.tx.try_send(payload.take().unwrap()) {
                Ok(()) => return Ok(()),
                Err(mpsc::TrySendError::Full(p)) => {
                    payload = Some(p);
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(mpsc::TrySendError::Disconnected(_)) => {
                    return Err(Error::cancelled());
                }
            }
        }
    }
}

impl Incoming for RendezvousIncoming {
    fn recv(&self, cancel: &CancellationToken) -> Result<Vec<u8>> {
        loop {
            if cancel.is_cancelled() {
                return Err(Error::cancelled());
            }
            match self.rx.recv_timeout(POLL_INTERVAL) {
                Ok(payload) => return Ok(payload),
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => return Err(Error::cancelled()),
            }
        }
    }
}

/// Builds both halves of a two-way conduit: what the client sends the server
/// receives, and what the server sends the client receives.
pub fn duplex() -> (
    (RendezvousOutgoing, RendezvousIncoming),
    (RendezvousOutgoing, RendezvousIncoming),
) {
    let (client_to_server_tx, client_to_server_rx) = rendezvous_pair();
    let (server_to_client_tx, server_to_client_rx) = rendezvous_pair();
    (
        (client_to_server_tx, server_to_client_rx),
        (server_to_client_tx, client_to_server_rx),
    )
}
