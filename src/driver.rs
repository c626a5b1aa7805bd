//! Drives a mechanism to completion over abstract byte channels.

use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::channel::{Incoming, Outgoing};
use crate::error::{Error, Result};
use crate::mechanism::{ClientMechanism, ServerMechanism};

/// Drives the client side of a SASL exchange: calls `mech.start`, then
/// alternates sending responses and receiving challenges until the
/// mechanism reports completion.
///
/// Completion is checked *after* processing a challenge, since the client's
/// final output was already sent earlier in the same iteration.
pub fn converse_as_client(
    mech: &mut dyn ClientMechanism,
    incoming: &dyn Incoming,
    outgoing: &dyn Outgoing,
    cancel: &CancellationToken,
) -> Result<()> {
    let name = mech.name();
    let span = tracing::debug_span!("sasl_conversation", mechanism = name, role = "client");
    let _guard = span.enter();

    let mut response = mech
        .start(cancel)
        .map_err(|e| Error::stage(name, "unable to start exchange", e))?;
    trace!(bytes = response.len(), "client produced initial response");

    loop {
        outgoing
            .send(cancel, response)
            .map_err(|e| Error::stage(name, "failed to send response", e))?;

        let challenge = incoming
            .recv(cancel)
            .map_err(|e| Error::stage(name, "failed to receive challenge", e))?;
        trace!(bytes = challenge.len(), "client received challenge");

        match mech.next(cancel, &challenge) {
            Ok(next_response) => response = next_response,
            Err(e) => {
                let final_payload = e.final_payload().map(|p| p.to_vec());
                let err = Error::stage(name, "client failed to provide response", e);
                if let Some(payload) = final_payload {
                    let _ = outgoing.send(cancel, payload);
                }
                return Err(err);
            }
        }

        if mech.completed() {
            return Ok(());
        }
    }
}

/// Drives the server side of a SASL exchange: calls `mech.start` with the
/// transport-carried initial response (possibly empty), then alternates
/// sending challenges and receiving responses until the mechanism reports
/// completion.
///
/// Completion is checked *after* sending a challenge, so a mechanism's final
/// outgoing frame (e.g. SCRAM's `v=...`) is always delivered before success
/// is reported.
pub fn converse_as_server(
    mech: &mut dyn ServerMechanism,
    initial_response: &[u8],
    incoming: &dyn Incoming,
    outgoing: &dyn Outgoing,
    cancel: &CancellationToken,
) -> Result<()> {
    let name = mech.name();
    let span = tracing::debug_span!("sasl_conversation", mechanism = name, role = "server");
    let _guard = span.enter();

    let mut challenge = match mech.start(cancel, initial_response) {
        Ok(challenge) => challenge,
        Err(e) => {
            let final_payload = e.final_payload().map(|p| p.to_vec());
            let err = Error::stage(name, "unable to start exchange", e);
            if let Some(payload) = final_payload {
                let _ = outgoing.send(cancel, payload);
            }
            return Err(err);
        }
    };
    trace!(bytes = challenge.len(), "server produced initial challenge");

    loop {
        outgoing
            .send(cancel, challenge)
            .map_err(|e| Error::stage(name, "failed to send challenge", e))?;

        if mech.completed() {
            return Ok(());
        }

        let response = incoming
            .recv(cancel)
            .map_err(|e| Error::stage(name, "failed to receive response", e))?;
        trace!(bytes = response.len(), "server received response");

        match mech.next(cancel, &response) {
            Ok(next_challenge) => challenge = next_challenge,
            Err(e) => {
                let final_payload = e.final_payload().map(|p| p.to_vec());
                let err = Error::stage(name, "server failed to provide challenge", e);
                if let Some(payload) = final_payload {
                    let _ = outgoing.send(cancel, payload);
                }
                return Err(err);
            }
        }
    }
}
