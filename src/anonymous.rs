//! ANONYMOUS (RFC 4505): the client sends a trace token with no credentials.

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::mechanism::{ClientMechanism, ServerMechanism};
use crate::verifier::{verifier_result_to_error, AnonymousVerifier};

pub const NAME: &str = "ANONYMOUS";

/// Client side of ANONYMOUS: sends a fixed trace token (typically an email
/// address or opaque identifier), then completes on the first challenge it
/// sees (the server's empty confirmation frame).
pub struct AnonymousClient {
    trace: String,
    completed: bool,
}

impl AnonymousClient {
    pub fn new(trace: impl Into<String>) -> Self {
        AnonymousClient {
            trace: trace.into(),
            completed: false,
        }
    }
}

impl ClientMechanism for AnonymousClient {
    fn name(&self) -> &'static str {
        NAME
    }

    fn start(&mut self, _cancel: &CancellationToken) -> Result<Vec<u8>> {
        Ok(self.trace.clone().into_bytes())
    }

    fn next(&mut self, _cancel: &CancellationToken, _challenge: &[u8]) -> Result<Vec<u8>> {
        if self.completed {
            return Err(crate::error::Error::unexpected_challenge());
        }
        self.completed = true;
        Ok(Vec::new())
    }

    fn completed(&self) -> bool {
        self.completed
    }
}

/// Server side of ANONYMOUS: hands the trace token to a verifier and, on
/// acceptance, completes with an empty challenge.
pub struct AnonymousServer {
    verifier: Box<AnonymousVerifier>,
    completed: bool,
}

impl AnonymousServer {
    pub fn new(verifier: impl Fn(&str) -> crate::verifier::VerifierResult + Send + Sync + 'static) -> Self {
        AnonymousServer {
            verifier: Box::new(verifier),
            completed: false,
        }
    }
}

impl ServerMechanism for AnonymousServer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn start(&mut self, _cancel: &CancellationToken, initial_response: &[u8]) -> Result<Vec<u8>> {
        if initial_response.is_empty() {
            return Ok(Vec::new());
        }
        self.verify(initial_response)
    }

    fn next(&mut self, _cancel: &CancellationToken, response: &[u8]) -> Result<Vec<u8>> {
        if self.completed {
            return Err(crate::error::Error::unexpected_response());
        }
        self.verify(response)
    }

    fn completed(&self) -> bool {
        self.completed
    }
}

impl AnonymousServer {
    fn verify(&mut self, trace: &[u8]) -> Result<Vec<u8>> {
        let trace = String::from_utf8_lossy(trace);
        verifier_result_to_error((self.verifier)(&trace))?;
        self.completed = true;
        Ok(Vec::new())
    }
}
