//! EXTERNAL (RFC 4422): credentials come from the transport (e.g. a TLS
//! client certificate); the payload only carries the authorization identity.

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::mechanism::{ClientMechanism, ServerMechanism};
use crate::verifier::{verifier_result_to_error, ExternalVerifier};

pub const NAME: &str = "EXTERNAL";

/// Client side of EXTERNAL: sends the authorization identity (possibly
/// empty, meaning "use whatever identity the transport already
/// authenticated"), then completes on the first challenge it sees.
pub struct ExternalClient {
    authzid: String,
    completed: bool,
}

impl ExternalClient {
    pub fn new(authzid: impl Into<String>) -> Self {
        ExternalClient {
            authzid: authzid.into(),
            completed: false,
        }
    }
}

impl ClientMechanism for ExternalClient {
    fn name(&self) -> &'static str {
        NAME
    }

    fn start(&mut self, _cancel: &CancellationToken) -> Result<Vec<u8>> {
        Ok(self.authzid.clone().into_bytes())
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

/// Server side of EXTERNAL: hands the authorization identity to a verifier,
/// which is expected to check it against whatever identity the transport
/// already established.
pub struct ExternalServer {
    verifier: Box<ExternalVerifier>,
    completed: bool,
}

impl ExternalServer {
    pub fn new(verifier: impl Fn(&str) -> crate::verifier::VerifierResult + Send + Sync + 'static) -> Self {
        ExternalServer {
            verifier: Box::new(verifier),
            completed: false,
        }
    }
}

impl ServerMechanism for ExternalServer {
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

impl ExternalServer {
    fn verify(&mut self, authzid: &[u8]) -> Result<Vec<u8>> {
        let authzid = String::from_utf8_lossy(authzid);
        verifier_result_to_error((self.verifier)(&authzid))?;
        self.completed = true;
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path() {
        let mut server = ExternalServer::new(|authzid| {
            if authzid == "jack" {
                Ok(())
            } else {
                Err("unknown identity".into())
            }
        });
        let cancel = CancellationToken::new();
        let challenge = server.start(&cancel, b"jack").unwrap();
        assert!(challenge.is_empty());
        assert!(server.completed());
    }

    #[test]
    fn waits_for_initial_response_over_the_channel_when_start_carries_none() {
        let mut server = ExternalServer::new(|authzid| {
            if authzid == "jack" {
                Ok(())
            } else {
                Err("unknown identity".into())
            }
        });
        let cancel = CancellationToken::new();
        let challenge = server.start(&cancel, b"").unwrap();
        assert!(challenge.is_empty());
        assert!(!server.completed());

        let challenge = server.next(&cancel, b"jack").unwrap();
        assert!(challenge.is_empty());
        assert!(server.completed());
    }
}
