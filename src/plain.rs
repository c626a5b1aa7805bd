//! PLAIN (RFC 4616): `authzid NUL username NUL password` in a single frame.

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::mechanism::{ClientMechanism, ServerMechanism};
use crate::verifier::PlainVerifierKind;

pub const NAME: &str = "PLAIN";

/// Client side of PLAIN.
pub struct PlainClient {
    authzid: String,
    username: String,
    password: String,
    completed: bool,
}

impl PlainClient {
    pub fn new(authzid: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        PlainClient {
            authzid: authzid.into(),
            username: username.into(),
            password: password.into(),
            completed: false,
        }
    }
}

impl ClientMechanism for PlainClient {
    fn name(&self) -> &'static str {
        NAME
    }

    fn start(&mut self, _cancel: &CancellationToken) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.extend_from_slice(self.authzid.as_bytes());
        out.push(0);
        out.extend_from_slice(self.username.as_bytes());
        out.push(0);
        out.extend_from_slice(self.password.as_bytes());
        Ok(out)
    }

    fn next(&mut self, _cancel: &CancellationToken, _challenge: &[u8]) -> Result<Vec<u8>> {
        if self.completed {
            return Err(Error::unexpected_challenge());
        }
        self.completed = true;
        Ok(Vec::new())
    }

    fn completed(&self) -> bool {
        self.completed
    }
}

/// Server side of PLAIN.
pub struct PlainServer {
    verifier: PlainVerifierKind,
    completed: bool,
}

impl PlainServer {
    pub fn new(verifier: PlainVerifierKind) -> Self {
        PlainServer {
            verifier,
            completed: false,
        }
    }

    fn handle(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        let fields: Vec<&[u8]> = payload.split(|&b| b == 0).collect();
        if fields.len() != 3 {
            return Err(Error::invalid_response(format!(
                "expected 3 NUL-separated fields, got {}",
                fields.len()
            )));
        }
        let authzid = String::from_utf8(fields[0].to_vec())
            .map_err(|_| Error::invalid_response("authzid is not valid UTF-8"))?;
        let username = String::from_utf8(fields[1].to_vec())
            .map_err(|_| Error::invalid_response("username is not valid UTF-8"))?;
        let password = String::from_utf8(fields[2].to_vec())
            .map_err(|_| Error::invalid_response("password is not valid UTF-8"))?;

        self.verifier.verify(&authzid, &username, &password)?;
        self.completed = true;
        Ok(Vec::new())
    }
}

impl ServerMechanism for PlainServer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn start(&mut self, _cancel: &CancellationToken, initial_response: &[u8]) -> Result<Vec<u8>> {
        if initial_response.is_empty() {
            return Ok(Vec::new());
        }
        self.handle(initial_response)
    }

    fn next(&mut self, _cancel: &CancellationToken, response: &[u8]) -> Result<Vec<u8>> {
        if self.completed {
            return Err(Error::unexpected_response());
        }
        self.handle(response)
    }

    fn completed(&self) -> bool {
        self.completed
    }
}
