use rand::rngs::OsRng;
use rand::RngCore;
use tokio_util::sync::CancellationToken;

use crate::crypto;
use crate::error::{Error, Result};
use crate::mechanism::ServerMechanism;
use crate::nonce::generate_nonce;

use super::message::{
    base64_decode, base64_encode, expect_field, split_fields, unescape_username,
};
use super::{ScramServerOptions, NAME};

/// The server's view of a user's SCRAM-SHA-1 credential. Never holds the
/// password itself.
#[derive(Clone)]
pub struct StoredUser {
    pub salt: Vec<u8>,
    pub iterations: u32,
    pub stored_key: [u8; crypto::KEY_LENGTH],
    pub server_key: [u8; crypto::KEY_LENGTH],
}

impl StoredUser {
    /// Derives a `StoredUser` from a plaintext password, for use by test
    /// fixtures and simple embedders that don't maintain their own
    /// pre-salted credential store.
    pub fn derive(password: &str, salt: Vec<u8>, iterations: u32) -> Result<Self> {
        let salted_password = crypto::salted_password(password.as_bytes(), &salt, iterations)?;
        let client_key = crypto::hmac_sha1(&salted_password, b"Client Key");
        let stored_key = crypto::sha1(&client_key);
        let server_key = crypto::hmac_sha1(&salted_password, b"Server Key");
        Ok(StoredUser {
            salt,
            iterations,
            stored_key,
            server_key,
        })
    }
}

/// Looks up a user's stored SCRAM credential, e.g. from a database. Errors
/// are wrapped with the username for context.
pub type StoredUserProvider =
    dyn Fn(&str) -> std::result::Result<StoredUser, Box<dyn std::error::Error + Send + Sync>> + Send + Sync;

enum State {
    Init,
    SentFirst {
        username: String,
        authzid: String,
        client_first_bare: Vec<u8>,
        server_first: Vec<u8>,
        combined_nonce: String,
        stored_user: StoredUser,
    },
    Done,
}

/// Server side of SCRAM-SHA-1.
pub struct ScramServer {
    provider: Box<StoredUserProvider>,
    rng: Box<dyn RngCore + Send>,
    options: ScramServerOptions,
    state: State,
}

impl ScramServer {
    pub fn new(
        provider: impl Fn(&str) -> std::result::Result<StoredUser, Box<dyn std::error::Error + Send + Sync>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self::with_options(provider, ScramServerOptions::default())
    }

    pub fn with_options(
        provider: impl Fn(&str) -> std::result::Result<StoredUser, Box<dyn std::error::Error + Send + Sync>>
            + Send
            + Sync
            + 'static,
        options: ScramServerOptions,
    ) -> Self {
        ScramServer {
            provider: Box::new(provider),
            rng: Box::new(OsRng),
            options,
            state: State::Init,
        }
    }

    pub fn with_rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }
}

impl ServerMechanism for ScramServer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn start(&mut self, _cancel: &CancellationToken, initial_response: &[u8]) -> Result<Vec<u8>> {
        if initial_response.is_empty() {
            return Ok(Vec::new());
        }
        self.step1(initial_response)
    }

    fn next(&mut self, _cancel: &CancellationToken, response: &[u8]) -> Result<Vec<u8>> {
        match &self.state {
            State::Init => self.step1(response),
            State::SentFirst { .. } => self.step2(response),
            State::Done => Err(Error::unexpected_response()),
        }
    }

    fn completed(&self) -> bool {
        matches!(self.state, State::Done)
    }
}

/// Literal frame the server returns whenever step 2 fails structurally, per
/// the coarser-than-internal-taxonomy wire contract: the peer only ever
/// learns that something went wrong, never which check failed.
const OTHER_ERROR_FRAME: &[u8] = b"e=other-error";

impl ScramServer {
    fn step1(&mut self, client_first: &[u8]) -> Result<Vec<u8>> {
        let fields = split_fields(client_first);
        if fields.len() < 4 {
            return Err(Error::invalid_response("client-first message is missing fields"));
        }
        let gs2_flag = fields[0];
        if gs2_flag != b"n" && gs2_flag != b"y" {
            return Err(Error::invalid_response(
                "channel binding is not supported by this mechanism",
            ));
        }
        // The gs2-header always reserves a second field for the authzid
        // (`n,,` when absent, `n,a=foo,` when present), so the username and
        // nonce always sit at indices 2 and 3 regardless of which case this is.
        let authzid_field = fields[1].starts_with(b"a=").then_some(fields[1]);
        let username_field =
            fields.get(2).ok_or_else(|| Error::invalid_response("missing username field"))?;
        let nonce_field =
            fields.get(3).ok_or_else(|| Error::invalid_response("missing nonce field"))?;

        let username_escaped = expect_field(username_field, "n=", false)?;
        let username = unescape_username(&String::from_utf8_lossy(username_escaped));
        let client_nonce = expect_field(nonce_field, "r=", false)?;
        let authzid = authzid_field
            .map(|f| expect_field(f, "a=", false).map(|a| unescape_username(&String::from_utf8_lossy(a))))
            .transpose()?
            .unwrap_or_default();

        let client_first_bare = {
            let mut v = Vec::new();
            v.extend_from_slice(username_field);
            v.push(b',');
            v.extend_from_slice(nonce_field);
            v
        };

        let server_nonce = generate_nonce(self.rng.as_mut(), self.options.nonce_length);
        let combined_nonce = format!("{}{}", String::from_utf8_lossy(client_nonce), server_nonce);

        let stored_user = (self.provider)(&username).map_err(|e| {
            Error::invalid_response(format!(
                "could not get salt and iteration count for user '{username}': {e}"
            ))
        })?;

        if stored_user.iterations < self.options.min_iterations {
            tracing::warn!(
                username,
                iterations = stored_user.iterations,
                min_iterations = self.options.min_iterations,
                "stored credential uses fewer PBKDF2 iterations than the configured minimum"
            );
        }

        let server_first = format!(
            "r={},s={},i={}",
            combined_nonce,
            base64_encode(&stored_user.salt),
            stored_user.iterations
        )
        .into_bytes();

        let result = server_first.clone();
        self.state = State::SentFirst {
            username,
            authzid,
            client_first_bare,
            server_first,
            combined_nonce,
            stored_user,
        };
        Ok(result)
    }

    fn step2(&mut self, client_final: &[u8]) -> Result<Vec<u8>> {
        match self.fallible_step2(client_final) {
            Ok(response) => Ok(response),
            Err(e) => Err(e.with_final_payload(OTHER_ERROR_FRAME.to_vec())),
        }
    }

    fn fallible_step2(&mut self, client_final: &[u8]) -> Result<Vec<u8>> {
        let State::SentFirst {
            client_first_bare,
            server_first,
            combined_nonce,
            stored_user,
            ..
        } = std::mem::replace(&mut self.state, State::Done)
        else {
            return Err(Error::unexpected_response());
        };

        let fields = split_fields(client_final);
        if fields.len() < 2 {
            return Err(Error::invalid_response("client-final message is missing fields"));
        }
        let channel_binding = expect_field(fields[0], "c=", false)?;
        if channel_binding != b"biws" {
            return Err(Error::invalid_response("unsupported channel binding"));
        }
        let returned_nonce = expect_field(fields[1], "r=", false)?;
        if returned_nonce != combined_nonce.as_bytes() {
            return Err(Error::invalid_response("nonce mismatch"));
        }

        let proof_field = fields[2..]
            .iter()
            .find_map(|f| expect_field(f, "p=", false).ok())
            .ok_or_else(|| Error::invalid_response("missing proof field"))?;
        let proof = base64_decode(proof_field, false)?;
        if proof.len() != crypto::KEY_LENGTH {
            return Err(Error::invalid_response("proof has the wrong length"));
        }
        let mut proof_fixed = [0u8; crypto::KEY_LENGTH];
        proof_fixed.copy_from_slice(&proof);

        let client_final_no_proof_end = client_final
            .len()
            .saturating_sub(proof_field.len() + b",p=".len());
        let client_final_no_proof = &client_final[..client_final_no_proof_end];

        let mut auth_message = Vec::new();
        auth_message.extend_from_slice(&client_first_bare);
        auth_message.push(b',');
        auth_message.extend_from_slice(&server_first);
        auth_message.push(b',');
        auth_message.extend_from_slice(client_final_no_proof);

        let client_signature = crypto::hmac_sha1(&stored_user.stored_key, &auth_message);
        let candidate_client_key = crypto::xor(&proof_fixed, &client_signature);
        let candidate_stored_key = crypto::sha1(&candidate_client_key);

        if !crypto::constant_time_eq(&candidate_stored_key, &stored_user.stored_key) {
            return Err(Error::invalid_response("client key mismatch"));
        }

        let server_signature = crypto::hmac_sha1(&stored_user.server_key, &auth_message);
        let response = format!("v={}", base64_encode(&server_signature)).into_bytes();
        self.state = State::Done;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(
        user: &'static str,
        stored: StoredUser,
    ) -> impl Fn(&str) -> std::result::Result<StoredUser, Box<dyn std::error::Error + Send + Sync>> {
        move |u| {
            if u == user {
                Ok(stored.clone())
            } else {
                Err("no such user".into())
            }
        }
    }

    #[test]
    fn step1_rejects_unsupported_channel_binding() {
        let stored = StoredUser::derive("password", b"salt".to_vec(), 4096).unwrap();
        let mut server = ScramServer::new(provider("jack", stored));
        let err = server.step1(b"p,,n=jack,r=clientnonce").unwrap_err();
        assert!(err.to_string().contains("channel binding"));
    }

    #[test]
    fn step1_extracts_username_and_nonce_regardless_of_authzid() {
        let stored = StoredUser::derive("password", b"salt".to_vec(), 4096).unwrap();
        let mut server = ScramServer::new(provider("jack", stored));
        let server_first = server.step1(b"n,,n=jack,r=clientnonce").unwrap();
        let message = String::from_utf8(server_first).unwrap();
        assert!(message.starts_with("r=clientnonce"));

        let stored2 = StoredUser::derive("password", b"salt".to_vec(), 4096).unwrap();
        let mut server2 = ScramServer::new(provider("jack", stored2));
        let server_first2 = server2.step1(b"n,a=jane,n=jack,r=clientnonce").unwrap();
        let message2 = String::from_utf8(server_first2).unwrap();
        assert!(message2.starts_with("r=clientnonce"));
    }

    fn server_in_sent_first(iterations: u32) -> (ScramServer, String) {
        let stored = StoredUser::derive("password", b"salt".to_vec(), iterations).unwrap();
        let mut server = ScramServer::new(provider("jack", stored));
        let server_first = server.step1(b"n,,n=jack,r=clientnonce").unwrap();
        let combined_nonce = String::from_utf8(server_first)
            .unwrap()
            .split(',')
            .next()
            .unwrap()
            .trim_start_matches("r=")
            .to_string();
        (server, combined_nonce)
    }

    #[test]
    fn step2_rejects_nonce_mismatch() {
        let (mut server, _combined_nonce) = server_in_sent_first(4096);
        let err = server.step2(b"c=biws,r=somethingelse,p=AAAA").unwrap_err();
        assert!(err.to_string().contains("nonce mismatch"));
        assert_eq!(err.final_payload(), Some(b"e=other-error".as_slice()));
    }

    #[test]
    fn step2_rejects_missing_proof_field() {
        let (mut server, combined_nonce) = server_in_sent_first(4096);
        let client_final = format!("c=biws,r={combined_nonce}");
        let err = server.step2(client_final.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("missing proof field"));
    }

    #[test]
    fn step2_rejects_wrong_proof_length() {
        let (mut server, combined_nonce) = server_in_sent_first(4096);
        let short_proof = base64_encode(b"tooshort");
        let client_final = format!("c=biws,r={combined_nonce},p={short_proof}");
        let err = server.step2(client_final.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("wrong length"));
    }

    #[test]
    fn step2_rejects_client_key_mismatch() {
        let (mut server, combined_nonce) = server_in_sent_first(4096);
        let bogus_proof = base64_encode(&[0u8; crypto::KEY_LENGTH]);
        let client_final = format!("c=biws,r={combined_nonce},p={bogus_proof}");
        let err = server.step2(client_final.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("client key mismatch"));
    }
}
