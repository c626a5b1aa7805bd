use rand::rngs::OsRng;
use rand::RngCore;
use tokio_util::sync::CancellationToken;

use crate::crypto;
use crate::error::{Error, Result};
use crate::mechanism::ClientMechanism;
use crate::nonce::generate_nonce;

use super::message::{base64_decode, base64_encode, escape_username, expect_field, parse_u32, split_fields};
use super::{ScramClientOptions, NAME};

enum State {
    Init,
    SentFirst {
        client_first_bare: Vec<u8>,
    },
    SentFinal {
        server_signature: [u8; crypto::KEY_LENGTH],
    },
    Done,
}

/// Client side of SCRAM-SHA-1.
pub struct ScramClient {
    authzid: String,
    username: String,
    password: String,
    rng: Box<dyn RngCore + Send>,
    options: ScramClientOptions,
    state: State,
}

impl ScramClient {
    /// A client authenticating as itself, with no separate authorization
    /// identity.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::with_authzid("", username, password)
    }

    /// A client authenticating as `username` but requesting to act as
    /// `authzid` (RFC 4422 §2's authorization identity).
    pub fn with_authzid(
        authzid: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::with_options(authzid, username, password, ScramClientOptions::default())
    }

    pub fn with_options(
        authzid: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        options: ScramClientOptions,
    ) -> Self {
        ScramClient {
            authzid: authzid.into(),
            username: username.into(),
            password: password.into(),
            rng: Box::new(OsRng),
            options,
            state: State::Init,
        }
    }

    /// Testing/reproducibility hook: drive nonce generation from a
    /// caller-supplied deterministic source instead of the OS RNG.
    pub fn with_rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }
}

impl ClientMechanism for ScramClient {
    fn name(&self) -> &'static str {
        NAME
    }

    fn start(&mut self, _cancel: &CancellationToken) -> Result<Vec<u8>> {
        let client_nonce = generate_nonce(self.rng.as_mut(), self.options.nonce_length);
        let client_first_bare = format!("n={},r={}", escape_username(&self.username), client_nonce);
        let gs2_header = if self.authzid.is_empty() {
            "n,,".to_string()
        } else {
            format!("n,a={},", escape_username(&self.authzid))
        };
        let message = format!("{gs2_header}{client_first_bare}");

        self.state = State::SentFirst {
            client_first_bare: client_first_bare.into_bytes(),
        };
        Ok(message.into_bytes())
    }

    fn next(&mut self, _cancel: &CancellationToken, challenge: &[u8]) -> Result<Vec<u8>> {
        match std::mem::replace(&mut self.state, State::Done) {
            State::SentFirst { client_first_bare } => {
                let response = self.step1(&client_first_bare, challenge)?;
                Ok(response)
            }
            State::SentFinal { server_signature } => {
                self.step2(&server_signature, challenge)?;
                self.state = State::Done;
                Ok(Vec::new())
            }
            State::Init | State::Done => Err(Error::unexpected_challenge()),
        }
    }

    fn completed(&self) -> bool {
        matches!(self.state, State::Done)
    }
}

impl ScramClient {
    fn step1(&mut self, client_first_bare: &[u8], server_first: &[u8]) -> Result<Vec<u8>> {
        let fields = split_fields(server_first);
        if fields.len() < 3 {
            return Err(Error::invalid_challenge("server-first message is missing fields"));
        }
        let combined_nonce = expect_field(fields[0], "r=", true)?;
        let salt_field = expect_field(fields[1], "s=", true)?;
        let iter_field = expect_field(fields[2], "i=", true)?;

        let client_nonce = split_fields(client_first_bare)
            .into_iter()
            .find_map(|field| expect_field(field, "r=", true).ok())
            .ok_or_else(|| Error::invalid_challenge("missing client nonce in remembered client-first"))?;
        if !combined_nonce.starts_with(client_nonce) {
            return Err(Error::invalid_challenge("server nonce does not extend client nonce"));
        }

        let salt = base64_decode(salt_field, true)?;
        let iterations = parse_u32(iter_field, true)?;

        let salted_password = crypto::salted_password(self.password.as_bytes(), &salt, iterations)?;
        let client_key = crypto::hmac_sha1(&salted_password, b"Client Key");
        let stored_key = crypto::sha1(&client_key);
        let server_key = crypto::hmac_sha1(&salted_password, b"Server Key");

        let client_final_no_proof = format!("c=biws,r={}", String::from_utf8_lossy(combined_nonce));

        let mut auth_message = Vec::new();
        auth_message.extend_from_slice(client_first_bare);
        auth_message.push(b',');
        auth_message.extend_from_slice(server_first);
        auth_message.push(b',');
        auth_message.extend_from_slice(client_final_no_proof.as_bytes());

        let client_signature = crypto::hmac_sha1(&stored_key, &auth_message);
        let client_proof = crypto::xor(&client_key, &client_signature);
        let server_signature = crypto::hmac_sha1(&server_key, &auth_message);

        let client_final = format!(
            "{client_final_no_proof},p={}",
            base64_encode(&client_proof)
        );

        self.state = State::SentFinal { server_signature };
        Ok(client_final.into_bytes())
    }

    fn step2(&self, expected_signature: &[u8; crypto::KEY_LENGTH], server_final: &[u8]) -> Result<()> {
        let fields = split_fields(server_final);
        let first = fields
            .first()
            .ok_or_else(|| Error::invalid_challenge("server-final message is empty"))?;
        if first.starts_with(b"e=") {
            let reason = String::from_utf8_lossy(&first[2..]).into_owned();
            return Err(Error::verifier_rejected_message(reason));
        }
        let signature_field = expect_field(first, "v=", true)?;
        let signature = base64_decode(signature_field, true)?;
        if !crypto::constant_time_eq(&signature, expected_signature) {
            return Err(Error::invalid_challenge("server signature mismatch"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn step1_rejects_nonce_that_does_not_extend_client_nonce() {
        let mut client = ScramClient::new("jack", "password");
        let salt = base64_encode(b"salt");
        let server_first = format!("r=totallydifferentnonce,s={salt},i=4096");
        let err = client
            .step1(b"n=jack,r=clientnonce123", server_first.as_bytes())
            .unwrap_err();
        assert!(err.to_string().contains("server nonce does not extend client nonce"));
    }

    #[test]
    fn step1_rejects_invalid_base64_salt() {
        let mut client = ScramClient::new("jack", "password");
        let server_first = "r=clientnonce123servernonce,s=not-base64!!,i=4096";
        let err = client
            .step1(b"n=jack,r=clientnonce123", server_first.as_bytes())
            .unwrap_err();
        assert!(err.to_string().contains("invalid base64"));
    }

    #[test]
    fn step1_rejects_non_numeric_iteration_count() {
        let mut client = ScramClient::new("jack", "password");
        let salt = base64_encode(b"salt");
        let server_first = format!("r=clientnonce123servernonce,s={salt},i=lots");
        let err = client
            .step1(b"n=jack,r=clientnonce123", server_first.as_bytes())
            .unwrap_err();
        assert!(err.to_string().contains("invalid iteration count"));
    }

    #[test]
    fn step1_derives_a_client_final_message_on_success() {
        let mut client = ScramClient::new("jack", "password");
        let salt = base64_encode(b"salt");
        let server_first = format!("r=clientnonce123servernonce,s={salt},i=4096");
        let client_final = client
            .step1(b"n=jack,r=clientnonce123", server_first.as_bytes())
            .unwrap();
        let message = String::from_utf8(client_final).unwrap();
        assert!(message.starts_with("c=biws,r=clientnonce123servernonce,p="));
        assert!(matches!(client.state, State::SentFinal { .. }));
    }

    #[test]
    fn step2_rejects_mismatched_server_signature() {
        let client = ScramClient::new("jack", "password");
        let expected = [1u8; crypto::KEY_LENGTH];
        let wrong = base64_encode(&[2u8; crypto::KEY_LENGTH]);
        let err = client.step2(&expected, format!("v={wrong}").as_bytes()).unwrap_err();
        assert!(err.to_string().contains("server signature mismatch"));
    }

    #[test]
    fn step2_surfaces_peer_rejection_frame() {
        let client = ScramClient::new("jack", "password");
        let expected = [0u8; crypto::KEY_LENGTH];
        let err = client.step2(&expected, b"e=other-error").unwrap_err();
        assert!(err.to_string().contains("other-error"));
    }

    #[test]
    fn client_with_authzid_embeds_it_in_the_gs2_header() {
        let mut client =
            ScramClient::with_authzid("jane", "jack", "password").with_rng(StdRng::seed_from_u64(1));
        let cancel = CancellationToken::new();
        let message = String::from_utf8(client.start(&cancel).unwrap()).unwrap();
        assert!(message.starts_with("n,a=jane,n=jack,r="));
    }
}
