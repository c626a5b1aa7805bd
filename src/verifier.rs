//! Verifier callback shapes shared by the single-round mechanisms.

use crate::error::{Error, Result};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The result a verifier returns: `Ok(())` to accept, or any error to
/// reject. Converted into an `Error::VerifierRejected` by the mechanism that
/// invoked it.
pub type VerifierResult = std::result::Result<(), BoxError>;

pub(crate) fn verifier_result_to_error(result: VerifierResult) -> Result<()> {
    result.map_err(Error::verifier_rejected)
}

/// Accepts or rejects an ANONYMOUS trace token.
pub type AnonymousVerifier = dyn Fn(&str) -> VerifierResult + Send + Sync;

/// Accepts or rejects an EXTERNAL authorization identity.
pub type ExternalVerifier = dyn Fn(&str) -> VerifierResult + Send + Sync;

/// Accepts or rejects a full PLAIN `(authzid, username, password)` triple.
pub type CombinedPlainVerifier = dyn Fn(&str, &str, &str) -> VerifierResult + Send + Sync;

/// Accepts or rejects a PLAIN `(username, password)` pair.
pub type UserPassVerifier = dyn Fn(&str, &str) -> VerifierResult + Send + Sync;

/// Accepts or rejects an authzid once the user/pass pair has already been
/// accepted.
pub type AuthzVerifier = dyn Fn(&str) -> VerifierResult + Send + Sync;

/// The two verifier shapes a PLAIN server may be configured with: a single
/// callback over the whole triple, or a pair evaluated in order (user/pass
/// first, authzid only if that succeeds).
pub enum PlainVerifierKind {
    Combined(Box<CombinedPlainVerifier>),
    Split {
        user_pass: Box<UserPassVerifier>,
        authz: Box<AuthzVerifier>,
    },
}

impl PlainVerifierKind {
    pub fn combined(f: impl Fn(&str, &str, &str) -> VerifierResult + Send + Sync + 'static) -> Self {
        PlainVerifierKind::Combined(Box::new(f))
    }

    pub fn split(
        user_pass: impl Fn(&str, &str) -> VerifierResult + Send + Sync + 'static,
        authz: impl Fn(&str) -> VerifierResult + Send + Sync + 'static,
    ) -> Self {
        PlainVerifierKind::Split {
            user_pass: Box::new(user_pass),
            authz: Box::new(authz),
        }
    }

    pub(crate) fn verify(&self, authzid: &str, username: &str, password: &str) -> Result<()> {
        match self {
            PlainVerifierKind::Combined(f) => verifier_result_to_error(f(authzid, username, password)),
            PlainVerifierKind::Split { user_pass, authz } => {
                verifier_result_to_error(user_pass(username, password))?;
                if !authzid.is_empty() {
                    verifier_result_to_error(authz(authzid))?;
                }
                Ok(())
            }
        }
    }
}
