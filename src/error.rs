use std::fmt;

/// Result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// An error produced by a mechanism, the conversation driver, or a registry lookup.
///
/// Formats as `msg` or `msg: cause.msg`, matching the historical single-line
/// format callers have come to depend on for logs and test assertions.
#[derive(Debug)]
pub struct Error {
    kind: Box<ErrorKind>,
    /// A frame the mechanism still wants the peer to see even though the
    /// exchange is failing, e.g. SCRAM's `e=other-error`.
    final_payload: Option<Vec<u8>>,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind) -> Self {
        Error {
            kind: Box::new(kind),
            final_payload: None,
        }
    }

    pub(crate) fn with_final_payload(mut self, payload: Vec<u8>) -> Self {
        self.final_payload = Some(payload);
        self
    }

    /// A diagnostic frame the mechanism produced alongside this error, which
    /// the driver should still try to deliver to the peer before aborting.
    pub fn final_payload(&self) -> Option<&[u8]> {
        self.final_payload.as_deref()
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub(crate) fn unexpected_challenge() -> Self {
        Error::new(ErrorKind::UnexpectedChallenge)
    }

    pub(crate) fn unexpected_response() -> Self {
        Error::new(ErrorKind::UnexpectedResponse)
    }

    pub(crate) fn invalid_challenge(detail: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidChallenge {
            detail: detail.into(),
        })
    }

    pub(crate) fn invalid_response(detail: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidResponse {
            detail: detail.into(),
        })
    }

    pub(crate) fn verifier_rejected(source: BoxError) -> Self {
        Error::new(ErrorKind::VerifierRejected { source })
    }

    /// Builds a `VerifierRejected` error from a plain message, used when the
    /// rejection originates from a peer-sent protocol frame (e.g. SCRAM's
    /// `e=` field) rather than from invoking a local verifier callback.
    pub(crate) fn verifier_rejected_message(reason: impl Into<String>) -> Self {
        Error::verifier_rejected(reason.into().into())
    }

    pub(crate) fn cancelled() -> Self {
        Error::new(ErrorKind::Cancelled)
    }

    pub(crate) fn mechanism_not_registered(name: impl Into<String>) -> Self {
        Error::new(ErrorKind::MechanismNotRegistered { name: name.into() })
    }

    pub(crate) fn crypto(detail: impl Into<String>) -> Self {
        Error::new(ErrorKind::Crypto {
            detail: detail.into(),
        })
    }

    /// Wraps `cause` with driver-level context, producing the
    /// `sasl mechanism <NAME>: <stage>: <cause>` message the conversation
    /// driver reports for I/O and lifecycle failures.
    pub(crate) fn stage(mechanism: &'static str, stage: &'static str, cause: Error) -> Self {
        let final_payload = cause.final_payload.clone();
        let mut err = Error::new(ErrorKind::Stage {
            mechanism,
            stage,
            source: Box::new(cause),
        });
        if let Some(payload) = final_payload {
            err = err.with_final_payload(payload);
        }
        err
    }

    /// Renders the full `msg: cause.msg` chain as a single line, matching the
    /// format pinned by integration tests.
    pub fn chain_message(&self) -> String {
        let mut parts = Vec::new();
        let mut current: &dyn std::error::Error = self;
        parts.push(current.to_string());
        while let Some(source) = current.source() {
            parts.push(source.to_string());
            current = source;
        }
        parts.join(": ")
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.kind, f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&*self.kind)
    }
}

/// The stable set of conditions this crate can raise.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error("unexpected challenge: mechanism already completed")]
    UnexpectedChallenge,

    #[error("unexpected response: mechanism already completed")]
    UnexpectedResponse,

    #[error("invalid challenge: {detail}")]
    InvalidChallenge { detail: String },

    #[error("invalid response: {detail}")]
    InvalidResponse { detail: String },

    #[error("verifier rejected credentials")]
    VerifierRejected {
        #[source]
        source: BoxError,
    },

    #[error("cancelled")]
    Cancelled,

    #[error("mechanism not registered: {name}")]
    MechanismNotRegistered { name: String },

    #[error("crypto failure: {detail}")]
    Crypto { detail: String },

    #[error("sasl mechanism {mechanism}: {stage}")]
    Stage {
        mechanism: &'static str,
        stage: &'static str,
        #[source]
        source: Box<Error>,
    },
}
