//! SCRAM-SHA-1 (RFC 5802).

mod client;
mod message;
mod server;

pub use client::ScramClient;
pub use server::{ScramServer, StoredUser, StoredUserProvider};

pub const NAME: &str = "SCRAM-SHA-1";

/// Construction-time options for a SCRAM client.
#[derive(Debug, Clone, Copy)]
pub struct ScramClientOptions {
    pub nonce_length: usize,
}

impl Default for ScramClientOptions {
    fn default() -> Self {
        ScramClientOptions { nonce_length: 24 }
    }
}

impl ScramClientOptions {
    pub fn new(nonce_length: usize) -> crate::error::Result<Self> {
        if nonce_length == 0 {
            return Err(crate::error::Error::crypto("nonce_length must be nonzero"));
        }
        Ok(ScramClientOptions { nonce_length })
    }
}

/// Construction-time options for a SCRAM server.
#[derive(Debug, Clone, Copy)]
pub struct ScramServerOptions {
    pub nonce_length: usize,
    pub min_iterations: u32,
}

impl Default for ScramServerOptions {
    fn default() -> Self {
        ScramServerOptions {
            nonce_length: 24,
            min_iterations: 4096,
        }
    }
}

impl ScramServerOptions {
    pub fn new(nonce_length: usize, min_iterations: u32) -> crate::error::Result<Self> {
        if nonce_length == 0 {
            return Err(crate::error::Error::crypto("nonce_length must be nonzero"));
        }
        Ok(ScramServerOptions {
            nonce_length,
            min_iterations,
        })
    }
}
