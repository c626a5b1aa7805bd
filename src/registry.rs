//! Name-based dispatch to mechanism factories, for both roles.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;

use crate::channel::{Incoming, Outgoing};
use crate::driver::{converse_as_client, converse_as_server};
use crate::error::{Error, Result};
use crate::mechanism::{Cleanup as _, ClientMechanism, ServerMechanism};

type ClientFactory<S> = Box<dyn Fn(&S) -> Box<dyn ClientMechanism> + Send + Sync>;
type ServerFactory<S> = Box<dyn Fn(&S) -> Box<dyn ServerMechanism> + Send + Sync>;

/// Maps mechanism names to client-mechanism factories, parameterized over
/// whatever state (credentials, options) the caller's factories need.
pub struct ClientRegistry<S> {
    factories: HashMap<&'static str, ClientFactory<S>>,
}

impl<S> Default for ClientRegistry<S> {
    fn default() -> Self {
        ClientRegistry {
            factories: HashMap::new(),
        }
    }
}

impl<S> ClientRegistry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: &'static str,
        factory: impl Fn(&S) -> Box<dyn ClientMechanism> + Send + Sync + 'static,
    ) {
        self.factories.insert(name, Box::new(factory));
    }

    /// Instantiates the named mechanism and drives it to completion as the
    /// client.
    pub fn auth(
        &self,
        state: &S,
        name: &str,
        incoming: &dyn Incoming,
        outgoing: &dyn Outgoing,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::mechanism_not_registered(name))?;
        let mut mech = factory(state);
        let result = converse_as_client(mech.as_mut(), incoming, outgoing, cancel);
        if let Some(cleanup) = mech.as_cleanup() {
            cleanup.cleanup();
        }
        result
    }
}

/// Maps mechanism names to server-mechanism factories.
pub struct ServerRegistry<S> {
    factories: HashMap<&'static str, ServerFactory<S>>,
}

impl<S> Default for ServerRegistry<S> {
    fn default() -> Self {
        ServerRegistry {
            factories: HashMap::new(),
        }
    }
}

impl<S> ServerRegistry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: &'static str,
        factory: impl Fn(&S) -> Box<dyn ServerMechanism> + Send + Sync + 'static,
    ) {
        self.factories.insert(name, Box::new(factory));
    }

    /// Instantiates the named mechanism and drives it to completion as the
    /// server.
    pub fn auth(
        &self,
        state: &S,
        name: &str,
        initial_response: &[u8],
        incoming: &dyn Incoming,
        outgoing: &dyn Outgoing,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::mechanism_not_registered(name))?;
        let mut mech = factory(state);
        let result = converse_as_server(mech.as_mut(), initial_response, incoming, outgoing, cancel);
        if let Some(cleanup) = mech.as_cleanup() {
            cleanup.cleanup();
        }
        result
    }
}
