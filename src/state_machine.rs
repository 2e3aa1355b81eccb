//! Two-phase startup sequencing: connect to the store and await a successful
//! readiness ping before binding the listener. No request can be accepted
//! while the store is unreachable.

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use futures::prelude::*;
use tokio::sync::watch;

use crate::axum_factory::AxumHttpServerFactory;
use crate::configuration::Configuration;
use crate::error::GatewayError;
use crate::gateway::ConfigurationSource;
use crate::gateway::StoreSource;
use crate::graphql::build_schema;
use crate::http_server_factory::HttpServerFactory;
use crate::store::DocumentStore;
use crate::store::MongoStore;

/// Public state of the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum State {
    /// The server is loading configuration and connecting to the store.
    Startup,

    /// The server is listening on the given address.
    Running {
        /// The address the listener is bound to.
        address: SocketAddr,
    },

    /// The server stopped after a graceful shutdown.
    Stopped,

    /// The server failed to start or to stop cleanly.
    Errored,
}

/// Drives the lifecycle: Startup → Running → Stopped, or Errored if any
/// startup phase fails. Configuration is read once; there is no hot reload.
pub(crate) struct StateMachine<S>
where
    S: HttpServerFactory,
{
    http_server_factory: S,
    state_sender: watch::Sender<State>,
}

impl StateMachine<AxumHttpServerFactory> {
    pub(crate) fn new() -> (Self, watch::Receiver<State>) {
        Self::with_factory(AxumHttpServerFactory::new())
    }
}

impl<S> StateMachine<S>
where
    S: HttpServerFactory,
{
    pub(crate) fn with_factory(http_server_factory: S) -> (Self, watch::Receiver<State>) {
        let (state_sender, state_receiver) = watch::channel(State::Startup);
        (
            Self {
                http_server_factory,
                state_sender,
            },
            state_receiver,
        )
    }

    pub(crate) async fn run(
        self,
        configuration: ConfigurationSource,
        store: StoreSource,
        shutdown: Pin<Box<dyn Future<Output = ()> + Send>>,
    ) -> Result<(), GatewayError> {
        match self.execute(configuration, store, shutdown).await {
            Ok(()) => {
                let _ = self.state_sender.send(State::Stopped);
                Ok(())
            }
            Err(err) => {
                tracing::error!("{}", err);
                let _ = self.state_sender.send(State::Errored);
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        configuration: ConfigurationSource,
        store: StoreSource,
        shutdown: Pin<Box<dyn Future<Output = ()> + Send>>,
    ) -> Result<(), GatewayError> {
        tracing::debug!("starting");
        let configuration = Arc::new(configuration.load()?);

        // Phase one: the readiness gate. The listener is not bound until the
        // store has answered a ping.
        let store = connect_store(store, &configuration).await?;
        store.ready().await.map_err(GatewayError::StoreConnection)?;
        tracing::info!("document store is ready");

        // Phase two: bind the listener and serve.
        let schema = build_schema(store.clone(), &configuration);
        let server_handle = self
            .http_server_factory
            .create(schema, store, configuration.clone())
            .await?;
        let _ = self.state_sender.send(State::Running {
            address: server_handle.listen_address(),
        });

        shutdown.await;
        tracing::debug!("shutting down");
        server_handle.shutdown().await
    }
}

async fn connect_store(
    source: StoreSource,
    configuration: &Configuration,
) -> Result<Arc<dyn DocumentStore>, GatewayError> {
    match source {
        StoreSource::Url(url) => {
            let store = MongoStore::connect(&url, &configuration.store)
                .await
                .map_err(GatewayError::StoreConnection)?;
            Ok(Arc::new(store))
        }
        StoreSource::Handle(store) => Ok(store),
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use test_log::test;

    use super::*;
    use crate::store::MemoryStore;

    fn test_configuration() -> Configuration {
        Configuration::from_str("server:\n  listen: 127.0.0.1:0\n").unwrap()
    }

    #[test(tokio::test(flavor = "multi_thread"))]
    async fn reaches_running_then_stops() {
        let (machine, mut state_receiver) = StateMachine::new();
        let (sender, receiver) = futures::channel::oneshot::channel::<()>();
        let task = tokio::spawn(machine.run(
            ConfigurationSource::Static(Box::new(test_configuration())),
            StoreSource::Handle(Arc::new(MemoryStore::new())),
            receiver.map(|_| ()).boxed(),
        ));

        loop {
            let state = state_receiver.borrow_and_update().clone();
            if matches!(state, State::Running { .. }) {
                break;
            }
            assert_ne!(state, State::Errored);
            state_receiver.changed().await.unwrap();
        }

        sender.send(()).unwrap();
        task.await.unwrap().unwrap();
        assert_eq!(*state_receiver.borrow(), State::Stopped);
    }

    #[test(tokio::test(flavor = "multi_thread"))]
    async fn unreachable_store_prevents_listening() {
        let store = MemoryStore::new();
        store.set_down(true);

        let (machine, state_receiver) = StateMachine::new();
        let result = machine
            .run(
                ConfigurationSource::Static(Box::new(test_configuration())),
                StoreSource::Handle(Arc::new(store)),
                future::pending().boxed(),
            )
            .await;

        assert!(matches!(result, Err(GatewayError::StoreConnection(_))));
        assert_eq!(*state_receiver.borrow(), State::Errored);
    }
}
