use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use derivative::Derivative;
use futures::channel::oneshot;
use futures::prelude::*;

use crate::configuration::Configuration;
use crate::error::GatewayError;
use crate::graphql::GatewaySchema;
use crate::store::DocumentStore;

/// Factory for creating the http server component.
///
/// This trait lets the state machine be tested without binding real sockets.
pub(crate) trait HttpServerFactory {
    type Future: Future<Output = Result<HttpServerHandle, GatewayError>> + Send;

    fn create(
        &self,
        schema: GatewaySchema,
        store: Arc<dyn DocumentStore>,
        configuration: Arc<Configuration>,
    ) -> Self::Future;
}

/// A handle with which a client can shut down the server gracefully.
/// This relies on the underlying server implementation doing the right thing.
#[derive(Derivative)]
#[derivative(Debug)]
pub(crate) struct HttpServerHandle {
    /// Sender to use to notify of shutdown
    shutdown_sender: oneshot::Sender<()>,

    /// Future to wait on for graceful shutdown
    #[derivative(Debug = "ignore")]
    server_future: Pin<Box<dyn Future<Output = Result<(), GatewayError>> + Send>>,

    /// The listen address that the server is actually listening on.
    /// If the socket address specified port zero the OS will assign a random free port.
    listen_address: SocketAddr,
}

impl HttpServerHandle {
    pub(crate) fn new(
        shutdown_sender: oneshot::Sender<()>,
        server_future: Pin<Box<dyn Future<Output = Result<(), GatewayError>> + Send>>,
        listen_address: SocketAddr,
    ) -> Self {
        Self {
            shutdown_sender,
            server_future,
            listen_address,
        }
    }

    pub(crate) async fn shutdown(self) -> Result<(), GatewayError> {
        if let Err(_err) = self.shutdown_sender.send(()) {
            tracing::error!("Failed to notify http thread of shutdown")
        };
        self.server_future.await
    }

    pub(crate) fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::str::FromStr;

    use futures::channel::oneshot;
    use test_log::test;

    use super::*;

    #[test(tokio::test)]
    async fn sanity() {
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        HttpServerHandle::new(
            shutdown_sender,
            futures::future::ready(Ok(())).boxed(),
            SocketAddr::from_str("127.0.0.1:0").unwrap(),
        )
        .shutdown()
        .await
        .expect("Should have waited for shutdown");

        shutdown_receiver
            .await
            .expect("Should have been send notification to shutdown");
    }
}
