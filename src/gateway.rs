//! The public entry point for running the gateway's HTTP server.

use std::path::PathBuf;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;

use derivative::Derivative;
use derive_more::Display;
use derive_more::From;
use futures::channel::oneshot;
use futures::prelude::*;
use tokio::sync::watch;
use tokio::task::spawn;

use crate::configuration::Configuration;
use crate::configuration::ConfigurationError;
use crate::error::GatewayError;
use crate::state_machine::State;
use crate::state_machine::StateMachine;
use crate::store::DocumentStore;

/// The user supplied config. Either a static instance or a file read once at
/// startup.
#[derive(From, Display, Derivative)]
#[derivative(Debug)]
#[non_exhaustive]
pub enum ConfigurationSource {
    /// A static configuration.
    ///
    /// Can be created through `serde::Deserialize` from YAML,
    /// or inline in Rust code with the builder.
    #[display("Static")]
    #[from(Configuration, Box<Configuration>)]
    Static(Box<Configuration>),

    /// A YAML file, read once at startup.
    #[display("File")]
    File {
        /// The path of the configuration file.
        path: PathBuf,
    },
}

impl Default for ConfigurationSource {
    fn default() -> Self {
        ConfigurationSource::Static(Default::default())
    }
}

impl ConfigurationSource {
    pub(crate) fn load(self) -> Result<Configuration, GatewayError> {
        match self {
            ConfigurationSource::Static(instance) => Ok(*instance),
            ConfigurationSource::File { path } => {
                let raw_yaml = std::fs::read_to_string(&path)
                    .map_err(|e| GatewayError::ConfigError(ConfigurationError::ReadFile(e)))?;
                Ok(Configuration::from_str(&raw_yaml)?)
            }
        }
    }
}

/// The user supplied document store. Either a connection string for the
/// production MongoDB store, or an already constructed handle.
#[derive(Display, Derivative)]
#[derivative(Debug)]
#[non_exhaustive]
pub enum StoreSource {
    /// A MongoDB connection string.
    #[display("Url")]
    Url(String),

    /// An already constructed store handle.
    #[display("Handle")]
    Handle(#[derivative(Debug = "ignore")] Arc<dyn DocumentStore>),
}

impl From<&'_ str> for StoreSource {
    fn from(url: &'_ str) -> Self {
        Self::Url(url.to_owned())
    }
}

impl From<String> for StoreSource {
    fn from(url: String) -> Self {
        Self::Url(url)
    }
}

impl From<Arc<dyn DocumentStore>> for StoreSource {
    fn from(store: Arc<dyn DocumentStore>) -> Self {
        Self::Handle(store)
    }
}

type ShutdownFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Specifies when the gateway's HTTP server should gracefully shutdown
#[derive(Display, Derivative)]
#[derivative(Debug)]
#[non_exhaustive]
pub enum ShutdownSource {
    /// No graceful shutdown
    #[display("None")]
    None,

    /// A custom shutdown future.
    #[display("Custom")]
    Custom(#[derivative(Debug = "ignore")] ShutdownFuture),

    /// Watch for Ctl-C signal.
    #[display("CtrlC")]
    CtrlC,
}

impl ShutdownSource {
    /// Convert this shutdown hook into a future. Allows for unified handling later.
    fn into_future(self) -> ShutdownFuture {
        match self {
            ShutdownSource::None => future::pending::<()>().boxed(),
            ShutdownSource::Custom(future) => future,
            ShutdownSource::CtrlC => {
                #[cfg(not(unix))]
                {
                    async {
                        tokio::signal::ctrl_c()
                            .await
                            .expect("Failed to install CTRL+C signal handler");
                    }
                    .boxed()
                }

                #[cfg(unix)]
                future::select(
                    tokio::signal::ctrl_c().map(|s| s.ok()).boxed(),
                    async {
                        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                            .expect("Failed to install SIGTERM signal handler")
                            .recv()
                            .await
                    }
                    .boxed(),
                )
                .map(|_| ())
                .boxed()
            }
        }
    }
}

/// The entry point for running the gateway's HTTP server.
///
/// Shutdown via handle:
/// ```no_run
/// use bistro_gateway::Configuration;
/// use bistro_gateway::GatewayHttpServer;
///
/// async {
///     let configuration = "".parse::<Configuration>().unwrap();
///     let mut server = GatewayHttpServer::builder()
///         .configuration(configuration)
///         .store("mongodb://localhost:27017/bistro")
///         .start();
///     // …
///     server.shutdown().await
/// };
/// ```
pub struct GatewayHttpServer {
    result: Pin<Box<dyn Future<Output = Result<(), GatewayError>> + Send>>,
    state_receiver: watch::Receiver<State>,
    shutdown_sender: Option<oneshot::Sender<()>>,
}

#[buildstructor::buildstructor]
impl GatewayHttpServer {
    /// Returns a builder to start an HTTP server in a separate Tokio task.
    ///
    /// Builder methods:
    ///
    /// * `.store(impl Into<`[`StoreSource`]`>)`
    ///   Required.
    ///   Specifies the document store to read from.
    ///
    /// * `.configuration(impl Into<`[`ConfigurationSource`]`>)`
    ///   Optional.
    ///   Specifies where to find the gateway configuration.
    ///   If not provided, the default configuration as with an empty YAML file.
    ///
    /// * `.shutdown(impl Into<`[`ShutdownSource`]`>)`
    ///   Optional.
    ///   Specifies when the server should gracefully shut down.
    ///   If not provided, the default is [`ShutdownSource::CtrlC`].
    ///
    /// * `.start()`
    ///   Finishes the builder,
    ///   starts an HTTP server in a separate Tokio task,
    ///   and returns a `GatewayHttpServer` handle.
    ///
    /// The server handle can be used in multiple ways.
    /// As a [`Future`], it resolves to `Result<(), `[`GatewayError`]`>`
    /// either when the server has finished gracefully shutting down
    /// or when it encounters a fatal error that prevents it from starting.
    ///
    /// If the handle is dropped before being awaited as a future,
    /// a graceful shutdown is triggered.
    /// In order to wait until shutdown finishes,
    /// use the [`shutdown`][Self::shutdown] method instead.
    #[builder(visibility = "pub", entry = "builder", exit = "start")]
    fn start(
        store: StoreSource,
        configuration: Option<ConfigurationSource>,
        shutdown: Option<ShutdownSource>,
    ) -> GatewayHttpServer {
        let (shutdown_sender, shutdown_receiver) = oneshot::channel::<()>();
        let shutdown_future = future::select(
            shutdown.unwrap_or(ShutdownSource::CtrlC).into_future(),
            shutdown_receiver.map(|_| ()).boxed(),
        )
        .map(|_| ())
        .boxed();

        let (state_machine, state_receiver) = StateMachine::new();
        let result = spawn(async move {
            state_machine
                .run(configuration.unwrap_or_default(), store, shutdown_future)
                .await
        })
        .map(|r| match r {
            Ok(Ok(ok)) => Ok(ok),
            Ok(Err(err)) => Err(err),
            Err(err) => {
                tracing::error!("{}", err);
                Err(GatewayError::StartupError)
            }
        })
        .boxed();

        GatewayHttpServer {
            result,
            state_receiver,
            shutdown_sender: Some(shutdown_sender),
        }
    }

    /// Returns the listen address when the gateway is ready to receive
    /// GraphQL requests, or `None` if startup failed.
    ///
    /// This can be useful when the `server.listen` configuration specifies
    /// TCP port 0, which instructs the operating system to pick an available
    /// port number.
    pub async fn listen_address(&self) -> Option<std::net::SocketAddr> {
        let mut receiver = self.state_receiver.clone();
        loop {
            let state = receiver.borrow_and_update().clone();
            match state {
                State::Running { address } => return Some(address),
                State::Stopped | State::Errored => return None,
                State::Startup => {}
            }
            if receiver.changed().await.is_err() {
                return None;
            }
        }
    }

    /// Returns a watch receiver over the server lifecycle states.
    pub fn state_receiver(&self) -> watch::Receiver<State> {
        self.state_receiver.clone()
    }

    /// Trigger and wait for graceful shutdown
    pub async fn shutdown(&mut self) -> Result<(), GatewayError> {
        if let Some(sender) = self.shutdown_sender.take() {
            let _ = sender.send(());
        }
        (&mut self.result).await
    }
}

impl Drop for GatewayHttpServer {
    fn drop(&mut self) {
        if let Some(sender) = self.shutdown_sender.take() {
            let _ = sender.send(());
        }
    }
}

impl Future for GatewayHttpServer {
    type Output = Result<(), GatewayError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.result.poll_unpin(cx)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::store::MemoryStore;
    use crate::store::User;

    fn test_server(store: Arc<MemoryStore>) -> GatewayHttpServer {
        let configuration = Configuration::from_str("server:\n  listen: 127.0.0.1:0\n")
            .unwrap()
            .boxed();
        GatewayHttpServer::builder()
            .configuration(ConfigurationSource::Static(configuration))
            .store(StoreSource::Handle(store))
            .shutdown(ShutdownSource::None)
            .start()
    }

    #[test(tokio::test(flavor = "multi_thread"))]
    async fn shutdown_via_handle() {
        let store = Arc::new(MemoryStore::new());
        store.insert_user(User {
            id: 1,
            name: "Ada".to_string(),
        });
        let mut server = test_server(store);
        server
            .listen_address()
            .await
            .expect("gateway failed to start");
        server.shutdown().await.unwrap();
    }

    #[test(tokio::test(flavor = "multi_thread"))]
    async fn startup_fails_when_store_is_down() {
        let store = Arc::new(MemoryStore::new());
        store.set_down(true);
        let mut server = test_server(store);
        assert!(server.listen_address().await.is_none());
        assert!(matches!(
            server.shutdown().await,
            Err(GatewayError::StoreConnection(_))
        ));
    }
}
