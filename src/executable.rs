//! Main entry point for CLI command to start the gateway.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::anyhow;
use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::configuration::generate_config_schema;
use crate::configuration::Configuration;
use crate::gateway::ConfigurationSource;
use crate::gateway::GatewayHttpServer;
use crate::gateway::ShutdownSource;
use crate::gateway::StoreSource;
use crate::state_machine::State;

/// Options for the gateway
#[derive(Parser, Debug)]
#[clap(name = "bistro", about = "Bistro GraphQL gateway")]
pub(crate) struct Opt {
    /// Log level (off|error|warn|info|debug|trace).
    #[clap(
        long = "log",
        default_value = "info",
        alias = "log-level",
        env = "BISTRO_LOG"
    )]
    log_level: String,

    /// Configuration file location.
    #[clap(short, long = "config", env = "BISTRO_CONFIG_PATH")]
    config_path: Option<PathBuf>,

    /// Socket address and port to listen on, overriding the configuration file.
    #[clap(long = "listen", env = "BISTRO_LISTEN")]
    listen: Option<SocketAddr>,

    /// MongoDB connection string.
    #[clap(long = "store-url", env = "BISTRO_STORE_URL")]
    store_url: Option<String>,

    /// Database name, overriding any database in the connection string.
    #[clap(long = "store-database", env = "BISTRO_STORE_DATABASE")]
    store_database: Option<String>,

    /// Prints the configuration schema.
    #[clap(long = "config-schema")]
    config_schema: bool,

    /// Display version and exit.
    #[clap(long, short = 'V')]
    version: bool,
}

/// This is the main gateway entrypoint.
///
/// Starts a Tokio runtime and runs the gateway until shutdown.
pub fn main() -> Result<()> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(nb) = std::env::var("BISTRO_NUM_CORES")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
    {
        builder.worker_threads(nb);
    }
    let runtime = builder.build()?;
    runtime.block_on(Executable::builder().start())
}

/// Entry point into creating a gateway executable.
pub struct Executable {}

#[buildstructor::buildstructor]
impl Executable {
    /// Build an executable that will parse commandline options and set up logging.
    ///
    /// ```no_run
    /// use bistro_gateway::Executable;
    /// # use anyhow::Result;
    /// # #[tokio::main]
    /// # async fn main() -> Result<()> {
    /// Executable::builder().start().await
    /// # }
    /// ```
    /// Note that if you do not specify a runtime you must be in the context of
    /// an existing tokio runtime.
    #[builder(entry = "builder", exit = "start")]
    pub async fn start(shutdown: Option<ShutdownSource>) -> Result<()> {
        let opt = Opt::parse();

        if opt.version {
            println!("{}", std::env!("CARGO_PKG_VERSION"));
            return Ok(());
        }

        if opt.config_schema {
            let schema = generate_config_schema();
            println!("{}", serde_json::to_string_pretty(&schema)?);
            return Ok(());
        }

        let builder = tracing_subscriber::fmt::fmt().with_env_filter(
            EnvFilter::try_new(&opt.log_level).context("could not parse log configuration")?,
        );
        if std::io::IsTerminal::is_terminal(&std::io::stdout()) {
            builder.init();
        } else {
            builder.json().init();
        }

        let current_directory = std::env::current_dir()?;

        let mut configuration = match opt.config_path.as_ref() {
            Some(path) => {
                let path = if path.is_relative() {
                    current_directory.join(path)
                } else {
                    path.to_path_buf()
                };
                ConfigurationSource::File { path }.load()?
            }
            None => Configuration::builder().build(),
        };
        if let Some(listen) = opt.listen {
            configuration.server.listen = listen;
        }
        if let Some(database) = opt.store_database {
            configuration.store.database = database;
        }

        let bistro_msg = format!("Bistro gateway v{}", std::env!("CARGO_PKG_VERSION"));
        let store_url = opt
            .store_url
            .or_else(|| configuration.store.url.clone())
            .ok_or_else(|| {
                anyhow!(
                    r#"{bistro_msg}

⚠️  The gateway requires a MongoDB connection string at startup. ⚠️

👉 DO ONE:

  * Pass a connection string with the '--store-url' option:

      $ ./bistro --store-url mongodb://localhost:27017/bistro

  * Set the BISTRO_STORE_URL environment variable:

      $ BISTRO_STORE_URL="mongodb://localhost:27017/bistro" ./bistro

  * Add a 'store.url' entry to the configuration file:

      store:
        url: mongodb://localhost:27017/bistro

    "#
                )
            })?;
        tracing::info!("{bistro_msg}");

        let server = GatewayHttpServer::builder()
            .configuration(ConfigurationSource::Static(configuration.boxed()))
            .store(StoreSource::Url(store_url))
            .and_shutdown(shutdown)
            .start();

        let mut state_receiver = server.state_receiver();
        tokio::spawn(async move {
            loop {
                let state = state_receiver.borrow_and_update().clone();
                match state {
                    State::Startup => {
                        tracing::info!("starting the gateway")
                    }
                    State::Running { address } => {
                        tracing::info!("Listening on http://{address} 🚀")
                    }
                    State::Stopped => {
                        tracing::info!("stopped")
                    }
                    State::Errored => {
                        tracing::error!("stopped with error")
                    }
                }
                if state_receiver.changed().await.is_err() {
                    break;
                }
            }
        });

        if let Err(err) = server.await {
            tracing::error!("{}", err);
            return Err(err.into());
        }
        Ok(())
    }
}
