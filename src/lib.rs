//! Starts a server that will handle http graphql requests.

#![warn(unreachable_pub)]

mod axum_factory;
mod configuration;
mod error;
mod executable;
mod gateway;
mod graphql;
mod http_server_factory;
mod state_machine;
mod store;

pub use configuration::Configuration;
pub use error::GatewayError;
pub use executable::main;
pub use executable::Executable;
pub use gateway::ConfigurationSource;
pub use gateway::GatewayHttpServer;
pub use gateway::ShutdownSource;
pub use gateway::StoreSource;
pub use state_machine::State;
pub use store::Dish;
pub use store::DocumentStore;
pub use store::MemoryStore;
pub use store::MongoStore;
pub use store::Review;
pub use store::StoreError;
pub use store::User;
