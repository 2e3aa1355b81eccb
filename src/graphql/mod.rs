//! Schema construction and the resolver set.

mod loaders;
mod objects;
mod query;

use std::sync::Arc;

use async_graphql::dataloader::DataLoader;
use async_graphql::EmptyMutation;
use async_graphql::EmptySubscription;
use async_graphql::ErrorExtensions;
use async_graphql::Schema;

use self::loaders::DishLoader;
use self::loaders::UserLoader;
use self::query::Query;
use crate::configuration::Configuration;
use crate::store::DocumentStore;
use crate::store::StoreError;

pub(crate) type GatewaySchema = Schema<Query, EmptyMutation, EmptySubscription>;

/// Build the schema and inject the store handle and the per-response
/// dataloaders into the context.
pub(crate) fn build_schema(
    store: Arc<dyn DocumentStore>,
    configuration: &Configuration,
) -> GatewaySchema {
    let user_loader = DataLoader::new(UserLoader::new(store.clone()), tokio::spawn);
    let dish_loader = DataLoader::new(DishLoader::new(store.clone()), tokio::spawn);

    let mut builder = Schema::build(Query, EmptyMutation, EmptySubscription)
        .data(store)
        .data(user_loader)
        .data(dish_loader);
    if !configuration.server.introspection {
        builder = builder.disable_introspection();
    }
    builder.finish()
}

/// Convert a store-level fault into a field error carrying the
/// `STORE_FAULT` extension code.
pub(crate) fn store_fault(err: &StoreError) -> async_graphql::Error {
    async_graphql::Error::new(err.to_string()).extend_with(|_, ext| ext.set("code", "STORE_FAULT"))
}
