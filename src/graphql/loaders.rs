//! Per-response batching loaders for the review relationship fields.
//!
//! Each loader collects the ids needed by one response and issues a single
//! batched store lookup, instead of one point lookup per parent review.

use std::collections::HashMap;
use std::sync::Arc;

use async_graphql::dataloader::Loader;

use crate::store::Dish;
use crate::store::DocumentStore;
use crate::store::StoreError;
use crate::store::User;

pub(crate) struct UserLoader {
    store: Arc<dyn DocumentStore>,
}

impl UserLoader {
    pub(crate) fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

impl Loader<i64> for UserLoader {
    type Value = User;
    type Error = Arc<StoreError>;

    async fn load(&self, keys: &[i64]) -> Result<HashMap<i64, Self::Value>, Self::Error> {
        let users = self.store.users_by_ids(keys).await.map_err(Arc::new)?;
        Ok(users.into_iter().map(|user| (user.id, user)).collect())
    }
}

pub(crate) struct DishLoader {
    store: Arc<dyn DocumentStore>,
}

impl DishLoader {
    pub(crate) fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

impl Loader<i64> for DishLoader {
    type Value = Dish;
    type Error = Arc<StoreError>;

    async fn load(&self, keys: &[i64]) -> Result<HashMap<i64, Self::Value>, Self::Error> {
        let dishes = self.store.dishes_by_ids(keys).await.map_err(Arc::new)?;
        Ok(dishes.into_iter().map(|dish| (dish.id, dish)).collect())
    }
}
