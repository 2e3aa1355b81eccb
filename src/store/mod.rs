//! The document store seam: the trait the resolvers read through, and its
//! backing implementations.

mod memory;
mod mongo;

use async_trait::async_trait;
use displaydoc::Display as DisplayDoc;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

pub(crate) const USER_COLLECTION: &str = "user";
pub(crate) const DISH_COLLECTION: &str = "dish";
pub(crate) const REVIEW_COLLECTION: &str = "review";

/// Errors raised by a document store.
#[derive(Error, Debug, DisplayDoc)]
pub enum StoreError {
    /// document store request failed: {0}
    Backend(#[from] mongodb::error::Error),

    /// document store unavailable: {0}
    Unavailable(String),
}

/// A stored user document.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: i64,
    pub name: String,
}

/// A stored dish document. All fields are mandatory, including the four
/// dietary flags.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Dish {
    #[serde(rename = "_id")]
    pub id: i64,
    pub name: String,
    pub photo: String,
    pub description: String,
    pub vegan: bool,
    pub vegetarian: bool,
    pub no_milk: bool,
    pub no_gluten: bool,
}

/// A stored review document. The raw document holds only the foreign keys;
/// the join to `User`/`Dish` happens at query time.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Review {
    #[serde(rename = "_id")]
    pub id: i64,
    pub content: String,
    pub stars: i32,
    pub user_id: i64,
    pub dish_id: i64,
}

/// Read access to the three collections backing the gateway.
///
/// Every operation is a side-effect-free read. List operations return
/// documents in storage order. Point lookups return `None` on a miss, which
/// is not an error. The `*_by_ids` operations back the per-response
/// dataloaders and fetch each requested id at most once.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn users(&self) -> Result<Vec<User>, StoreError>;
    async fn dishes(&self) -> Result<Vec<Dish>, StoreError>;
    async fn reviews(&self) -> Result<Vec<Review>, StoreError>;

    async fn user(&self, id: i64) -> Result<Option<User>, StoreError>;
    async fn dish(&self, id: i64) -> Result<Option<Dish>, StoreError>;
    async fn review(&self, id: i64) -> Result<Option<Review>, StoreError>;

    async fn users_by_ids(&self, ids: &[i64]) -> Result<Vec<User>, StoreError>;
    async fn dishes_by_ids(&self, ids: &[i64]) -> Result<Vec<Dish>, StoreError>;

    /// Ping the store. Used by the startup readiness gate and the health
    /// check endpoint.
    async fn ready(&self) -> Result<(), StoreError>;
}
