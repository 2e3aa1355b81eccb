use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::ClientOptions;
use mongodb::Client;
use mongodb::Database;

use super::Dish;
use super::DocumentStore;
use super::Review;
use super::StoreError;
use super::User;
use super::DISH_COLLECTION;
use super::REVIEW_COLLECTION;
use super::USER_COLLECTION;
use crate::configuration::Store;

/// Production store backed by a MongoDB database.
///
/// The database is selected from the connection string when it names one,
/// falling back to the configured `store.database`.
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub async fn connect(url: &str, config: &Store) -> Result<Self, StoreError> {
        let mut options = ClientOptions::parse(url).await?;
        options.connect_timeout = Some(config.connect_timeout);
        options.server_selection_timeout = Some(config.connect_timeout);
        let client = Client::with_options(options)?;
        let db = client
            .default_database()
            .unwrap_or_else(|| client.database(&config.database));

        tracing::debug!("using database '{}'", db.name());
        Ok(Self { db })
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn users(&self) -> Result<Vec<User>, StoreError> {
        let cursor = self.db.collection::<User>(USER_COLLECTION).find(doc! {}).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn dishes(&self) -> Result<Vec<Dish>, StoreError> {
        let cursor = self.db.collection::<Dish>(DISH_COLLECTION).find(doc! {}).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn reviews(&self) -> Result<Vec<Review>, StoreError> {
        let cursor = self
            .db
            .collection::<Review>(REVIEW_COLLECTION)
            .find(doc! {})
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn user(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self
            .db
            .collection::<User>(USER_COLLECTION)
            .find_one(doc! { "_id": id })
            .await?)
    }

    async fn dish(&self, id: i64) -> Result<Option<Dish>, StoreError> {
        Ok(self
            .db
            .collection::<Dish>(DISH_COLLECTION)
            .find_one(doc! { "_id": id })
            .await?)
    }

    async fn review(&self, id: i64) -> Result<Option<Review>, StoreError> {
        Ok(self
            .db
            .collection::<Review>(REVIEW_COLLECTION)
            .find_one(doc! { "_id": id })
            .await?)
    }

    async fn users_by_ids(&self, ids: &[i64]) -> Result<Vec<User>, StoreError> {
        let cursor = self
            .db
            .collection::<User>(USER_COLLECTION)
            .find(doc! { "_id": { "$in": ids.to_vec() } })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn dishes_by_ids(&self, ids: &[i64]) -> Result<Vec<Dish>, StoreError> {
        let cursor = self
            .db
            .collection::<Dish>(DISH_COLLECTION)
            .find(doc! { "_id": { "$in": ids.to_vec() } })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn ready(&self) -> Result<(), StoreError> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}
