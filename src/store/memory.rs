use std::collections::HashSet;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::Dish;
use super::DocumentStore;
use super::Review;
use super::StoreError;
use super::User;
use super::DISH_COLLECTION;
use super::REVIEW_COLLECTION;
use super::USER_COLLECTION;

#[derive(Default)]
struct Collections {
    users: Vec<User>,
    dishes: Vec<Dish>,
    reviews: Vec<Review>,
}

/// In-memory store used by the test suites in place of a live mongod.
///
/// Supports fault injection per collection (failed collections return
/// `StoreError::Unavailable`) and counts batched lookups so tests can assert
/// that the dataloaders coalesce keys.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<Collections>,
    failing: Mutex<HashSet<String>>,
    down: Mutex<bool>,
    user_batches: AtomicUsize,
    dish_batches: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: User) {
        self.collections.lock().users.push(user);
    }

    pub fn insert_dish(&self, dish: Dish) {
        self.collections.lock().dishes.push(dish);
    }

    pub fn insert_review(&self, review: Review) {
        self.collections.lock().reviews.push(review);
    }

    /// Make every read against the named collection fail.
    pub fn fail_collection(&self, collection: &str) {
        self.failing.lock().insert(collection.to_string());
    }

    /// Take the whole store down: every operation, including the readiness
    /// ping, fails until `set_down(false)`.
    pub fn set_down(&self, down: bool) {
        *self.down.lock() = down;
    }

    /// Number of batched user lookups issued so far.
    pub fn user_batches(&self) -> usize {
        self.user_batches.load(Ordering::SeqCst)
    }

    /// Number of batched dish lookups issued so far.
    pub fn dish_batches(&self) -> usize {
        self.dish_batches.load(Ordering::SeqCst)
    }

    fn check(&self, collection: &str) -> Result<(), StoreError> {
        if *self.down.lock() {
            return Err(StoreError::Unavailable("store is down".to_string()));
        }
        if self.failing.lock().contains(collection) {
            return Err(StoreError::Unavailable(format!(
                "collection '{collection}' is failing"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn users(&self) -> Result<Vec<User>, StoreError> {
        self.check(USER_COLLECTION)?;
        Ok(self.collections.lock().users.clone())
    }

    async fn dishes(&self) -> Result<Vec<Dish>, StoreError> {
        self.check(DISH_COLLECTION)?;
        Ok(self.collections.lock().dishes.clone())
    }

    async fn reviews(&self) -> Result<Vec<Review>, StoreError> {
        self.check(REVIEW_COLLECTION)?;
        Ok(self.collections.lock().reviews.clone())
    }

    async fn user(&self, id: i64) -> Result<Option<User>, StoreError> {
        self.check(USER_COLLECTION)?;
        Ok(self
            .collections
            .lock()
            .users
            .iter()
            .find(|user| user.id == id)
            .cloned())
    }

    async fn dish(&self, id: i64) -> Result<Option<Dish>, StoreError> {
        self.check(DISH_COLLECTION)?;
        Ok(self
            .collections
            .lock()
            .dishes
            .iter()
            .find(|dish| dish.id == id)
            .cloned())
    }

    async fn review(&self, id: i64) -> Result<Option<Review>, StoreError> {
        self.check(REVIEW_COLLECTION)?;
        Ok(self
            .collections
            .lock()
            .reviews
            .iter()
            .find(|review| review.id == id)
            .cloned())
    }

    async fn users_by_ids(&self, ids: &[i64]) -> Result<Vec<User>, StoreError> {
        self.check(USER_COLLECTION)?;
        self.user_batches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .collections
            .lock()
            .users
            .iter()
            .filter(|user| ids.contains(&user.id))
            .cloned()
            .collect())
    }

    async fn dishes_by_ids(&self, ids: &[i64]) -> Result<Vec<Dish>, StoreError> {
        self.check(DISH_COLLECTION)?;
        self.dish_batches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .collections
            .lock()
            .dishes
            .iter()
            .filter(|dish| ids.contains(&dish.id))
            .cloned()
            .collect())
    }

    async fn ready(&self) -> Result<(), StoreError> {
        if *self.down.lock() {
            return Err(StoreError::Unavailable("store is down".to_string()));
        }
        Ok(())
    }
}
