//! The Query root: three unfiltered list fields and three point lookups.

use std::sync::Arc;

use async_graphql::Context;
use async_graphql::ErrorExtensions;
use async_graphql::Object;
use async_graphql::Result;
use async_graphql::ID;

use super::store_fault;
use crate::store::Dish;
use crate::store::DocumentStore;
use crate::store::Review;
use crate::store::User;

/*
  type Query {
    users: [User!]
    dishes: [Dish!]
    reviews: [Review!]
    user(id: ID!): User
    dish(id: ID!): Dish
    review(id: ID!): Review
  }
*/
pub(crate) struct Query;

#[Object]
impl Query {
    /// Every user document, in storage order.
    async fn users(&self, ctx: &Context<'_>) -> Result<Option<Vec<User>>> {
        let store = ctx.data_unchecked::<Arc<dyn DocumentStore>>();
        let users = store.users().await.map_err(|err| store_fault(&err))?;
        Ok(Some(users))
    }

    /// Every dish document, in storage order.
    async fn dishes(&self, ctx: &Context<'_>) -> Result<Option<Vec<Dish>>> {
        let store = ctx.data_unchecked::<Arc<dyn DocumentStore>>();
        let dishes = store.dishes().await.map_err(|err| store_fault(&err))?;
        Ok(Some(dishes))
    }

    /// Every review document, in storage order.
    async fn reviews(&self, ctx: &Context<'_>) -> Result<Option<Vec<Review>>> {
        let store = ctx.data_unchecked::<Arc<dyn DocumentStore>>();
        let reviews = store.reviews().await.map_err(|err| store_fault(&err))?;
        Ok(Some(reviews))
    }

    /// The user with the given id, or null if there is no match.
    async fn user(&self, ctx: &Context<'_>, id: ID) -> Result<Option<User>> {
        let id = parse_id(&id)?;
        let store = ctx.data_unchecked::<Arc<dyn DocumentStore>>();
        store.user(id).await.map_err(|err| store_fault(&err))
    }

    /// The dish with the given id, or null if there is no match.
    async fn dish(&self, ctx: &Context<'_>, id: ID) -> Result<Option<Dish>> {
        let id = parse_id(&id)?;
        let store = ctx.data_unchecked::<Arc<dyn DocumentStore>>();
        store.dish(id).await.map_err(|err| store_fault(&err))
    }

    /// The review with the given id, or null if there is no match.
    async fn review(&self, ctx: &Context<'_>, id: ID) -> Result<Option<Review>> {
        let id = parse_id(&id)?;
        let store = ctx.data_unchecked::<Arc<dyn DocumentStore>>();
        store.review(id).await.map_err(|err| store_fault(&err))
    }
}

/// Stored primary keys are numeric. A non-numeric identifier can never match,
/// so it is rejected with a distinguishable error instead of silently
/// reporting a miss.
fn parse_id(id: &ID) -> Result<i64> {
    id.parse::<i64>().map_err(|_| {
        async_graphql::Error::new(format!("identifier '{}' is not numeric", id.as_str()))
            .extend_with(|_, ext| ext.set("code", "INVALID_IDENTIFIER"))
    })
}
