//! The object types exposed by the schema.
//!
//! The stored documents double as the GraphQL objects; field names follow the
//! stored shape (`_id`, snake_case dietary flags), not GraphQL's usual
//! camelCase.

/*
  type User {
    _id: ID!
    name: String!
  }
*/
use async_graphql::dataloader::DataLoader;
use async_graphql::Context;
use async_graphql::Object;
use async_graphql::Result;
use async_graphql::ID;

use super::loaders::DishLoader;
use super::loaders::UserLoader;
use super::store_fault;
use crate::store::Dish;
use crate::store::Review;
use crate::store::User;

#[Object(rename_fields = "snake_case")]
impl User {
    #[graphql(name = "_id")]
    async fn graphql_id(&self) -> ID {
        ID(self.id.to_string())
    }

    async fn name(&self) -> &str {
        &self.name
    }
}

/*
  type Dish {
    _id: ID!
    name: String!
    photo: String!
    description: String!
    vegan: Boolean!
    vegetarian: Boolean!
    no_milk: Boolean!
    no_gluten: Boolean!
  }
*/
#[Object(rename_fields = "snake_case")]
impl Dish {
    #[graphql(name = "_id")]
    async fn graphql_id(&self) -> ID {
        ID(self.id.to_string())
    }

    async fn name(&self) -> &str {
        &self.name
    }

    async fn photo(&self) -> &str {
        &self.photo
    }

    async fn description(&self) -> &str {
        &self.description
    }

    async fn vegan(&self) -> bool {
        self.vegan
    }

    async fn vegetarian(&self) -> bool {
        self.vegetarian
    }

    async fn no_milk(&self) -> bool {
        self.no_milk
    }

    async fn no_gluten(&self) -> bool {
        self.no_gluten
    }
}

/*
  type Review {
    _id: ID!
    content: String!
    stars: Int!
    user: User
    dish: Dish
  }
*/
#[Object(rename_fields = "snake_case")]
impl Review {
    #[graphql(name = "_id")]
    async fn graphql_id(&self) -> ID {
        ID(self.id.to_string())
    }

    async fn content(&self) -> &str {
        &self.content
    }

    async fn stars(&self) -> i32 {
        self.stars
    }

    /// The user who wrote this review, or null if the stored `user_id` has no
    /// match.
    async fn user(&self, ctx: &Context<'_>) -> Result<Option<User>> {
        ctx.data_unchecked::<DataLoader<UserLoader>>()
            .load_one(self.user_id)
            .await
            .map_err(|err| store_fault(err.as_ref()))
    }

    /// The dish this review is about, or null if the stored `dish_id` has no
    /// match.
    async fn dish(&self, ctx: &Context<'_>) -> Result<Option<Dish>> {
        ctx.data_unchecked::<DataLoader<DishLoader>>()
            .load_one(self.dish_id)
            .await
            .map_err(|err| store_fault(err.as_ref()))
    }
}
