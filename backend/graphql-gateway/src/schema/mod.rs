//! GraphQL schema: users, posts and comments

pub mod content;
pub mod user;

use async_graphql::{EmptySubscription, MergedObject, Schema};

use crate::store::SharedContentStore;

pub use content::{Comment, Post};
pub use user::User;

#[derive(MergedObject, Default)]
#[graphql(name = "Query")]
pub struct QueryRoot(user::SessionQuery, content::ContentQuery);

#[derive(MergedObject, Default)]
#[graphql(name = "Mutation")]
pub struct MutationRoot(content::ContentMutation);

pub type AppSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Build the schema over a content store
///
/// The per-request [`crate::context::RequestContext`] is attached to each
/// request, not to the schema.
pub fn build_schema(store: SharedContentStore) -> AppSchema {
    Schema::build(QueryRoot::default(), MutationRoot::default(), EmptySubscription)
        .data(store)
        .finish()
}
