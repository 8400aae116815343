//! User schema and resolvers

use async_graphql::{Context, Object, Result as GraphQLResult, SimpleObject, ID};

use crate::context::RequestContext;

/// A user as seen by the API: nothing but its identifier
#[derive(SimpleObject, Clone, Debug, PartialEq, Eq)]
pub struct User {
    #[graphql(name = "_id")]
    pub id: ID,
}

impl User {
    /// `None` for an empty reference
    pub fn from_reference(id: &str) -> Option<Self> {
        if id.is_empty() {
            None
        } else {
            Some(User { id: ID::from(id) })
        }
    }
}

/// Identity of the caller, taken from the request context
pub(crate) fn current_user_id(ctx: &Context<'_>) -> Option<String> {
    ctx.data_opt::<RequestContext>()
        .and_then(|request| request.user_id.clone())
}

#[derive(Default)]
pub struct SessionQuery;

#[Object]
impl SessionQuery {
    /// The authenticated caller, or null
    async fn me(&self, ctx: &Context<'_>) -> GraphQLResult<Option<User>> {
        Ok(current_user_id(ctx).and_then(|id| User::from_reference(&id)))
    }
}
