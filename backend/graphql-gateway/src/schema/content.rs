//! Post and comment schema
//!
//! Nested fields (`Post.comments`, `Comment.post`) are fetched lazily, one store
//! query per parent, and only when the field is selected.

use async_graphql::{
    ComplexObject, Context, ErrorExtensions, Object, Result as GraphQLResult, SimpleObject, ID,
};
use tracing::info;

use super::user::{current_user_id, User};
use crate::error::GatewayError;
use crate::store::{
    CommentRecord, NewComment, NewPost, PostRecord, SharedContentStore, StoreError,
};

#[derive(SimpleObject, Clone, Debug, PartialEq, Eq)]
#[graphql(complex)]
pub struct Post {
    #[graphql(name = "_id")]
    pub id: ID,
    pub author_id: ID,
    pub title: Option<String>,
    pub content: Option<String>,
}

impl From<PostRecord> for Post {
    fn from(record: PostRecord) -> Self {
        Post {
            id: ID(record.id),
            author_id: ID(record.author_id),
            title: record.title,
            content: record.content,
        }
    }
}

#[ComplexObject]
impl Post {
    async fn author(&self) -> Option<User> {
        User::from_reference(&self.author_id)
    }

    async fn comments(&self, ctx: &Context<'_>) -> GraphQLResult<Vec<Option<Comment>>> {
        let store = ctx.data::<SharedContentStore>()?;
        let comments = store
            .find_comments_by_post(&self.id)
            .await
            .map_err(upstream)?;
        Ok(comments
            .into_iter()
            .map(|c| Some(Comment::from(c)))
            .collect())
    }
}

#[derive(SimpleObject, Clone, Debug, PartialEq, Eq)]
#[graphql(complex)]
pub struct Comment {
    #[graphql(name = "_id")]
    pub id: ID,
    pub post_id: ID,
    pub author_id: Option<ID>,
    pub content: Option<String>,
}

impl From<CommentRecord> for Comment {
    fn from(record: CommentRecord) -> Self {
        Comment {
            id: ID(record.id),
            post_id: ID(record.post_id),
            author_id: record.author_id.map(ID),
            content: record.content,
        }
    }
}

#[ComplexObject]
impl Comment {
    async fn author(&self) -> Option<User> {
        self.author_id
            .as_deref()
            .and_then(|id| User::from_reference(id))
    }

    async fn post(&self, ctx: &Context<'_>) -> GraphQLResult<Option<Post>> {
        let store = ctx.data::<SharedContentStore>()?;
        let post = store.find_post(&self.post_id).await.map_err(upstream)?;
        Ok(post.map(Post::from))
    }
}

fn upstream(err: StoreError) -> async_graphql::Error {
    GatewayError::from(err).extend()
}

fn require_user(ctx: &Context<'_>) -> GraphQLResult<String> {
    current_user_id(ctx).ok_or_else(|| GatewayError::AuthenticationRequired.extend())
}

#[derive(Default)]
pub struct ContentQuery;

#[Object]
impl ContentQuery {
    async fn post(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "_id")] id: ID,
    ) -> GraphQLResult<Option<Post>> {
        let store = ctx.data::<SharedContentStore>()?;
        let post = store.find_post(&id).await.map_err(upstream)?;
        Ok(post.map(Post::from))
    }

    async fn posts(&self, ctx: &Context<'_>) -> GraphQLResult<Option<Vec<Option<Post>>>> {
        let store = ctx.data::<SharedContentStore>()?;
        let posts = store.find_posts().await.map_err(upstream)?;
        Ok(Some(posts.into_iter().map(|p| Some(Post::from(p))).collect()))
    }

    async fn comment(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "_id")] id: ID,
    ) -> GraphQLResult<Option<Comment>> {
        let store = ctx.data::<SharedContentStore>()?;
        let comment = store.find_comment(&id).await.map_err(upstream)?;
        Ok(comment.map(Comment::from))
    }
}

#[derive(Default)]
pub struct ContentMutation;

#[Object]
impl ContentMutation {
    /// Create a post authored by the caller and return it as stored
    async fn create_post(
        &self,
        ctx: &Context<'_>,
        title: Option<String>,
        content: Option<String>,
    ) -> GraphQLResult<Option<Post>> {
        let author_id = require_user(ctx)?;
        let store = ctx.data::<SharedContentStore>()?;

        let id = store
            .insert_post(NewPost {
                author_id: author_id.clone(),
                title,
                content,
            })
            .await
            .map_err(upstream)?;
        info!(post_id = %id, author_id = %author_id, "Post created");

        let post = store.find_post(&id).await.map_err(upstream)?;
        Ok(post.map(Post::from))
    }

    /// Create a comment on `postId`; the post is not required to exist
    async fn create_comment(
        &self,
        ctx: &Context<'_>,
        post_id: ID,
        content: Option<String>,
    ) -> GraphQLResult<Option<Comment>> {
        let author_id = require_user(ctx)?;
        let store = ctx.data::<SharedContentStore>()?;

        let id = store
            .insert_comment(NewComment {
                post_id: post_id.to_string(),
                author_id: author_id.clone(),
                content,
            })
            .await
            .map_err(upstream)?;
        info!(comment_id = %id, post_id = %post_id.as_str(), author_id = %author_id, "Comment created");

        let comment = store.find_comment(&id).await.map_err(upstream)?;
        Ok(comment.map(Comment::from))
    }
}
