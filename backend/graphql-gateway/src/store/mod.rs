//! Document store access for posts and comments
//!
//! Resolvers only see plain string identifiers; conversion to and from the
//! database's native key type stays inside the implementations.

pub mod memory;
pub mod mongo;

pub use memory::MemoryContentStore;
pub use mongo::MongoContentStore;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A stored post, identifiers already normalized to strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    pub id: String,
    pub author_id: String,
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRecord {
    pub id: String,
    pub post_id: String,
    pub author_id: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: String,
    pub title: Option<String>,
    pub content: Option<String>,
}

/// Comment insert payload
///
/// `post_id` is stored as given; the referenced post is not required to exist.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: String,
    pub author_id: String,
    pub content: Option<String>,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Insert a post and return its generated identifier
    async fn insert_post(&self, post: NewPost) -> StoreResult<String>;

    /// `None` when the id is unknown or not a valid identifier
    async fn find_post(&self, id: &str) -> StoreResult<Option<PostRecord>>;

    async fn find_posts(&self) -> StoreResult<Vec<PostRecord>>;

    async fn insert_comment(&self, comment: NewComment) -> StoreResult<String>;

    async fn find_comment(&self, id: &str) -> StoreResult<Option<CommentRecord>>;

    /// Comments whose `postId` equals `post_id` exactly
    async fn find_comments_by_post(&self, post_id: &str) -> StoreResult<Vec<CommentRecord>>;
}

pub type SharedContentStore = Arc<dyn ContentStore>;
