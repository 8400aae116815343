use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use tokio::sync::RwLock;

use super::{CommentRecord, ContentStore, NewComment, NewPost, PostRecord, StoreResult};

/// In-process content store for tests and local runs without MongoDB
///
/// Generates identifiers in the same 24-character hex form the database does.
#[derive(Default)]
pub struct MemoryContentStore {
    posts: RwLock<Vec<PostRecord>>,
    comments: RwLock<Vec<CommentRecord>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn post_count(&self) -> usize {
        self.posts.read().await.len()
    }

    pub async fn comment_count(&self) -> usize {
        self.comments.read().await.len()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn insert_post(&self, post: NewPost) -> StoreResult<String> {
        let id = ObjectId::new().to_hex();
        self.posts.write().await.push(PostRecord {
            id: id.clone(),
            author_id: post.author_id,
            title: post.title,
            content: post.content,
        });
        Ok(id)
    }

    async fn find_post(&self, id: &str) -> StoreResult<Option<PostRecord>> {
        Ok(self.posts.read().await.iter().find(|p| p.id == id).cloned())
    }

    async fn find_posts(&self) -> StoreResult<Vec<PostRecord>> {
        Ok(self.posts.read().await.clone())
    }

    async fn insert_comment(&self, comment: NewComment) -> StoreResult<String> {
        let id = ObjectId::new().to_hex();
        self.comments.write().await.push(CommentRecord {
            id: id.clone(),
            post_id: comment.post_id,
            author_id: Some(comment.author_id),
            content: comment.content,
        });
        Ok(id)
    }

    async fn find_comment(&self, id: &str) -> StoreResult<Option<CommentRecord>> {
        Ok(self
            .comments
            .read()
            .await
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn find_comments_by_post(&self, post_id: &str) -> StoreResult<Vec<CommentRecord>> {
        Ok(self
            .comments
            .read()
            .await
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect())
    }
}
