use async_trait::async_trait;
use db_pool::{inserted_id_to_string, object_id_to_string, parse_object_id};
use futures_util::TryStreamExt;
use mongodb::bson::doc;
use mongodb::bson::oid::ObjectId;
use mongodb::{Collection, Database};
use serde::{Deserialize, Serialize};
use tracing::error;

use super::{
    CommentRecord, ContentStore, NewComment, NewPost, PostRecord, StoreError, StoreResult,
};
use crate::metrics;

pub const POSTS_COLLECTION: &str = "posts";
pub const COMMENTS_COLLECTION: &str = "comments";

#[derive(Debug, Serialize, Deserialize)]
struct PostDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    #[serde(rename = "authorId", default)]
    author_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

impl PostDocument {
    fn into_record(self) -> Option<PostRecord> {
        Some(PostRecord {
            id: object_id_to_string(&self.id?),
            author_id: self.author_id,
            title: self.title,
            content: self.content,
        })
    }
}

// postId is kept in string form so lookups by post match what clients send.
#[derive(Debug, Serialize, Deserialize)]
struct CommentDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    #[serde(rename = "postId", default)]
    post_id: String,
    #[serde(rename = "authorId", skip_serializing_if = "Option::is_none")]
    author_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

impl CommentDocument {
    fn into_record(self) -> Option<CommentRecord> {
        Some(CommentRecord {
            id: object_id_to_string(&self.id?),
            post_id: self.post_id,
            author_id: self.author_id,
            content: self.content,
        })
    }
}

/// MongoDB-backed content store
#[derive(Clone)]
pub struct MongoContentStore {
    posts: Collection<PostDocument>,
    comments: Collection<CommentDocument>,
}

impl MongoContentStore {
    pub fn new(db: &Database) -> Self {
        Self {
            posts: db.collection(POSTS_COLLECTION),
            comments: db.collection(COMMENTS_COLLECTION),
        }
    }
}

fn observe<T>(
    collection: &'static str,
    operation: &'static str,
    result: Result<T, mongodb::error::Error>,
) -> StoreResult<T> {
    metrics::STORE_OPERATIONS_TOTAL
        .with_label_values(&[collection, operation])
        .inc();
    result.map_err(|e| {
        metrics::STORE_ERRORS_TOTAL
            .with_label_values(&[collection, operation])
            .inc();
        error!(collection, operation, error = %e, "Document store operation failed");
        StoreError::from(e)
    })
}

fn generated_id(id: &mongodb::bson::Bson) -> StoreResult<String> {
    inserted_id_to_string(id)
        .ok_or_else(|| StoreError::Database(format!("unexpected inserted id: {}", id)))
}

#[async_trait]
impl ContentStore for MongoContentStore {
    async fn insert_post(&self, post: NewPost) -> StoreResult<String> {
        let document = PostDocument {
            id: None,
            author_id: post.author_id,
            title: post.title,
            content: post.content,
        };
        let result = observe(
            POSTS_COLLECTION,
            "insert_one",
            self.posts.insert_one(&document).await,
        )?;
        generated_id(&result.inserted_id)
    }

    async fn find_post(&self, id: &str) -> StoreResult<Option<PostRecord>> {
        let Some(oid) = parse_object_id(id) else {
            return Ok(None);
        };
        let found = observe(
            POSTS_COLLECTION,
            "find_one",
            self.posts.find_one(doc! { "_id": oid }).await,
        )?;
        Ok(found.and_then(PostDocument::into_record))
    }

    async fn find_posts(&self) -> StoreResult<Vec<PostRecord>> {
        let cursor = observe(POSTS_COLLECTION, "find", self.posts.find(doc! {}).await)?;
        let documents: Vec<PostDocument> =
            observe(POSTS_COLLECTION, "find", cursor.try_collect().await)?;
        Ok(documents
            .into_iter()
            .filter_map(PostDocument::into_record)
            .collect())
    }

    async fn insert_comment(&self, comment: NewComment) -> StoreResult<String> {
        let document = CommentDocument {
            id: None,
            post_id: comment.post_id,
            author_id: Some(comment.author_id),
            content: comment.content,
        };
        let result = observe(
            COMMENTS_COLLECTION,
            "insert_one",
            self.comments.insert_one(&document).await,
        )?;
        generated_id(&result.inserted_id)
    }

    async fn find_comment(&self, id: &str) -> StoreResult<Option<CommentRecord>> {
        let Some(oid) = parse_object_id(id) else {
            return Ok(None);
        };
        let found = observe(
            COMMENTS_COLLECTION,
            "find_one",
            self.comments.find_one(doc! { "_id": oid }).await,
        )?;
        Ok(found.and_then(CommentDocument::into_record))
    }

    async fn find_comments_by_post(&self, post_id: &str) -> StoreResult<Vec<CommentRecord>> {
        let cursor = observe(
            COMMENTS_COLLECTION,
            "find",
            self.comments.find(doc! { "postId": post_id }).await,
        )?;
        let documents: Vec<CommentDocument> =
            observe(COMMENTS_COLLECTION, "find", cursor.try_collect().await)?;
        Ok(documents
            .into_iter()
            .filter_map(CommentDocument::into_record)
            .collect())
    }
}
