/// User database operations for identity-service
use crate::error::{IdentityError, Result};
use crate::models::User;
use async_trait::async_trait;
use db_pool::parse_object_id;
use mongodb::bson::{doc, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Collection, Database, IndexModel};
use tokio::sync::RwLock;
use tracing::info;

pub const USERS_COLLECTION: &str = "users";

pub const EMAIL_INDEX: &str = "local_email_unique";
pub const USERNAME_INDEX: &str = "local_username_unique";
const PROVIDER_INDEX_PREFIX: &str = "providers_";
const PROVIDER_INDEX_SUFFIX: &str = "_id_unique";

/// MongoDB duplicate key error code
const DUPLICATE_KEY: i32 = 11000;

/// Persistence for user records
///
/// Lookups by unknown or malformed ids return `None`. Writes that would give
/// two users the same email, username or provider account fail with
/// `EmailAlreadyExists`, `UsernameAlreadyExists` or `ProviderAccountInUse`.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert(&self, user: &User) -> Result<()>;

    /// Replace the stored record with the same `_id`
    async fn update(&self, user: &User) -> Result<()>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>>;

    /// `email` is expected normalized
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn find_by_provider(&self, provider: &str, provider_user_id: &str)
        -> Result<Option<User>>;
}

/// MongoDB-backed user repository
#[derive(Clone)]
pub struct MongoUserRepository {
    users: Collection<User>,
}

impl MongoUserRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            users: db.collection(USERS_COLLECTION),
        }
    }

    /// Create the unique indexes backing email, username and provider links
    pub async fn ensure_indexes(&self, providers: &[String]) -> Result<()> {
        self.users.create_indexes(user_indexes(providers)).await?;
        info!(providers = ?providers, "User indexes ensured");
        Ok(())
    }
}

fn unique_when_present(field: &str, name: String) -> IndexModel {
    let mut keys = Document::new();
    keys.insert(field, 1);
    let mut present = Document::new();
    present.insert(field, doc! { "$exists": true });

    IndexModel::builder()
        .keys(keys)
        .options(
            IndexOptions::builder()
                .name(name)
                .unique(true)
                .partial_filter_expression(present)
                .build(),
        )
        .build()
}

/// Unique partial indexes; documents without the field are not constrained
pub fn user_indexes(providers: &[String]) -> Vec<IndexModel> {
    let mut indexes = vec![
        unique_when_present("local.email", EMAIL_INDEX.to_string()),
        unique_when_present("local.username", USERNAME_INDEX.to_string()),
    ];
    for provider in providers {
        indexes.push(unique_when_present(
            &format!("providers.{}.id", provider),
            format!("{}{}{}", PROVIDER_INDEX_PREFIX, provider, PROVIDER_INDEX_SUFFIX),
        ));
    }
    indexes
}

/// Domain error for a duplicate key message naming one of [`user_indexes`]
pub fn duplicate_key_error(message: &str) -> Option<IdentityError> {
    if message.contains(EMAIL_INDEX) {
        return Some(IdentityError::EmailAlreadyExists);
    }
    if message.contains(USERNAME_INDEX) {
        return Some(IdentityError::UsernameAlreadyExists);
    }
    let start = message.find(PROVIDER_INDEX_PREFIX)? + PROVIDER_INDEX_PREFIX.len();
    let rest = &message[start..];
    let end = rest.find(PROVIDER_INDEX_SUFFIX)?;
    Some(IdentityError::ProviderAccountInUse(rest[..end].to_string()))
}

fn write_error(err: mongodb::error::Error) -> IdentityError {
    if let ErrorKind::Write(WriteFailure::WriteError(failure)) = err.kind.as_ref() {
        if failure.code == DUPLICATE_KEY {
            if let Some(mapped) = duplicate_key_error(&failure.message) {
                return mapped;
            }
        }
    }
    err.into()
}

#[async_trait]
impl UserRepository for MongoUserRepository {
    async fn insert(&self, user: &User) -> Result<()> {
        self.users.insert_one(user).await.map_err(write_error)?;
        Ok(())
    }

    async fn update(&self, user: &User) -> Result<()> {
        self.users
            .replace_one(doc! { "_id": user.id }, user)
            .await
            .map_err(write_error)?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        let Some(oid) = parse_object_id(id) else {
            return Ok(None);
        };
        Ok(self.users.find_one(doc! { "_id": oid }).await?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.users.find_one(doc! { "local.email": email }).await?)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .find_one(doc! { "local.username": username })
            .await?)
    }

    async fn find_by_provider(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<Option<User>> {
        let mut filter = Document::new();
        filter.insert(format!("providers.{}.id", provider), provider_user_id);
        Ok(self.users.find_one(filter).await?)
    }
}

/// In-process user repository for tests and local runs
#[derive(Default)]
pub struct MemoryUserRepository {
    users: RwLock<Vec<User>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }

    async fn find(&self, predicate: impl Fn(&User) -> bool) -> Option<User> {
        self.users
            .read()
            .await
            .iter()
            .find(|u| predicate(u))
            .cloned()
    }
}

fn username(user: &User) -> Option<&str> {
    user.local.as_ref().and_then(|l| l.username.as_deref())
}

/// Same constraints as the unique indexes, checked against every other user
fn conflict(users: &[User], user: &User) -> Option<IdentityError> {
    let others = || users.iter().filter(|u| u.id != user.id);

    if let Some(email) = user.email() {
        if others().any(|u| u.email() == Some(email)) {
            return Some(IdentityError::EmailAlreadyExists);
        }
    }
    if let Some(name) = username(user) {
        if others().any(|u| username(u) == Some(name)) {
            return Some(IdentityError::UsernameAlreadyExists);
        }
    }
    user.providers.iter().find_map(|(provider, link)| {
        others()
            .any(|u| u.providers.get(provider).map(|l| l.id == link.id).unwrap_or(false))
            .then(|| IdentityError::ProviderAccountInUse(provider.clone()))
    })
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn insert(&self, user: &User) -> Result<()> {
        let mut users = self.users.write().await;
        if let Some(err) = conflict(&users, user) {
            return Err(err);
        }
        users.push(user.clone());
        Ok(())
    }

    async fn update(&self, user: &User) -> Result<()> {
        let mut users = self.users.write().await;
        if let Some(err) = conflict(&users, user) {
            return Err(err);
        }
        if let Some(existing) = users.iter_mut().find(|u| u.id == user.id) {
            *existing = user.clone();
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(self.find(|u| u.id_string() == id).await)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.find(|u| u.email() == Some(email)).await)
    }

    async fn find_by_username(&self, name: &str) -> Result<Option<User>> {
        Ok(self.find(|u| username(u) == Some(name)).await)
    }

    async fn find_by_provider(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<Option<User>> {
        Ok(self
            .find(|u| {
                u.providers
                    .get(provider)
                    .map(|link| link.id == provider_user_id)
                    .unwrap_or(false)
            })
            .await)
    }
}
