/// Database operations for identity service
pub mod users;

pub use users::{
    duplicate_key_error, user_indexes, MemoryUserRepository, MongoUserRepository, UserRepository,
    USERS_COLLECTION,
};
