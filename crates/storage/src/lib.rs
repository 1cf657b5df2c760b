#![forbid(unsafe_code)]

pub mod feed;
pub mod repository;
pub mod sqlite;

pub use feed::{ProgressFeed, ProgressSubscription};
pub use repository::{
    InMemoryRepository, PendingProgressRepository, ProgressRepository, Storage, StorageError,
    UserRepository,
};
