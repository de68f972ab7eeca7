// src/stores/mod.rs

pub mod artifacts;
pub mod kv;
pub mod notify;
pub mod relational;

pub use artifacts::{ArtifactStore, FsArtifactStore, MemoryArtifactStore};
pub use kv::{CacheClient, KeyValueStore, MemoryKeyValueStore};
pub use notify::{HttpNotifier, MemoryNotifier, Notifier};
pub use relational::{
    MemoryQuizGraphReader, MemoryUserDirectory, PgQuizGraphReader, PgUserDirectory,
    QuizGraphReader, UserDirectory,
};
