// src/services/mod.rs

pub mod flatten;
pub mod leaderboard;
pub mod progress;
pub mod publish;
pub mod session;

pub use leaderboard::LeaderboardReader;
pub use progress::ProgressService;
pub use publish::{ExportHandler, PublishOrchestrator, RevokeHandler};
pub use session::SessionAuth;
