// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::broker::{
    BrokerTransport, ConsumerGroup, HandlerRegistry, LogOnlyHandler, MessageBroker,
};
use crate::config::Config;
use crate::services::{
    ExportHandler, LeaderboardReader, ProgressService, PublishOrchestrator, RevokeHandler,
    SessionAuth,
};
use crate::stores::{
    ArtifactStore, CacheClient, KeyValueStore, Notifier, QuizGraphReader, UserDirectory,
};
use crate::wide_column::{CqlSession, WideColumnRepository};

/// External systems the service talks to.
pub struct Backends {
    pub users: Arc<dyn UserDirectory>,
    pub quizzes: Arc<dyn QuizGraphReader>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub notifier: Arc<dyn Notifier>,
    pub kv: Arc<dyn KeyValueStore>,
    pub cql: Arc<dyn CqlSession>,
    pub transport: Arc<dyn BrokerTransport>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub users: Arc<dyn UserDirectory>,
    pub sessions: Arc<SessionAuth>,
    pub broker: Arc<MessageBroker>,
    pub leaderboard: LeaderboardReader,
    pub progress: ProgressService,
}

impl AppState {
    /// Builds every component from `config` and starts the topic consumers.
    ///
    /// The returned `ConsumerGroup` must be shut down before
    /// `MessageBroker::close` on exit.
    pub async fn start(config: Config, backends: Backends) -> (Self, ConsumerGroup) {
        let broker = Arc::new(MessageBroker::connect(config.broker.clone(), backends.transport).await);
        let repo = WideColumnRepository::new(backends.cql);
        let cache = CacheClient::new(backends.kv.clone(), config.cache.store_timeout);

        let orchestrator = Arc::new(PublishOrchestrator::new(
            backends.quizzes,
            backends.artifacts,
            repo.clone(),
            backends.notifier,
            cache.clone(),
        ));
        let registry = HandlerRegistry::new(
            Arc::new(ExportHandler(orchestrator.clone())),
            Arc::new(RevokeHandler(orchestrator)),
            Arc::new(LogOnlyHandler),
        );
        let consumers = broker
            .start_consuming(&config.broker.topics, Arc::new(registry))
            .await;

        let state = Self {
            users: backends.users,
            sessions: Arc::new(SessionAuth::new(config.session.clone(), backends.kv)),
            leaderboard: LeaderboardReader::new(repo.clone(), cache, &config.cache),
            progress: ProgressService::new(repo, broker.clone()),
            broker,
            config,
        };
        (state, consumers)
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<dyn UserDirectory> {
    fn from_ref(state: &AppState) -> Self {
        state.users.clone()
    }
}

impl FromRef<AppState> for Arc<SessionAuth> {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

impl FromRef<AppState> for Arc<MessageBroker> {
    fn from_ref(state: &AppState) -> Self {
        state.broker.clone()
    }
}

impl FromRef<AppState> for LeaderboardReader {
    fn from_ref(state: &AppState) -> Self {
        state.leaderboard.clone()
    }
}

impl FromRef<AppState> for ProgressService {
    fn from_ref(state: &AppState) -> Self {
        state.progress.clone()
    }
}
