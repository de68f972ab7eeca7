// tests/common/mod.rs

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use quiz_api::broker::{ConsumerGroup, MemoryBroker};
use quiz_api::config::{BrokerConfig, CacheConfig, Config, SessionConfig};
use quiz_api::models::quiz::{Answer, Question, Quiz};
use quiz_api::models::user::User;
use quiz_api::routes;
use quiz_api::state::{AppState, Backends};
use quiz_api::stores::{
    MemoryArtifactStore, MemoryKeyValueStore, MemoryNotifier, MemoryQuizGraphReader,
    MemoryUserDirectory,
};
use quiz_api::utils::hash::hash_password;
use quiz_api::wide_column::MemoryCluster;
use uuid::Uuid;

pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub users: Arc<MemoryUserDirectory>,
    pub quizzes: Arc<MemoryQuizGraphReader>,
    pub artifacts: Arc<MemoryArtifactStore>,
    pub notifier: Arc<MemoryNotifier>,
    pub consumers: ConsumerGroup,
}

/// Spawns the app on a random port with every collaborator in memory.
pub async fn spawn_app() -> TestApp {
    let config = Config {
        database_url: String::new(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        artifact_root: String::new(),
        notification_url: None,
        broker: BrokerConfig {
            max_wait: Duration::from_millis(20),
            ..BrokerConfig::default()
        },
        session: SessionConfig::new("test_secret_for_integration_tests"),
        cache: CacheConfig::default(),
        admin_username: None,
        admin_password: None,
        admin_full_name: None,
    };

    let users = Arc::new(MemoryUserDirectory::new());
    let quizzes = Arc::new(MemoryQuizGraphReader::new());
    let artifacts = Arc::new(MemoryArtifactStore::new());
    let notifier = Arc::new(MemoryNotifier::new());

    let backends = Backends {
        users: users.clone(),
        quizzes: quizzes.clone(),
        artifacts: artifacts.clone(),
        notifier: notifier.clone(),
        kv: Arc::new(MemoryKeyValueStore::new()),
        cql: Arc::new(MemoryCluster::new()),
        transport: Arc::new(MemoryBroker::new()),
    };
    let (state, consumers) = AppState::start(config, backends).await;
    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
        users,
        quizzes,
        artifacts,
        notifier,
        consumers,
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub fn add_user(&self, admin: bool) -> User {
        let user = User {
            id: rand_id(),
            uuid: Uuid::new_v4(),
            username: format!("u_{}", &Uuid::new_v4().to_string()[..8]),
            password: hash_password(PASSWORD).unwrap(),
            full_name: if admin { "Quiz Master" } else { "Player One" }.to_string(),
            is_admin: admin,
        };
        self.users.put(user.clone());
        user
    }

    /// Logs in and returns the bearer token.
    pub async fn login(&self, username: &str) -> String {
        let resp: serde_json::Value = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&serde_json::json!({ "username": username, "password": PASSWORD }))
            .send()
            .await
            .expect("Login failed")
            .json()
            .await
            .expect("Failed to parse login json");
        resp["data"]["token"]
            .as_str()
            .expect("Token not found")
            .to_string()
    }

    /// Waits until `n` notifications have been recorded.
    pub async fn wait_for_notifications(&self, n: usize) -> Vec<(String, String)> {
        for _ in 0..250 {
            let sent = self.notifier.sent();
            if sent.len() >= n {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("expected {n} notifications, got {:?}", self.notifier.sent());
    }
}

fn rand_id() -> i64 {
    (Uuid::new_v4().as_u128() >> 72) as i64
}

/// Quiz with the given time limits; the first answer of each question is correct.
pub fn sample_quiz(limits: &[i32]) -> Quiz {
    Quiz {
        uuid: Uuid::new_v4(),
        title: "World Capitals".to_string(),
        is_published: true,
        questions: limits
            .iter()
            .enumerate()
            .map(|(i, limit)| Question {
                uuid: Uuid::new_v4(),
                description: format!("Question {}", i + 1),
                position: i as i32 + 1,
                time_limit: *limit,
                answers: (0..3)
                    .map(|a| Answer {
                        uuid: Uuid::new_v4(),
                        description: format!("Option {a}"),
                        is_correct: a == 0,
                    })
                    .collect(),
            })
            .collect(),
        created_at: None,
        updated_at: None,
    }
}
