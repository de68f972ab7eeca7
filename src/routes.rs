// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, quiz},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Register and login are public; everything else requires a live session.
/// * Export and revoke additionally require the admin flag.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let authenticated = || middleware::from_fn_with_state(state.clone(), auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .merge(
            Router::new()
                .route("/logout", post(auth::logout))
                .route("/change-password", post(auth::change_password))
                .layer(authenticated()),
        );

    let admin_quiz_routes = Router::new()
        .route("/{uuid}/export", post(quiz::export_quiz))
        .route("/{uuid}/revoke", post(quiz::revoke_quiz))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(authenticated());

    let quiz_routes = Router::new()
        .route("/{uuid}/status", get(quiz::quiz_status))
        .route("/{uuid}/answers", post(quiz::submit_answer))
        .route("/{uuid}/leaderboard", get(quiz::get_leaderboard))
        .layer(authenticated())
        .merge(admin_quiz_routes);

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/quizzes", quiz_routes)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::broker::MemoryBroker;
    use crate::config::{BrokerConfig, CacheConfig, Config, SessionConfig};
    use crate::state::Backends;
    use crate::stores::{
        MemoryArtifactStore, MemoryKeyValueStore, MemoryNotifier, MemoryQuizGraphReader,
        MemoryUserDirectory,
    };
    use crate::wide_column::MemoryCluster;

    async fn router() -> Router {
        let config = Config {
            database_url: String::new(),
            jwt_secret: "router-secret".into(),
            rust_log: "error".into(),
            bind_addr: "127.0.0.1:0".into(),
            artifact_root: String::new(),
            notification_url: None,
            broker: BrokerConfig::default(),
            session: SessionConfig::new("router-secret"),
            cache: CacheConfig::default(),
            admin_username: None,
            admin_password: None,
            admin_full_name: None,
        };
        let backends = Backends {
            users: Arc::new(MemoryUserDirectory::new()),
            quizzes: Arc::new(MemoryQuizGraphReader::new()),
            artifacts: Arc::new(MemoryArtifactStore::new()),
            notifier: Arc::new(MemoryNotifier::new()),
            kv: Arc::new(MemoryKeyValueStore::new()),
            cql: Arc::new(MemoryCluster::new()),
            transport: Arc::new(MemoryBroker::new()),
        };
        let (state, _consumers) = AppState::start(config, backends).await;
        create_router(state)
    }

    #[tokio::test]
    async fn missing_token_is_a_structured_401() {
        let response = router()
            .await
            .oneshot(
                Request::builder()
                    .uri("/api/quizzes/7f1c9a52-4a9e-4c1e-9d4b-2a7f0e0c1b11/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], 401);
        assert_eq!(json["message"], "auth error: authorization header is required");
    }

    #[tokio::test]
    async fn login_only_accepts_post() {
        let response = router()
            .await
            .oneshot(
                Request::builder()
                    .uri("/api/auth/login")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
