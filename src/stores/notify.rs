// src/stores/notify.rs

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use url::Url;

use crate::error::{AppError, AppResult};

#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn notify(&self, socket_id: &str, message: &str) -> AppResult<()>;
}

/// POSTs `{socket_id, data}` to the room service.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    url: Option<Url>,
    http: reqwest::Client,
}

impl HttpNotifier {
    pub fn new(url: Option<Url>) -> Self {
        let http = match reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
        {
            Ok(client) => client,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to configure reqwest client; using defaults");
                reqwest::Client::new()
            }
        };
        Self { url, http }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, socket_id: &str, message: &str) -> AppResult<()> {
        let url = self
            .url
            .clone()
            .ok_or_else(|| AppError::Validation("NOTIFICATION_URL is not set".to_string()))?;

        let resp = self
            .http
            .post(url)
            .json(&json!({ "socket_id": socket_id, "data": message }))
            .send()
            .await
            .map_err(|e| AppError::TransientStore(format!("failed to send notification: {e}")))?;

        if resp.status() != reqwest::StatusCode::OK {
            return Err(AppError::TransientStore(format!(
                "notification failed with status: {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

/// Records every notification instead of sending it.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(socket_id, message)` pairs in send order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn notify(&self, socket_id: &str, message: &str) -> AppResult<()> {
        self.sent
            .lock()
            .map_err(|_| AppError::Internal("lock poisoned".into()))?
            .push((socket_id.to_string(), message.to_string()));
        Ok(())
    }
}
