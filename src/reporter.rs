use crate::snapshot::Heartbeat;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("не удалось закодировать JSON: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("ошибка отправки: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("сервер вернул статус {0}")]
    Status(u16),
}

/// Fire-and-forget JSON delivery: one POST per call, no retry or queueing.
#[derive(Clone)]
pub struct Reporter {
    client: Client,
    timeout: Duration,
}

impl Reporter {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .user_agent(concat!("hostsnap/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, timeout }
    }

    pub async fn report<T: Serialize + ?Sized>(
        &self,
        record: &T,
        endpoint: &str,
    ) -> Result<(), ReportError> {
        let result = self.post_json(record, endpoint).await;
        match &result {
            Ok(()) => info!(endpoint = %endpoint, "отчёт доставлен"),
            Err(err) => warn!(endpoint = %endpoint, error = %err, "отчёт не доставлен"),
        }
        result
    }

    pub async fn heartbeat(&self, endpoint: &str) -> Result<(), ReportError> {
        self.heartbeat_at(endpoint, Utc::now().timestamp()).await
    }

    async fn heartbeat_at(&self, endpoint: &str, timestamp: i64) -> Result<(), ReportError> {
        self.report(&Heartbeat::online(timestamp), endpoint).await
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        record: &T,
        endpoint: &str,
    ) -> Result<(), ReportError> {
        let body = serde_json::to_vec(record)?;
        let resp = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::OK {
            Ok(())
        } else {
            Err(ReportError::Status(status.as_u16()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::post;
    use axum::Router;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    type Received = Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>;

    async fn spawn_collector(status: AxumStatus) -> (String, Received) {
        let received: Received = Arc::default();
        let sink = received.clone();
        let app = Router::new().route(
            "/report",
            post(move |headers: HeaderMap, body: String| {
                let sink = sink.clone();
                async move {
                    let content_type = headers
                        .get(axum::http::header::CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    let value = serde_json::from_str(&body).unwrap_or(serde_json::Value::Null);
                    sink.lock().unwrap().push((content_type, value));
                    status
                }
            }),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (format!("http://{addr}/report"), received)
    }

    #[tokio::test]
    async fn report_succeeds_on_200() {
        let (url, received) = spawn_collector(AxumStatus::OK).await;
        let reporter = Reporter::new(Duration::from_secs(5));

        let record = serde_json::json!({ "cpu": { "percent": 12.5 } });
        reporter.report(&record, &url).await.expect("доставка с кодом 200");

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0.as_deref(), Some("application/json"));
        assert_eq!(received[0].1, record);
    }

    #[tokio::test]
    async fn report_fails_on_500() {
        let (url, _received) = spawn_collector(AxumStatus::INTERNAL_SERVER_ERROR).await;
        let reporter = Reporter::new(Duration::from_secs(5));

        let err = reporter
            .report(&serde_json::json!({}), &url)
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::Status(500)));
    }

    #[tokio::test]
    async fn non_200_success_codes_are_failures() {
        let (url, _received) = spawn_collector(AxumStatus::ACCEPTED).await;
        let reporter = Reporter::new(Duration::from_secs(5));

        let err = reporter
            .report(&serde_json::json!({}), &url)
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::Status(202)));
    }

    #[tokio::test]
    async fn report_fails_on_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let reporter = Reporter::new(Duration::from_secs(5));

        let err = reporter
            .report(&serde_json::json!({}), &format!("http://{addr}/report"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::Transport(_)));
    }

    #[tokio::test]
    async fn heartbeat_posts_online_status() {
        let (url, received) = spawn_collector(AxumStatus::OK).await;
        let reporter = Reporter::new(Duration::from_secs(5));

        reporter
            .heartbeat_at(&url, 1_700_000_000)
            .await
            .expect("heartbeat доставлен");

        let received = received.lock().unwrap();
        assert_eq!(
            received[0].1,
            serde_json::json!({ "status": "online", "timestamp": 1_700_000_000 })
        );
    }

    #[tokio::test]
    async fn heartbeat_stamps_current_time() {
        let (url, received) = spawn_collector(AxumStatus::OK).await;
        let reporter = Reporter::new(Duration::from_secs(5));

        let before = Utc::now().timestamp();
        reporter.heartbeat(&url).await.expect("heartbeat доставлен");
        let after = Utc::now().timestamp();

        let received = received.lock().unwrap();
        assert_eq!(received[0].1["status"], "online");
        let stamped = received[0].1["timestamp"].as_i64().expect("числовая метка времени");
        assert!((before..=after).contains(&stamped), "{before} <= {stamped} <= {after}");
    }
}
