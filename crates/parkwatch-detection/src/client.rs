use std::time::Duration;

use async_trait::async_trait;
use parkwatch_core::config::ClassifierConfig;
use tracing::{debug, warn};

use crate::error::ClassifierError;
use crate::types::{Classification, Frame};

/// Anything that can turn a camera frame into per-slot occupancy.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Name for logging.
    fn name(&self) -> &str;

    async fn classify(&self, frame: &Frame) -> Result<Classification, ClassifierError>;
}

/// Remote detection service reached over HTTP.
///
/// Posts the frame as multipart field `image` to `{endpoint}/analyze`.
pub struct HttpClassifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpClassifier {
    pub fn new(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    fn name(&self) -> &str {
        "http"
    }

    async fn classify(&self, frame: &Frame) -> Result<Classification, ClassifierError> {
        let url = format!("{}/analyze", self.endpoint);
        let part = reqwest::multipart::Part::bytes(frame.data.clone())
            .file_name(frame.filename.clone())
            .mime_str(&frame.content_type)?;
        let form = reqwest::multipart::Form::new().part("image", part);

        debug!(%url, bytes = frame.data.len(), "sending frame to classifier");

        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    ClassifierError::Unavailable(e.to_string())
                } else {
                    ClassifierError::Http(e)
                }
            })?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "classifier API error");
            return Err(ClassifierError::Api {
                status,
                message: text,
            });
        }

        let body = resp.text().await?;
        parse_classification(&body)
    }
}

/// Decode the service's JSON answer.
pub fn parse_classification(body: &str) -> Result<Classification, ClassifierError> {
    let parsed: Classification =
        serde_json::from_str(body).map_err(|e| ClassifierError::Parse(e.to_string()))?;
    if !parsed.success {
        return Err(ClassifierError::Rejected);
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Multipart;
    use axum::routing::post;
    use axum::{Json, Router};

    #[test]
    fn parses_service_response() {
        let body = r#"{
            "success": true,
            "vehicles_detected": 2,
            "slot_status": {"A1": true, "A2": false, "B1": true},
            "timestamp": "2026-05-01T10:00:00"
        }"#;
        let c = parse_classification(body).unwrap();
        assert_eq!(c.vehicles_detected, 2);
        assert_eq!(c.slot_status.len(), 3);
        assert_eq!(c.slot_status.get("A1"), Some(&true));
        assert_eq!(c.timestamp.as_deref(), Some("2026-05-01T10:00:00"));
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let c = parse_classification("{}").unwrap();
        assert!(c.slot_status.is_empty());
        assert_eq!(c.vehicles_detected, 0);
    }

    #[test]
    fn unsuccessful_response_is_rejected() {
        let err = parse_classification(r#"{"success": false}"#).unwrap_err();
        assert!(matches!(err, ClassifierError::Rejected));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = parse_classification("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, ClassifierError::Parse(_)));
        let err = parse_classification(r#"{"slot_status": {"A1": "yes"}}"#).unwrap_err();
        assert!(matches!(err, ClassifierError::Parse(_)));
    }

    fn frame() -> Frame {
        Frame {
            data: vec![0xff, 0xd8, 0xff, 0xe0],
            filename: "frame.jpg".into(),
            content_type: "image/jpeg".into(),
        }
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn config(endpoint: String) -> ClassifierConfig {
        ClassifierConfig {
            endpoint,
            timeout_secs: 5,
            enabled: true,
        }
    }

    #[tokio::test]
    async fn posts_multipart_image_to_analyze() {
        async fn analyze(mut multipart: Multipart) -> Json<serde_json::Value> {
            let mut size = 0;
            while let Some(field) = multipart.next_field().await.unwrap() {
                if field.name() == Some("image") {
                    size = field.bytes().await.unwrap().len();
                }
            }
            Json(serde_json::json!({
                "success": true,
                "vehicles_detected": size,
                "slot_status": {"A1": true}
            }))
        }

        let base = serve(Router::new().route("/analyze", post(analyze))).await;
        let classifier = HttpClassifier::new(&config(format!("{base}/"))).unwrap();
        assert_eq!(classifier.endpoint(), base);

        let c = classifier.classify(&frame()).await.unwrap();
        assert_eq!(c.vehicles_detected, 4);
        assert_eq!(c.slot_status.get("A1"), Some(&true));
    }

    #[tokio::test]
    async fn non_success_status_is_api_error() {
        let base = serve(Router::new().route(
            "/analyze",
            post(|| async { (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "model not loaded") }),
        ))
        .await;
        let classifier = HttpClassifier::new(&config(base)).unwrap();

        match classifier.classify(&frame()).await.unwrap_err() {
            ClassifierError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "model not loaded");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_service_is_unavailable() {
        // Bind then drop so the port is very likely closed.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let classifier = HttpClassifier::new(&config(format!("http://{addr}"))).unwrap();
        let err = classifier.classify(&frame()).await.unwrap_err();
        assert!(matches!(err, ClassifierError::Unavailable(_)));
    }
}
