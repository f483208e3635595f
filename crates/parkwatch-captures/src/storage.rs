use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;

/// Object storage for captured frames.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Store `data` under `key` and return the URL viewers fetch it from.
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<String>;
}

/// Writes frames below a local directory that the gateway serves statically.
pub struct LocalImageStore {
    root: PathBuf,
    public_prefix: String,
}

impl LocalImageStore {
    pub fn new(root: impl Into<PathBuf>, public_prefix: &str) -> Self {
        Self {
            root: root.into(),
            public_prefix: public_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<String> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;
        debug!(path = %path.display(), bytes = data.len(), content_type, "frame stored");
        Ok(format!("{}/{}", self.public_prefix, key))
    }
}

/// `captures/YYYY/MM/DD/{camera}_{id8}{ext}`.
///
/// The camera id is reduced to `[A-Za-z0-9_-]` and the extension defaults to
/// `.jpg`, so the key is always a safe relative path.
pub fn object_key(at: DateTime<Utc>, camera_id: &str, filename: &str) -> String {
    let camera: String = camera_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_else(|| ".jpg".to_string());
    let id = Uuid::new_v4().simple().to_string();

    format!("captures/{}/{}_{}{}", at.format("%Y/%m/%d"), camera, &id[..8], ext)
}
