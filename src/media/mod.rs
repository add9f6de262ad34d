//! Remote media hosting for avatars, course posters and lecture videos.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub mod s3;
pub mod services;

pub use services::{AssetSlot, MediaAssets};

/// Reference to a file stored on the media host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub url: String,
}

impl Asset {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }

    /// Placeholders are never uploaded, so they are never destroyed either.
    pub fn is_placeholder(&self) -> bool {
        self.id.starts_with("placeholder_")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn folder(self) -> &'static str {
        match self {
            MediaKind::Image => "images",
            MediaKind::Video => "videos",
        }
    }
}

/// A file received from a client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub body: Bytes,
    pub content_type: String,
    pub file_name: Option<String>,
}

#[async_trait]
pub trait MediaGateway: Send + Sync {
    async fn upload(&self, body: Bytes, content_type: &str, kind: MediaKind) -> anyhow::Result<Asset>;
    async fn destroy(&self, asset_id: &str, kind: MediaKind) -> anyhow::Result<()>;
}
