use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use tracing::debug;
use uuid::Uuid;

use super::{services::ext_from_mime, Asset, MediaGateway, MediaKind};
use crate::config::MediaConfig;

/// Media host backed by an S3-compatible bucket.
#[derive(Clone)]
pub struct S3Gateway {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl S3Gateway {
    pub async fn new(cfg: &MediaConfig) -> anyhow::Result<Self> {
        let mut loader = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(Credentials::new(
                &cfg.access_key,
                &cfg.secret_key,
                None,
                None,
                "static",
            ));
        if let Some(endpoint) = &cfg.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;

        let mut builder = S3ConfigBuilder::from(&shared);
        if let Some(endpoint) = &cfg.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: cfg.bucket.clone(),
            public_base_url: cfg.public_base_url(),
        })
    }

    fn object_key(kind: MediaKind, content_type: &str) -> String {
        let ext = ext_from_mime(content_type).unwrap_or("bin");
        format!("{}/{}.{}", kind.folder(), Uuid::new_v4(), ext)
    }
}

#[async_trait]
impl MediaGateway for S3Gateway {
    async fn upload(&self, body: Bytes, content_type: &str, kind: MediaKind) -> anyhow::Result<Asset> {
        let key = Self::object_key(kind, content_type);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .with_context(|| format!("s3 put_object {}", key))?;
        debug!(key = %key, "media uploaded");
        let url = format!("{}/{}", self.public_base_url, key);
        Ok(Asset::new(key, url))
    }

    async fn destroy(&self, asset_id: &str, _kind: MediaKind) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(asset_id)
            .send()
            .await
            .with_context(|| format!("s3 delete_object {}", asset_id))?;
        debug!(key = %asset_id, "media destroyed");
        Ok(())
    }
}
