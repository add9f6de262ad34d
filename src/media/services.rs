use std::sync::Arc;

use tracing::{info, warn};

use super::{Asset, MediaGateway, MediaKind, Upload};

/// What an asset is used for; decides its media kind and placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetSlot {
    Avatar,
    Poster,
    Video,
}

impl AssetSlot {
    pub fn kind(self) -> MediaKind {
        match self {
            AssetSlot::Avatar | AssetSlot::Poster => MediaKind::Image,
            AssetSlot::Video => MediaKind::Video,
        }
    }

    pub fn placeholder(self) -> Asset {
        match self {
            AssetSlot::Avatar => Asset::new(
                "placeholder_avatar",
                "https://via.placeholder.com/150.png?text=Avatar",
            ),
            AssetSlot::Poster => Asset::new(
                "placeholder_poster",
                "https://via.placeholder.com/800x450.png?text=Course+Poster",
            ),
            AssetSlot::Video => Asset::new(
                "placeholder_video",
                "https://www.w3schools.com/html/mov_bbb.mp4",
            ),
        }
    }
}

/// Media gateway access with the placeholder and best-effort cleanup policy applied.
///
/// Without a gateway every upload resolves to the slot placeholder and no
/// network call is made. Gateway failures never fail the calling operation.
#[derive(Clone, Default)]
pub struct MediaAssets {
    gateway: Option<Arc<dyn MediaGateway>>,
}

impl MediaAssets {
    pub fn new(gateway: Arc<dyn MediaGateway>) -> Self {
        Self {
            gateway: Some(gateway),
        }
    }

    pub fn disabled() -> Self {
        Self { gateway: None }
    }

    /// Asset for a newly created entity. Falls back to the slot placeholder.
    pub async fn store(&self, file: Option<Upload>, slot: AssetSlot) -> Asset {
        match file {
            Some(file) => self.try_upload(file, slot).await.unwrap_or_else(|| slot.placeholder()),
            None => slot.placeholder(),
        }
    }

    /// Uploaded asset, or `None` when the gateway is disabled or failed. The
    /// caller decides what to keep in that case.
    pub async fn upload(&self, file: Upload, slot: AssetSlot) -> Option<Asset> {
        self.try_upload(file, slot).await
    }

    /// Best-effort removal; failures are logged and swallowed.
    pub async fn discard(&self, asset: &Asset, slot: AssetSlot) {
        let Some(gateway) = &self.gateway else {
            return;
        };
        if asset.is_placeholder() || asset.id.is_empty() {
            return;
        }
        if let Err(e) = gateway.destroy(&asset.id, slot.kind()).await {
            warn!(error = %e, asset_id = %asset.id, ?slot, "media cleanup failed (non-fatal)");
        }
    }

    async fn try_upload(&self, file: Upload, slot: AssetSlot) -> Option<Asset> {
        let Some(gateway) = &self.gateway else {
            info!(?slot, "media gateway disabled; using placeholder");
            return None;
        };
        match gateway.upload(file.body, &file.content_type, slot.kind()).await {
            Ok(asset) => Some(asset),
            Err(e) => {
                warn!(error = %e, ?slot, "media upload failed (non-fatal); falling back");
                None
            }
        }
    }
}

pub(crate) fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        "video/quicktime" => Some("mov"),
        _ => None,
    }
}
