//! Asset fetching and the process-wide texture cache

use bytes::Bytes;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::manifest::AssetRef;

/// Asset loading errors
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("HTTP error fetching {key}: {source}")]
    Http {
        key: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Asset {0} is empty")]
    Empty(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Something that can fetch the bytes of an asset
pub trait AssetLoader: Clone + Send + Sync + 'static {
    fn load(&self, asset: &AssetRef) -> impl Future<Output = Result<Bytes, AssetError>> + Send;
}

/// Fetches assets from their hosted URLs
#[derive(Clone)]
pub struct HttpAssetLoader {
    client: reqwest::Client,
}

impl HttpAssetLoader {
    pub fn new(timeout: Duration) -> Result<Self, AssetError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl AssetLoader for HttpAssetLoader {
    fn load(&self, asset: &AssetRef) -> impl Future<Output = Result<Bytes, AssetError>> + Send {
        let client = self.client.clone();
        let asset = *asset;
        async move {
            let http = |source| AssetError::Http {
                key: asset.key.to_string(),
                source,
            };

            let bytes = client
                .get(asset.url)
                .send()
                .await
                .map_err(http)?
                .error_for_status()
                .map_err(http)?
                .bytes()
                .await
                .map_err(http)?;

            if bytes.is_empty() {
                return Err(AssetError::Empty(asset.key.to_string()));
            }

            debug!(key = asset.key, size = bytes.len(), "Fetched asset");
            Ok(bytes)
        }
    }
}

/// Loaded textures keyed by asset key, shared by every scene
#[derive(Clone, Default)]
pub struct TextureCache {
    textures: Arc<DashMap<String, Bytes>>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.textures.contains_key(key)
    }

    pub fn insert(&self, key: &str, bytes: Bytes) {
        self.textures.insert(key.to_string(), bytes);
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.textures.get(key).map(|b| b.value().clone())
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_is_shared_between_clones() {
        let cache = TextureCache::new();
        let other = cache.clone();
        assert_eq!(cache.len(), 0);

        other.insert("soccer_ball", Bytes::from_static(b"png"));
        assert!(cache.contains("soccer_ball"));
        assert_eq!(cache.get("soccer_ball"), Some(Bytes::from_static(b"png")));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn http_loader_builds() {
        assert!(HttpAssetLoader::new(Duration::from_secs(1)).is_ok());
    }
}
