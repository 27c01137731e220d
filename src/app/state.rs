//! Application state shared across routes

use std::sync::Arc;

use crate::assets::{AssetError, HttpAssetLoader, TextureCache};
use crate::config::Config;
use crate::game::{Iteration, MatchRegistry, MatchSettings};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub match_registry: Arc<MatchRegistry>,
    pub asset_loader: HttpAssetLoader,
    pub textures: TextureCache,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, AssetError> {
        let config = Arc::new(config);

        // One HTTP client and texture cache for every scene
        let asset_loader = HttpAssetLoader::new(config.asset_timeout)?;
        let textures = TextureCache::new();

        Ok(Self {
            config,
            match_registry: Arc::new(MatchRegistry::new()),
            asset_loader,
            textures,
        })
    }

    /// Scene settings from configuration, with an optional ruleset override
    pub fn match_settings(&self, iteration: Option<Iteration>) -> MatchSettings {
        MatchSettings {
            iteration: iteration.unwrap_or(self.config.default_iteration),
            frame_rate: self.config.frame_rate,
            snapshot_rate: self.config.snapshot_rate,
            preload_assets: self.config.preload_assets,
        }
    }
}
