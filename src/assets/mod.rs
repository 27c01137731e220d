//! Image assets preloaded before the game scene

pub mod loader;
pub mod manifest;

pub use loader::{AssetError, AssetLoader, HttpAssetLoader, TextureCache};
pub use manifest::{AssetRef, MANIFEST};
