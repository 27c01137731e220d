//! Game simulation modules

pub mod constants;
pub mod entity;
pub mod goal;
pub mod input;
pub mod r#match;
pub mod physics;
pub mod rules;
pub mod scene;
pub mod score;
pub mod snapshot;

pub use r#match::{MatchHandle, MatchRegistry, MatchSettings, MatchStatus, SceneCommand};
pub use rules::Iteration;
pub use score::MatchScore;
