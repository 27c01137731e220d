//! Fixed asset manifest

use serde::Serialize;

/// A texture key and where to fetch it from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AssetRef {
    pub key: &'static str,
    pub url: &'static str,
}

/// Every image the game scene draws
pub static MANIFEST: [AssetRef; 6] = [
    AssetRef {
        key: "soccer_field_background",
        url: "https://cdn-game-mcp.gambo.ai/676085e5-65fe-4db4-85cb-3be2f7a27e14/images/clean_soccer_field_background.png",
    },
    AssetRef {
        key: "soccer_ball",
        url: "https://cdn-game-mcp.gambo.ai/5c66fbc0-7e63-4a2d-800d-14a844f5c1e0/images/soccer_ball.png",
    },
    AssetRef {
        key: "player1_idle_frame1",
        url: "https://cdn-game-mcp.gambo.ai/b81f2b2f-0ae0-4d02-b06a-9ffbbf27614b/animations/messi_idle_R/frame_1.png",
    },
    AssetRef {
        key: "player2_idle_frame1",
        url: "https://cdn-game-mcp.gambo.ai/d515e62f-46fe-4011-85b6-2dce3bc71fe8/animations/ronaldo_idle_R/frame_1.png",
    },
    AssetRef {
        key: "goal_left",
        url: "https://cdn-game-mcp.gambo.ai/004e6037-b271-4ba5-86d3-cba18a7ddc4d/images/fixed_goal_left.png",
    },
    AssetRef {
        key: "goal_right",
        url: "https://cdn-game-mcp.gambo.ai/6561a879-0e5d-4397-b358-e2757f44865e/images/fixed_goal_right.png",
    },
];

/// Look up a manifest entry by texture key
pub fn find(key: &str) -> Option<&'static AssetRef> {
    MANIFEST.iter().find(|a| a.key == key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::Character;
    use std::collections::HashSet;

    #[test]
    fn keys_are_unique() {
        let keys: HashSet<_> = MANIFEST.iter().map(|a| a.key).collect();
        assert_eq!(keys.len(), MANIFEST.len());
    }

    #[test]
    fn every_character_texture_is_listed() {
        for character in [Character::Messi, Character::Ronaldo] {
            assert!(find(character.texture_key()).is_some());
        }
        assert!(find("goal_left").is_some());
        assert!(find("missing").is_none());
    }
}
