//! Match score and scoreboard text

use serde::{Deserialize, Serialize};

use crate::ws::protocol::Side;

/// Goals per player. Only ever grows within a match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchScore {
    pub player1: u32,
    pub player2: u32,
}

/// Why a relayed score was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoreError {
    #[error("score {from} would go back to {to} for player {player}")]
    Decrease { player: u8, from: u32, to: u32 },
}

impl MatchScore {
    /// Credit one goal to the player on `side`
    pub fn credit(&mut self, side: Side) {
        match side {
            Side::Left => self.player1 = self.player1.saturating_add(1),
            Side::Right => self.player2 = self.player2.saturating_add(1),
        }
    }

    pub fn for_side(&self, side: Side) -> u32 {
        match side {
            Side::Left => self.player1,
            Side::Right => self.player2,
        }
    }

    /// Adopt a score decided elsewhere, refusing anything that moves backwards
    pub fn sync(&mut self, other: MatchScore) -> Result<(), ScoreError> {
        if other.player1 < self.player1 {
            return Err(ScoreError::Decrease {
                player: 1,
                from: self.player1,
                to: other.player1,
            });
        }
        if other.player2 < self.player2 {
            return Err(ScoreError::Decrease {
                player: 2,
                from: self.player2,
                to: other.player2,
            });
        }
        *self = other;
        Ok(())
    }

    /// Scoreboard text, `"{p1} - {p2}"`
    pub fn scoreboard_text(&self) -> String {
        format!("{} - {}", self.player1, self.player2)
    }
}
