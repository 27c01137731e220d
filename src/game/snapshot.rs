//! Frame snapshot building

use crate::ws::protocol::{BallSnapshot, ServerMsg};

use super::scene::GameScene;

/// Decides when to broadcast scene state and builds the message
pub struct SnapshotBuilder {
    /// Frames since last snapshot
    frames_since_snapshot: u32,
    /// Snapshot interval in frames
    snapshot_interval: u32,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            frames_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.frames_since_snapshot += 1;
        if self.frames_since_snapshot >= self.snapshot_interval {
            self.frames_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (used after a goal)
    pub fn force_next(&mut self) {
        self.frames_since_snapshot = self.snapshot_interval;
    }

    /// Build a frame message from the scene
    pub fn build(&self, scene: &GameScene, input_focused: bool) -> ServerMsg {
        let world = scene.world();
        let players = scene
            .players()
            .iter()
            .filter_map(|p| p.snapshot(world))
            .collect();
        let ball = scene.ball().snapshot(world).unwrap_or(BallSnapshot {
            x: 0.0,
            y: 0.0,
            vel_x: 0.0,
            vel_y: 0.0,
        });
        let score = scene.score();

        ServerMsg::Frame {
            frame: scene.frame(),
            players,
            ball,
            player1_score: score.player1,
            player2_score: score.player2,
            scoreboard: scene.scoreboard().to_string(),
            input_focused,
        }
    }
}
