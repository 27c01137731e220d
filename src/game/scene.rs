//! Loading and game scenes

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info, warn};

use crate::assets::{AssetLoader, AssetRef, TextureCache, MANIFEST};
use crate::util::time::frame_delta;
use crate::ws::protocol::{KeyState, SceneEntry, Side};

use super::constants::{GRAVITY_Y, KICKOFF, PLAYER1_SPAWN, PLAYER2_SPAWN, SCREEN_HEIGHT, SCREEN_WIDTH};
use super::entity::{Ball, Player};
use super::physics::{ArcadeWorld, Body};
use super::rules::SceneRules;
use super::score::{MatchScore, ScoreError};

/// Progress after one asset finished
#[derive(Debug, Clone, PartialEq)]
pub struct LoadProgress {
    pub key: &'static str,
    /// Fraction of the manifest processed, 0.0..=1.0
    pub progress: f32,
    pub ok: bool,
}

/// Outcome of a preload pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub fetched: usize,
    pub cached: usize,
    pub failed: Vec<&'static str>,
}

/// Preloads the manifest, then hands the entry payload to the game scene
#[derive(Debug, Clone)]
pub struct LoadingScene {
    entry: SceneEntry,
}

impl LoadingScene {
    pub fn new(entry: SceneEntry) -> Self {
        Self { entry }
    }

    /// Fetch every asset not already cached. Failures are logged and skipped.
    pub async fn preload<L, F>(&self, loader: &L, cache: &TextureCache, on_progress: F) -> LoadReport
    where
        L: AssetLoader,
        F: FnMut(LoadProgress),
    {
        self.preload_assets(&MANIFEST, loader, cache, on_progress).await
    }

    async fn preload_assets<L, F>(
        &self,
        assets: &'static [AssetRef],
        loader: &L,
        cache: &TextureCache,
        mut on_progress: F,
    ) -> LoadReport
    where
        L: AssetLoader,
        F: FnMut(LoadProgress),
    {
        let total = assets.len().max(1) as f32;
        let mut report = LoadReport::default();
        let mut done = 0usize;

        let mut pending = FuturesUnordered::new();
        for asset in assets {
            if cache.contains(asset.key) {
                report.cached += 1;
                done += 1;
                on_progress(LoadProgress {
                    key: asset.key,
                    progress: done as f32 / total,
                    ok: true,
                });
                continue;
            }
            pending.push(async move { (asset, loader.load(asset).await) });
        }

        while let Some((asset, result)) = pending.next().await {
            done += 1;
            let ok = match result {
                Ok(bytes) => {
                    cache.insert(asset.key, bytes);
                    report.fetched += 1;
                    true
                }
                Err(e) => {
                    warn!(key = asset.key, error = %e, "Asset failed to load");
                    report.failed.push(asset.key);
                    false
                }
            };
            on_progress(LoadProgress {
                key: asset.key,
                progress: done as f32 / total,
                ok,
            });
        }

        info!(
            match_id = ?self.entry.match_id,
            fetched = report.fetched,
            cached = report.cached,
            failed = report.failed.len(),
            "Preload finished"
        );
        report
    }

    /// Move on to the game scene with the same entry payload
    pub fn create(self, rules: SceneRules, frame_rate: u32) -> GameScene {
        GameScene::create(self.entry, rules, frame_rate)
    }
}

/// Per-frame input for the game scene
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameInput {
    pub keys: KeyState,
    /// Page UI holds keyboard focus
    pub input_focused: bool,
}

/// A goal detected during a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalScored {
    pub frame: u64,
    pub scorer: Side,
    pub score: MatchScore,
    pub scoreboard: String,
}

/// The running soccer scene for one seat
pub struct GameScene {
    entry: SceneEntry,
    rules: SceneRules,
    world: ArcadeWorld,
    player1: Player,
    player2: Player,
    ball: Ball,
    score: MatchScore,
    scoreboard: String,
    frame: u64,
    dt: f32,
}

impl GameScene {
    /// Build the field: players, ball, optional crossbars and the collider pairs
    pub fn create(entry: SceneEntry, rules: SceneRules, frame_rate: u32) -> Self {
        let mut world = ArcadeWorld::new(SCREEN_WIDTH, SCREEN_HEIGHT, GRAVITY_Y);
        let local = entry.local_side();

        let player1 = Player::spawn(
            &mut world,
            PLAYER1_SPAWN.0,
            PLAYER1_SPAWN.1,
            Side::Left,
            entry.character_for(Side::Left),
            local == Side::Left,
            rules.passive_remote && local != Side::Left,
        );
        let player2 = Player::spawn(
            &mut world,
            PLAYER2_SPAWN.0,
            PLAYER2_SPAWN.1,
            Side::Right,
            entry.character_for(Side::Right),
            local == Side::Right,
            rules.passive_remote && local != Side::Right,
        );
        let ball = Ball::spawn(&mut world, KICKOFF.0, KICKOFF.1);

        world.add_collider(player1.handle(), ball.handle());
        world.add_collider(player2.handle(), ball.handle());
        world.add_collider(player1.handle(), player2.handle());

        if let Some(rects) = rules.goals.posts {
            for rect in rects {
                let post = world.add(Body::fixed_rect(rect.center(), rect.width(), rect.height()));
                world.add_collider(ball.handle(), post);
            }
        }

        let score = MatchScore::default();
        debug!(
            match_id = ?entry.match_id,
            is_host = entry.is_host,
            colliders = world.collider_count(),
            "Game scene created"
        );

        Self {
            scoreboard: score.scoreboard_text(),
            entry,
            rules,
            world,
            player1,
            player2,
            ball,
            score,
            frame: 0,
            dt: frame_delta(frame_rate),
        }
    }

    /// Run one frame: input, physics, then goal detection
    pub fn update(&mut self, input: &FrameInput) -> Option<GoalScored> {
        self.frame += 1;

        if input.input_focused {
            self.player1.set_velocity_x(&mut self.world, 0.0);
            self.player2.set_velocity_x(&mut self.world, 0.0);
            self.world.step(self.dt);
            return None;
        }

        let local = match self.entry.local_side() {
            Side::Left => &mut self.player1,
            Side::Right => &mut self.player2,
        };
        local.update(&mut self.world, &input.keys);

        self.world.step(self.dt);

        if !self.rules.detects_goals(self.entry.is_host) {
            return None;
        }
        let (x, y) = self.ball.position(&self.world)?;
        let scorer = self.rules.goals.check(x, y)?;
        Some(self.goal_scored(scorer))
    }

    fn goal_scored(&mut self, scorer: Side) -> GoalScored {
        self.score.credit(scorer);
        self.scoreboard = self.score.scoreboard_text();
        self.reset_ball();

        info!(
            match_id = ?self.entry.match_id,
            frame = self.frame,
            player = scorer.player_number(),
            goals = self.score.for_side(scorer),
            score = %self.scoreboard,
            "Goal"
        );

        GoalScored {
            frame: self.frame,
            scorer,
            score: self.score,
            scoreboard: self.scoreboard.clone(),
        }
    }

    fn reset_ball(&mut self) {
        self.ball.reset(&mut self.world, KICKOFF.0, KICKOFF.1);
    }

    /// Place the remote player where the other seat reports it
    pub fn set_remote_pose(&mut self, x: f32, y: f32, facing_right: Option<bool>) {
        let remote = match self.entry.local_side().opposite() {
            Side::Left => &mut self.player1,
            Side::Right => &mut self.player2,
        };
        if let Some(facing_right) = facing_right {
            remote.facing_right = facing_right;
        }
        remote.set_position(&mut self.world, x, y);
    }

    /// Adopt the score decided by the host seat.
    ///
    /// A raised score means the host saw a goal this seat did not check for, so the
    /// ball goes back to kickoff here too. Returns whether the score changed.
    pub fn sync_score(&mut self, score: MatchScore) -> Result<bool, ScoreError> {
        let before = self.score;
        self.score.sync(score)?;
        if self.score == before {
            return Ok(false);
        }

        self.scoreboard = self.score.scoreboard_text();
        self.reset_ball();
        debug!(
            match_id = ?self.entry.match_id,
            frame = self.frame,
            score = %self.scoreboard,
            "Adopted relayed score"
        );
        Ok(true)
    }

    /// Remove the players and the ball from the world. Later frames find no bodies
    /// and do nothing.
    pub fn destroy(&mut self) {
        for handle in [self.player1.handle(), self.player2.handle(), self.ball.handle()] {
            self.world.remove(handle);
        }
        debug!(match_id = ?self.entry.match_id, is_host = self.entry.is_host, "Game scene destroyed");
    }

    #[cfg(test)]
    pub(crate) fn entry(&self) -> &SceneEntry {
        &self.entry
    }

    pub fn world(&self) -> &ArcadeWorld {
        &self.world
    }

    pub fn score(&self) -> MatchScore {
        self.score
    }

    pub fn scoreboard(&self) -> &str {
        &self.scoreboard
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn players(&self) -> [&Player; 2] {
        [&self.player1, &self.player2]
    }

    pub fn ball(&self) -> &Ball {
        &self.ball
    }

    #[cfg(test)]
    pub(crate) fn local_player(&self) -> &Player {
        match self.entry.local_side() {
            Side::Left => &self.player1,
            Side::Right => &self.player2,
        }
    }

    #[cfg(test)]
    pub(crate) fn remote_player(&self) -> &Player {
        match self.entry.local_side().opposite() {
            Side::Left => &self.player1,
            Side::Right => &self.player2,
        }
    }

    #[cfg(test)]
    pub(crate) fn place_ball(&mut self, x: f32, y: f32, vel_x: f32, vel_y: f32) {
        if let Some(body) = self.world.body_mut(self.ball.handle()) {
            body.position = glam::Vec2::new(x, y);
            body.velocity = glam::Vec2::new(vel_x, vel_y);
        }
    }

    #[cfg(test)]
    pub(crate) fn world_mut(&mut self) -> &mut ArcadeWorld {
        &mut self.world
    }
}
