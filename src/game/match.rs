//! Match scenes and their frame loop

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tokio::time::{interval, timeout};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::assets::{AssetLoader, TextureCache};
use crate::util::time::{frame_duration, snapshot_interval};
use crate::ws::protocol::{Character, KeyState, SceneEntry, ServerMsg, Side};

use super::goal::GeometryError;
use super::input::KeyBindings;
use super::rules::{Iteration, SceneRules};
use super::scene::{FrameInput, GameScene, LoadingScene};
use super::score::MatchScore;
use super::snapshot::SnapshotBuilder;

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Preloading assets
    Loading,
    /// Game scene running
    Playing,
    /// Teardown requested, ends after the current frame
    Stopping,
    /// Scene torn down
    Ended,
}

/// Commands delivered to a running scene
#[derive(Debug, Clone, PartialEq)]
pub enum SceneCommand {
    Keys(KeyState),
    /// Raw key codes, mapped with the seat's bindings
    Pressed(Vec<String>),
    Focus(bool),
    RemotePose {
        x: f32,
        y: f32,
        facing_right: Option<bool>,
    },
    SyncScore(MatchScore),
    Ping { t: u64 },
}

/// How a match scene is run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSettings {
    pub iteration: Iteration,
    pub frame_rate: u32,
    pub snapshot_rate: u32,
    pub preload_assets: bool,
}

/// Externally visible summary of a scene.
///
/// Sent in every welcome so late connections see what the broadcast already carried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchStatus {
    pub scene_id: Uuid,
    pub match_id: Option<String>,
    pub is_host: bool,
    pub local_side: Side,
    pub player1: Character,
    pub player2: Character,
    pub iteration: Iteration,
    pub phase: MatchPhase,
    /// Fraction of the manifest processed, 0.0..=1.0
    pub load_progress: f32,
    pub failed_assets: Vec<String>,
    pub frame: u64,
    pub player1_score: u32,
    pub player2_score: u32,
    pub scoreboard: String,
    pub input_focused: bool,
}

/// Client seat: one scene per (match, host flag)
type SeatKey = (Option<String>, bool);

/// Handle to a running match scene
#[derive(Clone)]
pub struct MatchHandle {
    pub id: Uuid,
    pub entry: SceneEntry,
    pub command_tx: mpsc::Sender<SceneCommand>,
    pub event_tx: broadcast::Sender<ServerMsg>,
    status: Arc<RwLock<MatchStatus>>,
    stop: Arc<AtomicBool>,
    stop_reason: Arc<Mutex<Option<String>>>,
}

impl MatchHandle {
    pub fn status(&self) -> MatchStatus {
        self.status.read().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.event_tx.subscribe()
    }

    /// Ask the scene to tear down after its current frame
    pub fn shutdown(&self, reason: &str) {
        let mut stop_reason = self.stop_reason.lock();
        if stop_reason.is_none() {
            *stop_reason = Some(reason.to_string());
        }
        self.stop.store(true, Ordering::Release);

        let mut status = self.status.write();
        if status.phase != MatchPhase::Ended {
            status.phase = MatchPhase::Stopping;
        }
    }

    /// Shut the scene down and wait up to `grace` for it to end
    pub async fn stop(&self, reason: &str, grace: Duration) -> MatchStatus {
        let mut events = self.subscribe();
        self.shutdown(reason);

        if self.status.read().phase != MatchPhase::Ended {
            let ended = timeout(grace, async {
                loop {
                    match events.recv().await {
                        Ok(ServerMsg::SceneEnded { .. }) | Err(RecvError::Closed) => break,
                        Ok(_) | Err(RecvError::Lagged(_)) => continue,
                    }
                }
            })
            .await;
            if ended.is_err() {
                warn!(scene_id = %self.id, "Scene did not end within the grace period");
            }
        }
        self.status()
    }

    fn seat_key(&self) -> SeatKey {
        seat_key(&self.entry)
    }
}

fn seat_key(entry: &SceneEntry) -> SeatKey {
    (entry.match_id.clone(), entry.is_host)
}

/// Registry of all running match scenes
pub struct MatchRegistry {
    matches: DashMap<Uuid, MatchHandle>,
    seats: DashMap<SeatKey, Uuid>,
    tasks: Mutex<JoinSet<()>>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self {
            matches: DashMap::new(),
            seats: DashMap::new(),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<MatchHandle> {
        self.matches.get(id).map(|m| m.value().clone())
    }

    /// Drop a scene from the registry, releasing its seat if it still holds it
    pub fn remove(&self, id: &Uuid) -> Option<MatchHandle> {
        let (_, handle) = self.matches.remove(id)?;
        self.seats.remove_if(&handle.seat_key(), |_, holder| holder == id);
        Some(handle)
    }

    pub fn active_matches(&self) -> usize {
        self.matches.len()
    }

    /// Scene currently holding this client seat
    pub fn find_seat(&self, entry: &SceneEntry) -> Option<MatchHandle> {
        let id = *self.seats.get(&seat_key(entry))?;
        self.get(&id)
    }

    /// Start a scene for `entry`, tearing down any scene already holding the same seat
    pub fn start<L: AssetLoader>(
        self: &Arc<Self>,
        entry: SceneEntry,
        settings: MatchSettings,
        loader: L,
        cache: TextureCache,
    ) -> Result<MatchHandle, GeometryError> {
        let rules = settings.iteration.rules()?;

        let id = Uuid::new_v4();
        let (game_match, handle) = GameMatch::new(id, entry, settings, rules, loader, cache);
        self.matches.insert(id, handle.clone());

        // The seat swap decides the survivor; whoever it displaces is torn down here
        if let Some(old_id) = self.seats.insert(handle.seat_key(), id) {
            if let Some((_, old)) = self.matches.remove(&old_id) {
                info!(scene_id = %old.id, match_id = ?old.entry.match_id, "Replacing running scene");
                old.shutdown("replaced");
            }
        }

        let registry = Arc::clone(self);
        let mut tasks = self.tasks.lock();
        // Reap scenes that already finished
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            game_match.run().await;
            registry.remove(&id);
        });

        Ok(handle)
    }

    /// Tear down every running scene and wait up to `grace` for their tasks to finish
    pub async fn shutdown_all(&self, reason: &str, grace: Duration) {
        for entry in self.matches.iter() {
            entry.value().shutdown(reason);
        }
        self.matches.clear();
        self.seats.clear();

        let mut tasks = std::mem::take(&mut *self.tasks.lock());
        let drained = timeout(grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(remaining = tasks.len(), "Scenes still running after grace period, aborting");
            tasks.abort_all();
        }
    }
}

impl Default for MatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// One seat's scenes: preload, then the game scene frame loop
pub struct GameMatch<L> {
    id: Uuid,
    entry: SceneEntry,
    settings: MatchSettings,
    rules: SceneRules,
    loader: L,
    cache: TextureCache,
    command_rx: mpsc::Receiver<SceneCommand>,
    event_tx: broadcast::Sender<ServerMsg>,
    snapshot_builder: SnapshotBuilder,
    status: Arc<RwLock<MatchStatus>>,
    stop: Arc<AtomicBool>,
    stop_reason: Arc<Mutex<Option<String>>>,
    keys: KeyState,
    input_focused: bool,
}

impl<L: AssetLoader> GameMatch<L> {
    /// Create a new match scene
    pub fn new(
        id: Uuid,
        entry: SceneEntry,
        settings: MatchSettings,
        rules: SceneRules,
        loader: L,
        cache: TextureCache,
    ) -> (Self, MatchHandle) {
        let (command_tx, command_rx) = mpsc::channel(256);
        let (event_tx, _) = broadcast::channel(64);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_reason = Arc::new(Mutex::new(None));

        let status = Arc::new(RwLock::new(MatchStatus {
            scene_id: id,
            match_id: entry.match_id.clone(),
            is_host: entry.is_host,
            local_side: entry.local_side(),
            player1: entry.character_for(Side::Left),
            player2: entry.character_for(Side::Right),
            iteration: settings.iteration,
            phase: MatchPhase::Loading,
            load_progress: 0.0,
            failed_assets: Vec::new(),
            frame: 0,
            player1_score: 0,
            player2_score: 0,
            scoreboard: MatchScore::default().scoreboard_text(),
            input_focused: false,
        }));

        let handle = MatchHandle {
            id,
            entry: entry.clone(),
            command_tx,
            event_tx: event_tx.clone(),
            status: status.clone(),
            stop: stop.clone(),
            stop_reason: stop_reason.clone(),
        };

        let game_match = Self {
            id,
            entry,
            settings,
            rules,
            loader,
            cache,
            command_rx,
            event_tx,
            snapshot_builder: SnapshotBuilder::new(snapshot_interval(
                settings.frame_rate,
                settings.snapshot_rate,
            )),
            status,
            stop,
            stop_reason,
            keys: KeyState::default(),
            input_focused: false,
        };

        (game_match, handle)
    }

    /// Run the loading scene, then the game scene until torn down
    pub async fn run(mut self) {
        info!(scene_id = %self.id, match_id = ?self.entry.match_id, is_host = self.entry.is_host, "Scene starting");

        let loading = LoadingScene::new(self.entry.clone());
        if self.settings.preload_assets {
            let event_tx = self.event_tx.clone();
            let status = Arc::clone(&self.status);
            let report = loading
                .preload(&self.loader, &self.cache, |p| {
                    status.write().load_progress = p.progress;
                    let _ = event_tx.send(ServerMsg::Loading {
                        key: p.key.to_string(),
                        progress: p.progress,
                        ok: p.ok,
                    });
                })
                .await;
            self.status.write().failed_assets = report.failed.iter().map(|k| k.to_string()).collect();
        } else {
            debug!(scene_id = %self.id, "Asset preload disabled");
        }

        let mut scene = loading.create(self.rules.clone(), self.settings.frame_rate);
        {
            let mut status = self.status.write();
            status.load_progress = 1.0;
            if status.phase == MatchPhase::Loading {
                status.phase = MatchPhase::Playing;
            }
        }
        let _ = self.event_tx.send(ServerMsg::SceneStarted {
            scene_id: self.id,
            match_id: self.entry.match_id.clone(),
            is_host: self.entry.is_host,
            local_side: self.entry.local_side(),
            player1: scene.players()[0].character,
            player2: scene.players()[1].character,
            iteration: self.settings.iteration,
            frame_rate: self.settings.frame_rate,
        });
        info!(scene_id = %self.id, iteration = %self.settings.iteration, "Game scene started");

        let mut frame_interval = interval(frame_duration(self.settings.frame_rate));
        frame_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let reason = loop {
            frame_interval.tick().await;

            if self.stop.load(Ordering::Acquire) {
                break self
                    .stop_reason
                    .lock()
                    .clone()
                    .unwrap_or_else(|| "stopped".to_string());
            }

            // Drain command queue
            if !self.process_commands(&mut scene) {
                break "all handles dropped".to_string();
            }

            self.run_frame(&mut scene);
        };

        scene.destroy();
        self.status.write().phase = MatchPhase::Ended;
        let score = scene.score();
        let _ = self.event_tx.send(ServerMsg::SceneEnded {
            reason: reason.clone(),
            player1_score: score.player1,
            player2_score: score.player2,
        });
        info!(scene_id = %self.id, reason = %reason, score = %scene.scoreboard(), "Scene ended");
    }

    /// Apply pending commands. Returns false once every sender is gone.
    fn process_commands(&mut self, scene: &mut GameScene) -> bool {
        loop {
            let command = match self.command_rx.try_recv() {
                Ok(command) => command,
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            };

            match command {
                SceneCommand::Keys(keys) => self.keys = keys,
                SceneCommand::Pressed(codes) => {
                    let bindings = KeyBindings::for_side(self.entry.local_side());
                    self.keys = bindings.key_state(codes.iter().map(String::as_str));
                }
                SceneCommand::Focus(focused) => {
                    if focused != self.input_focused {
                        debug!(scene_id = %self.id, focused, "Input focus changed");
                    }
                    self.input_focused = focused;
                }
                SceneCommand::RemotePose { x, y, facing_right } => {
                    scene.set_remote_pose(x, y, facing_right);
                }
                SceneCommand::SyncScore(score) => match scene.sync_score(score) {
                    Ok(true) => self.snapshot_builder.force_next(),
                    Ok(false) => {}
                    Err(e) => {
                        warn!(scene_id = %self.id, error = %e, "Rejected relayed score");
                        let _ = self.event_tx.send(ServerMsg::ScoreRejected {
                            player1: score.player1,
                            player2: score.player2,
                            reason: e.to_string(),
                        });
                    }
                },
                SceneCommand::Ping { t } => {
                    let _ = self.event_tx.send(ServerMsg::Pong { t });
                }
            }
        }
    }

    /// Run one frame and broadcast what changed
    fn run_frame(&mut self, scene: &mut GameScene) {
        let input = FrameInput {
            keys: self.keys,
            input_focused: self.input_focused,
        };

        if let Some(goal) = scene.update(&input) {
            let _ = self.event_tx.send(ServerMsg::Goal {
                frame: goal.frame,
                scorer: goal.scorer,
                player1_score: goal.score.player1,
                player2_score: goal.score.player2,
                scoreboard: goal.scoreboard,
            });
            self.snapshot_builder.force_next();
        }

        if self.snapshot_builder.should_send() {
            let snapshot = self.snapshot_builder.build(scene, self.input_focused);
            let _ = self.event_tx.send(snapshot);
        }

        let score = scene.score();
        let mut status = self.status.write();
        status.frame = scene.frame();
        status.player1_score = score.player1;
        status.player2_score = score.player2;
        status.scoreboard = scene.scoreboard().to_string();
        status.input_focused = self.input_focused;
    }
}

#[cfg(test)]
impl MatchHandle {
    /// Handle whose scene never runs, with its command queue exposed
    pub(crate) fn detached(entry: SceneEntry) -> (Self, mpsc::Receiver<SceneCommand>) {
        use crate::assets::HttpAssetLoader;

        let settings = MatchSettings {
            iteration: Iteration::Final,
            frame_rate: 60,
            snapshot_rate: 20,
            preload_assets: false,
        };
        let (game_match, handle) = GameMatch::new(
            Uuid::new_v4(),
            entry,
            settings,
            Iteration::Final.rules().expect("valid preset"),
            HttpAssetLoader::new(Duration::from_secs(1)).expect("http client"),
            TextureCache::new(),
        );
        (handle, game_match.command_rx)
    }
}
