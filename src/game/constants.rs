//! Field, player and ball tuning

/// World size in pixels
pub const SCREEN_WIDTH: f32 = 1152.0;
pub const SCREEN_HEIGHT: f32 = 768.0;

/// Downward acceleration applied to bodies with gravity
pub const GRAVITY_Y: f32 = 1000.0;

/// Ball placement at scene start and after every goal
pub const KICKOFF: (f32, f32) = (576.0, 384.0);

/// Sprite spawn points (bottom centre)
pub const PLAYER1_SPAWN: (f32, f32) = (150.0, 648.0);
pub const PLAYER2_SPAWN: (f32, f32) = (1002.0, 648.0);

/// Player movement tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerConfig {
    /// Horizontal run speed
    pub move_speed: f32,
    /// Vertical velocity applied on jump (negative is up)
    pub jump_power: f32,
    /// Player body size in world units
    pub body_width: f32,
    pub body_height: f32,
}

pub const PLAYER: PlayerConfig = PlayerConfig {
    move_speed: 200.0,
    jump_power: -500.0,
    // 100x450 texture units at scale 0.25
    body_width: 25.0,
    body_height: 112.5,
};

/// Ball tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BallConfig {
    /// Per-axis speed cap
    pub max_speed: f32,
    pub radius: f32,
    pub bounce: f32,
    pub drag: f32,
}

pub const BALL: BallConfig = BallConfig {
    max_speed: 800.0,
    // 25 at scale 0.5
    radius: 12.5,
    bounce: 0.8,
    drag: 100.0,
};
