//! Player and ball entities, each a thin wrapper over an arcade body

use glam::Vec2;

use crate::ws::protocol::{BallSnapshot, Character, KeyState, PlayerSnapshot, Side};

use super::constants::{BALL, PLAYER};
use super::input::steer;
use super::physics::{ArcadeWorld, Body, BodyHandle};

/// A player on the field
#[derive(Debug, Clone)]
pub struct Player {
    pub side: Side,
    pub character: Character,
    pub locally_controlled: bool,
    pub facing_right: bool,
    body: BodyHandle,
}

impl Player {
    /// Spawn a player with its sprite's bottom centre at `(x, y)`.
    ///
    /// A passive player is a visual placeholder for the remote seat: it gets no
    /// gravity and is not pushed by collisions.
    pub fn spawn(
        world: &mut ArcadeWorld,
        x: f32,
        y: f32,
        side: Side,
        character: Character,
        locally_controlled: bool,
        passive: bool,
    ) -> Self {
        let center = Vec2::new(x, y - PLAYER.body_height / 2.0);
        let mut body = Body::rect(center, PLAYER.body_width, PLAYER.body_height).with_world_bounds();
        if passive {
            body = body.without_gravity().immovable();
        }

        Self {
            side,
            character,
            locally_controlled,
            facing_right: side == Side::Left,
            body: world.add(body),
        }
    }

    pub fn handle(&self) -> BodyHandle {
        self.body
    }

    /// Sprite position (bottom centre), if the body still exists
    pub fn position(&self, world: &ArcadeWorld) -> Option<(f32, f32)> {
        world
            .body(self.body)
            .map(|b| (b.position.x, b.position.y + PLAYER.body_height / 2.0))
    }

    pub fn velocity(&self, world: &ArcadeWorld) -> Option<(f32, f32)> {
        world.body(self.body).map(|b| (b.velocity.x, b.velocity.y))
    }

    /// Resting on the floor or on another body
    pub fn on_ground(&self, world: &ArcadeWorld) -> bool {
        world.body(self.body).map_or(false, |b| b.blocked.down)
    }

    /// Apply held keys for this frame
    pub fn update(&mut self, world: &mut ArcadeWorld, keys: &KeyState) {
        let Some(body) = world.body_mut(self.body) else {
            return;
        };

        let steering = steer(keys, body.blocked.down);
        body.velocity.x = steering.vel_x;
        if let Some(vel_y) = steering.vel_y {
            body.velocity.y = vel_y;
        }
        if let Some(facing_right) = steering.facing_right {
            self.facing_right = facing_right;
        }
    }

    pub fn set_velocity_x(&self, world: &mut ArcadeWorld, vel_x: f32) {
        if let Some(body) = world.body_mut(self.body) {
            body.velocity.x = vel_x;
        }
    }

    /// Place the sprite's bottom centre at `(x, y)`
    pub fn set_position(&self, world: &mut ArcadeWorld, x: f32, y: f32) {
        if let Some(body) = world.body_mut(self.body) {
            body.position = Vec2::new(x, y - PLAYER.body_height / 2.0);
        }
    }

    pub fn snapshot(&self, world: &ArcadeWorld) -> Option<PlayerSnapshot> {
        let (x, y) = self.position(world)?;
        let (vel_x, vel_y) = self.velocity(world)?;
        Some(PlayerSnapshot {
            side: self.side,
            character: self.character,
            x,
            y,
            vel_x,
            vel_y,
            facing_right: self.facing_right,
            on_ground: self.on_ground(world),
            local: self.locally_controlled,
        })
    }
}

/// The ball
#[derive(Debug, Clone)]
pub struct Ball {
    body: BodyHandle,
}

impl Ball {
    pub fn spawn(world: &mut ArcadeWorld, x: f32, y: f32) -> Self {
        let body = Body::circle(Vec2::new(x, y), BALL.radius)
            .with_bounce(BALL.bounce)
            .with_drag(BALL.drag)
            .with_max_velocity(BALL.max_speed)
            .with_world_bounds();

        Self {
            body: world.add(body),
        }
    }

    pub fn handle(&self) -> BodyHandle {
        self.body
    }

    pub fn position(&self, world: &ArcadeWorld) -> Option<(f32, f32)> {
        world.body(self.body).map(|b| (b.position.x, b.position.y))
    }

    pub fn velocity(&self, world: &ArcadeWorld) -> Option<(f32, f32)> {
        world.body(self.body).map(|b| (b.velocity.x, b.velocity.y))
    }

    /// Place the ball at rest
    pub fn reset(&self, world: &mut ArcadeWorld, x: f32, y: f32) {
        if let Some(body) = world.body_mut(self.body) {
            body.position = Vec2::new(x, y);
            body.velocity = Vec2::ZERO;
        }
    }

    pub fn snapshot(&self, world: &ArcadeWorld) -> Option<BallSnapshot> {
        let (x, y) = self.position(world)?;
        let (vel_x, vel_y) = self.velocity(world)?;
        Some(BallSnapshot { x, y, vel_x, vel_y })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::constants::{GRAVITY_Y, SCREEN_HEIGHT, SCREEN_WIDTH};

    fn world() -> ArcadeWorld {
        ArcadeWorld::new(SCREEN_WIDTH, SCREEN_HEIGHT, GRAVITY_Y)
    }

    #[test]
    fn spawn_faces_toward_the_middle() {
        let mut world = world();
        let left = Player::spawn(&mut world, 150.0, 648.0, Side::Left, Character::Messi, true, false);
        let right = Player::spawn(&mut world, 1002.0, 648.0, Side::Right, Character::Ronaldo, false, false);
        assert!(left.facing_right);
        assert!(!right.facing_right);
        assert_eq!(left.position(&world), Some((150.0, 648.0)));
    }

    #[test]
    fn torn_down_body_is_ignored() {
        let mut world = world();
        let mut player = Player::spawn(&mut world, 150.0, 648.0, Side::Left, Character::Messi, true, false);
        world.remove(player.handle());

        let keys = KeyState { right: true, ..KeyState::default() };
        player.update(&mut world, &keys);
        player.set_velocity_x(&mut world, 10.0);
        assert_eq!(player.position(&world), None);
        assert!(player.snapshot(&world).is_none());
        // facing is only touched when a body exists
        assert!(player.facing_right);
    }

    #[test]
    fn update_turns_the_player() {
        let mut world = world();
        let mut player = Player::spawn(&mut world, 150.0, 648.0, Side::Left, Character::Messi, true, false);
        player.update(&mut world, &KeyState { left: true, ..KeyState::default() });
        assert!(!player.facing_right);
        assert_eq!(player.velocity(&world), Some((-200.0, 0.0)));
    }

    #[test]
    fn passive_player_ignores_gravity() {
        let mut world = world();
        let remote = Player::spawn(&mut world, 1002.0, 400.0, Side::Right, Character::Ronaldo, false, true);
        for _ in 0..30 {
            world.step(1.0 / 60.0);
        }
        assert_eq!(remote.position(&world), Some((1002.0, 400.0)));
    }

    #[test]
    fn ball_reset_zeroes_velocity() {
        let mut world = world();
        let ball = Ball::spawn(&mut world, 576.0, 384.0);
        for _ in 0..10 {
            world.step(1.0 / 60.0);
        }
        ball.reset(&mut world, 576.0, 384.0);
        assert_eq!(ball.position(&world), Some((576.0, 384.0)));
        assert_eq!(ball.velocity(&world), Some((0.0, 0.0)));
    }
}
