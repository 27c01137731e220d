//! Keyboard state to player velocity

use crate::ws::protocol::{KeyState, Side};

use super::constants::PLAYER;

/// Velocity changes derived from one frame of held keys
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Steering {
    /// Horizontal velocity, always written
    pub vel_x: f32,
    /// Jump impulse, only when a jump starts this frame
    pub vel_y: Option<f32>,
    /// New facing, only when a direction key is held
    pub facing_right: Option<bool>,
}

/// Map held keys to velocity. Left wins over right; jumping needs ground contact.
pub fn steer(keys: &KeyState, on_ground: bool) -> Steering {
    let (vel_x, facing_right) = if keys.left {
        (-PLAYER.move_speed, Some(false))
    } else if keys.right {
        (PLAYER.move_speed, Some(true))
    } else {
        (0.0, None)
    };

    let vel_y = (keys.up && on_ground).then_some(PLAYER.jump_power);

    Steering {
        vel_x,
        vel_y,
        facing_right,
    }
}

/// Physical key bindings for a seat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBindings {
    pub up: &'static str,
    pub left: &'static str,
    pub down: &'static str,
    pub right: &'static str,
}

impl KeyBindings {
    /// Host drives the left player with WASD, the guest the right player with arrows
    pub fn for_side(side: Side) -> Self {
        match side {
            Side::Left => Self {
                up: "KeyW",
                left: "KeyA",
                down: "KeyS",
                right: "KeyD",
            },
            Side::Right => Self {
                up: "ArrowUp",
                left: "ArrowLeft",
                down: "ArrowDown",
                right: "ArrowRight",
            },
        }
    }

    /// Build held-key state from the set of currently pressed key codes
    pub fn key_state<'a, I>(&self, pressed: I) -> KeyState
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut keys = KeyState::default();
        for code in pressed {
            if code == self.up {
                keys.up = true;
            } else if code == self.left {
                keys.left = true;
            } else if code == self.down {
                keys.down = true;
            } else if code == self.right {
                keys.right = true;
            }
        }
        keys
    }
}
