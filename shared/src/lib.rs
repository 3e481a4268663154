//! Types, tuning constants and pure game rules shared by the server and the client.
//!
//! Anything that must produce bit-identical results on both sides of the wire lives
//! here: the movement function used by the authoritative tick and by client-side
//! replay, the circle-vs-rectangle hit test, and the packet codec.

use serde::{Deserialize, Serialize};

pub mod protocol;

pub use protocol::{
    decode_packet, encode_packet, CodecError, Delta, Packet, MAX_CLIENT_PACKET_SIZE,
    MAX_DATAGRAM_SIZE,
};

/// Identifier of a player or projectile. Players reuse their connection id.
pub type EntityId = u32;

pub const PROTOCOL_VERSION: u32 = 1;

// World and movement
pub const WORLD_WIDTH: f32 = 10_000.0;
pub const WORLD_HEIGHT: f32 = 10_000.0;
pub const PLAYER_SPEED: f32 = 300.0;
pub const PLAYER_SIZE: f32 = 30.0;
pub const PLAYER_MAX_HEALTH: i32 = 100;
/// Spawn positions keep this margin from the far edges.
pub const SPAWN_MARGIN: f32 = 50.0;

// Tick
pub const TICK_RATE: u32 = 30;
pub const TICK_INTERVAL_MS: f64 = 1000.0 / TICK_RATE as f64;

// Combat
pub const SHOOT_COOLDOWN_MS: u64 = 200;
pub const PROJECTILE_SPEED: f32 = 600.0;
pub const PROJECTILE_RADIUS: f32 = 4.0;
pub const PROJECTILE_DAMAGE: i32 = 20;
pub const MAX_PROJECTILES_PER_OWNER: usize = 20;
pub const REAPER_DELAY_MS: u64 = 5_000;

// Spatial grid and interest management
pub const CELL_SIZE: f32 = 200.0;
pub const CAMERA_PADDING: f32 = 100.0;
pub const DEFAULT_CAMERA_WIDTH: f32 = 1920.0;
pub const DEFAULT_CAMERA_HEIGHT: f32 = 1080.0;
pub const MIN_CAMERA_WIDTH: f32 = 640.0;
pub const MAX_CAMERA_WIDTH: f32 = 7680.0;
pub const MIN_CAMERA_HEIGHT: f32 = 480.0;
pub const MAX_CAMERA_HEIGHT: f32 = 4320.0;

// Sync
pub const FULL_STATE_INTERVAL: u32 = 60;
/// Entity states per delta datagram; keeps a crowded view under `MAX_DATAGRAM_SIZE`.
pub const MAX_DELTA_ENTITIES: usize = 1024;

// Pools
pub const GRID_CELL_POOL_PREWARM: usize = 500;
pub const GRID_CELL_POOL_MAX: usize = 20_000;
pub const PROJECTILE_POOL_PREWARM: usize = 100;
pub const PROJECTILE_POOL_MAX: usize = 10_000;
pub const SNAPSHOT_POOL_PREWARM: usize = 200;
pub const SNAPSHOT_POOL_MAX: usize = 5_000;
pub const DELTA_POOL_PREWARM: usize = 4;
pub const DELTA_POOL_MAX: usize = 64;

// Client send policy
pub const MIN_SEND_INTERVAL_MS: u64 = 30;
pub const INPUT_SEND_RATE_MS: u64 = 50;
pub const CAMERA_UPDATE_RATE_MS: u64 = 100;
pub const INPUT_TIMEOUT_MS: u64 = 2_000;
pub const RECONNECT_DELAY_MS: u64 = 2_000;

// Interpolation
pub const MIN_INTERPOLATION_DELAY_MS: f64 = TICK_INTERVAL_MS * 1.5;
pub const MAX_INTERPOLATION_DELAY_MS: f64 = 1_000.0;
pub const DELAY_ADJUSTMENT_STEP_MS: f64 = 10.0;
pub const MAX_BUFFER_SIZE: usize = 20;

/// Movement keys held by a player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputKeys {
    pub w: bool,
    pub a: bool,
    pub s: bool,
    pub d: bool,
}

/// Authoritative (or predicted) state of a player.
///
/// `x`/`y` is the top-left corner of the bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub health: i32,
    pub max_health: i32,
    pub is_dead: bool,
    /// Server wall-clock milliseconds at death, 0 while alive.
    pub time_of_death: u64,
}

impl PlayerState {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            width: PLAYER_SIZE,
            height: PLAYER_SIZE,
            health: PLAYER_MAX_HEALTH,
            max_health: PLAYER_MAX_HEALTH,
            is_dead: false,
            time_of_death: 0,
        }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectileState {
    pub id: EntityId,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub owner_id: EntityId,
    pub radius: f32,
}

/// Tagged entity payload carried by snapshot records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EntityState {
    Player(PlayerState),
    Projectile(ProjectileState),
}

/// Camera rectangle in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: DEFAULT_CAMERA_WIDTH,
            height: DEFAULT_CAMERA_HEIGHT,
        }
    }
}

/// Unit direction for the held keys. Opposing keys cancel out.
pub fn movement_vector(keys: &InputKeys) -> (f32, f32) {
    let mut dx = 0.0f32;
    let mut dy = 0.0f32;

    if keys.w {
        dy -= 1.0;
    }
    if keys.s {
        dy += 1.0;
    }
    if keys.a {
        dx -= 1.0;
    }
    if keys.d {
        dx += 1.0;
    }

    let length = (dx * dx + dy * dy).sqrt();
    if length > 0.0 {
        (dx / length, dy / length)
    } else {
        (0.0, 0.0)
    }
}

/// Moves a player for one step and clamps it inside the world.
///
/// This is the only movement rule in the game. The server runs it every tick with the
/// connection's last input, and the client runs it both for immediate prediction and
/// when replaying unacknowledged inputs after a correction.
pub fn apply_movement(
    player: &mut PlayerState,
    keys: &InputKeys,
    dt: f32,
    speed: f32,
    world_width: f32,
    world_height: f32,
) {
    let (dx, dy) = movement_vector(keys);

    player.x += dx * speed * dt;
    player.y += dy * speed * dt;

    player.x = player.x.clamp(0.0, (world_width - player.width).max(0.0));
    player.y = player.y.clamp(0.0, (world_height - player.height).max(0.0));
}

/// Circle versus axis-aligned rectangle test using the closest point on the rectangle.
pub fn circle_rect_collision(
    cx: f32,
    cy: f32,
    radius: f32,
    rx: f32,
    ry: f32,
    rw: f32,
    rh: f32,
) -> bool {
    let closest_x = cx.clamp(rx, rx + rw);
    let closest_y = cy.clamp(ry, ry + rh);

    let dx = cx - closest_x;
    let dy = cy - closest_y;

    dx * dx + dy * dy < radius * radius
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_player_creation() {
        let player = PlayerState::new(100.0, 200.0);
        assert_eq!(player.x, 100.0);
        assert_eq!(player.y, 200.0);
        assert_eq!(player.width, PLAYER_SIZE);
        assert_eq!(player.health, PLAYER_MAX_HEALTH);
        assert!(!player.is_dead);
    }

    #[test]
    fn test_player_center() {
        let player = PlayerState::new(100.0, 200.0);
        let (cx, cy) = player.center();
        assert_eq!(cx, 100.0 + PLAYER_SIZE / 2.0);
        assert_eq!(cy, 200.0 + PLAYER_SIZE / 2.0);
    }

    #[test]
    fn test_movement_vector_single_axis() {
        let keys = InputKeys {
            d: true,
            ..Default::default()
        };
        assert_eq!(movement_vector(&keys), (1.0, 0.0));
    }

    #[test]
    fn test_movement_vector_opposing_keys_cancel() {
        let keys = InputKeys {
            a: true,
            d: true,
            ..Default::default()
        };
        assert_eq!(movement_vector(&keys), (0.0, 0.0));
    }

    #[test]
    fn test_diagonal_speed_is_normalized() {
        let mut straight = PlayerState::new(1000.0, 1000.0);
        let mut diagonal = PlayerState::new(1000.0, 1000.0);

        let right = InputKeys {
            d: true,
            ..Default::default()
        };
        let up_right = InputKeys {
            w: true,
            d: true,
            ..Default::default()
        };

        apply_movement(&mut straight, &right, 0.1, PLAYER_SPEED, WORLD_WIDTH, WORLD_HEIGHT);
        apply_movement(&mut diagonal, &up_right, 0.1, PLAYER_SPEED, WORLD_WIDTH, WORLD_HEIGHT);

        let straight_dist = straight.x - 1000.0;
        let dx = diagonal.x - 1000.0;
        let dy = diagonal.y - 1000.0;
        let diagonal_dist = (dx * dx + dy * dy).sqrt();

        assert_approx_eq!(straight_dist, PLAYER_SPEED * 0.1, 0.001);
        assert_approx_eq!(diagonal_dist, straight_dist, 0.001);
    }

    #[test]
    fn test_movement_one_second_right() {
        let mut player = PlayerState::new(100.0, 100.0);
        let keys = InputKeys {
            d: true,
            ..Default::default()
        };
        let dt = 1.0 / TICK_RATE as f32;
        for _ in 0..TICK_RATE {
            apply_movement(&mut player, &keys, dt, PLAYER_SPEED, WORLD_WIDTH, WORLD_HEIGHT);
        }
        assert_approx_eq!(player.x, 400.0, 0.01);
        assert_eq!(player.y, 100.0);
    }

    #[test]
    fn test_movement_clamps_to_world() {
        let mut player = PlayerState::new(5.0, WORLD_HEIGHT - PLAYER_SIZE - 1.0);
        let keys = InputKeys {
            a: true,
            s: true,
            ..Default::default()
        };
        apply_movement(&mut player, &keys, 1.0, PLAYER_SPEED, WORLD_WIDTH, WORLD_HEIGHT);
        assert_eq!(player.x, 0.0);
        assert_eq!(player.y, WORLD_HEIGHT - PLAYER_SIZE);
    }

    #[test]
    fn test_circle_rect_collision_inside() {
        assert!(circle_rect_collision(15.0, 15.0, 4.0, 0.0, 0.0, 30.0, 30.0));
    }

    #[test]
    fn test_circle_rect_collision_near_edge() {
        // 3 px from the right edge with radius 4
        assert!(circle_rect_collision(33.0, 15.0, 4.0, 0.0, 0.0, 30.0, 30.0));
        assert!(!circle_rect_collision(35.0, 15.0, 4.0, 0.0, 0.0, 30.0, 30.0));
    }

    #[test]
    fn test_circle_rect_collision_corner() {
        // Diagonal distance to the corner is sqrt(18) > 4
        assert!(!circle_rect_collision(33.0, 33.0, 4.0, 0.0, 0.0, 30.0, 30.0));
        assert!(circle_rect_collision(32.0, 32.0, 4.0, 0.0, 0.0, 30.0, 30.0));
    }

    #[test]
    fn test_lerp() {
        assert_eq!(lerp(0.0, 10.0, 0.0), 0.0);
        assert_eq!(lerp(0.0, 10.0, 1.0), 10.0);
        assert_approx_eq!(lerp(2.0, 4.0, 0.25), 2.5, 1e-6);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn keys_strategy() -> impl Strategy<Value = InputKeys> {
            (any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>())
                .prop_map(|(w, a, s, d)| InputKeys { w, a, s, d })
        }

        proptest! {
            #[test]
            fn player_stays_inside_world(
                start_x in 0.0f32..(WORLD_WIDTH - PLAYER_SIZE),
                start_y in 0.0f32..(WORLD_HEIGHT - PLAYER_SIZE),
                steps in proptest::collection::vec((keys_strategy(), 0.0f32..2.0), 1..60)
            ) {
                let mut player = PlayerState::new(start_x, start_y);
                for (keys, dt) in &steps {
                    apply_movement(&mut player, keys, *dt, PLAYER_SPEED * 10.0, WORLD_WIDTH, WORLD_HEIGHT);
                    prop_assert!(player.x >= 0.0 && player.x <= WORLD_WIDTH - player.width);
                    prop_assert!(player.y >= 0.0 && player.y <= WORLD_HEIGHT - player.height);
                }
            }

            #[test]
            fn step_never_exceeds_configured_speed(keys in keys_strategy(), dt in 0.001f32..0.1) {
                let mut player = PlayerState::new(5000.0, 5000.0);
                apply_movement(&mut player, &keys, dt, PLAYER_SPEED, WORLD_WIDTH, WORLD_HEIGHT);
                let dx = player.x - 5000.0;
                let dy = player.y - 5000.0;
                let travelled = (dx * dx + dy * dy).sqrt();
                prop_assert!(travelled <= PLAYER_SPEED * dt + 0.01);
            }
        }
    }
}
