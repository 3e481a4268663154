//! Tunable server parameters.

use crate::interest::ViewportLimits;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub world_width: f32,
    pub world_height: f32,
    pub player_speed: f32,
    pub spawn_margin: f32,
    pub tick_rate: u32,
    /// Upper bound applied to the measured tick delta.
    pub max_delta_time: f32,

    pub shoot_cooldown_ms: u64,
    pub projectile_speed: f32,
    pub projectile_radius: f32,
    pub projectile_damage: i32,
    pub max_projectiles_per_owner: usize,
    /// How long a dead player stays in the world before it is removed.
    pub reaper_delay_ms: u64,

    pub cell_size: f32,
    pub camera_padding: f32,
    pub viewport_limits: ViewportLimits,
    pub full_state_interval: u32,
    /// Entity states carried by one delta; the rest wait for the following ticks.
    pub max_delta_entities: usize,

    pub grid_cell_pool: (usize, usize),
    pub projectile_pool: (usize, usize),
    pub snapshot_pool: (usize, usize),
    pub delta_pool: (usize, usize),

    pub max_clients: usize,
    pub client_timeout: Duration,
    /// Inbound packets a connection may send per second before extra ones are dropped.
    pub max_messages_per_second: u32,
    pub stats_interval_ticks: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            world_width: shared::WORLD_WIDTH,
            world_height: shared::WORLD_HEIGHT,
            player_speed: shared::PLAYER_SPEED,
            spawn_margin: shared::SPAWN_MARGIN,
            tick_rate: shared::TICK_RATE,
            max_delta_time: 0.05,

            shoot_cooldown_ms: shared::SHOOT_COOLDOWN_MS,
            projectile_speed: shared::PROJECTILE_SPEED,
            projectile_radius: shared::PROJECTILE_RADIUS,
            projectile_damage: shared::PROJECTILE_DAMAGE,
            max_projectiles_per_owner: shared::MAX_PROJECTILES_PER_OWNER,
            reaper_delay_ms: shared::REAPER_DELAY_MS,

            cell_size: shared::CELL_SIZE,
            camera_padding: shared::CAMERA_PADDING,
            viewport_limits: ViewportLimits::default(),
            full_state_interval: shared::FULL_STATE_INTERVAL,
            max_delta_entities: shared::MAX_DELTA_ENTITIES,

            grid_cell_pool: (shared::GRID_CELL_POOL_PREWARM, shared::GRID_CELL_POOL_MAX),
            projectile_pool: (shared::PROJECTILE_POOL_PREWARM, shared::PROJECTILE_POOL_MAX),
            snapshot_pool: (shared::SNAPSHOT_POOL_PREWARM, shared::SNAPSHOT_POOL_MAX),
            delta_pool: (shared::DELTA_POOL_PREWARM, shared::DELTA_POOL_MAX),

            max_clients: 1000,
            client_timeout: Duration::from_secs(5),
            max_messages_per_second: 60,
            stats_interval_ticks: shared::TICK_RATE * 5,
        }
    }
}

impl SimConfig {
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }
}
