//! Tunable client parameters.

use shared::{
    CAMERA_UPDATE_RATE_MS, DEFAULT_CAMERA_HEIGHT, DEFAULT_CAMERA_WIDTH, DELAY_ADJUSTMENT_STEP_MS,
    INPUT_SEND_RATE_MS, INPUT_TIMEOUT_MS, MAX_BUFFER_SIZE, MAX_INTERPOLATION_DELAY_MS,
    MIN_INTERPOLATION_DELAY_MS, MIN_SEND_INTERVAL_MS, PLAYER_SPEED, RECONNECT_DELAY_MS,
    SHOOT_COOLDOWN_MS, TICK_INTERVAL_MS, WORLD_HEIGHT, WORLD_WIDTH,
};
use std::time::Duration;

/// Settings for the remote-entity interpolation buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolationConfig {
    pub tick_interval_ms: f64,
    pub min_delay_ms: f64,
    pub max_delay_ms: f64,
    /// Base step the delay moves by per sample.
    pub adjustment_step_ms: f64,
    pub max_snapshots: usize,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: TICK_INTERVAL_MS,
            min_delay_ms: MIN_INTERPOLATION_DELAY_MS,
            max_delay_ms: MAX_INTERPOLATION_DELAY_MS,
            adjustment_step_ms: DELAY_ADJUSTMENT_STEP_MS,
            max_snapshots: MAX_BUFFER_SIZE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub world_width: f32,
    pub world_height: f32,
    pub player_speed: f32,
    /// Length of one fixed prediction step, matching the server tick.
    pub fixed_dt: f32,

    pub min_send_interval_ms: u64,
    pub input_send_rate_ms: u64,
    /// Unacknowledged inputs older than this are dropped.
    pub input_timeout_ms: u64,
    pub camera_update_rate_ms: u64,
    pub shoot_cooldown_ms: u64,

    pub camera_width: f32,
    pub camera_height: f32,

    pub interpolation: InterpolationConfig,

    pub reconnect_delay: Duration,
    /// Silence from the server after which the connection is considered lost.
    pub server_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            world_width: WORLD_WIDTH,
            world_height: WORLD_HEIGHT,
            player_speed: PLAYER_SPEED,
            fixed_dt: (TICK_INTERVAL_MS / 1000.0) as f32,

            min_send_interval_ms: MIN_SEND_INTERVAL_MS,
            input_send_rate_ms: INPUT_SEND_RATE_MS,
            input_timeout_ms: INPUT_TIMEOUT_MS,
            camera_update_rate_ms: CAMERA_UPDATE_RATE_MS,
            shoot_cooldown_ms: SHOOT_COOLDOWN_MS,

            camera_width: DEFAULT_CAMERA_WIDTH,
            camera_height: DEFAULT_CAMERA_HEIGHT,

            interpolation: InterpolationConfig::default(),

            reconnect_delay: Duration::from_millis(RECONNECT_DELAY_MS),
            server_timeout: Duration::from_secs(5),
        }
    }
}
