//! Buffered world views for rendering remote entities.
//!
//! Every `GameStateDelta` is folded into a copy of the newest buffered view and pushed as
//! a new [`WorldSnapshot`] stamped with its arrival time. Rendering happens a little in
//! the past (`now - current_delay`) so there are normally two snapshots bracketing the
//! render time to blend between. The delay follows the observed arrival gap.

use crate::config::InterpolationConfig;
use shared::{lerp, Delta, EntityId, PlayerState, ProjectileState};
use std::collections::{HashMap, VecDeque};

/// Everything the client knows about other entities at one arrival time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldSnapshot {
    /// Client clock in milliseconds when the update arrived
    pub timestamp: u64,
    pub players: HashMap<EntityId, PlayerState>,
    pub projectiles: HashMap<EntityId, ProjectileState>,
}

/// Result of sampling the buffer for one rendered frame.
#[derive(Debug, Clone, Default)]
pub struct InterpolatedFrame {
    pub players: HashMap<EntityId, PlayerState>,
    pub projectiles: HashMap<EntityId, ProjectileState>,
    /// Age of the newest snapshot when sampled
    pub target_delay_ms: f64,
    pub current_delay_ms: f64,
}

/// Position of `render_time` between `t0` and `t1`, clamped to [0, 1].
pub fn blend_fraction(t0: u64, t1: u64, render_time: f64) -> f32 {
    if t1 <= t0 {
        return 1.0;
    }
    let t = (render_time - t0 as f64) / (t1 - t0) as f64;
    t.clamp(0.0, 1.0) as f32
}

/// Blends position; everything else comes from the later state.
pub fn interpolate_player(before: &PlayerState, after: &PlayerState, t: f32) -> PlayerState {
    PlayerState {
        x: lerp(before.x, after.x, t),
        y: lerp(before.y, after.y, t),
        ..*after
    }
}

pub fn interpolate_projectile(
    before: &ProjectileState,
    after: &ProjectileState,
    t: f32,
) -> ProjectileState {
    ProjectileState {
        x: lerp(before.x, after.x, t),
        y: lerp(before.y, after.y, t),
        ..*after
    }
}

#[derive(Debug)]
pub struct InterpolationBuffer {
    snapshots: VecDeque<WorldSnapshot>,
    current_delay_ms: f64,
    config: InterpolationConfig,
}

impl InterpolationBuffer {
    pub fn new(config: InterpolationConfig) -> Self {
        Self {
            snapshots: VecDeque::with_capacity(config.max_snapshots),
            current_delay_ms: Self::initial_delay(&config),
            config,
        }
    }

    fn initial_delay(config: &InterpolationConfig) -> f64 {
        (config.tick_interval_ms * 1.5).clamp(config.min_delay_ms, config.max_delay_ms)
    }

    /// Appends a snapshot, evicting the oldest once the buffer is full.
    pub fn push(&mut self, snapshot: WorldSnapshot) {
        self.snapshots.push_back(snapshot);
        while self.snapshots.len() > self.config.max_snapshots {
            self.snapshots.pop_front();
        }
    }

    pub fn latest(&self) -> Option<&WorldSnapshot> {
        self.snapshots.back()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn current_delay_ms(&self) -> f64 {
        self.current_delay_ms
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.current_delay_ms = Self::initial_delay(&self.config);
    }

    /// Folds one server update into a new buffered view.
    ///
    /// A full-state update starts from an empty view and never deletes; otherwise the
    /// newest view is copied, changed entities are upserted and deleted ids removed. The
    /// local player is skipped since it is predicted, not interpolated.
    pub fn apply_delta(
        &mut self,
        local_id: Option<EntityId>,
        is_full_state: bool,
        delta: &Delta,
        received_ms: u64,
    ) {
        let mut snapshot = match (is_full_state, self.latest()) {
            (false, Some(latest)) => latest.clone(),
            _ => WorldSnapshot::default(),
        };
        snapshot.timestamp = received_ms;

        for (id, player) in &delta.players {
            if Some(*id) == local_id {
                continue;
            }
            snapshot.players.insert(*id, *player);
        }
        for projectile in &delta.projectiles {
            snapshot.projectiles.insert(projectile.id, *projectile);
        }

        if !is_full_state {
            for id in &delta.deleted_players {
                snapshot.players.remove(id);
            }
            for id in &delta.deleted_projectiles {
                snapshot.projectiles.remove(id);
            }
        }

        self.push(snapshot);
    }

    /// The two snapshots around `render_time`, or the newest two if none bracket it.
    pub fn bracket(&self, render_time: f64) -> Option<(&WorldSnapshot, &WorldSnapshot)> {
        if self.snapshots.len() < 2 {
            return None;
        }

        for (before, after) in self.snapshots.iter().zip(self.snapshots.iter().skip(1)) {
            if before.timestamp as f64 <= render_time && after.timestamp as f64 >= render_time {
                return Some((before, after));
            }
        }

        let len = self.snapshots.len();
        Some((&self.snapshots[len - 2], &self.snapshots[len - 1]))
    }

    /// Interpolates remote entities for a frame rendered at `now_ms` and adapts the delay.
    pub fn sample(&mut self, now_ms: u64) -> InterpolatedFrame {
        let render_time = now_ms as f64 - self.current_delay_ms;
        let mut frame = InterpolatedFrame::default();
        let tick = self.config.tick_interval_ms;

        if let Some((before, after)) = self.bracket(render_time) {
            let t = blend_fraction(before.timestamp, after.timestamp, render_time);

            for (id, from) in &before.players {
                if let Some(to) = after.players.get(id) {
                    frame.players.insert(*id, interpolate_player(from, to, t));
                }
            }
            for (id, from) in &before.projectiles {
                if let Some(to) = after.projectiles.get(id) {
                    frame.projectiles.insert(*id, interpolate_projectile(from, to, t));
                }
            }

            let newest = self.snapshots.back().map_or(now_ms, |s| s.timestamp);
            frame.target_delay_ms = now_ms.saturating_sub(newest) as f64;

            let ideal = frame.target_delay_ms + tick * 1.5;
            let difference = ideal - self.current_delay_ms;
            let step = if difference.abs() > tick * 0.5 {
                self.config.adjustment_step_ms * 2.0
            } else {
                self.config.adjustment_step_ms
            };
            if difference > 0.0 {
                self.current_delay_ms += step;
            } else if difference < 0.0 {
                self.current_delay_ms -= step;
            }
        } else if let Some(latest) = self.snapshots.back() {
            // Starved: show what we have and back off hard.
            frame.players = latest.players.clone();
            frame.projectiles = latest.projectiles.clone();
            frame.target_delay_ms = now_ms.saturating_sub(latest.timestamp) as f64;
            self.current_delay_ms += self.config.adjustment_step_ms * 5.0;
        }

        self.current_delay_ms = self
            .current_delay_ms
            .clamp(self.config.min_delay_ms, self.config.max_delay_ms);
        frame.current_delay_ms = self.current_delay_ms;
        frame
    }
}
