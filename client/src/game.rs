//! Fixed-step client session.
//!
//! [`GameSession`] is driven at render rate through [`GameSession::frame`]. Inside, an
//! accumulator runs fixed steps of the same length as a server tick. Network events are
//! queued as they arrive and only consumed at the start of a fixed step, so a correction
//! never lands in the middle of a prediction step. Packets the session wants to send are
//! collected with [`GameSession::take_outgoing`].

use crate::camera::Camera;
use crate::config::ClientConfig;
use crate::input::InputSender;
use crate::interpolation::{InterpolatedFrame, InterpolationBuffer};
use crate::prediction::{MovementParams, Predictor};
use log::{info, warn};
use shared::{lerp, Delta, EntityId, InputKeys, Packet, PlayerState};
use std::collections::VecDeque;

/// Longest frame the accumulator accepts; anything above is treated as this long.
const MAX_FRAME_DT: f32 = 0.25;

/// Server messages after decoding, in the order they arrived.
#[derive(Debug, Clone, PartialEq)]
pub enum NetEvent {
    Welcome {
        id: EntityId,
    },
    StateUpdate {
        tick: u32,
        is_full_state: bool,
        last_processed_input: Option<u32>,
        your_state: PlayerState,
        delta: Delta,
        /// Client clock in milliseconds when the datagram arrived
        received_ms: u64,
    },
    Disconnected {
        reason: String,
    },
}

impl NetEvent {
    /// Maps a server packet to an event. Client-to-server packets yield `None`.
    pub fn from_packet(packet: Packet, received_ms: u64) -> Option<Self> {
        match packet {
            Packet::Welcome { id } => Some(NetEvent::Welcome { id }),
            Packet::GameStateDelta {
                tick,
                is_full_state,
                last_processed_input,
                your_state,
                delta,
            } => Some(NetEvent::StateUpdate {
                tick,
                is_full_state,
                last_processed_input,
                your_state,
                delta,
                received_ms,
            }),
            Packet::Disconnected { reason } => Some(NetEvent::Disconnected { reason }),
            _ => None,
        }
    }
}

/// What the player is doing this frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Controls {
    pub keys: InputKeys,
    /// Screen position to shoot at while the trigger is held
    pub shoot_at: Option<(f32, f32)>,
}

/// Anything that can produce controls: a keyboard and mouse, or a bot.
pub trait ControlSource {
    fn sample(&mut self, now_ms: u64) -> Controls;
}

/// Everything needed to draw one frame.
#[derive(Debug, Clone)]
pub struct RenderFrame {
    /// Blended local player, `None` until the server sent our state
    pub local: Option<PlayerState>,
    pub remote: InterpolatedFrame,
    pub camera: Camera,
}

/// Numbers worth showing on a HUD.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionStats {
    pub player_id: Option<EntityId>,
    pub last_tick: Option<u32>,
    pub pending_inputs: usize,
    pub buffered_snapshots: usize,
    pub reconciliations: u64,
    pub is_reconciling: bool,
    pub interpolation_delay_ms: f64,
}

pub struct GameSession {
    config: ClientConfig,
    local_id: Option<EntityId>,
    last_tick: Option<u32>,

    predictor: Predictor,
    interpolation: InterpolationBuffer,
    camera: Camera,
    input: InputSender,

    events: VecDeque<NetEvent>,
    outgoing: Vec<Packet>,

    accumulator: f32,
    previous_state: PlayerState,
    current_state: PlayerState,

    last_camera_send_ms: Option<u64>,
    last_shoot_ms: Option<u64>,
}

impl GameSession {
    pub fn new(config: ClientConfig) -> Self {
        let predictor = Predictor::new(
            MovementParams {
                speed: config.player_speed,
                world_width: config.world_width,
                world_height: config.world_height,
            },
            config.input_timeout_ms,
        );
        let initial = *predictor.player();

        Self {
            local_id: None,
            last_tick: None,
            interpolation: InterpolationBuffer::new(config.interpolation),
            camera: Camera::new(
                config.camera_width,
                config.camera_height,
                config.world_width,
                config.world_height,
            ),
            input: InputSender::new(config.min_send_interval_ms, config.input_send_rate_ms),
            predictor,
            events: VecDeque::new(),
            outgoing: Vec::new(),
            accumulator: 0.0,
            previous_state: initial,
            current_state: initial,
            last_camera_send_ms: None,
            last_shoot_ms: None,
            config,
        }
    }

    pub fn local_id(&self) -> Option<EntityId> {
        self.local_id
    }

    /// True between `Welcome` and disconnect
    pub fn is_connected(&self) -> bool {
        self.local_id.is_some()
    }

    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    pub fn interpolation(&self) -> &InterpolationBuffer {
        &self.interpolation
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Queues an event for the next fixed step.
    pub fn push_event(&mut self, event: NetEvent) {
        self.events.push_back(event);
    }

    /// Packets produced since the last call.
    pub fn take_outgoing(&mut self) -> Vec<Packet> {
        std::mem::take(&mut self.outgoing)
    }

    /// Advances by a render frame of `dt` seconds and returns what to draw.
    pub fn frame(&mut self, now_ms: u64, dt: f32, controls: &Controls) -> RenderFrame {
        let fixed_dt = self.config.fixed_dt;
        self.accumulator += dt.clamp(0.0, MAX_FRAME_DT);

        while self.accumulator >= fixed_dt {
            self.fixed_step(now_ms, controls);
            self.accumulator -= fixed_dt;
        }

        let alpha = (self.accumulator / fixed_dt).clamp(0.0, 1.0);
        let local = self.predictor.is_synced().then(|| PlayerState {
            x: lerp(self.previous_state.x, self.current_state.x, alpha),
            y: lerp(self.previous_state.y, self.current_state.y, alpha),
            ..self.current_state
        });

        if let Some(local) = &local {
            self.camera.follow(local);
        }

        RenderFrame {
            local,
            remote: self.interpolation.sample(now_ms),
            camera: self.camera,
        }
    }

    /// One prediction step: consume events, reconcile, predict, then queue packets.
    pub fn fixed_step(&mut self, now_ms: u64, controls: &Controls) {
        let dt = self.config.fixed_dt;
        let mut correction = None;

        while let Some(event) = self.events.pop_front() {
            match event {
                NetEvent::Welcome { id } => {
                    info!("Connected! Player ID: {}", id);
                    self.local_id = Some(id);
                }
                NetEvent::StateUpdate {
                    tick,
                    is_full_state,
                    last_processed_input,
                    your_state,
                    delta,
                    received_ms,
                } => {
                    if self.local_id.is_none() {
                        continue;
                    }
                    self.last_tick = Some(tick);
                    self.interpolation.apply_delta(
                        self.local_id,
                        is_full_state,
                        &delta,
                        received_ms,
                    );
                    correction = Some((your_state, last_processed_input));
                }
                NetEvent::Disconnected { reason } => {
                    warn!("Disconnected: {}", reason);
                    self.reset();
                    correction = None;
                }
            }
        }

        if let Some((state, last_processed_input)) = correction {
            self.predictor
                .reconcile(state, last_processed_input, now_ms, dt);
        }

        self.previous_state = *self.predictor.player();
        if self.predictor.is_synced() {
            self.predictor.apply_local(&controls.keys, dt);
        }
        self.current_state = *self.predictor.player();

        if !self.is_connected() {
            return;
        }

        if let Some(input) = self.input.poll(controls.keys, now_ms) {
            self.predictor.push_pending(input);
            self.outgoing.push(Packet::Input {
                seq: input.seq,
                keys: input.keys,
                timestamp: input.timestamp,
            });
        }
        self.predictor.drop_expired(now_ms);

        self.queue_camera(now_ms);

        if let Some(target) = controls.shoot_at {
            self.try_shoot(target, now_ms);
        }
    }

    fn queue_camera(&mut self, now_ms: u64) {
        let due = self
            .last_camera_send_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= self.config.camera_update_rate_ms);
        if !due {
            return;
        }

        let viewport = self.camera.viewport();
        self.outgoing.push(Packet::Camera {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
        });
        self.last_camera_send_ms = Some(now_ms);
    }

    fn try_shoot(&mut self, screen_target: (f32, f32), now_ms: u64) {
        let player = self.predictor.player();
        if player.is_dead || !self.predictor.is_synced() {
            return;
        }
        if let Some(last) = self.last_shoot_ms {
            if now_ms.saturating_sub(last) < self.config.shoot_cooldown_ms {
                return;
            }
        }

        let (cx, cy) = player.center();
        let (wx, wy) = self.camera.to_world(screen_target.0, screen_target.1);
        let angle = (wy - cy).atan2(wx - cx);

        self.outgoing.push(Packet::Shoot {
            angle,
            timestamp: now_ms,
        });
        self.last_shoot_ms = Some(now_ms);
    }

    /// Drops all connection state. Events still queued are kept.
    pub fn reset(&mut self) {
        self.local_id = None;
        self.last_tick = None;
        self.predictor.clear();
        self.interpolation.clear();
        self.input.reset();
        self.accumulator = 0.0;
        self.previous_state = *self.predictor.player();
        self.current_state = self.previous_state;
        self.last_camera_send_ms = None;
        self.last_shoot_ms = None;
    }

    pub fn stats(&self, now_ms: u64) -> SessionStats {
        SessionStats {
            player_id: self.local_id,
            last_tick: self.last_tick,
            pending_inputs: self.predictor.pending().len(),
            buffered_snapshots: self.interpolation.len(),
            reconciliations: self.predictor.reconciliation_count(),
            is_reconciling: self.predictor.is_recently_reconciled(now_ms),
            interpolation_delay_ms: self.interpolation.current_delay_ms(),
        }
    }
}
