//! Single owner of all mutable server state.
//!
//! [`Simulation`] bundles the world, the connection table, the snapshot engine and the
//! delta scratch pool. The transport feeds it decoded packets and calls [`Simulation::tick`]
//! on a fixed interval; everything it wants to send is queued as encoded datagrams and
//! collected with [`Simulation::drain_outgoing`]. Nothing here is shared across tasks.

use crate::client_manager::ClientManager;
use crate::config::SimConfig;
use crate::game::{GameState, TickReport};
use crate::interest::{compute_visible_cells, sanitize_viewport, viewport_centered_on};
use crate::pool::{Pool, PoolStats};
use crate::projectiles::{Projectile, ShotRejected};
use crate::snapshot::SnapshotEngine;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{encode_packet, Delta, EntityId, Packet, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Instant;

pub const REASON_SERVER_FULL: &str = "Server full";
pub const REASON_VERSION_MISMATCH: &str = "Protocol version mismatch";
pub const REASON_DIED: &str = "You died";
pub const REASON_TIMED_OUT: &str = "Timed out";

/// An encoded datagram waiting to be sent.
#[derive(Debug, Clone)]
pub struct Outgoing {
    pub addr: SocketAddr,
    pub bytes: Vec<u8>,
}

pub struct Simulation {
    config: SimConfig,
    game: GameState,
    clients: ClientManager,
    snapshots: SnapshotEngine,
    delta_pool: Pool<Delta>,
    outbox: Vec<Outgoing>,
    rng: StdRng,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Same as [`Simulation::new`] with deterministic spawn positions.
    pub fn with_seed(config: SimConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: SimConfig, rng: StdRng) -> Self {
        let (snapshot_prewarm, snapshot_max) = config.snapshot_pool;
        let (delta_prewarm, delta_max) = config.delta_pool;

        Self {
            game: GameState::new(config.clone()),
            clients: ClientManager::new(config.max_clients),
            snapshots: SnapshotEngine::new(snapshot_prewarm, snapshot_max, config.cell_size),
            delta_pool: Pool::new(delta_prewarm, delta_max),
            outbox: Vec::new(),
            rng,
            config,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut GameState {
        &mut self.game
    }

    pub fn clients(&self) -> &ClientManager {
        &self.clients
    }

    pub fn snapshots(&self) -> &SnapshotEngine {
        &self.snapshots
    }

    /// Admits a new connection, spawns its player and queues the welcome message.
    ///
    /// A second `Connect` from an address that is already connected replaces the old
    /// connection.
    pub fn connect(&mut self, addr: SocketAddr, client_version: u32) -> Option<EntityId> {
        if client_version != PROTOCOL_VERSION {
            warn!(
                "Rejecting {}: client version {} (server {})",
                addr, client_version, PROTOCOL_VERSION
            );
            self.send(
                addr,
                &Packet::Disconnected {
                    reason: REASON_VERSION_MISMATCH.to_string(),
                },
            );
            return None;
        }

        if let Some(existing) = self.clients.find_client_by_addr(addr) {
            info!("Replacing existing client {} from {}", existing, addr);
            self.disconnect(existing, None);
        }

        if self.clients.is_full() {
            self.send(
                addr,
                &Packet::Disconnected {
                    reason: REASON_SERVER_FULL.to_string(),
                },
            );
            return None;
        }

        let id = self.game.allocate_id();
        if !self.clients.add_client(id, addr) {
            return None;
        }
        let player = self.game.spawn_player(id, &mut self.rng);
        let baseline = self.snapshots.acquire_baseline();

        if let Some(client) = self.clients.get_mut(id) {
            let (cx, cy) = player.center();
            client.viewport = viewport_centered_on(
                cx,
                cy,
                shared::DEFAULT_CAMERA_WIDTH,
                shared::DEFAULT_CAMERA_HEIGHT,
            );
            compute_visible_cells(
                &client.viewport,
                self.config.cell_size,
                self.config.camera_padding,
                &mut client.visible_cells,
            );
            client.last_sent = baseline;
        }

        self.send(addr, &Packet::Welcome { id });
        Some(id)
    }

    /// Removes a connection together with its player, its projectiles and its baseline
    /// snapshot. With a `reason`, the client is told why before it is dropped.
    pub fn disconnect(&mut self, id: EntityId, reason: Option<&str>) -> bool {
        let Some(client) = self.clients.remove_client(&id) else {
            return false;
        };

        if let Some(handle) = client.last_sent {
            self.snapshots.release_baseline(handle);
        }
        self.game.remove_player(id);

        if let Some(reason) = reason {
            self.send(
                client.addr,
                &Packet::Disconnected {
                    reason: reason.to_string(),
                },
            );
        }
        true
    }

    /// Applies one decoded packet to connection state.
    ///
    /// Movement, camera and shoot requests only update the connection; the world changes
    /// on the next [`Simulation::tick`].
    pub fn handle_packet(&mut self, addr: SocketAddr, packet: Packet, now_ms: u64) {
        if let Packet::Connect { client_version } = packet {
            self.connect(addr, client_version);
            return;
        }

        let Some(id) = self.clients.find_client_by_addr(addr) else {
            debug!("Ignoring packet from unknown address {}", addr);
            return;
        };

        let max_messages = self.config.max_messages_per_second;
        if let Some(client) = self.clients.get_mut(id) {
            client.touch();
            if !client.allow_message(Instant::now(), max_messages) {
                debug!("Client {} exceeded {} messages/s", id, max_messages);
                return;
            }
        }

        match packet {
            Packet::Input { seq, keys, .. } => {
                self.clients.apply_input(id, seq, keys);
            }
            Packet::Shoot { angle, .. } => {
                if let Err(e) = self.shoot(id, angle, now_ms) {
                    match e {
                        ShotRejected::OwnerCap(_) | ShotRejected::PoolExhausted => {
                            warn!("Shot rejected for client {}: {}", id, e)
                        }
                        _ => debug!("Shot rejected for client {}: {}", id, e),
                    }
                }
            }
            Packet::Camera {
                x,
                y,
                width,
                height,
            } => {
                let Some(viewport) =
                    sanitize_viewport(x, y, width, height, &self.config.viewport_limits)
                else {
                    debug!("Ignoring non-finite camera from client {}", id);
                    return;
                };
                if let Some(client) = self.clients.get_mut(id) {
                    client.viewport = viewport;
                    compute_visible_cells(
                        &viewport,
                        self.config.cell_size,
                        self.config.camera_padding,
                        &mut client.visible_cells,
                    );
                }
            }
            Packet::Disconnect => {
                self.disconnect(id, None);
            }
            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Fires a projectile for a connection, enforcing its shoot cooldown.
    pub fn shoot(
        &mut self,
        id: EntityId,
        angle: f32,
        now_ms: u64,
    ) -> Result<EntityId, ShotRejected> {
        let client = self
            .clients
            .get_mut(id)
            .ok_or(ShotRejected::UnknownShooter)?;
        if !client.can_shoot(now_ms, self.config.shoot_cooldown_ms) {
            return Err(ShotRejected::Cooldown);
        }

        let projectile = self.game.shoot(id, angle)?;
        client.last_shoot_ms = Some(now_ms);
        Ok(projectile)
    }

    /// Advances the world one step, closes reaped connections and queues a delta for
    /// every connection.
    pub fn tick(&mut self, dt: f32, now_ms: u64) -> TickReport {
        let mut report = self.game.tick(dt, now_ms, self.clients.inputs());

        for id in &report.reaped {
            if !self.disconnect(*id, Some(REASON_DIED)) {
                debug!("Reaped player {} had no connection", id);
            }
        }

        let captured = self.snapshots.capture(
            report.tick,
            self.game.players.iter().map(|(id, player)| (*id, player)),
            self.game.projectiles.iter().map(Projectile::state),
        );
        if !captured {
            warn!("Snapshot pool exhausted, skipping broadcast for tick {}", report.tick);
            return report;
        }

        self.broadcast(&mut report);
        report
    }

    fn broadcast(&mut self, report: &mut TickReport) {
        let tick = report.tick;
        let scheduled_full_state = tick % self.config.full_state_interval.max(1) == 0;
        let limit = self.config.max_delta_entities;

        let Some(scratch) = self.delta_pool.acquire() else {
            warn!("Delta pool exhausted, skipping broadcast for tick {}", tick);
            return;
        };

        for client in self.clients.iter_mut() {
            let Some(your_state) = self.game.players.get(&client.id).copied() else {
                continue;
            };
            let Some(delta) = self.delta_pool.get_mut(scratch) else {
                break;
            };
            delta.clear();

            let is_full_state = scheduled_full_state || client.force_full_state;
            let sent = self.snapshots.build_delta(
                client.id,
                &client.visible_cells,
                client.last_sent,
                is_full_state,
                limit,
                delta,
            );
            if sent == limit {
                debug!("Delta for client {} capped at {} entities", client.id, limit);
            }

            let packet = Packet::GameStateDelta {
                tick,
                is_full_state,
                last_processed_input: client.last_processed_input,
                your_state,
                delta: std::mem::take(delta),
            };
            let delivered = match encode_packet(&packet) {
                Ok(bytes) => {
                    self.outbox.push(Outgoing {
                        addr: client.addr,
                        bytes,
                    });
                    report.messages += 1;
                    report.sent_entities += sent;
                    true
                }
                Err(e) => {
                    warn!("Failed to encode delta for client {}: {}", client.id, e);
                    false
                }
            };

            // Hand the lists back so their capacity is reused for the next connection.
            if let Packet::GameStateDelta { delta: used, .. } = packet {
                if let Some(delta) = self.delta_pool.get_mut(scratch) {
                    *delta = used;
                }
            }

            // An undelivered delta leaves the baseline as the client last saw it.
            if delivered {
                self.snapshots.refresh_last_sent(
                    client.id,
                    &client.visible_cells,
                    is_full_state,
                    sent,
                    &mut client.last_sent,
                );
                client.force_full_state = false;
            }
        }

        self.delta_pool.release(scratch);
    }

    /// Disconnects every client that has been silent longer than the configured timeout.
    pub fn sweep_timeouts(&mut self) -> Vec<EntityId> {
        let timed_out = self.clients.timed_out(self.config.client_timeout);
        for id in &timed_out {
            info!("Client {} timed out", id);
            self.disconnect(*id, Some(REASON_TIMED_OUT));
        }
        timed_out
    }

    fn send(&mut self, addr: SocketAddr, packet: &Packet) {
        match encode_packet(packet) {
            Ok(bytes) => self.outbox.push(Outgoing { addr, bytes }),
            Err(e) => warn!("Failed to encode packet for {}: {}", addr, e),
        }
    }

    /// Datagrams queued since the last call, in the order they were produced.
    pub fn drain_outgoing(&mut self) -> std::vec::Drain<'_, Outgoing> {
        self.outbox.drain(..)
    }

    pub fn delta_pool_stats(&self) -> PoolStats {
        self.delta_pool.stats()
    }

    /// Logs a performance report for the given tick.
    pub fn log_stats(&self, report: &TickReport, tick_time_ms: f64) {
        let players = self.game.players.len();
        let projectiles = self.game.projectiles.len();
        let projectile_stats = self.game.projectile_pool_stats();
        let cell_stats = self.game.cell_pool_stats();
        let snapshot_stats = self.snapshots.stats();
        let delta_stats = self.delta_pool.stats();
        let avg_entities = if report.messages > 0 {
            report.sent_entities as f64 / report.messages as f64
        } else {
            0.0
        };

        debug!(
            "Tick {}: {} players, {} projectiles, {} clients",
            report.tick,
            players,
            projectiles,
            self.clients.len()
        );
        debug!(
            "Pools: projectiles {} free ({:.1}% reuse), cells {} free ({:.1}% reuse), snapshots {} free ({:.1}% reuse), deltas {} free ({:.1}% reuse)",
            projectile_stats.pool_size,
            projectile_stats.reuse_rate(),
            cell_stats.pool_size,
            cell_stats.reuse_rate(),
            snapshot_stats.pool_size,
            snapshot_stats.reuse_rate(),
            delta_stats.pool_size,
            delta_stats.reuse_rate()
        );
        debug!(
            "Collision checks: {} (vs {} brute force), active grid cells: {}",
            report.collision_checks,
            projectiles * players,
            report.grid_cells
        );
        debug!(
            "Network: {} msgs, avg {:.1} entities/client, tick took {:.2}ms",
            report.messages, avg_entities, tick_time_ms
        );

        let rejected = self.game.projectiles.rejected_shots();
        if rejected > 0 {
            debug!("Rejected shots: {}", rejected);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{decode_packet, InputKeys, PlayerState, MAX_DATAGRAM_SIZE};

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn decode_all(sim: &mut Simulation) -> Vec<(SocketAddr, Packet)> {
        sim.drain_outgoing()
            .map(|out| (out.addr, decode_packet(&out.bytes, MAX_DATAGRAM_SIZE).unwrap()))
            .collect()
    }

    #[test]
    fn test_connect_sends_welcome() {
        let mut sim = Simulation::with_seed(SimConfig::default(), 1);
        let id = sim.connect(addr(9000), PROTOCOL_VERSION).unwrap();

        let sent = decode_all(&mut sim);
        assert_eq!(sent, vec![(addr(9000), Packet::Welcome { id })]);
        assert!(sim.game().player(id).is_some());

        let client = sim.clients().get(id).unwrap();
        assert!(client.last_sent.is_some());
        assert!(!client.visible_cells.is_empty());
    }

    #[test]
    fn test_connect_rejects_wrong_version() {
        let mut sim = Simulation::with_seed(SimConfig::default(), 1);
        assert!(sim.connect(addr(9000), PROTOCOL_VERSION + 1).is_none());
        let sent = decode_all(&mut sim);
        assert!(matches!(sent[0].1, Packet::Disconnected { .. }));
        assert!(sim.clients().is_empty());
    }

    #[test]
    fn test_connect_when_full() {
        let config = SimConfig {
            max_clients: 1,
            ..SimConfig::default()
        };
        let mut sim = Simulation::with_seed(config, 1);
        sim.connect(addr(9000), PROTOCOL_VERSION).unwrap();
        assert!(sim.connect(addr(9001), PROTOCOL_VERSION).is_none());

        let sent = decode_all(&mut sim);
        assert_eq!(
            sent[1],
            (
                addr(9001),
                Packet::Disconnected {
                    reason: REASON_SERVER_FULL.to_string()
                }
            )
        );
    }

    #[test]
    fn test_reconnect_from_same_address_replaces() {
        let mut sim = Simulation::with_seed(SimConfig::default(), 1);
        let first = sim.connect(addr(9000), PROTOCOL_VERSION).unwrap();
        let second = sim.connect(addr(9000), PROTOCOL_VERSION).unwrap();
        assert_ne!(first, second);
        assert_eq!(sim.clients().len(), 1);
        assert!(sim.game().player(first).is_none());
        assert_eq!(sim.snapshots().stats().active_count, 1);
    }

    #[test]
    fn test_input_packet_updates_connection() {
        let mut sim = Simulation::with_seed(SimConfig::default(), 1);
        let id = sim.connect(addr(9000), PROTOCOL_VERSION).unwrap();
        let keys = InputKeys {
            d: true,
            ..Default::default()
        };
        sim.handle_packet(
            addr(9000),
            Packet::Input {
                seq: 4,
                keys,
                timestamp: 0,
            },
            0,
        );

        let client = sim.clients().get(id).unwrap();
        assert_eq!(client.keys, keys);
        assert_eq!(client.last_processed_input, Some(4));
    }

    #[test]
    fn test_camera_packet_is_clamped() {
        let mut sim = Simulation::with_seed(SimConfig::default(), 1);
        let id = sim.connect(addr(9000), PROTOCOL_VERSION).unwrap();
        sim.handle_packet(
            addr(9000),
            Packet::Camera {
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 100_000.0,
            },
            0,
        );

        let client = sim.clients().get(id).unwrap();
        assert_eq!(client.viewport.width, shared::MIN_CAMERA_WIDTH);
        assert_eq!(client.viewport.height, shared::MAX_CAMERA_HEIGHT);

        sim.handle_packet(
            addr(9000),
            Packet::Camera {
                x: f32::NAN,
                y: 0.0,
                width: 800.0,
                height: 600.0,
            },
            0,
        );
        assert_eq!(sim.clients().get(id).unwrap().viewport.x, 0.0);
    }

    #[test]
    fn test_shoot_cooldown() {
        let mut sim = Simulation::with_seed(SimConfig::default(), 1);
        let id = sim.connect(addr(9000), PROTOCOL_VERSION).unwrap();

        assert!(sim.shoot(id, 0.0, 1_000).is_ok());
        assert_eq!(sim.shoot(id, 0.0, 1_100), Err(ShotRejected::Cooldown));
        assert!(sim.shoot(id, 0.0, 1_200).is_ok());
        assert_eq!(sim.game().projectiles.owner_count(id), 2);
    }

    #[test]
    fn test_rejected_shot_does_not_reset_cooldown() {
        let mut sim = Simulation::with_seed(SimConfig::default(), 1);
        let id = sim.connect(addr(9000), PROTOCOL_VERSION).unwrap();

        assert_eq!(sim.shoot(id, f32::NAN, 1_000), Err(ShotRejected::InvalidAngle));
        assert!(sim.shoot(id, 0.0, 1_001).is_ok());
    }

    #[test]
    fn test_packets_from_unknown_address_are_ignored() {
        let mut sim = Simulation::with_seed(SimConfig::default(), 1);
        sim.handle_packet(addr(9999), Packet::Disconnect, 0);
        assert!(decode_all(&mut sim).is_empty());
    }

    #[test]
    fn test_message_budget_drops_excess() {
        let config = SimConfig {
            max_messages_per_second: 2,
            ..SimConfig::default()
        };
        let mut sim = Simulation::with_seed(config, 1);
        let id = sim.connect(addr(9000), PROTOCOL_VERSION).unwrap();

        for seq in 0..5 {
            sim.handle_packet(
                addr(9000),
                Packet::Input {
                    seq,
                    keys: InputKeys::default(),
                    timestamp: 0,
                },
                0,
            );
        }
        assert_eq!(sim.clients().get(id).unwrap().last_processed_input, Some(1));
    }

    #[test]
    fn test_tick_sends_delta_to_every_client() {
        let mut sim = Simulation::with_seed(SimConfig::default(), 1);
        let a = sim.connect(addr(9000), PROTOCOL_VERSION).unwrap();
        let b = sim.connect(addr(9001), PROTOCOL_VERSION).unwrap();
        decode_all(&mut sim);

        let report = sim.tick(1.0 / 30.0, 0);
        assert_eq!(report.messages, 2);

        let sent = decode_all(&mut sim);
        assert_eq!(sent.len(), 2);
        for (to, packet) in sent {
            let own = if to == addr(9000) { a } else { b };
            match packet {
                Packet::GameStateDelta {
                    tick,
                    is_full_state,
                    last_processed_input,
                    delta,
                    ..
                } => {
                    assert_eq!(tick, 0);
                    assert!(is_full_state);
                    assert_eq!(last_processed_input, None);
                    // A viewer's own player never appears in its delta.
                    assert!(delta.players.iter().all(|(pid, _)| *pid != own));
                }
                other => panic!("Unexpected packet {:?}", other),
            }
        }
        assert_eq!(sim.delta_pool_stats().active_count, 0);
    }

    /// Connects a viewer at (1000, 1000) looking at (0, 0)-(2000, 2000) and fills the view
    /// with `crowd` other players.
    fn crowded_view(config: SimConfig, crowd: u32) -> (Simulation, EntityId) {
        let mut sim = Simulation::with_seed(config, 1);
        let viewer = sim.connect(addr(9000), PROTOCOL_VERSION).unwrap();
        sim.game_mut().players.insert(viewer, PlayerState::new(1000.0, 1000.0));
        sim.handle_packet(
            addr(9000),
            Packet::Camera {
                x: 0.0,
                y: 0.0,
                width: 2000.0,
                height: 2000.0,
            },
            0,
        );
        for i in 0..crowd {
            let id = sim.game_mut().allocate_id();
            let x = 10.0 + (i % 50) as f32 * 38.0;
            let y = 10.0 + (i / 50) as f32 * 38.0;
            sim.game_mut().add_player_at(id, x, y);
        }
        decode_all(&mut sim);
        (sim, viewer)
    }

    fn only_delta(sim: &mut Simulation) -> (bool, Delta) {
        let sent = decode_all(sim);
        assert_eq!(sent.len(), 1);
        match sent.into_iter().next() {
            Some((_, Packet::GameStateDelta { is_full_state, delta, .. })) => (is_full_state, delta),
            other => panic!("Unexpected packet {:?}", other),
        }
    }

    #[test]
    fn test_crowded_view_is_spread_over_several_deltas() {
        let config = SimConfig {
            max_delta_entities: 50,
            ..SimConfig::default()
        };
        let (mut sim, viewer) = crowded_view(config, 120);
        let mut seen = std::collections::HashSet::new();

        for tick in 0..3u64 {
            sim.tick(1.0 / 30.0, tick * 33);
            let (is_full_state, delta) = only_delta(&mut sim);
            assert_eq!(is_full_state, tick == 0);
            assert!(delta.players.len() <= 50);
            seen.extend(delta.players.iter().map(|(id, _)| *id));
        }

        assert_eq!(seen.len(), 120);
        assert!(!seen.contains(&viewer));

        sim.tick(1.0 / 30.0, 99);
        let (_, delta) = only_delta(&mut sim);
        assert!(delta.players.is_empty());
    }

    #[test]
    fn test_undeliverable_delta_keeps_baseline() {
        let config = SimConfig {
            max_delta_entities: usize::MAX,
            ..SimConfig::default()
        };
        let (mut sim, viewer) = crowded_view(config, 2_500);

        let report = sim.tick(1.0 / 30.0, 0);
        assert_eq!(report.messages, 0);
        assert_eq!(report.sent_entities, 0);
        assert!(decode_all(&mut sim).is_empty());

        let client = sim.clients().get(viewer).unwrap();
        assert!(client.force_full_state);
        let baseline = sim.snapshots().snapshot(client.last_sent.unwrap()).unwrap();
        assert!(baseline.is_empty());
    }

    #[test]
    fn test_late_joiner_starts_with_full_state() {
        let mut sim = Simulation::with_seed(SimConfig::default(), 1);
        sim.connect(addr(9000), PROTOCOL_VERSION).unwrap();
        sim.tick(1.0 / 30.0, 0);
        sim.tick(1.0 / 30.0, 33);
        sim.connect(addr(9001), PROTOCOL_VERSION).unwrap();
        decode_all(&mut sim);

        for (tick, now) in [(2, 66), (3, 99)] {
            let report = sim.tick(1.0 / 30.0, now);
            assert_eq!(report.tick, tick);
            for (to, packet) in decode_all(&mut sim) {
                let Packet::GameStateDelta { is_full_state, .. } = packet else {
                    panic!("Unexpected packet {:?}", packet);
                };
                let late_first_frame = to == addr(9001) && tick == 2;
                assert_eq!(is_full_state, late_first_frame);
            }
        }
    }

    #[test]
    fn test_disconnect_cleans_up() {
        let mut sim = Simulation::with_seed(SimConfig::default(), 1);
        let id = sim.connect(addr(9000), PROTOCOL_VERSION).unwrap();
        for i in 0..3 {
            sim.shoot(id, 0.0, i * 1_000).unwrap();
        }
        sim.tick(1.0 / 30.0, 3_000);

        sim.handle_packet(addr(9000), Packet::Disconnect, 3_000);
        assert!(sim.clients().is_empty());
        assert!(sim.game().player(id).is_none());
        assert!(sim.game().projectiles.is_empty());
        // Only the world snapshots remain.
        assert_eq!(sim.snapshots().stats().active_count, 1);
    }

    #[test]
    fn test_reaped_player_is_disconnected_with_reason() {
        let mut sim = Simulation::with_seed(SimConfig::default(), 1);
        let id = sim.connect(addr(9000), PROTOCOL_VERSION).unwrap();
        {
            let player = sim.game_mut().players.get_mut(&id).unwrap();
            player.is_dead = true;
            player.health = 0;
            player.time_of_death = 0;
        }
        decode_all(&mut sim);

        sim.tick(1.0 / 30.0, shared::REAPER_DELAY_MS + 1);
        let sent = decode_all(&mut sim);
        assert!(sent.contains(&(
            addr(9000),
            Packet::Disconnected {
                reason: REASON_DIED.to_string()
            }
        )));
        assert!(sim.clients().is_empty());
    }

    #[test]
    fn test_sweep_timeouts() {
        let mut sim = Simulation::with_seed(SimConfig::default(), 1);
        let id = sim.connect(addr(9000), PROTOCOL_VERSION).unwrap();
        sim.clients.get_mut(id).unwrap().last_seen =
            Instant::now() - std::time::Duration::from_secs(10);

        assert_eq!(sim.sweep_timeouts(), vec![id]);
        assert!(sim.game().player(id).is_none());
    }
}
