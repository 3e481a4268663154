//! Hashed world snapshots and per-connection delta construction.
//!
//! After every tick the engine captures the authoritative world into a pooled
//! [`Snapshot`] that maps each entity id to a state copy and a content hash. Deltas are
//! computed per connection by walking only the cells that connection can see and
//! comparing hashes against the snapshot last sent to it, which is then rebuilt from the
//! same visible cells so it never grows with the size of the world.

use crate::grid::CellKey;
use crate::pool::{Pool, PoolHandle, PoolStats, Reset};
use shared::{Delta, EntityId, EntityState, PlayerState, ProjectileState};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// State copy plus its content hash.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotEntry {
    pub state: EntityState,
    pub hash: u64,
}

impl SnapshotEntry {
    pub fn new(state: EntityState) -> Self {
        Self {
            hash: content_hash(&state),
            state,
        }
    }
}

#[derive(Debug, Default)]
pub struct Snapshot {
    pub tick: u32,
    pub players: HashMap<EntityId, SnapshotEntry>,
    pub projectiles: HashMap<EntityId, SnapshotEntry>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.players.is_empty() && self.projectiles.is_empty()
    }
}

impl Reset for Snapshot {
    fn reset(&mut self) {
        self.tick = 0;
        self.players.clear();
        self.projectiles.clear();
    }
}

/// Short fingerprint of what a client can observe about an entity.
///
/// Positions are rounded to two decimals so sub-centipixel jitter does not count as a
/// change. Players also hash health and the death flag.
pub fn content_hash(state: &EntityState) -> u64 {
    let mut hasher = DefaultHasher::new();
    match state {
        EntityState::Player(p) => {
            0u8.hash(&mut hasher);
            round_centi(p.x).hash(&mut hasher);
            round_centi(p.y).hash(&mut hasher);
            p.health.hash(&mut hasher);
            p.is_dead.hash(&mut hasher);
        }
        EntityState::Projectile(p) => {
            1u8.hash(&mut hasher);
            round_centi(p.x).hash(&mut hasher);
            round_centi(p.y).hash(&mut hasher);
        }
    }
    hasher.finish()
}

fn round_centi(v: f32) -> i64 {
    (v as f64 * 100.0).round() as i64
}

#[derive(Debug, Default)]
struct CellEntities {
    players: Vec<EntityId>,
    projectiles: Vec<EntityId>,
}

/// Visible entities of `current` in the order deltas list them: cell by cell, players
/// before projectiles. The viewer's own player is skipped.
fn visible_entries<'a>(
    cell_index: &'a HashMap<CellKey, CellEntities>,
    current: &'a Snapshot,
    viewer: EntityId,
    visible_cells: &'a [CellKey],
) -> impl Iterator<Item = (EntityId, &'a SnapshotEntry)> + 'a {
    visible_cells
        .iter()
        .filter_map(|key| cell_index.get(key))
        .flat_map(move |cell| {
            let players = cell
                .players
                .iter()
                .filter(move |id| **id != viewer)
                .filter_map(move |id| current.players.get(id).map(|entry| (*id, entry)));
            let projectiles = cell
                .projectiles
                .iter()
                .filter_map(move |id| current.projectiles.get(id).map(|entry| (*id, entry)));
            players.chain(projectiles)
        })
}

/// Baseline entry for `id` of the same kind as `entry`.
fn baseline_entry<'a>(
    baseline: Option<&'a Snapshot>,
    id: EntityId,
    entry: &SnapshotEntry,
) -> Option<&'a SnapshotEntry> {
    let baseline = baseline?;
    match entry.state {
        EntityState::Player(_) => baseline.players.get(&id),
        EntityState::Projectile(_) => baseline.projectiles.get(&id),
    }
}

#[derive(Debug)]
pub struct SnapshotEngine {
    pool: Pool<Snapshot>,
    current: Option<PoolHandle>,
    previous: Option<PoolHandle>,
    cell_index: HashMap<CellKey, CellEntities>,
    cell_size: f32,
    /// Holds the outgoing baseline while its replacement is built in place.
    scratch: Snapshot,
}

impl SnapshotEngine {
    pub fn new(prewarm: usize, max_size: usize, cell_size: f32) -> Self {
        Self {
            pool: Pool::new(prewarm, max_size),
            current: None,
            previous: None,
            cell_index: HashMap::new(),
            cell_size,
            scratch: Snapshot::default(),
        }
    }

    /// Rotates current into previous and captures a fresh current snapshot.
    ///
    /// Returns false if the snapshot pool is exhausted; deltas are then skipped for this
    /// tick.
    pub fn capture<'a, P, R>(&mut self, tick: u32, players: P, projectiles: R) -> bool
    where
        P: IntoIterator<Item = (EntityId, &'a PlayerState)>,
        R: IntoIterator<Item = ProjectileState>,
    {
        if let Some(previous) = self.previous.take() {
            self.pool.release(previous);
        }
        self.previous = self.current.take();
        self.current = self.pool.acquire();

        // Emptied cells stay in the index so their lists keep their capacity.
        for cell in self.cell_index.values_mut() {
            cell.players.clear();
            cell.projectiles.clear();
        }

        let Some(snapshot) = self.current.and_then(|h| self.pool.get_mut(h)) else {
            return false;
        };
        snapshot.tick = tick;

        for (id, player) in players {
            snapshot
                .players
                .insert(id, SnapshotEntry::new(EntityState::Player(*player)));
            let key = CellKey::from_position(player.x, player.y, self.cell_size);
            self.cell_index.entry(key).or_default().players.push(id);
        }

        for projectile in projectiles {
            snapshot.projectiles.insert(
                projectile.id,
                SnapshotEntry::new(EntityState::Projectile(projectile)),
            );
            let key = CellKey::from_position(projectile.x, projectile.y, self.cell_size);
            self.cell_index
                .entry(key)
                .or_default()
                .projectiles
                .push(projectile.id);
        }

        true
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.current.and_then(|h| self.pool.get(h))
    }

    pub fn previous(&self) -> Option<&Snapshot> {
        self.previous.and_then(|h| self.pool.get(h))
    }

    pub fn snapshot(&self, handle: PoolHandle) -> Option<&Snapshot> {
        self.pool.get(handle)
    }

    /// Empty last-sent snapshot for a new connection.
    pub fn acquire_baseline(&mut self) -> Option<PoolHandle> {
        self.pool.acquire()
    }

    pub fn release_baseline(&mut self, handle: PoolHandle) -> bool {
        self.pool.release(handle)
    }

    /// Writes into `delta` every visible entity that is new or changed for this viewer,
    /// plus the ids the viewer knew about that no longer exist.
    ///
    /// At most `limit` entity states are written; whatever does not fit is picked up by
    /// later deltas. The viewer's own player is never part of the delta. Returns the
    /// number of entity states written.
    pub fn build_delta(
        &self,
        viewer: EntityId,
        visible_cells: &[CellKey],
        last_sent: Option<PoolHandle>,
        full_state: bool,
        limit: usize,
        delta: &mut Delta,
    ) -> usize {
        let Some(current) = self.current() else {
            return 0;
        };
        let last = last_sent.and_then(|h| self.pool.get(h));
        let mut sent = 0;

        for (id, entry) in visible_entries(&self.cell_index, current, viewer, visible_cells) {
            if !needs_send(full_state, baseline_entry(last, id, entry), entry) {
                continue;
            }
            if sent == limit {
                break;
            }
            match entry.state {
                EntityState::Player(player) => delta.players.push((id, player)),
                EntityState::Projectile(projectile) => delta.projectiles.push(projectile),
            }
            sent += 1;
        }

        if let Some(last) = last {
            delta.deleted_players.extend(
                last.players
                    .keys()
                    .filter(|id| **id != viewer && !current.players.contains_key(*id)),
            );
            delta.deleted_projectiles.extend(
                last.projectiles
                    .keys()
                    .filter(|id| !current.projectiles.contains_key(*id)),
            );
        }

        sent
    }

    /// Rebuilds the viewer's last-sent snapshot after a delta built with the same
    /// arguments was delivered, `sent` being the count [`SnapshotEngine::build_delta`]
    /// returned.
    ///
    /// Only entities in the visible cells are kept. An entity that was due but did not
    /// fit keeps its previous baseline entry (none after a full-state frame), so the next
    /// delta sends it again. Acquires a baseline if the connection has none yet and
    /// leaves `last_sent` untouched when there is no current snapshot.
    pub fn refresh_last_sent(
        &mut self,
        viewer: EntityId,
        visible_cells: &[CellKey],
        full_state: bool,
        sent: usize,
        last_sent: &mut Option<PoolHandle>,
    ) {
        let Some(current_handle) = self.current else {
            return;
        };

        let handle = match *last_sent {
            Some(handle) if self.pool.is_active(handle) => handle,
            _ => match self.pool.acquire() {
                Some(handle) => handle,
                None => {
                    *last_sent = None;
                    return;
                }
            },
        };
        *last_sent = Some(handle);

        let Self {
            pool,
            cell_index,
            scratch,
            ..
        } = self;
        let Some((current, baseline)) = pool.get_pair_mut(current_handle, handle) else {
            return;
        };

        // The old baseline moves to scratch; the pooled slot is refilled in place.
        std::mem::swap(scratch, baseline);
        baseline.reset();
        baseline.tick = current.tick;

        let mut remaining = sent;
        for (id, entry) in visible_entries(cell_index, current, viewer, visible_cells) {
            let previous = baseline_entry(Some(&*scratch), id, entry);
            let keep = if !needs_send(full_state, previous, entry) {
                Some(entry)
            } else if remaining > 0 {
                remaining -= 1;
                Some(entry)
            } else if full_state {
                None
            } else {
                previous
            };

            if let Some(kept) = keep {
                match kept.state {
                    EntityState::Player(_) => baseline.players.insert(id, *kept),
                    EntityState::Projectile(_) => baseline.projectiles.insert(id, *kept),
                };
            }
        }

        scratch.reset();
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

fn needs_send(full_state: bool, last: Option<&SnapshotEntry>, current: &SnapshotEntry) -> bool {
    full_state || last.map_or(true, |last| last.hash != current.hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projectile(id: EntityId, x: f32, y: f32) -> ProjectileState {
        ProjectileState {
            id,
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            owner_id: 1,
            radius: 4.0,
        }
    }

    fn engine() -> SnapshotEngine {
        SnapshotEngine::new(4, 64, 200.0)
    }

    fn all_cells() -> Vec<CellKey> {
        let mut cells = Vec::new();
        for col in 0..10 {
            for row in 0..10 {
                cells.push(CellKey::new(col, row));
            }
        }
        cells
    }

    #[test]
    fn test_hash_ignores_sub_centipixel_changes() {
        let a = PlayerState::new(100.0, 100.0);
        let mut b = a;
        b.x += 0.001;
        assert_eq!(
            content_hash(&EntityState::Player(a)),
            content_hash(&EntityState::Player(b))
        );

        b.x += 0.05;
        assert_ne!(
            content_hash(&EntityState::Player(a)),
            content_hash(&EntityState::Player(b))
        );
    }

    #[test]
    fn test_hash_includes_health_and_death() {
        let a = PlayerState::new(100.0, 100.0);
        let mut b = a;
        b.health -= 20;
        assert_ne!(
            content_hash(&EntityState::Player(a)),
            content_hash(&EntityState::Player(b))
        );

        let mut c = a;
        c.is_dead = true;
        assert_ne!(
            content_hash(&EntityState::Player(a)),
            content_hash(&EntityState::Player(c))
        );
    }

    #[test]
    fn test_capture_rotates_and_releases() {
        let mut engine = engine();
        let players = vec![(1, PlayerState::new(10.0, 10.0))];

        engine.capture(0, players.iter().map(|(id, p)| (*id, p)), Vec::new());
        engine.capture(1, players.iter().map(|(id, p)| (*id, p)), Vec::new());
        assert_eq!(engine.previous().unwrap().tick, 0);
        assert_eq!(engine.current().unwrap().tick, 1);

        engine.capture(2, players.iter().map(|(id, p)| (*id, p)), Vec::new());
        // Only current and previous stay alive.
        assert_eq!(engine.stats().active_count, 2);
    }

    /// Builds a delta without a size limit and records it as delivered.
    fn deliver(
        engine: &mut SnapshotEngine,
        cells: &[CellKey],
        last_sent: &mut Option<PoolHandle>,
        full_state: bool,
        delta: &mut Delta,
    ) -> usize {
        delta.clear();
        let sent = engine.build_delta(1, cells, *last_sent, full_state, usize::MAX, delta);
        engine.refresh_last_sent(1, cells, full_state, sent, last_sent);
        sent
    }

    #[test]
    fn test_new_entities_are_sent_then_unchanged_ones_are_not() {
        let mut engine = engine();
        let cells = all_cells();
        let players = vec![(1, PlayerState::new(10.0, 10.0)), (2, PlayerState::new(300.0, 300.0))];
        let mut last_sent = engine.acquire_baseline();
        let mut delta = Delta::default();

        engine.capture(1, players.iter().map(|(id, p)| (*id, p)), vec![projectile(50, 500.0, 500.0)]);
        let sent = deliver(&mut engine, &cells, &mut last_sent, false, &mut delta);
        assert_eq!(sent, 2);
        assert_eq!(delta.players.len(), 1);
        assert_eq!(delta.players[0].0, 2);
        assert_eq!(delta.projectiles.len(), 1);

        engine.capture(2, players.iter().map(|(id, p)| (*id, p)), vec![projectile(50, 500.0, 500.0)]);
        let sent = deliver(&mut engine, &cells, &mut last_sent, false, &mut delta);
        assert_eq!(sent, 0);
        assert!(delta.is_empty());
    }

    #[test]
    fn test_full_state_resends_everything_visible() {
        let mut engine = engine();
        let cells = all_cells();
        let players = vec![(1, PlayerState::new(10.0, 10.0)), (2, PlayerState::new(300.0, 300.0))];
        let mut last_sent = engine.acquire_baseline();
        let mut delta = Delta::default();

        engine.capture(1, players.iter().map(|(id, p)| (*id, p)), Vec::new());
        deliver(&mut engine, &cells, &mut last_sent, false, &mut delta);

        engine.capture(2, players.iter().map(|(id, p)| (*id, p)), Vec::new());
        deliver(&mut engine, &cells, &mut last_sent, true, &mut delta);
        assert_eq!(delta.players.len(), 1);
    }

    #[test]
    fn test_deleted_ids_exclude_viewer() {
        let mut engine = engine();
        let cells = all_cells();
        let mut last_sent = engine.acquire_baseline();
        let mut delta = Delta::default();

        let before = vec![(1, PlayerState::new(10.0, 10.0)), (2, PlayerState::new(300.0, 300.0))];
        engine.capture(1, before.iter().map(|(id, p)| (*id, p)), vec![projectile(50, 500.0, 500.0)]);
        deliver(&mut engine, &cells, &mut last_sent, false, &mut delta);

        let after = vec![(1, PlayerState::new(10.0, 10.0))];
        engine.capture(2, after.iter().map(|(id, p)| (*id, p)), Vec::new());
        deliver(&mut engine, &cells, &mut last_sent, false, &mut delta);

        assert_eq!(delta.deleted_players, vec![2]);
        assert_eq!(delta.deleted_projectiles, vec![50]);
    }

    #[test]
    fn test_only_visible_cells_are_considered() {
        let mut engine = engine();
        let visible = vec![CellKey::new(0, 0)];
        let players = vec![
            (1, PlayerState::new(10.0, 10.0)),
            (2, PlayerState::new(50.0, 50.0)),
            (3, PlayerState::new(5000.0, 5000.0)),
        ];
        let mut last_sent = engine.acquire_baseline();
        let mut delta = Delta::default();

        engine.capture(1, players.iter().map(|(id, p)| (*id, p)), Vec::new());
        deliver(&mut engine, &visible, &mut last_sent, true, &mut delta);
        assert_eq!(delta.players.len(), 1);
        assert_eq!(delta.players[0].0, 2);

        let baseline = engine.snapshot(last_sent.unwrap()).unwrap();
        assert_eq!(baseline.players.len(), 1);
        assert!(baseline.players.contains_key(&2));
        assert!(!baseline.players.contains_key(&3));
    }

    #[test]
    fn test_reentering_entity_is_resent() {
        let mut engine = engine();
        let mut last_sent = engine.acquire_baseline();
        let near = vec![CellKey::new(0, 0)];
        let far = vec![CellKey::new(5, 5)];
        let players = vec![(1, PlayerState::new(1000.0, 1000.0)), (2, PlayerState::new(50.0, 50.0))];
        let mut delta = Delta::default();

        engine.capture(1, players.iter().map(|(id, p)| (*id, p)), Vec::new());
        deliver(&mut engine, &near, &mut last_sent, false, &mut delta);

        // Look away for a tick, then back.
        engine.capture(2, players.iter().map(|(id, p)| (*id, p)), Vec::new());
        deliver(&mut engine, &far, &mut last_sent, false, &mut delta);

        engine.capture(3, players.iter().map(|(id, p)| (*id, p)), Vec::new());
        deliver(&mut engine, &near, &mut last_sent, false, &mut delta);
        assert_eq!(delta.players.len(), 1);
        assert_eq!(delta.players[0].0, 2);
    }

    #[test]
    fn test_capped_delta_carries_the_rest_over() {
        let mut engine = engine();
        let cells = all_cells();
        let players: Vec<(EntityId, PlayerState)> = (1..=10)
            .map(|id| (id, PlayerState::new(id as f32 * 150.0, 10.0)))
            .collect();
        let mut last_sent = engine.acquire_baseline();
        let mut seen = std::collections::HashSet::new();
        let mut delta = Delta::default();

        for tick in 0..3 {
            engine.capture(tick, players.iter().map(|(id, p)| (*id, p)), Vec::new());
            delta.clear();
            let sent = engine.build_delta(1, &cells, last_sent, false, 4, &mut delta);
            assert!(sent <= 4);
            assert_eq!(delta.players.len(), sent);
            seen.extend(delta.players.iter().map(|(id, _)| *id));
            engine.refresh_last_sent(1, &cells, false, sent, &mut last_sent);
        }

        // Nine other players, four per delta.
        assert_eq!(seen.len(), 9);
        let baseline = engine.snapshot(last_sent.unwrap()).unwrap();
        assert_eq!(baseline.players.len(), 9);

        engine.capture(3, players.iter().map(|(id, p)| (*id, p)), Vec::new());
        let sent = deliver(&mut engine, &cells, &mut last_sent, false, &mut delta);
        assert_eq!(sent, 0);
    }

    #[test]
    fn test_capped_full_state_keeps_unsent_entities_due() {
        let mut engine = engine();
        let cells = all_cells();
        let players: Vec<(EntityId, PlayerState)> = (1..=6)
            .map(|id| (id, PlayerState::new(id as f32 * 150.0, 10.0)))
            .collect();
        let mut last_sent = engine.acquire_baseline();
        let mut delta = Delta::default();

        engine.capture(0, players.iter().map(|(id, p)| (*id, p)), Vec::new());
        deliver(&mut engine, &cells, &mut last_sent, false, &mut delta);

        // The full-state frame wipes the client's view but only two players fit.
        engine.capture(1, players.iter().map(|(id, p)| (*id, p)), Vec::new());
        delta.clear();
        let sent = engine.build_delta(1, &cells, last_sent, true, 2, &mut delta);
        assert_eq!(sent, 2);
        engine.refresh_last_sent(1, &cells, true, sent, &mut last_sent);
        assert_eq!(engine.snapshot(last_sent.unwrap()).unwrap().players.len(), 2);

        engine.capture(2, players.iter().map(|(id, p)| (*id, p)), Vec::new());
        let sent = deliver(&mut engine, &cells, &mut last_sent, false, &mut delta);
        assert_eq!(sent, 3);
    }

    #[test]
    fn test_emptied_cells_are_skipped() {
        let mut engine = engine();
        let cells = all_cells();
        let mut last_sent = engine.acquire_baseline();
        let mut delta = Delta::default();

        let before = vec![(1, PlayerState::new(10.0, 10.0)), (2, PlayerState::new(300.0, 300.0))];
        engine.capture(0, before.iter().map(|(id, p)| (*id, p)), Vec::new());
        deliver(&mut engine, &cells, &mut last_sent, false, &mut delta);

        // Player 2 moves to a different cell; its old cell stays indexed but empty.
        let after = vec![(1, PlayerState::new(10.0, 10.0)), (2, PlayerState::new(700.0, 700.0))];
        engine.capture(1, after.iter().map(|(id, p)| (*id, p)), Vec::new());
        let sent = deliver(&mut engine, &cells, &mut last_sent, false, &mut delta);
        assert_eq!(sent, 1);
        assert_eq!(delta.players[0], (2, after[1].1));
        assert!(delta.deleted_players.is_empty());

        let vacated = &engine.cell_index[&CellKey::new(1, 1)];
        assert!(vacated.players.is_empty());
        assert!(vacated.players.capacity() >= 1);
    }
}
