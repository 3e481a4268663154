use crate::config::SimConfig;
use crate::grid::{CellKey, GridCell, SpatialGrid};
use crate::pool::{Pool, PoolStats};
use crate::projectiles::{ProjectilePool, ProjectileSpawn, ShotRejected};
use log::{debug, info};
use rand::Rng;
use shared::{apply_movement, circle_rect_collision, EntityId, InputKeys, PlayerState};
use std::collections::HashMap;

/// What happened during one simulation step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub tick: u32,
    /// Projectile-versus-player tests performed by the broadphase.
    pub collision_checks: usize,
    pub hits: usize,
    pub deaths: usize,
    /// Projectiles released for leaving the world or hitting a player.
    pub released_projectiles: usize,
    /// Players removed after their death grace period.
    pub reaped: Vec<EntityId>,
    /// Occupied cells across both grids.
    pub grid_cells: usize,
    /// Delta messages queued for clients.
    pub messages: usize,
    /// Entity states carried by those messages.
    pub sent_entities: usize,
}

/// Authoritative world: players, projectiles and the per-tick broadphase grids.
#[derive(Debug)]
pub struct GameState {
    pub tick: u32,
    pub players: HashMap<EntityId, PlayerState>,
    pub projectiles: ProjectilePool,
    config: SimConfig,
    cell_pool: Pool<GridCell>,
    player_grid: SpatialGrid,
    projectile_grid: SpatialGrid,
    next_entity_id: EntityId,
    // Per-tick scratch space, kept to avoid reallocating every tick.
    to_release: Vec<EntityId>,
    candidates: Vec<EntityId>,
    occupied: Vec<CellKey>,
}

impl GameState {
    pub fn new(config: SimConfig) -> Self {
        let (cell_prewarm, cell_max) = config.grid_cell_pool;
        let (projectile_prewarm, projectile_max) = config.projectile_pool;

        Self {
            tick: 0,
            players: HashMap::new(),
            projectiles: ProjectilePool::new(
                projectile_prewarm,
                projectile_max,
                config.max_projectiles_per_owner,
            ),
            cell_pool: Pool::new(cell_prewarm, cell_max),
            player_grid: SpatialGrid::new(config.cell_size),
            projectile_grid: SpatialGrid::new(config.cell_size),
            next_entity_id: 1,
            to_release: Vec::new(),
            candidates: Vec::new(),
            occupied: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Hands out ids for players and projectiles from one counter.
    pub fn allocate_id(&mut self) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id = self.next_entity_id.wrapping_add(1).max(1);
        id
    }

    /// Spawns a player at a random position inside the world.
    pub fn spawn_player(&mut self, id: EntityId, rng: &mut impl Rng) -> PlayerState {
        let max_x = (self.config.world_width - self.config.spawn_margin).max(1.0);
        let max_y = (self.config.world_height - self.config.spawn_margin).max(1.0);
        let x = rng.gen_range(0.0..max_x);
        let y = rng.gen_range(0.0..max_y);
        self.add_player_at(id, x, y)
    }

    pub fn add_player_at(&mut self, id: EntityId, x: f32, y: f32) -> PlayerState {
        let player = PlayerState::new(x, y);
        info!("Added player {} at ({:.1}, {:.1})", id, player.x, player.y);
        self.players.insert(id, player);
        player
    }

    /// Removes a player and every projectile it still has in flight.
    pub fn remove_player(&mut self, id: EntityId) -> bool {
        let released = self.projectiles.release_by_owner(id);
        if released > 0 {
            debug!("Released {} projectiles owned by {}", released, id);
        }
        if self.players.remove(&id).is_some() {
            info!("Removed player {}", id);
            true
        } else {
            false
        }
    }

    pub fn player(&self, id: EntityId) -> Option<&PlayerState> {
        self.players.get(&id)
    }

    /// Fires a projectile from the centre of `owner_id` along `angle` (radians).
    ///
    /// Cooldowns are tracked per connection and checked by the caller.
    pub fn shoot(&mut self, owner_id: EntityId, angle: f32) -> Result<EntityId, ShotRejected> {
        if !angle.is_finite() {
            return Err(ShotRejected::InvalidAngle);
        }
        let player = self
            .players
            .get(&owner_id)
            .ok_or(ShotRejected::UnknownShooter)?;
        if player.is_dead {
            return Err(ShotRejected::ShooterDead);
        }

        let (x, y) = player.center();
        let id = self.allocate_id();
        self.projectiles.spawn(ProjectileSpawn {
            id,
            owner_id,
            x,
            y,
            angle,
            speed: self.config.projectile_speed,
            radius: self.config.projectile_radius,
        })
    }

    /// Runs one fixed step: movement, projectile flight, broadphase collision, release of
    /// spent projectiles and reaping of long-dead players.
    ///
    /// `inputs` yields the latest keys of every connected player. `now_ms` is wall-clock
    /// time used for death timestamps and the reaper.
    pub fn tick<I>(&mut self, dt: f32, now_ms: u64, inputs: I) -> TickReport
    where
        I: IntoIterator<Item = (EntityId, InputKeys)>,
    {
        let mut report = TickReport {
            tick: self.tick,
            ..Default::default()
        };

        self.player_grid.clear(&mut self.cell_pool);
        self.projectile_grid.clear(&mut self.cell_pool);

        // Players
        for (id, keys) in inputs {
            let Some(player) = self.players.get_mut(&id) else {
                continue;
            };
            if player.is_dead {
                continue;
            }
            apply_movement(
                player,
                &keys,
                dt,
                self.config.player_speed,
                self.config.world_width,
                self.config.world_height,
            );
            let key = self.player_grid.key_for(player.x, player.y);
            self.player_grid.add(&mut self.cell_pool, key, id);
        }

        // Projectiles
        self.to_release.clear();
        for projectile in self.projectiles.iter_mut() {
            projectile.update(dt);
            if projectile.is_out_of_bounds(self.config.world_width, self.config.world_height) {
                projectile.active = false;
                self.to_release.push(projectile.id);
                continue;
            }
            let key = self.projectile_grid.key_for(projectile.x, projectile.y);
            self.projectile_grid
                .add(&mut self.cell_pool, key, projectile.id);
        }

        // Collisions
        self.occupied.clear();
        self.occupied.extend(self.projectile_grid.keys());
        for cell in &self.occupied {
            self.candidates.clear();
            for neighbor in cell.neighbors() {
                if let Some(ids) = self.player_grid.get(&self.cell_pool, neighbor) {
                    self.candidates.extend_from_slice(ids);
                }
            }
            if self.candidates.is_empty() {
                continue;
            }

            let Some(projectile_ids) = self.projectile_grid.get(&self.cell_pool, *cell) else {
                continue;
            };
            for projectile_id in projectile_ids {
                let Some(projectile) = self.projectiles.get_mut(*projectile_id) else {
                    continue;
                };
                if !projectile.active {
                    continue;
                }

                for player_id in &self.candidates {
                    report.collision_checks += 1;
                    if *player_id == projectile.owner_id {
                        continue;
                    }
                    let Some(player) = self.players.get_mut(player_id) else {
                        continue;
                    };
                    if player.is_dead {
                        continue;
                    }

                    if circle_rect_collision(
                        projectile.x,
                        projectile.y,
                        projectile.radius,
                        player.x,
                        player.y,
                        player.width,
                        player.height,
                    ) {
                        player.health -= self.config.projectile_damage;
                        report.hits += 1;
                        if player.health <= 0 && !player.is_dead {
                            player.health = 0;
                            player.is_dead = true;
                            player.time_of_death = now_ms;
                            report.deaths += 1;
                        }
                        projectile.active = false;
                        self.to_release.push(projectile.id);
                        break;
                    }
                }
            }
        }

        for id in self.to_release.drain(..) {
            if self.projectiles.release(id) {
                report.released_projectiles += 1;
            }
        }

        // Reaping
        let reaper_delay_ms = self.config.reaper_delay_ms;
        report.reaped.extend(self.players.iter().filter_map(|(id, player)| {
            (player.is_dead && now_ms.saturating_sub(player.time_of_death) > reaper_delay_ms)
                .then_some(*id)
        }));
        for id in &report.reaped {
            self.remove_player(*id);
        }

        report.grid_cells = self.player_grid.len() + self.projectile_grid.len();
        self.tick = self.tick.wrapping_add(1);
        report
    }

    pub fn cell_pool_stats(&self) -> PoolStats {
        self.cell_pool.stats()
    }

    pub fn projectile_pool_stats(&self) -> PoolStats {
        self.projectiles.stats()
    }
}
