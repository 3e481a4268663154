//! Pooled projectiles with per-owner bookkeeping.

use crate::pool::{Pool, PoolHandle, PoolStats, Reset};
use shared::{EntityId, ProjectileState};
use std::collections::HashMap;

/// Why a shoot request did not produce a projectile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ShotRejected {
    #[error("shooter is not connected")]
    UnknownShooter,
    #[error("shooter is dead")]
    ShooterDead,
    #[error("shoot cooldown has not elapsed")]
    Cooldown,
    #[error("shoot angle is not a finite number")]
    InvalidAngle,
    #[error("owner already has {0} projectiles in flight")]
    OwnerCap(usize),
    #[error("projectile pool is exhausted")]
    PoolExhausted,
}

#[derive(Debug, Default)]
pub struct Projectile {
    pub id: EntityId,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub owner_id: EntityId,
    pub radius: f32,
    pub active: bool,
}

impl Projectile {
    pub fn update(&mut self, dt: f32) {
        self.x += self.vx * dt;
        self.y += self.vy * dt;
    }

    /// True once the projectile has fully left the world rectangle.
    pub fn is_out_of_bounds(&self, world_width: f32, world_height: f32) -> bool {
        self.x < -self.radius
            || self.x > world_width + self.radius
            || self.y < -self.radius
            || self.y > world_height + self.radius
    }

    pub fn state(&self) -> ProjectileState {
        ProjectileState {
            id: self.id,
            x: self.x,
            y: self.y,
            vx: self.vx,
            vy: self.vy,
            owner_id: self.owner_id,
            radius: self.radius,
        }
    }
}

impl Reset for Projectile {
    fn reset(&mut self) {
        *self = Projectile::default();
    }
}

/// Parameters of a projectile about to be spawned.
#[derive(Debug, Clone, Copy)]
pub struct ProjectileSpawn {
    pub id: EntityId,
    pub owner_id: EntityId,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub speed: f32,
    pub radius: f32,
}

/// Active projectiles indexed by id and by owner.
///
/// The owner index and the set of active projectiles are only ever changed together, so
/// `owner_count` always matches the number of active projectiles carrying that owner id.
#[derive(Debug)]
pub struct ProjectilePool {
    pool: Pool<Projectile>,
    by_id: HashMap<EntityId, PoolHandle>,
    by_owner: HashMap<EntityId, Vec<EntityId>>,
    max_per_owner: usize,
    rejected_shots: u64,
}

impl ProjectilePool {
    pub fn new(prewarm: usize, max_size: usize, max_per_owner: usize) -> Self {
        Self {
            pool: Pool::new(prewarm, max_size),
            by_id: HashMap::new(),
            by_owner: HashMap::new(),
            max_per_owner,
            rejected_shots: 0,
        }
    }

    pub fn owner_count(&self, owner_id: EntityId) -> usize {
        self.by_owner.get(&owner_id).map_or(0, Vec::len)
    }

    pub fn can_shoot(&self, owner_id: EntityId) -> bool {
        self.owner_count(owner_id) < self.max_per_owner
    }

    /// Activates a projectile moving along `angle` (radians, 0 = +x).
    pub fn spawn(&mut self, spawn: ProjectileSpawn) -> Result<EntityId, ShotRejected> {
        if !self.can_shoot(spawn.owner_id) {
            self.rejected_shots += 1;
            return Err(ShotRejected::OwnerCap(self.max_per_owner));
        }

        let Some(handle) = self.pool.acquire() else {
            self.rejected_shots += 1;
            return Err(ShotRejected::PoolExhausted);
        };

        if let Some(projectile) = self.pool.get_mut(handle) {
            *projectile = Projectile {
                id: spawn.id,
                x: spawn.x,
                y: spawn.y,
                vx: spawn.angle.cos() * spawn.speed,
                vy: spawn.angle.sin() * spawn.speed,
                owner_id: spawn.owner_id,
                radius: spawn.radius,
                active: true,
            };
        }

        self.by_id.insert(spawn.id, handle);
        self.by_owner.entry(spawn.owner_id).or_default().push(spawn.id);
        Ok(spawn.id)
    }

    /// Returns the projectile to the pool. No-op for ids that are not active.
    pub fn release(&mut self, id: EntityId) -> bool {
        let Some(handle) = self.by_id.remove(&id) else {
            return false;
        };

        let owner_id = self.pool.get(handle).map(|p| p.owner_id);
        if let Some(owner_id) = owner_id {
            // An owner's list stays allocated while it is connected, even when empty.
            if let Some(owned) = self.by_owner.get_mut(&owner_id) {
                if let Some(pos) = owned.iter().position(|&p| p == id) {
                    owned.swap_remove(pos);
                }
            }
        }

        self.pool.release(handle)
    }

    /// Releases every projectile fired by `owner_id` and returns how many there were.
    ///
    /// Also forgets the owner, so call it once the owner is gone.
    pub fn release_by_owner(&mut self, owner_id: EntityId) -> usize {
        let Some(owned) = self.by_owner.remove(&owner_id) else {
            return 0;
        };

        let mut released = 0;
        for id in owned {
            if let Some(handle) = self.by_id.remove(&id) {
                if self.pool.release(handle) {
                    released += 1;
                }
            }
        }
        released
    }

    pub fn get(&self, id: EntityId) -> Option<&Projectile> {
        let handle = self.by_id.get(&id)?;
        self.pool.get(*handle)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Projectile> {
        let handle = self.by_id.get(&id)?;
        self.pool.get_mut(*handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Projectile> {
        self.pool.iter_active().map(|(_, p)| p)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Projectile> {
        self.pool.iter_active_mut().map(|(_, p)| p)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn rejected_shots(&self) -> u64 {
        self.rejected_shots
    }

    /// Number of owners with at least one projectile in flight.
    pub fn active_owners(&self) -> usize {
        self.by_owner.values().filter(|owned| !owned.is_empty()).count()
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }
}
