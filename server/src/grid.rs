//! Uniform hash grid rebuilt from scratch every tick.
//!
//! Cells are pooled containers: `clear` hands every occupied cell back to the shared
//! [`Pool<GridCell>`] and the next tick picks them up again. The player grid and the
//! projectile grid are separate [`SpatialGrid`] instances that draw from the same pool,
//! which is why every operation takes the pool explicitly.

use crate::pool::{Pool, PoolHandle, Reset};
use shared::EntityId;
use std::collections::HashMap;

/// Integer column/row of a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub col: i32,
    pub row: i32,
}

impl CellKey {
    pub fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }

    pub fn from_position(x: f32, y: f32, cell_size: f32) -> Self {
        Self {
            col: (x / cell_size).floor() as i32,
            row: (y / cell_size).floor() as i32,
        }
    }

    /// The 3x3 block centred on this cell, self included.
    pub fn neighbors(&self) -> [CellKey; 9] {
        let mut keys = [*self; 9];
        let mut i = 0;
        for col in self.col - 1..=self.col + 1 {
            for row in self.row - 1..=self.row + 1 {
                keys[i] = CellKey { col, row };
                i += 1;
            }
        }
        keys
    }
}

/// Pooled set of entity ids occupying one cell.
#[derive(Debug, Default)]
pub struct GridCell {
    ids: Vec<EntityId>,
}

impl GridCell {
    pub fn ids(&self) -> &[EntityId] {
        &self.ids
    }
}

impl Reset for GridCell {
    fn reset(&mut self) {
        self.ids.clear();
    }
}

#[derive(Debug)]
pub struct SpatialGrid {
    cell_size: f32,
    cells: HashMap<CellKey, PoolHandle>,
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
        }
    }

    pub fn key_for(&self, x: f32, y: f32) -> CellKey {
        CellKey::from_position(x, y, self.cell_size)
    }

    /// Inserts `id` into the cell at `key`, acquiring a pooled cell on first use.
    ///
    /// Returns false when the cell pool is exhausted; the entity is then simply absent
    /// from the grid for this tick.
    pub fn add(&mut self, pool: &mut Pool<GridCell>, key: CellKey, id: EntityId) -> bool {
        let handle = match self.cells.get(&key) {
            Some(handle) => *handle,
            None => match pool.acquire() {
                Some(handle) => {
                    self.cells.insert(key, handle);
                    handle
                }
                None => return false,
            },
        };

        match pool.get_mut(handle) {
            Some(cell) => {
                cell.ids.push(id);
                true
            }
            None => false,
        }
    }

    pub fn get<'a>(&self, pool: &'a Pool<GridCell>, key: CellKey) -> Option<&'a [EntityId]> {
        let handle = self.cells.get(&key)?;
        pool.get(*handle).map(GridCell::ids)
    }

    pub fn contains(&self, key: CellKey) -> bool {
        self.cells.contains_key(&key)
    }

    /// Occupied cell keys, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = CellKey> + '_ {
        self.cells.keys().copied()
    }

    /// Releases every occupied cell and empties the index.
    pub fn clear(&mut self, pool: &mut Pool<GridCell>) {
        for (_, handle) in self.cells.drain() {
            pool.release(handle);
        }
    }

    /// Number of occupied cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
