//! Generic acquire/release arena used for every per-tick container on the server.
//!
//! Objects live in slots that are never freed; releasing a slot resets its value and puts
//! the index on a free list so the next `acquire` hands it back out. Once the pools are
//! warm, a tick does not allocate for grid cells, projectiles, snapshots or delta buffers.

use shared::Delta;

/// Clears identifying and mutable fields so an object can be handed out again.
pub trait Reset {
    fn reset(&mut self);
}

impl Reset for Delta {
    fn reset(&mut self) {
        self.clear();
    }
}

/// Reference to an acquired object.
///
/// The generation makes stale handles harmless: once a slot has been released, handles
/// from its previous life no longer resolve and releasing them again is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolHandle {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Slot<T> {
    value: T,
    generation: u32,
    active: bool,
}

/// Counters exposed for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Instances sitting on the free list.
    pub pool_size: usize,
    pub active_count: usize,
    /// Instances constructed on demand (prewarmed instances are not counted).
    pub total_created: u64,
    /// Acquisitions served from the free list.
    pub total_reused: u64,
    pub total_released: u64,
}

impl PoolStats {
    /// Percentage of acquisitions that were served without constructing a new object.
    pub fn reuse_rate(&self) -> f64 {
        let acquisitions = self.total_created + self.total_reused;
        if acquisitions == 0 {
            return 0.0;
        }
        self.total_reused as f64 / acquisitions as f64 * 100.0
    }
}

#[derive(Debug)]
pub struct Pool<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    max_size: usize,
    active_count: usize,
    total_created: u64,
    total_reused: u64,
    total_released: u64,
}

impl<T: Reset + Default> Pool<T> {
    /// Creates a pool with `prewarm` ready instances that never grows past `max_size`.
    pub fn new(prewarm: usize, max_size: usize) -> Self {
        let prewarm = prewarm.min(max_size);
        let mut slots = Vec::with_capacity(prewarm);
        let mut free = Vec::with_capacity(prewarm);

        for index in 0..prewarm {
            slots.push(Slot {
                value: T::default(),
                generation: 0,
                active: false,
            });
            free.push(index);
        }

        Self {
            slots,
            free,
            max_size,
            active_count: 0,
            total_created: 0,
            total_reused: 0,
            total_released: 0,
        }
    }

    /// Hands out a cleared instance, or `None` when the hard cap is reached.
    pub fn acquire(&mut self) -> Option<PoolHandle> {
        let index = if let Some(index) = self.free.pop() {
            self.total_reused += 1;
            index
        } else if self.slots.len() < self.max_size {
            self.slots.push(Slot {
                value: T::default(),
                generation: 0,
                active: false,
            });
            self.total_created += 1;
            self.slots.len() - 1
        } else {
            return None;
        };

        let slot = &mut self.slots[index];
        slot.active = true;
        self.active_count += 1;

        Some(PoolHandle {
            index: index as u32,
            generation: slot.generation,
        })
    }

    /// Resets the object and returns it to the free list.
    ///
    /// Returns false without touching anything if the handle is not currently active.
    pub fn release(&mut self, handle: PoolHandle) -> bool {
        let index = handle.index as usize;
        let Some(slot) = self.slots.get_mut(index) else {
            return false;
        };
        if !slot.active || slot.generation != handle.generation {
            return false;
        }

        slot.value.reset();
        slot.active = false;
        slot.generation = slot.generation.wrapping_add(1);

        self.free.push(index);
        self.active_count -= 1;
        self.total_released += 1;
        true
    }

    pub fn is_active(&self, handle: PoolHandle) -> bool {
        self.slots
            .get(handle.index as usize)
            .is_some_and(|slot| slot.active && slot.generation == handle.generation)
    }

    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        let slot = self.slots.get(handle.index as usize)?;
        (slot.active && slot.generation == handle.generation).then_some(&slot.value)
    }

    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        (slot.active && slot.generation == handle.generation).then_some(&mut slot.value)
    }

    /// Mutable access to two distinct active objects at once.
    pub fn get_pair_mut(&mut self, a: PoolHandle, b: PoolHandle) -> Option<(&mut T, &mut T)> {
        if a.index == b.index || !self.is_active(a) || !self.is_active(b) {
            return None;
        }
        let (ia, ib) = (a.index as usize, b.index as usize);
        if ia < ib {
            let (left, right) = self.slots.split_at_mut(ib);
            Some((&mut left[ia].value, &mut right[0].value))
        } else {
            let (left, right) = self.slots.split_at_mut(ia);
            Some((&mut right[0].value, &mut left[ib].value))
        }
    }

    pub fn iter_active(&self) -> impl Iterator<Item = (PoolHandle, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.active)
            .map(|(index, slot)| {
                (
                    PoolHandle {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    &slot.value,
                )
            })
    }

    pub fn iter_active_mut(&mut self) -> impl Iterator<Item = (PoolHandle, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter(|(_, slot)| slot.active)
            .map(|(index, slot)| {
                (
                    PoolHandle {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    &mut slot.value,
                )
            })
    }

    pub fn active_count(&self) -> usize {
        self.active_count
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            pool_size: self.free.len(),
            active_count: self.active_count,
            total_created: self.total_created,
            total_reused: self.total_reused,
            total_released: self.total_released,
        }
    }
}
