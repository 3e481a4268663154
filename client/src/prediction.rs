//! Client-side prediction of the local player and reconciliation with the server.
//!
//! Inputs are applied locally as soon as they are produced and kept in a pending queue
//! until the server acknowledges them. An authoritative update overwrites the local
//! player and the still-pending inputs are replayed on top of it with the same movement
//! function the server runs, so a correct prediction produces no visible snap.

use crate::input::PendingInput;
use log::debug;
use shared::{apply_movement, InputKeys, PlayerState};
use std::collections::VecDeque;

/// How long a correction keeps [`Predictor::is_recently_reconciled`] true.
pub const RECONCILIATION_FLAG_MS: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementParams {
    pub speed: f32,
    pub world_width: f32,
    pub world_height: f32,
}

#[derive(Debug)]
pub struct Predictor {
    player: PlayerState,
    pending: VecDeque<PendingInput>,
    movement: MovementParams,
    input_timeout_ms: u64,
    synced: bool,
    reconciliation_count: u64,
    last_reconciliation_ms: Option<u64>,
}

impl Predictor {
    pub fn new(movement: MovementParams, input_timeout_ms: u64) -> Self {
        Self {
            player: Self::placeholder(&movement),
            pending: VecDeque::new(),
            movement,
            input_timeout_ms,
            synced: false,
            reconciliation_count: 0,
            last_reconciliation_ms: None,
        }
    }

    fn placeholder(movement: &MovementParams) -> PlayerState {
        PlayerState::new(movement.world_width / 2.0, movement.world_height / 2.0)
    }

    pub fn player(&self) -> &PlayerState {
        &self.player
    }

    /// False until the first authoritative state arrived.
    pub fn is_synced(&self) -> bool {
        self.synced
    }

    pub fn pending(&self) -> &VecDeque<PendingInput> {
        &self.pending
    }

    pub fn reconciliation_count(&self) -> u64 {
        self.reconciliation_count
    }

    pub fn is_recently_reconciled(&self, now_ms: u64) -> bool {
        self.last_reconciliation_ms
            .is_some_and(|last| now_ms.saturating_sub(last) < RECONCILIATION_FLAG_MS)
    }

    /// Moves the local player one step. Dead players stay put.
    pub fn apply_local(&mut self, keys: &InputKeys, dt: f32) {
        if self.player.is_dead {
            return;
        }
        apply_movement(
            &mut self.player,
            keys,
            dt,
            self.movement.speed,
            self.movement.world_width,
            self.movement.world_height,
        );
    }

    /// Remembers an input that was just sent.
    pub fn push_pending(&mut self, input: PendingInput) {
        self.pending.push_back(input);
    }

    /// Drops every pending input with a sequence number up to and including `seq`.
    pub fn acknowledge(&mut self, seq: u32) {
        while self.pending.front().is_some_and(|input| input.seq <= seq) {
            self.pending.pop_front();
        }
    }

    /// Drops pending inputs that were never acknowledged within the timeout.
    pub fn drop_expired(&mut self, now_ms: u64) {
        let cutoff = now_ms.saturating_sub(self.input_timeout_ms);
        while self
            .pending
            .front()
            .is_some_and(|input| input.timestamp < cutoff)
        {
            self.pending.pop_front();
        }
    }

    /// Applies an authoritative state and replays what the server has not seen yet.
    ///
    /// Returns true when inputs were replayed. Only those corrections are counted; an
    /// update that arrives while idle simply sets the state.
    pub fn reconcile(
        &mut self,
        server_state: PlayerState,
        last_processed_input: Option<u32>,
        now_ms: u64,
        dt: f32,
    ) -> bool {
        if let Some(seq) = last_processed_input {
            self.acknowledge(seq);
        }

        self.player = server_state;
        self.synced = true;

        if self.pending.is_empty() {
            return false;
        }

        for input in &self.pending {
            if self.player.is_dead {
                break;
            }
            apply_movement(
                &mut self.player,
                &input.keys,
                dt,
                self.movement.speed,
                self.movement.world_width,
                self.movement.world_height,
            );
        }

        self.reconciliation_count += 1;
        self.last_reconciliation_ms = Some(now_ms);
        debug!(
            "Reconciled against {:?}, replayed {} inputs",
            last_processed_input,
            self.pending.len()
        );
        true
    }

    /// Forgets everything tied to the current connection.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.player = Self::placeholder(&self.movement);
        self.synced = false;
        self.last_reconciliation_ms = None;
    }
}
