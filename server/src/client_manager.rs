//! Connection table for the simulation
//!
//! This module tracks everything the server knows about a connected client that is not
//! part of the authoritative world itself:
//! - Connection metadata (id, address, last activity)
//! - The latest movement keys and the last input sequence number received
//! - The reported camera viewport and the grid cells it makes visible
//! - The shoot cooldown timestamp and the snapshot last sent to the client
//! - A per-second inbound message budget
//!
//! Ids are handed out by the game state so that players and projectiles never share one.

use crate::grid::CellKey;
use crate::pool::PoolHandle;
use log::info;
use shared::{EntityId, InputKeys, Viewport};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A connected client and its per-connection sync state
#[derive(Debug)]
pub struct Client {
    /// Connection id, equal to the id of the client's player
    pub id: EntityId,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
    /// Keys from the most recent input packet; applied every tick until replaced
    pub keys: InputKeys,
    /// Sequence number of the most recent input packet, `None` before the first one
    pub last_processed_input: Option<u32>,
    pub viewport: Viewport,
    /// Cells overlapping the padded viewport
    pub visible_cells: Vec<CellKey>,
    /// Server time of the last accepted shot
    pub last_shoot_ms: Option<u64>,
    /// Baseline the next delta is computed against
    pub last_sent: Option<PoolHandle>,
    /// Makes the next delta a full-state frame regardless of the global cadence
    pub force_full_state: bool,
    rate_window_start: Instant,
    rate_window_count: u32,
}

impl Client {
    /// Creates a new client with no input received yet and the default camera size
    pub fn new(id: EntityId, addr: SocketAddr) -> Self {
        let now = Instant::now();
        Self {
            id,
            addr,
            last_seen: now,
            keys: InputKeys::default(),
            last_processed_input: None,
            viewport: Viewport::default(),
            visible_cells: Vec::new(),
            last_shoot_ms: None,
            last_sent: None,
            force_full_state: true,
            rate_window_start: now,
            rate_window_count: 0,
        }
    }

    /// Records a movement input
    ///
    /// Sequence numbers are accepted as they arrive; a late packet simply becomes the
    /// latest input until the next one replaces it.
    pub fn apply_input(&mut self, seq: u32, keys: InputKeys) {
        self.last_seen = Instant::now();
        self.keys = keys;
        self.last_processed_input = Some(seq);
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Checks if the client has exceeded the connection timeout
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }

    /// True when at least `cooldown_ms` passed since the last accepted shot
    pub fn can_shoot(&self, now_ms: u64, cooldown_ms: u64) -> bool {
        match self.last_shoot_ms {
            Some(last) => now_ms.saturating_sub(last) >= cooldown_ms,
            None => true,
        }
    }

    /// Counts one inbound message against a one-second window
    ///
    /// Returns false once more than `max_per_second` messages arrived in the current
    /// window.
    pub fn allow_message(&mut self, now: Instant, max_per_second: u32) -> bool {
        if now.duration_since(self.rate_window_start) >= Duration::from_secs(1) {
            self.rate_window_start = now;
            self.rate_window_count = 0;
        }
        self.rate_window_count += 1;
        self.rate_window_count <= max_per_second
    }
}

/// Manages all connected clients
///
/// Enforces the capacity limit and keeps an address index so packets can be routed to
/// their connection without scanning the table.
pub struct ClientManager {
    /// Connected clients indexed by their id
    clients: HashMap<EntityId, Client>,
    by_addr: HashMap<SocketAddr, EntityId>,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            by_addr: HashMap::new(),
            max_clients,
        }
    }

    pub fn is_full(&self) -> bool {
        self.clients.len() >= self.max_clients
    }

    /// Registers a connection under an id chosen by the caller
    ///
    /// Returns false if the server is at capacity or the id is already taken.
    pub fn add_client(&mut self, id: EntityId, addr: SocketAddr) -> bool {
        if self.is_full() || self.clients.contains_key(&id) {
            return false;
        }

        info!("Client {} connected from {}", id, addr);
        self.by_addr.insert(addr, id);
        self.clients.insert(id, Client::new(id, addr));
        true
    }

    /// Removes a client and hands back its state for cleanup
    pub fn remove_client(&mut self, client_id: &EntityId) -> Option<Client> {
        let client = self.clients.remove(client_id)?;
        if self.by_addr.get(&client.addr) == Some(client_id) {
            self.by_addr.remove(&client.addr);
        }
        info!("Client {} disconnected", client.id);
        Some(client)
    }

    /// Finds a client id by network address
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<EntityId> {
        self.by_addr.get(&addr).copied()
    }

    pub fn get(&self, client_id: EntityId) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    pub fn get_mut(&mut self, client_id: EntityId) -> Option<&mut Client> {
        self.clients.get_mut(&client_id)
    }

    /// Records an input for a specific client. Returns false if the id is unknown.
    pub fn apply_input(&mut self, client_id: EntityId, seq: u32, keys: InputKeys) -> bool {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.apply_input(seq, keys);
            true
        } else {
            false
        }
    }

    /// Latest keys of every connected client, for the movement step
    pub fn inputs(&self) -> impl Iterator<Item = (EntityId, InputKeys)> + '_ {
        self.clients.values().map(|client| (client.id, client.keys))
    }

    /// Ids of clients that have been silent for longer than `timeout`
    ///
    /// The clients stay registered; the caller disconnects them so that their world
    /// state is cleaned up in the same place as any other disconnect.
    pub fn timed_out(&self, timeout: Duration) -> Vec<EntityId> {
        self.clients
            .values()
            .filter(|client| client.is_timed_out(timeout))
            .map(|client| client.id)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Client> {
        self.clients.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Client> {
        self.clients.values_mut()
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
