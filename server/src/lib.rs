//! # Grid Sync Server Library
//!
//! Authoritative server for a tick-based 2D top-down shooter. The server owns the only
//! true copy of the world, advances it at a fixed rate and sends every client a compact,
//! viewport-filtered delta describing what changed since the last update that client
//! received.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Player movement, projectile flight, hit detection, death and removal of dead players
//! all happen here. Clients only send intent (movement keys, shoot angles, camera
//! rectangles) and conform to what the server reports back.
//!
//! ### Interest Management
//! Each connection reports its camera. Only entities in grid cells overlapping the padded
//! camera rectangle are sent to it, so per-client traffic is independent of world size.
//!
//! ### Delta Compression
//! Every tick produces a snapshot of the world with a content hash per entity. A client
//! receives only entities whose hash differs from the snapshot it was last sent, plus the
//! ids of entities that disappeared. Every `FULL_STATE_INTERVAL` ticks everything visible
//! is resent so lost datagrams heal.
//!
//! ## Architecture Design
//!
//! ### Single Writer
//! All mutable state lives in [`simulation::Simulation`], owned by the run loop in
//! [`network::Server`]. Network tasks only decode and encode datagrams and talk to the
//! loop through channels, so the hot path never takes a lock.
//!
//! ### Allocation Reuse
//! Projectiles, grid cells, snapshots and delta scratch buffers come from generational
//! pools ([`pool::Pool`]). A stale handle can never reach a recycled slot.
//!
//! ## Module Organization
//!
//! - `pool`: generational object pool with usage statistics
//! - `grid`: uniform spatial hash used for broadphase and visibility
//! - `projectiles`: pooled projectiles with per-owner caps
//! - `game`: world state and the per-tick pipeline
//! - `interest`: camera sanitation and visible-cell computation
//! - `snapshot`: snapshot rotation and per-client delta construction
//! - `client_manager`: connection table and per-connection state
//! - `simulation`: ties the above together behind packet and tick entry points
//! - `network`: UDP transport and the fixed-rate run loop
//! - `config`: tunable parameters
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::SimConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new("127.0.0.1:8080", SimConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod game;
pub mod grid;
pub mod interest;
pub mod network;
pub mod pool;
pub mod projectiles;
pub mod simulation;
pub mod snapshot;
